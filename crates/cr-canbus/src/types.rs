//! Core CAN bus types and OBD-II constants.

// ── OBD-II CAN IDs ──────────────────────────────────────────────

/// Standard OBD-II broadcast request CAN ID.
pub const OBD_REQUEST_ID: u32 = 0x7DF;

/// First OBD-II response CAN ID (ECU #1).
pub const OBD_RESPONSE_ID_MIN: u32 = 0x7E8;

/// Last OBD-II response CAN ID (ECU #8).
pub const OBD_RESPONSE_ID_MAX: u32 = 0x7EF;

/// Distance between an ECU's response ID and its physical request ID.
pub const PHYSICAL_ID_OFFSET: u32 = 0x08;

// ── OBD-II trouble code services ────────────────────────────────

/// Service 03: Show stored DTCs.
pub const MODE_STORED_DTCS: u8 = 0x03;

/// Service 04: Clear DTCs and stored values.
pub const MODE_CLEAR_DTCS: u8 = 0x04;

/// Service 07: Show pending DTCs.
pub const MODE_PENDING_DTCS: u8 = 0x07;

/// Service 0A: Show permanent (cleared) DTCs.
pub const MODE_PERMANENT_DTCS: u8 = 0x0A;

/// Offset added to request service to get the positive response SID.
pub const RESPONSE_SID_OFFSET: u8 = 0x40;

/// SID of a negative response: `[0x7F, requested_service, nrc]`.
pub const NEGATIVE_RESPONSE_SID: u8 = 0x7F;

// ── ISO-TP frame type nibbles (upper nibble of byte 0) ────────

/// Single Frame.
pub const ISOTP_SF: u8 = 0x0;
/// First Frame.
pub const ISOTP_FF: u8 = 0x1;
/// Consecutive Frame.
pub const ISOTP_CF: u8 = 0x2;
/// Flow Control.
pub const ISOTP_FC: u8 = 0x3;

// ── CAN Frame ───────────────────────────────────────────────────

/// A raw CAN 2.0A frame (standard 11-bit ID).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanFrame {
    /// CAN arbitration ID (11-bit standard).
    pub id: u32,
    /// Data payload (0–8 bytes for standard CAN).
    pub data: Vec<u8>,
}

impl CanFrame {
    pub fn new(id: u32, data: Vec<u8>) -> Self {
        Self { id, data }
    }
}
