//! CAN bus safety guard: only trouble code services may reach the bus.
//!
//! Allowed OBD-II services:
//! - 0x03: Show stored DTCs
//! - 0x04: Clear DTCs
//! - 0x07: Show pending DTCs
//! - 0x0A: Show permanent DTCs
//!
//! Everything else (live data, actuator control, etc.) is blocked.

use crate::error::{CanError, CanResult};
use crate::types::{CanFrame, OBD_REQUEST_ID};

/// OBD-II services this device is allowed to request.
pub const ALLOWED_SERVICES: &[u8] = &[0x03, 0x04, 0x07, 0x0A];

/// Validates that an OBD-II service is allowed under the current safety policy.
pub fn is_service_allowed(service: u8) -> bool {
    ALLOWED_SERVICES.contains(&service)
}

/// Check an outgoing frame before it hits the bus.
///
/// Only broadcast OBD-II requests (data[0] = 0x01–0x07 = length byte) are
/// inspected. ISO-TP flow control frames (0x30) go to physical IDs and are
/// not service requests.
pub fn check_frame(frame: &CanFrame) -> CanResult<()> {
    if frame.id == OBD_REQUEST_ID && frame.data.len() >= 2 && (1..=7).contains(&frame.data[0]) {
        let service = frame.data[1];
        if !is_service_allowed(service) {
            return Err(CanError::SafetyViolation { service });
        }
    }
    Ok(())
}
