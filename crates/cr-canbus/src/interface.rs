//! CAN bus interface abstraction.
//!
//! `CanInterface` trait with `send_frame`/`try_recv_frame`. Both calls return
//! immediately so the agent loop never blocks on the bus. Two impls:
//! - `SocketCanInterface`: Linux-only, wraps a non-blocking `socketcan::CanSocket`
//! - `MockCanInterface`: all platforms, scripted responses (in `mock.rs`)
//!
//! Safety enforcement happens at the interface level: `send_frame` rejects
//! disallowed OBD-II services before any bytes hit the bus.

use crate::error::CanResult;
use crate::types::{CanFrame, OBD_RESPONSE_ID_MAX, OBD_RESPONSE_ID_MIN, PHYSICAL_ID_OFFSET};

/// Upper bound on frames dropped by one `discard_pending` call.
const DISCARD_LIMIT: usize = 256;

/// Trait for non-blocking CAN bus interface implementations.
///
/// Implementations must be usable through a shared reference. To give
/// several operations the same bus, wrap it in a
/// [`SharedBus`](crate::shared::SharedBus).
pub trait CanInterface: Send + Sync {
    /// Queue a CAN frame for transmission. Enforces the service whitelist.
    fn send_frame(&self, frame: &CanFrame) -> CanResult<()>;

    /// Take the next received frame, or `None` if nothing is waiting.
    fn try_recv_frame(&self) -> CanResult<Option<CanFrame>>;

    /// Drop frames already waiting, e.g. answers to an abandoned request.
    /// Returns how many were dropped.
    fn discard_pending(&self) -> CanResult<usize> {
        let mut dropped = 0;
        while dropped < DISCARD_LIMIT && self.try_recv_frame()?.is_some() {
            dropped += 1;
        }
        Ok(dropped)
    }
}

/// Check if a CAN ID is an OBD-II response (0x7E8–0x7EF).
pub fn is_obd_response(id: u32) -> bool {
    (OBD_RESPONSE_ID_MIN..=OBD_RESPONSE_ID_MAX).contains(&id)
}

/// Physical request ID of the ECU answering on `response_id` (0x7E8 → 0x7E0).
pub fn physical_request_id(response_id: u32) -> u32 {
    response_id - PHYSICAL_ID_OFFSET
}

// ── SocketCAN (Linux-only) ──────────────────────────────────────

#[cfg(target_os = "linux")]
mod socket {
    use std::io::ErrorKind;
    use std::sync::Mutex;

    use socketcan::{CanSocket, EmbeddedFrame, Frame, Socket, StandardId};

    use super::CanInterface;
    use crate::error::{CanError, CanResult};
    use crate::safety;
    use crate::types::CanFrame;

    /// SocketCAN interface for Linux hosts, opened in non-blocking mode.
    pub struct SocketCanInterface {
        socket: Mutex<CanSocket>,
    }

    impl SocketCanInterface {
        pub fn new(interface_name: &str) -> CanResult<Self> {
            let socket = CanSocket::open(interface_name).map_err(|e| {
                CanError::Interface(format!("failed to open '{interface_name}': {e}"))
            })?;
            socket
                .set_nonblocking(true)
                .map_err(|e| CanError::Interface(format!("set_nonblocking: {e}")))?;

            tracing::info!(interface = interface_name, "SocketCAN interface opened");
            Ok(Self {
                socket: Mutex::new(socket),
            })
        }

        fn socket(&self) -> CanResult<std::sync::MutexGuard<'_, CanSocket>> {
            self.socket
                .lock()
                .map_err(|_| CanError::Interface("socket lock poisoned".into()))
        }
    }

    impl CanInterface for SocketCanInterface {
        fn send_frame(&self, frame: &CanFrame) -> CanResult<()> {
            safety::check_frame(frame)?;

            let id = u16::try_from(frame.id)
                .ok()
                .and_then(StandardId::new)
                .ok_or_else(|| CanError::Interface(format!("invalid 11-bit ID 0x{:X}", frame.id)))?;
            let raw = socketcan::CanFrame::new(id, &frame.data).ok_or_else(|| {
                CanError::Interface(format!("payload too long: {} bytes", frame.data.len()))
            })?;

            match self.socket()?.write_frame(&raw) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    Err(CanError::Interface("transmit queue full".into()))
                }
                Err(e) => Err(CanError::Interface(format!("write: {e}"))),
            }
        }

        fn try_recv_frame(&self) -> CanResult<Option<CanFrame>> {
            match self.socket()?.read_frame() {
                Ok(raw) => Ok(Some(CanFrame::new(raw.raw_id(), raw.data().to_vec()))),
                Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
                Err(e) => Err(CanError::Interface(format!("read: {e}"))),
            }
        }
    }
}

#[cfg(target_os = "linux")]
pub use socket::SocketCanInterface;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn obd_response_id_range() {
        assert!(is_obd_response(0x7E8));
        assert!(is_obd_response(0x7EF));
        assert!(!is_obd_response(0x7E7));
        assert!(!is_obd_response(0x7F0));
        assert!(!is_obd_response(0x7DF)); // request ID, not response
    }

    #[test]
    fn physical_ids() {
        assert_eq!(physical_request_id(0x7E8), 0x7E0);
        assert_eq!(physical_request_id(0x7EF), 0x7E7);
    }
}
