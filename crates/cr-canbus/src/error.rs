//! CAN bus error types.

use thiserror::Error;

/// Errors that can occur during CAN bus operations.
#[derive(Debug, Error)]
pub enum CanError {
    #[error("CAN interface error: {0}")]
    Interface(String),

    #[error("Safety violation: service 0x{service:02X} is not allowed")]
    SafetyViolation { service: u8 },

    #[error("ISO-TP reassembly error: {0}")]
    IsoTp(String),
}

/// Convenience alias for CAN bus results.
pub type CanResult<T> = Result<T, CanError>;
