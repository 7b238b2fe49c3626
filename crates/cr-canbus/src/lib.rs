//! OBD-II trouble code services over a CAN bus.
//!
//! - `CanInterface`: non-blocking frame transport (SocketCAN or mock)
//! - `SharedBus`: gives every operation its own copy of the receive stream
//! - `DiagnosticOperation`: start/process/done contract polled by the agent loop
//! - `CodeReader`: services 0x03, 0x07 and 0x0A (stored, pending, cleared codes)
//! - `CodeClearer`: service 0x04 (clear codes)

pub mod clearer;
pub mod error;
pub mod interface;
pub mod mock;
pub mod obd;
pub mod operation;
pub mod reader;
pub mod safety;
pub mod shared;
pub mod types;

pub use clearer::CodeClearer;
pub use error::{CanError, CanResult};
pub use interface::CanInterface;
#[cfg(target_os = "linux")]
pub use interface::SocketCanInterface;
pub use mock::MockCanInterface;
pub use operation::{CodeSource, DiagnosticOperation, OperationState};
pub use reader::CodeReader;
pub use shared::{BusPort, SharedBus};
pub use types::CanFrame;
