pub mod dtc;
pub mod encoding;
pub mod events;
pub mod topics;

pub use dtc::*;
pub use encoding::{CodeParseError, decode_codes, encode_codes};
pub use events::*;
