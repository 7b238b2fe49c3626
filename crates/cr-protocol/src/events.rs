//! Reporting events published for each trigger and completion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One structured event emitted by the code reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeEvent {
    /// `codes/start`: a read was started.
    Start,
    /// `codes/clear`: a clear was started.
    Clear,
    /// `codes/result`: a read finished; payload is the canonical code list.
    Result(String),
    /// `codes/error`: a read or clear finished with no usable response.
    Error,
    /// `codes/cleared`: a clear finished successfully.
    Cleared,
}

impl CodeEvent {
    pub const START: &'static str = "codes/start";
    pub const CLEAR: &'static str = "codes/clear";
    pub const RESULT: &'static str = "codes/result";
    pub const ERROR: &'static str = "codes/error";
    pub const CLEARED: &'static str = "codes/cleared";

    /// Event name as it appears on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            CodeEvent::Start => Self::START,
            CodeEvent::Clear => Self::CLEAR,
            CodeEvent::Result(_) => Self::RESULT,
            CodeEvent::Error => Self::ERROR,
            CodeEvent::Cleared => Self::CLEARED,
        }
    }

    /// Event payload. Only `codes/result` carries one (possibly empty).
    pub fn payload(&self) -> Option<&str> {
        match self {
            CodeEvent::Result(codes) => Some(codes),
            _ => None,
        }
    }
}

/// JSON envelope wrapping a `CodeEvent` for the remote channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Event name, e.g. `codes/result`.
    pub event: String,
    /// Event payload, absent for payload-less events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    pub device_id: String,
    pub published_at: DateTime<Utc>,
}

impl EventEnvelope {
    pub fn new(event: &CodeEvent, device_id: impl Into<String>) -> Self {
        Self {
            event: event.name().to_string(),
            data: event.payload().map(str::to_string),
            device_id: device_id.into(),
            published_at: Utc::now(),
        }
    }

    /// Rebuild the event from its wire form. Unknown names yield `None`.
    pub fn to_event(&self) -> Option<CodeEvent> {
        match self.event.as_str() {
            CodeEvent::START => Some(CodeEvent::Start),
            CodeEvent::CLEAR => Some(CodeEvent::Clear),
            CodeEvent::RESULT => Some(CodeEvent::Result(self.data.clone().unwrap_or_default())),
            CodeEvent::ERROR => Some(CodeEvent::Error),
            CodeEvent::CLEARED => Some(CodeEvent::Cleared),
            _ => None,
        }
    }
}
