//! MQTT topic builders and parsers for the device topic hierarchy.
//!
//! Topic structure:
//! ```text
//! carloop/{device_id}/event/codes/{start,clear,result,error,cleared}
//! carloop/{device_id}/call/{readCodes,clearCodes}
//! ```

use crate::events::CodeEvent;

const PREFIX: &str = "carloop";

// ─── Event topics ───

pub fn event(device_id: &str, event: &CodeEvent) -> String {
    format!("{PREFIX}/{device_id}/event/{}", event.name())
}

// ─── Remote function topics ───

/// Subscribe to all remote function invocations for a device.
pub fn device_calls(device_id: &str) -> String {
    format!("{PREFIX}/{device_id}/call/+")
}

// ─── Topic parsing ───

/// Parsed MQTT topic components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTopic {
    pub device_id: String,
    pub category: String,
    /// Everything after the category, e.g. `codes/result` or `readCodes`.
    pub name: String,
}

/// Parse a topic string into its components.
/// Returns `None` if the topic doesn't match the expected format.
pub fn parse_topic(topic: &str) -> Option<ParsedTopic> {
    let mut parts = topic.splitn(4, '/');

    if parts.next() != Some(PREFIX) {
        return None;
    }
    let device_id = parts.next().filter(|s| !s.is_empty())?;
    let category = parts.next().filter(|s| !s.is_empty())?;
    let name = parts.next().filter(|s| !s.is_empty())?;

    Some(ParsedTopic {
        device_id: device_id.to_string(),
        category: category.to_string(),
        name: name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_topics() {
        assert_eq!(
            event("carloop-01", &CodeEvent::Result("P0415s".into())),
            "carloop/carloop-01/event/codes/result"
        );
        assert_eq!(
            event("carloop-01", &CodeEvent::Cleared),
            "carloop/carloop-01/event/codes/cleared"
        );
    }

    #[test]
    fn call_topics() {
        assert_eq!(device_calls("carloop-01"), "carloop/carloop-01/call/+");
    }

    #[test]
    fn parse_call_topic() {
        let parsed = parse_topic("carloop/carloop-01/call/clearCodes").unwrap();
        assert_eq!(parsed.device_id, "carloop-01");
        assert_eq!(parsed.category, "call");
        assert_eq!(parsed.name, "clearCodes");
    }

    #[test]
    fn parse_event_topic_keeps_slash_in_name() {
        let parsed = parse_topic("carloop/carloop-01/event/codes/error").unwrap();
        assert_eq!(parsed.category, "event");
        assert_eq!(parsed.name, "codes/error");
    }

    #[test]
    fn parse_rejects_foreign_topics() {
        assert!(parse_topic("fleet/a/b/c/d").is_none());
        assert!(parse_topic("carloop/carloop-01/call").is_none());
        assert!(parse_topic("carloop/carloop-01/call/").is_none());
    }
}
