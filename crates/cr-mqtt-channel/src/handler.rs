//! Incoming message classification for the MQTT event loop.
//!
//! Parses raw MQTT publishes into typed `IncomingMessage` variants
//! so the agent can dispatch them without topic string matching.

use rumqttc::Publish;

use cr_protocol::topics;

/// A classified incoming MQTT message.
#[derive(Debug, PartialEq, Eq)]
pub enum IncomingMessage {
    /// Remote function invocation, e.g. `readCodes`. The payload is ignored.
    Call { device_id: String, function: String },
    /// Unrecognized topic.
    Unknown { topic: String },
}

/// Classify a raw MQTT publish into a typed message.
pub fn classify(publish: &Publish) -> IncomingMessage {
    let topic = &publish.topic;

    match topics::parse_topic(topic) {
        Some(parsed) if parsed.category == "call" && !parsed.name.contains('/') => {
            IncomingMessage::Call {
                device_id: parsed.device_id,
                function: parsed.name,
            }
        }
        _ => IncomingMessage::Unknown {
            topic: topic.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rumqttc::QoS;

    fn make_publish(topic: &str, payload: &[u8]) -> Publish {
        let mut publish = Publish::new(topic, QoS::AtLeastOnce, payload);
        publish.pkid = 1;
        publish
    }

    #[test]
    fn classify_call() {
        let publish = make_publish("carloop/carloop-01/call/readCodes", b"");
        assert_eq!(
            classify(&publish),
            IncomingMessage::Call {
                device_id: "carloop-01".into(),
                function: "readCodes".into(),
            }
        );
    }

    #[test]
    fn classify_call_ignores_payload() {
        let publish = make_publish("carloop/carloop-01/call/clearCodes", b"anything");
        assert!(matches!(
            classify(&publish),
            IncomingMessage::Call { ref function, .. } if function == "clearCodes"
        ));
    }

    #[test]
    fn classify_event_is_unknown() {
        // Events are outbound only.
        let publish = make_publish("carloop/carloop-01/event/codes/result", b"{}");
        assert!(matches!(classify(&publish), IncomingMessage::Unknown { .. }));
    }

    #[test]
    fn classify_unknown_topic() {
        let publish = make_publish("some/random/topic", b"data");
        assert!(matches!(classify(&publish), IncomingMessage::Unknown { .. }));
    }

    #[test]
    fn classify_nested_call_is_unknown() {
        let publish = make_publish("carloop/carloop-01/call/readCodes/extra", b"");
        assert!(matches!(classify(&publish), IncomingMessage::Unknown { .. }));
    }
}
