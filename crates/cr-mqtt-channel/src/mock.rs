//! In-memory `Channel` for tests: records what the agent publishes and
//! which call filters it subscribes to.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use rumqttc::QoS;

use cr_protocol::events::{CodeEvent, EventEnvelope};

use crate::channel::Channel;
use crate::error::{MqttError, MqttResult};

/// One recorded publish.
#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

#[derive(Default)]
pub struct MockChannel {
    published: Mutex<Vec<PublishedMessage>>,
    filters: Mutex<Vec<String>>,
    fail_publishes: AtomicBool,
}

impl MockChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent publishes fail (or succeed again).
    pub fn set_fail_publishes(&self, fail: bool) {
        self.fail_publishes.store(fail, Ordering::SeqCst);
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published.lock().unwrap().clone()
    }

    pub fn last_published(&self) -> Option<PublishedMessage> {
        self.published.lock().unwrap().last().cloned()
    }

    /// Published code events, decoded from their JSON envelopes. Anything
    /// that is not an envelope is skipped.
    pub fn published_events(&self) -> Vec<CodeEvent> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .filter_map(|m| serde_json::from_slice::<EventEnvelope>(&m.payload).ok())
            .filter_map(|env| env.to_event())
            .collect()
    }

    /// Number of times `filter` was subscribed.
    pub fn subscription_count(&self, filter: &str) -> usize {
        self.filters
            .lock()
            .unwrap()
            .iter()
            .filter(|f| f.as_str() == filter)
            .count()
    }
}

#[async_trait]
impl Channel for MockChannel {
    async fn publish(&self, topic: &str, payload: &[u8], _qos: QoS) -> MqttResult<()> {
        if self.fail_publishes.load(Ordering::SeqCst) {
            return Err(MqttError::Publish("broker unreachable".into()));
        }
        self.published.lock().unwrap().push(PublishedMessage {
            topic: topic.to_string(),
            payload: payload.to_vec(),
        });
        Ok(())
    }

    async fn subscribe(&self, filter: &str, _qos: QoS) -> MqttResult<()> {
        self.filters.lock().unwrap().push(filter.to_string());
        Ok(())
    }
}
