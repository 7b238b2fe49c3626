//! MQTT channel: async client for the remote command/event link.
//!
//! Wraps `rumqttc::AsyncClient` with typed helpers for publishing code
//! events and subscribing to remote function calls.

use async_trait::async_trait;
use rumqttc::{AsyncClient, EventLoop, MqttOptions, QoS};

use cr_protocol::events::{CodeEvent, EventEnvelope};
use cr_protocol::topics;

use crate::config::MqttConfig;
use crate::error::{MqttError, MqttResult};
use crate::tls;

// ── Channel trait ─────────────────────────────────────────────

/// Abstraction for MQTT message publishing and subscribing.
///
/// Enables mocking in tests without a real MQTT broker.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Publish a raw payload to a topic.
    async fn publish(&self, topic: &str, payload: &[u8], qos: QoS) -> MqttResult<()>;

    /// Subscribe to a topic filter.
    async fn subscribe(&self, filter: &str, qos: QoS) -> MqttResult<()>;
}

/// Publish a code event as a JSON envelope on the device's event topic.
pub async fn publish_event<C: Channel + ?Sized>(
    channel: &C,
    device_id: &str,
    event: &CodeEvent,
) -> MqttResult<()> {
    let topic = topics::event(device_id, event);
    let envelope = EventEnvelope::new(event, device_id);
    let bytes =
        serde_json::to_vec(&envelope).map_err(|e| MqttError::Serialization(e.to_string()))?;
    channel.publish(&topic, &bytes, QoS::AtLeastOnce).await
}

/// Subscribe to remote function calls addressed to `device_id`.
///
/// Must be repeated after every reconnect: sessions are clean, so the
/// broker forgets subscriptions when the link drops.
pub async fn subscribe_calls<C: Channel + ?Sized>(channel: &C, device_id: &str) -> MqttResult<()> {
    channel
        .subscribe(&topics::device_calls(device_id), QoS::AtLeastOnce)
        .await
}

// ── MqttChannel ───────────────────────────────────────────────

/// MQTT channel to the broker.
///
/// Owns the `AsyncClient` for publishing/subscribing. The `EventLoop`
/// is returned separately from `new()`: the caller must drive it in a
/// spawned task via `eventloop.poll()`.
pub struct MqttChannel {
    client: AsyncClient,
    device_id: String,
}

impl MqttChannel {
    /// Create a new MQTT channel, with mTLS unless `use_tls` is off.
    ///
    /// Returns `(channel, event_loop)`.
    pub fn new(
        config: &MqttConfig,
        device_id: impl Into<String>,
    ) -> MqttResult<(Self, EventLoop)> {
        let mut options =
            MqttOptions::new(&config.client_id, &config.broker_host, config.broker_port);
        options.set_keep_alive(std::time::Duration::from_secs(config.keepalive_secs.into()));

        if config.use_tls {
            options.set_transport(tls::load_tls_transport(config)?);
        } else {
            tracing::info!("MQTT plaintext mode (no TLS)");
        }

        let (client, eventloop) = AsyncClient::new(options, 64);

        Ok((
            Self {
                client,
                device_id: device_id.into(),
            },
            eventloop,
        ))
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

}

#[async_trait]
impl Channel for MqttChannel {
    async fn publish(&self, topic: &str, payload: &[u8], qos: QoS) -> MqttResult<()> {
        self.client
            .publish(topic, qos, false, payload)
            .await
            .map_err(|e| MqttError::Publish(e.to_string()))
    }

    async fn subscribe(&self, filter: &str, qos: QoS) -> MqttResult<()> {
        self.client
            .subscribe(filter, qos)
            .await
            .map_err(|e| MqttError::Subscribe(e.to_string()))
    }
}
