//! MQTT remote channel for the code reader.
//!
//! Provides a typed MQTT abstraction for the agent:
//! - `Channel` trait for publish/subscribe (mockable in tests)
//! - `MqttChannel` with optional mTLS for production
//! - `MockChannel` for testing without a broker
//! - `IncomingMessage` classification for remote function calls

pub mod channel;
pub mod config;
pub mod error;
pub mod handler;
pub mod mock;
pub mod tls;

// Re-exports for convenience.
pub use channel::{Channel, MqttChannel, publish_event, subscribe_calls};
pub use config::MqttConfig;
pub use error::{MqttError, MqttResult};
pub use handler::{IncomingMessage, classify};
pub use mock::MockChannel;
