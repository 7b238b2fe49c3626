//! Agent configuration, loadable from TOML.

use std::time::Duration;

use serde::Deserialize;
use cr_mqtt_channel::MqttConfig;

use crate::orchestrator::RetriggerPolicy;

/// Top-level configuration for the code reader agent.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Device identifier, used in MQTT topics and event envelopes.
    pub device_id: String,
    /// CAN interface name (e.g., "can0"). None runs against a silent mock bus.
    #[serde(default)]
    pub can_interface: Option<String>,
    /// Polling loop period in milliseconds.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    #[serde(default)]
    pub operations: OperationsConfig,
    /// Remote link. None keeps the event channel permanently disconnected.
    #[serde(default)]
    pub mqtt: Option<MqttConfig>,
}

/// Per-operation tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct OperationsConfig {
    /// How long each request step waits for ECU responses.
    #[serde(default = "default_response_timeout")]
    pub response_timeout_ms: u64,
    #[serde(default)]
    pub retrigger: RetriggerPolicy,
}

impl Default for OperationsConfig {
    fn default() -> Self {
        Self {
            response_timeout_ms: default_response_timeout(),
            retrigger: RetriggerPolicy::default(),
        }
    }
}

fn default_tick_interval() -> u64 {
    5
}

fn default_response_timeout() -> u64 {
    500
}

impl AgentConfig {
    /// Load config from a TOML file path.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.operations.response_timeout_ms)
    }
}
