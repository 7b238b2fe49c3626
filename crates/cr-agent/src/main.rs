//! Carloop code reader agent: reads and clears OBD-II trouble codes on
//! request from the console or over MQTT.
//!
//! The diagnostic loop is synchronous and ticked from a tokio interval.
//! MQTT, stdin and the event publisher run beside it as tasks.

use std::io::Read;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing_subscriber::EnvFilter;

use cr_agent::config::AgentConfig;
use cr_agent::mqtt_loop;
use cr_agent::report::{ConsoleLog, Offline, QueuedPublisher};
use cr_agent::trigger::{KeypressTrigger, RemoteTrigger};
use cr_agent::{Orchestrator, Reporter, ReportingSink};
use cr_canbus::{CanInterface, CodeClearer, CodeReader, MockCanInterface};
use cr_mqtt_channel::MqttChannel;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "cr-agent starting");

    // ── Load config ─────────────────────────────────────────────
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/etc/carloop/agent.toml".to_string());

    let config = AgentConfig::from_file(&config_path)?;
    tracing::info!(
        device_id = %config.device_id,
        retrigger = ?config.operations.retrigger,
        "config loaded"
    );

    // ── CAN bus ─────────────────────────────────────────────────
    let bus = open_bus(config.can_interface.as_deref())?;

    // ── Console triggers ────────────────────────────────────────
    let (keys_tx, keys_rx) = mpsc::unbounded_channel();
    spawn_stdin_reader(keys_tx);
    let keys = KeypressTrigger::new(keys_rx);

    // ── Remote link ─────────────────────────────────────────────
    let (calls_tx, calls_rx) = mpsc::unbounded_channel();
    let remote = RemoteTrigger::new(calls_rx);

    match config.mqtt.clone() {
        Some(mqtt) => {
            let (channel, eventloop) = MqttChannel::new(&mqtt, config.device_id.clone())?;
            let channel = Arc::new(channel);
            tracing::info!(broker = %mqtt.broker_host, "MQTT channel created");

            let connected = Arc::new(AtomicBool::new(false));
            let (events_tx, events_rx) = mpsc::channel(mqtt_loop::EVENT_QUEUE_DEPTH);

            tokio::spawn(mqtt_loop::run(
                eventloop,
                channel.clone(),
                connected.clone(),
                calls_tx,
                config.device_id.clone(),
            ));
            tokio::spawn(async move {
                let device_id = channel.device_id().to_string();
                mqtt_loop::publish_events(channel.as_ref(), &device_id, events_rx).await;
            });

            let sink = Reporter::new(
                ConsoleLog::stdout(),
                QueuedPublisher::new(events_tx, connected),
            );
            run_loop(&config, bus, sink, keys, remote).await;
        }
        None => {
            tracing::info!("no [mqtt] section, event channel disabled");
            drop(calls_tx);
            let sink = Reporter::new(ConsoleLog::stdout(), Offline);
            run_loop(&config, bus, sink, keys, remote).await;
        }
    }

    tracing::info!("cr-agent stopped");
    Ok(())
}

/// Tick the orchestrator until a shutdown signal arrives.
async fn run_loop<S: ReportingSink>(
    config: &AgentConfig,
    bus: Arc<dyn CanInterface>,
    sink: S,
    keys: KeypressTrigger,
    remote: RemoteTrigger,
) {
    let timeout = config.response_timeout();
    let mut orchestrator = Orchestrator::new(
        CodeReader::new(timeout),
        CodeClearer::new(timeout),
        sink,
        config.operations.retrigger,
    )
    .with_trigger(keys)
    .with_trigger(remote);
    orchestrator.begin(bus);

    let mut ticker = tokio::time::interval(config.tick_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        tick_ms = config.tick_interval_ms,
        "cr-agent ready, press 'r' to read codes or 'c' to clear"
    );

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => orchestrator.tick(),
            _ = &mut shutdown => {
                tracing::info!("shutdown signal received");
                break;
            }
        }
    }
}

fn open_bus(interface: Option<&str>) -> anyhow::Result<Arc<dyn CanInterface>> {
    match interface {
        #[cfg(target_os = "linux")]
        Some(name) => {
            let socket = cr_canbus::SocketCanInterface::new(name)?;
            tracing::info!(interface = name, "CAN interface opened");
            Ok(Arc::new(socket))
        }
        #[cfg(not(target_os = "linux"))]
        Some(name) => {
            tracing::warn!(interface = name, "SocketCAN unavailable on this platform, using mock bus");
            Ok(Arc::new(MockCanInterface::new()))
        }
        None => {
            tracing::info!("no CAN interface configured, using silent mock bus");
            Ok(Arc::new(MockCanInterface::new()))
        }
    }
}

/// Forward raw stdin bytes to the keypress trigger.
///
/// Blocking reads live on their own thread so the loop never waits on input.
fn spawn_stdin_reader(tx: mpsc::UnboundedSender<u8>) {
    std::thread::spawn(move || {
        for byte in std::io::stdin().lock().bytes() {
            match byte {
                Ok(b) => {
                    if tx.send(b).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "stdin read failed");
                    break;
                }
            }
        }
        tracing::debug!("stdin closed");
    });
}
