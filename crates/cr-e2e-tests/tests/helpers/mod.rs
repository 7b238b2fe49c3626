//! Shared test harness for E2E integration tests.
//!
//! Wires the real reader, clearer and reporter to a scripted
//! `MockCanInterface`, with console and remote triggers fed through the
//! same channels the binary uses.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;

use cr_agent::report::{ConsoleLog, QueuedPublisher};
use cr_agent::trigger::{KeypressTrigger, RemoteTrigger};
use cr_agent::{Orchestrator, Reporter, RetriggerPolicy};
use cr_canbus::types::{
    MODE_CLEAR_DTCS, MODE_PENDING_DTCS, MODE_PERMANENT_DTCS, MODE_STORED_DTCS,
};
use cr_canbus::{CanFrame, CodeClearer, CodeReader, MockCanInterface};
use cr_protocol::events::CodeEvent;

pub const DEVICE_ID: &str = "carloop-01";

pub type Sink = Reporter<ConsoleLog<Vec<u8>>, QueuedPublisher>;

/// One agent loop on a mock vehicle.
pub struct TestHarness {
    pub bus: Arc<MockCanInterface>,
    pub agent: Orchestrator<CodeReader, CodeClearer, Sink>,
    pub connected: Arc<AtomicBool>,
    keys: mpsc::UnboundedSender<u8>,
    calls: mpsc::UnboundedSender<String>,
    events: mpsc::Receiver<CodeEvent>,
}

impl TestHarness {
    /// Connected agent on a silent bus (ignition off).
    pub fn new() -> Self {
        Self::with_policy(RetriggerPolicy::Restart)
    }

    pub fn with_policy(policy: RetriggerPolicy) -> Self {
        let bus = Arc::new(MockCanInterface::new());
        let connected = Arc::new(AtomicBool::new(true));
        let (events_tx, events) = mpsc::channel(64);
        let (keys, keys_rx) = mpsc::unbounded_channel();
        let (calls, calls_rx) = mpsc::unbounded_channel();

        let sink = Reporter::new(
            ConsoleLog::new(Vec::new()),
            QueuedPublisher::new(events_tx, connected.clone()),
        );
        let mut agent = Orchestrator::new(
            CodeReader::new(Duration::ZERO),
            CodeClearer::new(Duration::ZERO),
            sink,
            policy,
        )
        .with_trigger(KeypressTrigger::new(keys_rx))
        .with_trigger(RemoteTrigger::new(calls_rx));
        agent.begin(bus.clone());

        Self {
            bus,
            agent,
            connected,
            keys,
            calls,
            events,
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Relaxed);
    }

    /// Type a key on the console.
    pub fn press(&self, key: u8) {
        self.keys.send(key).unwrap();
    }

    /// Invoke a remote function by name.
    pub fn call(&self, function: &str) {
        self.calls.send(function.to_string()).unwrap();
    }

    pub fn tick(&mut self, n: usize) {
        for _ in 0..n {
            self.agent.tick();
        }
    }

    /// Everything written to the text log so far, one entry per line.
    pub fn console(&self) -> Vec<String> {
        let bytes = self.agent.sink().log().get_ref();
        String::from_utf8_lossy(bytes)
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Drain the events queued for publishing.
    pub fn take_events(&mut self) -> Vec<CodeEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }
}

/// Single-frame positive response from the engine ECU.
pub fn engine_frame(data: &[u8]) -> CanFrame {
    let mut bytes = data.to_vec();
    bytes.resize(8, 0);
    CanFrame::new(0x7E8, bytes)
}

/// Script a vehicle with one stored, one pending and one cleared code:
/// P0415, P0010 and U0300.
pub fn script_vehicle_with_codes(bus: &MockCanInterface) {
    bus.reply_to(
        MODE_STORED_DTCS,
        vec![engine_frame(&[0x04, 0x43, 0x01, 0x04, 0x15])],
    );
    bus.reply_to(
        MODE_PENDING_DTCS,
        vec![engine_frame(&[0x04, 0x47, 0x01, 0x00, 0x10])],
    );
    bus.reply_to(
        MODE_PERMANENT_DTCS,
        vec![engine_frame(&[0x04, 0x4A, 0x01, 0xC3, 0x00])],
    );
}

/// Script a healthy vehicle: every service answers with zero codes.
pub fn script_vehicle_without_codes(bus: &MockCanInterface) {
    bus.reply_to(MODE_STORED_DTCS, vec![engine_frame(&[0x02, 0x43, 0x00])]);
    bus.reply_to(MODE_PENDING_DTCS, vec![engine_frame(&[0x02, 0x47, 0x00])]);
    bus.reply_to(MODE_PERMANENT_DTCS, vec![engine_frame(&[0x02, 0x4A, 0x00])]);
}

/// Script the engine ECU to confirm a clear request.
pub fn script_clear_confirmation(bus: &MockCanInterface) {
    bus.reply_to(MODE_CLEAR_DTCS, vec![engine_frame(&[0x01, 0x44])]);
}
