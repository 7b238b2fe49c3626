//! The polling loop: one `tick()` advances both operations and reports
//! each completion exactly once.
//!
//! Tick order is fixed:
//! 1. poll every trigger source once and dispatch what they yield
//! 2. `process()` the reader, then the clearer
//! 3. reader completion edge → formatted codes report
//! 4. clearer completion edge → success/error report
//!
//! Nothing in a tick blocks. Waiting is expressed as many ticks.

use std::sync::Arc;

use serde::Deserialize;

use cr_canbus::{CanInterface, CodeSource, DiagnosticOperation, SharedBus};

use crate::edge::CompletionEdgeTracker;
use crate::format;
use crate::report::ReportingSink;
use crate::trigger::{Command, TriggerSource};

/// What to do when a command arrives while its operation is running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetriggerPolicy {
    /// Start over; the in-flight run is abandoned and never reported.
    #[default]
    Restart,
    /// Drop the command.
    Ignore,
    /// Run once more after the in-flight run has been reported.
    Queue,
}

/// Drives one reader and one clearer from a single-threaded loop.
pub struct Orchestrator<R, C, S> {
    reader: R,
    clearer: C,
    sink: S,
    reader_edge: CompletionEdgeTracker,
    clearer_edge: CompletionEdgeTracker,
    triggers: Vec<Box<dyn TriggerSource>>,
    policy: RetriggerPolicy,
    read_queued: bool,
    clear_queued: bool,
}

impl<R, C, S> Orchestrator<R, C, S>
where
    R: CodeSource,
    C: DiagnosticOperation,
    S: ReportingSink,
{
    pub fn new(reader: R, clearer: C, sink: S, policy: RetriggerPolicy) -> Self {
        Self {
            reader,
            clearer,
            sink,
            reader_edge: CompletionEdgeTracker::new(),
            clearer_edge: CompletionEdgeTracker::new(),
            triggers: Vec::new(),
            policy,
            read_queued: false,
            clear_queued: false,
        }
    }

    /// Register a trigger source. Sources are polled in registration order.
    pub fn with_trigger(mut self, trigger: impl TriggerSource + 'static) -> Self {
        self.triggers.push(Box::new(trigger));
        self
    }

    /// Give each operation its own port on `bus` so neither consumes the
    /// other's responses.
    pub fn begin(&mut self, bus: Arc<dyn CanInterface>) {
        let shared = SharedBus::new(bus);
        self.reader.begin(Arc::new(shared.port()));
        self.clearer.begin(Arc::new(shared.port()));
    }

    /// Run one iteration of the loop.
    pub fn tick(&mut self) {
        for i in 0..self.triggers.len() {
            let source = self.triggers[i].name();
            if let Some(command) = self.triggers[i].poll() {
                tracing::debug!(source, command = command.name(), "trigger fired");
                self.dispatch(command);
            }
        }

        self.reader.process();
        self.clearer.process();

        if self.reader_edge.observe(self.reader.done()) {
            self.on_read_complete();
        }
        if self.clearer_edge.observe(self.clearer.done()) {
            self.on_clear_complete();
        }
    }

    /// Apply a command. Identical whichever channel it came from.
    pub fn dispatch(&mut self, command: Command) {
        let running = match command {
            Command::ReadCodes => !self.reader.done(),
            Command::ClearCodes => !self.clearer.done(),
        };

        if running {
            match self.policy {
                RetriggerPolicy::Restart => {
                    tracing::info!(command = command.name(), "restarting running operation");
                }
                RetriggerPolicy::Ignore => {
                    tracing::debug!(command = command.name(), "already running, ignored");
                    return;
                }
                RetriggerPolicy::Queue => {
                    tracing::debug!(command = command.name(), "already running, queued");
                    match command {
                        Command::ReadCodes => self.read_queued = true,
                        Command::ClearCodes => self.clear_queued = true,
                    }
                    return;
                }
            }
        }

        match command {
            Command::ReadCodes => self.start_read(),
            Command::ClearCodes => self.start_clear(),
        }
    }

    fn start_read(&mut self) {
        self.sink.report(&format::read_started());
        self.reader.start();
        self.reader_edge.arm();
    }

    fn start_clear(&mut self) {
        self.sink.report(&format::clear_started());
        self.clearer.start();
        self.clearer_edge.arm();
    }

    fn on_read_complete(&mut self) {
        let error = self.reader.error();
        let codes = self.reader.codes();
        tracing::info!(error, codes = codes.len(), "code read finished");

        let report = format::read_finished(error, codes);
        self.sink.report(&report);

        if std::mem::take(&mut self.read_queued) {
            self.start_read();
        }
    }

    fn on_clear_complete(&mut self) {
        let error = self.clearer.error();
        tracing::info!(error, "code clear finished");

        self.sink.report(&format::clear_finished(error));

        if std::mem::take(&mut self.clear_queued) {
            self.start_clear();
        }
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    pub fn clearer(&self) -> &C {
        &self.clearer
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}
