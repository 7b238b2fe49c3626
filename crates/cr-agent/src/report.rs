//! Reporting sink: a text log and a structured event channel.
//!
//! Both outputs are best-effort. The text log is always attempted first;
//! the event is published only while the remote link is up. Failures are
//! logged through `tracing` and never reach the loop.

use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tokio::sync::mpsc;

use cr_protocol::events::CodeEvent;

/// What to tell the user and the remote side about one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    /// Human-readable lines, in output order.
    pub lines: Vec<String>,
    pub event: CodeEvent,
}

impl Report {
    pub fn new(lines: Vec<String>, event: CodeEvent) -> Self {
        Self { lines, event }
    }
}

/// Destination for reports produced by the orchestrator.
pub trait ReportingSink {
    fn report(&mut self, report: &Report);
}

// ── Sub-sinks ─────────────────────────────────────────────────

/// Line-oriented text log (the serial console on a device).
pub trait TextLog {
    fn write_line(&mut self, line: &str) -> io::Result<()>;
}

/// Errors from the structured event channel.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("event queue full")]
    QueueFull,

    #[error("event publisher stopped")]
    Closed,
}

/// Structured event channel.
pub trait EventPublisher {
    /// Whether a remote connection is currently established.
    fn is_connected(&self) -> bool;

    /// Hand an event off for publishing without blocking.
    fn publish(&mut self, event: &CodeEvent) -> Result<(), PublishError>;
}

/// Writes each line to an `io::Write`, flushing after every line.
pub struct ConsoleLog<W: Write> {
    out: W,
}

impl<W: Write> ConsoleLog<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl ConsoleLog<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> TextLog for ConsoleLog<W> {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.out, "{line}")?;
        self.out.flush()
    }
}

/// Queues events for the MQTT publisher task.
///
/// `try_send` never waits: a full queue drops the event.
pub struct QueuedPublisher {
    tx: mpsc::Sender<CodeEvent>,
    connected: Arc<AtomicBool>,
}

impl QueuedPublisher {
    pub fn new(tx: mpsc::Sender<CodeEvent>, connected: Arc<AtomicBool>) -> Self {
        Self { tx, connected }
    }
}

impl EventPublisher for QueuedPublisher {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    fn publish(&mut self, event: &CodeEvent) -> Result<(), PublishError> {
        self.tx.try_send(event.clone()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => PublishError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => PublishError::Closed,
        })
    }
}

/// Publisher for builds without a remote link. Never connected.
#[derive(Debug, Default)]
pub struct Offline;

impl EventPublisher for Offline {
    fn is_connected(&self) -> bool {
        false
    }

    fn publish(&mut self, _event: &CodeEvent) -> Result<(), PublishError> {
        Err(PublishError::Closed)
    }
}

// ── Reporter ──────────────────────────────────────────────────

/// Fans a report out to the text log, then to the event channel.
pub struct Reporter<L: TextLog, P: EventPublisher> {
    log: L,
    publisher: P,
}

impl<L: TextLog, P: EventPublisher> Reporter<L, P> {
    pub fn new(log: L, publisher: P) -> Self {
        Self { log, publisher }
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }
}

impl<L: TextLog, P: EventPublisher> ReportingSink for Reporter<L, P> {
    fn report(&mut self, report: &Report) {
        for line in &report.lines {
            if let Err(e) = self.log.write_line(line) {
                tracing::warn!(error = %e, "text log write failed");
            }
        }

        if !self.publisher.is_connected() {
            tracing::trace!(event = report.event.name(), "not connected, event skipped");
            return;
        }
        match self.publisher.publish(&report.event) {
            Ok(()) => tracing::debug!(event = report.event.name(), "event queued"),
            Err(e) => tracing::debug!(error = %e, event = report.event.name(), "event dropped"),
        }
    }
}
