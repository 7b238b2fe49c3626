//! Polled diagnostic operation contract shared by the reader and the clearer.

use std::sync::Arc;

use cr_protocol::dtc::DiagnosticCode;

use crate::interface::CanInterface;

/// Lifecycle of one diagnostic operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    /// Never started.
    Idle,
    Running,
    DoneSuccess,
    /// Finished without a usable response (ignition off, adapter unplugged).
    DoneError,
}

impl OperationState {
    pub fn is_done(self) -> bool {
        !matches!(self, OperationState::Running)
    }
}

/// A long-running bus operation driven by repeated, non-blocking polls.
///
/// None of these methods may block: all waiting happens across many
/// `process()` calls, and timeouts are handled inside the operation.
pub trait DiagnosticOperation {
    /// Bind the bus. Must be called before `start()`.
    fn begin(&mut self, bus: Arc<dyn CanInterface>);

    /// Begin a new run, discarding any previous result or error. Calling
    /// this while running restarts the run.
    fn start(&mut self);

    /// Advance the protocol by a bounded amount of work. No-op unless running.
    fn process(&mut self);

    fn state(&self) -> OperationState;

    /// True when idle (never started) or finished.
    fn done(&self) -> bool {
        self.state().is_done()
    }

    /// True iff the last run finished in error. Meaningful once `done()`.
    fn error(&self) -> bool {
        self.state() == OperationState::DoneError
    }
}

/// An operation that produces trouble codes.
pub trait CodeSource: DiagnosticOperation {
    /// Codes in discovery order. Valid when `done()` and not `error()`;
    /// invalidated by the next `start()`.
    fn codes(&self) -> &[DiagnosticCode];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn done_states() {
        assert!(OperationState::Idle.is_done());
        assert!(!OperationState::Running.is_done());
        assert!(OperationState::DoneSuccess.is_done());
        assert!(OperationState::DoneError.is_done());
    }
}
