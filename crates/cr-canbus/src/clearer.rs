//! Trouble code clearer (service 0x04).
//!
//! Broadcasts one clear request and collects confirmations until the
//! response window closes. Succeeds if at least one ECU confirmed.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::interface::CanInterface;
use crate::obd::{self, IsoTpReceiver, ObdResponse};
use crate::operation::{DiagnosticOperation, OperationState};
use crate::types::MODE_CLEAR_DTCS;

/// Clears stored and pending codes on all ECUs.
pub struct CodeClearer {
    bus: Option<Arc<dyn CanInterface>>,
    timeout: Duration,
    state: OperationState,
    deadline: Instant,
    confirmed: usize,
    rejected: usize,
    /// ECUs that already confirmed or rejected this run.
    responded: Vec<u32>,
    rx: IsoTpReceiver,
}

impl CodeClearer {
    pub fn new(timeout: Duration) -> Self {
        Self {
            bus: None,
            timeout,
            state: OperationState::Idle,
            deadline: Instant::now(),
            confirmed: 0,
            rejected: 0,
            responded: Vec::new(),
            rx: IsoTpReceiver::new(&[MODE_CLEAR_DTCS]),
        }
    }

    fn finish(&mut self, state: OperationState) {
        self.state = state;
        self.rx.clear();
        tracing::debug!(
            ?state,
            confirmed = self.confirmed,
            rejected = self.rejected,
            "code clearer finished"
        );
    }
}

impl Default for CodeClearer {
    fn default() -> Self {
        Self::new(obd::DEFAULT_TIMEOUT)
    }
}

impl DiagnosticOperation for CodeClearer {
    fn begin(&mut self, bus: Arc<dyn CanInterface>) {
        self.bus = Some(bus);
    }

    fn start(&mut self) {
        self.confirmed = 0;
        self.rejected = 0;
        self.responded.clear();
        self.rx.clear();
        self.state = OperationState::Running;
        self.deadline = Instant::now() + self.timeout;

        let Some(bus) = self.bus.clone() else {
            tracing::warn!("code clearer started without a bus");
            self.finish(OperationState::DoneError);
            return;
        };
        match bus.discard_pending() {
            Ok(0) => {}
            Ok(n) => tracing::debug!(dropped = n, "discarded stale frames before clear"),
            Err(e) => tracing::warn!(error = %e, "failed to drain stale frames"),
        }
        if let Err(e) = bus.send_frame(&obd::build_request(MODE_CLEAR_DTCS)) {
            tracing::warn!(error = %e, "failed to send clear request");
            self.finish(OperationState::DoneError);
        }
    }

    fn process(&mut self) {
        if self.state != OperationState::Running {
            return;
        }
        let Some(bus) = self.bus.clone() else {
            self.finish(OperationState::DoneError);
            return;
        };

        for _ in 0..obd::MAX_FRAMES_PER_POLL {
            let frame = match bus.try_recv_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "CAN receive failed while clearing codes");
                    self.finish(OperationState::DoneError);
                    return;
                }
            };
            let (ecu, payload) = match self.rx.feed(bus.as_ref(), &frame) {
                Ok(Some(done)) => done,
                Ok(None) => continue,
                Err(e) => {
                    tracing::debug!(error = %e, id = frame.id, "dropping malformed response");
                    continue;
                }
            };
            let Some(response) =
                obd::classify_response(&payload).filter(|r| r.service() == MODE_CLEAR_DTCS)
            else {
                continue;
            };
            if self.responded.contains(&ecu) {
                continue;
            }
            self.responded.push(ecu);
            match response {
                ObdResponse::Positive { .. } => self.confirmed += 1,
                ObdResponse::Negative { nrc, .. } => {
                    // 0x22: conditions not correct (engine running).
                    tracing::debug!(ecu, nrc, "clear request rejected");
                    self.rejected += 1;
                }
            }
        }

        if Instant::now() < self.deadline {
            return;
        }
        if self.confirmed > 0 {
            self.finish(OperationState::DoneSuccess);
        } else {
            self.finish(OperationState::DoneError);
        }
    }

    fn state(&self) -> OperationState {
        self.state
    }
}
