//! Trouble code reader: stored (0x03), pending (0x07) and cleared (0x0A) codes.
//!
//! Each service is one step: broadcast the request, then collect responses
//! from every ECU until the step's response window closes. The run fails
//! only if no ECU answered any of the three requests.

use std::sync::Arc;
use std::time::{Duration, Instant};

use cr_protocol::dtc::{DiagnosticCode, DtcKind};

use crate::interface::CanInterface;
use crate::obd::{self, IsoTpReceiver, ObdResponse};
use crate::operation::{CodeSource, DiagnosticOperation, OperationState};
use crate::types::{MODE_PENDING_DTCS, MODE_PERMANENT_DTCS, MODE_STORED_DTCS};

/// Services queried, in order, with the kind of code each one reports.
const STEPS: [(u8, DtcKind); 3] = [
    (MODE_STORED_DTCS, DtcKind::Stored),
    (MODE_PENDING_DTCS, DtcKind::Pending),
    (MODE_PERMANENT_DTCS, DtcKind::Cleared),
];

const READ_SERVICES: [u8; 3] = [MODE_STORED_DTCS, MODE_PENDING_DTCS, MODE_PERMANENT_DTCS];

/// Reads every kind of trouble code from all ECUs on the bus.
pub struct CodeReader {
    bus: Option<Arc<dyn CanInterface>>,
    timeout: Duration,
    state: OperationState,
    step: usize,
    deadline: Instant,
    answered: bool,
    /// ECUs already heard from in the current step.
    responded: Vec<u32>,
    rx: IsoTpReceiver,
    codes: Vec<DiagnosticCode>,
}

impl CodeReader {
    /// Create a reader that waits `timeout` for responses to each request.
    pub fn new(timeout: Duration) -> Self {
        Self {
            bus: None,
            timeout,
            state: OperationState::Idle,
            step: 0,
            deadline: Instant::now(),
            answered: false,
            responded: Vec::new(),
            rx: IsoTpReceiver::new(&READ_SERVICES),
            codes: Vec::new(),
        }
    }

    fn send_step(&mut self) {
        let Some(bus) = self.bus.clone() else {
            tracing::warn!("code reader started without a bus");
            self.finish(OperationState::DoneError);
            return;
        };
        let (service, _) = STEPS[self.step];
        self.rx.clear();
        self.responded.clear();
        self.deadline = Instant::now() + self.timeout;

        if let Err(e) = bus.send_frame(&obd::build_request(service)) {
            tracing::warn!(error = %e, service, "failed to send trouble code request");
            self.finish(OperationState::DoneError);
            return;
        }
        tracing::debug!(service, "trouble code request sent");
    }

    fn handle_payload(&mut self, ecu: u32, payload: &[u8]) {
        let (service, kind) = STEPS[self.step];
        let Some(response) = obd::classify_response(payload).filter(|r| r.service() == service)
        else {
            return;
        };
        if self.responded.contains(&ecu) {
            tracing::debug!(ecu, service, "duplicate response ignored");
            return;
        }
        self.responded.push(ecu);
        match response {
            ObdResponse::Positive { data, .. } => {
                self.answered = true;
                let found = obd::decode_dtc_data(data, kind);
                tracing::debug!(ecu, service, count = found.len(), "trouble codes received");
                self.codes.extend(found);
            }
            ObdResponse::Negative { nrc, .. } => {
                // The ECU is alive but doesn't support this service.
                self.answered = true;
                tracing::debug!(ecu, service, nrc, "service rejected");
            }
        }
    }

    fn finish(&mut self, state: OperationState) {
        self.state = state;
        self.rx.clear();
        tracing::debug!(?state, codes = self.codes.len(), "code reader finished");
    }
}

impl Default for CodeReader {
    fn default() -> Self {
        Self::new(obd::DEFAULT_TIMEOUT)
    }
}

impl DiagnosticOperation for CodeReader {
    fn begin(&mut self, bus: Arc<dyn CanInterface>) {
        self.bus = Some(bus);
    }

    fn start(&mut self) {
        if let Some(bus) = &self.bus {
            match bus.discard_pending() {
                Ok(0) => {}
                Ok(n) => tracing::debug!(dropped = n, "discarded stale frames before read"),
                Err(e) => tracing::warn!(error = %e, "failed to drain stale frames"),
            }
        }
        self.codes.clear();
        self.answered = false;
        self.step = 0;
        self.state = OperationState::Running;
        self.send_step();
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
                    tracing::warn!(error = %e, "CAN receive failed while reading codes");
                    self.finish(OperationState::DoneError);
                    return;
                }
            };
            match self.rx.feed(bus.as_ref(), &frame) {
                Ok(Some((ecu, payload))) => self.handle_payload(ecu, &payload),
                Ok(None) => {}
                Err(e) => tracing::debug!(error = %e, id = frame.id, "dropping malformed response"),
            }
        }

        if Instant::now() < self.deadline {
            return;
        }
        self.step += 1;
        if self.step < STEPS.len() {
            self.send_step();
        } else if self.answered {
            self.finish(OperationState::DoneSuccess);
        } else {
            self.finish(OperationState::DoneError);
        }
    }

    fn state(&self) -> OperationState {
        self.state
    }
}

impl CodeSource for CodeReader {
    fn codes(&self) -> &[DiagnosticCode] {
        &self.codes
    }
}
