//! OBD-II protocol helpers: request frame builders, response parsing,
//! and push-based ISO-TP multi-frame reassembly.

use std::collections::HashMap;
use std::time::Duration;

use cr_protocol::dtc::{DiagnosticCode, DtcKind};

use crate::error::{CanError, CanResult};
use crate::interface::{CanInterface, is_obd_response, physical_request_id};
use crate::types::*;

// ---------------------------------------------------------------------------
// Request builders
// ---------------------------------------------------------------------------

/// Build a broadcast OBD-II request for a service without PID (0x03, 0x04, 0x07, 0x0A).
pub fn build_request(service: u8) -> CanFrame {
    CanFrame::new(
        OBD_REQUEST_ID,
        vec![0x01, service, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
    )
}

/// ISO-TP Flow Control frame: ContinueToSend, block_size=0, separation_time=0.
const FLOW_CONTROL_CTS: [u8; 8] = [ISOTP_FC << 4, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];

/// Flow Control addressed to the ECU that answered on `response_id`.
pub fn build_flow_control(response_id: u32) -> CanFrame {
    CanFrame::new(physical_request_id(response_id), FLOW_CONTROL_CTS.to_vec())
}

/// Default window to collect ECU responses for one request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

/// Upper bound on frames handled by a single `process()` call.
pub const MAX_FRAMES_PER_POLL: usize = 16;

// ---------------------------------------------------------------------------
// Response classification
// ---------------------------------------------------------------------------

/// A reassembled OBD-II response payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObdResponse<'a> {
    /// Positive response to `service`; `data` excludes the SID byte.
    Positive { service: u8, data: &'a [u8] },
    /// Negative response to `service` with its response code.
    Negative { service: u8, nrc: u8 },
}

impl ObdResponse<'_> {
    /// The request service this response answers.
    pub fn service(&self) -> u8 {
        match *self {
            ObdResponse::Positive { service, .. } | ObdResponse::Negative { service, .. } => service,
        }
    }
}

/// Classify a reassembled payload. Returns `None` for anything that is not
/// an OBD-II service response.
pub fn classify_response(payload: &[u8]) -> Option<ObdResponse<'_>> {
    let (&sid, rest) = payload.split_first()?;
    if sid == NEGATIVE_RESPONSE_SID {
        let service = *rest.first()?;
        let nrc = rest.get(1).copied().unwrap_or(0);
        return Some(ObdResponse::Negative { service, nrc });
    }
    let service = sid.checked_sub(RESPONSE_SID_OFFSET)?;
    Some(ObdResponse::Positive {
        service,
        data: rest,
    })
}

/// Decode the data of a positive 0x03/0x07/0x0A response.
///
/// Layout on CAN: `[count, b1, b2, b1, b2, ...]`. At most `count` pairs are
/// read; `0x00 0x00` padding pairs are skipped.
pub fn decode_dtc_data(data: &[u8], kind: DtcKind) -> Vec<DiagnosticCode> {
    let Some((&count, pairs)) = data.split_first() else {
        return Vec::new();
    };
    pairs
        .chunks_exact(2)
        .take(count as usize)
        .filter_map(|pair| DiagnosticCode::from_bytes(pair[0], pair[1], kind))
        .collect()
}

// ---------------------------------------------------------------------------
// ISO-TP multi-frame reassembly (receive-only, non-blocking)
// ---------------------------------------------------------------------------

/// Outcome of feeding one frame into an `IsoTpAssembler`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IsoTpProgress {
    /// A complete payload is available.
    Complete(Vec<u8>),
    /// A First Frame started a transfer; the sender waits for Flow Control.
    NeedsFlowControl,
    /// More Consecutive Frames are expected.
    Pending,
}

/// Reassembles one ECU's ISO-TP transfer, one frame at a time.
#[derive(Debug, Default)]
pub struct IsoTpAssembler {
    total_len: usize,
    payload: Vec<u8>,
    expected_seq: u8,
    in_progress: bool,
}

impl IsoTpAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one frame's data bytes.
    ///
    /// A Single or First Frame always restarts the transfer. Errors reset
    /// the assembler.
    pub fn push(&mut self, data: &[u8]) -> CanResult<IsoTpProgress> {
        let Some(&pci) = data.first() else {
            return Err(CanError::IsoTp("empty frame".into()));
        };
        let frame_type = (pci >> 4) & 0x0F;

        match frame_type {
            ISOTP_SF => {
                self.reset();
                let len = (pci & 0x0F) as usize;
                if len == 0 || len + 1 > data.len() {
                    return Err(CanError::IsoTp("invalid SF length".into()));
                }
                Ok(IsoTpProgress::Complete(data[1..1 + len].to_vec()))
            }
            ISOTP_FF => {
                self.reset();
                if data.len() < 2 {
                    return Err(CanError::IsoTp("truncated FF".into()));
                }
                let total_len = (((pci & 0x0F) as usize) << 8) | (data[1] as usize);
                if total_len < 8 {
                    return Err(CanError::IsoTp(format!("FF length {total_len} fits in SF")));
                }
                self.total_len = total_len;
                self.payload.reserve(total_len);
                self.payload.extend_from_slice(&data[2..data.len().min(8)]);
                self.expected_seq = 1;
                self.in_progress = true;
                Ok(IsoTpProgress::NeedsFlowControl)
            }
            ISOTP_CF => {
                if !self.in_progress {
                    return Err(CanError::IsoTp("CF without FF".into()));
                }
                let seq = pci & 0x0F;
                if seq != (self.expected_seq & 0x0F) {
                    let expected = self.expected_seq & 0x0F;
                    self.reset();
                    return Err(CanError::IsoTp(format!(
                        "sequence mismatch: expected {expected}, got {seq}"
                    )));
                }

                let remaining = self.total_len - self.payload.len();
                let end = data.len().min(1 + remaining);
                self.payload.extend_from_slice(&data[1..end]);
                self.expected_seq = self.expected_seq.wrapping_add(1);

                if self.payload.len() >= self.total_len {
                    let mut payload = std::mem::take(&mut self.payload);
                    payload.truncate(self.total_len);
                    self.reset();
                    Ok(IsoTpProgress::Complete(payload))
                } else {
                    Ok(IsoTpProgress::Pending)
                }
            }
            _ => Err(CanError::IsoTp(format!(
                "unexpected frame type 0x{frame_type:X}"
            ))),
        }
    }

    /// True between a First Frame and the last Consecutive Frame.
    pub fn is_in_progress(&self) -> bool {
        self.in_progress
    }

    fn reset(&mut self) {
        self.total_len = 0;
        self.payload.clear();
        self.expected_seq = 0;
        self.in_progress = false;
    }
}

/// Per-ECU ISO-TP reassembly for OBD-II responses (0x7E8–0x7EF).
///
/// Only transfers answering one of `services` are reassembled, so several
/// receivers can watch the same traffic without stepping on each other:
/// a First Frame for another service gets no Flow Control from here.
#[derive(Debug)]
pub struct IsoTpReceiver {
    services: &'static [u8],
    ecus: HashMap<u32, IsoTpAssembler>,
}

impl IsoTpReceiver {
    pub fn new(services: &'static [u8]) -> Self {
        Self {
            services,
            ecus: HashMap::new(),
        }
    }

    /// Drop all partial transfers.
    pub fn clear(&mut self) {
        self.ecus.clear();
    }

    /// Feed a received frame. Returns `(response_id, payload)` once an
    /// ECU's payload is complete. Frames from non-OBD IDs, and transfers
    /// for services this receiver does not own, are ignored.
    pub fn feed(
        &mut self,
        bus: &dyn CanInterface,
        frame: &CanFrame,
    ) -> CanResult<Option<(u32, Vec<u8>)>> {
        if !is_obd_response(frame.id) || !self.owns(frame) {
            return Ok(None);
        }
        let assembler = self.ecus.entry(frame.id).or_default();
        match assembler.push(&frame.data)? {
            IsoTpProgress::Complete(payload) => Ok(Some((frame.id, payload))),
            IsoTpProgress::NeedsFlowControl => {
                bus.send_frame(&build_flow_control(frame.id))?;
                Ok(None)
            }
            IsoTpProgress::Pending => Ok(None),
        }
    }

    /// Whether `frame` starts or continues a transfer for one of our services.
    fn owns(&mut self, frame: &CanFrame) -> bool {
        let Some(&pci) = frame.data.first() else {
            return true; // let the assembler report it
        };
        let leading = match pci >> 4 {
            ISOTP_SF => frame.data.get(1..),
            ISOTP_FF => frame.data.get(2..),
            ISOTP_CF => {
                return self
                    .ecus
                    .get(&frame.id)
                    .is_some_and(IsoTpAssembler::is_in_progress);
            }
            _ => return true,
        };
        let wanted = leading
            .and_then(classify_response)
            .is_some_and(|r| self.services.contains(&r.service()));
        if !wanted {
            // A new transfer for someone else ends whatever we had from this ECU.
            self.ecus.remove(&frame.id);
        }
        wanted
    }
}
