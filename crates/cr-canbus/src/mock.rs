//! Mock CAN interface for testing.
//!
//! Supports scripted replies per OBD-II service and frame recording. All tests use this instead of real CAN hardware so the
//! suite runs in CI on any platform. With no replies scripted it behaves
//! like a bus with the ignition off.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::{CanError, CanResult};
use crate::interface::CanInterface;
use crate::safety;
use crate::types::{CanFrame, OBD_REQUEST_ID};

/// Mock CAN interface with scripted responses and frame recording.
pub struct MockCanInterface {
    /// Frames returned by `try_recv_frame` (FIFO order).
    rx_queue: Mutex<VecDeque<CanFrame>>,
    /// Replies queued every time a request for the given service is sent.
    replies: Mutex<Vec<(u8, Vec<CanFrame>)>>,
    /// All frames passed to `send_frame` (for test assertions).
    sent_frames: Mutex<Vec<CanFrame>>,
    /// When set, `send_frame` fails as if the transmit queue were full.
    fail_sends: Mutex<bool>,
    /// Whether to enforce OBD-II safety checks (default: true).
    enforce_safety: bool,
}

impl MockCanInterface {
    /// Create a new mock with no queued responses (silent bus).
    pub fn new() -> Self {
        Self {
            rx_queue: Mutex::new(VecDeque::new()),
            replies: Mutex::new(Vec::new()),
            sent_frames: Mutex::new(Vec::new()),
            fail_sends: Mutex::new(false),
            enforce_safety: true,
        }
    }

    /// Script the frames the "vehicle" sends back whenever a broadcast
    /// request for `service` is transmitted. Replaces any earlier script
    /// for the same service.
    pub fn reply_to(&self, service: u8, frames: Vec<CanFrame>) {
        let mut replies = self.replies.lock().unwrap();
        replies.retain(|(s, _)| *s != service);
        replies.push((service, frames));
    }

    /// Make subsequent sends fail (or succeed again).
    pub fn set_fail_sends(&self, fail: bool) {
        *self.fail_sends.lock().unwrap() = fail;
    }

    /// Get copies of all frames that were sent.
    pub fn sent_frames(&self) -> Vec<CanFrame> {
        self.sent_frames.lock().unwrap().clone()
    }

    /// Get the last sent frame, if any.
    pub fn last_sent(&self) -> Option<CanFrame> {
        self.sent_frames.lock().unwrap().last().cloned()
    }

    /// Services of all broadcast requests sent so far, in order.
    pub fn requested_services(&self) -> Vec<u8> {
        self.sent_frames
            .lock()
            .unwrap()
            .iter()
            .filter(|f| f.id == OBD_REQUEST_ID && f.data.len() >= 2)
            .map(|f| f.data[1])
            .collect()
    }
}

impl Default for MockCanInterface {
    fn default() -> Self {
        Self::new()
    }
}

impl CanInterface for MockCanInterface {
    fn send_frame(&self, frame: &CanFrame) -> CanResult<()> {
        if self.enforce_safety {
            safety::check_frame(frame)?;
        }
        if *self.fail_sends.lock().unwrap() {
            return Err(CanError::Interface("transmit queue full".into()));
        }

        self.sent_frames.lock().unwrap().push(frame.clone());

        if frame.id == OBD_REQUEST_ID && frame.data.len() >= 2 {
            let service = frame.data[1];
            let replies = self.replies.lock().unwrap();
            if let Some((_, frames)) = replies.iter().find(|(s, _)| *s == service) {
                self.rx_queue.lock().unwrap().extend(frames.iter().cloned());
            }
        }
        Ok(())
    }

    fn try_recv_frame(&self) -> CanResult<Option<CanFrame>> {
        Ok(self.rx_queue.lock().unwrap().pop_front())
    }
}
