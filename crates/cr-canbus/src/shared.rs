//! One CAN interface shared by several operations.
//!
//! `try_recv_frame` on a plain interface hands each frame to whoever asks
//! first. `SharedBus` drains the underlying interface and copies every frame
//! into a queue per `BusPort`, so each operation sees all traffic and takes
//! only what it owns. Sends pass straight through.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::error::{CanError, CanResult};
use crate::interface::CanInterface;
use crate::types::CanFrame;

/// Frames held per port before the oldest is dropped.
pub const PORT_QUEUE_DEPTH: usize = 64;

type PortQueue = Mutex<VecDeque<CanFrame>>;

/// Fan-out receiver over a single interface.
pub struct SharedBus {
    bus: Arc<dyn CanInterface>,
    ports: Mutex<Vec<Weak<PortQueue>>>,
}

impl SharedBus {
    pub fn new(bus: Arc<dyn CanInterface>) -> Arc<Self> {
        Arc::new(Self {
            bus,
            ports: Mutex::new(Vec::new()),
        })
    }

    /// Open a new port. It receives frames arriving from now on.
    pub fn port(self: &Arc<Self>) -> BusPort {
        let queue = Arc::new(Mutex::new(VecDeque::new()));
        if let Ok(mut ports) = self.ports.lock() {
            ports.push(Arc::downgrade(&queue));
        }
        BusPort {
            shared: Arc::clone(self),
            queue,
        }
    }

    /// Move everything waiting on the interface into every live port.
    fn pump(&self) -> CanResult<()> {
        let mut ports = lock(&self.ports)?;
        ports.retain(|p| p.strong_count() > 0);

        for _ in 0..PORT_QUEUE_DEPTH {
            let Some(frame) = self.bus.try_recv_frame()? else {
                break;
            };
            for port in ports.iter().filter_map(Weak::upgrade) {
                let mut queue = lock(&port)?;
                if queue.len() >= PORT_QUEUE_DEPTH {
                    queue.pop_front();
                }
                queue.push_back(frame.clone());
            }
        }
        Ok(())
    }
}

/// One consumer's view of a [`SharedBus`].
pub struct BusPort {
    shared: Arc<SharedBus>,
    queue: Arc<PortQueue>,
}

impl CanInterface for BusPort {
    fn send_frame(&self, frame: &CanFrame) -> CanResult<()> {
        self.shared.bus.send_frame(frame)
    }

    fn try_recv_frame(&self) -> CanResult<Option<CanFrame>> {
        self.shared.pump()?;
        Ok(lock(&self.queue)?.pop_front())
    }
}

fn lock<T>(m: &Mutex<T>) -> CanResult<MutexGuard<'_, T>> {
    m.lock()
        .map_err(|_| CanError::Interface("shared bus lock poisoned".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockCanInterface;
    use crate::obd::build_request;

    fn confirmation() -> CanFrame {
        CanFrame::new(0x7E8, vec![0x01, 0x44, 0, 0, 0, 0, 0, 0])
    }

    #[test]
    fn every_port_sees_every_frame() {
        let mock = Arc::new(MockCanInterface::new());
        mock.reply_to(0x04, vec![confirmation()]);
        let shared = SharedBus::new(mock.clone());
        let a = shared.port();
        let b = shared.port();

        a.send_frame(&build_request(0x04)).unwrap();

        assert_eq!(a.try_recv_frame().unwrap(), Some(confirmation()));
        assert_eq!(a.try_recv_frame().unwrap(), None);
        assert_eq!(b.try_recv_frame().unwrap(), Some(confirmation()));
        assert_eq!(b.try_recv_frame().unwrap(), None);
    }

    #[test]
    fn sends_reach_the_interface() {
        let mock = Arc::new(MockCanInterface::new());
        let shared = SharedBus::new(mock.clone());
        let port = shared.port();

        port.send_frame(&build_request(0x03)).unwrap();
        assert_eq!(mock.requested_services(), vec![0x03]);
    }

    #[test]
    fn idle_port_keeps_only_the_newest_frames() {
        let mock = Arc::new(MockCanInterface::new());
        let frames: Vec<CanFrame> = (0..PORT_QUEUE_DEPTH as u8 + 4)
            .map(|i| CanFrame::new(0x7E8, vec![0x02, 0x43, i]))
            .collect();
        mock.reply_to(0x03, frames);
        let shared = SharedBus::new(mock.clone());
        let busy = shared.port();
        let idle = shared.port();

        busy.send_frame(&build_request(0x03)).unwrap();
        while busy.try_recv_frame().unwrap().is_some() {}

        let first = idle.try_recv_frame().unwrap().unwrap();
        assert_eq!(first.data[2], 4);
        assert_eq!(idle.discard_pending().unwrap(), PORT_QUEUE_DEPTH - 1);
    }

    #[test]
    fn dropped_port_stops_receiving() {
        let mock = Arc::new(MockCanInterface::new());
        mock.reply_to(0x04, vec![confirmation()]);
        let shared = SharedBus::new(mock.clone());
        let kept = shared.port();
        drop(shared.port());

        kept.send_frame(&build_request(0x04)).unwrap();
        assert!(kept.try_recv_frame().unwrap().is_some());
        assert_eq!(shared.ports.lock().unwrap().len(), 1);
    }
}
