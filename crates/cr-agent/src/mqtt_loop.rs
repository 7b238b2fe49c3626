//! MQTT event loop driver and event publisher task.
//!
//! The polling loop never touches the network. Remote calls flow in
//! through an unbounded channel; events flow out through a bounded one
//! drained by [`publish_events`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rumqttc::{Event, EventLoop, Packet};
use tokio::sync::mpsc;

use cr_mqtt_channel::{Channel, IncomingMessage, classify, publish_event, subscribe_calls};
use cr_protocol::events::CodeEvent;

/// Capacity of the outbound event queue.
pub const EVENT_QUEUE_DEPTH: usize = 32;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Drive the MQTT event loop, tracking connection state and forwarding
/// remote function calls for this device.
///
/// Runs until the task is cancelled or the call receiver is dropped.
pub async fn run<C: Channel + ?Sized>(
    mut eventloop: EventLoop,
    channel: Arc<C>,
    connected: Arc<AtomicBool>,
    calls: mpsc::UnboundedSender<String>,
    device_id: String,
) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                on_connected(channel.as_ref(), &device_id, &connected).await;
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let msg = classify(&publish);
                if !handle_message(msg, &device_id, &calls) {
                    tracing::warn!("call receiver dropped, stopping MQTT loop");
                    return;
                }
            }
            Ok(_) => {}
            Err(e) => {
                connected.store(false, Ordering::Relaxed);
                tracing::error!(error = %e, "MQTT event loop error, reconnecting in 5s");
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}

/// (Re)establish the call subscription after a ConnAck, then mark the
/// link as up.
async fn on_connected<C: Channel + ?Sized>(channel: &C, device_id: &str, connected: &AtomicBool) {
    match subscribe_calls(channel, device_id).await {
        Ok(()) => tracing::info!("MQTT connected, call subscription active"),
        Err(e) => tracing::warn!(error = %e, "MQTT connected but call subscription failed"),
    }
    connected.store(true, Ordering::Relaxed);
}

/// Forward a classified message. Returns false once the receiver is gone.
fn handle_message(
    msg: IncomingMessage,
    device_id: &str,
    calls: &mpsc::UnboundedSender<String>,
) -> bool {
    match msg {
        IncomingMessage::Call {
            device_id: target,
            function,
        } => {
            if target != device_id {
                tracing::debug!(target = %target, "ignoring call for another device");
                return true;
            }
            tracing::info!(function = %function, "received remote call");
            calls.send(function).is_ok()
        }
        IncomingMessage::Unknown { topic } => {
            tracing::debug!(topic = %topic, "ignoring unrecognized message");
            true
        }
    }
}

/// Publish queued events until the sending side is dropped.
///
/// Failures are logged and the event is dropped; nothing is retried.
pub async fn publish_events<C: Channel + ?Sized>(
    channel: &C,
    device_id: &str,
    mut events: mpsc::Receiver<CodeEvent>,
) {
    while let Some(event) = events.recv().await {
        match publish_event(channel, device_id, &event).await {
            Ok(()) => tracing::debug!(event = event.name(), "event published"),
            Err(e) => tracing::warn!(error = %e, event = event.name(), "event publish failed"),
        }
    }
    tracing::debug!("event queue closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use cr_mqtt_channel::MockChannel;

    #[test]
    fn call_for_this_device_is_forwarded() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let msg = IncomingMessage::Call {
            device_id: "carloop-01".into(),
            function: "readCodes".into(),
        };
        assert!(handle_message(msg, "carloop-01", &tx));
        assert_eq!(rx.try_recv().unwrap(), "readCodes");
    }

    #[test]
    fn call_for_other_device_is_dropped() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let msg = IncomingMessage::Call {
            device_id: "carloop-02".into(),
            function: "readCodes".into(),
        };
        assert!(handle_message(msg, "carloop-01", &tx));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn unknown_message_is_ignored() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let msg = IncomingMessage::Unknown {
            topic: "some/topic".into(),
        };
        assert!(handle_message(msg, "carloop-01", &tx));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn closed_receiver_stops_forwarding() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let msg = IncomingMessage::Call {
            device_id: "carloop-01".into(),
            function: "clearCodes".into(),
        };
        assert!(!handle_message(msg, "carloop-01", &tx));
    }

    #[tokio::test]
    async fn every_connack_resubscribes() {
        let channel = MockChannel::new();
        let connected = AtomicBool::new(false);

        on_connected(&channel, "carloop-01", &connected).await;
        assert!(connected.load(Ordering::Relaxed));

        // Broker dropped the clean session; the next ConnAck subscribes again.
        connected.store(false, Ordering::Relaxed);
        on_connected(&channel, "carloop-01", &connected).await;

        assert!(connected.load(Ordering::Relaxed));
        assert_eq!(channel.subscription_count("carloop/carloop-01/call/+"), 2);
    }

    #[tokio::test]
    async fn publisher_drains_queue_in_order() {
        let channel = MockChannel::new();
        let (tx, rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        tx.send(CodeEvent::Start).await.unwrap();
        tx.send(CodeEvent::Result("P0415s".into())).await.unwrap();
        drop(tx);

        publish_events(&channel, "carloop-01", rx).await;

        assert_eq!(
            channel.published_events(),
            vec![CodeEvent::Start, CodeEvent::Result("P0415s".into())]
        );
        let topics: Vec<_> = channel.published().into_iter().map(|m| m.topic).collect();
        assert_eq!(
            topics,
            vec![
                "carloop/carloop-01/event/codes/start",
                "carloop/carloop-01/event/codes/result",
            ]
        );
    }

    #[tokio::test]
    async fn publisher_survives_failures() {
        let channel = MockChannel::new();
        channel.set_fail_publishes(true);
        let (tx, rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        tx.send(CodeEvent::Error).await.unwrap();
        drop(tx);

        publish_events(&channel, "carloop-01", rx).await;
        assert!(channel.published().is_empty());
    }
}
