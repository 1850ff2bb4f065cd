//! Scale-out bridge: relays room events between instances over the bus.
//!
//! Two variants behind one trait, selected once at construction:
//! [`NullBridge`] when no bus is configured (single-instance mode with
//! identical local semantics) and [`BusBridge`] when it is.
//!
//! `BusBridge` tags every outbound event with this instance's identifier
//! and re-injects only foreign-tagged messages via local-only dispatch, so
//! an event is delivered at most once per instance and never loops back
//! onto the bus.
//!
//! Known limitation: ordering across instances is best-effort. Events from
//! one instance for one room reach the bus in submission order (a single
//! publisher task drains a queue), but the bus may interleave different
//! origins arbitrarily.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;

use crate::domain::{BridgeMessage, BusError, InstanceId, RoomEvent};
use crate::ports::{BusStream, BusTransport};

use super::router::EventRouter;

/// Pause between resubscribe attempts after the bus subscription drops.
const RESUBSCRIBE_BACKOFF: Duration = Duration::from_millis(500);

/// Fan-out hook the router invokes after every local dispatch.
///
/// `forward` must never block dispatch; implementations hand the event off
/// and return.
pub trait RoomBridge: Send + Sync {
    fn forward(&self, event: &RoomEvent);
}

/// Bridge used in single-instance mode. Forwarding is a no-op.
pub struct NullBridge;

impl RoomBridge for NullBridge {
    fn forward(&self, _event: &RoomEvent) {}
}

/// Parts consumed when the bridge tasks start.
struct Pending {
    inbound: BusStream,
    outbound_rx: mpsc::UnboundedReceiver<BridgeMessage>,
}

/// Bus-backed bridge for multi-instance deployments.
pub struct BusBridge {
    instance: InstanceId,
    channel: String,
    transport: Arc<dyn BusTransport>,
    outbound: mpsc::UnboundedSender<BridgeMessage>,
    pending: Mutex<Option<Pending>>,
}

impl BusBridge {
    /// Connect the bridge to the bus: subscribes to the shared channel
    /// up-front so an unreachable bus fails the startup path instead of
    /// silently running single-instance.
    pub async fn connect(
        transport: Arc<dyn BusTransport>,
        channel: impl Into<String>,
        instance: InstanceId,
    ) -> Result<Arc<Self>, BusError> {
        let channel = channel.into();
        let inbound = transport.subscribe(&channel).await?;
        let (outbound, outbound_rx) = mpsc::unbounded_channel();

        tracing::info!(%instance, channel = %channel, "Scale-out bridge connected");

        Ok(Arc::new(Self {
            instance,
            channel,
            transport,
            outbound,
            pending: Mutex::new(Some(Pending {
                inbound,
                outbound_rx,
            })),
        }))
    }

    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    /// Spawn the publisher and relay tasks. Call exactly once, after the
    /// router exists.
    ///
    /// Mid-run bus failures are logged and retried: publishes on the next
    /// event, a dropped subscription via resubscribe with backoff. Local
    /// fan-out keeps working in degraded (instance-local) mode throughout.
    pub fn start(self: &Arc<Self>, router: Arc<EventRouter>) -> Result<(), BusError> {
        let Pending {
            mut inbound,
            mut outbound_rx,
        } = self
            .pending
            .lock()
            .expect("BusBridge pending lock poisoned")
            .take()
            .ok_or(BusError::AlreadyStarted)?;

        // Publisher: drains the queue so forward() never awaits. A single
        // task preserves per-instance submission order on the bus.
        let publisher = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                let payload = match serde_json::to_vec(&message) {
                    Ok(p) => p,
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to encode bridge message");
                        continue;
                    }
                };
                if let Err(e) = publisher.transport.publish(&publisher.channel, payload).await {
                    tracing::warn!(
                        error = %e,
                        room = %message.event.room,
                        "Bus publish failed; event stays instance-local"
                    );
                }
            }
        });

        // Relay: re-injects foreign-instance events through local-only
        // dispatch so they never return to the bus. A dropped subscription
        // is resubscribed with backoff; the relay only dies with the
        // process. Messages published while unsubscribed are lost, like
        // any pub/sub consumer.
        let relay = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                while let Some(payload) = inbound.next().await {
                    let message: BridgeMessage = match serde_json::from_slice(&payload) {
                        Ok(m) => m,
                        Err(e) => {
                            tracing::warn!(error = %e, "Dropping undecodable bus message");
                            continue;
                        }
                    };
                    if message.instance == relay.instance {
                        continue;
                    }
                    tracing::debug!(
                        origin_instance = %message.instance,
                        room = %message.event.room,
                        event = %message.event.name,
                        "Re-injecting remote room event"
                    );
                    router.dispatch_local(&message.event);
                }

                tracing::warn!(channel = %relay.channel, "Bus subscription ended; resubscribing");
                inbound = loop {
                    tokio::time::sleep(RESUBSCRIBE_BACKOFF).await;
                    match relay.transport.subscribe(&relay.channel).await {
                        Ok(stream) => break stream,
                        Err(e) => {
                            tracing::warn!(
                                error = %e,
                                channel = %relay.channel,
                                "Bus resubscribe failed; retrying"
                            );
                        }
                    }
                };
                tracing::info!(channel = %relay.channel, "Bus subscription restored");
            }
        });

        Ok(())
    }
}

impl RoomBridge for BusBridge {
    fn forward(&self, event: &RoomEvent) {
        let message = BridgeMessage::new(self.instance, event.clone());
        if self.outbound.send(message).is_err() {
            tracing::warn!(room = %event.room, "Bridge publisher is gone; event stays instance-local");
        }
    }
}
