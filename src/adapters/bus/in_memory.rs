//! In-memory bus implementation for testing.
//!
//! Lets tests wire several bridge instances to one fake bus and observe
//! cross-instance relay deterministically, without a Redis server.
//! [`InMemoryBus::sever_subscriptions`] simulates a bus outage: every live
//! subscription stream ends, later subscribes attach to a fresh channel.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use futures::stream;
use futures::StreamExt;
use tokio::sync::broadcast;

use crate::domain::BusError;
use crate::ports::{BusStream, BusTransport};

/// Capacity of the underlying broadcast channel. Subscribers that fall
/// behind skip messages, mirroring pub/sub (no durability).
const CHANNEL_CAPACITY: usize = 256;

/// In-memory bus over a `tokio::sync::broadcast` channel.
///
/// Clone freely; all clones share the same channel.
#[derive(Clone)]
pub struct InMemoryBus {
    sender: Arc<RwLock<broadcast::Sender<(String, Vec<u8>)>>>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender: Arc::new(RwLock::new(sender)),
        }
    }

    /// Number of live subscriptions (for test assertions).
    pub fn subscriber_count(&self) -> usize {
        self.current().receiver_count()
    }

    /// Drop every live subscription, the way a bus outage would. Messages
    /// published while nobody has resubscribed are lost, like pub/sub.
    pub fn sever_subscriptions(&self) {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        *self.sender.write().expect("InMemoryBus lock poisoned") = sender;
    }

    fn current(&self) -> broadcast::Sender<(String, Vec<u8>)> {
        self.sender.read().expect("InMemoryBus lock poisoned").clone()
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BusTransport for InMemoryBus {
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<(), BusError> {
        // No subscribers is fine, same as Redis PUBLISH to an idle channel.
        let _ = self.current().send((channel.to_string(), payload));
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<BusStream, BusError> {
        let rx = self.current().subscribe();
        let channel = channel.to_string();

        let stream = stream::unfold(rx, move |mut rx| {
            let channel = channel.clone();
            async move {
                loop {
                    match rx.recv().await {
                        Ok((ch, payload)) if ch == channel => return Some((payload, rx)),
                        Ok(_) => continue,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "In-memory bus subscriber lagged");
                            continue;
                        }
                        Err(broadcast::error::RecvError::Closed) => return None,
                    }
                }
            }
        })
        .boxed();

        Ok(stream)
    }
}
