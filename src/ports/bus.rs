//! BusTransport port - interface to the external publish/subscribe bus.
//!
//! The bridge talks to the bus exclusively through this port so the
//! production Redis adapter and the in-memory test adapter are
//! interchangeable.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::domain::BusError;

/// Stream of raw bus payloads for one channel.
pub type BusStream = BoxStream<'static, Vec<u8>>;

/// Port for the scale-out publish/subscribe bus.
///
/// Implementations must ensure:
/// - `publish` delivers the payload to every current subscriber of the
///   channel, including this process's own subscription
/// - `subscribe` yields payloads in publish order per publisher
/// - constructors fail loudly when the bus is unreachable; a transport is
///   never handed out half-connected
#[async_trait]
pub trait BusTransport: Send + Sync {
    /// Publish a raw payload on a channel.
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<(), BusError>;

    /// Subscribe to a channel, returning a stream of raw payloads.
    async fn subscribe(&self, channel: &str) -> Result<BusStream, BusError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time check that the trait is object-safe.
    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn BusTransport) {}
}
