//! Room events and the bridge envelope that carries them between instances.

use serde::{Deserialize, Serialize};

use super::ids::{ClientId, InstanceId, RoomId};
use super::timestamp::Timestamp;

/// A single event targeting one room.
///
/// Immutable once constructed; fan-out delivers the same payload to every
/// recipient. `origin` is `None` for server-synthesized events (e.g. the
/// progress trigger). When `exclusive` is set, the origin session is
/// skipped during fan-out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomEvent {
    pub name: String,
    pub room: RoomId,
    pub payload: serde_json::Value,
    pub origin: Option<ClientId>,
    pub ts: Timestamp,
    pub exclusive: bool,
}

impl RoomEvent {
    /// Event originating from a connected client; excluded from its own
    /// fan-out.
    pub fn from_client(
        name: impl Into<String>,
        room: RoomId,
        payload: serde_json::Value,
        origin: ClientId,
    ) -> Self {
        Self {
            name: name.into(),
            room,
            payload,
            origin: Some(origin),
            ts: Timestamp::now(),
            exclusive: true,
        }
    }

    /// Server-synthesized event with no origin; delivered to every member.
    pub fn from_server(name: impl Into<String>, room: RoomId, payload: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            room,
            payload,
            origin: None,
            ts: Timestamp::now(),
            exclusive: false,
        }
    }

    /// Whether fan-out should skip the given session.
    pub fn excludes(&self, client: ClientId) -> bool {
        self.exclusive && self.origin == Some(client)
    }
}

/// Wire envelope relayed over the scale-out bus.
///
/// Tagged with the originating instance so a bridge never re-injects its
/// own messages (the primary defense against relay loops).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeMessage {
    pub instance: InstanceId,
    pub event: RoomEvent,
}

impl BridgeMessage {
    pub fn new(instance: InstanceId, event: RoomEvent) -> Self {
        Self { instance, event }
    }
}
