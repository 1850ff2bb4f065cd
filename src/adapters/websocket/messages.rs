//! WebSocket wire protocol.
//!
//! Client → server: a single envelope shape `{name, room, payload, ack?}`
//! where `name` selects the handler. Server → client: tagged messages for
//! presence, chat, progress, acks and the connect greeting.

use serde::{Deserialize, Serialize};

use crate::domain::Timestamp;

// ============================================
// Client → Server
// ============================================

/// Envelope for every client-originated event.
///
/// Unknown `name`s are logged and dropped, never fatal. `ack` is an opaque
/// token echoed back in the acknowledgment.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientEnvelope {
    pub name: String,

    #[serde(default)]
    pub room: Option<String>,

    #[serde(default)]
    pub payload: serde_json::Value,

    #[serde(default)]
    pub ack: Option<serde_json::Value>,
}

// ============================================
// Server → Client
// ============================================

/// All message types that can be sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Connection established; the client's identity for this session.
    #[serde(rename = "connected")]
    Connected {
        #[serde(rename = "clientId")]
        client_id: String,
        ts: i64,
    },

    /// A session joined a room the client is in.
    #[serde(rename = "presence:join")]
    PresenceJoin {
        #[serde(rename = "userId")]
        user_id: String,
        room: String,
    },

    /// A session left a room the client is in.
    #[serde(rename = "presence:leave")]
    PresenceLeave {
        #[serde(rename = "userId")]
        user_id: String,
        room: String,
    },

    /// Chat message fan-out. `id` is the sender's session identifier.
    #[serde(rename = "chat:message")]
    Chat { id: String, message: String, ts: i64 },

    /// Lesson progress broadcast, synthesized by the trigger endpoint.
    #[serde(rename = "progress:update")]
    Progress {
        #[serde(rename = "trackId")]
        track_id: String,
        #[serde(rename = "lessonId")]
        lesson_id: String,
        #[serde(rename = "userId")]
        user_id: String,
        percent: u8,
        ts: i64,
    },

    /// One-shot acknowledgment for a client event that carried a token.
    #[serde(rename = "ack")]
    Ack {
        ack: serde_json::Value,
        ok: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl ServerMessage {
    pub fn connected(client_id: String, ts: Timestamp) -> Self {
        Self::Connected {
            client_id,
            ts: ts.as_unix_millis(),
        }
    }

    pub fn ack_ok(token: serde_json::Value) -> Self {
        Self::Ack {
            ack: token,
            ok: true,
            error: None,
        }
    }

    pub fn ack_error(token: serde_json::Value, error: impl Into<String>) -> Self {
        Self::Ack {
            ack: token,
            ok: false,
            error: Some(error.into()),
        }
    }

    /// Serialize into the opaque payload form used for room fan-out.
    pub fn into_value(self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
