//! Event router: validates named client events, fans them out to room
//! members and produces acknowledgments.
//!
//! Dispatch is table-driven: each event name maps to a handler registered
//! at construction. Unknown names are logged and dropped; a hostile or
//! outdated client cannot crash the router. Delivery to one recipient
//! never blocks or aborts delivery to another.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::{ClientId, ProtocolError, RoomEvent, RoomId, Timestamp};

use super::bridge::RoomBridge;
use super::messages::{ClientEnvelope, ServerMessage};
use super::registry::RoomRegistry;

/// A named event handler. Handlers validate and transform the payload,
/// then hand a `RoomEvent` to [`EventRouter::dispatch`].
type HandlerFn = fn(&EventRouter, ClientId, &ClientEnvelope) -> Result<(), ProtocolError>;

/// Mapping from event name to handler, validated at registration time.
struct HandlerTable {
    handlers: HashMap<&'static str, HandlerFn>,
}

impl HandlerTable {
    fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    fn register(mut self, name: &'static str, handler: HandlerFn) -> Self {
        debug_assert!(!name.is_empty(), "handler name must be non-empty");
        let previous = self.handlers.insert(name, handler);
        debug_assert!(previous.is_none(), "duplicate handler for '{name}'");
        self
    }

    fn get(&self, name: &str) -> Option<&HandlerFn> {
        self.handlers.get(name)
    }
}

/// Routes client events to handlers and fans room events out to members.
pub struct EventRouter {
    registry: Arc<RoomRegistry>,
    bridge: Arc<dyn RoomBridge>,
    handlers: HandlerTable,
}

impl EventRouter {
    pub fn new(registry: Arc<RoomRegistry>, bridge: Arc<dyn RoomBridge>) -> Arc<Self> {
        let handlers = HandlerTable::new()
            .register("room:join", handle_room_join)
            .register("room:leave", handle_room_leave)
            .register("chat:message", handle_chat_message);

        Arc::new(Self {
            registry,
            bridge,
            handlers,
        })
    }

    /// Route one inbound client event.
    ///
    /// If the envelope carried an ack token, exactly one acknowledgment is
    /// sent after local dispatch completes, whatever the recipient count.
    /// Protocol errors are encoded into the ack instead of being thrown;
    /// without a token the client observes silence.
    pub fn handle_client_event(&self, origin: ClientId, envelope: ClientEnvelope) {
        let outcome = match self.handlers.get(&envelope.name) {
            Some(handler) => handler(self, origin, &envelope),
            None => {
                tracing::warn!(client = %origin, event = %envelope.name, "Ignoring unknown event");
                Err(ProtocolError::UnknownEvent(envelope.name.clone()))
            }
        };

        if let Err(ref e) = outcome {
            tracing::warn!(client = %origin, event = %envelope.name, error = %e, "Dropped client event");
        }

        if let Some(token) = envelope.ack {
            let ack = match outcome {
                Ok(()) => ServerMessage::ack_ok(token),
                Err(e) => ServerMessage::ack_error(token, e.to_string()),
            };
            self.send_to(origin, ack.into_value());
        }
    }

    /// Fan out locally, then hand the event to the bridge.
    ///
    /// Local delivery strictly precedes the bus publish, and the bridge
    /// hands the event off without awaiting bus I/O, so acknowledgments
    /// never wait on cross-instance delivery (local-ack-only contract).
    pub fn dispatch(&self, event: RoomEvent) {
        self.dispatch_local(&event);
        self.bridge.forward(&event);
    }

    /// Fan out to local members only. Used for the local leg of dispatch
    /// and for re-injection of remote events by the bridge.
    pub fn dispatch_local(&self, event: &RoomEvent) {
        for (member, outbound) in self.registry.members(&event.room) {
            if event.excludes(member) {
                continue;
            }
            if outbound.send(event.payload.clone()).is_err() {
                // Recipient is mid-teardown; drop the frame for it only.
                tracing::debug!(client = %member, room = %event.room, "Dropped frame for departing session");
            }
        }
    }

    /// Tear down a session and notify each room it was in.
    pub fn disconnect(&self, client: ClientId) {
        let label = self.registry.user_label(client);
        let rooms = self.registry.disconnect(client);
        let Some(label) = label else {
            return;
        };

        for room in rooms {
            let payload = ServerMessage::PresenceLeave {
                user_id: label.clone(),
                room: room.to_string(),
            };
            self.dispatch(RoomEvent::from_client(
                "presence:leave",
                room,
                payload.into_value(),
                client,
            ));
        }
    }

    fn send_to(&self, client: ClientId, frame: serde_json::Value) {
        if let Some(outbound) = self.registry.sender_of(client) {
            if outbound.send(frame).is_err() {
                tracing::debug!(client = %client, "Dropped direct frame for departing session");
            }
        }
    }
}

fn required_room(envelope: &ClientEnvelope) -> Result<RoomId, ProtocolError> {
    match envelope.room.as_deref() {
        Some(room) if !room.is_empty() => Ok(RoomId::new(room)),
        _ => Err(ProtocolError::MissingRoom {
            name: envelope.name.clone(),
        }),
    }
}

/// `room:join` — idempotent join plus a presence notice to the members
/// that were already there.
fn handle_room_join(
    router: &EventRouter,
    origin: ClientId,
    envelope: &ClientEnvelope,
) -> Result<(), ProtocolError> {
    let room = required_room(envelope)?;

    if !router.registry.join(origin, &room) {
        // Duplicate join (or a torn-down session): no additional effect.
        return Ok(());
    }

    let label = router
        .registry
        .user_label(origin)
        .unwrap_or_else(|| origin.to_string());
    tracing::debug!(client = %origin, room = %room, "Session joined room");

    let payload = ServerMessage::PresenceJoin {
        user_id: label,
        room: room.to_string(),
    };
    router.dispatch(RoomEvent::from_client(
        "presence:join",
        room,
        payload.into_value(),
        origin,
    ));
    Ok(())
}

/// `room:leave` — drop membership and notify the remaining members.
fn handle_room_leave(
    router: &EventRouter,
    origin: ClientId,
    envelope: &ClientEnvelope,
) -> Result<(), ProtocolError> {
    let room = required_room(envelope)?;

    let label = router
        .registry
        .user_label(origin)
        .unwrap_or_else(|| origin.to_string());

    if !router.registry.leave(origin, &room) {
        return Ok(());
    }
    tracing::debug!(client = %origin, room = %room, "Session left room");

    let payload = ServerMessage::PresenceLeave {
        user_id: label,
        room: room.to_string(),
    };
    router.dispatch(RoomEvent::from_client(
        "presence:leave",
        room,
        payload.into_value(),
        origin,
    ));
    Ok(())
}

/// `chat:message` — stamps the sender id and a send timestamp, then fans
/// out to every other room member.
fn handle_chat_message(
    router: &EventRouter,
    origin: ClientId,
    envelope: &ClientEnvelope,
) -> Result<(), ProtocolError> {
    let room = required_room(envelope)?;

    let message = envelope
        .payload
        .get("message")
        .and_then(|m| m.as_str())
        .ok_or_else(|| ProtocolError::InvalidPayload {
            name: envelope.name.clone(),
            reason: "message must be a string".to_string(),
        })?;

    let payload = ServerMessage::Chat {
        id: origin.to_string(),
        message: message.to_string(),
        ts: Timestamp::now().as_unix_millis(),
    };
    router.dispatch(RoomEvent::from_client(
        "chat:message",
        room,
        payload.into_value(),
        origin,
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::websocket::bridge::NullBridge;
    use serde_json::json;
    use tokio::sync::mpsc;

    fn setup() -> (Arc<RoomRegistry>, Arc<EventRouter>) {
        let registry = Arc::new(RoomRegistry::new());
        let router = EventRouter::new(Arc::clone(&registry), Arc::new(NullBridge));
        (registry, router)
    }

    fn attach(
        registry: &RoomRegistry,
        label: &str,
    ) -> (ClientId, mpsc::UnboundedReceiver<serde_json::Value>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = ClientId::new();
        registry.connect(client, label, tx);
        (client, rx)
    }

    fn envelope(name: &str, room: &str, payload: serde_json::Value) -> ClientEnvelope {
        ClientEnvelope {
            name: name.to_string(),
            room: Some(room.to_string()),
            payload,
            ack: None,
        }
    }

    #[tokio::test]
    async fn chat_reaches_other_members_but_not_sender() {
        let (registry, router) = setup();
        let (a, mut a_rx) = attach(&registry, "alice");
        let (b, mut b_rx) = attach(&registry, "bob");

        router.handle_client_event(a, envelope("room:join", "class:123", json!({})));
        router.handle_client_event(b, envelope("room:join", "class:123", json!({})));

        // A joined an empty room silently; B's join notifies A only.
        let presence = a_rx.try_recv().unwrap();
        assert_eq!(presence["type"], "presence:join");
        assert_eq!(presence["userId"], "bob");

        router.handle_client_event(
            a,
            envelope("chat:message", "class:123", json!({"message": "hi"})),
        );

        let chat = b_rx.try_recv().unwrap();
        assert_eq!(chat["type"], "chat:message");
        assert_eq!(chat["id"], a.to_string());
        assert_eq!(chat["message"], "hi");
        assert!(chat["ts"].is_number());

        assert!(a_rx.try_recv().is_err(), "sender must not receive its own chat");
    }

    #[tokio::test]
    async fn chat_never_leaks_into_other_rooms() {
        let (registry, router) = setup();
        let (a, _a_rx) = attach(&registry, "alice");
        let (c, mut c_rx) = attach(&registry, "carol");

        router.handle_client_event(a, envelope("room:join", "class:123", json!({})));
        router.handle_client_event(c, envelope("room:join", "class:456", json!({})));

        router.handle_client_event(
            a,
            envelope("chat:message", "class:123", json!({"message": "hi"})),
        );

        assert!(c_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn ack_is_sent_even_with_zero_recipients() {
        let (registry, router) = setup();
        let (a, mut a_rx) = attach(&registry, "alice");

        router.handle_client_event(a, envelope("room:join", "class:solo", json!({})));
        let mut env = envelope("chat:message", "class:solo", json!({"message": "echo?"}));
        env.ack = Some(json!(42));
        router.handle_client_event(a, env);

        let ack = a_rx.try_recv().unwrap();
        assert_eq!(ack["type"], "ack");
        assert_eq!(ack["ack"], 42);
        assert_eq!(ack["ok"], true);

        // Exactly one frame: the ack, never the chat itself.
        assert!(a_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unknown_event_is_dropped_and_ack_carries_the_error() {
        let (registry, router) = setup();
        let (a, mut a_rx) = attach(&registry, "alice");

        // Without a token: silence.
        router.handle_client_event(a, envelope("no:such:event", "class:123", json!({})));
        assert!(a_rx.try_recv().is_err());

        // With a token: a negative ack instead of an exception.
        let mut env = envelope("no:such:event", "class:123", json!({}));
        env.ack = Some(json!(1));
        router.handle_client_event(a, env);

        let ack = a_rx.try_recv().unwrap();
        assert_eq!(ack["ok"], false);
        assert!(ack["error"].as_str().unwrap().contains("unknown event"));
    }

    #[tokio::test]
    async fn malformed_chat_payload_is_a_protocol_error() {
        let (registry, router) = setup();
        let (a, mut a_rx) = attach(&registry, "alice");
        let (b, mut b_rx) = attach(&registry, "bob");

        router.handle_client_event(a, envelope("room:join", "class:123", json!({})));
        router.handle_client_event(b, envelope("room:join", "class:123", json!({})));
        let _ = a_rx.try_recv();

        let mut env = envelope("chat:message", "class:123", json!({"message": 5}));
        env.ack = Some(json!("tok"));
        router.handle_client_event(a, env);

        let ack = a_rx.try_recv().unwrap();
        assert_eq!(ack["ok"], false);
        assert!(b_rx.try_recv().is_err(), "invalid event must not fan out");
    }

    #[tokio::test]
    async fn duplicate_join_emits_no_second_presence() {
        let (registry, router) = setup();
        let (a, _a_rx) = attach(&registry, "alice");
        let (b, mut b_rx) = attach(&registry, "bob");

        router.handle_client_event(b, envelope("room:join", "class:123", json!({})));
        router.handle_client_event(a, envelope("room:join", "class:123", json!({})));
        assert_eq!(b_rx.try_recv().unwrap()["type"], "presence:join");

        router.handle_client_event(a, envelope("room:join", "class:123", json!({})));
        assert!(b_rx.try_recv().is_err());
        assert_eq!(registry.member_ids(&RoomId::new("class:123")).len(), 2);
    }

    #[tokio::test]
    async fn leave_notifies_remaining_members() {
        let (registry, router) = setup();
        let (a, _a_rx) = attach(&registry, "alice");
        let (b, mut b_rx) = attach(&registry, "bob");

        router.handle_client_event(b, envelope("room:join", "class:123", json!({})));
        router.handle_client_event(a, envelope("room:join", "class:123", json!({})));
        let _ = b_rx.try_recv();

        router.handle_client_event(a, envelope("room:leave", "class:123", json!({})));

        let presence = b_rx.try_recv().unwrap();
        assert_eq!(presence["type"], "presence:leave");
        assert_eq!(presence["userId"], "alice");
    }

    #[tokio::test]
    async fn disconnect_notifies_every_room_and_cleans_up() {
        let (registry, router) = setup();
        let (a, _a_rx) = attach(&registry, "alice");
        let (b, mut b_rx) = attach(&registry, "bob");
        let (c, mut c_rx) = attach(&registry, "carol");

        router.handle_client_event(b, envelope("room:join", "class:1", json!({})));
        router.handle_client_event(c, envelope("room:join", "class:2", json!({})));
        router.handle_client_event(a, envelope("room:join", "class:1", json!({})));
        router.handle_client_event(a, envelope("room:join", "class:2", json!({})));
        let _ = b_rx.try_recv();
        let _ = c_rx.try_recv();

        router.disconnect(a);

        assert_eq!(b_rx.try_recv().unwrap()["type"], "presence:leave");
        assert_eq!(c_rx.try_recv().unwrap()["type"], "presence:leave");
        assert!(registry.joined_rooms(a).is_empty());

        // Idempotent teardown: nothing further happens.
        router.disconnect(a);
        assert!(b_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn event_for_dead_session_is_a_noop() {
        let (registry, router) = setup();
        let (a, _a_rx) = attach(&registry, "alice");
        router.disconnect(a);

        // No panic, no room created.
        router.handle_client_event(a, envelope("room:join", "class:123", json!({})));
        assert_eq!(registry.room_count(), 0);
    }

    #[tokio::test]
    async fn server_event_reaches_every_member() {
        let (registry, router) = setup();
        let (a, mut a_rx) = attach(&registry, "alice");
        let (b, mut b_rx) = attach(&registry, "bob");

        router.handle_client_event(a, envelope("room:join", "track:123", json!({})));
        router.handle_client_event(b, envelope("room:join", "track:123", json!({})));
        let _ = a_rx.try_recv();

        router.dispatch(RoomEvent::from_server(
            "progress:update",
            RoomId::new("track:123"),
            json!({"type": "progress:update", "percent": 50}),
        ));

        assert_eq!(a_rx.try_recv().unwrap()["percent"], 50);
        assert_eq!(b_rx.try_recv().unwrap()["percent"], 50);
    }
}
