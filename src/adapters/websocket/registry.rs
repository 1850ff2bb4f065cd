//! Room and session registry.
//!
//! Single authority for who is connected and which rooms they are in.
//! Both sides of the membership relation (session → rooms, room → sessions)
//! live behind one lock so every join/leave/disconnect applies the dual
//! mutation atomically. Invariant: a session appears in a room's member set
//! iff that room appears in the session's joined set.
//!
//! Rooms are created implicitly by first join and deleted once empty.
//! Disconnect is terminal: later operations on that session are no-ops.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use tokio::sync::mpsc;

use crate::domain::{ClientId, RoomId};

/// Outbound frame channel for one session. Unbounded so fan-out never
/// blocks on a slow recipient; a closed receiver means the session is
/// mid-teardown and the frame is dropped.
pub type Outbound = mpsc::UnboundedSender<serde_json::Value>;

struct SessionEntry {
    user_label: String,
    outbound: Outbound,
    joined: HashSet<RoomId>,
}

#[derive(Default)]
struct Inner {
    sessions: HashMap<ClientId, SessionEntry>,
    rooms: HashMap<RoomId, HashSet<ClientId>>,
}

/// Registry of connected sessions and room membership.
///
/// The lock is `std::sync::RwLock` rather than tokio's: no critical
/// section awaits, and membership writes are short compared to fan-out
/// reads.
pub struct RoomRegistry {
    inner: RwLock<Inner>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Register a freshly connected session. No room side effects.
    pub fn connect(&self, client: ClientId, user_label: impl Into<String>, outbound: Outbound) {
        let mut inner = self.write();
        inner.sessions.insert(
            client,
            SessionEntry {
                user_label: user_label.into(),
                outbound,
                joined: HashSet::new(),
            },
        );
    }

    /// Join a session to a room. Creates the room on first member.
    ///
    /// Returns `true` when membership actually changed; a duplicate join
    /// or a join by an unknown/disconnected session returns `false`.
    pub fn join(&self, client: ClientId, room: &RoomId) -> bool {
        let mut inner = self.write();
        let Some(session) = inner.sessions.get_mut(&client) else {
            return false;
        };
        if !session.joined.insert(room.clone()) {
            return false;
        }
        inner.rooms.entry(room.clone()).or_default().insert(client);
        true
    }

    /// Remove a session from a room, deleting the room when it empties.
    ///
    /// Returns `true` when the session was a member.
    pub fn leave(&self, client: ClientId, room: &RoomId) -> bool {
        let mut inner = self.write();
        let Some(session) = inner.sessions.get_mut(&client) else {
            return false;
        };
        if !session.joined.remove(room) {
            return false;
        }
        Self::remove_from_room(&mut inner, client, room);
        true
    }

    /// Tear down a session: remove it from every joined room (empty rooms
    /// are deleted) and drop its entry. Idempotent; returns the rooms the
    /// session was in, in no particular order.
    pub fn disconnect(&self, client: ClientId) -> Vec<RoomId> {
        let mut inner = self.write();
        let Some(session) = inner.sessions.remove(&client) else {
            return Vec::new();
        };
        let rooms: Vec<RoomId> = session.joined.into_iter().collect();
        for room in &rooms {
            Self::remove_from_room(&mut inner, client, room);
        }
        rooms
    }

    /// Point-in-time snapshot of a room's members and their outbound
    /// channels. Members may leave immediately after the read; senders to
    /// sessions mid-teardown simply fail and the frame is dropped.
    pub fn members(&self, room: &RoomId) -> Vec<(ClientId, Outbound)> {
        let inner = self.read();
        let Some(member_ids) = inner.rooms.get(room) else {
            return Vec::new();
        };
        member_ids
            .iter()
            .filter_map(|id| {
                inner
                    .sessions
                    .get(id)
                    .map(|s| (*id, s.outbound.clone()))
            })
            .collect()
    }

    /// Outbound channel for one session, if it is still connected.
    pub fn sender_of(&self, client: ClientId) -> Option<Outbound> {
        self.read().sessions.get(&client).map(|s| s.outbound.clone())
    }

    /// User label carried by a session (defaults to its client id string).
    pub fn user_label(&self, client: ClientId) -> Option<String> {
        self.read().sessions.get(&client).map(|s| s.user_label.clone())
    }

    /// Rooms a session currently belongs to.
    pub fn joined_rooms(&self, client: ClientId) -> Vec<RoomId> {
        self.read()
            .sessions
            .get(&client)
            .map(|s| s.joined.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Member ids of a room (empty if the room does not exist).
    pub fn member_ids(&self, room: &RoomId) -> Vec<ClientId> {
        self.read()
            .rooms
            .get(room)
            .map(|m| m.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Currently existing (non-empty) rooms.
    pub fn room_ids(&self) -> Vec<RoomId> {
        self.read().rooms.keys().cloned().collect()
    }

    pub fn room_count(&self) -> usize {
        self.read().rooms.len()
    }

    pub fn connection_count(&self) -> usize {
        self.read().sessions.len()
    }

    fn remove_from_room(inner: &mut Inner, client: ClientId, room: &RoomId) {
        if let Some(members) = inner.rooms.get_mut(room) {
            members.remove(&client);
            if members.is_empty() {
                inner.rooms.remove(room);
            }
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().expect("RoomRegistry lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().expect("RoomRegistry lock poisoned")
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}
