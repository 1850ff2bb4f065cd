//! Realtime WebSocket adapter: wire protocol, room registry, event router,
//! scale-out bridge and the connection handler.

pub mod bridge;
pub mod handler;
pub mod messages;
pub mod registry;
pub mod router;

pub use bridge::{BusBridge, NullBridge, RoomBridge};
pub use handler::{realtime_router, RealtimeState};
pub use messages::{ClientEnvelope, ServerMessage};
pub use registry::{Outbound, RoomRegistry};
pub use router::EventRouter;
