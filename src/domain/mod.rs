//! Core domain types: identifiers, timestamps, room events and errors.

mod errors;
mod event;
mod ids;
mod timestamp;

pub use errors::{BusError, ProtocolError};
pub use event::{BridgeMessage, RoomEvent};
pub use ids::{ClientId, InstanceId, RoomId};
pub use timestamp::Timestamp;
