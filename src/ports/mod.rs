//! Ports - interfaces the realtime core depends on.

mod bus;

pub use bus::{BusStream, BusTransport};
