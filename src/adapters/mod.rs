//! Adapters - concrete implementations at the system boundary.

pub mod bus;
pub mod http;
pub mod websocket;
