//! Classcast - room-scoped real-time event broadcasting
//!
//! Clients connect over WebSockets, join named rooms and exchange events
//! (chat, presence, progress) that are fanned out to every other room
//! member. With a Redis bus configured, multiple instances behave as one
//! logical broadcast domain.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
