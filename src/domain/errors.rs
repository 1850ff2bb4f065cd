//! Error types for the realtime core.

use thiserror::Error;

/// Errors raised by the scale-out bus transport.
///
/// Connection errors are fatal at startup when a bus was configured;
/// publish/decode errors mid-run are logged and never interrupt local
/// fan-out.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("bus connection failed: {0}")]
    Connection(String),

    #[error("bus publish failed: {0}")]
    Publish(String),

    #[error("bus subscribe failed: {0}")]
    Subscribe(String),

    #[error("bus message could not be decoded: {0}")]
    Decode(String),

    #[error("bridge already started")]
    AlreadyStarted,
}

/// Client-visible protocol errors.
///
/// These never crash the router: the event is dropped and, when the client
/// supplied an acknowledgment token, the error is encoded into the ack.
#[derive(Debug, Clone, Error)]
pub enum ProtocolError {
    #[error("unknown event name: {0}")]
    UnknownEvent(String),

    #[error("event '{name}' requires a room")]
    MissingRoom { name: String },

    #[error("invalid payload for '{name}': {reason}")]
    InvalidPayload { name: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_errors_render_the_event_name() {
        let err = ProtocolError::InvalidPayload {
            name: "chat:message".to_string(),
            reason: "message must be a string".to_string(),
        };
        assert!(err.to_string().contains("chat:message"));
    }
}
