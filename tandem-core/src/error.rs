use crate::model::SessionId;
use std::time::Duration;
use thiserror::Error;

/// Signaling envelope the relay cannot act on.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Invalid message format: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Unknown message type")]
    UnknownType(String),
}

/// Join rejected by the room's password gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("This room requires a password.")]
    PasswordRequired,
    #[error("Incorrect password for room.")]
    AuthFailed,
}

/// A relayed envelope could not be delivered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    #[error("sender is not in a room")]
    NotInRoom,
    #[error("target {0} is not a member of the room")]
    UnknownTarget(SessionId),
    #[error("target {0:?} is not a session id")]
    InvalidTarget(String),
    #[error("target {0} is not connected")]
    Unreachable(SessionId),
}

/// Handshake or channel failure of a single peer link.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("handshake failed: {0}")]
    Handshake(String),
    #[error("channel failed: {0}")]
    Channel(String),
    #[error("not connected after {0:?}")]
    Timeout(Duration),
    #[error("{input} is not valid while {state}")]
    UnexpectedInput { state: String, input: &'static str },
    #[error("link closed while a handshake step was in flight")]
    Cancelled,
}

/// Peer payload that is not a recognised JSON message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplicationError {
    #[error("undecodable channel payload")]
    Undecodable { raw: String },
}
