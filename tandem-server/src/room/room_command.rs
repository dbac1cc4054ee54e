use crate::store::StoreError;
use tandem_core::{AuthError, Handshake, ServerSignal, SessionId, UserInfo};
use thiserror::Error;
use tokio::sync::oneshot;

#[derive(Debug, Error)]
pub enum JoinError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Room is unavailable, try again.")]
    Unavailable,
}

pub type JoinReply = oneshot::Sender<Result<(), JoinError>>;

/// Commands a room actor receives from connection tasks.
#[derive(Debug)]
pub enum RoomCommand {
    /// Admission request. The reply is dropped unanswered when the room is
    /// evicted before handling it; the caller retries on a fresh room.
    Join {
        user: UserInfo,
        password: Option<String>,
        reply: JoinReply,
    },

    /// Explicit leave or disconnect of a session.
    Leave { session_id: SessionId },

    /// Offer / answer / candidate addressed to another member.
    Relay {
        from: SessionId,
        target: SessionId,
        handshake: Handshake,
    },

    Broadcast {
        signal: ServerSignal,
        exclude: Option<SessionId>,
    },

    RotatePassword { password: Option<String> },
}
