use async_trait::async_trait;
use tandem_core::{RoutingError, ServerSignal, SessionId};

/// Outbound half of the relay: how a room reaches a session's connection.
#[async_trait]
pub trait SignalingOutput: Send + Sync {
    /// Queues `signal` for the session. Fails with `Unreachable` when the
    /// session has no writable connection.
    async fn send_signal(&self, session_id: SessionId, signal: ServerSignal)
    -> Result<(), RoutingError>;
}
