use crate::signaling::SignalingOutput;
use async_trait::async_trait;
use axum::extract::ws::Message;
use dashmap::DashMap;
use std::sync::Arc;
use tandem_core::{IceServerConfig, RoutingError, ServerSignal, SessionId};
use tokio::sync::mpsc;
use tracing::{debug, error};

struct SignalingInner {
    sessions: DashMap<SessionId, mpsc::UnboundedSender<Message>>,
    ice_servers: Vec<IceServerConfig>,
}

/// Per-session outboxes of the open WebSocket connections.
#[derive(Clone)]
pub struct SignalingService {
    inner: Arc<SignalingInner>,
}

impl SignalingService {
    pub fn new(ice_servers: Vec<IceServerConfig>) -> Self {
        Self {
            inner: Arc::new(SignalingInner {
                sessions: DashMap::new(),
                ice_servers,
            }),
        }
    }

    pub fn get_ice_servers(&self) -> Vec<IceServerConfig> {
        self.inner.ice_servers.clone()
    }

    pub fn add_session(&self, session_id: SessionId, tx: mpsc::UnboundedSender<Message>) {
        self.inner.sessions.insert(session_id, tx);
    }

    pub fn remove_session(&self, session_id: &SessionId) {
        self.inner.sessions.remove(session_id);
    }

    pub fn session_count(&self) -> usize {
        self.inner.sessions.len()
    }

    pub fn deliver(&self, session_id: SessionId, signal: &ServerSignal) -> Result<(), RoutingError> {
        let Some(outbox) = self.inner.sessions.get(&session_id) else {
            return Err(RoutingError::Unreachable(session_id));
        };

        let json = match serde_json::to_string(signal) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize {}: {}", signal.kind(), e);
                return Ok(());
            }
        };

        debug!("-> {} {}", session_id, signal.kind());
        outbox.send(Message::Text(json.into())).map_err(|e| {
            error!("Failed to send WS message to {}: {}", session_id, e);
            RoutingError::Unreachable(session_id)
        })
    }
}

#[async_trait]
impl SignalingOutput for SignalingService {
    async fn send_signal(
        &self,
        session_id: SessionId,
        signal: ServerSignal,
    ) -> Result<(), RoutingError> {
        self.deliver(session_id, &signal)
    }
}
