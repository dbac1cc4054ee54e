use crate::AppState;
use crate::room::JoinError;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tandem_core::{
    ClientSignal, Handshake, RoomId, RoutingError, ServerSignal, SessionId, UserInfo,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let session_id = SessionId::new();

    ws.on_upgrade(move |socket| handle_socket(socket, session_id, state))
}

async fn handle_socket(socket: WebSocket, session_id: SessionId, state: AppState) {
    info!("New WebSocket connection: {}", session_id);

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    state.signaling.add_session(session_id, tx);

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    let mut session = Session::new(session_id);
    session.reply(&state, ServerSignal::Welcome { session_id });
    let ice_servers = state.signaling.get_ice_servers();
    if !ice_servers.is_empty() {
        session.reply(&state, ServerSignal::IceConfig { ice_servers });
    }

    loop {
        tokio::select! {
            frame = receiver.next() => match frame {
                Some(Ok(Message::Text(text))) => session.handle_text(&state, text.as_str()).await,
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!("WebSocket error for {}: {}", session_id, e);
                    break;
                }
            },
            _ = &mut send_task => break,
        }
    }

    send_task.abort();
    session.leave(&state).await;
    state.signaling.remove_session(&session_id);
    info!("WebSocket disconnected: {}", session_id);
}

/// Connection-local view of one client.
struct Session {
    id: SessionId,
    room: Option<RoomId>,
}

impl Session {
    fn new(id: SessionId) -> Self {
        Self { id, room: None }
    }

    fn reply(&self, state: &AppState, signal: ServerSignal) {
        if let Err(e) = state.signaling.deliver(self.id, &signal) {
            warn!("Failed to reply {}: {}", signal.kind(), e);
        }
    }

    async fn handle_text(&mut self, state: &AppState, text: &str) {
        match ClientSignal::parse(text) {
            Ok(signal) => self.handle_signal(state, signal).await,
            Err(e) => {
                warn!("Invalid message from {}: {}", self.id, e);
                self.reply(state, ServerSignal::error(e.to_string()));
            }
        }
    }

    async fn handle_signal(&mut self, state: &AppState, signal: ClientSignal) {
        match signal {
            ClientSignal::JoinRoom {
                room_id,
                username,
                password,
            } => self.join(state, room_id, username, password).await,

            ClientSignal::LeaveRoom { .. } => self.leave(state).await,

            handshake => {
                if let Some((target, handshake)) = handshake.into_handshake() {
                    self.relay(state, target, handshake).await;
                }
            }
        }
    }

    async fn join(
        &mut self,
        state: &AppState,
        room_id: String,
        username: String,
        password: Option<String>,
    ) {
        if room_id.is_empty() || username.is_empty() {
            self.reply(
                state,
                ServerSignal::error("Room ID and username are required to join."),
            );
            return;
        }

        let room_id = RoomId::from(room_id);
        if self.room.as_ref().is_some_and(|current| *current != room_id) {
            self.leave(state).await;
        }

        info!("{} ({}) wants to join room '{}'", username, self.id, room_id);
        let user = UserInfo::new(self.id, username);
        match state.rooms.join(&room_id, user, password).await {
            Ok(()) => self.room = Some(room_id),
            Err(JoinError::Unavailable) => {
                self.reply(state, ServerSignal::error(JoinError::Unavailable.to_string()));
            }
            Err(e) => debug!("Join of {} to '{}' failed: {}", self.id, room_id, e),
        }
    }

    /// Leaves the current room at most once per membership.
    async fn leave(&mut self, state: &AppState) {
        if let Some(room_id) = self.room.take() {
            state.rooms.leave(&room_id, self.id).await;
        }
    }

    async fn relay(&self, state: &AppState, target: String, handshake: Handshake) {
        let Some(room_id) = &self.room else {
            warn!(
                "Dropped {} from {}: {}",
                handshake.kind(),
                self.id,
                RoutingError::NotInRoom
            );
            return;
        };
        let Ok(target_id) = target.parse::<SessionId>() else {
            warn!(
                "Dropped {} from {}: {}",
                handshake.kind(),
                self.id,
                RoutingError::InvalidTarget(target)
            );
            return;
        };
        state.rooms.relay(room_id, self.id, target_id, handshake).await;
    }
}
