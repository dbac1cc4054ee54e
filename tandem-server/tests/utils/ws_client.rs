use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::time::Duration;
use tandem_core::SessionId;
use tandem_server::{AppState, RelayConfig, router};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

/// Timeout for a single expected envelope (ms).
pub const RECV_TIMEOUT_MS: u64 = 5000;

/// Starts a relay on an ephemeral local port.
pub async fn spawn_relay(config: RelayConfig) -> (SocketAddr, AppState) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = AppState::new(&config);
    let app = router(state.clone());

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state)
}

/// Raw signaling client speaking JSON text frames.
pub struct WsClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    pub session_id: SessionId,
}

impl WsClient {
    pub async fn connect(addr: SocketAddr) -> Self {
        Self::connect_path(addr, "/ws").await
    }

    /// Connects and consumes the `welcome` envelope.
    pub async fn connect_path(addr: SocketAddr, path: &str) -> Self {
        let (stream, _) = connect_async(format!("ws://{addr}{path}"))
            .await
            .expect("Failed to connect to relay");

        let mut client = Self {
            stream,
            session_id: SessionId::default(),
        };
        let welcome = client.recv_type("welcome").await;
        client.session_id = welcome["sessionId"]
            .as_str()
            .and_then(|s| s.parse().ok())
            .expect("welcome carries a session id");
        client
    }

    pub async fn send(&mut self, value: Value) {
        self.send_raw(&value.to_string()).await;
    }

    pub async fn send_raw(&mut self, text: &str) {
        self.stream
            .send(Message::Text(text.to_owned()))
            .await
            .expect("Failed to send frame");
    }

    pub async fn recv(&mut self) -> Value {
        let deadline = Duration::from_millis(RECV_TIMEOUT_MS);
        loop {
            let frame = tokio::time::timeout(deadline, self.stream.next())
                .await
                .expect("Timeout waiting for envelope")
                .expect("Relay closed the connection")
                .expect("WebSocket error");

            if let Message::Text(text) = frame {
                return serde_json::from_str(&text).expect("Relay sent invalid JSON");
            }
        }
    }

    /// Skips envelopes until one of type `kind` arrives.
    pub async fn recv_type(&mut self, kind: &str) -> Value {
        loop {
            let value = self.recv().await;
            if value["type"] == kind {
                return value;
            }
        }
    }

    pub async fn join(&mut self, room: &str, username: &str, password: Option<&str>) -> Value {
        let mut envelope = json!({ "type": "join-room", "roomId": room, "username": username });
        if let Some(password) = password {
            envelope["password"] = json!(password);
        }
        self.send(envelope).await;
        self.recv().await
    }

    pub async fn close(mut self) {
        let _ = self.stream.close(None).await;
    }
}
