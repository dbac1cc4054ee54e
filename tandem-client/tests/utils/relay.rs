use std::time::Duration;
use tandem_client::{ClientConfig, ReconnectPolicy};
use tandem_server::{AppState, RelayConfig, router};
use tokio::net::TcpListener;

/// Starts a relay on an ephemeral local port and returns its socket URL.
pub async fn spawn_relay() -> (String, AppState) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = AppState::new(&RelayConfig::default());
    let app = router(state.clone());

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("ws://{addr}/ws"), state)
}

pub fn client_config(url: &str, room: &str, username: &str) -> ClientConfig {
    ClientConfig::new(url, room, username)
        .with_link_timeout(Duration::from_secs(5))
        .with_reconnect(ReconnectPolicy {
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(200),
            max_retries: 2,
        })
}
