pub mod test_link_failures;
pub mod test_mesh_formation;
pub mod test_room_access;

use std::time::Duration;
use tandem_client::{ClientHandle, LinkState, PeerView};
use tandem_core::Message;
use tokio::sync::watch;
use tracing::Level;

pub const ROOM: &str = "abc";
const WAIT: Duration = Duration::from_secs(10);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub async fn wait_until<T>(rx: &mut watch::Receiver<T>, what: &str, ready: impl FnMut(&T) -> bool) {
    let reached = tokio::time::timeout(WAIT, rx.wait_for(ready)).await;
    assert!(
        reached.is_ok_and(|r| r.is_ok()),
        "Timed out waiting for {what}"
    );
}

fn is_live(peer: &PeerView) -> bool {
    peer.state == LinkState::Connected && peer.open && peer.confirmed_name.is_some()
}

/// Waits until the client holds `count` open, identified links.
pub async fn wait_for_mesh(client: &ClientHandle, count: usize) {
    let mut peers = client.subscribe_peers();
    wait_until(&mut peers, &format!("{count} live peers"), |peers: &Vec<PeerView>| {
        peers.len() == count && peers.iter().all(is_live)
    })
    .await;
}

pub async fn wait_for_peer_count(client: &ClientHandle, count: usize) {
    let mut peers = client.subscribe_peers();
    wait_until(&mut peers, &format!("{count} peers"), |peers: &Vec<PeerView>| {
        peers.len() == count
    })
    .await;
}

pub async fn wait_for_text(client: &ClientHandle, text: &str) {
    let mut messages = client.subscribe_messages();
    wait_until(&mut messages, text, |messages: &Vec<Message>| {
        messages.iter().any(|m| m.text == text)
    })
    .await;
}

/// Notifications reporting a broken or expired link.
pub fn link_failures(client: &ClientHandle) -> Vec<String> {
    client
        .messages()
        .into_iter()
        .filter(|m| m.text.contains("failed") || m.text.contains("timed out"))
        .map(|m| m.text)
        .collect()
}
