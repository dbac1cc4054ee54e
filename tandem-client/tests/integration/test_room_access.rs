use tandem_client::start;

use crate::integration::{ROOM, init_tracing, wait_for_mesh, wait_for_text};
use crate::utils::{MemoryHub, client_config, spawn_relay};

#[tokio::test]
async fn test_password_gate_is_reported() {
    init_tracing();

    let (url, _state) = spawn_relay().await;
    let hub = MemoryHub::new();
    let owner = start(
        client_config(&url, ROOM, "owner").with_password(Some("secret".into())),
        hub.factory("owner"),
    );
    wait_for_text(&owner, "You joined the room.").await;

    let nopass = start(client_config(&url, ROOM, "nopass"), hub.factory("nopass"));
    wait_for_text(&nopass, "This room requires a password.").await;

    let wrong = start(
        client_config(&url, ROOM, "wrong").with_password(Some("guess".into())),
        hub.factory("wrong"),
    );
    wait_for_text(&wrong, "Password incorrect for room.").await;

    let friend = start(
        client_config(&url, ROOM, "friend").with_password(Some("secret".into())),
        hub.factory("friend"),
    );
    wait_for_mesh(&friend, 1).await;
    wait_for_mesh(&owner, 1).await;

    assert!(nopass.peers().is_empty());
    assert!(wrong.peers().is_empty());
}

#[tokio::test]
async fn test_unreachable_relay_gives_up() {
    init_tracing();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let hub = MemoryHub::new();
    let client = start(
        client_config(&format!("ws://{addr}/ws"), ROOM, "alice"),
        hub.factory("alice"),
    );

    wait_for_text(
        &client,
        "Could not reach the signaling server after 2 retries. Chat is offline.",
    )
    .await;
    assert!(client.session_id().is_none());
}
