use serde_json::json;
use tandem_server::RelayConfig;

use crate::integration::init_tracing;
use crate::utils::{WsClient, spawn_relay};

#[tokio::test]
async fn test_client_supplied_from_is_rewritten() {
    init_tracing();

    let (addr, _state) = spawn_relay(RelayConfig::default()).await;
    let mut alice = WsClient::connect(addr).await;
    let mut bob = WsClient::connect(addr).await;

    alice.join("abc", "alice", None).await;
    bob.join("abc", "bob", None).await;
    let roster = alice.recv_type("user-list").await;
    assert_eq!(roster["users"].as_array().unwrap().len(), 2);

    let candidate = json!({ "candidate": "candidate:1 1 UDP 1 10.0.0.1 5000 typ host", "sdpMid": "0" });
    alice
        .send(json!({
            "type": "candidate",
            "candidate": candidate,
            "target": bob.session_id.to_string(),
            "from": "bob-pretending",
            "username": "mallory",
        }))
        .await;

    let relayed = bob.recv_type("candidate").await;
    assert_eq!(relayed["from"], alice.session_id.to_string().as_str());
    assert_eq!(relayed["username"], "alice");
    assert_eq!(relayed["candidate"], candidate);

    alice.close().await;
    bob.close().await;
}

#[tokio::test]
async fn test_password_flow_over_socket() {
    init_tracing();

    let (addr, _state) = spawn_relay(RelayConfig::default()).await;
    let mut owner = WsClient::connect(addr).await;
    let mut guest = WsClient::connect(addr).await;

    assert_eq!(
        owner.join("vault", "owner", Some("x")).await["type"],
        "room-joined"
    );
    assert_eq!(
        guest.join("vault", "guest", None).await,
        json!({ "type": "password-required", "message": "This room requires a password." })
    );
    assert_eq!(
        guest.join("vault", "guest", Some("y")).await,
        json!({ "type": "auth-failed", "message": "Incorrect password for room." })
    );

    // A rejected session cannot relay into the room.
    guest
        .send(json!({ "type": "offer", "sdp": "v=0", "target": owner.session_id.to_string() }))
        .await;
    assert_eq!(
        guest.join("vault", "guest", Some("x")).await["type"],
        "room-joined"
    );
    let next = owner.recv().await;
    assert_eq!(next["type"], "user-list");

    owner.close().await;
    guest.close().await;
}
