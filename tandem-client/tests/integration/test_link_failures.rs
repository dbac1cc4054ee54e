use std::time::Duration;
use tandem_client::{ClientConfig, LinkState, PeerView, start};

use crate::integration::{
    ROOM, init_tracing, link_failures, wait_for_mesh, wait_for_peer_count, wait_for_text,
    wait_until,
};
use crate::utils::{Fault, MemoryHub, client_config, spawn_relay};

fn short_timeout(url: &str, username: &str) -> ClientConfig {
    client_config(url, ROOM, username).with_link_timeout(Duration::from_secs(1))
}

#[tokio::test]
async fn test_stalled_handshake_times_out_without_touching_other_links() {
    init_tracing();

    let (url, _state) = spawn_relay().await;
    let hub = MemoryHub::new();
    let alice = start(short_timeout(&url, "alice"), hub.factory("alice"));
    let bob = start(short_timeout(&url, "bob"), hub.factory("bob"));
    wait_for_mesh(&alice, 1).await;
    wait_for_mesh(&bob, 1).await;

    let carol = start(
        short_timeout(&url, "carol"),
        hub.faulty_factory("carol", Fault::StallAnswer),
    );
    wait_for_text(&carol, "Connection with alice timed out after 1s.").await;
    wait_for_text(&carol, "Connection with bob timed out after 1s.").await;
    wait_for_peer_count(&carol, 0).await;
    assert!(!link_failures(&carol).iter().any(|t| t.contains("failed")));

    // Whichever side gives up first, alice and bob drop carol and keep each other.
    wait_for_mesh(&alice, 1).await;
    wait_for_mesh(&bob, 1).await;
    assert_eq!(hub.closed_by_owner("carol"), 2);

    alice.send_chat("after the timeout").unwrap();
    wait_for_text(&bob, "after the timeout").await;
}

#[tokio::test]
async fn test_handshake_failure_stays_on_one_link() {
    init_tracing();

    let (url, _state) = spawn_relay().await;
    let hub = MemoryHub::new();
    let alice = start(short_timeout(&url, "alice"), hub.factory("alice"));
    let bob = start(short_timeout(&url, "bob"), hub.factory("bob"));
    wait_for_mesh(&alice, 1).await;
    wait_for_mesh(&bob, 1).await;

    let carol = start(
        short_timeout(&url, "carol"),
        hub.faulty_factory("carol", Fault::RejectRemote),
    );
    for name in ["alice", "bob"] {
        wait_for_text(
            &carol,
            &format!("Connection with {name} failed: handshake failed: remote description rejected"),
        )
        .await;
    }
    wait_for_peer_count(&carol, 0).await;

    // The offers to carol were never answered.
    for client in [&alice, &bob] {
        wait_for_text(client, "Connection with carol timed out after 1s.").await;
        wait_for_mesh(client, 1).await;
        assert!(client.peers().iter().all(|p| p.provisional_name != "carol"));
    }

    bob.send_chat("carol never made it").unwrap();
    wait_for_text(&alice, "carol never made it").await;
    assert_eq!(link_failures(&alice), ["Connection with carol timed out after 1s."]);
}

#[tokio::test]
async fn test_closing_a_link_mid_handshake_is_quiet() {
    init_tracing();

    let (url, _state) = spawn_relay().await;
    let hub = MemoryHub::new();
    let alice = start(client_config(&url, ROOM, "alice"), hub.factory("alice"));
    wait_for_text(&alice, "You joined the room.").await;

    let carol = start(
        client_config(&url, ROOM, "carol"),
        hub.faulty_factory("carol", Fault::StallAnswer),
    );

    // carol's answer never comes; catch the link while it is still answering.
    let mut peers = carol.subscribe_peers();
    wait_until(&mut peers, "alice answering", |peers: &Vec<PeerView>| {
        peers
            .iter()
            .any(|p| p.provisional_name == "alice" && p.state == LinkState::Answering)
    })
    .await;
    let alice_id = carol.peers()[0].id;

    carol.close_peer(alice_id).unwrap();
    wait_for_peer_count(&carol, 0).await;

    for _ in 0..50 {
        if hub.closed_by_owner("carol") == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(hub.closed_by_owner("carol"), 1);
    assert_eq!(link_failures(&carol), Vec::<String>::new());
}
