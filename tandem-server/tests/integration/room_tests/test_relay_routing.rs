use tandem_core::{Handshake, ServerSignal};
use tandem_server::RoomCommand;

use crate::integration::{create_test_room, init_tracing, user};

#[tokio::test]
async fn test_relay_stamps_server_known_sender() {
    init_tracing();

    let room = create_test_room(None);
    let (alice, bob) = (user("alice"), user("bob"));
    room.join(&alice, None).await.unwrap();
    room.join(&bob, None).await.unwrap();

    room.send(RoomCommand::Relay {
        from: alice.id,
        target: bob.id,
        handshake: Handshake::Offer { sdp: "v=0".into() },
    })
    .await;
    room.settle(&alice, None).await;

    assert_eq!(
        room.signaling.last_for(&bob.id, "offer").await,
        Some(ServerSignal::Offer {
            sdp: "v=0".into(),
            target: bob.id,
            from: alice.id,
            username: "alice".into(),
        })
    );
    assert_eq!(room.signaling.count_for(&alice.id, "offer").await, 0);
}

#[tokio::test]
async fn test_relay_to_non_member_is_dropped() {
    init_tracing();

    let room = create_test_room(None);
    let (alice, bob, stranger) = (user("alice"), user("bob"), user("stranger"));
    room.join(&alice, None).await.unwrap();
    room.join(&bob, None).await.unwrap();

    room.send(RoomCommand::Relay {
        from: alice.id,
        target: stranger.id,
        handshake: Handshake::Answer { sdp: "v=0".into() },
    })
    .await;
    room.send(RoomCommand::Relay {
        from: stranger.id,
        target: bob.id,
        handshake: Handshake::Offer { sdp: "v=0".into() },
    })
    .await;
    room.settle(&alice, None).await;

    assert!(room.signaling.signals_for(&stranger.id).await.is_empty());
    assert_eq!(room.signaling.count_for(&bob.id, "offer").await, 0);
    // No error is reported back to the sender.
    assert_eq!(room.signaling.count_for(&alice.id, "error").await, 0);
}
