use tandem_core::{AuthError, ServerSignal};
use tandem_server::{JoinError, RoomCommand};

use crate::integration::{create_test_room, init_tracing, user};

#[tokio::test]
async fn test_wrong_password_is_rejected() {
    init_tracing();

    let room = create_test_room(None);
    let (owner, intruder) = (user("owner"), user("intruder"));

    room.join(&owner, Some("secret")).await.unwrap();
    let res = room.join(&intruder, Some("guess")).await;

    assert!(matches!(res, Err(JoinError::Auth(AuthError::AuthFailed))));
    assert_eq!(
        room.signaling.last_for(&intruder.id, "auth-failed").await,
        Some(ServerSignal::AuthFailed {
            message: Some("Incorrect password for room.".into())
        })
    );
    assert_eq!(room.signaling.count_for(&intruder.id, "room-joined").await, 0);
    assert_eq!(room.signaling.count_for(&owner.id, "user-list").await, 0);
    assert_eq!(room.member_ids().await, vec![owner.id]);
    assert_eq!(room.record().await.password.as_deref(), Some("secret"));
}

#[tokio::test]
async fn test_rotated_password_gates_new_joins() {
    init_tracing();

    let room = create_test_room(None);
    let (owner, late, later) = (user("owner"), user("late"), user("later"));

    room.join(&owner, Some("one")).await.unwrap();
    room.send(RoomCommand::RotatePassword {
        password: Some("two".into()),
    })
    .await;

    let res = room.join(&late, Some("one")).await;
    assert!(matches!(res, Err(JoinError::Auth(AuthError::AuthFailed))));

    room.join(&later, Some("two")).await.expect("new password admits");
    assert_eq!(room.member_ids().await, vec![owner.id, later.id]);
}
