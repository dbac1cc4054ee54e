pub mod room_tests;
pub mod socket_tests;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::Level;

use tandem_core::{RoomId, SessionId, UserInfo};
use tandem_server::{InMemoryRoomStore, JoinError, Room, RoomCommand, RoomRecord, RoomStore};

use crate::utils::{MockSignalingOutput, SentSignal};

pub const ROOM: &str = "abc";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub struct TestRoom {
    pub cmd_tx: mpsc::Sender<RoomCommand>,
    pub signal_rx: mpsc::UnboundedReceiver<SentSignal>,
    pub signaling: MockSignalingOutput,
    pub store: Arc<InMemoryRoomStore>,
}

impl TestRoom {
    pub async fn join(&self, user: &UserInfo, password: Option<&str>) -> Result<(), JoinError> {
        let (reply, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(RoomCommand::Join {
                user: user.clone(),
                password: password.map(str::to_owned),
                reply,
            })
            .await
            .expect("Room is running");
        reply_rx.await.expect("Room answered the join")
    }

    pub async fn send(&self, cmd: RoomCommand) {
        self.cmd_tx.send(cmd).await.expect("Room is running");
    }

    /// Waits until every command sent so far has been handled.
    ///
    /// A re-join of an existing member is answered in order and changes nothing.
    pub async fn settle(&self, member: &UserInfo, password: Option<&str>) {
        self.join(member, password).await.expect("Member re-joins");
    }

    pub async fn record(&self) -> RoomRecord {
        self.store
            .get(&RoomId::from(ROOM))
            .await
            .unwrap()
            .expect("Room record exists")
    }

    pub async fn member_ids(&self) -> Vec<SessionId> {
        self.record().await.members.iter().map(|m| m.id).collect()
    }
}

pub fn create_test_room(idle_ttl: Option<Duration>) -> TestRoom {
    let (cmd_tx, cmd_rx) = mpsc::channel::<RoomCommand>(100);
    let (signaling, signal_rx) = MockSignalingOutput::new();
    let store = Arc::new(InMemoryRoomStore::new());

    let room = Room::new(
        RoomId::from(ROOM),
        cmd_rx,
        store.clone(),
        Arc::new(signaling.clone()),
        idle_ttl,
    );

    tokio::spawn(async move {
        room.run().await;
    });

    TestRoom {
        cmd_tx,
        signal_rx,
        signaling,
        store,
    }
}

pub fn user(name: &str) -> UserInfo {
    UserInfo::new(SessionId::new(), name)
}
