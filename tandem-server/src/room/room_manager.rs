use crate::room::{JoinError, Room, RoomCommand};
use crate::signaling::SignalingOutput;
use crate::store::RoomStore;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::time::Duration;
use tandem_core::{Handshake, RoomId, SessionId, UserInfo};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

const JOIN_ATTEMPTS: usize = 3;

/// Registry of live room actors, spawned on first use.
#[derive(Clone)]
pub struct RoomManager {
    rooms: Arc<DashMap<RoomId, mpsc::Sender<RoomCommand>>>,
    store: Arc<dyn RoomStore>,
    signaling: Arc<dyn SignalingOutput>,
    idle_ttl: Option<Duration>,
}

impl RoomManager {
    pub fn new(
        store: Arc<dyn RoomStore>,
        signaling: Arc<dyn SignalingOutput>,
        idle_ttl: Option<Duration>,
    ) -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
            store,
            signaling,
            idle_ttl,
        }
    }

    /// Returns the inbox of the room's actor, starting a fresh actor when the
    /// room is unknown or its previous actor was evicted.
    pub fn get_room_sender(&self, room_id: &RoomId) -> mpsc::Sender<RoomCommand> {
        match self.rooms.entry(room_id.clone()) {
            Entry::Occupied(mut entry) => {
                if !entry.get().is_closed() {
                    return entry.get().clone();
                }
                let tx = self.spawn_room(room_id);
                entry.insert(tx.clone());
                tx
            }
            Entry::Vacant(entry) => {
                let tx = self.spawn_room(room_id);
                entry.insert(tx.clone());
                tx
            }
        }
    }

    /// Inbox of a live room, without creating one.
    pub fn existing_sender(&self, room_id: &RoomId) -> Option<mpsc::Sender<RoomCommand>> {
        self.rooms
            .get(room_id)
            .map(|tx| tx.clone())
            .filter(|tx| !tx.is_closed())
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    fn spawn_room(&self, room_id: &RoomId) -> mpsc::Sender<RoomCommand> {
        info!("Creating new room: {}", room_id);
        let (tx, rx) = mpsc::channel(100);

        let room = Room::new(
            room_id.clone(),
            rx,
            self.store.clone(),
            self.signaling.clone(),
            self.idle_ttl,
        );

        let rooms = self.rooms.clone();
        let id = room_id.clone();
        tokio::spawn(async move {
            room.run().await;
            rooms.remove_if(&id, |_, tx| tx.is_closed());
        });

        tx
    }

    /// Asks the room to admit `user`. A join racing with eviction is retried
    /// on a new actor.
    pub async fn join(
        &self,
        room_id: &RoomId,
        user: UserInfo,
        password: Option<String>,
    ) -> Result<(), JoinError> {
        for attempt in 1..=JOIN_ATTEMPTS {
            let sender = self.get_room_sender(room_id);
            let (reply, reply_rx) = oneshot::channel();
            let cmd = RoomCommand::Join {
                user: user.clone(),
                password: password.clone(),
                reply,
            };

            if sender.send(cmd).await.is_err() {
                debug!("Room '{}' closed before join (attempt {})", room_id, attempt);
                continue;
            }

            match reply_rx.await {
                Ok(result) => return result,
                Err(_) => debug!(
                    "Room '{}' dropped join unanswered (attempt {})",
                    room_id, attempt
                ),
            }
        }

        warn!("Giving up join of {} to '{}'", user.id, room_id);
        Err(JoinError::Unavailable)
    }

    pub async fn leave(&self, room_id: &RoomId, session_id: SessionId) {
        self.dispatch(room_id, RoomCommand::Leave { session_id }).await;
    }

    pub async fn relay(
        &self,
        room_id: &RoomId,
        from: SessionId,
        target: SessionId,
        handshake: Handshake,
    ) {
        let cmd = RoomCommand::Relay {
            from,
            target,
            handshake,
        };
        self.dispatch(room_id, cmd).await;
    }

    pub async fn rotate_password(&self, room_id: &RoomId, password: Option<String>) {
        let sender = self.get_room_sender(room_id);
        if sender
            .send(RoomCommand::RotatePassword { password })
            .await
            .is_err()
        {
            warn!("Room '{}' closed before password rotation", room_id);
        }
    }

    async fn dispatch(&self, room_id: &RoomId, cmd: RoomCommand) {
        let Some(sender) = self.existing_sender(room_id) else {
            warn!("Room '{}' is gone, dropping {:?}", room_id, cmd);
            return;
        };
        if let Err(e) = sender.send(cmd).await {
            warn!("Room '{}' died: {}", room_id, e);
        }
    }
}
