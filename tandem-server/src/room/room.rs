use crate::room::admission::{JoinOutcome, admit, rotate_password};
use crate::room::room_command::{JoinError, RoomCommand};
use crate::signaling::SignalingOutput;
use crate::store::{RoomRecord, RoomStore, StoreError};
use std::sync::Arc;
use std::time::Duration;
use tandem_core::{AuthError, Handshake, RoomId, RoutingError, ServerSignal, SessionId, UserInfo};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Actor owning every mutation of one room.
///
/// Membership changes and the rosters broadcast from them are produced in
/// command order, so all members observe the same sequence.
pub struct Room {
    id: RoomId,
    command_rx: mpsc::Receiver<RoomCommand>,
    store: Arc<dyn RoomStore>,
    signaling: Arc<dyn SignalingOutput>,
    idle_ttl: Option<Duration>,
    occupied: bool,
}

impl Room {
    pub fn new(
        id: RoomId,
        command_rx: mpsc::Receiver<RoomCommand>,
        store: Arc<dyn RoomStore>,
        signaling: Arc<dyn SignalingOutput>,
        idle_ttl: Option<Duration>,
    ) -> Self {
        Self {
            id,
            command_rx,
            store,
            signaling,
            idle_ttl,
            occupied: false,
        }
    }

    pub async fn run(mut self) {
        info!("Room '{}' event loop started", self.id);

        loop {
            let idle_ttl = self.idle_ttl.filter(|_| !self.occupied);

            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(c) => self.handle_command(c).await,
                        None => {
                            info!("Command channel of room '{}' closed", self.id);
                            break;
                        }
                    }
                }

                _ = tokio::time::sleep(idle_ttl.unwrap_or_default()), if idle_ttl.is_some() => {
                    self.evict().await;
                    break;
                }
            }
        }

        info!("Room '{}' event loop finished", self.id);
    }

    async fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join {
                user,
                password,
                reply,
            } => {
                let result = self.join(user, password).await;
                let _ = reply.send(result);
            }

            RoomCommand::Leave { session_id } => self.leave(session_id).await,

            RoomCommand::Relay {
                from,
                target,
                handshake,
            } => {
                let kind = handshake.kind();
                if let Err(e) = self.relay(from, target, handshake).await {
                    warn!("Dropped {} from {} in room '{}': {}", kind, from, self.id, e);
                }
            }

            RoomCommand::Broadcast { signal, exclude } => {
                if let Some(record) = self.load().await {
                    self.broadcast(&record.members, signal, exclude).await;
                }
            }

            RoomCommand::RotatePassword { password } => {
                let result = self
                    .store
                    .update(
                        &self.id,
                        Box::new(|record: &mut RoomRecord| {
                            rotate_password(record, password.as_deref())
                        }),
                    )
                    .await;
                match result {
                    Ok(_) => info!("Password of room '{}' rotated", self.id),
                    Err(e) => error!("Failed to rotate password of '{}': {}", self.id, e),
                }
            }
        }
    }

    async fn join(&mut self, user: UserInfo, password: Option<String>) -> Result<(), JoinError> {
        let session_id = user.id;
        let username = user.username.clone();
        info!("Processing join of {} ({}) to '{}'", username, session_id, self.id);

        let mut outcome = None;
        let result = self
            .store
            .update(
                &self.id,
                Box::new(|record: &mut RoomRecord| {
                    outcome = Some(admit(record, user, password.as_deref()));
                }),
            )
            .await;

        let record = match result {
            Ok(record) => record,
            Err(e) => {
                error!("Store failed during join to '{}': {}", self.id, e);
                self.send(session_id, ServerSignal::error("Could not join room, try again."))
                    .await;
                return Err(e.into());
            }
        };
        self.occupied = !record.is_empty();

        let Some(outcome) = outcome else {
            return Err(StoreError::Unavailable("join was not applied".into()).into());
        };

        match outcome {
            JoinOutcome::Admitted => {
                self.send(
                    session_id,
                    ServerSignal::RoomJoined {
                        room_id: self.id.to_string(),
                        username: username.clone(),
                        users: record.members.clone(),
                        message: Some(format!("Welcome to room {}, {}!", self.id, username)),
                    },
                )
                .await;

                let roster = ServerSignal::UserList {
                    users: record.members.clone(),
                };
                self.broadcast(&record.members, roster, Some(session_id)).await;

                info!(
                    "{} joined '{}' ({} members)",
                    username,
                    self.id,
                    record.members.len()
                );
                Ok(())
            }

            JoinOutcome::Rejected(reason) => {
                info!("Join of {} to '{}' rejected: {}", username, self.id, reason);
                let message = Some(reason.to_string());
                let signal = match reason {
                    AuthError::PasswordRequired => ServerSignal::PasswordRequired { message },
                    AuthError::AuthFailed => ServerSignal::AuthFailed { message },
                };
                self.send(session_id, signal).await;
                Err(reason.into())
            }
        }
    }

    async fn leave(&mut self, session_id: SessionId) {
        let mut removed = None;
        let result = self
            .store
            .update(
                &self.id,
                Box::new(|record: &mut RoomRecord| {
                    if let Some(pos) = record.members.iter().position(|m| m.id == session_id) {
                        removed = Some(record.members.remove(pos));
                    }
                }),
            )
            .await;

        let record = match result {
            Ok(record) => record,
            Err(e) => {
                error!("Store failed during leave from '{}': {}", self.id, e);
                return;
            }
        };
        self.occupied = !record.is_empty();

        let Some(user) = removed else {
            debug!("{} is not a member of '{}'", session_id, self.id);
            return;
        };

        info!("{} left '{}'", user.username, self.id);
        let signal = ServerSignal::UserLeft {
            username: user.username,
            peer_id: user.id,
            users: record.members.clone(),
        };
        self.broadcast(&record.members, signal, None).await;
    }

    async fn relay(
        &mut self,
        from: SessionId,
        target: SessionId,
        handshake: Handshake,
    ) -> Result<(), RoutingError> {
        let record = self.load().await.ok_or(RoutingError::NotInRoom)?;
        let sender = record.member(&from).ok_or(RoutingError::NotInRoom)?;
        if record.member(&target).is_none() {
            return Err(RoutingError::UnknownTarget(target));
        }

        debug!("Relaying {} {} -> {}", handshake.kind(), from, target);
        let signal = handshake.to_server(target, from, sender.username.clone());
        self.signaling.send_signal(target, signal).await
    }

    async fn broadcast(
        &self,
        members: &[UserInfo],
        signal: ServerSignal,
        exclude: Option<SessionId>,
    ) {
        for member in members.iter().filter(|m| Some(m.id) != exclude) {
            if let Err(e) = self.signaling.send_signal(member.id, signal.clone()).await {
                warn!("Skipping {} for {}: {}", signal.kind(), member.username, e);
            }
        }
    }

    async fn send(&self, session_id: SessionId, signal: ServerSignal) {
        let kind = signal.kind();
        if let Err(e) = self.signaling.send_signal(session_id, signal).await {
            warn!("Failed to send {} to {}: {}", kind, session_id, e);
        }
    }

    async fn load(&mut self) -> Option<RoomRecord> {
        match self.store.get(&self.id).await {
            Ok(record) => {
                self.occupied = record.as_ref().is_some_and(|r| !r.is_empty());
                record
            }
            Err(e) => {
                error!("Failed to load room '{}': {}", self.id, e);
                None
            }
        }
    }

    /// Deletes the record, then refuses further commands. Joins already
    /// queued are dropped unanswered so their senders retry on a new actor.
    async fn evict(&mut self) {
        info!("Room '{}' idle, evicting", self.id);

        if let Err(e) = self.store.delete(&self.id).await {
            error!("Failed to delete room '{}': {}", self.id, e);
        }

        self.command_rx.close();
        let mut dropped = 0;
        while self.command_rx.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            debug!("Dropped {} commands queued on evicted room '{}'", dropped, self.id);
        }
    }
}
