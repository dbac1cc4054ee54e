mod dispatch;
mod roster;

pub use dispatch::*;
pub use roster::*;

use crate::channel::{ChannelFactory, Role, WebRtcChannelFactory};
use crate::config::ClientConfig;
use crate::directory::{PeerDirectory, PeerView};
use crate::link::{LinkCommand, LinkController, LinkReport, LinkParams, LinkState, LinkUpdate, spawn_link};
use crate::message_log::MessageLog;
use crate::relay::{RelayControl, RelayEvent};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tandem_core::{ChannelPayload, ClientSignal, LinkError, Message, ServerSignal, SessionId};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("client has stopped")]
    Stopped,
}

enum ClientCommand {
    SendChat(String),
    ClosePeer(SessionId),
    Leave(oneshot::Sender<()>),
}

/// Display-side handle of a running client.
#[derive(Clone)]
pub struct ClientHandle {
    commands: mpsc::UnboundedSender<ClientCommand>,
    peers: watch::Receiver<Vec<PeerView>>,
    messages: watch::Receiver<Vec<Message>>,
    session: watch::Receiver<Option<SessionId>>,
}

impl ClientHandle {
    /// Logs the message locally and sends it to every connected peer.
    pub fn send_chat(&self, text: impl Into<String>) -> Result<(), ClientError> {
        self.command(ClientCommand::SendChat(text.into()))
    }

    /// Closes the link to one peer; closing an unknown or closed peer does nothing.
    pub fn close_peer(&self, peer: SessionId) -> Result<(), ClientError> {
        self.command(ClientCommand::ClosePeer(peer))
    }

    /// Closes every link, leaves the room and disconnects from the relay.
    pub async fn leave(&self) -> Result<(), ClientError> {
        let (done_tx, done_rx) = oneshot::channel();
        self.command(ClientCommand::Leave(done_tx))?;
        done_rx.await.map_err(|_| ClientError::Stopped)
    }

    pub fn peers(&self) -> Vec<PeerView> {
        self.peers.borrow().clone()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.messages.borrow().clone()
    }

    pub fn subscribe_messages(&self) -> watch::Receiver<Vec<Message>> {
        self.messages.clone()
    }

    pub fn subscribe_peers(&self) -> watch::Receiver<Vec<PeerView>> {
        self.peers.clone()
    }

    /// Session id assigned by the relay for the current connection.
    pub fn session_id(&self) -> Option<SessionId> {
        *self.session.borrow()
    }

    fn command(&self, command: ClientCommand) -> Result<(), ClientError> {
        self.commands.send(command).map_err(|_| ClientError::Stopped)
    }
}

/// Starts a client with WebRTC data channels. Must be called inside a tokio runtime.
pub fn start_webrtc(config: ClientConfig) -> ClientHandle {
    let factory = Arc::new(WebRtcChannelFactory::new(config.ice_servers.clone()));
    start(config, factory)
}

/// Connects to the relay, joins the configured room and keeps one link per peer.
pub fn start(config: ClientConfig, factory: Arc<dyn ChannelFactory>) -> ClientHandle {
    let (relay_tx, relay_rx) = mpsc::unbounded_channel();
    let (link_tx, link_rx) = mpsc::unbounded_channel();
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (peers_tx, peers_rx) = watch::channel(Vec::new());
    let (messages_tx, messages_rx) = watch::channel(Vec::new());
    let (session_tx, session_rx) = watch::channel(None);

    let relay = RelayControl::connect(config.url.clone(), config.reconnect, relay_tx);
    let orchestrator = Orchestrator {
        me: SelfIdentity {
            session_id: None,
            username: config.username.clone(),
        },
        roster: Roster::new(config.role_policy),
        config,
        factory,
        directory: PeerDirectory::new(),
        log: MessageLog::new(),
        links: HashMap::new(),
        retired: Vec::new(),
        next_link_id: 0,
        joined: false,
        relay,
        link_tx,
        peers_tx,
        messages_tx,
        session_tx,
    };
    tokio::spawn(orchestrator.run(relay_rx, link_rx, command_rx));

    ClientHandle {
        commands: command_tx,
        peers: peers_rx,
        messages: messages_rx,
        session: session_rx,
    }
}

struct Orchestrator {
    config: ClientConfig,
    factory: Arc<dyn ChannelFactory>,
    me: SelfIdentity,
    roster: Roster,
    directory: PeerDirectory,
    log: MessageLog,
    links: HashMap<SessionId, LinkController>,
    /// Tasks of links that were asked to close and may still be releasing.
    retired: Vec<JoinHandle<()>>,
    next_link_id: u64,
    joined: bool,
    relay: RelayControl,
    link_tx: mpsc::UnboundedSender<LinkReport>,
    peers_tx: watch::Sender<Vec<PeerView>>,
    messages_tx: watch::Sender<Vec<Message>>,
    session_tx: watch::Sender<Option<SessionId>>,
}

impl Orchestrator {
    async fn run(
        mut self,
        mut relay_rx: mpsc::UnboundedReceiver<RelayEvent>,
        mut link_rx: mpsc::UnboundedReceiver<LinkReport>,
        mut commands: mpsc::UnboundedReceiver<ClientCommand>,
    ) {
        loop {
            tokio::select! {
                Some(event) = relay_rx.recv() => self.on_relay(event).await,
                Some(report) = link_rx.recv() => self.on_link(report),
                command = commands.recv() => match command {
                    Some(ClientCommand::SendChat(text)) => self.send_chat(text),
                    Some(ClientCommand::ClosePeer(peer)) => {
                        self.close_link(&peer);
                    }
                    Some(ClientCommand::Leave(done)) => {
                        self.teardown().await;
                        let _ = done.send(());
                        break;
                    }
                    None => {
                        self.teardown().await;
                        break;
                    }
                },
            }
            self.publish();
        }
    }

    async fn on_relay(&mut self, event: RelayEvent) {
        match event {
            RelayEvent::Connected => {
                if self.joined || !self.links.is_empty() {
                    self.reset_room();
                }
                self.log.notify(format!(
                    "Attempting to join room: {}...",
                    self.config.room_id
                ));
                self.relay.send(ClientSignal::JoinRoom {
                    room_id: self.config.room_id.clone(),
                    username: self.config.username.clone(),
                    password: self.config.password.clone(),
                });
            }
            RelayEvent::Signal(signal) => self.on_signal(signal).await,
            RelayEvent::Disconnected => {
                self.reset_room();
                self.log.notify("Disconnected from signaling server.");
            }
            RelayEvent::GaveUp => {
                self.reset_room();
                self.log.notify(format!(
                    "Could not reach the signaling server after {} retries. Chat is offline.",
                    self.config.reconnect.max_retries
                ));
            }
        }
    }

    async fn on_signal(&mut self, signal: ServerSignal) {
        debug!("Handling {} from relay", signal.kind());
        match signal {
            ServerSignal::Welcome { session_id } => {
                info!("Relay assigned session {}", session_id);
                self.me.session_id = Some(session_id);
                self.session_tx.send_replace(Some(session_id));
            }
            ServerSignal::IceConfig { ice_servers } => {
                self.factory.configure_ice(ice_servers).await;
            }
            ServerSignal::RoomJoined {
                room_id,
                users,
                message,
                ..
            } => {
                if let Some(message) = message {
                    info!("{}", message);
                }
                info!("Joined room {} with {} members", room_id, users.len());
                self.joined = true;
                self.log.notify("You joined the room.");
                for planned in self.roster.joined(&self.me, &users) {
                    self.open_link(planned);
                }
            }
            ServerSignal::PasswordRequired { .. } => {
                self.log.notify("This room requires a password.");
            }
            ServerSignal::AuthFailed { .. } => {
                self.log.notify("Password incorrect for room.");
            }
            ServerSignal::UserList { users } => {
                if !self.joined {
                    return;
                }
                for planned in self.roster.updated(&self.me, &users) {
                    self.log.notify(format!("{} joined the room.", planned.name));
                    self.open_link(planned);
                }
            }
            ServerSignal::Offer {
                sdp,
                from,
                username,
                ..
            } => {
                if !self.joined {
                    warn!("Dropped offer from {} before joining", from);
                    return;
                }
                if !self.links.contains_key(&from) {
                    self.open_link(PlannedLink {
                        peer: from,
                        name: username,
                        role: Role::Responder,
                    });
                }
                self.forward(&from, LinkCommand::RemoteOffer(sdp), "offer");
            }
            ServerSignal::Answer { sdp, from, .. } => {
                self.forward(&from, LinkCommand::RemoteAnswer(sdp), "answer");
            }
            ServerSignal::Candidate {
                candidate, from, ..
            } => {
                self.forward(&from, LinkCommand::RemoteCandidate(candidate), "candidate");
            }
            ServerSignal::UserLeft {
                username,
                peer_id,
                users,
            } => {
                self.roster.replace(&users);
                let name = self
                    .directory
                    .get(&peer_id)
                    .map(|p| p.display_name().to_owned())
                    .unwrap_or(username);
                self.close_link(&peer_id);
                self.log.notify(format!("{} left the room.", name));
            }
            ServerSignal::Error { message } => {
                warn!("Relay reported: {}", message);
                self.log.notify(format!("Error: {}", message));
            }
        }
    }

    fn forward(&self, peer: &SessionId, command: LinkCommand, kind: &str) {
        match self.links.get(peer) {
            Some(link) => {
                if !link.send(command) {
                    debug!("Link to {} ended before the {} arrived", peer, kind);
                }
            }
            None => warn!("Dropped {} from unknown peer {}", kind, peer),
        }
    }

    fn on_link(&mut self, report: LinkReport) {
        let peer = report.peer;
        match self.links.get(&peer) {
            Some(link) if link.link_id == report.link_id => {}
            _ => return,
        }

        match report.update {
            LinkUpdate::StateChanged(state) => {
                if let Some(link) = self.links.get_mut(&peer) {
                    link.state = state;
                }
                self.directory.set_state(&peer, state);
            }
            LinkUpdate::Signal(signal) => {
                self.relay.send(signal);
            }
            LinkUpdate::ChannelOpen => {
                self.directory.mark_open(&peer);
                let name = self.display_name(&peer);
                self.log.notify(format!("Chat channel with {} is open.", name));
            }
            LinkUpdate::Payload(data) => {
                let name = self.display_name(&peer);
                match dispatch(&data, &name) {
                    Delivery::Log(message) => self.log.push(message),
                    Delivery::Identity(username) => {
                        if self.directory.confirm(&peer, username.as_str()) {
                            info!("Peer {} confirmed as {}", peer, username);
                        }
                    }
                }
            }
            LinkUpdate::Closed { reason } => {
                let name = self.display_name(&peer);
                self.links.remove(&peer);
                self.directory.remove(&peer);
                match reason {
                    Some(LinkError::Timeout(after)) => self.log.notify(format!(
                        "Connection with {} timed out after {}s.",
                        name,
                        after.as_secs()
                    )),
                    Some(e) => self.log.notify(format!("Connection with {} failed: {}", name, e)),
                    None => {}
                }
            }
        }
    }

    fn open_link(&mut self, planned: PlannedLink) {
        if self.links.contains_key(&planned.peer) {
            return;
        }
        self.next_link_id += 1;
        let params = LinkParams {
            link_id: self.next_link_id,
            peer: planned.peer,
            role: planned.role,
            username: self.config.username.clone(),
            timeout: self.config.link_timeout,
        };
        info!(
            "Opening link {} to {} ({}) as {:?}",
            params.link_id, planned.name, planned.peer, planned.role
        );

        let link = spawn_link(params, self.factory.clone(), self.link_tx.clone());
        self.directory.insert(planned.peer, planned.name, planned.role);
        self.links.insert(planned.peer, link);
    }

    /// Returns false when no link to `peer` exists.
    fn close_link(&mut self, peer: &SessionId) -> bool {
        if !self.retire_link(peer) {
            return false;
        }
        self.directory.remove(peer);
        true
    }

    /// Cancels the link task and keeps it for teardown to await. The
    /// directory entry is left to the caller.
    fn retire_link(&mut self, peer: &SessionId) -> bool {
        let Some(link) = self.links.remove(peer) else {
            return false;
        };
        debug!("Closing link {} to {}", link.link_id, peer);
        self.retired.retain(|task| !task.is_finished());
        self.retired.push(link.into_task());
        true
    }

    fn retire_all_links(&mut self) {
        let peers: Vec<SessionId> = self.links.keys().copied().collect();
        for peer in peers {
            self.retire_link(&peer);
        }
    }

    fn forget_room(&mut self) {
        self.directory.clear();
        self.roster.clear();
        self.joined = false;
        self.me.session_id = None;
        self.session_tx.send_replace(None);
    }

    fn reset_room(&mut self) {
        self.retire_all_links();
        self.forget_room();
    }

    fn send_chat(&mut self, text: String) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }

        let message = Message::chat(self.config.username.as_str(), text, None);
        let payload = ChannelPayload::Chat {
            sender: Some(self.config.username.clone()),
            text: text.to_owned(),
            timestamp: Some(message.timestamp),
        }
        .encode();
        self.log.push(message);

        let mut sent = 0;
        for link in self.links.values() {
            if link.state == LinkState::Connected && link.send(LinkCommand::Send(payload.clone())) {
                sent += 1;
            }
        }
        debug!("Chat message fanned out to {} peers", sent);
    }

    async fn teardown(&mut self) {
        info!("Leaving room {}", self.config.room_id);
        self.retire_all_links();

        let tasks = std::mem::take(&mut self.retired);
        if tokio::time::timeout(TEARDOWN_TIMEOUT, futures::future::join_all(tasks))
            .await
            .is_err()
        {
            warn!("Some links did not release within {:?}", TEARDOWN_TIMEOUT);
        }

        self.relay.send(ClientSignal::LeaveRoom {
            room_id: Some(self.config.room_id.clone()),
            username: Some(self.config.username.clone()),
        });
        self.relay.shutdown().await;
        self.forget_room();
        self.log.notify("You left the room.");
        self.publish();
    }

    fn display_name(&self, peer: &SessionId) -> String {
        self.directory
            .get(peer)
            .map(|p| p.display_name().to_owned())
            .unwrap_or_else(|| peer.to_string())
    }

    fn publish(&self) {
        let peers = self.directory.snapshot();
        self.peers_tx.send_if_modified(|current| {
            if *current == peers {
                return false;
            }
            *current = peers;
            true
        });

        let log = &self.log;
        self.messages_tx.send_if_modified(|current| {
            if current.len() == log.len() {
                return false;
            }
            *current = log.snapshot();
            true
        });
    }
}
