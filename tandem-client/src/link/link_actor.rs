use crate::channel::{ChannelFactory, LinkEvent, LinkHandle, Role, SdpKind};
use crate::link::link_state::{LinkAction, LinkInput, LinkState, transition};
use bytes::Bytes;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tandem_core::{ChannelPayload, ClientSignal, LinkError, SessionId};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

const TRANSPORT_BUFFER: usize = 64;

/// Input the orchestrator feeds into a running link.
#[derive(Debug)]
pub enum LinkCommand {
    RemoteOffer(String),
    RemoteAnswer(String),
    RemoteCandidate(Value),
    Send(String),
}

/// What a link reports back to the orchestrator.
#[derive(Debug)]
pub enum LinkUpdate {
    StateChanged(LinkState),
    /// Handshake envelope to forward through the relay.
    Signal(ClientSignal),
    ChannelOpen,
    Payload(Bytes),
    /// Final report; `reason` is `None` for a requested close.
    Closed { reason: Option<LinkError> },
}

#[derive(Debug)]
pub struct LinkReport {
    pub peer: SessionId,
    pub link_id: u64,
    pub update: LinkUpdate,
}

/// Parameters of one link to spawn.
#[derive(Debug, Clone)]
pub struct LinkParams {
    pub link_id: u64,
    pub peer: SessionId,
    pub role: Role,
    /// Our own display name, announced once the channel opens.
    pub username: String,
    pub timeout: Duration,
}

/// Orchestrator-side handle of a spawned link task.
pub struct LinkController {
    pub link_id: u64,
    pub role: Role,
    pub state: LinkState,
    inbox: mpsc::UnboundedSender<LinkCommand>,
    cancel: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl LinkController {
    /// Returns false once the link task has ended.
    pub fn send(&self, command: LinkCommand) -> bool {
        self.inbox.send(command).is_ok()
    }

    /// Requests the link to close; later calls are no-ops.
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_none()
    }

    pub fn into_task(mut self) -> JoinHandle<()> {
        self.cancel();
        self.task
    }
}

/// Spawns the task driving one peer link from creation to release.
pub fn spawn_link(
    params: LinkParams,
    factory: Arc<dyn ChannelFactory>,
    reports: mpsc::UnboundedSender<LinkReport>,
) -> LinkController {
    let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
    let (cancel_tx, cancel_rx) = oneshot::channel();
    let link_id = params.link_id;
    let role = params.role;

    let task = tokio::spawn(run_link(params, factory, inbox_rx, cancel_rx, reports));

    LinkController {
        link_id,
        role,
        state: LinkState::Idle,
        inbox: inbox_tx,
        cancel: Some(cancel_tx),
        task,
    }
}

async fn run_link(
    params: LinkParams,
    factory: Arc<dyn ChannelFactory>,
    inbox: mpsc::UnboundedReceiver<LinkCommand>,
    mut cancel: oneshot::Receiver<()>,
    reports: mpsc::UnboundedSender<LinkReport>,
) {
    let deadline = Instant::now() + params.timeout;
    let (transport_tx, transport_rx) = mpsc::channel(TRANSPORT_BUFFER);

    let created = guard(
        &mut cancel,
        Some(deadline),
        params.timeout,
        factory.create_link(params.peer, params.role, transport_tx),
    )
    .await;

    let handle = match created {
        Ok(handle) => handle,
        Err(e) => {
            let reason = (e != LinkError::Cancelled).then_some(e);
            let _ = reports.send(LinkReport {
                peer: params.peer,
                link_id: params.link_id,
                update: LinkUpdate::Closed { reason },
            });
            return;
        }
    };

    let actor = LinkActor {
        link_id: params.link_id,
        peer: params.peer,
        role: params.role,
        username: params.username,
        timeout: params.timeout,
        state: LinkState::Idle,
        deadline: Some(deadline),
        open: false,
        pending: VecDeque::new(),
        handle,
        inbox,
        transport_rx,
        cancel,
        reports,
    };
    actor.run().await;
}

/// Races one handshake step against cancellation and the establishment deadline.
async fn guard<T>(
    cancel: &mut oneshot::Receiver<()>,
    deadline: Option<Instant>,
    timeout: Duration,
    step: impl Future<Output = anyhow::Result<T>>,
) -> Result<T, LinkError> {
    let expiry = async move {
        match deadline {
            Some(deadline) => sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        _ = cancel => Err(LinkError::Cancelled),
        _ = expiry => Err(LinkError::Timeout(timeout)),
        result = step => result.map_err(|e| LinkError::Handshake(format!("{e:#}"))),
    }
}

/// An FSM input together with the data its action consumes.
#[derive(Debug)]
enum Step {
    Start,
    RemoteOffer(String),
    RemoteAnswer(String),
    RemoteCandidate(Value),
    ChannelOpen,
    Close,
}

impl Step {
    fn input(&self) -> LinkInput {
        match self {
            Step::Start => LinkInput::Start,
            Step::RemoteOffer(_) => LinkInput::RemoteOffer,
            Step::RemoteAnswer(_) => LinkInput::RemoteAnswer,
            Step::RemoteCandidate(_) => LinkInput::RemoteCandidate,
            Step::ChannelOpen => LinkInput::ChannelOpen,
            Step::Close => LinkInput::Close,
        }
    }
}

struct LinkActor {
    link_id: u64,
    peer: SessionId,
    role: Role,
    username: String,
    timeout: Duration,
    state: LinkState,
    deadline: Option<Instant>,
    open: bool,
    pending: VecDeque<String>,
    handle: Box<dyn LinkHandle>,
    inbox: mpsc::UnboundedReceiver<LinkCommand>,
    transport_rx: mpsc::Receiver<LinkEvent>,
    cancel: oneshot::Receiver<()>,
    reports: mpsc::UnboundedSender<LinkReport>,
}

impl LinkActor {
    async fn run(mut self) {
        debug!("Link {} to {} started as {:?}", self.link_id, self.peer, self.role);

        let mut reason = None;
        if self.role == Role::Initiator {
            let started = self.apply(Step::Start).await;
            reason = self.settle(started);
        }

        while reason.is_none() && self.state != LinkState::Closed {
            let deadline = self.deadline;
            let expiry = async move {
                match deadline {
                    Some(deadline) => sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            };

            let result = tokio::select! {
                _ = &mut self.cancel => Err(LinkError::Cancelled),
                _ = expiry => Err(LinkError::Timeout(self.timeout)),
                command = self.inbox.recv() => match command {
                    Some(command) => self.on_command(command).await,
                    None => Err(LinkError::Cancelled),
                },
                event = self.transport_rx.recv() => match event {
                    Some(event) => self.on_transport(event).await,
                    None => Err(LinkError::Channel("transport went away".into())),
                },
            };

            match self.settle(result) {
                Some(LinkError::Cancelled) => break,
                Some(e) => reason = Some(e),
                None => {}
            }
        }

        let reason = reason.filter(|e| *e != LinkError::Cancelled);
        self.finish(reason).await;
    }

    /// Keeps the link alive for ignorable errors.
    fn settle(&self, result: Result<(), LinkError>) -> Option<LinkError> {
        match result {
            Ok(()) => None,
            Err(e @ LinkError::UnexpectedInput { .. }) => {
                warn!("Link {} to {}: ignored input, {}", self.link_id, self.peer, e);
                None
            }
            Err(e) => Some(e),
        }
    }

    /// Runs one input through the transition table and performs the action it yields.
    async fn apply(&mut self, step: Step) -> Result<(), LinkError> {
        let (next, action) = transition(self.state, self.role, step.input())?;
        self.set_state(next);

        match (action, step) {
            (LinkAction::CreateOffer, _) => {
                let sdp = guard(
                    &mut self.cancel,
                    self.deadline,
                    self.timeout,
                    self.handle.create_offer(),
                )
                .await?;
                self.signal(ClientSignal::Offer {
                    sdp,
                    target: self.peer.to_string(),
                });
            }
            (LinkAction::AnswerOffer, Step::RemoteOffer(offer)) => {
                guard(
                    &mut self.cancel,
                    self.deadline,
                    self.timeout,
                    self.handle.set_remote_description(SdpKind::Offer, offer),
                )
                .await?;
                let answer = guard(
                    &mut self.cancel,
                    self.deadline,
                    self.timeout,
                    self.handle.create_answer(),
                )
                .await?;
                self.signal(ClientSignal::Answer {
                    sdp: answer,
                    target: self.peer.to_string(),
                });
            }
            (LinkAction::ApplyAnswer, Step::RemoteAnswer(answer)) => {
                guard(
                    &mut self.cancel,
                    self.deadline,
                    self.timeout,
                    self.handle.set_remote_description(SdpKind::Answer, answer),
                )
                .await?;
            }
            (LinkAction::ApplyCandidate, Step::RemoteCandidate(candidate)) => {
                let applied = guard(
                    &mut self.cancel,
                    self.deadline,
                    self.timeout,
                    self.handle.add_remote_candidate(candidate),
                )
                .await;
                match applied {
                    Err(LinkError::Handshake(e)) => {
                        warn!("Link {} to {}: candidate rejected, {}", self.link_id, self.peer, e)
                    }
                    other => other?,
                }
            }
            (LinkAction::AnnounceOpen, _) => self.on_open().await,
            (LinkAction::Release, _) => {
                if let Err(e) = self.handle.close().await {
                    debug!("Link {} to {}: close reported {:#}", self.link_id, self.peer, e);
                }
            }
            (LinkAction::Nothing, _) => {}
            (action, step) => {
                warn!("Link {} to {}: {:?} cannot run on {:?}", self.link_id, self.peer, action, step)
            }
        }
        Ok(())
    }

    async fn on_command(&mut self, command: LinkCommand) -> Result<(), LinkError> {
        match command {
            LinkCommand::RemoteOffer(sdp) => self.apply(Step::RemoteOffer(sdp)).await,
            LinkCommand::RemoteAnswer(sdp) => self.apply(Step::RemoteAnswer(sdp)).await,
            LinkCommand::RemoteCandidate(candidate) => {
                self.apply(Step::RemoteCandidate(candidate)).await
            }
            LinkCommand::Send(text) => {
                if self.open {
                    self.deliver(text).await;
                } else {
                    self.pending.push_back(text);
                }
                Ok(())
            }
        }
    }

    async fn on_transport(&mut self, event: LinkEvent) -> Result<(), LinkError> {
        match event {
            LinkEvent::LocalCandidate(candidate) => {
                self.signal(ClientSignal::Candidate {
                    candidate,
                    target: self.peer.to_string(),
                });
                Ok(())
            }
            LinkEvent::ChannelOpen => self.apply(Step::ChannelOpen).await,
            LinkEvent::Message(data) => {
                self.report(LinkUpdate::Payload(data));
                Ok(())
            }
            LinkEvent::Failed(reason) => Err(LinkError::Channel(reason)),
            // A clean close by the other side ends the link without a failure.
            LinkEvent::Closed => {
                debug!("Link {} to {}: closed by peer", self.link_id, self.peer);
                self.apply(Step::Close).await
            }
        }
    }

    async fn on_open(&mut self) {
        if self.open {
            return;
        }
        self.open = true;
        self.deadline = None;
        info!("Link {} to {} is open", self.link_id, self.peer);

        let hello = ChannelPayload::UserInfo {
            username: self.username.clone(),
        }
        .encode();
        self.deliver(hello).await;
        self.report(LinkUpdate::ChannelOpen);

        while let Some(text) = self.pending.pop_front() {
            self.deliver(text).await;
        }
    }

    async fn deliver(&self, text: String) {
        if let Err(e) = self.handle.send(text).await {
            warn!("Link {} to {}: send failed, {:#}", self.link_id, self.peer, e);
        }
    }

    /// Releases the handle unless a remote close already did, then sends the final report.
    async fn finish(mut self, reason: Option<LinkError>) {
        if let Err(e) = self.apply(Step::Close).await {
            debug!("Link {} to {}: {}", self.link_id, self.peer, e);
        }
        match &reason {
            Some(e) => info!("Link {} to {} closed: {}", self.link_id, self.peer, e),
            None => info!("Link {} to {} closed", self.link_id, self.peer),
        }
        self.report(LinkUpdate::Closed { reason });
    }

    fn set_state(&mut self, state: LinkState) {
        if self.state != state {
            self.state = state;
            self.report(LinkUpdate::StateChanged(state));
        }
    }

    fn signal(&self, signal: ClientSignal) {
        self.report(LinkUpdate::Signal(signal));
    }

    fn report(&self, update: LinkUpdate) {
        let _ = self.reports.send(LinkReport {
            peer: self.peer,
            link_id: self.link_id,
            update,
        });
    }
}
