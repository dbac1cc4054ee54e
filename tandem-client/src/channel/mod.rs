mod webrtc_channel;

pub use webrtc_channel::*;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use tandem_core::{IceServerConfig, SessionId};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Initiator,
    Responder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpKind {
    Offer,
    Answer,
}

/// Events a secure channel reports for one remote peer.
#[derive(Debug, Clone)]
pub enum LinkEvent {
    /// Connectivity candidate to forward to the remote peer.
    LocalCandidate(Value),
    ChannelOpen,
    Message(Bytes),
    Failed(String),
    Closed,
}

/// One negotiated secure channel to a remote peer.
#[async_trait]
pub trait LinkHandle: Send + Sync {
    async fn create_offer(&self) -> Result<String>;

    async fn create_answer(&self) -> Result<String>;

    async fn set_remote_description(&self, kind: SdpKind, sdp: String) -> Result<()>;

    async fn add_remote_candidate(&self, candidate: Value) -> Result<()>;

    async fn send(&self, text: String) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

/// Host capability creating secure channels.
#[async_trait]
pub trait ChannelFactory: Send + Sync {
    /// The initiator side opens the data channel; the responder receives it.
    async fn create_link(
        &self,
        peer: SessionId,
        role: Role,
        events: mpsc::Sender<LinkEvent>,
    ) -> Result<Box<dyn LinkHandle>>;

    /// ICE servers announced by the relay; applies to links created afterwards.
    async fn configure_ice(&self, _servers: Vec<IceServerConfig>) {}
}
