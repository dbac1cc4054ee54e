use crate::channel::{ChannelFactory, LinkEvent, LinkHandle, Role, SdpKind};
use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use std::sync::Arc;
use tandem_core::{IceServerConfig, SessionId};
use tokio::sync::{Mutex, RwLock, mpsc};
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

const CHANNEL_LABEL: &str = "chat";

/// `ChannelFactory` backed by webrtc-rs peer connections.
pub struct WebRtcChannelFactory {
    ice_servers: RwLock<Vec<IceServerConfig>>,
}

impl WebRtcChannelFactory {
    pub fn new(ice_servers: Vec<IceServerConfig>) -> Self {
        Self {
            ice_servers: RwLock::new(ice_servers),
        }
    }
}

#[async_trait]
impl ChannelFactory for WebRtcChannelFactory {
    async fn create_link(
        &self,
        peer: SessionId,
        role: Role,
        events: mpsc::Sender<LinkEvent>,
    ) -> Result<Box<dyn LinkHandle>> {
        let ice_servers = self.ice_servers.read().await.clone();
        let link = WebRtcLink::new(peer, role, ice_servers, events).await?;
        Ok(Box::new(link))
    }

    async fn configure_ice(&self, servers: Vec<IceServerConfig>) {
        if servers.is_empty() {
            return;
        }
        info!("Using {} ICE servers announced by the relay", servers.len());
        *self.ice_servers.write().await = servers;
    }
}

pub struct WebRtcLink {
    peer: SessionId,
    peer_connection: Arc<RTCPeerConnection>,
    data_channel: Arc<Mutex<Option<Arc<RTCDataChannel>>>>,
}

impl WebRtcLink {
    /// Builds the peer connection and wires its callbacks into `events`.
    pub async fn new(
        peer: SessionId,
        role: Role,
        ice_servers: Vec<IceServerConfig>,
        events: mpsc::Sender<LinkEvent>,
    ) -> Result<Self> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: ice_servers
                .into_iter()
                .map(|server| RTCIceServer {
                    urls: server.urls,
                    username: server.username.unwrap_or_default(),
                    credential: server.credential.unwrap_or_default(),
                })
                .collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(
            api.new_peer_connection(rtc_config)
                .await
                .context("Failed to create peer connection")?,
        );
        let data_channel: Arc<Mutex<Option<Arc<RTCDataChannel>>>> = Arc::new(Mutex::new(None));

        let state_tx = events.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let tx = state_tx.clone();
                Box::pin(async move {
                    debug!("Peer connection state for {}: {:?}", peer, s);
                    let event = match s {
                        RTCPeerConnectionState::Failed => {
                            LinkEvent::Failed("peer connection failed".into())
                        }
                        RTCPeerConnectionState::Closed => LinkEvent::Closed,
                        _ => return,
                    };
                    let _ = tx.send(event).await;
                })
            },
        ));

        let ice_tx = events.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();
            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                let Ok(value) = serde_json::to_value(&init) else {
                    return;
                };
                let _ = tx.send(LinkEvent::LocalCandidate(value)).await;
            })
        }));

        match role {
            Role::Initiator => {
                let dc = peer_connection
                    .create_data_channel(CHANNEL_LABEL, None)
                    .await
                    .context("Failed to create data channel")?;
                wire_channel(&dc, peer, events);
                *data_channel.lock().await = Some(dc);
            }
            Role::Responder => {
                let slot = data_channel.clone();
                peer_connection.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
                    let slot = slot.clone();
                    let events = events.clone();
                    Box::pin(async move {
                        debug!("DataChannel '{}' received from {}", dc.label(), peer);
                        wire_channel(&dc, peer, events);
                        *slot.lock().await = Some(dc);
                    })
                }));
            }
        }

        Ok(Self {
            peer,
            peer_connection,
            data_channel,
        })
    }
}

fn wire_channel(dc: &Arc<RTCDataChannel>, peer: SessionId, events: mpsc::Sender<LinkEvent>) {
    let open_tx = events.clone();
    dc.on_open(Box::new(move || {
        let tx = open_tx.clone();
        Box::pin(async move {
            info!("DataChannel open with {}", peer);
            let _ = tx.send(LinkEvent::ChannelOpen).await;
        })
    }));

    let msg_tx = events.clone();
    dc.on_message(Box::new(move |msg: DataChannelMessage| {
        let tx = msg_tx.clone();
        Box::pin(async move {
            let _ = tx.send(LinkEvent::Message(Bytes::from(msg.data.to_vec()))).await;
        })
    }));

    dc.on_close(Box::new(move || {
        let tx = events.clone();
        Box::pin(async move {
            let _ = tx.send(LinkEvent::Closed).await;
        })
    }));
}

#[async_trait]
impl LinkHandle for WebRtcLink {
    async fn create_offer(&self) -> Result<String> {
        let offer = self.peer_connection.create_offer(None).await?;
        self.peer_connection
            .set_local_description(offer.clone())
            .await
            .context("Failed to set local description")?;
        Ok(offer.sdp)
    }

    async fn create_answer(&self) -> Result<String> {
        let answer = self.peer_connection.create_answer(None).await?;
        self.peer_connection
            .set_local_description(answer.clone())
            .await
            .context("Failed to set local description")?;
        Ok(answer.sdp)
    }

    async fn set_remote_description(&self, kind: SdpKind, sdp: String) -> Result<()> {
        let desc = match kind {
            SdpKind::Offer => RTCSessionDescription::offer(sdp)?,
            SdpKind::Answer => RTCSessionDescription::answer(sdp)?,
        };
        self.peer_connection.set_remote_description(desc).await?;
        Ok(())
    }

    async fn add_remote_candidate(&self, candidate: Value) -> Result<()> {
        let candidate: RTCIceCandidateInit =
            serde_json::from_value(candidate).context("Failed to parse ICE candidate JSON")?;
        self.peer_connection.add_ice_candidate(candidate).await?;
        Ok(())
    }

    async fn send(&self, text: String) -> Result<()> {
        let dc = self
            .data_channel
            .lock()
            .await
            .clone()
            .context("Data channel not available")?;
        dc.send_text(text).await.context("Failed to send message")?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if let Err(e) = self.peer_connection.close().await {
            warn!("Closing connection to {} failed: {}", self.peer, e);
            return Err(e.into());
        }
        Ok(())
    }
}
