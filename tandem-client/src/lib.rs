pub mod channel;
pub mod config;
pub mod directory;
pub mod link;
pub mod message_log;
pub mod orchestrator;
pub mod relay;

pub use channel::{ChannelFactory, LinkEvent, LinkHandle, Role, SdpKind, WebRtcChannelFactory};
pub use config::*;
pub use directory::{PeerDirectory, PeerView};
pub use link::LinkState;
pub use message_log::MessageLog;
pub use orchestrator::{ClientError, ClientHandle, start, start_webrtc};
