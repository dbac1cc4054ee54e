mod message;
mod payload;
mod room;
mod session;
mod signaling;

pub use message::{Message, MessageKind};
pub use payload::ChannelPayload;
pub use room::{RoomId, UserInfo};
pub use session::SessionId;
pub use signaling::{ClientSignal, Handshake, IceServerConfig, ServerSignal};
