use tandem_core::{ApplicationError, ChannelPayload, Message};
use tracing::warn;

/// Where a payload received from a peer ends up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Log(Message),
    Identity(String),
}

/// Routes one channel payload from the peer currently known as `peer_name`.
pub fn dispatch(data: &[u8], peer_name: &str) -> Delivery {
    match ChannelPayload::decode(data) {
        Ok(ChannelPayload::Chat {
            sender,
            text,
            timestamp,
        }) => {
            let sender = match sender {
                Some(sender) if sender == peer_name => sender,
                Some(sender) => {
                    warn!("Peer {} sent chat as {}", peer_name, sender);
                    peer_name.to_owned()
                }
                None => peer_name.to_owned(),
            };
            Delivery::Log(Message::chat(sender, text, timestamp))
        }
        Ok(ChannelPayload::UserInfo { username }) => Delivery::Identity(username),
        Err(ApplicationError::Undecodable { raw }) => {
            Delivery::Log(Message::chat(peer_name, raw, None))
        }
    }
}
