use crate::error::ApplicationError;
use serde::{Deserialize, Serialize};

/// Application payloads carried over an open peer channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ChannelPayload {
    Chat {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sender: Option<String>,
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },
    /// One-shot identity announcement sent right after the channel opens.
    #[serde(alias = "identity")]
    UserInfo { username: String },
}

impl ChannelPayload {
    pub fn decode(data: &[u8]) -> Result<Self, ApplicationError> {
        serde_json::from_slice(data).map_err(|_| ApplicationError::Undecodable {
            raw: String::from_utf8_lossy(data).into_owned(),
        })
    }

    pub fn encode(&self) -> String {
        // Every variant is a plain struct of strings and integers.
        serde_json::to_string(self).unwrap_or_default()
    }
}
