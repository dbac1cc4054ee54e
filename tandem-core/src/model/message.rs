use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Chat,
    Notification,
}

/// One entry of the local message log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    pub text: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub kind: MessageKind,
}

impl Message {
    pub fn chat(sender: impl Into<String>, text: impl Into<String>, timestamp: Option<i64>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender: Some(sender.into()),
            text: text.into(),
            timestamp: timestamp.unwrap_or_else(now_millis),
            kind: MessageKind::Chat,
        }
    }

    pub fn notification(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender: None,
            text: text.into(),
            timestamp: now_millis(),
            kind: MessageKind::Notification,
        }
    }
}

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
