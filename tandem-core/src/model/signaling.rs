use crate::error::ProtocolError;
use crate::model::room::UserInfo;
use crate::model::session::SessionId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

/// Envelopes a client sends to the relay.
///
/// Relayed handshake envelopes may carry a `from` field; it is never read,
/// the relay always stamps the sender it knows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientSignal {
    #[serde(rename_all = "camelCase")]
    JoinRoom {
        #[serde(default)]
        room_id: String,
        #[serde(default)]
        username: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        password: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    LeaveRoom {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        username: Option<String>,
    },
    Offer {
        sdp: String,
        target: String,
    },
    Answer {
        sdp: String,
        target: String,
    },
    Candidate {
        candidate: Value,
        target: String,
    },
}

impl ClientSignal {
    pub const TYPES: [&'static str; 5] = ["join-room", "leave-room", "offer", "answer", "candidate"];

    /// Parses one text frame, telling an unknown `type` apart from a malformed body.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(|e| {
            let kind = serde_json::from_str::<Value>(text)
                .ok()
                .and_then(|v| v.get("type").and_then(Value::as_str).map(str::to_owned));
            match kind {
                Some(kind) if !Self::TYPES.contains(&kind.as_str()) => {
                    ProtocolError::UnknownType(kind)
                }
                _ => ProtocolError::Malformed(e),
            }
        })
    }

    /// Splits a handshake envelope into its raw target and body.
    ///
    /// The target stays unparsed here: an id that names nobody is a routing
    /// problem, not a malformed envelope.
    pub fn into_handshake(self) -> Option<(String, Handshake)> {
        match self {
            ClientSignal::Offer { sdp, target } => Some((target, Handshake::Offer { sdp })),
            ClientSignal::Answer { sdp, target } => Some((target, Handshake::Answer { sdp })),
            ClientSignal::Candidate { candidate, target } => {
                Some((target, Handshake::Candidate { candidate }))
            }
            _ => None,
        }
    }
}

/// Envelopes the relay sends to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerSignal {
    #[serde(rename_all = "camelCase")]
    Welcome { session_id: SessionId },
    #[serde(rename_all = "camelCase")]
    IceConfig { ice_servers: Vec<IceServerConfig> },
    #[serde(rename_all = "camelCase")]
    RoomJoined {
        room_id: String,
        username: String,
        users: Vec<UserInfo>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    PasswordRequired {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    AuthFailed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    UserList { users: Vec<UserInfo> },
    Offer {
        sdp: String,
        target: SessionId,
        from: SessionId,
        username: String,
    },
    Answer {
        sdp: String,
        target: SessionId,
        from: SessionId,
        username: String,
    },
    Candidate {
        candidate: Value,
        target: SessionId,
        from: SessionId,
        username: String,
    },
    #[serde(rename_all = "camelCase")]
    UserLeft {
        username: String,
        peer_id: SessionId,
        users: Vec<UserInfo>,
    },
    Error { message: String },
}

impl ServerSignal {
    pub fn error(message: impl Into<String>) -> Self {
        ServerSignal::Error {
            message: message.into(),
        }
    }

    /// Wire name of the envelope, used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerSignal::Welcome { .. } => "welcome",
            ServerSignal::IceConfig { .. } => "ice-config",
            ServerSignal::RoomJoined { .. } => "room-joined",
            ServerSignal::PasswordRequired { .. } => "password-required",
            ServerSignal::AuthFailed { .. } => "auth-failed",
            ServerSignal::UserList { .. } => "user-list",
            ServerSignal::Offer { .. } => "offer",
            ServerSignal::Answer { .. } => "answer",
            ServerSignal::Candidate { .. } => "candidate",
            ServerSignal::UserLeft { .. } => "user-left",
            ServerSignal::Error { .. } => "error",
        }
    }
}

/// Body of an offer / answer / candidate envelope, independent of direction.
#[derive(Debug, Clone, PartialEq)]
pub enum Handshake {
    Offer { sdp: String },
    Answer { sdp: String },
    Candidate { candidate: Value },
}

impl Handshake {
    pub fn kind(&self) -> &'static str {
        match self {
            Handshake::Offer { .. } => "offer",
            Handshake::Answer { .. } => "answer",
            Handshake::Candidate { .. } => "candidate",
        }
    }

    /// Builds the relayed envelope, stamped with the sender the relay knows.
    pub fn to_server(self, target: SessionId, from: SessionId, username: String) -> ServerSignal {
        match self {
            Handshake::Offer { sdp } => ServerSignal::Offer {
                sdp,
                target,
                from,
                username,
            },
            Handshake::Answer { sdp } => ServerSignal::Answer {
                sdp,
                target,
                from,
                username,
            },
            Handshake::Candidate { candidate } => ServerSignal::Candidate {
                candidate,
                target,
                from,
                username,
            },
        }
    }
}
