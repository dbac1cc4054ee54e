use std::time::Duration;
use tandem_core::IceServerConfig;

pub const DEFAULT_STUN_ADDR: &str = "stun:stun.l.google.com:19302";
pub const DEFAULT_LINK_TIMEOUT: Duration = Duration::from_secs(30);

/// Which side of a pair sends the offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RolePolicy {
    /// Members already in the room initiate toward newcomers.
    #[default]
    ArrivalOrder,
    /// The lower session id initiates, whatever the arrival order.
    SessionIdOrder,
}

/// Exponential backoff for the relay connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Consecutive failed attempts tolerated before giving up.
    pub max_retries: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            max_retries: 5,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before retry number `attempt` (1-based), `None` once retries are exhausted.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_retries {
            return None;
        }
        let factor = 2u32.saturating_pow(attempt - 1);
        Some(self.initial_delay.saturating_mul(factor).min(self.max_delay))
    }
}

/// Everything a client needs to join a room.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Relay WebSocket endpoint, e.g. `ws://localhost:3000/ws`.
    pub url: String,
    pub room_id: String,
    pub username: String,
    pub password: Option<String>,
    /// Replaced by the relay's `ice-config` when it announces one.
    pub ice_servers: Vec<IceServerConfig>,
    pub link_timeout: Duration,
    pub role_policy: RolePolicy,
    pub reconnect: ReconnectPolicy,
}

impl ClientConfig {
    pub fn new(
        url: impl Into<String>,
        room_id: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            room_id: room_id.into(),
            username: username.into(),
            password: None,
            ice_servers: vec![IceServerConfig {
                urls: vec![DEFAULT_STUN_ADDR.to_owned()],
                username: None,
                credential: None,
            }],
            link_timeout: DEFAULT_LINK_TIMEOUT,
            role_policy: RolePolicy::default(),
            reconnect: ReconnectPolicy::default(),
        }
    }

    pub fn with_password(mut self, password: Option<String>) -> Self {
        self.password = password.filter(|p| !p.is_empty());
        self
    }

    pub fn with_role_policy(mut self, policy: RolePolicy) -> Self {
        self.role_policy = policy;
        self
    }

    pub fn with_link_timeout(mut self, timeout: Duration) -> Self {
        self.link_timeout = timeout;
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }
}
