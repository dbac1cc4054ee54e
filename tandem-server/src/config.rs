use std::net::SocketAddr;
use std::time::Duration;
use tandem_core::IceServerConfig;

pub const DEFAULT_ROOM_IDLE_TTL: Duration = Duration::from_secs(300);

/// Runtime settings of the relay.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub bind: SocketAddr,
    /// How long an empty room survives before eviction. `None` keeps rooms forever.
    pub room_idle_ttl: Option<Duration>,
    /// Announced to every client in `ice-config` right after connect.
    pub ice_servers: Vec<IceServerConfig>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 3000)),
            room_idle_ttl: Some(DEFAULT_ROOM_IDLE_TTL),
            ice_servers: Vec::new(),
        }
    }
}

impl RelayConfig {
    /// Zero seconds disables eviction.
    pub fn with_room_idle_ttl_secs(mut self, secs: u64) -> Self {
        self.room_idle_ttl = (secs > 0).then(|| Duration::from_secs(secs));
        self
    }

    /// Builds the announced ICE server list from STUN urls and an optional TURN server.
    pub fn with_ice_servers(
        mut self,
        stun_urls: Vec<String>,
        turn_url: Option<String>,
        turn_username: Option<String>,
        turn_credential: Option<String>,
    ) -> Self {
        let stun_urls: Vec<String> = stun_urls
            .into_iter()
            .map(|url| url.trim().to_owned())
            .filter(|url| !url.is_empty())
            .collect();

        self.ice_servers.clear();
        if !stun_urls.is_empty() {
            self.ice_servers.push(IceServerConfig {
                urls: stun_urls,
                username: None,
                credential: None,
            });
        }
        if let Some(turn) = turn_url.filter(|url| !url.trim().is_empty()) {
            self.ice_servers.push(IceServerConfig {
                urls: vec![turn],
                username: turn_username,
                credential: turn_credential,
            });
        }
        self
    }
}
