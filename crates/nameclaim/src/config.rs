//! Negotiator configuration.

use std::time::Duration;

use nameclaim_sync::SchedulerConfig;
use url::Url;

use crate::error::ConfigError;

/// Default signaling server.
pub const DEFAULT_REMOTE_ADDRESS: &str = "wss://webrtcfd.herokuapp.com/";
/// Default community channel.
pub const DEFAULT_CHANNEL: &str = "wrtcid";
/// Default ICE server.
pub const DEFAULT_ICE_SERVER: &str = "stun:stun.l.google.com:19302";

/// Everything a node needs to join a community and negotiate a username.
#[derive(Debug, Clone)]
pub struct NegotiatorConfig {
    /// Signaling server address.
    pub remote_address: String,
    /// Time to wait for connections.
    pub timeout: Duration,
    /// ID of the community to join.
    pub community: String,
    /// Password for the community.
    pub password: String,
    /// Encryption key for the community.
    pub key: String,
    /// Usernames to try and claim.
    pub usernames: Vec<String>,
    /// Channels in the community to join.
    pub channels: Vec<String>,
    /// STUN servers (`stun:host:port`) and TURN servers
    /// (`username:credential@turn:host:port`).
    pub ice_servers: Vec<String>,
    /// Only use TURN servers.
    pub force_relay: bool,
    /// Time to wait for kicks; also the backoff pause.
    pub kick_wait: Duration,
    /// Log per-peer protocol chatter.
    pub verbose: bool,
}

impl Default for NegotiatorConfig {
    fn default() -> Self {
        Self {
            remote_address: DEFAULT_REMOTE_ADDRESS.to_string(),
            timeout: Duration::from_secs(10),
            community: String::new(),
            password: String::new(),
            key: String::new(),
            usernames: Vec::new(),
            channels: vec![DEFAULT_CHANNEL.to_string()],
            ice_servers: vec![DEFAULT_ICE_SERVER.to_string()],
            force_relay: false,
            kick_wait: Duration::from_secs(5),
            verbose: false,
        }
    }
}

/// What a mesh adapter needs to connect on behalf of a negotiator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshSettings {
    /// Signaling URL with community credentials in the query.
    pub signaling_url: Url,
    pub key: String,
    pub ice_servers: Vec<String>,
    pub channels: Vec<String>,
    pub timeout: Duration,
    pub force_relay: bool,
    pub verbose: bool,
}

impl NegotiatorConfig {
    /// Config for a community with default transport settings.
    pub fn new(
        community: impl Into<String>,
        password: impl Into<String>,
        key: impl Into<String>,
        usernames: &str,
    ) -> Self {
        Self {
            community: community.into(),
            password: password.into(),
            key: key.into(),
            usernames: split_list(usernames),
            ..Default::default()
        }
    }

    pub fn with_remote_address(mut self, remote_address: impl Into<String>) -> Self {
        self.remote_address = remote_address.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_kick_wait(mut self, kick_wait: Duration) -> Self {
        self.kick_wait = kick_wait;
        self
    }

    pub fn with_channels(mut self, channels: &str) -> Self {
        self.channels = split_list(channels);
        self
    }

    pub fn with_ice_servers(mut self, ice_servers: &str) -> Self {
        self.ice_servers = split_list(ice_servers);
        self
    }

    pub fn with_force_relay(mut self, force_relay: bool) -> Self {
        self.force_relay = force_relay;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Check the required fields.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.community.trim().is_empty() {
            return Err(ConfigError::MissingCommunity);
        }
        if self.password.trim().is_empty() {
            return Err(ConfigError::MissingPassword);
        }
        if self.key.trim().is_empty() {
            return Err(ConfigError::MissingKey);
        }
        if self.usernames.iter().all(|name| name.trim().is_empty()) {
            return Err(ConfigError::MissingUsernames);
        }
        Ok(())
    }

    /// Connection timeout plus kick wait.
    pub fn claim_window(&self) -> Duration {
        self.timeout + self.kick_wait
    }

    /// The remote address with `community` and `password` query parameters.
    pub fn signaling_url(&self) -> Result<Url, ConfigError> {
        let mut url = Url::parse(&self.remote_address)
            .map_err(|e| ConfigError::InvalidRemoteAddress(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("community", &self.community)
            .append_pair("password", &self.password);
        Ok(url)
    }

    /// Settings to hand to a mesh adapter.
    pub fn mesh_settings(&self) -> Result<MeshSettings, ConfigError> {
        Ok(MeshSettings {
            signaling_url: self.signaling_url()?,
            key: self.key.clone(),
            ice_servers: self.ice_servers.clone(),
            channels: self.channels.clone(),
            timeout: self.timeout,
            force_relay: self.force_relay,
            verbose: self.verbose,
        })
    }

    /// Settings for the claim scheduler.
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            usernames: self
                .usernames
                .iter()
                .map(|name| name.trim())
                .filter(|name| !name.is_empty())
                .map(String::from)
                .collect(),
            claim_window: self.claim_window(),
            backoff: self.kick_wait,
        }
    }
}

/// Split a comma-separated list, trimming entries and dropping empty ones.
pub fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}
