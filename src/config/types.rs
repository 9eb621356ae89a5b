use crate::core::connection::poller::{PollOptions, PollType, DEFAULT_POLL_PERIOD_MS};
use crate::core::connection::registry::{DEFAULT_AUTO_SWITCH, DEFAULT_TIMEOUT_MS};
use crate::core::connection::types::RpcConnection;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Contents of `config.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Default probe timeout for connections without their own
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u32,
    #[serde(default = "default_auto_switch")]
    pub auto_switch: bool,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub connections: Vec<ConnectionEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_period_ms")]
    pub period_ms: u64,
    #[serde(default)]
    pub poll_type: PollType,
    /// URIs never probed by the poller
    #[serde(default)]
    pub excluded: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionEntry {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default)]
    pub priority: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u32>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, String>,
}

fn default_timeout_ms() -> u32 {
    DEFAULT_TIMEOUT_MS
}

fn default_auto_switch() -> bool {
    DEFAULT_AUTO_SWITCH
}

fn default_period_ms() -> u64 {
    DEFAULT_POLL_PERIOD_MS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            auto_switch: DEFAULT_AUTO_SWITCH,
            polling: PollingConfig::default(),
            connections: vec![ConnectionEntry::new("http://127.0.0.1:18081").with_priority(1)],
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            period_ms: DEFAULT_POLL_PERIOD_MS,
            poll_type: PollType::default(),
            excluded: Vec::new(),
        }
    }
}

impl PollingConfig {
    /// Poll options for this section; excluded URIs resolve against `registered`
    /// and unknown URIs are ignored
    pub fn to_poll_options(&self, registered: &[Arc<RpcConnection>]) -> PollOptions {
        let excluded = registered
            .iter()
            .filter(|c| self.excluded.iter().any(|uri| uri == c.uri()))
            .cloned()
            .collect();
        PollOptions::new(self.period_ms)
            .with_poll_type(self.poll_type)
            .with_excluded(excluded)
    }
}

impl ConnectionEntry {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            username: None,
            password: None,
            priority: 0,
            timeout_ms: None,
            attributes: HashMap::new(),
        }
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn to_connection(&self) -> RpcConnection {
        let mut connection = RpcConnection::new(self.uri.clone()).with_priority(self.priority);
        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            connection = connection.with_credentials(username.clone(), password.clone());
        }
        if let Some(timeout_ms) = self.timeout_ms {
            connection = connection.with_timeout_ms(timeout_ms);
        }
        for (key, value) in &self.attributes {
            connection = connection.with_attribute(key.clone(), value.clone());
        }
        connection
    }
}
