// Core types for connection management
use crate::core::connection::errors::ProbeError;
use crate::core::connection::health::ResponseHistory;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Three-valued observation: never probed, or probed with a yes/no answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum Tristate {
    #[default]
    Unknown,
    Yes,
    No,
}

impl Tristate {
    pub fn as_option(self) -> Option<bool> {
        match self {
            Tristate::Unknown => None,
            Tristate::Yes => Some(true),
            Tristate::No => Some(false),
        }
    }

    pub fn is_yes(self) -> bool {
        self == Tristate::Yes
    }
}

impl From<Option<bool>> for Tristate {
    fn from(value: Option<bool>) -> Self {
        match value {
            None => Tristate::Unknown,
            Some(true) => Tristate::Yes,
            Some(false) => Tristate::No,
        }
    }
}

/// Successful probe exchange reported by a transport
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeResponse {
    /// False when the endpoint answered but rejected the credentials
    pub authenticated: bool,
    /// Round-trip time of the probe
    pub elapsed: Duration,
}

/// Mutable observed health of a connection
#[derive(Debug, Clone, Default)]
struct ConnectionState {
    is_online: Tristate,
    is_authenticated: Tristate,
    last_response_time: Option<u64>,
    history: ResponseHistory,
}

/// One remote RPC target plus its observed health.
///
/// Configuration is fixed once built; health state is updated in place by probes.
/// The manager hands out `Arc<RpcConnection>` and compares them by pointer identity.
#[derive(Debug)]
pub struct RpcConnection {
    uri: String,
    username: Option<String>,
    password: Option<String>,
    priority: u32,
    timeout_ms: Option<u32>,
    attributes: HashMap<String, String>,
    state: Mutex<ConnectionState>,
}

impl RpcConnection {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            username: None,
            password: None,
            priority: 0,
            timeout_ms: None,
            attributes: HashMap::new(),
            state: Mutex::new(ConnectionState::default()),
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// `0` is unranked and sorts after every explicit priority; otherwise larger wins
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Probe timeout for this connection, overriding the manager default
    pub fn with_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn priority(&self) -> u32 {
        self.priority
    }

    pub fn timeout_ms(&self) -> Option<u32> {
        self.timeout_ms
    }

    pub fn attributes(&self) -> &HashMap<String, String> {
        &self.attributes
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    fn state(&self) -> MutexGuard<'_, ConnectionState> {
        // State stays consistent field-by-field, so a poisoned lock is still usable
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_online(&self) -> Tristate {
        self.state().is_online
    }

    pub fn is_authenticated(&self) -> Tristate {
        self.state().is_authenticated
    }

    pub fn last_response_time(&self) -> Option<u64> {
        self.state().last_response_time
    }

    /// Online, and not known to have rejected the credentials
    pub fn is_connected(&self) -> bool {
        let state = self.state();
        state.is_online == Tristate::Yes && state.is_authenticated != Tristate::No
    }

    pub fn response_history(&self) -> ResponseHistory {
        self.state().history.clone()
    }

    /// Apply the result of one probe and record it into the latency window.
    ///
    /// Returns true when the online or authenticated observation changed.
    pub fn apply_probe(&self, result: &Result<ProbeResponse, ProbeError>) -> bool {
        let mut state = self.state();
        let before = (state.is_online, state.is_authenticated);

        match result {
            Ok(response) => {
                let elapsed_ms = response.elapsed.as_millis() as u64;
                state.is_online = Tristate::Yes;
                if response.authenticated {
                    state.is_authenticated = Tristate::Yes;
                    state.last_response_time = Some(elapsed_ms);
                    state.history.record(Some(elapsed_ms));
                } else {
                    state.is_authenticated = Tristate::No;
                    state.last_response_time = Some(elapsed_ms);
                    state.history.record(None);
                }
            }
            Err(_) => {
                state.is_online = Tristate::No;
                state.is_authenticated = Tristate::Unknown;
                state.last_response_time = None;
                state.history.record(None);
            }
        }

        before != (state.is_online, state.is_authenticated)
    }

    /// Serializable view of configuration and current health
    pub fn snapshot(&self) -> ConnectionSnapshot {
        let state = self.state();
        ConnectionSnapshot {
            uri: self.uri.clone(),
            username: self.username.clone(),
            priority: self.priority,
            timeout_ms: self.timeout_ms,
            is_online: state.is_online.as_option(),
            is_authenticated: state.is_authenticated.as_option(),
            is_connected: state.is_online == Tristate::Yes
                && state.is_authenticated != Tristate::No,
            last_response_time: state.last_response_time,
            attributes: self.attributes.clone(),
        }
    }
}

/// Point-in-time view of a connection, safe to print or persist (no password)
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ConnectionSnapshot {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub priority: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u32>,
    pub is_online: Option<bool>,
    pub is_authenticated: Option<bool>,
    pub is_connected: bool,
    pub last_response_time: Option<u64>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, String>,
}

/// Receives a callback whenever the current connection changes, or the observed
/// state of the current connection changes. `None` means disconnected.
pub trait ConnectionListener: Send + Sync {
    fn on_connection_changed(&self, connection: Option<Arc<RpcConnection>>);
}

impl<F> ConnectionListener for F
where
    F: Fn(Option<Arc<RpcConnection>>) + Send + Sync,
{
    fn on_connection_changed(&self, connection: Option<Arc<RpcConnection>>) {
        self(connection)
    }
}
