//! Connection registry: the known connections keyed by URI plus the current pointer.
//!
//! This is plain synchronous data. The manager owns it behind a lock and turns
//! `CurrentChange::Changed` results into listener notifications once the lock
//! is released.

use crate::core::connection::errors::ConnectionError;
use crate::core::connection::types::RpcConnection;
use std::sync::Arc;

pub const DEFAULT_TIMEOUT_MS: u32 = 5000;
pub const DEFAULT_AUTO_SWITCH: bool = true;

/// Whether a mutation moved the current pointer
#[derive(Debug, Clone)]
pub enum CurrentChange {
    Unchanged,
    Changed(Option<Arc<RpcConnection>>),
}

impl CurrentChange {
    pub fn is_changed(&self) -> bool {
        matches!(self, CurrentChange::Changed(_))
    }
}

#[derive(Debug)]
pub struct ConnectionRegistry {
    /// Registration order is the selection tie-break
    connections: Vec<Arc<RpcConnection>>,
    current: Option<Arc<RpcConnection>>,
    auto_switch: bool,
    default_timeout_ms: u32,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self {
            connections: Vec::new(),
            current: None,
            auto_switch: DEFAULT_AUTO_SWITCH,
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, connection: Arc<RpcConnection>) -> Result<Arc<RpcConnection>, ConnectionError> {
        if connection.uri().is_empty() {
            return Err(ConnectionError::MissingUri);
        }
        if self.has(connection.uri()) {
            return Err(ConnectionError::DuplicateEndpoint(connection.uri().to_string()));
        }
        self.connections.push(Arc::clone(&connection));
        Ok(connection)
    }

    pub fn add_uri(&mut self, uri: &str) -> Result<Arc<RpcConnection>, ConnectionError> {
        self.add(Arc::new(RpcConnection::new(uri)))
    }

    pub fn remove(&mut self, uri: &str) -> Result<CurrentChange, ConnectionError> {
        let index = self
            .position(uri)
            .ok_or_else(|| ConnectionError::NotFound(uri.to_string()))?;
        let removed = self.connections.remove(index);

        if self.is_current(&removed) {
            self.current = None;
            return Ok(CurrentChange::Changed(None));
        }
        Ok(CurrentChange::Unchanged)
    }

    /// Make `connection` current, registering it first when this exact instance
    /// is not registered. A same-URI registration is replaced in place.
    pub fn set_current(
        &mut self,
        connection: Option<Arc<RpcConnection>>,
    ) -> Result<CurrentChange, ConnectionError> {
        let Some(connection) = connection else {
            if self.current.take().is_some() {
                return Ok(CurrentChange::Changed(None));
            }
            return Ok(CurrentChange::Unchanged);
        };

        if self.is_current(&connection) {
            return Ok(CurrentChange::Unchanged);
        }
        if connection.uri().is_empty() {
            return Err(ConnectionError::MissingUri);
        }

        match self.position(connection.uri()) {
            Some(index) if Arc::ptr_eq(&self.connections[index], &connection) => {}
            Some(index) => self.connections[index] = Arc::clone(&connection),
            None => self.connections.push(Arc::clone(&connection)),
        }

        self.current = Some(Arc::clone(&connection));
        Ok(CurrentChange::Changed(Some(connection)))
    }

    /// Automatic switch target selection. Only moves to `connection` when this
    /// exact instance is still registered, so a connection removed while its
    /// probe was in flight is never brought back.
    pub fn switch_to(&mut self, connection: Arc<RpcConnection>) -> CurrentChange {
        if self.is_current(&connection) || !self.contains(&connection) {
            return CurrentChange::Unchanged;
        }
        self.current = Some(Arc::clone(&connection));
        CurrentChange::Changed(Some(connection))
    }

    /// Select by URI, registering a default connection for an unknown URI
    pub fn set_current_uri(&mut self, uri: &str) -> Result<CurrentChange, ConnectionError> {
        if uri.is_empty() {
            return Err(ConnectionError::MissingUri);
        }
        let connection = match self.get(uri) {
            Some(existing) => existing,
            None => Arc::new(RpcConnection::new(uri)),
        };
        self.set_current(Some(connection))
    }

    pub fn get(&self, uri: &str) -> Option<Arc<RpcConnection>> {
        self.connections.iter().find(|c| c.uri() == uri).cloned()
    }

    pub fn has(&self, uri: &str) -> bool {
        self.position(uri).is_some()
    }

    /// Connections in registration order
    pub fn list(&self) -> &[Arc<RpcConnection>] {
        &self.connections
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn current(&self) -> Option<Arc<RpcConnection>> {
        self.current.clone()
    }

    pub fn is_current(&self, connection: &Arc<RpcConnection>) -> bool {
        self.current
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, connection))
    }

    pub fn clear(&mut self) -> CurrentChange {
        self.connections.clear();
        if self.current.take().is_some() {
            return CurrentChange::Changed(None);
        }
        CurrentChange::Unchanged
    }

    /// Clear connections and restore the default timeout and auto-switch
    pub fn reset(&mut self) -> CurrentChange {
        self.auto_switch = DEFAULT_AUTO_SWITCH;
        self.default_timeout_ms = DEFAULT_TIMEOUT_MS;
        self.clear()
    }

    pub fn auto_switch(&self) -> bool {
        self.auto_switch
    }

    pub fn set_auto_switch(&mut self, auto_switch: bool) {
        self.auto_switch = auto_switch;
    }

    pub fn default_timeout_ms(&self) -> u32 {
        self.default_timeout_ms
    }

    pub fn set_default_timeout_ms(&mut self, timeout_ms: u32) {
        self.default_timeout_ms = timeout_ms;
    }

    fn contains(&self, connection: &Arc<RpcConnection>) -> bool {
        self.connections.iter().any(|c| Arc::ptr_eq(c, connection))
    }

    fn position(&self, uri: &str) -> Option<usize> {
        self.connections.iter().position(|c| c.uri() == uri)
    }
}
