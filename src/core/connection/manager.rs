/*!
Connection manager: the single authoritative owner of the connection pool.

It owns the registry, probes connections through an injected [`RpcTransport`],
ranks them by priority and measured latency, and exposes one current connection,
switching automatically when the current one degrades.

## Concurrency

- Registry mutations and every switching decision run under one write lock and
  never await while holding it.
- Batch probes fan out one spawned task per connection and join all of them
  before returning. Each probe is bounded by its own timeout.
- Listener callbacks run after the lock is released, in registration order, on
  the task that made the change. A listener may call back into the manager.
*/

use crate::config::Config;
use crate::core::connection::debug_logger::get_debug_logger;
use crate::core::connection::errors::{ConnectionError, ProbeError};
use crate::core::connection::poller::{PollOptions, PollType, PollerHandle};
use crate::core::connection::priority::priority_groups;
use crate::core::connection::registry::{ConnectionRegistry, CurrentChange};
use crate::core::connection::selector::{
    best_in_priority, first_connected, is_excluded, sort_for_listing,
};
use crate::core::connection::transport::RpcTransport;
use crate::core::connection::types::{ConnectionListener, RpcConnection};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use std::time::Duration;

#[cfg(feature = "isahc-transport")]
use crate::core::connection::transport::IsahcRpcTransport;

/// Per-call overrides applied by the poller
#[derive(Debug, Clone, Copy)]
pub(crate) struct CheckOptions {
    pub auto_switch: bool,
    /// Used for connections without their own timeout, instead of the default
    pub timeout_ms: Option<u32>,
}

pub(crate) struct ManagerInner {
    registry: RwLock<ConnectionRegistry>,
    listeners: Mutex<Vec<Arc<dyn ConnectionListener>>>,
    transport: Arc<dyn RpcTransport>,
    poller: Mutex<Option<PollerHandle>>,
}

/// Cheaply cloneable handle; clones share the same pool
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<ManagerInner>,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("registry", &*self.registry())
            .field("polling", &self.is_polling())
            .finish()
    }
}

impl ConnectionManager {
    pub fn new(transport: Arc<dyn RpcTransport>) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                registry: RwLock::new(ConnectionRegistry::new()),
                listeners: Mutex::new(Vec::new()),
                transport,
                poller: Mutex::new(None),
            }),
        }
    }

    /// Manager probing over HTTP JSON-RPC
    #[cfg(feature = "isahc-transport")]
    pub fn with_default_transport() -> Result<Self, ProbeError> {
        Ok(Self::new(Arc::new(IsahcRpcTransport::new()?)))
    }

    /// Build a manager from a configuration file's contents.
    ///
    /// Connections are registered in file order. When `polling.enabled` is set
    /// the poll loop is started, which requires a tokio runtime.
    pub fn from_config(config: &Config, transport: Arc<dyn RpcTransport>) -> Result<Self, ConnectionError> {
        let manager = Self::new(transport);
        manager.set_timeout(config.timeout_ms)?;
        manager.set_auto_switch(config.auto_switch);
        for entry in &config.connections {
            manager.add_connection(entry.to_connection())?;
        }
        if config.polling.enabled {
            let registered = manager.registry().list().to_vec();
            manager.start_polling(config.polling.to_poll_options(&registered))?;
        }
        Ok(manager)
    }

    pub(crate) fn downgrade(&self) -> Weak<ManagerInner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn upgrade(inner: &Weak<ManagerInner>) -> Option<Self> {
        inner.upgrade().map(|inner| Self { inner })
    }

    fn registry(&self) -> RwLockReadGuard<'_, ConnectionRegistry> {
        self.inner
            .registry
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn registry_mut(&self) -> RwLockWriteGuard<'_, ConnectionRegistry> {
        self.inner
            .registry
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn listeners(&self) -> MutexGuard<'_, Vec<Arc<dyn ConnectionListener>>> {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ---- registry -------------------------------------------------------

    pub fn add_connection(&self, connection: RpcConnection) -> Result<Arc<RpcConnection>, ConnectionError> {
        self.registry_mut().add(Arc::new(connection))
    }

    pub fn add_connection_uri(&self, uri: &str) -> Result<Arc<RpcConnection>, ConnectionError> {
        self.registry_mut().add_uri(uri)
    }

    pub fn remove_connection(&self, uri: &str) -> Result<(), ConnectionError> {
        let change = self.registry_mut().remove(uri)?;
        self.publish(change);
        Ok(())
    }

    /// Make `connection` current (`None` disconnects).
    ///
    /// A no-op when this exact instance is already current. An unregistered
    /// instance is registered first, replacing any connection with its URI.
    pub fn set_connection(&self, connection: Option<Arc<RpcConnection>>) -> Result<(), ConnectionError> {
        let change = self.registry_mut().set_current(connection)?;
        self.publish(change);
        Ok(())
    }

    /// Select by URI, registering a default connection when the URI is unknown
    pub fn set_connection_uri(&self, uri: &str) -> Result<(), ConnectionError> {
        let change = self.registry_mut().set_current_uri(uri)?;
        self.publish(change);
        Ok(())
    }

    pub fn disconnect(&self) {
        let change = self.registry_mut().set_current(None);
        if let Ok(change) = change {
            self.publish(change);
        }
    }

    pub fn get_connection(&self) -> Option<Arc<RpcConnection>> {
        self.registry().current()
    }

    pub fn get_connection_by_uri(&self, uri: &str) -> Option<Arc<RpcConnection>> {
        self.registry().get(uri)
    }

    /// All connections: current first, then online, then by priority and URI
    pub fn get_connections(&self) -> Vec<Arc<RpcConnection>> {
        let registry = self.registry();
        let current = registry.current();
        sort_for_listing(registry.list(), current.as_ref())
    }

    pub fn has_connection(&self, uri: &str) -> bool {
        self.registry().has(uri)
    }

    /// Whether the current connection is online and authenticated
    pub fn is_connected(&self) -> bool {
        self.get_connection().is_some_and(|c| c.is_connected())
    }

    pub fn clear(&self) {
        let change = self.registry_mut().clear();
        self.publish(change);
    }

    /// Stop polling, drop listeners and connections, restore defaults
    pub fn reset(&self) {
        self.stop_polling();
        self.remove_listeners();
        let change = self.registry_mut().reset();
        self.publish(change);
    }

    pub fn set_auto_switch(&self, auto_switch: bool) {
        self.registry_mut().set_auto_switch(auto_switch);
    }

    pub fn get_auto_switch(&self) -> bool {
        self.registry().auto_switch()
    }

    /// Default probe timeout for connections without their own; must be non-zero
    pub fn set_timeout(&self, timeout_ms: u32) -> Result<(), ConnectionError> {
        if timeout_ms == 0 {
            return Err(ConnectionError::InvalidTimeout);
        }
        self.registry_mut().set_default_timeout_ms(timeout_ms);
        Ok(())
    }

    pub fn get_timeout(&self) -> u32 {
        self.registry().default_timeout_ms()
    }

    // ---- listeners ------------------------------------------------------

    pub fn add_listener(&self, listener: Arc<dyn ConnectionListener>) {
        self.listeners().push(listener);
    }

    /// Remove one listener by identity; returns whether it was registered
    pub fn remove_listener(&self, listener: &Arc<dyn ConnectionListener>) -> bool {
        let mut listeners = self.listeners();
        let before = listeners.len();
        listeners.retain(|l| !same_listener(l, listener));
        listeners.len() != before
    }

    pub fn remove_listeners(&self) {
        self.listeners().clear();
    }

    pub fn get_listeners(&self) -> Vec<Arc<dyn ConnectionListener>> {
        self.listeners().clone()
    }

    fn publish(&self, change: CurrentChange) {
        if let CurrentChange::Changed(connection) = change {
            self.notify(connection);
        }
    }

    fn notify(&self, connection: Option<Arc<RpcConnection>>) {
        let listeners = self.get_listeners();
        get_debug_logger().connection_changed(connection.as_ref().map(|c| c.uri()), listeners.len());
        for listener in &listeners {
            listener.on_connection_changed(connection.clone());
        }
    }

    /// Notify when a probe changed the observed state of the current connection
    fn publish_status_changes(&self, probed: &[Arc<RpcConnection>], changed: &[bool]) {
        let current = self.get_connection();
        let Some(current) = current else {
            return;
        };
        let current_changed = probed
            .iter()
            .zip(changed)
            .any(|(connection, changed)| *changed && Arc::ptr_eq(connection, &current));
        if current_changed {
            self.notify(Some(current));
        }
    }

    // ---- failover -------------------------------------------------------

    fn default_options(&self) -> CheckOptions {
        CheckOptions {
            auto_switch: self.get_auto_switch(),
            timeout_ms: None,
        }
    }

    /// Probe the current connection; fail over when it is no longer connected
    /// and auto-switch is on. Returns whether its observed state changed.
    pub async fn check_connection(&self) -> Result<bool, ConnectionError> {
        self.check_connection_with(self.default_options()).await
    }

    pub(crate) async fn check_connection_with(&self, options: CheckOptions) -> Result<bool, ConnectionError> {
        let Some(current) = self.get_connection() else {
            return Ok(false);
        };

        let probed = [Arc::clone(&current)];
        let changed = self.probe_batch("check_connection", &probed, options).await?;
        self.publish_status_changes(&probed, &changed);
        let state_changed = changed.iter().any(|c| *c);

        if options.auto_switch && !current.is_connected() {
            if let Some(best) = self.best_available_with(&probed, options).await? {
                self.switch_from(&current, best, "current connection lost");
            }
        }

        Ok(state_changed)
    }

    /// Probe priority groups, most important first with unranked last, and
    /// return the first connected connection of the first group that has one.
    /// Within a group the registration order breaks ties.
    pub async fn get_best_available_connection(
        &self,
        excluded: &[Arc<RpcConnection>],
    ) -> Result<Option<Arc<RpcConnection>>, ConnectionError> {
        self.best_available_with(excluded, self.default_options()).await
    }

    async fn best_available_with(
        &self,
        excluded: &[Arc<RpcConnection>],
        options: CheckOptions,
    ) -> Result<Option<Arc<RpcConnection>>, ConnectionError> {
        let connections = self.registry().list().to_vec();
        for group in priority_groups(&connections) {
            let candidates: Vec<_> = group
                .into_iter()
                .filter(|c| !is_excluded(c, excluded))
                .collect();
            if candidates.is_empty() {
                continue;
            }

            let changed = self
                .probe_batch("get_best_available_connection", &candidates, options)
                .await?;
            self.publish_status_changes(&candidates, &changed);

            if let Some(found) = first_connected(&candidates) {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    /// Probe `connections` concurrently, switch to the first connected one when
    /// the manager is disconnected, then re-rank by priority and latency.
    /// Returns whether any probed connection is connected.
    pub async fn check_connections(
        &self,
        connections: &[Arc<RpcConnection>],
        excluded: &[Arc<RpcConnection>],
    ) -> Result<bool, ConnectionError> {
        self.check_connections_with(connections, excluded, self.default_options())
            .await
    }

    pub(crate) async fn check_connections_with(
        &self,
        connections: &[Arc<RpcConnection>],
        excluded: &[Arc<RpcConnection>],
        options: CheckOptions,
    ) -> Result<bool, ConnectionError> {
        let candidates: Vec<_> = connections
            .iter()
            .filter(|c| !is_excluded(c, excluded))
            .cloned()
            .collect();

        let changed = self.probe_batch("check_connections", &candidates, options).await?;
        self.publish_status_changes(&candidates, &changed);

        let first = first_connected(&candidates);
        if options.auto_switch {
            if let Some(first) = &first {
                self.switch_if_disconnected(first);
            }
            self.recompute_best_in_priority()?;
        }

        Ok(first.is_some())
    }

    /// Re-rank all connections from their last observed state and switch when
    /// warranted. Equal-priority switches require a consistently faster
    /// response window. Returns the connection switched to, if any.
    pub fn recompute_best_in_priority(&self) -> Result<Option<Arc<RpcConnection>>, ConnectionError> {
        let change = {
            let mut registry = self.registry_mut();
            let current = registry.current();
            match best_in_priority(registry.list(), current.as_ref()) {
                Some(best) => {
                    let change = registry.switch_to(Arc::clone(&best));
                    if change.is_changed() {
                        get_debug_logger().auto_switch(
                            current.as_ref().map(|c| c.uri()),
                            best.uri(),
                            "better connection in priority",
                        );
                    }
                    change
                }
                None => CurrentChange::Unchanged,
            }
        };
        let switched = match &change {
            CurrentChange::Changed(connection) => connection.clone(),
            CurrentChange::Unchanged => None,
        };
        self.publish(change);
        Ok(switched)
    }

    /// Switch only if `expected` is still current, so a concurrent explicit
    /// selection is never overridden by a stale decision. A target removed
    /// meanwhile is left out.
    fn switch_from(&self, expected: &Arc<RpcConnection>, to: Arc<RpcConnection>, reason: &str) {
        let change = {
            let mut registry = self.registry_mut();
            if !registry.is_current(expected) {
                return;
            }
            let change = registry.switch_to(Arc::clone(&to));
            if change.is_changed() {
                get_debug_logger().auto_switch(Some(expected.uri()), to.uri(), reason);
            }
            change
        };
        self.publish(change);
    }

    fn switch_if_disconnected(&self, to: &Arc<RpcConnection>) {
        let change = {
            let mut registry = self.registry_mut();
            let current = registry.current();
            if current.as_ref().is_some_and(|c| c.is_connected()) {
                return;
            }
            let change = registry.switch_to(Arc::clone(to));
            if change.is_changed() {
                get_debug_logger().auto_switch(
                    current.as_ref().map(|c| c.uri()),
                    to.uri(),
                    "no current connection",
                );
            }
            change
        };
        self.publish(change);
    }

    /// Fan out one task per connection and join them all.
    ///
    /// Returns, per input connection, whether its online/auth state changed.
    async fn probe_batch(
        &self,
        operation: &'static str,
        connections: &[Arc<RpcConnection>],
        options: CheckOptions,
    ) -> Result<Vec<bool>, ConnectionError> {
        let default_timeout_ms = options
            .timeout_ms
            .filter(|ms| *ms > 0)
            .unwrap_or_else(|| self.get_timeout());

        let handles: Vec<_> = connections
            .iter()
            .map(|connection| {
                let transport = Arc::clone(&self.inner.transport);
                let connection = Arc::clone(connection);
                let timeout_ms = connection
                    .timeout_ms()
                    .filter(|ms| *ms > 0)
                    .unwrap_or(default_timeout_ms);
                tokio::spawn(probe_one(transport, connection, timeout_ms))
            })
            .collect();

        futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.map_err(|source| ConnectionError::BatchOrchestration { operation, source }))
            .collect()
    }

    // ---- polling --------------------------------------------------------

    /// Start the background poll loop on the current tokio runtime, replacing
    /// any running one. Fails with `NoRuntime` when called outside a runtime.
    pub fn start_polling(&self, options: PollOptions) -> Result<(), ConnectionError> {
        let handle = PollerHandle::spawn(self, options)?;
        let previous = self.poller().replace(handle);
        if let Some(previous) = previous {
            previous.stop();
        }
        Ok(())
    }

    /// Stop the poll loop. Safe to call when not polling.
    pub fn stop_polling(&self) {
        let handle = self.poller().take();
        if let Some(handle) = handle {
            handle.stop();
        }
    }

    pub fn is_polling(&self) -> bool {
        self.poller().as_ref().is_some_and(|handle| !handle.is_finished())
    }

    fn poller(&self) -> MutexGuard<'_, Option<PollerHandle>> {
        self.inner
            .poller
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// One poll iteration. Returns whether the manager ends up connected.
    pub(crate) async fn poll_once(&self, options: &PollOptions) -> Result<bool, ConnectionError> {
        let check = CheckOptions {
            auto_switch: options.auto_switch.unwrap_or_else(|| self.get_auto_switch()),
            timeout_ms: options.timeout_ms,
        };

        match options.poll_type {
            PollType::Current => {
                self.check_connection_with(check).await?;
            }
            PollType::All => {
                let connections = self.registry().list().to_vec();
                self.check_connections_with(&connections, &options.excluded, check)
                    .await?;
            }
            PollType::Prioritized => {
                let connections = self.registry().list().to_vec();
                for group in priority_groups(&connections) {
                    if self
                        .check_connections_with(&group, &options.excluded, check)
                        .await?
                    {
                        break;
                    }
                }
            }
        }

        Ok(self.is_connected())
    }
}

async fn probe_one(transport: Arc<dyn RpcTransport>, connection: Arc<RpcConnection>, timeout_ms: u32) -> bool {
    let logger = get_debug_logger();
    logger.probe_start(connection.uri(), timeout_ms);

    let limit = Duration::from_millis(timeout_ms as u64);
    let result = match tokio::time::timeout(limit, transport.probe(&connection, timeout_ms)).await {
        Ok(result) => result,
        Err(_) => Err(ProbeError::Timeout { timeout_ms }),
    };

    let changed = connection.apply_probe(&result);
    logger.probe_end(
        connection.uri(),
        connection.is_connected(),
        connection.last_response_time(),
        result.as_ref().err().map(|e| e.to_string()).as_deref(),
    );
    changed
}

fn same_listener(a: &Arc<dyn ConnectionListener>, b: &Arc<dyn ConnectionListener>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}
