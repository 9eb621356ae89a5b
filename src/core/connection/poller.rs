//! Background poll loop.
//!
//! One spawned task per running poller. Each tick runs one full iteration and
//! awaits all of its probes; stop only prevents the next iteration. Errors in an
//! iteration are logged and never end the loop.

use crate::core::connection::debug_logger::get_debug_logger;
use crate::core::connection::errors::ConnectionError;
use crate::core::connection::manager::{ConnectionManager, ManagerInner};
use crate::core::connection::types::RpcConnection;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

pub const DEFAULT_POLL_PERIOD_MS: u64 = 20_000;

/// Which connections each poll iteration checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollType {
    /// Priority groups in order, stopping at the first group with a connected member
    #[default]
    Prioritized,
    /// Only the current connection, failing over when it drops
    Current,
    /// Every registered connection
    All,
}

impl std::fmt::Display for PollType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PollType::Prioritized => write!(f, "prioritized"),
            PollType::Current => write!(f, "current"),
            PollType::All => write!(f, "all"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PollOptions {
    pub period_ms: u64,
    /// Overrides the manager's auto-switch while polling
    pub auto_switch: Option<bool>,
    /// Overrides the manager's default timeout while polling
    pub timeout_ms: Option<u32>,
    pub poll_type: PollType,
    /// Never probed by batch checks
    pub excluded: Vec<Arc<RpcConnection>>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            period_ms: DEFAULT_POLL_PERIOD_MS,
            auto_switch: None,
            timeout_ms: None,
            poll_type: PollType::default(),
            excluded: Vec::new(),
        }
    }
}

impl PollOptions {
    pub fn new(period_ms: u64) -> Self {
        Self {
            period_ms,
            ..Default::default()
        }
    }

    pub fn with_auto_switch(mut self, auto_switch: bool) -> Self {
        self.auto_switch = Some(auto_switch);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_poll_type(mut self, poll_type: PollType) -> Self {
        self.poll_type = poll_type;
        self
    }

    pub fn with_excluded(mut self, excluded: Vec<Arc<RpcConnection>>) -> Self {
        self.excluded = excluded;
        self
    }
}

pub(crate) struct PollerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Spawns on the caller's tokio runtime; fails with `NoRuntime` outside one
    pub(crate) fn spawn(manager: &ConnectionManager, options: PollOptions) -> Result<Self, ConnectionError> {
        let runtime = Handle::try_current().map_err(|_| ConnectionError::NoRuntime)?;
        let (shutdown, shutdown_rx) = watch::channel(false);
        get_debug_logger().poller_started(options.period_ms, &options.poll_type.to_string());
        let task = runtime.spawn(run(manager.downgrade(), options, shutdown_rx));
        Ok(Self { shutdown, task })
    }

    pub(crate) fn stop(self) {
        let _ = self.shutdown.send(true);
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

async fn run(weak: Weak<ManagerInner>, options: PollOptions, mut shutdown: watch::Receiver<bool>) {
    let logger = get_debug_logger();
    let mut ticker = interval(Duration::from_millis(options.period_ms.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut iterations = 0u64;

    loop {
        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
            _ = ticker.tick() => {}
        }

        // Manager dropped
        let Some(manager) = ConnectionManager::upgrade(&weak) else {
            break;
        };

        iterations += 1;
        let started = Instant::now();
        match manager.poll_once(&options).await {
            Ok(connected) => {
                logger.poll_iteration(iterations, started.elapsed().as_millis() as u64, connected)
            }
            Err(e) => logger.poll_error(iterations, &e.to_string()),
        }
    }

    logger.poller_stopped(iterations);
}
