//! Connection Management Module
//!
//! Keeps a pool of Monero daemon / wallet-RPC connections and one current
//! connection, with:
//! - Priority groups (unranked last, larger number first)
//! - Concurrent, timeout-bounded health probes
//! - Automatic failover with latency hysteresis between equal priorities
//! - Optional background polling

pub mod debug_logger;
pub mod errors;
pub mod health;
pub mod manager;
pub mod poller;
pub mod priority;
pub mod registry;
pub mod selector;
pub mod transport;
pub mod types;

// Re-export public API
pub use debug_logger::{get_debug_logger, DebugLogger};
pub use errors::{ConnectionError, ProbeError};
pub use health::{ResponseHistory, MIN_BETTER_RESPONSES};
pub use manager::ConnectionManager;
pub use poller::{PollOptions, PollType, DEFAULT_POLL_PERIOD_MS};
pub use priority::{compare_priority, priority_groups};
pub use registry::{ConnectionRegistry, CurrentChange, DEFAULT_AUTO_SWITCH, DEFAULT_TIMEOUT_MS};
pub use transport::RpcTransport;
pub use types::{ConnectionListener, ConnectionSnapshot, ProbeResponse, RpcConnection, Tristate};

#[cfg(feature = "isahc-transport")]
pub use transport::IsahcRpcTransport;
