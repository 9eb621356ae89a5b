//! Client-side connection management for Monero daemon and wallet RPC endpoints.
//!
//! ```rust,ignore
//! use monero_connection_manager::core::connection::*;
//!
//! let manager = ConnectionManager::with_default_transport()?;
//! manager.add_connection(RpcConnection::new("http://127.0.0.1:18081").with_priority(1))?;
//! manager.add_connection(RpcConnection::new("http://node.example.org:18089"))?;
//! manager.start_polling(PollOptions::new(10_000))?;
//! ```

pub mod cli;
pub mod config;
pub mod core;
