//! Selection rules for the failover engine.
//!
//! These functions only read connection state; probing and switching happen in
//! the manager.

use crate::core::connection::priority::{compare_priority, priority_groups};
use crate::core::connection::types::RpcConnection;
use std::sync::Arc;

pub fn is_excluded(connection: &RpcConnection, excluded: &[Arc<RpcConnection>]) -> bool {
    excluded.iter().any(|e| e.uri() == connection.uri())
}

/// First connected member in list order
pub fn first_connected(connections: &[Arc<RpcConnection>]) -> Option<Arc<RpcConnection>> {
    connections.iter().find(|c| c.is_connected()).cloned()
}

/// Connected member with the lowest last response time; earlier entries win ties
pub fn fastest_connected(connections: &[Arc<RpcConnection>]) -> Option<Arc<RpcConnection>> {
    let mut best: Option<(&Arc<RpcConnection>, u64)> = None;
    for connection in connections {
        if !connection.is_connected() {
            continue;
        }
        let Some(latency) = connection.last_response_time() else {
            continue;
        };
        match best {
            Some((_, best_latency)) if best_latency <= latency => {}
            _ => best = Some((connection, latency)),
        }
    }
    best.map(|(connection, _)| Arc::clone(connection))
}

/// Decide which connection, if any, should replace `current`.
///
/// Groups are visited most important first with unranked last; the first group
/// holding a connected member decides. A candidate of a different priority, or
/// any candidate when `current` is absent or disconnected, wins outright. A
/// candidate of equal priority must be consistently faster over the full
/// response window.
pub fn best_in_priority(
    connections: &[Arc<RpcConnection>],
    current: Option<&Arc<RpcConnection>>,
) -> Option<Arc<RpcConnection>> {
    for group in priority_groups(connections) {
        let Some(candidate) = fastest_connected(&group) else {
            continue;
        };

        let current = match current {
            Some(current) if current.is_connected() => current,
            _ => return Some(candidate),
        };
        if Arc::ptr_eq(&candidate, current) {
            return None;
        }
        if candidate.priority() != current.priority() {
            return Some(candidate);
        }

        let candidate_history = candidate.response_history();
        let current_history = current.response_history();
        if candidate_history.is_consistently_better(&current_history) {
            return Some(candidate);
        }
        return None;
    }
    None
}

/// Listing order: current first, then online, then precedence, then URI
pub fn sort_for_listing(
    connections: &[Arc<RpcConnection>],
    current: Option<&Arc<RpcConnection>>,
) -> Vec<Arc<RpcConnection>> {
    let mut sorted = connections.to_vec();
    sorted.sort_by(|a, b| {
        let a_current = current.is_some_and(|c| Arc::ptr_eq(c, a));
        let b_current = current.is_some_and(|c| Arc::ptr_eq(c, b));
        b_current
            .cmp(&a_current)
            .then_with(|| b.is_online().is_yes().cmp(&a.is_online().is_yes()))
            .then_with(|| compare_priority(b.priority(), a.priority()))
            .then_with(|| a.uri().cmp(b.uri()))
    });
    sorted
}
