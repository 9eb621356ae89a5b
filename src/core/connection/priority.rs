//! Priority ordering and grouping
//!
//! Priority `0` is "unranked" and always has the lowest precedence. Among
//! non-zero priorities a larger number wins.

use crate::core::connection::types::RpcConnection;
use std::cmp::Ordering;
use std::sync::Arc;

/// Compare two priorities by precedence.
///
/// `Greater` means `p1` is more important than `p2`. Unranked (`0`) is less
/// important than every non-zero priority.
pub fn compare_priority(p1: u32, p2: u32) -> Ordering {
    match (p1, p2) {
        _ if p1 == p2 => Ordering::Equal,
        (0, _) => Ordering::Less,
        (_, 0) => Ordering::Greater,
        _ => p1.cmp(&p2),
    }
}

/// Split connections into priority groups, most important group first and the
/// unranked group last. Order within a group follows the input order.
pub fn priority_groups(connections: &[Arc<RpcConnection>]) -> Vec<Vec<Arc<RpcConnection>>> {
    let mut priorities: Vec<u32> = connections.iter().map(|c| c.priority()).collect();
    priorities.sort_by(|a, b| compare_priority(*b, *a));
    priorities.dedup();

    priorities
        .into_iter()
        .map(|priority| {
            connections
                .iter()
                .filter(|c| c.priority() == priority)
                .cloned()
                .collect()
        })
        .collect()
}
