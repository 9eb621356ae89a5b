//! Rolling probe-latency history used as the anti-flapping gate.
//!
//! Each connection keeps the `MIN_BETTER_RESPONSES` most recent probe outcomes,
//! newest first. A failed probe is recorded as `None`.

use std::collections::VecDeque;

/// Number of consecutive better samples required before switching between
/// connections of equal priority.
pub const MIN_BETTER_RESPONSES: usize = 3;

/// Sliding window of recent probe latencies for one connection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseHistory {
    samples: VecDeque<Option<u64>>,
}

impl ResponseHistory {
    pub fn new() -> Self {
        Self {
            samples: VecDeque::with_capacity(MIN_BETTER_RESPONSES),
        }
    }

    /// Push the newest outcome to the front, dropping the oldest past capacity
    pub fn record(&mut self, latency_ms: Option<u64>) {
        self.samples.push_front(latency_ms);
        self.samples.truncate(MIN_BETTER_RESPONSES);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples newest first
    pub fn samples(&self) -> impl Iterator<Item = Option<u64>> + '_ {
        self.samples.iter().copied()
    }

    /// True only when both windows are full and every aligned sample of `self`
    /// is present and strictly faster than the present sample of `other`.
    pub fn is_consistently_better(&self, other: &ResponseHistory) -> bool {
        if self.len() < MIN_BETTER_RESPONSES || other.len() < MIN_BETTER_RESPONSES {
            return false;
        }
        self.samples
            .iter()
            .zip(other.samples.iter())
            .take(MIN_BETTER_RESPONSES)
            .all(|pair| match pair {
                (Some(mine), Some(theirs)) => mine < theirs,
                _ => false,
            })
    }
}
