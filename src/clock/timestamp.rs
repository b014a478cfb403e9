//! Logical timestamps with a replica-scoped total order.
//!
//! A timestamp is a (counter, replica) pair. Ordering compares counters
//! first and breaks ties lexicographically on the replica id, so any two
//! timestamps from any two replicas are comparable and the order is the
//! same no matter which side evaluates it.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A replica-scoped logical timestamp.
///
/// Immutable once issued. The total order over timestamps is the sole
/// authority for conflict resolution in the triple store: the greatest
/// timestamp wins, and no two timestamps issued by the same clock are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    counter: u64,
    replica: String,
}

impl Timestamp {
    /// Creates a timestamp from an already-issued counter value.
    pub fn new(counter: u64, replica: impl Into<String>) -> Self {
        Self {
            counter,
            replica: replica.into(),
        }
    }

    /// Returns the logical counter.
    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Returns the issuing replica id.
    pub fn replica(&self) -> &str {
        &self.replica
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.counter
            .cmp(&other.counter)
            .then_with(|| self.replica.cmp(&other.replica))
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.counter, self.replica)
    }
}
