//! Ephemeral in-process clock.

use uuid::Uuid;

use super::errors::ClockResult;
use super::timestamp::Timestamp;
use super::Clock;

/// A clock that starts fresh each process lifetime.
///
/// Used where durability is not required: local-only stores and tests.
/// Monotonicity holds per instance; nothing survives a restart.
#[derive(Debug)]
pub struct MemoryClock {
    counter: u64,
    replica: String,
}

impl MemoryClock {
    /// Creates a clock for the given replica id, starting at zero.
    pub fn new(replica: impl Into<String>) -> Self {
        Self {
            counter: 0,
            replica: replica.into(),
        }
    }

    /// Creates a clock with a random replica id.
    pub fn with_random_replica() -> Self {
        Self::new(Uuid::new_v4().to_string())
    }
}

impl Clock for MemoryClock {
    fn tick(&mut self) -> ClockResult<Timestamp> {
        self.counter += 1;
        Ok(Timestamp::new(self.counter, self.replica.clone()))
    }

    fn replica_id(&self) -> &str {
        &self.replica
    }

    fn last_issued(&self) -> u64 {
        self.counter
    }
}
