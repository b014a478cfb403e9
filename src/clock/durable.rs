//! Durable clock with a persisted high-water mark.
//!
//! The last-issued counter is written to `clock.dat` before a timestamp is
//! handed out, so a restart resumes from the stored high-water mark instead
//! of regressing. The state record is CRC32-guarded; a corrupt or unreadable
//! file aborts startup rather than silently resetting the counter.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::{ClockError, ClockResult};
use super::timestamp::Timestamp;
use super::Clock;

const STATE_FILE: &str = "clock.dat";

/// On-disk clock state. `saved_at` is diagnostic only and never
/// participates in ordering.
#[derive(Debug, Serialize, Deserialize)]
struct ClockState {
    counter: u64,
    replica: String,
    saved_at: DateTime<Utc>,
}

/// A clock whose last-issued counter survives restarts.
pub struct DurableClock {
    state_path: PathBuf,
    counter: u64,
    replica: String,
}

impl DurableClock {
    /// Opens or initializes clock state under `data_dir`.
    ///
    /// A fresh directory gets a new replica id (random unless `replica` is
    /// given) and a counter of zero. An existing state file is validated and
    /// resumed from; if `replica` is given it must match the stored id.
    ///
    /// # Errors
    ///
    /// Returns `ClockError::CorruptState` if the state file exists but fails
    /// checksum or parse validation, and `ClockError::ReplicaMismatch` if a
    /// requested replica id disagrees with the stored one.
    pub fn open(data_dir: &Path, replica: Option<String>) -> ClockResult<Self> {
        fs::create_dir_all(data_dir)?;
        let state_path = data_dir.join(STATE_FILE);

        if state_path.exists() {
            let state = Self::read_state(&state_path)?;
            if let Some(requested) = replica {
                if requested != state.replica {
                    return Err(ClockError::ReplicaMismatch {
                        stored: state.replica,
                        requested,
                    });
                }
            }
            tracing::debug!(
                counter = state.counter,
                replica = %state.replica,
                "resumed durable clock"
            );
            return Ok(Self {
                state_path,
                counter: state.counter,
                replica: state.replica,
            });
        }

        let clock = Self {
            state_path,
            counter: 0,
            replica: replica.unwrap_or_else(|| Uuid::new_v4().to_string()),
        };
        clock.persist()?;
        tracing::debug!(replica = %clock.replica, "initialized durable clock");
        Ok(clock)
    }

    /// Reads and validates the persisted state record.
    ///
    /// Layout: 4-byte big-endian payload length, JSON payload, 4-byte
    /// big-endian CRC32 over the payload.
    fn read_state(path: &Path) -> ClockResult<ClockState> {
        let mut file = File::open(path)?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;

        if bytes.len() < 8 {
            return Err(ClockError::corrupt(path, "state record truncated"));
        }
        let len = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        if bytes.len() != 4 + len + 4 {
            return Err(ClockError::corrupt(path, "state record length mismatch"));
        }
        let payload = &bytes[4..4 + len];
        let stored_crc = u32::from_be_bytes([
            bytes[4 + len],
            bytes[4 + len + 1],
            bytes[4 + len + 2],
            bytes[4 + len + 3],
        ]);
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(payload);
        if hasher.finalize() != stored_crc {
            return Err(ClockError::corrupt(path, "checksum mismatch"));
        }
        serde_json::from_slice(payload)
            .map_err(|e| ClockError::corrupt(path, format!("unparseable payload: {}", e)))
    }

    /// Writes the current state with fsync before any timestamp escapes.
    fn persist(&self) -> ClockResult<()> {
        let payload = serde_json::to_vec(&ClockState {
            counter: self.counter,
            replica: self.replica.clone(),
            saved_at: Utc::now(),
        })
        .map_err(|e| ClockError::corrupt(&self.state_path, e.to_string()))?;

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&payload);
        let crc = hasher.finalize();

        let mut record = Vec::with_capacity(8 + payload.len());
        record.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        record.extend_from_slice(&payload);
        record.extend_from_slice(&crc.to_be_bytes());

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.state_path)?;
        file.write_all(&record)?;
        file.sync_all()?;
        Ok(())
    }
}

impl Clock for DurableClock {
    fn tick(&mut self) -> ClockResult<Timestamp> {
        let next = self.counter.checked_add(1).ok_or(ClockError::Regression {
            last: self.counter,
            attempted: 0,
        })?;
        self.counter = next;
        self.persist()?;
        Ok(Timestamp::new(next, self.replica.clone()))
    }

    fn replica_id(&self) -> &str {
        &self.replica
    }

    fn last_issued(&self) -> u64 {
        self.counter
    }
}
