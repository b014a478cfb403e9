//! Triple storage subsystem for triadb
//!
//! The unit of storage is a versioned triple: one timestamped fact about one
//! entity attribute. The ledger is append-only; updates and deletes are
//! newer-timestamped facts and tombstones, never in-place changes.
//!
//! # Invariants
//!
//! - Appends never reject on timestamp order; merging is the
//!   materializer's job and is commutative, associative, and idempotent
//! - Triples are immutable once appended
//! - Scans reflect committed triples only

mod record;
mod store;

pub use record::{Attribute, EntityKey, Triple};
pub use store::{ClearOptions, TripleScan, TripleStore};
