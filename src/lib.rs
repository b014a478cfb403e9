//! # triadb
//!
//! An embeddable, locally-materialized triple database. State is a ledger
//! of timestamped triples merged with last-write-wins semantics, entities
//! are pure projections of that ledger, and queries evaluate filter trees
//! asynchronously with bounded relational sub-queries.

pub mod clock;
pub mod db;
pub mod entity;
pub mod query;
pub mod schema;
pub mod triple;
