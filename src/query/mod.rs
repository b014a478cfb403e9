//! Query evaluation for triadb
//!
//! The query layer evaluates filter trees against materialized entities.
//! Groups short-circuit in priority order, relational filters run bounded
//! sub-queries through a single-flight cache, and statement semantics
//! follow the schema-declared attribute kind.
//!
//! # Invariants
//!
//! - Group children evaluate sequentially in priority order; no
//!   concurrent fan-out inside a group
//! - Identical bound sub-queries execute at most once per
//!   `ExecutionContext`
//! - Unprepared `exists` filters fail evaluation; they are never treated
//!   as unsatisfied

mod ast;
mod context;
mod errors;
mod filters;
mod priority;
mod subquery;

pub use ast::{and, exists, or, Filter, GroupMode, Op, SubQuery};
pub use context::{ExecutionContext, SubqueryOutcome};
pub use errors::{QueryError, QueryResult};
pub use filters::{satisfies, satisfies_register_filter, satisfies_set_filter, QueryEnv};
pub use priority::{priority_order, FilterKind};
pub use subquery::{StoreSubqueryExecutor, SubqueryExecutor};
