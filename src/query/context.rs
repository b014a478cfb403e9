//! Per-execution query state.
//!
//! An `ExecutionContext` lives for exactly one top-level query execution.
//! It deduplicates identical bound sub-queries (single-flight, keyed by
//! fingerprint), accumulates the entities that fulfilled relational
//! filters, and memoizes compiled `like` patterns. Nothing in it outlives
//! the execution, so a later query always sees current data.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use regex::Regex;
use tokio::sync::OnceCell;

use crate::entity::Entity;
use crate::triple::EntityKey;

use super::errors::QueryResult;

/// Outcome of one bounded sub-query: the first matching entity, if any.
pub type SubqueryOutcome = Option<(EntityKey, Entity)>;

/// State scoped to a single query execution.
#[derive(Default)]
pub struct ExecutionContext {
    subquery_cache: Mutex<HashMap<String, Arc<OnceCell<SubqueryOutcome>>>>,
    fulfilled: Mutex<BTreeMap<EntityKey, Entity>>,
    like_patterns: Mutex<HashMap<String, Regex>>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// The single-flight cell for a sub-query fingerprint. Concurrent
    /// callers holding the same cell run the sub-query once and share the
    /// outcome.
    pub(crate) fn subquery_cell(&self, fingerprint: &str) -> Arc<OnceCell<SubqueryOutcome>> {
        let mut cache = self.subquery_cache.lock().unwrap();
        Arc::clone(cache.entry(fingerprint.to_owned()).or_default())
    }

    pub(crate) fn record_fulfillment(&self, key: EntityKey, entity: Entity) {
        self.fulfilled.lock().unwrap().insert(key, entity);
    }

    /// Entities that satisfied a relational filter during this execution,
    /// in key order. Available to callers that assemble nested results.
    pub fn fulfilled(&self) -> Vec<(EntityKey, Entity)> {
        self.fulfilled
            .lock()
            .unwrap()
            .iter()
            .map(|(k, e)| (k.clone(), e.clone()))
            .collect()
    }

    /// Returns the compiled regex for a `like` pattern, compiling at most
    /// once per execution.
    pub(crate) fn cached_like(
        &self,
        pattern: &str,
        compile: impl FnOnce() -> QueryResult<Regex>,
    ) -> QueryResult<Regex> {
        let mut patterns = self.like_patterns.lock().unwrap();
        if let Some(regex) = patterns.get(pattern) {
            return Ok(regex.clone());
        }
        let regex = compile()?;
        patterns.insert(pattern.to_owned(), regex.clone());
        Ok(regex)
    }
}
