//! Append-only triple ledger.
//!
//! The store never overwrites: updates and tombstones are newer-timestamped
//! appends, and out-of-order or concurrent timestamps are expected input.
//! Conflict resolution lives entirely in the materializer, which makes the
//! merged state a pure function of the set of triples applied.

use std::collections::HashMap;

use super::record::{EntityKey, Triple};

/// Read capability consumed by the materializer and query layer.
///
/// Implementations must only surface committed triples; a scan never
/// observes a partially applied write.
pub trait TripleScan {
    /// All known triples for one entity.
    fn scan_entity(&self, entity: &EntityKey) -> Vec<Triple>;

    /// All known triples for every entity in a collection.
    fn scan_collection(&self, collection: &str) -> Vec<Triple>;
}

/// Options for `TripleStore::clear`.
#[derive(Debug, Clone, Default)]
pub struct ClearOptions {
    collection: Option<String>,
}

impl ClearOptions {
    /// Clear every triple in the store.
    pub fn everything() -> Self {
        Self { collection: None }
    }

    /// Clear only the named collection.
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            collection: Some(name.into()),
        }
    }
}

/// In-memory append-only triple store with entity and collection indexes.
#[derive(Debug, Default)]
pub struct TripleStore {
    log: Vec<Triple>,
    by_entity: HashMap<EntityKey, Vec<usize>>,
    by_collection: HashMap<String, Vec<usize>>,
}

impl TripleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a fact. Never rejects on ordering; a triple carrying an
    /// older or concurrent timestamp merges correctly at materialization.
    pub fn append(&mut self, triple: Triple) {
        tracing::trace!(triple = %triple, "append");
        let position = self.log.len();
        self.by_entity
            .entry(triple.entity.clone())
            .or_default()
            .push(position);
        self.by_collection
            .entry(triple.entity.collection.clone())
            .or_default()
            .push(position);
        self.log.push(triple);
    }

    /// Appends every triple from an iterator.
    pub fn extend(&mut self, triples: impl IntoIterator<Item = Triple>) {
        for triple in triples {
            self.append(triple);
        }
    }

    /// Number of triples in the ledger (tombstones included).
    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    /// Entity keys present in a collection (live or not), in key order.
    pub fn collection_keys(&self, collection: &str) -> Vec<EntityKey> {
        self.by_collection
            .get(collection)
            .map(|positions| {
                positions
                    .iter()
                    .map(|&p| self.log[p].entity.clone())
                    .collect::<std::collections::BTreeSet<_>>()
                    .into_iter()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Removes triples per the given options and rebuilds the indexes, so
    /// convergence holds for anything written afterward.
    pub fn clear(&mut self, options: ClearOptions) {
        match options.collection {
            None => {
                tracing::debug!("clearing all triples");
                self.log.clear();
                self.by_entity.clear();
                self.by_collection.clear();
            }
            Some(collection) => {
                tracing::debug!(collection = %collection, "clearing collection");
                self.log.retain(|t| t.entity.collection != collection);
                self.by_entity.clear();
                self.by_collection.clear();
                let log = std::mem::take(&mut self.log);
                for triple in log {
                    self.append(triple);
                }
            }
        }
    }
}

impl TripleScan for TripleStore {
    fn scan_entity(&self, entity: &EntityKey) -> Vec<Triple> {
        self.by_entity
            .get(entity)
            .map(|positions| positions.iter().map(|&p| self.log[p].clone()).collect())
            .unwrap_or_default()
    }

    fn scan_collection(&self, collection: &str) -> Vec<Triple> {
        self.by_collection
            .get(collection)
            .map(|positions| positions.iter().map(|&p| self.log[p].clone()).collect())
            .unwrap_or_default()
    }
}
