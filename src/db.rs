//! Embeddable database facade.
//!
//! `Db` wires the subsystems together: a clock stamps writes, documents
//! flatten into leaf triples on the append-only store, and fetches
//! materialize entities and run them through the filter evaluator. All
//! data lives locally; there is no remote round trip anywhere below this
//! type.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use serde_json::Value;
use thiserror::Error;

use crate::clock::{Clock, ClockError, MemoryClock, Timestamp};
use crate::entity::{construct_entities, construct_entity, Entity};
use crate::query::{
    satisfies, ExecutionContext, Filter, QueryEnv, QueryError, StoreSubqueryExecutor,
};
use crate::schema::{AttributeKind, SchemaProvider};
use crate::triple::{Attribute, ClearOptions, EntityKey, Triple, TripleScan, TripleStore};

/// Errors surfaced by the database facade.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("clock error: {0}")]
    Clock(#[from] ClockError),
    #[error("query error: {0}")]
    Query(#[from] QueryError),
    #[error("documents must be JSON objects")]
    InvalidDocument,
}

/// An embedded triple database bound to one clock.
pub struct Db<C: Clock> {
    store: Arc<RwLock<TripleStore>>,
    clock: Mutex<C>,
    schema: Option<Arc<dyn SchemaProvider>>,
}

impl Db<MemoryClock> {
    /// An in-memory database with a fresh random replica id.
    pub fn ephemeral() -> Self {
        Self::new(MemoryClock::with_random_replica())
    }
}

impl<C: Clock> Db<C> {
    pub fn new(clock: C) -> Self {
        Self {
            store: Arc::new(RwLock::new(TripleStore::new())),
            clock: Mutex::new(clock),
            schema: None,
        }
    }

    /// Attaches an attribute kind schema, builder style.
    pub fn with_schema(mut self, schema: impl SchemaProvider + 'static) -> Self {
        self.schema = Some(Arc::new(schema));
        self
    }

    /// Shared handle to the underlying triple store.
    pub fn store(&self) -> Arc<RwLock<TripleStore>> {
        Arc::clone(&self.store)
    }

    /// The replica id this database writes as.
    pub fn replica_id(&self) -> String {
        self.clock.lock().unwrap().replica_id().to_owned()
    }

    fn tick(&self) -> Result<Timestamp, DbError> {
        Ok(self.clock.lock().unwrap().tick()?)
    }

    fn schema_ref(&self) -> Option<&dyn SchemaProvider> {
        self.schema.as_deref()
    }

    /// Inserts (or updates) a document: every leaf becomes a freshly
    /// timestamped triple. Attributes the schema declares as sets accept
    /// JSON arrays and flatten into per-member registers.
    pub fn insert(&self, collection: &str, id: &str, document: Value) -> Result<(), DbError> {
        if !document.is_object() {
            return Err(DbError::InvalidDocument);
        }
        let entity = EntityKey::new(collection, id);
        let mut leaves = Vec::new();
        flatten_document(
            self.schema_ref(),
            collection,
            &Attribute::new(Vec::new()),
            &document,
            &mut leaves,
        );
        tracing::debug!(entity = %entity, leaves = leaves.len(), "insert");
        let mut store = self.store.write().unwrap();
        for (attribute, value) in leaves {
            let timestamp = self.tick()?;
            store.append(Triple::new(entity.clone(), attribute, value, timestamp));
        }
        Ok(())
    }

    /// Writes a single attribute value.
    pub fn set(&self, collection: &str, id: &str, attribute: &str, value: Value) -> Result<(), DbError> {
        let timestamp = self.tick()?;
        self.store.write().unwrap().append(Triple::new(
            EntityKey::new(collection, id),
            Attribute::parse(attribute),
            value,
            timestamp,
        ));
        Ok(())
    }

    /// Adds a member to a set attribute. The member gets its own register
    /// at the extended path, so concurrent adds of different members never
    /// conflict.
    pub fn set_add(&self, collection: &str, id: &str, attribute: &str, member: &Value) -> Result<(), DbError> {
        self.write_member(collection, id, attribute, member, true)
    }

    /// Removes a member from a set attribute by overwriting its register
    /// with a false flag.
    pub fn set_remove(&self, collection: &str, id: &str, attribute: &str, member: &Value) -> Result<(), DbError> {
        self.write_member(collection, id, attribute, member, false)
    }

    fn write_member(
        &self,
        collection: &str,
        id: &str,
        attribute: &str,
        member: &Value,
        live: bool,
    ) -> Result<(), DbError> {
        let path = Attribute::parse(attribute).child(member_key(member));
        let timestamp = self.tick()?;
        self.store.write().unwrap().append(Triple::new(
            EntityKey::new(collection, id),
            path,
            Value::Bool(live),
            timestamp,
        ));
        Ok(())
    }

    /// Deletes an entity by tombstoning every currently-live attribute
    /// path. Later writes can revive individual paths.
    pub fn delete(&self, collection: &str, id: &str) -> Result<(), DbError> {
        let entity = EntityKey::new(collection, id);
        let live_paths = {
            let store = self.store.read().unwrap();
            live_attribute_paths(&store.scan_entity(&entity))
        };
        tracing::debug!(entity = %entity, paths = live_paths.len(), "delete");
        let mut store = self.store.write().unwrap();
        for attribute in live_paths {
            let timestamp = self.tick()?;
            store.append(Triple::tombstone(entity.clone(), attribute, timestamp));
        }
        Ok(())
    }

    /// Applies a triple stamped elsewhere, as replication delivery does.
    /// Ordering does not matter; materialization merges.
    pub fn apply(&self, triple: Triple) {
        self.store.write().unwrap().append(triple);
    }

    /// Materializes one entity, or `None` if it has no live state.
    pub fn get(&self, collection: &str, id: &str) -> Option<Entity> {
        let triples = self
            .store
            .read()
            .unwrap()
            .scan_entity(&EntityKey::new(collection, id));
        construct_entity(&triples)
    }

    /// Fetches all entities in a collection satisfying a filter, in key
    /// order, using a fresh execution context.
    pub async fn fetch(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Vec<(EntityKey, Entity)>, DbError> {
        let ctx = ExecutionContext::new();
        self.fetch_in(collection, filter, &ctx).await
    }

    /// Fetch variant sharing a caller-provided execution context, so
    /// sub-query deduplication and the fulfillment set span the call.
    pub async fn fetch_in(
        &self,
        collection: &str,
        filter: &Filter,
        ctx: &ExecutionContext,
    ) -> Result<Vec<(EntityKey, Entity)>, DbError> {
        let triples = self.store.read().unwrap().scan_collection(collection);
        let entities = construct_entities(&triples);
        let executor = StoreSubqueryExecutor::new(Arc::clone(&self.store));
        let env = QueryEnv {
            schema: self.schema_ref(),
            subqueries: &executor,
        };
        let mut results = Vec::new();
        for (key, entity) in &entities {
            if satisfies(&env, ctx, (key, entity), filter).await? {
                results.push((key.clone(), entity.clone()));
            }
        }
        tracing::debug!(collection, matched = results.len(), "fetch");
        Ok(results)
    }

    /// Drops triples per the options. A scoped clear removes one
    /// collection; an unscoped clear empties the store.
    pub fn clear(&self, options: ClearOptions) {
        self.store.write().unwrap().clear(options);
    }
}

/// Stable string key for a set member. Strings keep their text; other
/// scalars use their JSON rendering.
fn member_key(member: &Value) -> String {
    match member {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Flattens a document into leaf (attribute, value) pairs. Objects recurse
/// segment by segment; arrays under schema-declared set attributes become
/// per-member live flags; everything else is a scalar leaf.
fn flatten_document(
    schema: Option<&dyn SchemaProvider>,
    collection: &str,
    prefix: &Attribute,
    value: &Value,
    out: &mut Vec<(Attribute, Value)>,
) {
    if !prefix.is_empty() {
        let kind = schema.and_then(|s| s.attribute_kind(collection, prefix));
        if kind == Some(AttributeKind::Set) {
            if let Value::Array(members) = value {
                for member in members {
                    out.push((prefix.child(member_key(member)), Value::Bool(true)));
                }
                return;
            }
        }
    }
    match value {
        Value::Object(map) => {
            for (segment, child) in map {
                flatten_document(schema, collection, &prefix.child(segment), child, out);
            }
        }
        other => out.push((prefix.clone(), other.clone())),
    }
}

/// Attribute paths with a live winner, per last-write-wins selection.
fn live_attribute_paths(triples: &[Triple]) -> Vec<Attribute> {
    let mut winners: HashMap<&Attribute, &Triple> = HashMap::new();
    for triple in triples {
        match winners.get(&triple.attribute) {
            Some(current) if current.timestamp >= triple.timestamp => {}
            _ => {
                winners.insert(&triple.attribute, triple);
            }
        }
    }
    let mut paths: Vec<Attribute> = winners
        .into_values()
        .filter(|t| !t.expired)
        .map(|t| t.attribute.clone())
        .collect();
    paths.sort();
    paths
}
