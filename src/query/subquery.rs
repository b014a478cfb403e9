//! Relational filter execution.
//!
//! A relational filter is satisfied when its sub-query, with `$`-prefixed
//! values bound from the candidate entity, finds at least one entity.
//! Bound sub-queries are fingerprinted and deduplicated through the
//! execution context, so candidates that bind to identical sub-queries
//! share one execution and one outcome.

use std::sync::{Arc, RwLock};

use futures_util::future::BoxFuture;
use serde_json::Value;

use crate::entity::{construct_entities, Entity};
use crate::triple::{EntityKey, TripleScan, TripleStore};

use super::ast::{Filter, SubQuery};
use super::context::ExecutionContext;
use super::errors::{QueryError, QueryResult};
use super::filters::{satisfies, QueryEnv};

/// Executes prepared sub-queries for relational filters.
///
/// Implementations stop at the first matching entity; existence is all a
/// relational filter needs.
pub trait SubqueryExecutor: Send + Sync {
    fn fetch_existing<'a>(
        &'a self,
        subquery: &'a SubQuery,
        env: &'a QueryEnv<'a>,
        ctx: &'a ExecutionContext,
    ) -> BoxFuture<'a, QueryResult<Option<(EntityKey, Entity)>>>;
}

/// Evaluates one relational filter for one candidate entity.
pub(crate) async fn satisfies_relational(
    env: &QueryEnv<'_>,
    ctx: &ExecutionContext,
    candidate: (&EntityKey, &Entity),
    subquery: &SubQuery,
) -> QueryResult<bool> {
    let bound = bind_subquery(subquery, candidate);
    let fingerprint = fingerprint(&bound)?;
    let cell = ctx.subquery_cell(&fingerprint);
    let outcome = cell
        .get_or_try_init(|| async {
            tracing::debug!(collection = %bound.collection, "executing sub-query");
            env.subqueries.fetch_existing(&bound, env, ctx).await
        })
        .await?;
    match outcome {
        Some((key, entity)) => {
            ctx.record_fulfillment(key.clone(), entity.clone());
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Deduplication key for a bound sub-query: the collection plus the full
/// serialized filter, values included. Identical keys imply identical
/// results within one execution.
fn fingerprint(subquery: &SubQuery) -> QueryResult<String> {
    serde_json::to_string(subquery)
        .map_err(|err| QueryError::Execution(format!("unfingerprintable sub-query: {err}")))
}

/// Substitutes `$`-prefixed statement values with data from the candidate
/// entity. `$id` resolves to the entity id; any other variable resolves
/// through the entity's value tree, with missing paths binding to null.
fn bind_subquery(subquery: &SubQuery, candidate: (&EntityKey, &Entity)) -> SubQuery {
    SubQuery {
        collection: subquery.collection.clone(),
        filter: Box::new(bind_filter(&subquery.filter, candidate)),
    }
}

fn bind_filter(filter: &Filter, candidate: (&EntityKey, &Entity)) -> Filter {
    match filter {
        Filter::Statement {
            attribute,
            op,
            value,
        } => Filter::Statement {
            attribute: attribute.clone(),
            op: *op,
            value: bind_value(value, candidate),
        },
        Filter::Group { mode, filters } => Filter::Group {
            mode: *mode,
            filters: filters.iter().map(|f| bind_filter(f, candidate)).collect(),
        },
        // Nested relational filters bind against their own candidate when
        // their own evaluation reaches them.
        other => other.clone(),
    }
}

fn bind_value(value: &Value, candidate: (&EntityKey, &Entity)) -> Value {
    let Value::String(text) = value else {
        return value.clone();
    };
    let Some(variable) = text.strip_prefix('$') else {
        return value.clone();
    };
    match variable {
        "id" => Value::String(candidate.0.id.clone()),
        path => candidate.1.get_path(path).cloned().unwrap_or(Value::Null),
    }
}

/// Sub-query executor over a shared triple store: scans the target
/// collection in key order and materializes until one entity satisfies
/// the bound filter.
pub struct StoreSubqueryExecutor {
    store: Arc<RwLock<TripleStore>>,
}

impl StoreSubqueryExecutor {
    pub fn new(store: Arc<RwLock<TripleStore>>) -> Self {
        Self { store }
    }
}

impl SubqueryExecutor for StoreSubqueryExecutor {
    fn fetch_existing<'a>(
        &'a self,
        subquery: &'a SubQuery,
        env: &'a QueryEnv<'a>,
        ctx: &'a ExecutionContext,
    ) -> BoxFuture<'a, QueryResult<Option<(EntityKey, Entity)>>> {
        Box::pin(async move {
            let triples = self.store.read().unwrap().scan_collection(&subquery.collection);
            let entities = construct_entities(&triples);
            for (key, entity) in &entities {
                if satisfies(env, ctx, (key, entity), &subquery.filter).await? {
                    tracing::debug!(entity = %key, "sub-query satisfied");
                    return Ok(Some((key.clone(), entity.clone())));
                }
            }
            Ok(None)
        })
    }
}
