//! Sub-query Resolution and Execution Cache Tests
//!
//! Relational filters must execute their underlying sub-fetch at most once
//! per distinct bound fingerprint within one execution context, bind
//! `$`-prefixed values per candidate, record fulfillments, and never leak
//! cached outcomes into a later execution.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use futures_util::future::BoxFuture;
use serde_json::json;
use triadb::clock::Timestamp;
use triadb::entity::{construct_entity, Entity};
use triadb::query::{
    satisfies, ExecutionContext, Filter, Op, QueryEnv, QueryResult, StoreSubqueryExecutor,
    SubQuery, SubqueryExecutor,
};
use triadb::triple::{Attribute, EntityKey, Triple, TripleStore};

// =============================================================================
// Helper Functions
// =============================================================================

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn candidate(id: &str, parts: &[(&str, serde_json::Value)]) -> (EntityKey, Entity) {
    let key = EntityKey::new("users", id);
    let triples: Vec<Triple> = parts
        .iter()
        .enumerate()
        .map(|(i, (attr, value))| {
            Triple::new(
                key.clone(),
                Attribute::parse(attr),
                value.clone(),
                Timestamp::new(i as u64 + 1, "r1"),
            )
        })
        .collect();
    (key, construct_entity(&triples).unwrap())
}

/// Store seeded with posts authored by u1.
fn seeded_store() -> Arc<RwLock<TripleStore>> {
    let mut store = TripleStore::new();
    for (i, (id, author)) in [("p1", "u1"), ("p2", "u1"), ("p3", "u9")].iter().enumerate() {
        store.append(Triple::new(
            EntityKey::new("posts", *id),
            Attribute::parse("author_id"),
            json!(author),
            Timestamp::new(i as u64 + 1, "r1"),
        ));
    }
    Arc::new(RwLock::new(store))
}

/// Delegating executor that counts how many sub-fetches actually run.
struct CountingExecutor {
    inner: StoreSubqueryExecutor,
    executions: Arc<AtomicUsize>,
}

impl CountingExecutor {
    fn new(store: Arc<RwLock<TripleStore>>) -> (Self, Arc<AtomicUsize>) {
        let executions = Arc::new(AtomicUsize::new(0));
        (
            Self {
                inner: StoreSubqueryExecutor::new(store),
                executions: Arc::clone(&executions),
            },
            executions,
        )
    }
}

impl SubqueryExecutor for CountingExecutor {
    fn fetch_existing<'a>(
        &'a self,
        subquery: &'a SubQuery,
        env: &'a QueryEnv<'a>,
        ctx: &'a ExecutionContext,
    ) -> BoxFuture<'a, QueryResult<Option<(EntityKey, Entity)>>> {
        Box::pin(async move {
            self.executions.fetch_add(1, Ordering::SeqCst);
            self.inner.fetch_existing(subquery, env, ctx).await
        })
    }
}

fn authored_a_post() -> Filter {
    Filter::relational("posts", Filter::statement("author_id", Op::Eq, json!("$id")))
}

// =============================================================================
// Fingerprint Deduplication
// =============================================================================

/// The same relational filter over the same candidate binds to one
/// fingerprint; repeated evaluation runs one sub-fetch.
#[tokio::test]
async fn test_repeated_evaluation_executes_once() {
    init_tracing();
    let (executor, executions) = CountingExecutor::new(seeded_store());
    let env = QueryEnv {
        schema: None,
        subqueries: &executor,
    };
    let ctx = ExecutionContext::new();
    let (key, entity) = candidate("u1", &[("name", json!("Alice"))]);
    let filter = authored_a_post();

    for _ in 0..5 {
        assert!(satisfies(&env, &ctx, (&key, &entity), &filter).await.unwrap());
    }
    assert_eq!(executions.load(Ordering::SeqCst), 1);
}

/// Two candidates whose bindings produce an identical fingerprint share a
/// single sub-fetch.
#[tokio::test]
async fn test_identical_bindings_across_candidates_share_execution() {
    let (executor, executions) = CountingExecutor::new(seeded_store());
    let env = QueryEnv {
        schema: None,
        subqueries: &executor,
    };
    let ctx = ExecutionContext::new();
    // Both candidates carry the same team, so "$team" binds identically.
    let (key_a, entity_a) = candidate("u1", &[("team", json!("core"))]);
    let (key_b, entity_b) = candidate("u2", &[("team", json!("core"))]);
    let filter = Filter::relational(
        "posts",
        Filter::statement("author_id", Op::Eq, json!("$team")),
    );

    satisfies(&env, &ctx, (&key_a, &entity_a), &filter).await.unwrap();
    satisfies(&env, &ctx, (&key_b, &entity_b), &filter).await.unwrap();
    assert_eq!(executions.load(Ordering::SeqCst), 1);
}

/// Different bindings fingerprint differently and execute separately.
#[tokio::test]
async fn test_distinct_bindings_execute_separately() {
    let (executor, executions) = CountingExecutor::new(seeded_store());
    let env = QueryEnv {
        schema: None,
        subqueries: &executor,
    };
    let ctx = ExecutionContext::new();
    let (key_a, entity_a) = candidate("u1", &[("name", json!("Alice"))]);
    let (key_b, entity_b) = candidate("u9", &[("name", json!("Ida"))]);
    let filter = authored_a_post();

    assert!(satisfies(&env, &ctx, (&key_a, &entity_a), &filter).await.unwrap());
    assert!(satisfies(&env, &ctx, (&key_b, &entity_b), &filter).await.unwrap());
    assert_eq!(executions.load(Ordering::SeqCst), 2);
}

/// A fresh execution context re-executes; outcomes never leak across
/// top-level queries.
#[tokio::test]
async fn test_cache_is_scoped_to_one_context() {
    let store = seeded_store();
    let (executor, executions) = CountingExecutor::new(Arc::clone(&store));
    let env = QueryEnv {
        schema: None,
        subqueries: &executor,
    };
    let (key, entity) = candidate("u1", &[("name", json!("Alice"))]);
    let filter = authored_a_post();

    let first = ExecutionContext::new();
    assert!(satisfies(&env, &first, (&key, &entity), &filter).await.unwrap());

    // Data changes between executions; the next context must observe it.
    store.write().unwrap().append(Triple::tombstone(
        EntityKey::new("posts", "p1"),
        Attribute::parse("author_id"),
        Timestamp::new(10, "r1"),
    ));
    store.write().unwrap().append(Triple::tombstone(
        EntityKey::new("posts", "p2"),
        Attribute::parse("author_id"),
        Timestamp::new(11, "r1"),
    ));

    let second = ExecutionContext::new();
    assert!(!satisfies(&env, &second, (&key, &entity), &filter).await.unwrap());
    assert_eq!(executions.load(Ordering::SeqCst), 2);
}

// =============================================================================
// Concurrency: At Most One In-flight Resolution
// =============================================================================

/// Concurrent evaluation of many candidates sharing one fingerprint still
/// runs a single sub-fetch.
#[tokio::test]
async fn test_concurrent_candidates_coalesce() {
    init_tracing();
    let (executor, executions) = CountingExecutor::new(seeded_store());
    let env = QueryEnv {
        schema: None,
        subqueries: &executor,
    };
    let ctx = ExecutionContext::new();
    let candidates: Vec<_> = (0..8)
        .map(|_| candidate("u1", &[("name", json!("Alice"))]))
        .collect();
    let filter = authored_a_post();

    let evaluations = candidates
        .iter()
        .map(|(key, entity)| satisfies(&env, &ctx, (key, entity), &filter));
    let outcomes = futures_util::future::try_join_all(evaluations).await.unwrap();
    assert!(outcomes.into_iter().all(|satisfied| satisfied));
    assert_eq!(executions.load(Ordering::SeqCst), 1);
}

// =============================================================================
// Fulfillment Set
// =============================================================================

/// Matching related entities are recorded for reuse by the caller.
#[tokio::test]
async fn test_fulfillment_set_collects_matches() {
    let (executor, _) = CountingExecutor::new(seeded_store());
    let env = QueryEnv {
        schema: None,
        subqueries: &executor,
    };
    let ctx = ExecutionContext::new();
    let (key, entity) = candidate("u1", &[("name", json!("Alice"))]);

    assert!(satisfies(&env, &ctx, (&key, &entity), &authored_a_post()).await.unwrap());
    let fulfilled = ctx.fulfilled();
    assert_eq!(fulfilled.len(), 1);
    assert_eq!(fulfilled[0].0.collection, "posts");
    assert_eq!(fulfilled[0].1.get_path("author_id"), Some(&json!("u1")));
}

/// An unsatisfied relational filter records nothing.
#[tokio::test]
async fn test_no_fulfillment_without_match() {
    let (executor, _) = CountingExecutor::new(seeded_store());
    let env = QueryEnv {
        schema: None,
        subqueries: &executor,
    };
    let ctx = ExecutionContext::new();
    let (key, entity) = candidate("nobody", &[("name", json!("Nadia"))]);

    assert!(!satisfies(&env, &ctx, (&key, &entity), &authored_a_post()).await.unwrap());
    assert!(ctx.fulfilled().is_empty());
}

// =============================================================================
// Sub-queries Through the Store Executor
// =============================================================================

/// The store-backed executor stops at the first matching entity.
#[tokio::test]
async fn test_store_executor_is_existence_bounded() {
    let executor = StoreSubqueryExecutor::new(seeded_store());
    let env = QueryEnv {
        schema: None,
        subqueries: &executor,
    };
    let ctx = ExecutionContext::new();
    let subquery = SubQuery::new("posts", Filter::statement("author_id", Op::Eq, json!("u1")));

    let outcome = executor
        .fetch_existing(&subquery, &env, &ctx)
        .await
        .unwrap()
        .unwrap();
    // Key order makes the first match deterministic.
    assert_eq!(outcome.0, EntityKey::new("posts", "p1"));
}
