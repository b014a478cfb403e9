//! Async filter evaluation.
//!
//! `satisfies` answers one question: does this materialized entity pass
//! this filter tree? Groups evaluate their children sequentially in
//! priority order and short-circuit; relational filters delegate to the
//! sub-query collaborator through the execution context's single-flight
//! cache. Statement semantics split on the schema-declared attribute kind:
//! register comparisons for single values, membership semantics for sets.

use std::cmp::Ordering;
use std::mem::discriminant;

use futures_util::future::BoxFuture;
use regex::{Regex, RegexBuilder};
use serde_json::Value;

use crate::entity::Entity;
use crate::schema::{AttributeKind, SchemaProvider};
use crate::triple::{Attribute, EntityKey};

use super::ast::{Filter, GroupMode, Op};
use super::context::ExecutionContext;
use super::errors::{QueryError, QueryResult};
use super::priority::priority_order;
use super::subquery::{satisfies_relational, SubqueryExecutor};

/// Collaborators one query execution evaluates against.
pub struct QueryEnv<'a> {
    /// Attribute kind lookup. `None` means schemaless: every attribute
    /// gets register semantics.
    pub schema: Option<&'a dyn SchemaProvider>,
    /// Executes prepared sub-queries for relational filters.
    pub subqueries: &'a dyn SubqueryExecutor,
}

/// Evaluates a filter tree against one candidate entity.
///
/// Boxed because relational filters recurse through the sub-query
/// executor back into `satisfies`.
pub fn satisfies<'a>(
    env: &'a QueryEnv<'a>,
    ctx: &'a ExecutionContext,
    candidate: (&'a EntityKey, &'a Entity),
    filter: &'a Filter,
) -> BoxFuture<'a, QueryResult<bool>> {
    Box::pin(async move {
        match filter {
            Filter::Boolean(outcome) => Ok(*outcome),
            Filter::Group { mode, filters } => {
                // Sequential on purpose: short-circuiting in priority
                // order skips relational work a cheaper sibling already
                // decided.
                let order = priority_order(filters);
                match mode {
                    GroupMode::And => {
                        for index in order {
                            if !satisfies(env, ctx, candidate, &filters[index]).await? {
                                return Ok(false);
                            }
                        }
                        Ok(true)
                    }
                    GroupMode::Or => {
                        for index in order {
                            if satisfies(env, ctx, candidate, &filters[index]).await? {
                                return Ok(true);
                            }
                        }
                        Ok(false)
                    }
                }
            }
            Filter::Relational { exists } => satisfies_relational(env, ctx, candidate, exists).await,
            Filter::Exists { relation } => Err(QueryError::NotPrepared {
                relation: relation.clone(),
            }),
            Filter::Statement {
                attribute,
                op,
                value,
            } => {
                let kind = env
                    .schema
                    .and_then(|schema| schema.attribute_kind(&candidate.0.collection, attribute))
                    .unwrap_or(AttributeKind::Register);
                match kind {
                    AttributeKind::Set => {
                        satisfies_set_filter(ctx, candidate.1, attribute, *op, value)
                    }
                    AttributeKind::Register => {
                        satisfies_register_filter(ctx, candidate.1, attribute, *op, value)
                    }
                }
            }
        }
    })
}

/// Register statement: compare the resolved attribute value (which may be
/// undefined) against the filter value.
pub fn satisfies_register_filter(
    ctx: &ExecutionContext,
    entity: &Entity,
    attribute: &Attribute,
    op: Op,
    filter_value: &Value,
) -> QueryResult<bool> {
    operator_satisfied(ctx, op, entity.get(attribute), filter_value)
}

/// Set statement: membership operators inspect the member map directly;
/// any other operator holds existentially over the live members.
///
/// An absent set fails `has` and every existential comparison, and passes
/// `!has` for any member.
pub fn satisfies_set_filter(
    ctx: &ExecutionContext,
    entity: &Entity,
    attribute: &Attribute,
    op: Op,
    filter_value: &Value,
) -> QueryResult<bool> {
    let members = entity.get(attribute).and_then(Value::as_object);
    match op {
        Op::Has => Ok(members.map_or(false, |map| {
            map.iter()
                .any(|(member, live)| truthy(live) && filter_value.as_str() == Some(member))
        })),
        Op::NotHas => Ok(members.map_or(true, |map| {
            !map.iter()
                .any(|(member, live)| truthy(live) && filter_value.as_str() == Some(member))
        })),
        Op::IsDefined => Ok(members.is_some() == truthy(filter_value)),
        _ => {
            let Some(map) = members else {
                return Ok(false);
            };
            for (member, live) in map {
                if !truthy(live) {
                    continue;
                }
                let member = Value::String(member.clone());
                if operator_satisfied(ctx, op, Some(&member), filter_value)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
    }
}

/// Register operator dispatch.
///
/// `value` is `None` when the attribute is undefined for the entity. Null
/// handling differs per operator and per side: a null attribute value is
/// below every concrete value, a null filter value is below everything
/// that exists, and an undefined attribute fails ordinary comparisons
/// outright.
fn operator_satisfied(
    ctx: &ExecutionContext,
    op: Op,
    value: Option<&Value>,
    filter_value: &Value,
) -> QueryResult<bool> {
    match op {
        // Loose equality: null and undefined are interchangeable, and
        // numbers compare across representation.
        Op::Eq => Ok(loose_eq(value, filter_value)),
        // Inequality is strict. An undefined attribute is "not equal" to
        // everything, including null.
        Op::Neq => Ok(!strict_eq(value, filter_value)),
        Op::Gt => Ok(if is_null(value) {
            false
        } else if filter_value.is_null() {
            true
        } else {
            compare(value, filter_value) == Some(Ordering::Greater)
        }),
        Op::Gte => Ok(if is_null(value) {
            filter_value.is_null()
        } else if filter_value.is_null() {
            true
        } else {
            matches!(
                compare(value, filter_value),
                Some(Ordering::Greater | Ordering::Equal)
            )
        }),
        Op::Lt => Ok(if filter_value.is_null() {
            false
        } else if is_null(value) {
            true
        } else {
            compare(value, filter_value) == Some(Ordering::Less)
        }),
        Op::Lte => Ok(if filter_value.is_null() {
            is_null(value)
        } else if is_null(value) {
            true
        } else {
            matches!(
                compare(value, filter_value),
                Some(Ordering::Less | Ordering::Equal)
            )
        }),
        Op::Like => like_match(ctx, value, filter_value),
        Op::NLike => like_match(ctx, value, filter_value).map(|matched| !matched),
        Op::In => in_collection(value, filter_value),
        Op::NIn => in_collection(value, filter_value).map(|found| !found),
        Op::IsDefined => Ok(value.is_some() == truthy(filter_value)),
        Op::Has | Op::NotHas => Err(QueryError::invalid_filter(
            format!("the operator {op} is not valid for register values"),
            filter_value,
        )),
    }
}

fn is_null(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::Null))
}

/// JavaScript-style truthiness, used for `isDefined` arguments and set
/// member liveness flags.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Loose equality: undefined and null are equal to null; same-type values
/// compare structurally; numeric values compare across representation.
fn loose_eq(value: Option<&Value>, filter_value: &Value) -> bool {
    let Some(value) = value else {
        return filter_value.is_null();
    };
    if value.is_null() {
        return filter_value.is_null();
    }
    if discriminant(value) == discriminant(filter_value) {
        return value == filter_value;
    }
    match (to_number(value), to_number(filter_value)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Strict equality: an undefined attribute equals nothing.
fn strict_eq(value: Option<&Value>, filter_value: &Value) -> bool {
    value.map_or(false, |value| value == filter_value)
}

/// Orders a value against a filter value: strings lexically, everything
/// else through numeric coercion. `None` means incomparable.
fn compare(value: Option<&Value>, filter_value: &Value) -> Option<Ordering> {
    let value = value?;
    if let (Value::String(a), Value::String(b)) = (value, filter_value) {
        return Some(a.cmp(b));
    }
    let a = to_number(value)?;
    let b = to_number(filter_value)?;
    a.partial_cmp(&b)
}

/// Numeric coercion for comparisons: numbers as themselves, booleans as
/// 1/0, strings that parse as numbers. Everything else is non-numeric.
fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// `like` pattern matching. Non-string attribute values never match; a
/// non-string pattern is an invalid filter.
fn like_match(
    ctx: &ExecutionContext,
    value: Option<&Value>,
    pattern: &Value,
) -> QueryResult<bool> {
    let Value::String(pattern) = pattern else {
        return Err(QueryError::invalid_filter(
            "like patterns must be strings",
            pattern,
        ));
    };
    let Some(Value::String(text)) = value else {
        return Ok(false);
    };
    let regex = ctx.cached_like(pattern, || compile_like(pattern))?;
    Ok(regex.is_match(text))
}

/// Translates a `like` pattern to an anchored, case-insensitive regex:
/// `%` matches any run, `_` any single character, everything else
/// literally.
fn compile_like(pattern: &str) -> QueryResult<Regex> {
    let translated = regex::escape(pattern).replace('%', ".*").replace('_', ".");
    RegexBuilder::new(&format!("^{translated}$"))
        .case_insensitive(true)
        .build()
        .map_err(|err| QueryError::invalid_filter(format!("bad like pattern: {err}"), &pattern))
}

/// Strict membership for `in`/`nin`. The filter value must be an array.
fn in_collection(value: Option<&Value>, filter_value: &Value) -> QueryResult<bool> {
    let Value::Array(items) = filter_value else {
        return Err(QueryError::invalid_filter(
            "in and nin require an array of candidates",
            filter_value,
        ));
    };
    Ok(value.map_or(false, |value| items.iter().any(|item| item == value)))
}
