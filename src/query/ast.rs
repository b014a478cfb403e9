//! Filter tree AST.
//!
//! Filters are an explicit sum type with a mandatory discriminant, so
//! evaluation is a pattern match and a malformed filter is unrepresentable.
//! The one deliberate exception is `Filter::Exists`: a relational filter
//! that has not yet been lowered into a bound sub-query. It can be built
//! and carried around by a planner, but reaching the evaluator with one is
//! a contract violation, not a filter outcome.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::triple::Attribute;

/// Filter statement operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Neq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "like")]
    Like,
    #[serde(rename = "nlike")]
    NLike,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "nin")]
    NIn,
    #[serde(rename = "has")]
    Has,
    #[serde(rename = "!has")]
    NotHas,
    #[serde(rename = "isDefined")]
    IsDefined,
}

impl Op {
    pub fn as_str(&self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::Neq => "!=",
            Op::Gt => ">",
            Op::Gte => ">=",
            Op::Lt => "<",
            Op::Lte => "<=",
            Op::Like => "like",
            Op::NLike => "nlike",
            Op::In => "in",
            Op::NIn => "nin",
            Op::Has => "has",
            Op::NotHas => "!has",
            Op::IsDefined => "isDefined",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Boolean combination mode for filter groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupMode {
    And,
    Or,
}

/// A prepared relational sub-query: find one entity in `collection`
/// satisfying `filter`, with `$`-prefixed statement values bound from the
/// candidate entity at evaluation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubQuery {
    pub collection: String,
    pub filter: Box<Filter>,
}

impl SubQuery {
    pub fn new(collection: impl Into<String>, filter: Filter) -> Self {
        Self {
            collection: collection.into(),
            filter: Box::new(filter),
        }
    }
}

/// A node in a filter tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Filter {
    /// A literal outcome.
    Boolean(bool),
    /// attribute-op-value comparison against the candidate entity.
    Statement {
        attribute: Attribute,
        op: Op,
        value: Value,
    },
    /// Nested boolean combination, evaluated in priority order with
    /// short-circuiting.
    Group { mode: GroupMode, filters: Vec<Filter> },
    /// Prepared relational filter: satisfied iff the sub-query yields an
    /// entity.
    Relational { exists: SubQuery },
    /// Unprepared relational filter naming a schema relation. Must be
    /// lowered to `Relational` before evaluation.
    Exists { relation: String },
}

impl Filter {
    /// attribute-op-value statement, parsing a dotted attribute path.
    pub fn statement(attribute: &str, op: Op, value: Value) -> Self {
        Filter::Statement {
            attribute: Attribute::parse(attribute),
            op,
            value,
        }
    }

    /// Prepared relational filter over another collection.
    pub fn relational(collection: impl Into<String>, filter: Filter) -> Self {
        Filter::Relational {
            exists: SubQuery::new(collection, filter),
        }
    }
}

/// All children must hold.
pub fn and(filters: Vec<Filter>) -> Filter {
    Filter::Group {
        mode: GroupMode::And,
        filters,
    }
}

/// At least one child must hold.
pub fn or(filters: Vec<Filter>) -> Filter {
    Filter::Group {
        mode: GroupMode::Or,
        filters,
    }
}

/// Unprepared relational filter referencing a schema relation by name.
pub fn exists(relation: impl Into<String>) -> Filter {
    Filter::Exists {
        relation: relation.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_statement_parses_dotted_attribute() {
        let filter = Filter::statement("address.city", Op::Eq, json!("Oslo"));
        match filter {
            Filter::Statement { attribute, .. } => {
                assert_eq!(attribute.segments(), ["address", "city"]);
            }
            _ => panic!("expected statement"),
        }
    }

    #[test]
    fn test_builders_nest() {
        let filter = and(vec![
            Filter::Boolean(true),
            or(vec![
                Filter::statement("age", Op::Gt, json!(10)),
                Filter::relational("friends", Filter::statement("user_id", Op::Eq, json!("$id"))),
            ]),
        ]);
        match filter {
            Filter::Group { mode, filters } => {
                assert_eq!(mode, GroupMode::And);
                assert_eq!(filters.len(), 2);
            }
            _ => panic!("expected group"),
        }
    }

    #[test]
    fn test_filter_serialization_is_stable() {
        let filter = Filter::statement("age", Op::Gte, json!(18));
        let a = serde_json::to_string(&filter).unwrap();
        let b = serde_json::to_string(&filter).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_op_round_trips_through_serde() {
        for op in [Op::Eq, Op::NotHas, Op::IsDefined, Op::Lte] {
            let text = serde_json::to_string(&op).unwrap();
            let back: Op = serde_json::from_str(&text).unwrap();
            assert_eq!(op, back);
        }
    }
}
