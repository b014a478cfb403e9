//! Triple records: timestamped facts about entity attributes.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::clock::Timestamp;

/// Identifies one entity within one collection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityKey {
    pub collection: String,
    pub id: String,
}

impl EntityKey {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.collection, self.id)
    }
}

/// An ordered attribute path into an entity's value tree.
///
/// Nested attributes are addressed segment by segment (`address.city` is
/// `["address", "city"]`). Set attributes extend the path with the member
/// value, so each member is its own independently-timestamped register.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Attribute(Vec<String>);

impl Attribute {
    pub fn new(segments: Vec<String>) -> Self {
        Self(segments)
    }

    /// Parses a dotted path like `"address.city"`.
    pub fn parse(dotted: &str) -> Self {
        Self(dotted.split('.').map(str::to_owned).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Returns this path extended by one segment.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

impl From<&str> for Attribute {
    fn from(dotted: &str) -> Self {
        Self::parse(dotted)
    }
}

/// One immutable, timestamped fact about one entity attribute.
///
/// A logical update is a newly appended triple with a greater timestamp for
/// the same (entity, attribute); a logical delete is a triple with the
/// `expired` tombstone flag set. Nothing is ever mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Triple {
    pub entity: EntityKey,
    pub attribute: Attribute,
    pub value: Value,
    pub timestamp: Timestamp,
    pub expired: bool,
}

impl Triple {
    /// A live fact.
    pub fn new(entity: EntityKey, attribute: Attribute, value: Value, timestamp: Timestamp) -> Self {
        Self {
            entity,
            attribute,
            value,
            timestamp,
            expired: false,
        }
    }

    /// A tombstone: the attribute has no live value as of this timestamp.
    pub fn tombstone(entity: EntityKey, attribute: Attribute, timestamp: Timestamp) -> Self {
        Self {
            entity,
            attribute,
            value: Value::Null,
            timestamp,
            expired: true,
        }
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{} {} = {} @ {}{}]",
            self.entity,
            self.attribute,
            self.value,
            self.timestamp,
            if self.expired { " (expired)" } else { "" }
        )
    }
}
