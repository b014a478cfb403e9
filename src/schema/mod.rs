//! Attribute kind lookup for triadb
//!
//! The query layer needs exactly one thing from a schema: given a collection
//! and an attribute path, what kind of attribute is it? Set-kind attributes
//! get set filter semantics; everything else (including attributes the
//! schema does not know about, and the no-schema case) defaults to register
//! semantics. Schema authoring, validation interop, and the type-definition
//! language live outside this crate.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::triple::Attribute;

/// Declared kind of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeKind {
    /// Single last-write-wins value (the default).
    Register,
    /// Member-wise merged set; each member is its own register.
    Set,
}

/// Read-only attribute kind lookup consumed by the filter evaluator.
///
/// Must be a pure lookup. `None` means the attribute is undeclared and
/// register semantics apply. Lookups happen inside query futures, hence
/// the thread-safety bounds.
pub trait SchemaProvider: Send + Sync {
    fn attribute_kind(&self, collection: &str, attribute: &Attribute) -> Option<AttributeKind>;
}

/// Map-backed schema: collection plus dotted attribute path to kind.
#[derive(Debug, Clone, Default)]
pub struct CollectionSchema {
    kinds: HashMap<(String, String), AttributeKind>,
}

impl CollectionSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares an attribute kind, builder style.
    pub fn with_attribute(
        mut self,
        collection: impl Into<String>,
        attribute: &str,
        kind: AttributeKind,
    ) -> Self {
        self.kinds
            .insert((collection.into(), attribute.to_owned()), kind);
        self
    }

    /// Shorthand for declaring a set attribute.
    pub fn with_set(self, collection: impl Into<String>, attribute: &str) -> Self {
        self.with_attribute(collection, attribute, AttributeKind::Set)
    }
}

impl SchemaProvider for CollectionSchema {
    fn attribute_kind(&self, collection: &str, attribute: &Attribute) -> Option<AttributeKind> {
        self.kinds
            .get(&(collection.to_owned(), attribute.to_string()))
            .copied()
    }
}
