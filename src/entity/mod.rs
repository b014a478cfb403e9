//! Entity materialization for triadb
//!
//! Entities are derived, never stored: the materializer projects the triple
//! set for one entity into its current value tree by taking, per attribute
//! path, the live fact with the greatest timestamp. This is a pure function
//! of the triple set, which is what makes convergence testable: any two
//! application orders of the same triples materialize identically.

use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value};

use crate::triple::{Attribute, EntityKey, Triple};

/// The materialized, point-in-time value tree for one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    data: Value,
}

impl Entity {
    /// The full value tree (always a JSON object).
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Resolves an attribute path into the tree. `None` means the
    /// attribute is undefined for this entity.
    pub fn get(&self, attribute: &Attribute) -> Option<&Value> {
        let mut current = &self.data;
        for segment in attribute.segments() {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Convenience lookup by dotted path.
    pub fn get_path(&self, dotted: &str) -> Option<&Value> {
        self.get(&Attribute::parse(dotted))
    }
}

/// Materializes the triple set for one entity.
///
/// Returns `None` when no live (non-tombstoned) fact remains: such an
/// entity does not exist. Winners are selected per attribute path by
/// greatest timestamp; tombstoned winners make the path absent. Paths are
/// applied in sorted order so nesting conflicts (a scalar at `a` versus a
/// deeper write at `a.b`) resolve identically regardless of input order.
pub fn construct_entity(triples: &[Triple]) -> Option<Entity> {
    let mut winners: HashMap<&Attribute, &Triple> = HashMap::new();
    for triple in triples {
        match winners.get(&triple.attribute) {
            Some(current) if current.timestamp >= triple.timestamp => {}
            _ => {
                winners.insert(&triple.attribute, triple);
            }
        }
    }

    let mut live: Vec<&Triple> = winners.into_values().filter(|t| !t.expired).collect();
    if live.is_empty() {
        return None;
    }
    live.sort_by(|a, b| a.attribute.cmp(&b.attribute));

    let mut root = Map::new();
    for triple in live {
        insert_path(&mut root, triple.attribute.segments(), triple.value.clone());
    }
    Some(Entity {
        data: Value::Object(root),
    })
}

/// Materializes a collection scan into an id-ordered entity map.
pub fn construct_entities(triples: &[Triple]) -> BTreeMap<EntityKey, Entity> {
    let mut grouped: BTreeMap<&EntityKey, Vec<Triple>> = BTreeMap::new();
    for triple in triples {
        grouped.entry(&triple.entity).or_default().push(triple.clone());
    }
    grouped
        .into_iter()
        .filter_map(|(key, group)| construct_entity(&group).map(|e| (key.clone(), e)))
        .collect()
}

/// Inserts a value at a nested path, creating objects for intermediate
/// segments. A deeper path wins over a scalar previously placed at an
/// intermediate segment; with sorted application this is deterministic.
fn insert_path(map: &mut Map<String, Value>, segments: &[String], value: Value) {
    match segments {
        [] => {}
        [leaf] => {
            map.insert(leaf.clone(), value);
        }
        [head, rest @ ..] => {
            let slot = map
                .entry(head.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            if let Value::Object(inner) = slot {
                insert_path(inner, rest, value);
            }
        }
    }
}
