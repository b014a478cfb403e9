//! Filter evaluation ordering.
//!
//! Within a group, cheap synchronous checks run before anything that may
//! touch storage, so short-circuiting skips sub-query work whenever a
//! boolean or statement already decides the group.

use super::ast::Filter;

/// Cost bucket of a filter node, cheapest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FilterKind {
    Boolean,
    Statement,
    Group,
    Relational,
}

impl Filter {
    /// Cost bucket this node falls into. Unprepared `Exists` filters sit
    /// in the relational bucket; the error they carry surfaces at
    /// evaluation, not during ordering.
    pub fn kind(&self) -> FilterKind {
        match self {
            Filter::Boolean(_) => FilterKind::Boolean,
            Filter::Statement { .. } => FilterKind::Statement,
            Filter::Group { .. } => FilterKind::Group,
            Filter::Relational { .. } | Filter::Exists { .. } => FilterKind::Relational,
        }
    }
}

/// Indexes of `filters` in evaluation order: booleans, then statements,
/// then groups, then relational filters. The partition is stable, so
/// filters in the same bucket keep their written order.
pub fn priority_order(filters: &[Filter]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..filters.len()).collect();
    order.sort_by_key(|&i| filters[i].kind());
    order
}
