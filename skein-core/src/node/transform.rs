//! Transform Definitions
//!
//! The declarative side of the collection pipeline. Evaluation lives in
//! [`crate::pipeline`]. Parameters that are themselves nodes (slice bounds,
//! take/skip counts, nth index) are resolved in the scope the transform was
//! defined in, so a pipeline can react to variables.

use super::def::{Def, NodeFn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// One sort criterion. Without a selector the item itself is the key.
#[derive(Debug, Clone)]
pub struct SortKey {
    pub selector: Option<NodeFn>,
    pub direction: Direction,
}

/// The three parameterisations of `slice`.
#[derive(Debug, Clone)]
pub enum SliceBounds {
    /// `offset..offset + length`
    OffsetLength { offset: Def, length: Def },
    /// `from..=to`, end inclusive.
    FromTo { from: Def, to: Def },
    /// `begin..end`, end exclusive.
    BeginEnd { begin: Def, end: Def },
}

#[derive(Debug, Clone)]
pub enum Transform {
    Map(NodeFn),
    Filter(NodeFn),
    Sort(Vec<SortKey>),
    Slice(SliceBounds),
    Take(Def),
    Skip(Def),
    Count,
    FirstItem,
    LastItem,
    NthItem(Def),
}

impl Transform {
    pub fn name(&self) -> &'static str {
        match self {
            Transform::Map(_) => "map",
            Transform::Filter(_) => "filter",
            Transform::Sort(_) => "sort",
            Transform::Slice(_) => "slice",
            Transform::Take(_) => "take",
            Transform::Skip(_) => "skip",
            Transform::Count => "count",
            Transform::FirstItem => "firstItem",
            Transform::LastItem => "lastItem",
            Transform::NthItem(_) => "nthItem",
        }
    }
}
