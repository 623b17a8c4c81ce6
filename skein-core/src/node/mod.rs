//! Node Model
//!
//! This module defines what a graph is made of.
//!
//! # Definitions and Instances
//!
//! A graph is built from immutable [`NodeDef`] recipes shared through
//! [`Def`]. Definitions form an acyclic structure; they never hold live
//! state. Live state belongs to *instances*: a definition evaluated under a
//! particular scope chain, addressed by [`InstanceKey`]. Because instances
//! refer to each other by key rather than by pointer, the instance graph may
//! contain cycles (a collection whose transform re-enters an ancestor)
//! without ownership cycles.
//!
//! # Node Kinds
//!
//! [`NodeKind`] is a closed enum: values, branches, arrays, references,
//! computed (sync and async), variables, collections, transforms, scope
//! wrappers, context lookups, query nodes and bound items.

mod def;
mod instance;
mod reference;
mod transform;
mod value;

pub mod build;

pub use def::{
    AsyncComputed, AsyncFn, Branch, Collection, ComputeFn, Computed, Def, DefId, DynamicKey,
    NodeDef, NodeFn, NodeKind, QueryNode, ScopeNode,
};
pub use instance::{Handle, InstanceKey};
pub use reference::{PathSegment, RefRoot, Reference};
pub use transform::{Direction, SliceBounds, SortKey, Transform};
pub use value::Value;
pub(crate) use value::Category;
