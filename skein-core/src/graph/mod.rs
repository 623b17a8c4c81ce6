//! Dependency Graph
//!
//! This module tracks which node instances and subscriptions read which
//! other instances, so that a write can be mapped to the exact set of
//! results it affects.
//!
//! # Overview
//!
//! - Nodes are variable instances (sources), cached instances such as
//!   computed values and collection pipelines (derived), and subscriptions
//!   (subscribers).
//! - Edges represent reads: if A read B during its last evaluation, there is
//!   an edge from B to A.
//!
//! When a variable is written we traverse its dependents, mark them dirty,
//! and collect the subscriptions reached. Dirty derived instances recompute
//! lazily when one of those subscriptions re-reads them.
//!
//! # Design Decisions
//!
//! 1. The graph is centralized and keyed by instance identity, never by
//!    pointer, so cyclic instance graphs need no ownership cycles.
//!
//! 2. Both forward (dependencies) and reverse (dependents) edges are kept:
//!    reverse edges drive invalidation, forward edges drive reachability for
//!    garbage collection.

mod node;
mod scheduler;

pub use node::{DepKey, DepKind, DepNode, DirtyState};
pub use scheduler::UpdateScheduler;
