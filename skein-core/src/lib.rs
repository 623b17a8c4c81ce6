//! Skein Core
//!
//! This crate provides the engine behind Skein, a reactive graph of
//! application state. It implements:
//!
//! - A node model of values, branches, references, computed values,
//!   variables and collections
//! - Lazy resolution of queries against that graph, with lexical scopes
//! - Collection pipelines (map, filter, sort, slice, take, skip, count, ...)
//! - Subscriptions that re-emit only when a write changes their result
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `node`: definitions, instances, references and builders
//! - `scope`: the interned scope stack used for context lookups
//! - `graph`: dependency graph between instances and subscriptions
//! - `resolve`: the evaluator that owns all live state
//! - `pipeline`: collection transform evaluation
//! - `query`: query shapes and result assembly
//! - `subscription`: subscription handles and emission dispatch
//! - `runtime`: the [`Graph`] facade
//!
//! # Example
//!
//! ```rust,ignore
//! use skein_core::prelude::*;
//!
//! let graph = Graph::new(branch([
//!     ("offset", variable(0)),
//!     ("items", collection(path(["all"]), vec![slice(offset_length(path(["offset"]), 10))])),
//! ]));
//!
//! let page = graph.subscribe(Reference::path(["items"]), Query::entries(), |page| {
//!     println!("page: {page:?}");
//! });
//!
//! // Only subscriptions whose result depends on `offset` are recomputed.
//! graph.set(&Reference::path(["offset"]), 10)?;
//! page.unsubscribe();
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod node;
mod pipeline;
pub mod query;
mod resolve;
pub mod runtime;
pub mod scope;
pub mod subscription;

pub use config::GraphConfig;
pub use error::GraphError;
pub use node::{Def, Reference, Value};
pub use query::{key, Field, Query};
pub use resolve::GraphStats;
pub use runtime::{Graph, Transaction};
pub use subscription::{Emission, Subscription, SubscriptionId, SubscriptionState};

/// Everything needed to build a graph and query it.
pub mod prelude {
    pub use crate::node::build::*;
    pub use crate::node::{Def, Direction, Reference, Value};
    pub use crate::query::{key, Query};
    pub use crate::{Graph, GraphConfig, GraphError, Subscription};
}
