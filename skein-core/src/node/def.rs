//! Node Definitions
//!
//! A [`NodeDef`] is an immutable recipe. Definitions are created once while
//! the graph is built, shared structurally through [`Def`] (an `Arc`), and
//! never mutated. Evaluating a definition under a scope chain produces an
//! *instance*; see [`Handle`](super::Handle).
//!
//! The set of node kinds is closed: [`NodeKind`] is matched exhaustively by
//! the resolver and the pipeline.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use indexmap::IndexMap;

use super::instance::Handle;
use super::reference::Reference;
use super::transform::Transform;
use super::value::Value;
use crate::query::Query;

/// Shared pointer to an immutable node definition.
pub type Def = Arc<NodeDef>;

/// Unique identity of a node definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DefId(u64);

impl DefId {
    /// Generate a new unique definition ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for DefId {
    fn default() -> Self {
        Self::new()
    }
}

/// An immutable node definition.
#[derive(Debug)]
pub struct NodeDef {
    id: DefId,
    kind: NodeKind,
}

impl NodeDef {
    /// Wrap a node kind into a fresh, uniquely identified definition.
    pub fn new(kind: NodeKind) -> Def {
        Arc::new(Self {
            id: DefId::new(),
            kind,
        })
    }

    pub fn id(&self) -> DefId {
        self.id
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }
}

/// The closed set of node variants.
#[derive(Debug)]
pub enum NodeKind {
    /// A literal value.
    Value(Value),

    /// Keyed children, optionally with a catch-all child bound to a
    /// parameter.
    Branch(Branch),

    /// An ordered sequence of item nodes.
    Array(Vec<Def>),

    /// A path through the graph.
    Ref(Reference),

    /// A pure function of its resolved inputs.
    Computed(Computed),

    /// A function of its resolved inputs that completes asynchronously.
    Async(AsyncComputed),

    /// A mutable cell, initially holding the given node.
    Variable(Def),

    /// An item source with a transform chain attached.
    Collection(Collection),

    /// A single collection transform.
    Transform(Transform),

    /// Named bindings made visible to a subgraph.
    Scope(ScopeNode),

    /// Lookup of a scope binding by name.
    Context(String),

    /// A query whose assembled result is this node's value.
    Query(QueryNode),

    /// An instance captured together with its own scope. Transform
    /// functions receive items wrapped this way so the item keeps resolving
    /// in the scope it came from.
    Bound(Handle),
}

impl NodeKind {
    /// Short name of the variant, used in error messages and logs.
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Value(_) => "value",
            NodeKind::Branch(_) => "branch",
            NodeKind::Array(_) => "array",
            NodeKind::Ref(_) => "reference",
            NodeKind::Computed(_) => "computed",
            NodeKind::Async(_) => "async computed",
            NodeKind::Variable(_) => "variable",
            NodeKind::Collection(_) => "collection",
            NodeKind::Transform(_) => "transform",
            NodeKind::Scope(_) => "scope",
            NodeKind::Context(_) => "context",
            NodeKind::Query(_) => "query",
            NodeKind::Bound(_) => "bound",
        }
    }
}

/// Children of a branch node.
#[derive(Debug, Default)]
pub struct Branch {
    pub fields: IndexMap<String, Def>,
    pub dynamic: Option<DynamicKey>,
}

/// Catch-all child of a branch: any undeclared key resolves to `child`
/// with the key bound to `param` in a new scope frame.
#[derive(Debug)]
pub struct DynamicKey {
    pub param: String,
    pub child: Def,
}

#[derive(Debug)]
pub struct Computed {
    pub inputs: Vec<Def>,
    pub func: ComputeFn,
}

#[derive(Debug)]
pub struct AsyncComputed {
    pub inputs: Vec<Def>,
    pub func: AsyncFn,
}

#[derive(Debug)]
pub struct Collection {
    pub source: Def,
    pub transforms: Vec<Def>,
}

#[derive(Debug)]
pub struct ScopeNode {
    pub bindings: IndexMap<String, Def>,
    pub body: Def,
}

#[derive(Debug)]
pub struct QueryNode {
    pub target: Reference,
    pub query: Query,
}

/// Function from item node to a new node definition, used by `map`,
/// `filter` and sort key selectors.
#[derive(Clone)]
pub struct NodeFn(Arc<dyn Fn(Def) -> Def + Send + Sync>);

impl NodeFn {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Def) -> Def + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, item: Def) -> Def {
        (self.0)(item)
    }
}

impl fmt::Debug for NodeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NodeFn")
    }
}

/// Synchronous computed function. An `Err` becomes an evaluation failure
/// attached to the computed node.
#[derive(Clone)]
pub struct ComputeFn(Arc<dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync>);

impl ComputeFn {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, inputs: &[Value]) -> Result<Value, String> {
        (self.0)(inputs)
    }
}

impl fmt::Debug for ComputeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ComputeFn")
    }
}

/// Asynchronous computed function.
#[derive(Clone)]
pub struct AsyncFn(
    Arc<dyn Fn(Vec<Value>) -> BoxFuture<'static, Result<Value, String>> + Send + Sync>,
);

impl AsyncFn {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Vec<Value>) -> BoxFuture<'static, Result<Value, String>> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, inputs: Vec<Value>) -> BoxFuture<'static, Result<Value, String>> {
        (self.0)(inputs)
    }
}

impl fmt::Debug for AsyncFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AsyncFn")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn def_ids_are_unique() {
        let a = NodeDef::new(NodeKind::Value(Value::Int(1)));
        let b = NodeDef::new(NodeKind::Value(Value::Int(1)));
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn structurally_shared_defs_keep_identity() {
        let leaf = NodeDef::new(NodeKind::Value(Value::from("foo")));
        let shared = leaf.clone();
        assert_eq!(leaf.id(), shared.id());
        assert_eq!(shared.kind().name(), "value");
    }
}
