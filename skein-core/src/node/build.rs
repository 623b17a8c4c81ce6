//! Definition Builders
//!
//! Thin constructors over [`NodeKind`] used to assemble literal graphs,
//! transforms and references. They add no semantics of their own.

use futures_util::future::BoxFuture;
use indexmap::IndexMap;

use super::def::{
    AsyncComputed, AsyncFn, Branch, Collection, ComputeFn, Computed, Def, DynamicKey, NodeDef,
    NodeFn, NodeKind, QueryNode, ScopeNode,
};
use super::reference::Reference;
use super::transform::{Direction, SliceBounds, SortKey, Transform};
use super::value::Value;
use crate::query::Query;

/// Conversion of literals and definitions into a [`Def`].
pub trait ToNode {
    fn to_node(self) -> Def;
}

impl ToNode for Def {
    fn to_node(self) -> Def {
        self
    }
}

impl ToNode for &Def {
    fn to_node(self) -> Def {
        self.clone()
    }
}

impl ToNode for Value {
    fn to_node(self) -> Def {
        NodeDef::new(NodeKind::Value(self))
    }
}

impl ToNode for serde_json::Value {
    fn to_node(self) -> Def {
        from_json(self)
    }
}

macro_rules! scalar_to_node {
    ($($ty:ty),*) => {
        $(impl ToNode for $ty {
            fn to_node(self) -> Def {
                value(self)
            }
        })*
    };
}

scalar_to_node!(&str, String, bool, i32, i64, usize, f64);

pub fn value(v: impl Into<Value>) -> Def {
    NodeDef::new(NodeKind::Value(v.into()))
}

/// The absent value as a node.
pub fn nil() -> Def {
    value(Value::Absent)
}

/// A branch with statically declared children.
pub fn branch<I, K, N>(fields: I) -> Def
where
    I: IntoIterator<Item = (K, N)>,
    K: Into<String>,
    N: ToNode,
{
    NodeDef::new(NodeKind::Branch(Branch {
        fields: collect_fields(fields),
        dynamic: None,
    }))
}

/// A branch whose every undeclared key resolves to `child`, with the key
/// bound to `param` for [`context`] lookups below it.
pub fn matching<I, K, N>(fields: I, param: impl Into<String>, child: impl ToNode) -> Def
where
    I: IntoIterator<Item = (K, N)>,
    K: Into<String>,
    N: ToNode,
{
    NodeDef::new(NodeKind::Branch(Branch {
        fields: collect_fields(fields),
        dynamic: Some(DynamicKey {
            param: param.into(),
            child: child.to_node(),
        }),
    }))
}

pub fn array<I, N>(items: I) -> Def
where
    I: IntoIterator<Item = N>,
    N: ToNode,
{
    NodeDef::new(NodeKind::Array(
        items.into_iter().map(ToNode::to_node).collect(),
    ))
}

pub fn reference(target: Reference) -> Def {
    NodeDef::new(NodeKind::Ref(target))
}

/// Reference to the graph root followed by branch keys.
pub fn path<I, S>(keys: I) -> Def
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    reference(Reference::path(keys))
}

/// The child `key` of `node`.
pub fn get(node: impl ToNode, key: impl Into<String>) -> Def {
    reference(Reference::from_node(node.to_node()).key(key))
}

pub fn variable(initial: impl ToNode) -> Def {
    NodeDef::new(NodeKind::Variable(initial.to_node()))
}

pub fn computed<F>(inputs: Vec<Def>, func: F) -> Def
where
    F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
{
    NodeDef::new(NodeKind::Computed(Computed {
        inputs,
        func: ComputeFn::new(func),
    }))
}

pub fn computed_async<F>(inputs: Vec<Def>, func: F) -> Def
where
    F: Fn(Vec<Value>) -> BoxFuture<'static, Result<Value, String>> + Send + Sync + 'static,
{
    NodeDef::new(NodeKind::Async(AsyncComputed {
        inputs,
        func: AsyncFn::new(func),
    }))
}

pub fn collection(source: impl ToNode, transforms: Vec<Def>) -> Def {
    NodeDef::new(NodeKind::Collection(Collection {
        source: source.to_node(),
        transforms,
    }))
}

pub fn scope<I, K, N>(body: impl ToNode, bindings: I) -> Def
where
    I: IntoIterator<Item = (K, N)>,
    K: Into<String>,
    N: ToNode,
{
    NodeDef::new(NodeKind::Scope(ScopeNode {
        bindings: collect_fields(bindings),
        body: body.to_node(),
    }))
}

pub fn context(name: impl Into<String>) -> Def {
    NodeDef::new(NodeKind::Context(name.into()))
}

pub fn query_node(target: Reference, query: Query) -> Def {
    NodeDef::new(NodeKind::Query(QueryNode { target, query }))
}

/// Convert JSON into literal nodes: objects become branches, arrays become
/// arrays, scalars become values.
pub fn from_json(json: serde_json::Value) -> Def {
    match json {
        serde_json::Value::Object(fields) => {
            branch(fields.into_iter().map(|(key, child)| (key, from_json(child))))
        }
        serde_json::Value::Array(items) => array(items.into_iter().map(from_json)),
        scalar => value(Value::from(scalar)),
    }
}

fn collect_fields<I, K, N>(fields: I) -> IndexMap<String, Def>
where
    I: IntoIterator<Item = (K, N)>,
    K: Into<String>,
    N: ToNode,
{
    fields
        .into_iter()
        .map(|(key, child)| (key.into(), child.to_node()))
        .collect()
}

// ----------------------------------------------------------------------------
// Transforms
// ----------------------------------------------------------------------------

fn transform(transform: Transform) -> Def {
    NodeDef::new(NodeKind::Transform(transform))
}

pub fn map<F>(f: F) -> Def
where
    F: Fn(Def) -> Def + Send + Sync + 'static,
{
    transform(Transform::Map(NodeFn::new(f)))
}

pub fn filter<F>(predicate: F) -> Def
where
    F: Fn(Def) -> Def + Send + Sync + 'static,
{
    transform(Transform::Filter(NodeFn::new(predicate)))
}

pub fn sort(keys: Vec<SortKey>) -> Def {
    transform(Transform::Sort(keys))
}

pub fn ascending<F>(selector: F) -> SortKey
where
    F: Fn(Def) -> Def + Send + Sync + 'static,
{
    SortKey {
        selector: Some(NodeFn::new(selector)),
        direction: Direction::Ascending,
    }
}

pub fn descending<F>(selector: F) -> SortKey
where
    F: Fn(Def) -> Def + Send + Sync + 'static,
{
    SortKey {
        selector: Some(NodeFn::new(selector)),
        direction: Direction::Descending,
    }
}

/// Sort key comparing the items themselves.
pub fn by_item(direction: Direction) -> SortKey {
    SortKey {
        selector: None,
        direction,
    }
}

pub fn slice(bounds: SliceBounds) -> Def {
    transform(Transform::Slice(bounds))
}

pub fn offset_length(offset: impl ToNode, length: impl ToNode) -> SliceBounds {
    SliceBounds::OffsetLength {
        offset: offset.to_node(),
        length: length.to_node(),
    }
}

pub fn from_to(from: impl ToNode, to: impl ToNode) -> SliceBounds {
    SliceBounds::FromTo {
        from: from.to_node(),
        to: to.to_node(),
    }
}

pub fn begin_end(begin: impl ToNode, end: impl ToNode) -> SliceBounds {
    SliceBounds::BeginEnd {
        begin: begin.to_node(),
        end: end.to_node(),
    }
}

pub fn take(count: impl ToNode) -> Def {
    transform(Transform::Take(count.to_node()))
}

pub fn skip(count: impl ToNode) -> Def {
    transform(Transform::Skip(count.to_node()))
}

pub fn count() -> Def {
    transform(Transform::Count)
}

pub fn first_item() -> Def {
    transform(Transform::FirstItem)
}

pub fn last_item() -> Def {
    transform(Transform::LastItem)
}

pub fn nth_item(index: impl ToNode) -> Def {
    transform(Transform::NthItem(index.to_node()))
}
