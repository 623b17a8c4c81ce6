//! Path location.
//!
//! Walks a [`Reference`] one segment at a time. Key segments step into
//! branch children (static fields first, then the catch-all child under a
//! new parameter scope) or into map values; positional segments step into
//! collection items. Stepping past missing data yields `None`, which
//! callers report as [`Value::Absent`].

use smallvec::smallvec;
use tracing::trace;

use super::{Engine, Items, Resolved};
use crate::error::GraphError;
use crate::node::build::value;
use crate::node::{Def, Handle, NodeKind, PathSegment, RefRoot, Reference, ScopeNode, Value};
use crate::scope::{FrameOrigin, ScopeId};

#[derive(Debug, Clone, Copy)]
enum Position {
    First,
    Last,
    Nth(usize),
}

impl Engine {
    /// Find the instance `reference` addresses when evaluated in `scope`.
    pub(crate) fn locate(
        &mut self,
        reference: &Reference,
        scope: ScopeId,
    ) -> Result<Option<Handle>, GraphError> {
        let mut current = match &reference.root {
            RefRoot::Graph => Handle::new(self.root.clone(), ScopeId::ROOT),
            RefRoot::Node(def) => Handle::new(def.clone(), scope),
        };
        for segment in &reference.path {
            match self.step(&current, segment, scope, reference)? {
                Some(next) => current = next,
                None => {
                    trace!(reference = %reference, at = %segment, "path ends in absent data");
                    return Ok(None);
                }
            }
        }
        Ok(Some(current))
    }

    fn step(
        &mut self,
        current: &Handle,
        segment: &PathSegment,
        scope: ScopeId,
        reference: &Reference,
    ) -> Result<Option<Handle>, GraphError> {
        match segment {
            PathSegment::Key(key) => self.child(current, key, reference),
            PathSegment::Dynamic(def) => {
                match self.materialize(&Handle::new(def.clone(), scope))? {
                    Value::String(key) => self.child(current, &key, reference),
                    Value::Absent | Value::Null => Ok(None),
                    other => match other.as_index() {
                        Some(index) => self.item_at(current, Position::Nth(index)),
                        None => Err(GraphError::mismatch("string key or item index", other.kind_name())),
                    },
                }
            }
            PathSegment::First => self.item_at(current, Position::First),
            PathSegment::Last => self.item_at(current, Position::Last),
            PathSegment::Nth(index) => self.item_at(current, Position::Nth(*index)),
            PathSegment::Length => Ok(self
                .items_of(current)?
                .map(|items| Handle::new(value(items.len()), current.scope))),
        }
    }

    fn child(
        &mut self,
        current: &Handle,
        key: &str,
        reference: &Reference,
    ) -> Result<Option<Handle>, GraphError> {
        match self.eval(current) {
            Resolved::Branch(branch) => self.branch_child(&branch, key),
            Resolved::Value(Value::Map(mut fields)) => Ok(fields
                .swap_remove(key)
                .map(|field| Handle::new(value(field), current.scope))),
            Resolved::Value(Value::Absent | Value::Null) => Ok(None),
            Resolved::Failed(err) => Err(err),
            Resolved::Pending => Err(GraphError::Pending),
            other => {
                trace!(key, found = other.kind_name(), "key step on a non-branch");
                Err(GraphError::Addressing {
                    path: reference.to_string(),
                })
            }
        }
    }

    /// The child `key` of an evaluated branch, or `None` if it has neither a
    /// field of that name nor a catch-all child.
    pub(crate) fn branch_child(&mut self, branch: &Handle, key: &str) -> Result<Option<Handle>, GraphError> {
        let NodeKind::Branch(node) = branch.def.kind() else {
            return Ok(None);
        };
        if let Some(child) = node.fields.get(key) {
            return Ok(Some(Handle::new(child.clone(), branch.scope)));
        }

        let Some(dynamic) = node.dynamic.as_ref() else {
            return Ok(None);
        };
        let parent = branch.scope;
        let origin = FrameOrigin::Param {
            branch: branch.def.id(),
            key: key.to_string(),
        };
        let scope = self.scopes.push(parent, origin, || {
            smallvec![(dynamic.param.clone(), Handle::new(value(key), parent))]
        })?;
        Ok(Some(Handle::new(dynamic.child.clone(), scope)))
    }

    fn item_at(&mut self, current: &Handle, position: Position) -> Result<Option<Handle>, GraphError> {
        let Some(items) = self.items_of(current)? else {
            return Ok(None);
        };
        let index = match position {
            Position::First => 0,
            Position::Last => match items.len().checked_sub(1) {
                Some(last) => last,
                None => return Ok(None),
            },
            Position::Nth(index) => index,
        };
        Ok(items.get(index).cloned())
    }

    /// Items of whatever `handle` evaluates to. Lists of plain values count
    /// as collections, with one stable item node per element; absent and
    /// null have no items.
    pub(crate) fn items_of(&mut self, handle: &Handle) -> Result<Option<Items>, GraphError> {
        match self.eval(handle) {
            Resolved::Collection(items) => Ok(Some(items)),
            Resolved::Value(Value::List(values)) => Ok(Some(self.list_items(handle, values))),
            Resolved::Value(Value::Absent | Value::Null) => Ok(None),
            Resolved::Failed(err) => Err(err),
            Resolved::Pending => Err(GraphError::Pending),
            other => Err(GraphError::mismatch("collection", other.kind_name())),
        }
    }

    /// Push the frame of a scope wrapper. Its bindings resolve in the scope
    /// the wrapper itself is evaluated in.
    pub(crate) fn enter_scope(&mut self, def: &Def, node: &ScopeNode, parent: ScopeId) -> Result<ScopeId, GraphError> {
        self.scopes.push(parent, FrameOrigin::Wrapper(def.id()), || {
            node.bindings
                .iter()
                .map(|(name, binding)| (name.clone(), Handle::new(binding.clone(), parent)))
                .collect()
        })
    }

    /// Follow pass-through nodes from `handle` to the variable it denotes.
    pub(super) fn settable(&mut self, mut handle: Handle) -> Result<Handle, GraphError> {
        for _ in 0..self.config.max_depth {
            let def = handle.def.clone();
            handle = match def.kind() {
                NodeKind::Variable(_) => return Ok(handle),
                NodeKind::Ref(reference) => {
                    self.locate(reference, handle.scope)?
                        .ok_or_else(|| GraphError::Addressing {
                            path: reference.to_string(),
                        })?
                }
                NodeKind::Bound(inner) => inner.clone(),
                NodeKind::Scope(node) => {
                    let scope = self.enter_scope(&def, node, handle.scope)?;
                    Handle::new(node.body.clone(), scope)
                }
                NodeKind::Context(name) => self
                    .scopes
                    .resolve_context(handle.scope, name)
                    .ok_or_else(|| GraphError::Addressing {
                        path: format!("context `{name}`"),
                    })?,
                other => return Err(GraphError::NotSettable { kind: other.name() }),
            };
        }
        Err(GraphError::evaluation(
            "maximum resolution depth exceeded while locating a variable",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GraphConfig;
    use crate::node::build::*;
    use crate::query::Query;
    use tokio::sync::mpsc;

    fn engine(root: Def) -> Engine {
        let (tx, _rx) = mpsc::unbounded_channel();
        Engine::new(root, GraphConfig::default(), tx)
    }

    fn get(engine: &mut Engine, reference: Reference) -> Result<Value, GraphError> {
        engine.resolve(&reference, &Query::Value)
    }

    #[test]
    fn positional_segments_on_arrays() {
        let mut engine = engine(from_json(serde_json::json!({"items": ["a", "b", "c"]})));
        let items = || Reference::path(["items"]);

        assert_eq!(get(&mut engine, items().first()), Ok(Value::from("a")));
        assert_eq!(get(&mut engine, items().last()), Ok(Value::from("c")));
        assert_eq!(get(&mut engine, items().nth(1)), Ok(Value::from("b")));
        assert_eq!(get(&mut engine, items().nth(9)), Ok(Value::Absent));
        assert_eq!(get(&mut engine, items().length()), Ok(Value::Int(3)));
    }

    #[test]
    fn missing_keys_are_absent_and_stay_absent() {
        let mut engine = engine(from_json(serde_json::json!({"a": {"b": 1}})));
        assert_eq!(get(&mut engine, Reference::path(["a", "x", "y"])), Ok(Value::Absent));
    }

    #[test]
    fn keys_on_scalars_are_addressing_errors() {
        let mut engine = engine(from_json(serde_json::json!({"a": 1})));
        let result = get(&mut engine, Reference::path(["a", "b"]));
        assert!(matches!(result, Err(GraphError::Addressing { .. })));
    }

    #[test]
    fn catch_all_child_sees_the_requested_key() {
        let root = branch([(
            "greet",
            matching(Vec::<(&str, Def)>::new(), "name", context("name")),
        )]);
        let mut engine = engine(root);
        assert_eq!(
            get(&mut engine, Reference::path(["greet", "world"])),
            Ok(Value::from("world"))
        );
    }

    #[test]
    fn dynamic_segments_select_keys_and_indices() {
        let root = branch([
            ("which", value("b")),
            ("index", value(1)),
            ("map", from_json(serde_json::json!({"a": 1, "b": 2}))),
            ("list", from_json(serde_json::json!([10, 20, 30]))),
        ]);
        let mut engine = engine(root);
        assert_eq!(
            get(&mut engine, Reference::path(["map"]).dynamic(path(["which"]))),
            Ok(Value::Int(2))
        );
        assert_eq!(
            get(&mut engine, Reference::path(["list"]).dynamic(path(["index"]))),
            Ok(Value::Int(20))
        );
    }

    #[test]
    fn set_follows_references_to_variables() {
        let root = branch([("cell", variable(1)), ("alias", path(["cell"])), ("fixed", value(2))]);
        let mut engine = engine(root);

        assert_eq!(engine.set(&Reference::path(["alias"]), value(5)), Ok(Value::Int(5)));
        assert_eq!(get(&mut engine, Reference::path(["cell"])), Ok(Value::Int(5)));
        assert_eq!(
            engine.set(&Reference::path(["fixed"]), value(3)),
            Err(GraphError::NotSettable { kind: "value" })
        );
        assert!(matches!(
            engine.set(&Reference::path(["missing"]), value(3)),
            Err(GraphError::Addressing { .. })
        ));
    }
}
