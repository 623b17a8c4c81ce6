//! Queries
//!
//! A [`Query`] describes the shape of a result. Resolution mirrors it:
//!
//! - [`Query::Value`] takes the resolved value. Branches become maps of
//!   their declared fields and collections become lists, all the way down.
//! - [`Query::Fields`] selects named children of a branch (or map), each
//!   with its own sub-query, under an output name.
//! - [`Query::Entries`] enumerates a collection (or a branch's declared
//!   fields), optionally after running a query-side transform chain, and
//!   applies the item query to each entry.
//!
//! ```rust,ignore
//! let names = Query::entries_of(Query::fields([("name", key("name"))]))
//!     .with_transforms(vec![take(10)]);
//! ```
//!
//! Absent data propagates: any shape applied to an absent value is absent.

use indexmap::IndexMap;

use crate::error::GraphError;
use crate::node::build::value;
use crate::node::{Def, Handle, NodeKind, Reference, Value};
use crate::resolve::{Engine, Items, Resolved};
use crate::scope::ScopeId;

#[derive(Debug, Clone, Default)]
pub enum Query {
    #[default]
    Value,
    Fields(IndexMap<String, Field>),
    Entries(Entries),
}

/// One selected child: the key to read and the query to apply to it.
#[derive(Debug, Clone)]
pub struct Field {
    pub key: String,
    pub query: Query,
}

#[derive(Debug, Clone)]
pub struct Entries {
    /// Transforms applied after the collection's own chain.
    pub transforms: Vec<Def>,
    pub item: Box<Query>,
}

impl Query {
    pub fn fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (S, Field)>,
        S: Into<String>,
    {
        Query::Fields(
            fields
                .into_iter()
                .map(|(name, field)| (name.into(), field))
                .collect(),
        )
    }

    /// Enumerate entries, taking the value of each.
    pub fn entries() -> Self {
        Self::entries_of(Query::Value)
    }

    pub fn entries_of(item: Query) -> Self {
        Query::Entries(Entries {
            transforms: Vec::new(),
            item: Box::new(item),
        })
    }

    /// Attach a query-side transform chain. A non-entries query becomes
    /// the item query of an enumeration.
    pub fn with_transforms(self, transforms: Vec<Def>) -> Self {
        match self {
            Query::Entries(mut entries) => {
                entries.transforms.extend(transforms);
                Query::Entries(entries)
            }
            item => Query::Entries(Entries {
                transforms,
                item: Box::new(item),
            }),
        }
    }
}

/// Select `key`, taking its value.
pub fn key(key: impl Into<String>) -> Field {
    Field {
        key: key.into(),
        query: Query::Value,
    }
}

impl Field {
    pub fn with(mut self, query: Query) -> Self {
        self.query = query;
        self
    }
}

impl Engine {
    /// Locate `target` in `scope` and assemble `query` there.
    pub(crate) fn resolve_reference(
        &mut self,
        target: &Reference,
        scope: ScopeId,
        query: &Query,
    ) -> Result<Value, GraphError> {
        match self.locate(target, scope)? {
            Some(handle) => self.resolve_query(&handle, query, scope),
            None => Ok(Value::Absent),
        }
    }

    /// The fully materialized value of `handle`.
    pub(crate) fn materialize(&mut self, handle: &Handle) -> Result<Value, GraphError> {
        self.resolve_query(handle, &Query::Value, handle.scope)
    }

    /// Assemble `query` against `handle`. Query-side transforms are
    /// resolved in `scope`, the scope the query was issued from.
    pub(crate) fn resolve_query(
        &mut self,
        handle: &Handle,
        query: &Query,
        scope: ScopeId,
    ) -> Result<Value, GraphError> {
        self.descend("query")?;
        let resolved = self.eval(handle);
        let result = match query {
            Query::Value => self.value_of(resolved),
            Query::Fields(fields) => self.select_fields(handle, resolved, fields, scope),
            Query::Entries(entries) => self.enumerate(handle, resolved, entries, scope),
        };
        self.ascend();
        result
    }

    fn value_of(&mut self, resolved: Resolved) -> Result<Value, GraphError> {
        match resolved {
            Resolved::Value(value) => Ok(value),
            Resolved::Branch(branch) => {
                let def = branch.def.clone();
                let NodeKind::Branch(node) = def.kind() else {
                    return Ok(Value::Absent);
                };
                let mut fields = IndexMap::with_capacity(node.fields.len());
                for (key, child) in &node.fields {
                    let child = Handle::new(child.clone(), branch.scope);
                    fields.insert(key.clone(), self.materialize(&child)?);
                }
                Ok(Value::Map(fields))
            }
            Resolved::Collection(items) => {
                let mut values = Vec::with_capacity(items.len());
                for chunk in items.chunks(self.config().chunk_size()) {
                    for item in chunk {
                        values.push(self.materialize(item)?);
                    }
                }
                Ok(Value::List(values))
            }
            Resolved::Transform(_) => Err(GraphError::mismatch("value", "transform")),
            Resolved::Failed(err) => Err(err),
            Resolved::Pending => Err(GraphError::Pending),
        }
    }

    fn select_fields(
        &mut self,
        handle: &Handle,
        resolved: Resolved,
        fields: &IndexMap<String, Field>,
        scope: ScopeId,
    ) -> Result<Value, GraphError> {
        let mut selected = IndexMap::with_capacity(fields.len());
        match resolved {
            Resolved::Branch(branch) => {
                for (name, field) in fields {
                    let entry = match self.branch_child(&branch, &field.key)? {
                        Some(child) => self.resolve_query(&child, &field.query, scope)?,
                        None => Value::Absent,
                    };
                    selected.insert(name.clone(), entry);
                }
            }
            Resolved::Value(Value::Map(map)) => {
                for (name, field) in fields {
                    let entry = match map.get(&field.key).cloned() {
                        Some(found) => {
                            let child = Handle::new(value(found), handle.scope);
                            self.resolve_query(&child, &field.query, scope)?
                        }
                        None => Value::Absent,
                    };
                    selected.insert(name.clone(), entry);
                }
            }
            Resolved::Value(Value::Absent | Value::Null) => return Ok(Value::Absent),
            Resolved::Failed(err) => return Err(err),
            Resolved::Pending => return Err(GraphError::Pending),
            other => return Err(GraphError::mismatch("branch", other.kind_name())),
        }
        Ok(Value::Map(selected))
    }

    fn enumerate(
        &mut self,
        handle: &Handle,
        resolved: Resolved,
        entries: &Entries,
        scope: ScopeId,
    ) -> Result<Value, GraphError> {
        let items: Items = match resolved {
            Resolved::Collection(items) => items,
            Resolved::Value(Value::List(values)) => self.list_items(handle, values),
            Resolved::Branch(branch) if entries.transforms.is_empty() => {
                return self.enumerate_branch(&branch, &entries.item, scope);
            }
            Resolved::Value(Value::Absent | Value::Null) => return Ok(Value::Absent),
            Resolved::Failed(err) => return Err(err),
            Resolved::Pending => return Err(GraphError::Pending),
            other => return Err(GraphError::mismatch("collection", other.kind_name())),
        };

        let items = if entries.transforms.is_empty() {
            items
        } else {
            let chain = self.resolve_chain(&entries.transforms, scope)?;
            self.apply_chain(handle.key(), &chain, items)?
        };

        let mut values = Vec::with_capacity(items.len());
        for chunk in items.chunks(self.config().chunk_size()) {
            for item in chunk {
                values.push(self.resolve_query(item, &entries.item, scope)?);
            }
        }
        Ok(Value::List(values))
    }

    fn enumerate_branch(&mut self, branch: &Handle, item: &Query, scope: ScopeId) -> Result<Value, GraphError> {
        let def = branch.def.clone();
        let NodeKind::Branch(node) = def.kind() else {
            return Ok(Value::Absent);
        };
        let mut entries = IndexMap::with_capacity(node.fields.len());
        for (key, child) in &node.fields {
            let child = Handle::new(child.clone(), branch.scope);
            entries.insert(key.clone(), self.resolve_query(&child, item, scope)?);
        }
        Ok(Value::Map(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GraphConfig;
    use crate::node::build::*;
    use serde_json::json;
    use tokio::sync::mpsc;

    fn engine(root: Def) -> Engine {
        let (tx, _rx) = mpsc::unbounded_channel();
        Engine::new(root, GraphConfig::default(), tx)
    }

    fn books() -> Def {
        from_json(json!({
            "books": [
                {"title": "Dune", "year": 1965},
                {"title": "Neuromancer", "year": 1984},
                {"title": "Hyperion", "year": 1989}
            ],
            "shelf": {"a": 1, "b": 2}
        }))
    }

    #[test]
    fn value_leaf_materializes_deeply() {
        let mut engine = engine(books());
        let result = engine.resolve(&Reference::path(["books"]).first(), &Query::Value);
        assert_eq!(result.map(|v| v.to_json()), Ok(json!({"title": "Dune", "year": 1965})));
    }

    #[test]
    fn field_selection_renames_and_fills_absent() {
        let mut engine = engine(books());
        let query = Query::fields([("name", key("title")), ("isbn", key("isbn"))]);
        let result = engine.resolve(&Reference::path(["books"]).last(), &query);
        assert_eq!(result.map(|v| v.to_json()), Ok(json!({"name": "Hyperion", "isbn": null})));
    }

    #[test]
    fn entries_with_query_side_transforms() {
        let mut engine = engine(books());
        let query = Query::entries_of(Query::fields([("title", key("title"))]))
            .with_transforms(vec![skip(1)]);
        let result = engine.resolve(&Reference::path(["books"]), &query);
        assert_eq!(
            result.map(|v| v.to_json()),
            Ok(json!([{"title": "Neuromancer"}, {"title": "Hyperion"}]))
        );
    }

    #[test]
    fn entries_over_a_branch_enumerate_declared_fields() {
        let mut engine = engine(books());
        let result = engine.resolve(&Reference::path(["shelf"]), &Query::entries());
        assert_eq!(result.map(|v| v.to_json()), Ok(json!({"a": 1, "b": 2})));
    }

    #[test]
    fn shapes_on_absent_data_are_absent() {
        let mut engine = engine(books());
        let missing = Reference::path(["nothing"]);
        assert_eq!(engine.resolve(&missing, &Query::entries()), Ok(Value::Absent));
        assert_eq!(
            engine.resolve(&missing, &Query::fields([("x", key("x"))])),
            Ok(Value::Absent)
        );
    }

    #[test]
    fn query_nodes_embed_their_result() {
        let root = branch([
            ("books", from_json(json!([{"title": "Dune"}, {"title": "Emma"}]))),
            (
                "titles",
                query_node(
                    Reference::path(["books"]),
                    Query::entries_of(Query::fields([("t", key("title"))])),
                ),
            ),
        ]);
        let mut engine = engine(root);
        let result = engine.resolve(&Reference::path(["titles"]).nth(1), &Query::Value);
        assert_eq!(result.map(|v| v.to_json()), Ok(json!({"t": "Emma"})));
    }
}
