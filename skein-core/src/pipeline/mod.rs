//! Collection Pipeline
//!
//! A collection is an item source followed by a chain of transforms. Each
//! stage consumes the previous stage's items and produces new ones:
//!
//! ```text
//!   source ─▶ map ─▶ filter ─▶ sort ─▶ slice ─▶ ... ─▶ items
//! ```
//!
//! # Outputs
//!
//! `map`, `filter` and sort selectors are node functions: they receive the
//! item (wrapped so it keeps its own scope) and return a new definition.
//! The definition produced for a given item by a given stage is created once
//! and kept, keyed by [`OutputKey`], so that state inside it (variables,
//! memoized computed values) survives recomputation of the pipeline. Each
//! output is evaluated in its own scope frame on top of the transform's
//! scope.
//!
//! Outputs the latest complete run of a pipeline did not reach (an item
//! that left the source, or one a filter removed ahead of a map) are
//! dropped, and start over if the item comes back.
//!
//! Stages process items in chunks of the configured batch size.

mod sort;

use std::ops::Range;

use tracing::trace;

use crate::error::GraphError;
use crate::graph::DepKey;
use crate::node::{Collection, Def, Handle, InstanceKey, NodeDef, NodeFn, NodeKind, SliceBounds, Transform, Value};
use crate::resolve::{Engine, Items, LiteralSlot, Resolved};
use crate::scope::{Bindings, FrameOrigin, ScopeId};

/// Identity of one transform output: which pipeline, which stage, which
/// item, and which function of the stage produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct OutputKey {
    /// The cached instance or subscription the pipeline runs on behalf of.
    pub owner: DepKey,
    pub stage: usize,
    pub transform: InstanceKey,
    pub item: InstanceKey,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Role {
    Map,
    Filter,
    SortKey(usize),
}

/// The stage currently being applied.
struct Stage<'a> {
    owner: DepKey,
    index: usize,
    transform: &'a Handle,
}

impl Engine {
    pub(crate) fn eval_collection(&mut self, handle: &Handle, collection: &Collection) -> Resolved {
        let source = Handle::new(collection.source.clone(), handle.scope);
        let items = match self.items_of(&source) {
            Ok(Some(items)) => items,
            Ok(None) => Items::default(),
            Err(err) => return Resolved::from_error(err),
        };
        if collection.transforms.is_empty() {
            return Resolved::Collection(items);
        }

        let result = self
            .resolve_chain(&collection.transforms, handle.scope)
            .and_then(|chain| self.apply_chain(handle.key(), &chain, items));
        match result {
            Ok(items) => Resolved::Collection(items),
            Err(err) => Resolved::from_error(err),
        }
    }

    /// Evaluate transform definitions to transform instances.
    pub(crate) fn resolve_chain(&mut self, transforms: &[Def], scope: ScopeId) -> Result<Vec<Handle>, GraphError> {
        transforms
            .iter()
            .map(|transform| match self.eval(&Handle::new(transform.clone(), scope)) {
                Resolved::Transform(handle) => Ok(handle),
                Resolved::Failed(err) => Err(err),
                Resolved::Pending => Err(GraphError::Pending),
                other => Err(GraphError::mismatch("transform", other.kind_name())),
            })
            .collect()
    }

    /// Run `items` through `chain`.
    ///
    /// Outputs belong to the innermost tracked owner, or to `fallback` when
    /// nothing is being tracked.
    pub(crate) fn apply_chain(
        &mut self,
        fallback: InstanceKey,
        chain: &[Handle],
        items: Items,
    ) -> Result<Items, GraphError> {
        let owner = self.tracker.current().unwrap_or(DepKey::Instance(fallback));
        let mut items = Items::try_unwrap(items).unwrap_or_else(|shared| shared.as_ref().clone());

        for (index, transform) in chain.iter().enumerate() {
            let def = transform.def.clone();
            let NodeKind::Transform(kind) = def.kind() else {
                return Err(GraphError::mismatch("transform", def.kind().name()));
            };
            let stage = Stage {
                owner,
                index,
                transform,
            };
            let before = items.len();
            items = self.apply_stage(&stage, kind, items)?;
            trace!(stage = index, transform = kind.name(), before, after = items.len(), "applied stage");
        }
        Ok(Items::new(items))
    }

    fn apply_stage(
        &mut self,
        stage: &Stage<'_>,
        transform: &Transform,
        mut items: Vec<Handle>,
    ) -> Result<Vec<Handle>, GraphError> {
        let scope = stage.transform.scope;
        match transform {
            Transform::Map(func) => self.map_stage(stage, func, &items),
            Transform::Filter(predicate) => self.filter_stage(stage, predicate, items),
            Transform::Sort(keys) => self.sort_stage(stage, keys, items),
            Transform::Slice(bounds) => {
                let range = self.slice_range(bounds, scope, items.len())?;
                Ok(items.drain(range).collect())
            }
            Transform::Take(count) => {
                let count = self.index_param(count, scope)?;
                items.truncate(count);
                Ok(items)
            }
            Transform::Skip(count) => {
                let count = self.index_param(count, scope)?.min(items.len());
                Ok(items.split_off(count))
            }
            Transform::Count => {
                let slot = LiteralSlot::Count {
                    stage: stage.index,
                    transform: stage.transform.key(),
                };
                Ok(vec![self.literal(slot, Value::from(items.len()), scope)])
            }
            Transform::FirstItem => {
                items.truncate(1);
                Ok(items)
            }
            Transform::LastItem => Ok(items.pop().into_iter().collect()),
            Transform::NthItem(index) => {
                let index = self.index_param(index, scope)?;
                Ok(items.into_iter().nth(index).into_iter().collect())
            }
        }
    }

    fn map_stage(&mut self, stage: &Stage<'_>, func: &NodeFn, items: &[Handle]) -> Result<Vec<Handle>, GraphError> {
        let mut mapped = Vec::with_capacity(items.len());
        for chunk in items.chunks(self.config().chunk_size()) {
            for item in chunk {
                mapped.push(self.stage_output(stage, Role::Map, item, func)?);
            }
        }
        Ok(mapped)
    }

    fn filter_stage(
        &mut self,
        stage: &Stage<'_>,
        predicate: &NodeFn,
        items: Vec<Handle>,
    ) -> Result<Vec<Handle>, GraphError> {
        let mut kept = Vec::with_capacity(items.len());
        for chunk in items.chunks(self.config().chunk_size()) {
            for item in chunk {
                let verdict = self.stage_output(stage, Role::Filter, item, predicate)?;
                match self.materialize(&verdict)? {
                    Value::Bool(true) => kept.push(item.clone()),
                    Value::Bool(false) | Value::Absent => {}
                    other => return Err(GraphError::mismatch("boolean", other.kind_name())),
                }
            }
        }
        Ok(kept)
    }

    /// The output of `func` for `item` at this stage, created on first use.
    fn stage_output(
        &mut self,
        stage: &Stage<'_>,
        role: Role,
        item: &Handle,
        func: &NodeFn,
    ) -> Result<Handle, GraphError> {
        let key = OutputKey {
            owner: stage.owner,
            stage: stage.index,
            transform: stage.transform.key(),
            item: item.key(),
            role,
        };
        let parent = stage.transform.scope;
        self.output(
            key,
            || func.call(NodeDef::new(NodeKind::Bound(item.clone()))),
            |engine, key| {
                engine
                    .scopes
                    .push(parent, FrameOrigin::Output(key.clone()), Bindings::new)
            },
        )
    }

    fn slice_range(&mut self, bounds: &SliceBounds, scope: ScopeId, len: usize) -> Result<Range<usize>, GraphError> {
        let (start, end) = match bounds {
            SliceBounds::OffsetLength { offset, length } => {
                let offset = self.index_param(offset, scope)?;
                let length = self.index_param(length, scope)?;
                (offset, offset.saturating_add(length))
            }
            SliceBounds::FromTo { from, to } => {
                let from = self.index_param(from, scope)?;
                let to = self.index_param(to, scope)?;
                (from, to.saturating_add(1))
            }
            SliceBounds::BeginEnd { begin, end } => {
                (self.index_param(begin, scope)?, self.index_param(end, scope)?)
            }
        };
        let end = end.min(len);
        Ok(start.min(end)..end)
    }

    /// Resolve a numeric transform parameter. Reads are tracked, so a
    /// pipeline parameterised by a variable reacts to writes.
    fn index_param(&mut self, param: &Def, scope: ScopeId) -> Result<usize, GraphError> {
        let resolved = self.materialize(&Handle::new(param.clone(), scope))?;
        resolved
            .as_index()
            .ok_or_else(|| GraphError::mismatch("non-negative integer", resolved.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GraphConfig;
    use crate::node::build::*;
    use crate::node::Reference;
    use crate::query::Query;
    use tokio::sync::mpsc;

    const DIGITS: [&str; 10] = [
        "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine",
    ];

    fn engine(transforms: Vec<Def>) -> Engine {
        let (tx, _rx) = mpsc::unbounded_channel();
        let root = branch([
            ("digits", array(DIGITS)),
            ("items", collection(path(["digits"]), transforms)),
        ]);
        Engine::new(root, GraphConfig::default(), tx)
    }

    fn items(transforms: Vec<Def>) -> Result<Value, GraphError> {
        engine(transforms).resolve(&Reference::path(["items"]), &Query::Value)
    }

    fn words(words: &[&str]) -> Value {
        Value::from(words.to_vec())
    }

    #[test]
    fn slice_bounds() {
        assert_eq!(items(vec![slice(from_to(3, 5))]), Ok(words(&["three", "four", "five"])));
        assert_eq!(items(vec![slice(begin_end(3, 5))]), Ok(words(&["three", "four"])));
        assert_eq!(
            items(vec![slice(offset_length(3, 5))]),
            Ok(words(&["three", "four", "five", "six", "seven"]))
        );
        assert_eq!(items(vec![slice(offset_length(8, 5))]), Ok(words(&["eight", "nine"])));
        assert_eq!(items(vec![slice(begin_end(7, 2))]), Ok(words(&[])));
    }

    #[test]
    fn take_skip_and_positional_transforms() {
        assert_eq!(items(vec![take(2)]), Ok(words(&["zero", "one"])));
        assert_eq!(items(vec![skip(8)]), Ok(words(&["eight", "nine"])));
        assert_eq!(items(vec![skip(20)]), Ok(words(&[])));
        assert_eq!(items(vec![first_item()]), Ok(words(&["zero"])));
        assert_eq!(items(vec![last_item()]), Ok(words(&["nine"])));
        assert_eq!(items(vec![nth_item(4)]), Ok(words(&["four"])));
        assert_eq!(items(vec![nth_item(40)]), Ok(words(&[])));
        assert_eq!(items(vec![count()]), Ok(Value::from(vec![10])));
    }

    #[test]
    fn negative_parameters_are_rejected() {
        assert!(matches!(items(vec![take(-1)]), Err(GraphError::TypeMismatch { .. })));
    }

    #[test]
    fn filter_requires_booleans() {
        let result = items(vec![filter(|_| value(1))]);
        assert_eq!(result, Err(GraphError::mismatch("boolean", "integer")));
    }

    #[test]
    fn map_outputs_are_reused_across_evaluations() {
        let mut engine = engine(vec![map(|item| item)]);
        let target = Reference::path(["items"]);
        engine.resolve(&target, &Query::Value).unwrap();
        let outputs = engine.stats().transform_outputs;
        engine.resolve(&target, &Query::Value).unwrap();
        assert_eq!(outputs, 10);
        assert_eq!(engine.stats().transform_outputs, outputs);
    }

    #[test]
    fn counts_keep_their_identity_while_unchanged() {
        let root = branch([
            ("words", array(DIGITS)),
            ("n", variable(0)),
            (
                "counted",
                collection(
                    path(["words"]),
                    vec![
                        take(path(["n"])),
                        count(),
                        map(|total| branch([("total", total), ("seen", variable(false))])),
                    ],
                ),
            ),
        ]);
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut engine = Engine::new(root, GraphConfig::default(), tx);
        let id = crate::subscription::SubscriptionId::new();
        let counted = Reference::path(["counted"]);
        engine.subscribe(id, counted.clone(), Query::entries());

        let seen = counted.clone().first().key("seen");
        engine.set(&seen, value(true)).unwrap();
        engine.set(&Reference::path(["n"]), value(0)).unwrap();
        engine.flush();
        assert_eq!(engine.resolve(&seen, &Query::Value), Ok(Value::Bool(true)));
        assert_eq!(engine.stats().transform_outputs, 1);

        // A different count is a different item.
        engine.set(&Reference::path(["n"]), value(3)).unwrap();
        engine.flush();
        assert_eq!(engine.resolve(&seen, &Query::Value), Ok(Value::Bool(false)));
        assert_eq!(engine.stats().transform_outputs, 1);
    }
}
