//! Per-owner state.
//!
//! Transform outputs and the item nodes synthesized for plain list values
//! belong to the cached instance or subscription whose evaluation created
//! them. Each owner keeps what its latest complete evaluation used; entries
//! it stopped using are dropped when that evaluation finishes, and the whole
//! set goes once the owner itself is collected.

use std::collections::HashMap;

use tracing::trace;

use super::{Engine, Items};
use crate::error::GraphError;
use crate::graph::DepKey;
use crate::node::build::value;
use crate::node::{Def, Handle, InstanceKey, NodeKind, Value};
use crate::pipeline::OutputKey;
use crate::scope::ScopeId;
use crate::subscription::SubscriptionId;

/// Position of a synthesized value node within its owner.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum LiteralSlot {
    /// Element `index` of the list `source` evaluated to.
    Item { source: InstanceKey, index: usize },
    /// Result of a `count` stage.
    Count { stage: usize, transform: InstanceKey },
}

#[derive(Debug)]
struct Output {
    def: Def,
    scope: ScopeId,
    epoch: u64,
}

#[derive(Debug)]
struct Literal {
    def: Def,
    scope: ScopeId,
    epoch: u64,
}

/// Outputs and literals of one owner.
#[derive(Debug, Default)]
pub(crate) struct Owned {
    epoch: u64,
    outputs: HashMap<OutputKey, Output>,
    literals: HashMap<LiteralSlot, Literal>,
}

impl Owned {
    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    fn is_empty(&self) -> bool {
        self.outputs.is_empty() && self.literals.is_empty()
    }

    /// Every scope an entry is keyed by or evaluated in.
    pub fn scopes(&self) -> impl Iterator<Item = ScopeId> + '_ {
        let outputs = self
            .outputs
            .iter()
            .flat_map(|(key, output)| [key.transform.scope, key.item.scope, output.scope]);
        let literals = self.literals.iter().flat_map(|(slot, literal)| {
            let keyed = match slot {
                LiteralSlot::Item { source, .. } => source.scope,
                LiteralSlot::Count { transform, .. } => transform.scope,
            };
            [keyed, literal.scope]
        });
        outputs.chain(literals)
    }
}

impl Engine {
    /// Start an evaluation on behalf of `owner`.
    pub(super) fn begin_owned(&mut self, owner: DepKey) {
        if let Some(owned) = self.owned.get_mut(&owner) {
            owned.epoch += 1;
        }
    }

    /// Finish an evaluation on behalf of `owner`. A complete evaluation
    /// drops whatever it did not touch; a failed or pending one keeps
    /// everything, since it may have stopped early.
    pub(super) fn finish_owned(&mut self, owner: DepKey, complete: bool) {
        if !complete {
            return;
        }
        let Some(owned) = self.owned.get_mut(&owner) else {
            return;
        };
        let epoch = owned.epoch;
        let (outputs, literals) = (owned.outputs.len(), owned.literals.len());
        owned.outputs.retain(|_, output| output.epoch == epoch);
        owned.literals.retain(|_, literal| literal.epoch == epoch);

        let dropped = outputs + literals - owned.outputs.len() - owned.literals.len();
        if dropped > 0 {
            trace!(dropped, "dropped unused outputs");
        }
        if owned.is_empty() {
            self.owned.remove(&owner);
        }
    }

    /// The output stored under `key`, created on first use with `create`
    /// and evaluated in the scope `enter` pushes.
    pub(crate) fn output<F, S>(&mut self, key: OutputKey, create: F, enter: S) -> Result<Handle, GraphError>
    where
        F: FnOnce() -> Def,
        S: FnOnce(&mut Self, &OutputKey) -> Result<ScopeId, GraphError>,
    {
        let owner = key.owner;
        if let Some(owned) = self.owned.get_mut(&owner) {
            let epoch = owned.epoch;
            if let Some(output) = owned.outputs.get_mut(&key) {
                output.epoch = epoch;
                return Ok(Handle::new(output.def.clone(), output.scope));
            }
        }

        let scope = enter(self, &key)?;
        let def = create();
        let owned = self.owned.entry(owner).or_default();
        let epoch = owned.epoch;
        owned.outputs.insert(
            key,
            Output {
                def: def.clone(),
                scope,
                epoch,
            },
        );
        Ok(Handle::new(def, scope))
    }

    /// A value node for `slot` that keeps its identity while the value it
    /// holds stays the same.
    ///
    /// Outside any tracked evaluation there is no owner, and a fresh node
    /// is returned.
    pub(crate) fn literal(&mut self, slot: LiteralSlot, item: Value, scope: ScopeId) -> Handle {
        let Some(owner) = self.tracker.current() else {
            return Handle::new(value(item), scope);
        };
        let owned = self.owned.entry(owner).or_default();
        let epoch = owned.epoch;
        let literal = owned.literals.entry(slot).or_insert_with(|| Literal {
            def: value(item.clone()),
            scope,
            epoch,
        });
        let unchanged = literal.scope == scope
            && matches!(literal.def.kind(), NodeKind::Value(current) if *current == item);
        if !unchanged {
            literal.def = value(item);
            literal.scope = scope;
        }
        literal.epoch = epoch;
        Handle::new(literal.def.clone(), scope)
    }

    /// Items for the elements of a list `source` evaluated to.
    pub(crate) fn list_items(&mut self, source: &Handle, values: Vec<Value>) -> Items {
        let key = source.key();
        Items::new(
            values
                .into_iter()
                .enumerate()
                .map(|(index, item)| {
                    self.literal(LiteralSlot::Item { source: key, index }, item, source.scope)
                })
                .collect(),
        )
    }

    /// Run `f` as an untracked, one-off read. Outputs and literals it
    /// creates are discarded when it returns.
    pub(super) fn one_shot<T, F>(&mut self, f: F) -> T
    where
        F: FnOnce(&mut Self) -> T,
    {
        let owner = DepKey::Subscription(SubscriptionId::new());
        self.tracker.enter(owner);
        let result = f(self);
        self.tracker.exit();
        self.owned.remove(&owner);
        result
    }

    pub(crate) fn output_count(&self) -> usize {
        self.owned.values().map(Owned::output_count).sum()
    }
}
