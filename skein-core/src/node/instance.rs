//! Instance Addressing
//!
//! A definition evaluated under a scope chain is an *instance*. Instances
//! are addressed by [`InstanceKey`], the pair (definition identity, scope
//! identity): the same definition under two scopes gives two independent
//! instances with their own caches, variable state and subscribers.

use super::def::{Def, DefId};
use crate::scope::ScopeId;

/// Identity of a node instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceKey {
    pub def: DefId,
    pub scope: ScopeId,
}

/// A definition paired with the scope it is evaluated in.
///
/// Handles are cheap to clone and never own live state; the engine keeps
/// instance state in tables keyed by [`Handle::key`].
#[derive(Debug, Clone)]
pub struct Handle {
    pub def: Def,
    pub scope: ScopeId,
}

impl Handle {
    pub fn new(def: Def, scope: ScopeId) -> Self {
        Self { def, scope }
    }

    pub fn key(&self) -> InstanceKey {
        InstanceKey {
            def: self.def.id(),
            scope: self.scope,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeDef, NodeKind, Value};

    #[test]
    fn same_definition_in_different_scopes_differs() {
        let def = NodeDef::new(NodeKind::Value(Value::Null));
        let a = Handle::new(def.clone(), ScopeId::ROOT);
        let b = Handle::new(def, ScopeId::from_raw(7));
        assert_eq!(a.key().def, b.key().def);
        assert_ne!(a.key(), b.key());
    }
}
