//! Dependency Nodes
//!
//! This module defines the nodes that live in the dependency graph.

use std::collections::HashSet;

use crate::node::InstanceKey;
use crate::subscription::SubscriptionId;

/// Identity of a node in the dependency graph: either a node instance or a
/// live subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DepKey {
    Instance(InstanceKey),
    Subscription(SubscriptionId),
}

impl DepKey {
    pub fn instance(&self) -> Option<InstanceKey> {
        match self {
            DepKey::Instance(key) => Some(*key),
            DepKey::Subscription(_) => None,
        }
    }

    pub fn subscription(&self) -> Option<SubscriptionId> {
        match self {
            DepKey::Subscription(id) => Some(*id),
            DepKey::Instance(_) => None,
        }
    }
}

/// The kind of node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepKind {
    /// A variable or async value. Changes originate here.
    /// Sources have dependents but no dependencies.
    Source,

    /// A cached instance (computed value, collection pipeline).
    /// Has dependencies and may have dependents.
    Derived,

    /// A subscription. Leaves of the graph: they have dependencies but
    /// nothing depends on them.
    Subscriber,
}

/// Dirty state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirtyState {
    /// The cached result is up-to-date.
    Clean,

    /// The node must be re-evaluated before its cache can be used.
    Dirty,
}

/// A node in the dependency graph.
#[derive(Debug)]
pub struct DepNode {
    key: DepKey,
    kind: DepKind,
    dirty: DirtyState,

    /// Nodes this node read during its last evaluation.
    dependencies: HashSet<DepKey>,

    /// Nodes that read this node during their last evaluation.
    dependents: HashSet<DepKey>,
}

impl DepNode {
    pub fn new(key: DepKey, kind: DepKind) -> Self {
        Self {
            key,
            kind,
            dirty: match kind {
                DepKind::Source => DirtyState::Clean,
                // Start dirty to force the first evaluation
                DepKind::Derived | DepKind::Subscriber => DirtyState::Dirty,
            },
            dependencies: HashSet::new(),
            dependents: HashSet::new(),
        }
    }

    pub fn key(&self) -> DepKey {
        self.key
    }

    pub fn kind(&self) -> DepKind {
        self.kind
    }

    pub fn dirty_state(&self) -> DirtyState {
        self.dirty
    }

    pub fn is_clean(&self) -> bool {
        self.dirty == DirtyState::Clean
    }

    pub fn mark_clean(&mut self) {
        self.dirty = DirtyState::Clean;
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = DirtyState::Dirty;
    }

    pub fn add_dependency(&mut self, key: DepKey) {
        self.dependencies.insert(key);
    }

    pub fn remove_dependency(&mut self, key: DepKey) {
        self.dependencies.remove(&key);
    }

    pub fn dependencies(&self) -> &HashSet<DepKey> {
        &self.dependencies
    }

    pub fn add_dependent(&mut self, key: DepKey) {
        self.dependents.insert(key);
    }

    pub fn remove_dependent(&mut self, key: DepKey) {
        self.dependents.remove(&key);
    }

    pub fn dependents(&self) -> &HashSet<DepKey> {
        &self.dependents
    }

    pub(crate) fn take_dependencies(&mut self) -> HashSet<DepKey> {
        std::mem::take(&mut self.dependencies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::DefId;
    use crate::scope::ScopeId;

    fn instance() -> DepKey {
        DepKey::Instance(InstanceKey {
            def: DefId::new(),
            scope: ScopeId::ROOT,
        })
    }

    #[test]
    fn source_node_starts_clean() {
        let node = DepNode::new(instance(), DepKind::Source);
        assert_eq!(node.kind(), DepKind::Source);
        assert!(node.is_clean());
    }

    #[test]
    fn derived_and_subscriber_nodes_start_dirty() {
        let derived = DepNode::new(instance(), DepKind::Derived);
        assert_eq!(derived.dirty_state(), DirtyState::Dirty);

        let subscriber = DepNode::new(
            DepKey::Subscription(SubscriptionId::new()),
            DepKind::Subscriber,
        );
        assert!(!subscriber.is_clean());
        assert!(subscriber.key().subscription().is_some());
    }

    #[test]
    fn dependency_management() {
        let mut node = DepNode::new(instance(), DepKind::Derived);
        let dep1 = instance();
        let dep2 = instance();

        node.add_dependency(dep1);
        node.add_dependency(dep2);
        assert_eq!(node.dependencies().len(), 2);

        node.remove_dependency(dep1);
        assert!(!node.dependencies().contains(&dep1));

        let taken = node.take_dependencies();
        assert!(taken.contains(&dep2));
        assert!(node.dependencies().is_empty());
    }
}
