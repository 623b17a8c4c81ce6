//! Update Scheduler
//!
//! The scheduler owns the dependency graph and decides what has to be
//! recomputed when a source changes.
//!
//! # Algorithm
//!
//! 1. When a variable is written, its direct dependents are marked dirty.
//! 2. Dirtiness propagates breadth-first to their dependents, and so on.
//! 3. Every subscription reached is returned for recomputation.
//! 4. Dirty derived instances recompute lazily, the next time a
//!    subscription's recomputation reads them.
//!
//! Nothing outside the reached set is touched, so a write triggers exactly
//! the subscriptions whose last result depended on it.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use super::node::{DepKey, DepKind, DepNode};
use crate::subscription::SubscriptionId;

/// The update scheduler manages the dependency graph and coordinates updates.
#[derive(Debug)]
pub struct UpdateScheduler {
    /// All nodes in the graph, indexed by key.
    nodes: HashMap<DepKey, DepNode>,
}

impl UpdateScheduler {
    /// Create a new empty scheduler.
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
        }
    }

    /// Get the node for `key`, creating it with `kind` if missing.
    pub fn ensure_node(&mut self, key: DepKey, kind: DepKind) -> &mut DepNode {
        self.nodes
            .entry(key)
            .or_insert_with(|| DepNode::new(key, kind))
    }

    /// Remove a node from the graph.
    ///
    /// Also removes all edges involving this node.
    pub fn remove_node(&mut self, key: DepKey) {
        if let Some(node) = self.nodes.remove(&key) {
            // Remove this node from its dependencies' dependent lists
            for dep in node.dependencies() {
                if let Some(dep_node) = self.nodes.get_mut(dep) {
                    dep_node.remove_dependent(key);
                }
            }

            // Remove this node from its dependents' dependency lists
            for dependent in node.dependents() {
                if let Some(dependent_node) = self.nodes.get_mut(dependent) {
                    dependent_node.remove_dependency(key);
                }
            }
        }
    }

    pub fn get_node(&self, key: DepKey) -> Option<&DepNode> {
        self.nodes.get(&key)
    }

    #[cfg(test)]
    pub fn contains(&self, key: DepKey) -> bool {
        self.nodes.contains_key(&key)
    }

    pub fn keys(&self) -> impl Iterator<Item = DepKey> + '_ {
        self.nodes.keys().copied()
    }

    /// Add a dependency edge: `dependent` depends on `dependency`.
    pub fn add_edge(&mut self, dependency: DepKey, dependent: DepKey) {
        if let Some(dep_node) = self.nodes.get_mut(&dependency) {
            dep_node.add_dependent(dependent);
        }
        if let Some(dependent_node) = self.nodes.get_mut(&dependent) {
            dependent_node.add_dependency(dependency);
        }
    }

    /// Replace the dependency set of `dependent` with `dependencies`.
    ///
    /// Called after every evaluation with the reads captured during it, so
    /// stale edges from a previous evaluation never cause spurious updates.
    pub fn set_dependencies<I>(&mut self, dependent: DepKey, dependencies: I)
    where
        I: IntoIterator<Item = DepKey>,
    {
        let previous = match self.nodes.get_mut(&dependent) {
            Some(node) => node.take_dependencies(),
            None => return,
        };
        for dep in previous {
            if let Some(dep_node) = self.nodes.get_mut(&dep) {
                dep_node.remove_dependent(dependent);
            }
        }
        for dep in dependencies {
            if dep != dependent {
                self.add_edge(dep, dependent);
            }
        }
    }

    /// Whether `key` has an up-to-date evaluation. Unknown nodes are not.
    pub fn is_clean(&self, key: DepKey) -> bool {
        self.nodes.get(&key).is_some_and(DepNode::is_clean)
    }

    pub fn mark_clean(&mut self, key: DepKey) {
        if let Some(node) = self.nodes.get_mut(&key) {
            node.mark_clean();
        }
    }

    pub fn mark_dirty(&mut self, key: DepKey) {
        if let Some(node) = self.nodes.get_mut(&key) {
            node.mark_dirty();
        }
    }

    /// Mark a source node as changed and propagate dirty flags.
    ///
    /// Returns the subscriptions reached, in creation order.
    pub fn mark_changed(&mut self, source: DepKey) -> BTreeSet<SubscriptionId> {
        let mut affected = BTreeSet::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();

        // Start with the source node's direct dependents
        if let Some(node) = self.nodes.get(&source) {
            queue.extend(node.dependents().iter().copied());
        }

        // BFS to propagate dirty status
        while let Some(key) = queue.pop_front() {
            if !visited.insert(key) {
                continue;
            }

            if let Some(node) = self.nodes.get_mut(&key) {
                node.mark_dirty();
                if let Some(id) = key.subscription() {
                    affected.insert(id);
                }
                queue.extend(node.dependents().iter().copied());
            }
        }

        affected
    }

    /// Every node reachable from `roots` by following dependency edges,
    /// roots included.
    pub fn reachable_from<I>(&self, roots: I) -> HashSet<DepKey>
    where
        I: IntoIterator<Item = DepKey>,
    {
        let mut reached = HashSet::new();
        let mut stack: Vec<DepKey> = roots.into_iter().collect();

        while let Some(key) = stack.pop() {
            if !reached.insert(key) {
                continue;
            }
            if let Some(node) = self.nodes.get(&key) {
                stack.extend(node.dependencies().iter().copied());
            }
        }

        reached
    }

    /// Remove every node for which `keep` returns false, with its edges.
    /// Returns the number of nodes removed.
    pub fn retain<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&DepKey) -> bool,
    {
        let doomed: Vec<DepKey> = self.nodes.keys().filter(|key| !keep(key)).copied().collect();
        for key in &doomed {
            self.remove_node(*key);
        }
        doomed.len()
    }

    /// Keys of all subscription nodes.
    pub fn subscribers(&self) -> impl Iterator<Item = DepKey> + '_ {
        self.nodes
            .values()
            .filter(|node| node.kind() == DepKind::Subscriber)
            .map(DepNode::key)
    }

    /// Get the total number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

impl Default for UpdateScheduler {
    fn default() -> Self {
        Self::new()
    }
}
