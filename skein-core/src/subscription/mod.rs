//! Subscriptions
//!
//! A subscription is a live binding between a query and a listener. It
//! emits the query's result once when created (unless the result is still
//! pending) and again every time a write changes that result.
//!
//! # Lifecycle
//!
//! ```text
//!   Active ──relevant write──▶ Recomputing ──result delivered──▶ Active
//!     │
//!     └──unsubscribe / drop──▶ Disposed (terminal)
//! ```
//!
//! Recomputation happens under the evaluator lock, so at most one is in
//! flight per subscription and writes are serialized against it. A
//! recomputation whose result deep-equals the last emission emits nothing.
//!
//! # Cleanup
//!
//! Dropping the [`Subscription`] handle unsubscribes, like dropping any
//! other resource guard. Unsubscribing releases the subscription's hold on
//! its dependency set; transient instances nothing else reaches are then
//! disposed.

mod dispatch;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Weak;

use crate::error::GraphError;
use crate::node::Value;
use crate::runtime::GraphInner;

pub(crate) use dispatch::Dispatcher;

/// What a subscription delivers: the assembled result, or the failure that
/// prevented assembling it.
pub type Emission = Result<Value, GraphError>;

/// Unique identifier for a subscription.
///
/// IDs are allocated in creation order, which is also the order in which
/// subscriptions affected by the same write are recomputed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Generate a new unique subscription ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Lifecycle state of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Active,
    Recomputing,
    Disposed,
}

/// Handle to a live subscription.
#[must_use = "dropping a subscription unsubscribes it"]
pub struct Subscription {
    id: SubscriptionId,
    graph: Weak<GraphInner>,
    disposed: AtomicBool,
}

impl Subscription {
    pub(crate) fn new(id: SubscriptionId, graph: Weak<GraphInner>) -> Self {
        Self {
            id,
            graph,
            disposed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Stop receiving emissions and release the dependency set.
    ///
    /// Idempotent. An emission already queued for delivery is suppressed.
    pub fn unsubscribe(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(graph) = self.graph.upgrade() {
            graph.unsubscribe(self.id);
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> SubscriptionState {
        if self.is_disposed() {
            return SubscriptionState::Disposed;
        }
        self.graph
            .upgrade()
            .map(|graph| graph.subscription_state(self.id))
            .unwrap_or(SubscriptionState::Disposed)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_ids_are_unique_and_ordered() {
        let id1 = SubscriptionId::new();
        let id2 = SubscriptionId::new();
        let id3 = SubscriptionId::new();

        assert_ne!(id1, id2);
        assert!(id1 < id2 && id2 < id3);
    }

    #[test]
    fn orphaned_handle_reports_disposed() {
        let handle = Subscription::new(SubscriptionId::new(), Weak::new());
        assert_eq!(handle.state(), SubscriptionState::Disposed);

        handle.unsubscribe();
        handle.unsubscribe();
        assert!(handle.is_disposed());
    }
}
