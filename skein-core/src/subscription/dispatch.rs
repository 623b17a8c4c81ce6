//! Emission Dispatch
//!
//! The dispatcher is the dispatch table from subscription IDs to listeners
//! plus the queue emissions wait in before delivery.
//!
//! # Ordering
//!
//! Emissions are enqueued while the evaluator lock is held, so queue order
//! is evaluation order. Delivery happens after the lock is released, by
//! whichever thread wins the `draining` flag; every other caller just
//! enqueues and returns. This gives three guarantees:
//!
//! - emissions for one subscription are delivered in order and never
//!   overlap,
//! - a listener may call back into the graph (a nested `set` enqueues its
//!   emissions behind the current one instead of recursing),
//! - a subscription removed from the table receives nothing further, even
//!   if emissions for it are still queued.
//!
//! A listener that panics loses that emission only. The panic is logged and
//! delivery carries on with the rest of the queue.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{trace, warn};

use super::{Emission, SubscriptionId};

/// Callback invoked with each new result of a subscription.
pub(crate) type Listener = Arc<dyn Fn(Emission) + Send + Sync>;

#[derive(Default)]
pub(crate) struct Dispatcher {
    listeners: DashMap<SubscriptionId, Listener>,
    queue: Mutex<VecDeque<(SubscriptionId, Emission)>>,
    draining: AtomicBool,
}

impl Dispatcher {
    pub fn register(&self, id: SubscriptionId, listener: Listener) {
        self.listeners.insert(id, listener);
    }

    /// Remove a listener. Queued emissions for it are dropped at delivery.
    pub fn remove(&self, id: SubscriptionId) -> bool {
        self.listeners.remove(&id).is_some()
    }

    #[cfg(test)]
    pub fn is_registered(&self, id: SubscriptionId) -> bool {
        self.listeners.contains_key(&id)
    }

    pub fn enqueue<I>(&self, emissions: I)
    where
        I: IntoIterator<Item = (SubscriptionId, Emission)>,
    {
        self.queue.lock().extend(emissions);
    }

    /// Deliver queued emissions until the queue is empty, unless another
    /// caller is already delivering.
    pub fn drain(&self) {
        loop {
            if self
                .draining
                .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_err()
            {
                return;
            }

            loop {
                let next = self.queue.lock().pop_front();
                let Some((id, emission)) = next else {
                    break;
                };
                // Clone out of the table so the shard lock is not held while
                // the listener runs; it may unsubscribe itself.
                let listener = self.listeners.get(&id).map(|entry| Arc::clone(entry.value()));
                match listener {
                    Some(listener) => {
                        trace!(subscription = id.raw(), "delivering emission");
                        if catch_unwind(AssertUnwindSafe(|| listener(emission))).is_err() {
                            warn!(subscription = id.raw(), "listener panicked, emission dropped");
                        }
                    }
                    None => trace!(subscription = id.raw(), "dropping emission for disposed subscription"),
                }
            }

            self.draining.store(false, Ordering::Release);

            // An emission may have been enqueued after the inner loop saw an
            // empty queue but before the flag was cleared.
            if self.queue.lock().is_empty() {
                return;
            }
        }
    }
}
