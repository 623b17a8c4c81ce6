//! Graph Runtime
//!
//! [`Graph`] is the entry point: it owns the evaluator and hands out
//! subscriptions. Cloning a `Graph` is cheap and every clone drives the same
//! state.
//!
//! # How It Works
//!
//! 1. All evaluation happens inside one [`Engine`] behind a mutex, so
//!    resolves, writes and subscription recomputations are totally ordered.
//!
//! 2. A write marks the written variable's dependents dirty and recomputes
//!    the subscriptions it reached before the lock is released. Their new
//!    results are queued in the [`Dispatcher`].
//!
//! 3. Queued results are delivered after the lock is released, so listeners
//!    are free to call back into the graph.
//!
//! # Async Computed Values
//!
//! Async computed nodes spawn their future on the tokio runtime. Results
//! come back over a channel and are applied by [`Graph::settle`], which
//! recomputes and notifies affected subscriptions like a write would.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use crate::config::GraphConfig;
use crate::error::GraphError;
use crate::node::build::ToNode;
use crate::node::{Reference, Value};
use crate::query::Query;
use crate::resolve::{Completion, Engine, GraphStats};
use crate::subscription::{Dispatcher, Emission, Subscription, SubscriptionId, SubscriptionState};

/// A reactive graph.
#[derive(Clone)]
pub struct Graph {
    inner: Arc<GraphInner>,
}

pub(crate) struct GraphInner {
    engine: Mutex<Engine>,
    dispatcher: Dispatcher,
    completions: tokio::sync::Mutex<mpsc::UnboundedReceiver<Completion>>,
}

impl Graph {
    /// Create a graph rooted at `root` with the default configuration.
    pub fn new(root: impl ToNode) -> Self {
        Self::with_config(root, GraphConfig::default())
    }

    pub fn with_config(root: impl ToNode, config: GraphConfig) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        debug!(?config, "creating graph");
        Self {
            inner: Arc::new(GraphInner {
                engine: Mutex::new(Engine::new(root.to_node(), config, sender)),
                dispatcher: Dispatcher::default(),
                completions: tokio::sync::Mutex::new(receiver),
            }),
        }
    }

    /// Run async computed values on `runtime` instead of the runtime
    /// current at the time they are first evaluated.
    pub fn set_runtime(&self, runtime: tokio::runtime::Handle) {
        self.inner.engine.lock().set_runtime(runtime);
    }

    pub fn config(&self) -> GraphConfig {
        self.inner.engine.lock().config().clone()
    }

    /// Resolve `query` against `target` once.
    ///
    /// Fails with [`GraphError::Pending`] if the result depends on an async
    /// computed value that has not completed; see [`Graph::resolve_async`].
    pub fn resolve(&self, target: &Reference, query: &Query) -> Result<Value, GraphError> {
        self.inner.engine.lock().resolve(target, query)
    }

    /// The fully materialized value at `target`.
    pub fn get(&self, target: &Reference) -> Result<Value, GraphError> {
        self.resolve(target, &Query::Value)
    }

    /// Resolve once, waiting for async computed values to complete.
    pub async fn resolve_async(&self, target: &Reference, query: &Query) -> Result<Value, GraphError> {
        loop {
            match self.resolve(target, query) {
                Err(GraphError::Pending) => {
                    if !self.settle_next().await {
                        return Err(GraphError::Pending);
                    }
                }
                result => return result,
            }
        }
    }

    /// Subscribe `on_next` to the result of `query` against `target`.
    ///
    /// The current result is delivered before this returns, unless it is
    /// still pending. After that, `on_next` is called once per write that
    /// changes the result.
    pub fn subscribe<F>(&self, target: Reference, query: Query, on_next: F) -> Subscription
    where
        F: Fn(Emission) + Send + Sync + 'static,
    {
        let id = SubscriptionId::new();
        self.inner.dispatcher.register(id, Arc::new(on_next));
        {
            let mut engine = self.inner.engine.lock();
            if let Some(emission) = engine.subscribe(id, target, query) {
                self.inner.dispatcher.enqueue([(id, emission)]);
            }
        }
        self.inner.dispatcher.drain();
        Subscription::new(id, Arc::downgrade(&self.inner))
    }

    /// Replace the contents of the variable at `target` with `node`.
    ///
    /// Affected subscriptions are recomputed and notified before this
    /// returns (unless called from inside a listener, in which case they
    /// are notified once the current listener returns).
    pub fn set(&self, target: &Reference, node: impl ToNode) -> Result<Value, GraphError> {
        let applied = {
            let mut engine = self.inner.engine.lock();
            let applied = engine.set(target, node.to_node());
            self.inner.dispatcher.enqueue(engine.flush());
            applied
        };
        self.inner.dispatcher.drain();
        applied
    }

    /// Apply several writes, recomputing affected subscriptions once at the
    /// end.
    ///
    /// Writes made before an error inside `f` stay applied.
    ///
    /// The graph is locked while `f` runs. Write through the [`Transaction`]
    /// only: calling [`Graph::set`], [`Graph::resolve`] or
    /// [`Graph::subscribe`] on this graph (or a clone of it) from inside `f`
    /// deadlocks.
    pub fn batch<T, F>(&self, f: F) -> Result<T, GraphError>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<T, GraphError>,
    {
        let result = {
            let mut engine = self.inner.engine.lock();
            let result = f(&mut Transaction { engine: &mut engine });
            self.inner.dispatcher.enqueue(engine.flush());
            result
        };
        self.inner.dispatcher.drain();
        result
    }

    /// Apply async completions until none are in flight.
    pub async fn settle(&self) {
        while self.settle_next().await {}
    }

    /// Wait for one async completion and apply it. Returns false if nothing
    /// is in flight.
    async fn settle_next(&self) -> bool {
        let pending = self.inner.engine.lock().pending_async();
        if pending == 0 {
            return false;
        }

        let completion = self.inner.completions.lock().await.recv().await;
        let Some(completion) = completion else {
            return false;
        };
        {
            let mut engine = self.inner.engine.lock();
            engine.apply_completion(completion);
            self.inner.dispatcher.enqueue(engine.flush());
        }
        self.inner.dispatcher.drain();
        true
    }

    /// Dispose transient instances no live subscription reaches. Returns the
    /// number disposed.
    pub fn collect_garbage(&self) -> usize {
        self.inner.engine.lock().collect_garbage()
    }

    pub fn stats(&self) -> GraphStats {
        self.inner.engine.lock().stats()
    }
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph").field("stats", &self.stats()).finish()
    }
}

impl GraphInner {
    pub(crate) fn unsubscribe(&self, id: SubscriptionId) {
        self.dispatcher.remove(id);
        self.engine.lock().unsubscribe(id);
    }

    pub(crate) fn subscription_state(&self, id: SubscriptionId) -> SubscriptionState {
        self.engine.lock().subscription_state(id)
    }
}

/// Writes and reads inside [`Graph::batch`].
pub struct Transaction<'a> {
    engine: &'a mut Engine,
}

impl Transaction<'_> {
    pub fn set(&mut self, target: &Reference, node: impl ToNode) -> Result<Value, GraphError> {
        self.engine.set(target, node.to_node())
    }

    /// Resolve against the state written so far.
    pub fn resolve(&mut self, target: &Reference, query: &Query) -> Result<Value, GraphError> {
        self.engine.resolve(target, query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::build::*;
    use futures_util::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> Graph {
        Graph::new(branch([("count", variable(0))]))
    }

    #[test]
    fn subscribe_emits_current_value_then_changes() {
        let graph = counter();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _sub = graph.subscribe(Reference::path(["count"]), Query::Value, move |emission| {
            sink.lock().push(emission);
        });

        graph.set(&Reference::path(["count"]), 1).unwrap();
        graph.set(&Reference::path(["count"]), 1).unwrap();
        graph.set(&Reference::path(["count"]), 2).unwrap();

        assert_eq!(
            *seen.lock(),
            vec![Ok(Value::Int(0)), Ok(Value::Int(1)), Ok(Value::Int(2))]
        );
    }

    #[test]
    fn batch_coalesces_writes() {
        let graph = counter();
        let emissions = Arc::new(AtomicUsize::new(0));
        let count = emissions.clone();
        let _sub = graph.subscribe(Reference::path(["count"]), Query::Value, move |_| {
            count.fetch_add(1, Ordering::SeqCst);
        });

        let last = graph
            .batch(|tx| {
                for n in 1..=5 {
                    tx.set(&Reference::path(["count"]), n)?;
                }
                tx.resolve(&Reference::path(["count"]), &Query::Value)
            })
            .unwrap();

        assert_eq!(last, Value::Int(5));
        assert_eq!(emissions.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn batch_reads_see_their_own_writes() {
        let graph = Graph::new(branch([
            ("a", variable(1)),
            ("b", variable(2)),
            (
                "sum",
                computed(vec![path(["a"]), path(["b"])], |inputs| {
                    Ok(Value::Int(inputs.iter().filter_map(Value::as_i64).sum()))
                }),
            ),
        ]));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _sum = graph.subscribe(Reference::path(["sum"]), Query::Value, move |emission| {
            sink.lock().push(emission);
        });

        let inside = graph
            .batch(|tx| {
                tx.set(&Reference::path(["a"]), 10)?;
                let halfway = tx.resolve(&Reference::path(["sum"]), &Query::Value)?;
                tx.set(&Reference::path(["b"]), 20)?;
                Ok(halfway)
            })
            .unwrap();

        assert_eq!(inside, Value::Int(12));
        assert_eq!(*seen.lock(), vec![Ok(Value::Int(3)), Ok(Value::Int(30))]);
    }

    #[test]
    fn dropping_the_handle_unsubscribes() {
        let graph = counter();
        let emissions = Arc::new(AtomicUsize::new(0));
        let count = emissions.clone();
        let sub = graph.subscribe(Reference::path(["count"]), Query::Value, move |_| {
            count.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(sub.state(), SubscriptionState::Active);
        drop(sub);

        graph.set(&Reference::path(["count"]), 3).unwrap();
        assert_eq!(emissions.load(Ordering::SeqCst), 1);
        assert_eq!(graph.stats().subscriptions, 0);
    }

    #[test]
    fn listeners_may_write_back() {
        let graph = Graph::new(branch([("a", variable(0)), ("b", variable(0))]));
        let writer = graph.clone();
        let _mirror = graph.subscribe(Reference::path(["a"]), Query::Value, move |emission| {
            if let Ok(value) = emission {
                let _ = writer.set(&Reference::path(["b"]), value);
            }
        });

        graph.set(&Reference::path(["a"]), 9).unwrap();
        assert_eq!(graph.get(&Reference::path(["b"])), Ok(Value::Int(9)));
    }

    #[tokio::test]
    async fn resolve_async_waits_for_completion() {
        let graph = Graph::new(branch([
            ("n", variable(20)),
            (
                "answer",
                computed_async(vec![path(["n"])], |inputs| {
                    async move {
                        tokio::task::yield_now().await;
                        Ok(Value::Int(inputs[0].as_i64().unwrap_or(0) + 22))
                    }
                    .boxed()
                }),
            ),
        ]));
        let answer = Reference::path(["answer"]);

        assert_eq!(graph.get(&answer), Err(GraphError::Pending));
        assert_eq!(graph.resolve_async(&answer, &Query::Value).await, Ok(Value::Int(42)));
        assert_eq!(graph.stats().pending_async, 0);
    }
}
