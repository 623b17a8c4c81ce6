//! Resolver
//!
//! The [`Engine`] turns definitions into results. It owns every piece of
//! live state in a graph: variable contents, cached evaluations of computed
//! values and collection pipelines, async computations in flight, transform
//! outputs, the scope stack, and the dependency graph connecting all of it
//! to the subscriptions that read it.
//!
//! # Evaluation
//!
//! [`Engine::eval`] maps a [`Handle`] to a [`Resolved`]. Pass-through nodes
//! (references, scope wrappers, context lookups, bound items, variables)
//! evaluate to whatever they lead to. Cached nodes (computed values, async
//! computed values, collections) are evaluated inside a tracking frame; the
//! reads made during evaluation become the instance's dependency set, and
//! the result is reused until one of those dependencies changes.
//!
//! # Writes
//!
//! [`Engine::set`] replaces a variable's contents and marks everything
//! downstream of it dirty. Subscriptions reached that way are queued and
//! recomputed by [`Engine::flush`], in creation order.

mod locate;
mod owned;
mod tracker;

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, trace, warn};

use crate::config::GraphConfig;
use crate::error::GraphError;
use crate::graph::{DepKey, DepKind, UpdateScheduler};
use crate::node::{AsyncComputed, Computed, Def, Handle, InstanceKey, NodeKind, Reference, Value};
use crate::query::Query;
use crate::scope::{ScopeId, ScopeStack};
use crate::subscription::{Emission, SubscriptionId, SubscriptionState};

pub(crate) use owned::LiteralSlot;
pub(crate) use tracker::Tracker;

/// Items of a collection, shared between the cache and readers.
pub(crate) type Items = Arc<Vec<Handle>>;

/// The outcome of evaluating one instance.
#[derive(Debug, Clone)]
pub(crate) enum Resolved {
    Value(Value),
    Branch(Handle),
    Collection(Items),
    Transform(Handle),
    Failed(GraphError),
    Pending,
}

impl Resolved {
    pub fn from_error(err: GraphError) -> Self {
        match err {
            GraphError::Pending => Resolved::Pending,
            err => Resolved::Failed(err),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Resolved::Value(value) => value.kind_name(),
            Resolved::Branch(_) => "branch",
            Resolved::Collection(_) => "collection",
            Resolved::Transform(_) => "transform",
            Resolved::Failed(_) => "error",
            Resolved::Pending => "pending",
        }
    }
}

/// The result of an async computation, delivered back to the engine.
#[derive(Debug)]
pub(crate) struct Completion {
    key: InstanceKey,
    generation: u64,
    result: Result<Value, String>,
}

/// Last inputs and output of a computed instance.
#[derive(Debug)]
struct Memo {
    inputs: Vec<Value>,
    output: Resolved,
}

#[derive(Debug)]
enum AsyncStatus {
    Running,
    Ready(Resolved),
}

#[derive(Debug)]
struct AsyncState {
    generation: u64,
    inputs: Vec<Value>,
    status: AsyncStatus,
}

#[derive(Debug)]
struct SubscriptionEntry {
    target: Arc<Reference>,
    query: Arc<Query>,
    last: Option<Emission>,
    state: SubscriptionState,
}

/// Counts of live state, for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct GraphStats {
    pub subscriptions: usize,
    pub variables: usize,
    pub cached_instances: usize,
    pub transform_outputs: usize,
    pub pending_async: usize,
    pub dependency_nodes: usize,
    pub scopes: usize,
}

pub(crate) struct Engine {
    config: GraphConfig,
    root: Def,
    pub(crate) scopes: ScopeStack,
    scheduler: UpdateScheduler,
    pub(crate) tracker: Tracker,
    depth: usize,

    variables: HashMap<InstanceKey, Def>,
    cache: HashMap<InstanceKey, Resolved>,
    memos: HashMap<InstanceKey, Memo>,
    asyncs: HashMap<InstanceKey, AsyncState>,
    /// Shared by every async instance, so a completion from a disposed
    /// computation never matches its replacement.
    generations: u64,
    owned: HashMap<DepKey, owned::Owned>,

    subscriptions: BTreeMap<SubscriptionId, SubscriptionEntry>,
    dirty_subscriptions: BTreeSet<SubscriptionId>,

    completions: UnboundedSender<Completion>,
    runtime: Option<tokio::runtime::Handle>,
}

impl Engine {
    pub fn new(root: Def, config: GraphConfig, completions: UnboundedSender<Completion>) -> Self {
        Self {
            config,
            root,
            scopes: ScopeStack::new(),
            scheduler: UpdateScheduler::new(),
            tracker: Tracker::default(),
            depth: 0,
            variables: HashMap::new(),
            cache: HashMap::new(),
            memos: HashMap::new(),
            asyncs: HashMap::new(),
            generations: 0,
            owned: HashMap::new(),
            subscriptions: BTreeMap::new(),
            dirty_subscriptions: BTreeSet::new(),
            completions,
            runtime: None,
        }
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn set_runtime(&mut self, runtime: tokio::runtime::Handle) {
        self.runtime = Some(runtime);
    }

    /// Evaluate one instance.
    pub fn eval(&mut self, handle: &Handle) -> Resolved {
        if let Err(err) = self.descend(handle.def.kind().name()) {
            return Resolved::Failed(err);
        }
        let resolved = self.eval_node(handle);
        self.ascend();
        resolved
    }

    /// Enter one level of nested evaluation, failing past the configured
    /// maximum depth.
    pub(crate) fn descend(&mut self, what: &'static str) -> Result<(), GraphError> {
        if self.depth >= self.config.max_depth {
            warn!(depth = self.depth, node = what, "maximum resolution depth exceeded");
            return Err(GraphError::evaluation(format!(
                "maximum resolution depth of {} exceeded",
                self.config.max_depth
            )));
        }
        self.depth += 1;
        Ok(())
    }

    pub(crate) fn ascend(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn eval_node(&mut self, handle: &Handle) -> Resolved {
        let def = handle.def.clone();
        let scope = handle.scope;
        match def.kind() {
            NodeKind::Value(value) => Resolved::Value(value.clone()),
            NodeKind::Branch(_) => Resolved::Branch(handle.clone()),
            NodeKind::Transform(_) => Resolved::Transform(handle.clone()),
            NodeKind::Array(items) => Resolved::Collection(Arc::new(
                items
                    .iter()
                    .map(|item| Handle::new(item.clone(), scope))
                    .collect(),
            )),
            NodeKind::Ref(reference) => match self.locate(reference, scope) {
                Ok(Some(target)) => self.eval(&target),
                Ok(None) => Resolved::Value(Value::Absent),
                Err(err) => Resolved::from_error(err),
            },
            NodeKind::Scope(node) => match self.enter_scope(&def, node, scope) {
                Ok(inner) => self.eval(&Handle::new(node.body.clone(), inner)),
                Err(err) => Resolved::from_error(err),
            },
            NodeKind::Context(name) => match self.scopes.resolve_context(scope, name) {
                Some(bound) => self.eval(&bound),
                None => {
                    trace!(name = %name, scope = scope.raw(), "unbound context name");
                    Resolved::Value(Value::Absent)
                }
            },
            NodeKind::Bound(inner) => self.eval(inner),
            NodeKind::Variable(initial) => self.read_variable(handle, initial),
            NodeKind::Computed(computed) => {
                self.cached(handle, |engine| engine.eval_computed(handle, computed))
            }
            NodeKind::Async(node) => self.cached(handle, |engine| engine.eval_async(handle, node)),
            NodeKind::Collection(collection) => {
                self.cached(handle, |engine| engine.eval_collection(handle, collection))
            }
            NodeKind::Query(node) => {
                match self.resolve_reference(&node.target, scope, &node.query) {
                    Ok(value) => Resolved::Value(value),
                    Err(err) => Resolved::from_error(err),
                }
            }
        }
    }

    /// Evaluate a cached instance, reusing the previous result while none
    /// of its dependencies changed.
    fn cached<F>(&mut self, handle: &Handle, evaluate: F) -> Resolved
    where
        F: FnOnce(&mut Self) -> Resolved,
    {
        let instance = handle.key();
        let key = DepKey::Instance(instance);
        self.tracker.record(key);

        if self.scheduler.is_clean(key) {
            if let Some(hit) = self.cache.get(&instance) {
                return hit.clone();
            }
        }
        if self.tracker.is_active(key) {
            warn!(node = handle.def.kind().name(), "cyclic dependency detected");
            return Resolved::Failed(GraphError::evaluation(format!(
                "cyclic dependency through a {} node",
                handle.def.kind().name()
            )));
        }

        trace!(node = handle.def.kind().name(), scope = handle.scope.raw(), "evaluating");
        self.scheduler.ensure_node(key, DepKind::Derived);
        self.tracker.enter(key);
        self.begin_owned(key);
        let resolved = evaluate(self);
        self.finish_owned(key, !matches!(resolved, Resolved::Failed(_) | Resolved::Pending));
        let reads = self.tracker.exit();
        self.scheduler.set_dependencies(key, reads);
        self.scheduler.mark_clean(key);
        self.cache.insert(instance, resolved.clone());
        resolved
    }

    fn read_variable(&mut self, handle: &Handle, initial: &Def) -> Resolved {
        let instance = handle.key();
        let key = DepKey::Instance(instance);
        self.scheduler.ensure_node(key, DepKind::Source);
        self.tracker.record(key);
        let current = self
            .variables
            .entry(instance)
            .or_insert_with(|| initial.clone())
            .clone();
        self.eval(&Handle::new(current, handle.scope))
    }

    fn resolve_inputs(&mut self, inputs: &[Def], scope: ScopeId) -> Result<Vec<Value>, GraphError> {
        inputs
            .iter()
            .map(|input| self.materialize(&Handle::new(input.clone(), scope)))
            .collect()
    }

    fn eval_computed(&mut self, handle: &Handle, computed: &Computed) -> Resolved {
        let inputs = match self.resolve_inputs(&computed.inputs, handle.scope) {
            Ok(inputs) => inputs,
            Err(err) => return Resolved::from_error(err),
        };

        let key = handle.key();
        if let Some(memo) = self.memos.get(&key) {
            if memo.inputs == inputs {
                trace!("computed inputs unchanged, reusing output");
                return memo.output.clone();
            }
        }

        let output = match computed.func.call(&inputs) {
            Ok(value) => Resolved::Value(value),
            Err(message) => {
                debug!(error = %message, "computed function failed");
                Resolved::Failed(GraphError::Evaluation { message })
            }
        };
        self.memos.insert(
            key,
            Memo {
                inputs,
                output: output.clone(),
            },
        );
        output
    }

    fn eval_async(&mut self, handle: &Handle, node: &AsyncComputed) -> Resolved {
        let inputs = match self.resolve_inputs(&node.inputs, handle.scope) {
            Ok(inputs) => inputs,
            Err(err) => return Resolved::from_error(err),
        };

        let key = handle.key();
        let generation = match self.asyncs.get(&key) {
            Some(state) if state.inputs == inputs => {
                return match &state.status {
                    AsyncStatus::Running => Resolved::Pending,
                    AsyncStatus::Ready(resolved) => resolved.clone(),
                };
            }
            _ => self.next_generation(),
        };

        let Some(runtime) = self
            .runtime
            .clone()
            .or_else(|| tokio::runtime::Handle::try_current().ok())
        else {
            return Resolved::Failed(GraphError::evaluation(
                "async computed values need a tokio runtime",
            ));
        };

        debug!(generation, "starting async computation");
        let future = node.func.call(inputs.clone());
        let completions = self.completions.clone();
        runtime.spawn(async move {
            let result = future.await;
            // The receiver is gone only if the graph was dropped.
            let _ = completions.send(Completion {
                key,
                generation,
                result,
            });
        });

        self.asyncs.insert(
            key,
            AsyncState {
                generation,
                inputs,
                status: AsyncStatus::Running,
            },
        );
        Resolved::Pending
    }

    fn next_generation(&mut self) -> u64 {
        self.generations += 1;
        self.generations
    }

    /// Store the result of an async computation and invalidate its readers.
    pub fn apply_completion(&mut self, completion: Completion) {
        let Some(state) = self.asyncs.get_mut(&completion.key) else {
            trace!("dropping completion for a disposed instance");
            return;
        };
        if state.generation != completion.generation {
            trace!(
                generation = completion.generation,
                current = state.generation,
                "dropping stale completion"
            );
            return;
        }

        state.status = AsyncStatus::Ready(match completion.result {
            Ok(value) => Resolved::Value(value),
            Err(message) => Resolved::Failed(GraphError::Evaluation { message }),
        });
        let key = DepKey::Instance(completion.key);
        self.scheduler.mark_dirty(key);
        let affected = self.scheduler.mark_changed(key);
        debug!(affected = affected.len(), "async computation completed");
        self.dirty_subscriptions.extend(affected);
    }

    pub fn pending_async(&self) -> usize {
        self.asyncs
            .values()
            .filter(|state| matches!(state.status, AsyncStatus::Running))
            .count()
    }

    /// Replace the contents of the variable `target` leads to.
    ///
    /// Returns the fully resolved value that was written.
    pub fn set(&mut self, target: &Reference, node: Def) -> Result<Value, GraphError> {
        self.one_shot(|engine| engine.write(target, node))
    }

    fn write(&mut self, target: &Reference, node: Def) -> Result<Value, GraphError> {
        let located = self
            .locate(target, ScopeId::ROOT)?
            .ok_or_else(|| GraphError::Addressing {
                path: target.to_string(),
            })?;
        let variable = self.settable(located)?;

        let instance = variable.key();
        debug!(target = %target, scope = variable.scope.raw(), "writing variable");
        self.variables.insert(instance, node.clone());

        let key = DepKey::Instance(instance);
        self.scheduler.ensure_node(key, DepKind::Source);
        let affected = self.scheduler.mark_changed(key);
        trace!(affected = affected.len(), "invalidated subscriptions");
        self.dirty_subscriptions.extend(affected);

        self.materialize(&Handle::new(node, variable.scope))
    }

    /// One-shot resolution of `query` against `target`. Nothing it reads
    /// becomes a dependency.
    pub fn resolve(&mut self, target: &Reference, query: &Query) -> Result<Value, GraphError> {
        self.one_shot(|engine| engine.resolve_reference(target, ScopeId::ROOT, query))
    }

    pub fn subscribe(&mut self, id: SubscriptionId, target: Reference, query: Query) -> Option<Emission> {
        debug!(subscription = id.raw(), target = %target, "subscribing");
        self.subscriptions.insert(
            id,
            SubscriptionEntry {
                target: Arc::new(target),
                query: Arc::new(query),
                last: None,
                state: SubscriptionState::Active,
            },
        );
        self.recompute(id)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        if self.subscriptions.remove(&id).is_none() {
            return false;
        }
        self.dirty_subscriptions.remove(&id);
        self.scheduler.remove_node(DepKey::Subscription(id));
        debug!(subscription = id.raw(), "unsubscribed");

        if self.config.collect_on_unsubscribe {
            self.collect_garbage();
        }
        true
    }

    pub fn subscription_state(&self, id: SubscriptionId) -> SubscriptionState {
        self.subscriptions
            .get(&id)
            .map_or(SubscriptionState::Disposed, |entry| entry.state)
    }

    /// Recompute every subscription invalidated since the last flush.
    ///
    /// Returns the emissions to deliver, in subscription creation order.
    pub fn flush(&mut self) -> Vec<(SubscriptionId, Emission)> {
        let dirty = std::mem::take(&mut self.dirty_subscriptions);
        dirty
            .into_iter()
            .filter_map(|id| self.recompute(id).map(|emission| (id, emission)))
            .collect()
    }

    fn recompute(&mut self, id: SubscriptionId) -> Option<Emission> {
        let entry = self.subscriptions.get_mut(&id)?;
        entry.state = SubscriptionState::Recomputing;
        let target = Arc::clone(&entry.target);
        let query = Arc::clone(&entry.query);

        let key = DepKey::Subscription(id);
        self.scheduler.ensure_node(key, DepKind::Subscriber);
        self.tracker.enter(key);
        self.begin_owned(key);
        let result = self.resolve_reference(&target, ScopeId::ROOT, &query);
        self.finish_owned(key, result.is_ok());
        let reads = self.tracker.exit();
        self.scheduler.set_dependencies(key, reads);
        self.scheduler.mark_clean(key);

        let entry = self.subscriptions.get_mut(&id)?;
        entry.state = SubscriptionState::Active;
        match result {
            Err(GraphError::Pending) => {
                trace!(subscription = id.raw(), "result pending, emission deferred");
                None
            }
            result if entry.last.as_ref() == Some(&result) => {
                trace!(subscription = id.raw(), "result unchanged");
                None
            }
            result => {
                entry.last = Some(result.clone());
                Some(result)
            }
        }
    }

    /// Dispose transient state no live subscription can reach.
    ///
    /// Variables in the root scope persist for the lifetime of the graph.
    /// Everything else (caches, memos, async state, transform outputs and
    /// variables inside them) is dropped once unreachable and recreated
    /// from its definition on the next read. Scope frames nothing kept
    /// refers to go last.
    pub fn collect_garbage(&mut self) -> usize {
        let roots: Vec<DepKey> = self.scheduler.subscribers().collect();
        let live: HashSet<DepKey> = self.scheduler.reachable_from(roots);
        let is_live = |key: &InstanceKey| live.contains(&DepKey::Instance(*key));

        let before = self.variables.len()
            + self.cache.len()
            + self.memos.len()
            + self.asyncs.len()
            + self.output_count();

        self.variables
            .retain(|key, _| key.scope.is_root() || is_live(key));
        self.cache.retain(|key, _| is_live(key));
        self.memos.retain(|key, _| is_live(key));
        self.asyncs.retain(|key, _| is_live(key));
        self.owned.retain(|owner, _| live.contains(owner));

        let after = self.variables.len()
            + self.cache.len()
            + self.memos.len()
            + self.asyncs.len()
            + self.output_count();
        let dropped_nodes = self.scheduler.retain(|key| live.contains(key));

        let roots = self.scope_roots();
        let dropped_scopes = self.scopes.retain_reachable(roots);

        let disposed = before - after;
        debug!(disposed, dropped_nodes, dropped_scopes, live = live.len(), "collected garbage");
        disposed
    }

    /// Scopes referenced by any state still held.
    fn scope_roots(&self) -> Vec<ScopeId> {
        let keyed = self
            .variables
            .keys()
            .chain(self.cache.keys())
            .chain(self.memos.keys())
            .chain(self.asyncs.keys())
            .map(|key| key.scope);
        let cached = self.cache.values().flat_map(|resolved| match resolved {
            Resolved::Branch(handle) | Resolved::Transform(handle) => vec![handle.scope],
            Resolved::Collection(items) => items.iter().map(|item| item.scope).collect(),
            _ => Vec::new(),
        });
        let owners = self.owned.keys().filter_map(|owner| owner.instance()).map(|key| key.scope);
        let owned = self.owned.values().flat_map(|owned| owned.scopes());
        let dependencies = self
            .scheduler
            .keys()
            .filter_map(|key| key.instance())
            .map(|key| key.scope);

        keyed
            .chain(cached)
            .chain(owners)
            .chain(owned)
            .chain(dependencies)
            .collect()
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            subscriptions: self.subscriptions.len(),
            variables: self.variables.len(),
            cached_instances: self.cache.len(),
            transform_outputs: self.output_count(),
            pending_async: self.pending_async(),
            dependency_nodes: self.scheduler.node_count(),
            scopes: self.scopes.len(),
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::build::*;
    use futures_util::FutureExt;
    use tokio::sync::mpsc;

    fn engine(root: Def) -> Engine {
        let (tx, _rx) = mpsc::unbounded_channel();
        Engine::new(root, GraphConfig::default(), tx)
    }

    #[test]
    fn computed_values_are_cached_until_an_input_changes() {
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = calls.clone();
        let root = branch([
            ("n", variable(2)),
            (
                "double",
                computed(vec![path(["n"])], move |inputs| {
                    counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    Ok(Value::Int(inputs[0].as_i64().unwrap_or(0) * 2))
                }),
            ),
        ]);
        let mut engine = engine(root);
        let double = Reference::path(["double"]);
        let id = SubscriptionId::new();

        assert_eq!(engine.subscribe(id, double.clone(), Query::Value), Some(Ok(Value::Int(4))));
        assert_eq!(engine.resolve(&double, &Query::Value), Ok(Value::Int(4)));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);

        engine.set(&Reference::path(["n"]), value(5)).unwrap();
        assert_eq!(engine.flush(), vec![(id, Ok(Value::Int(10)))]);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[test]
    fn writes_only_reach_dependent_subscriptions() {
        let root = branch([("a", variable(1)), ("b", variable(2))]);
        let mut engine = engine(root);
        let on_a = SubscriptionId::new();
        let on_b = SubscriptionId::new();
        engine.subscribe(on_a, Reference::path(["a"]), Query::Value);
        engine.subscribe(on_b, Reference::path(["b"]), Query::Value);

        engine.set(&Reference::path(["b"]), value(3)).unwrap();
        assert_eq!(engine.flush(), vec![(on_b, Ok(Value::Int(3)))]);
    }

    #[test]
    fn unchanged_results_are_not_emitted() {
        let root = branch([
            ("n", variable(3)),
            (
                "odd",
                computed(vec![path(["n"])], |inputs| {
                    Ok(Value::Bool(inputs[0].as_i64().unwrap_or(0) % 2 == 1))
                }),
            ),
        ]);
        let mut engine = engine(root);
        let id = SubscriptionId::new();
        engine.subscribe(id, Reference::path(["odd"]), Query::Value);

        engine.set(&Reference::path(["n"]), value(5)).unwrap();
        assert!(engine.flush().is_empty());
        assert_eq!(engine.subscription_state(id), SubscriptionState::Active);
    }

    #[test]
    fn self_referencing_computed_fails_instead_of_looping() {
        let root = branch([(
            "loop",
            computed(vec![path(["loop"])], |inputs| Ok(inputs[0].clone())),
        )]);
        let mut engine = engine(root);
        let result = engine.resolve(&Reference::path(["loop"]), &Query::Value);
        assert!(matches!(result, Err(GraphError::Evaluation { .. })));
    }

    #[test]
    fn reference_cycles_hit_the_depth_limit() {
        let root = branch([("a", path(["b"])), ("b", path(["a"]))]);
        let mut engine = engine(root);
        let result = engine.resolve(&Reference::path(["a"]), &Query::Value);
        assert!(matches!(result, Err(GraphError::Evaluation { .. })));
        assert_eq!(engine.depth, 0);
    }

    #[test]
    fn garbage_collection_keeps_root_variables() {
        let root = branch([("n", variable(1))]);
        let mut engine = engine(root);
        let id = SubscriptionId::new();
        engine.subscribe(id, Reference::path(["n"]), Query::Value);
        engine.set(&Reference::path(["n"]), value(7)).unwrap();
        engine.flush();

        assert!(engine.unsubscribe(id));
        assert!(!engine.unsubscribe(id));
        assert_eq!(engine.subscription_state(id), SubscriptionState::Disposed);
        assert_eq!(engine.resolve(&Reference::path(["n"]), &Query::Value), Ok(Value::Int(7)));
        assert_eq!(engine.stats().dependency_nodes, 1);
    }

    #[test]
    fn async_without_runtime_fails() {
        let root = branch([(
            "slow",
            computed_async(vec![], |_| async { Ok(Value::Int(1)) }.boxed()),
        )]);
        let mut engine = engine(root);
        let result = engine.resolve(&Reference::path(["slow"]), &Query::Value);
        assert!(matches!(result, Err(GraphError::Evaluation { .. })));
    }
}
