//! Scope Stack
//!
//! Scopes carry lexically injected context (named bindings) into nested
//! subgraphs. A scope is a chain of frames: lookup walks outward from the
//! innermost frame, so the most recently pushed binding for a name shadows
//! any outer one.
//!
//! # Identity
//!
//! Scope identity is part of instance identity, so it has to be stable:
//! evaluating the same scope wrapper under the same parent twice must yield
//! the same [`ScopeId`], otherwise cached instances and variable state would
//! be lost on every recomputation. Frames are therefore interned by
//! `(parent, origin)`, where the origin names what introduced the frame.
//!
//! Scope chains are explicit values threaded through every resolution call.
//! Nothing here is ambient or global.
//!
//! # Lifetime
//!
//! Frames no live state refers to are dropped by [`ScopeStack::retain_reachable`].
//! Identifiers are never reused, so a dropped frame cannot be confused with a
//! later one.

use std::collections::{HashMap, HashSet};

use smallvec::SmallVec;

use crate::error::GraphError;
use crate::node::{DefId, Handle};
use crate::pipeline::OutputKey;

/// Identity of a scope chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u32);

impl ScopeId {
    /// The empty scope every graph starts in.
    pub const ROOT: ScopeId = ScopeId(0);

    pub(crate) fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u32 {
        self.0
    }

    pub fn is_root(&self) -> bool {
        *self == Self::ROOT
    }
}

/// What introduced a scope frame.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum FrameOrigin {
    /// A scope wrapper node.
    Wrapper(DefId),
    /// An undeclared key looked up on a branch with a catch-all child.
    Param { branch: DefId, key: String },
    /// The output of a transform function for one item.
    Output(OutputKey),
}

/// Bindings introduced by a single frame.
pub(crate) type Bindings = SmallVec<[(String, Handle); 2]>;

#[derive(Debug)]
struct Frame {
    parent: Option<ScopeId>,
    bindings: Bindings,
}

/// Arena of interned scope frames.
#[derive(Debug)]
pub struct ScopeStack {
    frames: HashMap<ScopeId, Frame>,
    interned: HashMap<(ScopeId, FrameOrigin), ScopeId>,
    next: u32,
}

impl ScopeStack {
    pub fn new() -> Self {
        let root = Frame {
            parent: None,
            bindings: Bindings::new(),
        };
        Self {
            frames: HashMap::from([(ScopeId::ROOT, root)]),
            interned: HashMap::new(),
            next: 1,
        }
    }

    /// Push a frame on top of `parent`.
    ///
    /// Returns the existing scope if this origin was already pushed on this
    /// parent; `bindings` is only invoked for new frames. Fails once the
    /// identifier space is exhausted.
    pub(crate) fn push<F>(&mut self, parent: ScopeId, origin: FrameOrigin, bindings: F) -> Result<ScopeId, GraphError>
    where
        F: FnOnce() -> Bindings,
    {
        if let Some(existing) = self.interned.get(&(parent, origin.clone())) {
            return Ok(*existing);
        }

        let id = ScopeId(self.next);
        self.next = self
            .next
            .checked_add(1)
            .ok_or_else(|| GraphError::evaluation("scope identifiers exhausted"))?;
        self.frames.insert(
            id,
            Frame {
                parent: Some(parent),
                bindings: bindings(),
            },
        );
        self.interned.insert((parent, origin), id);
        Ok(id)
    }

    /// Look up `name`, innermost frame first.
    pub fn resolve_context(&self, scope: ScopeId, name: &str) -> Option<Handle> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let frame = self.frames.get(&id)?;
            if let Some((_, handle)) = frame.bindings.iter().rev().find(|(key, _)| key == name) {
                return Some(handle.clone());
            }
            current = frame.parent;
        }
        None
    }

    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.frames.get(&scope).and_then(|frame| frame.parent)
    }

    /// Number of frames between `scope` and the root.
    #[cfg(test)]
    pub fn depth(&self, scope: ScopeId) -> usize {
        let mut depth = 0;
        let mut current = self.parent(scope);
        while let Some(id) = current {
            depth += 1;
            current = self.parent(id);
        }
        depth
    }

    /// Drop every frame that is not in `roots`, an ancestor of one, or
    /// referenced by the bindings of a kept frame. The root frame is always
    /// kept. Returns the number of frames dropped.
    pub(crate) fn retain_reachable<I>(&mut self, roots: I) -> usize
    where
        I: IntoIterator<Item = ScopeId>,
    {
        let mut live = HashSet::from([ScopeId::ROOT]);
        let mut stack: Vec<ScopeId> = roots.into_iter().collect();
        while let Some(id) = stack.pop() {
            if !live.insert(id) {
                continue;
            }
            if let Some(frame) = self.frames.get(&id) {
                stack.extend(frame.parent);
                stack.extend(frame.bindings.iter().map(|(_, handle)| handle.scope));
            }
        }

        let before = self.frames.len();
        self.frames.retain(|id, _| live.contains(id));
        self.interned
            .retain(|(parent, _), id| live.contains(parent) && live.contains(&*id));
        before - self.frames.len()
    }

    /// Total number of frames, including the root.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::build::value;
    use smallvec::smallvec;

    fn binding(name: &str, v: &str, scope: ScopeId) -> Bindings {
        smallvec![(name.to_string(), Handle::new(value(v), scope))]
    }

    fn bound_value(stack: &ScopeStack, scope: ScopeId, name: &str) -> Option<String> {
        stack.resolve_context(scope, name).map(|handle| match handle.def.kind() {
            crate::node::NodeKind::Value(v) => v.to_string(),
            other => other.name().to_string(),
        })
    }

    #[test]
    fn lookup_walks_outward() {
        let mut stack = ScopeStack::new();
        let outer = stack
            .push(ScopeId::ROOT, FrameOrigin::Wrapper(DefId::new()), || {
                binding("outer", "o", ScopeId::ROOT)
            })
            .unwrap();
        let inner = stack
            .push(outer, FrameOrigin::Wrapper(DefId::new()), || binding("inner", "i", outer))
            .unwrap();

        assert_eq!(bound_value(&stack, inner, "inner").as_deref(), Some("i"));
        assert_eq!(bound_value(&stack, inner, "outer").as_deref(), Some("o"));
        assert_eq!(bound_value(&stack, outer, "inner"), None);
        assert_eq!(stack.depth(inner), 2);
    }

    #[test]
    fn inner_bindings_shadow_outer_ones() {
        let mut stack = ScopeStack::new();
        let outer = stack
            .push(ScopeId::ROOT, FrameOrigin::Wrapper(DefId::new()), || {
                binding("key", "outer", ScopeId::ROOT)
            })
            .unwrap();
        let inner = stack
            .push(outer, FrameOrigin::Wrapper(DefId::new()), || binding("key", "inner", outer))
            .unwrap();

        assert_eq!(bound_value(&stack, inner, "key").as_deref(), Some("inner"));
        assert_eq!(bound_value(&stack, outer, "key").as_deref(), Some("outer"));
    }

    #[test]
    fn frames_are_interned_by_parent_and_origin() {
        let mut stack = ScopeStack::new();
        let origin = FrameOrigin::Wrapper(DefId::new());
        let first = stack.push(ScopeId::ROOT, origin.clone(), Bindings::new).unwrap();
        let again = stack
            .push(ScopeId::ROOT, origin.clone(), || {
                panic!("bindings must not be rebuilt for an interned frame")
            })
            .unwrap();
        assert_eq!(first, again);

        let elsewhere = stack.push(first, origin, Bindings::new).unwrap();
        assert_ne!(first, elsewhere);
        assert_eq!(stack.len(), 3);
    }

    #[test]
    fn sibling_scopes_do_not_leak() {
        let mut stack = ScopeStack::new();
        let branch = DefId::new();
        let admin = stack.push(
            ScopeId::ROOT,
            FrameOrigin::Param {
                branch,
                key: "admin".to_string(),
            },
            || binding("type", "admin", ScopeId::ROOT),
        )
        .unwrap();
        let guest = stack.push(
            ScopeId::ROOT,
            FrameOrigin::Param {
                branch,
                key: "guest".to_string(),
            },
            || binding("type", "guest", ScopeId::ROOT),
        )
        .unwrap();

        assert_ne!(admin, guest);
        assert_eq!(bound_value(&stack, admin, "type").as_deref(), Some("admin"));
        assert_eq!(bound_value(&stack, guest, "type").as_deref(), Some("guest"));
    }

    #[test]
    fn unreachable_frames_are_dropped() {
        let mut stack = ScopeStack::new();
        let kept = stack.push(ScopeId::ROOT, FrameOrigin::Wrapper(DefId::new()), Bindings::new).unwrap();
        let child = stack.push(kept, FrameOrigin::Wrapper(DefId::new()), Bindings::new).unwrap();
        let origin = FrameOrigin::Wrapper(DefId::new());
        let dropped = stack.push(ScopeId::ROOT, origin.clone(), Bindings::new).unwrap();

        assert_eq!(stack.retain_reachable([child]), 1);
        assert_eq!(stack.len(), 3);
        assert_eq!(stack.parent(child), Some(kept));

        // A dropped origin pushed again gets a fresh identifier.
        let again = stack.push(ScopeId::ROOT, origin, Bindings::new).unwrap();
        assert_ne!(again, dropped);
    }

    #[test]
    fn bindings_keep_the_scopes_they_point_into() {
        let mut stack = ScopeStack::new();
        let source = stack.push(ScopeId::ROOT, FrameOrigin::Wrapper(DefId::new()), Bindings::new).unwrap();
        let bound = stack
            .push(ScopeId::ROOT, FrameOrigin::Wrapper(DefId::new()), || binding("x", "v", source))
            .unwrap();

        assert_eq!(stack.retain_reachable([bound]), 0);
        assert_eq!(stack.len(), 3);
    }

    #[test]
    fn exhausted_identifiers_are_an_error() {
        let mut stack = ScopeStack::new();
        stack.next = u32::MAX;
        let result = stack.push(ScopeId::ROOT, FrameOrigin::Wrapper(DefId::new()), Bindings::new);
        assert!(matches!(result, Err(GraphError::Evaluation { .. })));
        assert_eq!(stack.len(), 1);
    }
}
