//! Read Tracking
//!
//! The tracker records which instances are read while something is being
//! evaluated. This is what produces dependency sets: a cached instance or a
//! subscription enters a frame before evaluating and exits it afterwards,
//! collecting every variable and cached instance read in between.
//!
//! # Implementation
//!
//! The tracker is a stack of frames owned by the evaluator and passed
//! around with it, not an ambient thread-local. Nested evaluations (a
//! collection reading a computed value reading a variable) push nested
//! frames; each frame only sees its own direct reads.

use smallvec::SmallVec;

use crate::graph::DepKey;

type Reads = SmallVec<[DepKey; 8]>;

/// An entry in the tracking stack.
#[derive(Debug)]
struct Frame {
    /// The node whose dependencies are being collected.
    owner: DepKey,
    /// Dependencies read so far.
    reads: Reads,
}

#[derive(Debug, Default)]
pub(crate) struct Tracker {
    stack: Vec<Frame>,
}

impl Tracker {
    /// Start collecting reads on behalf of `owner`.
    pub fn enter(&mut self, owner: DepKey) {
        self.stack.push(Frame {
            owner,
            reads: Reads::new(),
        });
    }

    /// Stop collecting for the innermost owner and return its reads.
    pub fn exit(&mut self) -> Reads {
        self.stack.pop().map(|frame| frame.reads).unwrap_or_default()
    }

    /// Record a read in the innermost frame. Reads outside any frame are
    /// not tracked.
    pub fn record(&mut self, dependency: DepKey) {
        if let Some(frame) = self.stack.last_mut() {
            if frame.owner != dependency && !frame.reads.contains(&dependency) {
                frame.reads.push(dependency);
            }
        }
    }

    /// The innermost owner, if any.
    pub fn current(&self) -> Option<DepKey> {
        self.stack.last().map(|frame| frame.owner)
    }

    /// Whether `owner` is somewhere on the stack, i.e. evaluating it again
    /// would be a cycle.
    pub fn is_active(&self, owner: DepKey) -> bool {
        self.stack.iter().any(|frame| frame.owner == owner)
    }

    #[cfg(test)]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{DefId, InstanceKey};
    use crate::scope::ScopeId;
    use crate::subscription::SubscriptionId;

    fn instance() -> DepKey {
        DepKey::Instance(InstanceKey {
            def: DefId::new(),
            scope: ScopeId::ROOT,
        })
    }

    #[test]
    fn reads_outside_a_frame_are_ignored() {
        let mut tracker = Tracker::default();
        tracker.record(instance());
        assert_eq!(tracker.depth(), 0);
        assert!(tracker.exit().is_empty());
    }

    #[test]
    fn frames_collect_their_own_reads() {
        let mut tracker = Tracker::default();
        let outer = DepKey::Subscription(SubscriptionId::new());
        let inner = instance();
        let (a, b) = (instance(), instance());

        tracker.enter(outer);
        tracker.record(a);
        tracker.record(inner);

        tracker.enter(inner);
        tracker.record(b);
        tracker.record(b);
        assert_eq!(tracker.current(), Some(inner));
        assert_eq!(tracker.exit().as_slice(), &[b]);

        assert_eq!(tracker.current(), Some(outer));
        assert_eq!(tracker.exit().as_slice(), &[a, inner]);
        assert!(tracker.current().is_none());
    }

    #[test]
    fn detects_reentry() {
        let mut tracker = Tracker::default();
        let key = instance();
        tracker.enter(key);
        tracker.enter(instance());
        assert!(tracker.is_active(key));
        tracker.record(key);
        tracker.exit();
        tracker.exit();
        assert!(!tracker.is_active(key));
    }
}
