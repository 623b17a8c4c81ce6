//! References
//!
//! A [`Reference`] is a path through the graph: a starting point followed by
//! segments. Key segments walk branch children; positional segments
//! (`first`, `last`, `nth`, `length`) walk collections. Wrapper nodes along
//! the way (scopes, variables, references) are passed through without
//! changing the logical address.

use std::fmt;

use super::def::Def;

/// Where a reference starts.
#[derive(Debug, Clone)]
pub enum RefRoot {
    /// The graph's root node.
    Graph,
    /// An arbitrary node, evaluated in the scope of the reference itself.
    Node(Def),
}

/// One step of a reference path.
#[derive(Debug, Clone)]
pub enum PathSegment {
    /// A branch child by name.
    Key(String),
    /// A key computed from a node: a string value selects a branch child,
    /// an integer value an item index.
    Dynamic(Def),
    First,
    Last,
    /// Zero-based item index.
    Nth(usize),
    /// Number of items in a collection.
    Length,
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => f.write_str(key),
            PathSegment::Dynamic(_) => f.write_str("<dynamic>"),
            PathSegment::First => f.write_str("first()"),
            PathSegment::Last => f.write_str("last()"),
            PathSegment::Nth(n) => write!(f, "nth({n})"),
            PathSegment::Length => f.write_str("length()"),
        }
    }
}

/// A path into the graph.
///
/// ```rust,ignore
/// let name = Reference::root().key("items").first().key("name");
/// ```
#[derive(Debug, Clone)]
pub struct Reference {
    pub root: RefRoot,
    pub path: Vec<PathSegment>,
}

impl Reference {
    /// A reference to the graph root.
    pub fn root() -> Self {
        Self {
            root: RefRoot::Graph,
            path: Vec::new(),
        }
    }

    /// A reference starting at `node`.
    pub fn from_node(node: Def) -> Self {
        Self {
            root: RefRoot::Node(node),
            path: Vec::new(),
        }
    }

    /// A reference to the graph root followed by branch keys.
    pub fn path<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        keys.into_iter()
            .fold(Self::root(), |reference, key| reference.key(key))
    }

    pub fn segment(mut self, segment: PathSegment) -> Self {
        self.path.push(segment);
        self
    }

    pub fn key(self, key: impl Into<String>) -> Self {
        self.segment(PathSegment::Key(key.into()))
    }

    pub fn dynamic(self, key: Def) -> Self {
        self.segment(PathSegment::Dynamic(key))
    }

    pub fn first(self) -> Self {
        self.segment(PathSegment::First)
    }

    pub fn last(self) -> Self {
        self.segment(PathSegment::Last)
    }

    pub fn nth(self, index: usize) -> Self {
        self.segment(PathSegment::Nth(index))
    }

    pub fn length(self) -> Self {
        self.segment(PathSegment::Length)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.root {
            RefRoot::Graph => f.write_str("$")?,
            RefRoot::Node(def) => write!(f, "<{}#{}>", def.kind().name(), def.id().raw())?,
        }
        for segment in &self.path {
            write!(f, ".{segment}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fluent_paths_render_in_order() {
        let reference = Reference::path(["items"]).first().key("name");
        assert_eq!(reference.to_string(), "$.items.first().name");
        assert_eq!(reference.path.len(), 3);
    }

    #[test]
    fn empty_reference_is_the_root() {
        let reference = Reference::root();
        assert!(matches!(reference.root, RefRoot::Graph));
        assert!(reference.path.is_empty());
        assert_eq!(reference.to_string(), "$");
    }
}
