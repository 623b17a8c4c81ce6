//! Error Types
//!
//! Every failure the engine can report is a [`GraphError`]. Errors are plain
//! data: they are cloned into the resolved value of the node that produced
//! them and compared when deciding whether a subscription's result changed.
//!
//! Absent data (a missing key, an index past the end, a nil collection) is
//! never an error. It resolves to [`Value::Absent`](crate::node::Value::Absent).

use thiserror::Error;

/// Errors produced while resolving, querying or writing the graph.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    /// A path stepped into something that cannot be addressed, or a `set`
    /// target does not exist.
    #[error("path `{path}` does not terminate at a resolvable node")]
    Addressing { path: String },

    /// A `set` reached a node that is not a variable.
    #[error("cannot set a {kind} node: only variables are settable")]
    NotSettable { kind: &'static str },

    /// A computed function failed, or evaluation could not proceed.
    #[error("evaluation failed: {message}")]
    Evaluation { message: String },

    /// A transform or path step received a node of an incompatible kind.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: &'static str, found: String },

    /// An asynchronous computed value has not completed yet.
    #[error("value is not available yet")]
    Pending,
}

impl GraphError {
    pub(crate) fn evaluation(message: impl Into<String>) -> Self {
        Self::Evaluation {
            message: message.into(),
        }
    }

    pub(crate) fn mismatch(expected: &'static str, found: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected,
            found: found.into(),
        }
    }

    /// Whether this is the suspension marker rather than a real failure.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_render_their_context() {
        let err = GraphError::Addressing {
            path: "items.first().name".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "path `items.first().name` does not terminate at a resolvable node"
        );

        let err = GraphError::mismatch("boolean", "string");
        assert_eq!(err.to_string(), "type mismatch: expected boolean, found string");
    }

    #[test]
    fn pending_is_distinguishable() {
        assert!(GraphError::Pending.is_pending());
        assert!(!GraphError::evaluation("boom").is_pending());
    }
}
