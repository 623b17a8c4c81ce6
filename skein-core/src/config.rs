//! Engine Configuration

use serde::{Deserialize, Serialize};

/// Tuning knobs for a [`Graph`](crate::Graph).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Number of items processed per chunk by pipeline stages and entries
    /// assembly.
    pub batch_size: usize,

    /// Maximum nesting of node evaluations before resolution fails.
    /// Reference cycles hit this limit instead of overflowing the stack.
    pub max_depth: usize,

    /// Dispose unreachable transient instances whenever a subscription
    /// is unsubscribed.
    pub collect_on_unsubscribe: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            batch_size: 256,
            max_depth: 256,
            collect_on_unsubscribe: true,
        }
    }
}

impl GraphConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Chunk size, never zero.
    pub(crate) fn chunk_size(&self) -> usize {
        self.batch_size.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_uses_defaults() {
        let config = GraphConfig::from_json(r#"{"batch_size": 64}"#).unwrap();
        assert_eq!(config.batch_size, 64);
        assert_eq!(config.max_depth, GraphConfig::default().max_depth);
        assert!(config.collect_on_unsubscribe);
    }

    #[test]
    fn zero_batch_size_is_clamped() {
        let config = GraphConfig {
            batch_size: 0,
            ..GraphConfig::default()
        };
        assert_eq!(config.chunk_size(), 1);
    }
}
