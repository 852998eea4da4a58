use crate::node::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A directed request path from `source` to `target`.
///
/// Edges carry no configuration. Several edges between the same pair are
/// allowed and are treated as parallel paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
}

impl Edge {
    pub fn new(source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }

    /// `true` if `id` is either end of the edge.
    pub fn touches(&self, id: &NodeId) -> bool {
        &self.source == id || &self.target == id
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn print() {
        assert_eq!(Edge::new("lb", "app-1").to_string(), "lb -> app-1");
    }

    #[test]
    fn wire_format() {
        let edge: Edge = serde_json::from_str(r#"{"source":"a","target":"b"}"#).unwrap();
        assert_eq!(edge, Edge::new("a", "b"));
    }
}
