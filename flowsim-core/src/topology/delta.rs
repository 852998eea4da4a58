use super::Edge;
use crate::node::{Node, NodeId};

/// A set of structural changes applied atomically with
/// [`Topology::apply_delta`].
///
/// The changes are applied in this order: `remove_edges`,
/// `remove_node_ids` (cascading to the remaining incident edges),
/// `add_nodes`, `add_edges`. A node in `add_nodes` whose id already
/// exists replaces that node's label and configuration but keeps its
/// runtime state.
///
/// [`Topology::apply_delta`]: super::Topology::apply_delta
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopologyDelta {
    pub add_nodes: Vec<Node>,
    pub remove_node_ids: Vec<NodeId>,
    pub add_edges: Vec<Edge>,
    pub remove_edges: Vec<Edge>,
}

impl TopologyDelta {
    pub fn is_empty(&self) -> bool {
        self.add_nodes.is_empty()
            && self.remove_node_ids.is_empty()
            && self.add_edges.is_empty()
            && self.remove_edges.is_empty()
    }
}
