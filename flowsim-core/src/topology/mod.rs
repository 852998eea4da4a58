mod delta;
mod edge;

pub use self::{delta::TopologyDelta, edge::Edge};
use crate::node::{Node, NodeId};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Error returned when a topology violates a structural invariant.
///
/// A rejected topology or delta never replaces the previous one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    #[error("the topology has no nodes")]
    Empty,
    #[error("node ({0}) is defined more than once")]
    DuplicateNode(NodeId),
    #[error("edge ({edge}) references an unknown node ({missing})")]
    DanglingEdge { edge: Edge, missing: NodeId },
    /// A request could loop forever. `node` is where the cycle was closed.
    #[error("the topology contains a cycle through node ({node})")]
    Cycle { node: NodeId },
    #[error("node ({0}) Not Found")]
    UnknownNode(NodeId),
    #[error("edge ({0}) Not Found")]
    UnknownEdge(Edge),
}

/// A validated, acyclic graph of [`Node`]s.
///
/// Nodes are kept in insertion order; the topological order used by the
/// propagation is computed once on construction and stored as slot
/// indices, along with the outgoing targets of every slot (one entry per
/// edge, so parallel edges appear twice).
///
/// A `Topology` can only be obtained through validation, so every value
/// of this type is acyclic, has no dangling edges and at least one node.
///
/// ```
/// use flowsim_core::{node::{Node, NodeConfig}, topology::{Edge, Topology}};
///
/// let topology = Topology::new(
///     vec![
///         Node::new("users", "Users", NodeConfig::client(100.0)),
///         Node::new("api", "API", NodeConfig::app_server(100.0, 20.0)),
///     ],
///     vec![Edge::new("users", "api")],
/// )
/// .unwrap();
///
/// assert_eq!(topology.len(), 2);
/// assert!(Topology::new(vec![], vec![]).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct Topology {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    index: HashMap<NodeId, usize>,
    order: Vec<usize>,
    outgoing: Vec<Vec<usize>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    New,
    Visiting,
    Done,
}

impl Topology {
    /// Build and validate a topology.
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Result<Self, TopologyError> {
        if nodes.is_empty() {
            return Err(TopologyError::Empty);
        }

        let mut index = HashMap::with_capacity(nodes.len());
        for (slot, node) in nodes.iter().enumerate() {
            if index.insert(node.id().clone(), slot).is_some() {
                return Err(TopologyError::DuplicateNode(node.id().clone()));
            }
        }

        let mut outgoing = vec![Vec::new(); nodes.len()];
        for edge in &edges {
            let source = slot_of(&index, edge, &edge.source)?;
            let target = slot_of(&index, edge, &edge.target)?;
            outgoing[source].push(target);
        }

        let order = topological_order(&nodes, &outgoing)?;

        Ok(Self {
            nodes,
            edges,
            index,
            order,
            outgoing,
        })
    }

    /// Check the structural invariants again.
    ///
    /// Always succeeds for a constructed topology; exposed so callers
    /// holding a topology can assert it explicitly.
    pub fn validate(&self) -> Result<(), TopologyError> {
        Self::new(self.nodes.clone(), self.edges.clone()).map(|_| ())
    }

    /// Apply `delta` and validate the result.
    ///
    /// On success the new topology is returned and retained node ids keep
    /// their runtime state. On failure `self` is untouched.
    pub fn apply_delta(&self, delta: TopologyDelta) -> Result<Self, TopologyError> {
        let TopologyDelta {
            add_nodes,
            remove_node_ids,
            add_edges,
            remove_edges,
        } = delta;

        unique(&add_nodes)?;

        let mut nodes = self.nodes.clone();
        let mut edges = self.edges.clone();

        for edge in remove_edges {
            match edges.iter().position(|e| e == &edge) {
                Some(at) => {
                    edges.remove(at);
                }
                None => return Err(TopologyError::UnknownEdge(edge)),
            }
        }

        let mut removed = HashSet::with_capacity(remove_node_ids.len());
        for id in remove_node_ids {
            if !self.index.contains_key(&id) || !removed.insert(id.clone()) {
                return Err(TopologyError::UnknownNode(id));
            }
        }
        if !removed.is_empty() {
            nodes.retain(|node| !removed.contains(node.id()));
            edges.retain(|edge| !removed.contains(&edge.source) && !removed.contains(&edge.target));
        }

        for node in add_nodes {
            match nodes.iter_mut().find(|existing| existing.id() == node.id()) {
                Some(existing) => existing.redefine(node),
                None => nodes.push(node),
            }
        }

        edges.extend(add_edges);

        Self::new(nodes, edges)
    }

    /// The delta turning `self` into the graph described by `nodes` and
    /// `edges`.
    ///
    /// Nodes whose definition did not change are left out of
    /// `add_nodes`. Edges are compared as a multiset. Fails if `nodes`
    /// defines an id twice.
    pub fn diff(&self, nodes: Vec<Node>, edges: &[Edge]) -> Result<TopologyDelta, TopologyError> {
        unique(&nodes)?;

        let wanted: HashSet<&NodeId> = nodes.iter().map(Node::id).collect();
        let remove_node_ids = self
            .nodes
            .iter()
            .map(Node::id)
            .filter(|id| !wanted.contains(id))
            .cloned()
            .collect();

        let mut balance: HashMap<&Edge, i64> = HashMap::new();
        for edge in &self.edges {
            *balance.entry(edge).or_default() -= 1;
        }
        for edge in edges {
            *balance.entry(edge).or_default() += 1;
        }

        let mut add_edges = Vec::new();
        let mut remove_edges = Vec::new();
        // walk in payload then current order so the delta is deterministic
        let mut seen = HashSet::new();
        for edge in edges.iter().chain(&self.edges) {
            if !seen.insert(edge) {
                continue;
            }
            let count = balance.get(edge).copied().unwrap_or_default();
            let target = if count > 0 {
                &mut add_edges
            } else {
                &mut remove_edges
            };
            target.extend(std::iter::repeat_n(edge.clone(), count.unsigned_abs() as usize));
        }

        let add_nodes = nodes
            .into_iter()
            .filter(|node| match self.node(node.id().as_str()) {
                Some(existing) => !existing.same_definition(node),
                None => true,
            })
            .collect();

        Ok(TopologyDelta {
            add_nodes,
            remove_node_ids,
            add_edges,
            remove_edges,
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always `false`: empty topologies are rejected on construction.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.index.get(id).map(|&slot| &self.nodes[slot])
    }

    /// Mutable access for configuration changes. The structure of the
    /// graph can only change through [`Topology::apply_delta`].
    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.index.get(id).map(|&slot| &mut self.nodes[slot])
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl ExactSizeIterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Node ids in an order where every node comes after all of its
    /// upstream nodes.
    pub fn order(&self) -> impl ExactSizeIterator<Item = &NodeId> {
        self.order.iter().map(|&slot| self.nodes[slot].id())
    }

    pub(crate) fn slots(&self) -> &[Node] {
        &self.nodes
    }

    pub(crate) fn slots_mut(&mut self) -> &mut [Node] {
        &mut self.nodes
    }

    pub(crate) fn slot_order(&self) -> &[usize] {
        &self.order
    }

    pub(crate) fn outgoing(&self, slot: usize) -> &[usize] {
        &self.outgoing[slot]
    }
}

fn unique(nodes: &[Node]) -> Result<(), TopologyError> {
    let mut seen = HashSet::with_capacity(nodes.len());
    match nodes.iter().find(|node| !seen.insert(node.id())) {
        Some(node) => Err(TopologyError::DuplicateNode(node.id().clone())),
        None => Ok(()),
    }
}

fn slot_of(
    index: &HashMap<NodeId, usize>,
    edge: &Edge,
    end: &NodeId,
) -> Result<usize, TopologyError> {
    index
        .get(end)
        .copied()
        .ok_or_else(|| TopologyError::DanglingEdge {
            edge: edge.clone(),
            missing: end.clone(),
        })
}

/// Iterative depth first search. A back edge to a node still in the
/// `Visiting` state closes a cycle.
fn topological_order(nodes: &[Node], outgoing: &[Vec<usize>]) -> Result<Vec<usize>, TopologyError> {
    let mut visit = vec![Visit::New; nodes.len()];
    let mut post_order = Vec::with_capacity(nodes.len());
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for root in 0..nodes.len() {
        if visit[root] != Visit::New {
            continue;
        }
        visit[root] = Visit::Visiting;
        stack.push((root, 0));

        while let Some((slot, next)) = stack.last_mut() {
            let slot = *slot;
            if let Some(&target) = outgoing[slot].get(*next) {
                *next += 1;
                match visit[target] {
                    Visit::New => {
                        visit[target] = Visit::Visiting;
                        stack.push((target, 0));
                    }
                    Visit::Visiting => {
                        return Err(TopologyError::Cycle {
                            node: nodes[target].id().clone(),
                        });
                    }
                    Visit::Done => {}
                }
            } else {
                visit[slot] = Visit::Done;
                post_order.push(slot);
                stack.pop();
            }
        }
    }

    post_order.reverse();
    Ok(post_order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeConfig, NodeState, NodeStatus};

    fn client(id: &str) -> Node {
        Node::new(id, id, NodeConfig::client(100.0))
    }

    fn server(id: &str) -> Node {
        Node::new(id, id, NodeConfig::app_server(100.0, 20.0))
    }

    fn three_tier() -> Topology {
        Topology::new(
            vec![client("c"), server("a"), server("b")],
            vec![Edge::new("c", "a"), Edge::new("a", "b")],
        )
        .unwrap()
    }

    fn position(topology: &Topology, id: &str) -> usize {
        topology.order().position(|n| n.as_str() == id).unwrap()
    }

    #[test]
    fn order_respects_edges() {
        let topology = Topology::new(
            vec![server("b"), server("a"), client("c")],
            vec![Edge::new("a", "b"), Edge::new("c", "a"), Edge::new("c", "b")],
        )
        .unwrap();

        assert!(position(&topology, "c") < position(&topology, "a"));
        assert!(position(&topology, "a") < position(&topology, "b"));
        assert_eq!(topology.order().len(), 3);
    }

    #[test]
    fn nodes_keep_insertion_order() {
        let topology = three_tier();
        let ids: Vec<&str> = topology.nodes().map(|n| n.id().as_str()).collect();
        assert_eq!(ids, ["c", "a", "b"]);
    }

    #[test]
    fn reject_cycle() {
        let err = Topology::new(
            vec![server("a"), server("b"), server("c")],
            vec![Edge::new("a", "b"), Edge::new("b", "c"), Edge::new("c", "a")],
        )
        .unwrap_err();
        assert!(matches!(err, TopologyError::Cycle { .. }));
    }

    #[test]
    fn reject_self_loop() {
        let err = Topology::new(vec![server("a")], vec![Edge::new("a", "a")]).unwrap_err();
        assert_eq!(err, TopologyError::Cycle { node: "a".into() });
    }

    #[test]
    fn diamond_is_not_a_cycle() {
        Topology::new(
            vec![client("c"), server("l"), server("r"), server("t")],
            vec![
                Edge::new("c", "l"),
                Edge::new("c", "r"),
                Edge::new("l", "t"),
                Edge::new("r", "t"),
            ],
        )
        .unwrap();
    }

    #[test]
    fn reject_dangling_edge() {
        let err = Topology::new(vec![client("c")], vec![Edge::new("c", "ghost")]).unwrap_err();
        assert_eq!(
            err,
            TopologyError::DanglingEdge {
                edge: Edge::new("c", "ghost"),
                missing: "ghost".into()
            }
        );
    }

    #[test]
    fn reject_duplicate_and_empty() {
        assert_eq!(
            Topology::new(vec![client("c"), server("c")], vec![]).unwrap_err(),
            TopologyError::DuplicateNode("c".into())
        );
        assert_eq!(
            Topology::new(vec![], vec![]).unwrap_err(),
            TopologyError::Empty
        );
    }

    #[test]
    fn parallel_edges_are_kept() {
        let topology = Topology::new(
            vec![client("c"), server("a")],
            vec![Edge::new("c", "a"), Edge::new("c", "a")],
        )
        .unwrap();
        assert_eq!(topology.edges().len(), 2);
        assert_eq!(topology.outgoing(0), &[1, 1]);
    }

    #[test]
    fn delta_retains_runtime_state() {
        let busy = server("a").with_state(NodeState {
            status: NodeStatus::Overloaded,
            queue_depth: 42.0,
            manually_down: false,
        });
        let topology = Topology::new(
            vec![client("c"), busy, server("b")],
            vec![Edge::new("c", "a"), Edge::new("a", "b")],
        )
        .unwrap();

        let updated = topology
            .apply_delta(TopologyDelta {
                add_nodes: vec![server("d")],
                add_edges: vec![Edge::new("a", "d")],
                ..TopologyDelta::default()
            })
            .unwrap();

        let a = updated.node("a").unwrap();
        assert_eq!(a.state().queue_depth, 42.0);
        assert_eq!(a.state().status, NodeStatus::Overloaded);
        assert_eq!(updated.node("d").unwrap().state(), &NodeState::default());
    }

    #[test]
    fn delta_upsert_keeps_state_and_takes_config() {
        let mut topology = three_tier();
        topology.node_mut("a").unwrap().state_mut().queue_depth = 7.0;

        let updated = topology
            .apply_delta(TopologyDelta {
                add_nodes: vec![Node::new("a", "bigger", NodeConfig::app_server(300.0, 20.0))],
                ..TopologyDelta::default()
            })
            .unwrap();

        let a = updated.node("a").unwrap();
        assert_eq!(a.label(), "bigger");
        assert_eq!(a.config().max_rps(), Some(300.0));
        assert_eq!(a.state().queue_depth, 7.0);
    }

    #[test]
    fn delta_removing_node_cascades_edges() {
        let updated = three_tier()
            .apply_delta(TopologyDelta {
                remove_node_ids: vec!["a".into()],
                ..TopologyDelta::default()
            })
            .unwrap();
        assert!(!updated.contains("a"));
        assert!(updated.edges().is_empty());
    }

    #[test]
    fn failed_delta_leaves_topology_unchanged() {
        let topology = three_tier();
        let err = topology
            .apply_delta(TopologyDelta {
                add_edges: vec![Edge::new("b", "c")],
                ..TopologyDelta::default()
            })
            .unwrap_err();
        assert!(matches!(err, TopologyError::Cycle { .. }));
        assert_eq!(topology.edges().len(), 2);

        assert_eq!(
            topology
                .apply_delta(TopologyDelta {
                    remove_node_ids: vec!["ghost".into()],
                    ..TopologyDelta::default()
                })
                .unwrap_err(),
            TopologyError::UnknownNode("ghost".into())
        );
        assert_eq!(
            topology
                .apply_delta(TopologyDelta {
                    remove_edges: vec![Edge::new("b", "a")],
                    ..TopologyDelta::default()
                })
                .unwrap_err(),
            TopologyError::UnknownEdge(Edge::new("b", "a"))
        );
    }

    #[test]
    fn duplicate_ids_in_an_update_are_rejected() {
        let topology = three_tier();
        let twice = vec![
            Node::new("x", "x", NodeConfig::app_server(100.0, 20.0)),
            Node::new("x", "x", NodeConfig::app_server(900.0, 20.0)),
        ];

        let err = topology
            .apply_delta(TopologyDelta {
                add_nodes: twice.clone(),
                ..TopologyDelta::default()
            })
            .unwrap_err();
        assert_eq!(err, TopologyError::DuplicateNode("x".into()));
        assert!(!topology.contains("x"));

        let err = topology.diff(twice, &[]).unwrap_err();
        assert_eq!(err, TopologyError::DuplicateNode("x".into()));
    }

    #[test]
    fn diff_of_identical_graph_is_empty() {
        let topology = three_tier();
        let nodes = topology.nodes().cloned().collect();
        let edges = topology.edges().to_vec();
        assert!(topology.diff(nodes, &edges).unwrap().is_empty());
    }

    #[test]
    fn diff_counts_edges_as_multiset() {
        let topology = Topology::new(
            vec![client("c"), server("a")],
            vec![Edge::new("c", "a"), Edge::new("c", "a")],
        )
        .unwrap();
        let nodes: Vec<Node> = topology.nodes().cloned().collect();

        let delta = topology.diff(nodes.clone(), &[Edge::new("c", "a")]).unwrap();
        assert_eq!(delta.remove_edges, vec![Edge::new("c", "a")]);
        assert!(delta.add_edges.is_empty());

        let delta = topology.diff(nodes, &vec![Edge::new("c", "a"); 3]).unwrap();
        assert_eq!(delta.add_edges, vec![Edge::new("c", "a")]);
    }

    #[test]
    fn diff_then_apply_reaches_the_target_graph() {
        let mut topology = three_tier();
        topology.node_mut("a").unwrap().state_mut().queue_depth = 3.0;

        let nodes = vec![client("c"), server("a"), server("x")];
        let edges = vec![Edge::new("a", "x"), Edge::new("c", "a")];
        let delta = topology.diff(nodes, &edges).unwrap();

        assert_eq!(delta.remove_node_ids, vec![NodeId::from("b")]);
        assert_eq!(delta.add_nodes.len(), 1);

        let updated = topology.apply_delta(delta).unwrap();
        let mut got = updated.edges().to_vec();
        got.sort();
        assert_eq!(got, edges);
        assert_eq!(updated.node("a").unwrap().state().queue_depth, 3.0);
    }
}
