use crate::{
    behavior::TickContext,
    defaults::DEFAULT_TICK_SECONDS,
    node::{ConfigError, ConfigPatch, NodeId, NodeKind, config::rate},
    propagation::{Propagation, propagate},
    snapshot::TickSnapshot,
    topology::{Topology, TopologyDelta, TopologyError},
    wire::ArchitectureSpec,
};
use thiserror::Error;
use tracing::{debug, trace};

/// Error returned when a command against a [`Simulation`] is rejected.
///
/// A rejected command leaves the simulation exactly as it was.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("invalid topology: {0}")]
    InvalidTopology(#[from] TopologyError),
    #[error("node ({0}) Not Found")]
    NodeNotFound(NodeId),
    #[error("invalid config: {0}")]
    InvalidConfig(#[from] ConfigError),
}

/// The synchronous state of one session: its topology, traffic shaping
/// and tick counter.
///
/// Mutations only change state; the flow is recomputed when [`step`] is
/// called, so any number of changes between two ticks are seen together
/// by the next one.
///
/// ```
/// use flowsim_core::{sim::Simulation, wire::ArchitectureSpec};
///
/// let spec: ArchitectureSpec = serde_json::from_str(r#"{
///     "nodes": [
///         {"id":"users","type":"client","rps":200},
///         {"id":"lb","type":"load_balancer","maxRPS":500},
///         {"id":"api-1","type":"app_server","maxRPS":100,"baseLatency":20},
///         {"id":"api-2","type":"app_server","maxRPS":100,"baseLatency":20}
///     ],
///     "edges": [
///         {"source":"users","target":"lb"},
///         {"source":"lb","target":"api-1"},
///         {"source":"lb","target":"api-2"}
///     ]
/// }"#).unwrap();
///
/// let mut sim = Simulation::from_spec(spec).unwrap();
/// let snapshot = sim.step(0);
/// assert_eq!(snapshot.tick, 1);
/// assert_eq!(snapshot.total_rps, 200.0);
///
/// sim.set_traffic_spike(true);
/// assert_eq!(sim.step(0).total_rps, 400.0);
/// ```
///
/// [`step`]: Simulation::step
#[derive(Debug, Clone)]
pub struct Simulation {
    topology: Topology,
    tick: u64,
    spike_active: bool,
    traffic_rps: f64,
    tick_seconds: f64,
}

impl Simulation {
    pub fn new(topology: Topology, traffic_rps: f64) -> Self {
        Self {
            topology,
            tick: 0,
            spike_active: false,
            traffic_rps,
            tick_seconds: DEFAULT_TICK_SECONDS,
        }
    }

    /// Build a simulation from a create request.
    pub fn from_spec(spec: ArchitectureSpec) -> Result<Self, SimError> {
        let traffic_rps = spec.traffic_rps()?;
        let (nodes, edges) = spec.into_parts(traffic_rps)?;
        let topology = Topology::new(nodes, edges)?;
        Ok(Self::new(topology, traffic_rps))
    }

    /// Simulated seconds covered by every tick. Ignored unless finite and
    /// positive.
    #[must_use]
    pub fn with_tick_seconds(mut self, tick_seconds: f64) -> Self {
        if tick_seconds.is_finite() && tick_seconds > 0.0 {
            self.tick_seconds = tick_seconds;
        }
        self
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Number of ticks computed so far.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn spike_active(&self) -> bool {
        self.spike_active
    }

    /// Default offered load of clients that do not set their own.
    pub fn traffic_rps(&self) -> f64 {
        self.traffic_rps
    }

    pub fn tick_seconds(&self) -> f64 {
        self.tick_seconds
    }

    /// Apply a structural change atomically.
    pub fn update_graph(&mut self, delta: TopologyDelta) -> Result<(), SimError> {
        if delta.is_empty() {
            return Ok(());
        }
        self.topology = self.topology.apply_delta(delta)?;
        debug!(nodes = self.topology.len(), "topology updated");
        Ok(())
    }

    /// Turn the topology into the one described by `spec`, diffing it
    /// against the current graph so retained nodes keep their metrics.
    pub fn replace_graph(&mut self, spec: ArchitectureSpec) -> Result<(), SimError> {
        let (nodes, edges) = spec.into_parts(self.traffic_rps)?;
        let delta = self.topology.diff(nodes, &edges)?;
        self.update_graph(delta)
    }

    pub fn update_config(&mut self, id: &str, patch: ConfigPatch) -> Result<(), SimError> {
        let node = self
            .topology
            .node_mut(id)
            .ok_or_else(|| SimError::NodeNotFound(NodeId::from(id)))?;
        node.apply(&patch)?;
        debug!(node = %id, field = patch.field(), "config updated");
        Ok(())
    }

    /// Set or clear failure injection on a node.
    pub fn toggle_node(&mut self, id: &str, down: bool) -> Result<(), SimError> {
        let node = self
            .topology
            .node_mut(id)
            .ok_or_else(|| SimError::NodeNotFound(NodeId::from(id)))?;
        node.state_mut().manually_down = down;
        debug!(node = %id, down, "node toggled");
        Ok(())
    }

    pub fn set_traffic_spike(&mut self, active: bool) {
        self.spike_active = active;
    }

    /// Set the offered load of every client.
    pub fn set_traffic_rps(&mut self, rps: f64) -> Result<(), SimError> {
        let rps = rate("rps", rps)?;
        let patch = ConfigPatch::Rps(rps);
        for node in self.topology.slots_mut() {
            if node.kind() == NodeKind::Client {
                node.apply(&patch)?;
            }
        }
        self.traffic_rps = rps;
        Ok(())
    }

    /// Zero every queue. The next tick starts from an empty backlog.
    pub fn reset_queues(&mut self) {
        for node in self.topology.slots_mut() {
            node.state_mut().queue_depth = 0.0;
        }
    }

    /// Back to idle metrics, as when the session is stopped. Failure
    /// injection is kept.
    pub fn reset_runtime(&mut self) {
        for node in self.topology.slots_mut() {
            node.state_mut().reset_metrics();
        }
    }

    /// Advance the simulation by one tick.
    pub fn step(&mut self, timestamp: u64) -> TickSnapshot {
        let ctx = TickContext {
            tick_seconds: self.tick_seconds,
            spike_active: self.spike_active,
        };
        let Propagation {
            nodes,
            bottleneck_ids,
            total_rps,
            served_rps,
            dropped_rps,
        } = propagate(&mut self.topology, ctx);
        self.tick += 1;

        trace!(
            tick = self.tick,
            total_rps,
            bottlenecks = bottleneck_ids.len(),
            "tick"
        );

        TickSnapshot {
            tick: self.tick,
            timestamp,
            total_rps,
            served_rps,
            dropped_rps,
            spike_active: self.spike_active,
            bottleneck_ids,
            nodes,
        }
    }
}
