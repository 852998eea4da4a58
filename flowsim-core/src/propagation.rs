//! One tick of flow propagation over a [`Topology`].
//!
//! Nodes are visited exactly once, in topological order, so every inbound
//! edge has delivered its share before a node is evaluated. The cost of a
//! tick is `O(|nodes| + |edges|)`.

use crate::{
    behavior::{Evaluation, TickContext, evaluate},
    measure::Flow,
    node::{Algorithm, NodeConfig, NodeId, NodeKind, NodeStatus},
    snapshot::NodeSnapshot,
    topology::Topology,
};

/// The per-node results of a tick and their aggregates.
#[derive(Debug, Clone, PartialEq)]
pub struct Propagation {
    /// In the insertion order of the topology.
    pub nodes: Vec<NodeSnapshot>,
    pub bottleneck_ids: Vec<NodeId>,
    pub total_rps: f64,
    pub served_rps: f64,
    pub dropped_rps: f64,
}

/// What a sender needs to know about a target before routing to it.
#[derive(Debug, Clone, Copy)]
struct Target {
    live: bool,
    replica: bool,
    weight: Option<f64>,
}

/// Run one tick and write the new status and queue depth of every node
/// back into `topology`.
pub fn propagate(topology: &mut Topology, ctx: TickContext) -> Propagation {
    let count = topology.len();
    let targets: Vec<Target> = topology
        .slots()
        .iter()
        .map(|node| Target {
            live: !node.is_down(),
            replica: node.config().is_replica(),
            weight: node.config().max_rps(),
        })
        .collect();

    let mut arrival = vec![Flow::ZERO; count];
    let mut evaluations: Vec<Option<Evaluation>> = vec![None; count];

    for &slot in topology.slot_order() {
        let node = &topology.slots()[slot];
        let mut evaluation = evaluate(node.config(), arrival[slot], node.state(), ctx);
        evaluation.dropped += distribute(
            node.config(),
            evaluation.throughput,
            topology.outgoing(slot),
            &targets,
            &mut arrival,
        );
        evaluations[slot] = Some(evaluation);
    }

    let mut result = Propagation {
        nodes: Vec::with_capacity(count),
        bottleneck_ids: Vec::new(),
        total_rps: 0.0,
        served_rps: 0.0,
        dropped_rps: 0.0,
    };

    for slot in 0..count {
        // every slot appears in the order exactly once
        let Some(evaluation) = evaluations[slot] else {
            continue;
        };
        let terminal = topology.outgoing(slot).is_empty();
        let node = &mut topology.slots_mut()[slot];

        let state = node.state_mut();
        state.status = evaluation.status;
        state.queue_depth = evaluation.queue_depth;

        let throughput = evaluation.throughput.total();
        match node.kind() {
            NodeKind::Client => {
                result.total_rps += evaluation.generated;
                if terminal {
                    // only the forwarded part is absorbed
                    result.served_rps += (throughput - evaluation.generated).max(0.0);
                }
            }
            _ if terminal => result.served_rps += throughput,
            _ => {}
        }
        result.dropped_rps += evaluation.dropped;
        if evaluation.status == NodeStatus::Overloaded {
            result.bottleneck_ids.push(node.id().clone());
        }

        result.nodes.push(NodeSnapshot {
            id: node.id().clone(),
            kind: node.kind(),
            label: node.label().to_owned(),
            status: evaluation.status,
            utilization: evaluation.utilization,
            latency: evaluation.latency,
            throughput,
            queue_depth: evaluation.queue_depth,
            dropped: evaluation.dropped,
            drop_rate: evaluation.drop_rate,
            read_throughput: evaluation.throughput.read,
            write_throughput: evaluation.throughput.write,
            arrival_read: arrival[slot].read,
            arrival_write: arrival[slot].write,
            effective_capacity: evaluation.effective_capacity,
            manually_down: node.is_down(),
        });
    }

    result
}

/// Spread `output` over the outgoing edges and return the volume that
/// could not be delivered to any live target.
///
/// A node without outgoing edges is terminal: its output is absorbed.
fn distribute(
    config: &NodeConfig,
    output: Flow,
    outgoing: &[usize],
    targets: &[Target],
    arrival: &mut [Flow],
) -> f64 {
    if outgoing.is_empty() || output.total() <= 0.0 {
        return 0.0;
    }

    match config {
        NodeConfig::DbRouter(router) => {
            let split = Flow::split(output.total(), router.read_ratio);
            let replicas = live(outgoing, targets, |t| t.replica);
            let primaries = live(outgoing, targets, |t| !t.replica);

            if replicas.is_empty() {
                return spread_evenly(split, &primaries, arrival);
            }
            spread_evenly(Flow::new(split.read, 0.0), &replicas, arrival)
                + spread_evenly(Flow::new(0.0, split.write), &primaries, arrival)
        }
        NodeConfig::LoadBalancer(lb) if lb.algorithm == Algorithm::CapacityWeighted => {
            let candidates = live(outgoing, targets, |_| true);
            let weights: Option<Vec<f64>> = candidates
                .iter()
                .map(|&slot| targets[slot].weight)
                .collect();
            match weights {
                Some(weights) => spread_weighted(output, &candidates, &weights, arrival),
                None => spread_evenly(output, &candidates, arrival),
            }
        }
        _ => spread_evenly(output, &live(outgoing, targets, |_| true), arrival),
    }
}

fn live(outgoing: &[usize], targets: &[Target], eligible: impl Fn(&Target) -> bool) -> Vec<usize> {
    outgoing
        .iter()
        .copied()
        .filter(|&slot| targets[slot].live && eligible(&targets[slot]))
        .collect()
}

fn spread_evenly(flow: Flow, to: &[usize], arrival: &mut [Flow]) -> f64 {
    if to.is_empty() {
        return flow.total();
    }
    let share = flow.scale(1.0 / to.len() as f64);
    for &slot in to {
        arrival[slot] += share;
    }
    0.0
}

fn spread_weighted(flow: Flow, to: &[usize], weights: &[f64], arrival: &mut [Flow]) -> f64 {
    let sum: f64 = weights.iter().sum();
    if sum <= 0.0 {
        return spread_evenly(flow, to, arrival);
    }
    for (&slot, weight) in to.iter().zip(weights) {
        arrival[slot] += flow.scale(weight / sum);
    }
    0.0
}
