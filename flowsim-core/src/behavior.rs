//! Per-kind transfer functions.
//!
//! Every function here is pure: given the arrival of the current tick, the
//! node's configuration and its state from the previous tick, it returns
//! what the node did this tick. Nothing is mutated; [`propagate`] writes
//! the results back into the topology.
//!
//! The model is a deliberately simple fluid approximation:
//!
//! ```text
//! capacity    = min(maxRPS, concurrencyLimit / baseLatency_s)   (0 when down)
//! utilization = min(arrival / capacity, 1)
//! latency     = baseLatency / max(1 - utilization, ε)
//! throughput  = min(arrival, capacity)
//! dropped     = max(0, arrival - capacity)
//! queue'      = max(0, queue + (arrival - capacity) * tick_seconds)
//! ```
//!
//! [`propagate`]: crate::propagation::propagate

use crate::{
    defaults::{
        DB_ROUTER_ROUTING_LATENCY, EPSILON, IDLE_THRESHOLD, LOAD_BALANCER_ROUTING_LATENCY,
        OVERLOADED_UTILIZATION, SPIKE_MULTIPLIER, STRESSED_UTILIZATION,
    },
    measure::Flow,
    node::{ClientConfig, LoadBalancerConfig, NodeConfig, NodeState, NodeStatus, ServerConfig},
};

/// Parameters of the tick being evaluated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickContext {
    /// Simulated seconds covered by this tick.
    pub tick_seconds: f64,
    pub spike_active: bool,
}

/// What a node did during one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    /// `None` for nodes without a capacity limit (clients, routers).
    pub effective_capacity: Option<f64>,
    pub utilization: f64,
    /// Milliseconds.
    pub latency: f64,
    /// Volume leaving the node, before routing.
    pub throughput: Flow,
    /// Part of `throughput` originated by a client this tick.
    pub generated: f64,
    /// Volume lost at this node this tick (requests per second).
    pub dropped: f64,
    /// Part of `dropped` rejected by admission control.
    pub drop_rate: f64,
    pub queue_depth: f64,
    pub status: NodeStatus,
}

/// Little's-law capacity of an application server or database.
///
/// A node holding `concurrency_limit` requests for `base_latency`
/// milliseconds each sustains at most `concurrency_limit / base_latency_s`
/// requests per second.
///
/// ```
/// # use flowsim_core::{behavior::effective_capacity, node::ServerConfig};
/// let server = ServerConfig { max_rps: 500.0, base_latency: 50.0, concurrency_limit: 10.0 };
/// // 10 slots held 50ms each: 200 rps
/// assert_eq!(effective_capacity(&server, false), 200.0);
/// assert_eq!(effective_capacity(&server, true), 0.0);
/// ```
pub fn effective_capacity(server: &ServerConfig, manually_down: bool) -> f64 {
    if manually_down {
        return 0.0;
    }
    if server.concurrency_limit > 0.0 && server.base_latency > 0.0 {
        let ceiling = server.concurrency_limit / (server.base_latency / 1_000.0);
        server.max_rps.min(ceiling)
    } else {
        server.max_rps
    }
}

/// `arrival / capacity` clamped to `[0, 1]`.
pub fn utilization(arrival: f64, capacity: f64) -> f64 {
    if capacity > 0.0 {
        (arrival / capacity).clamp(0.0, 1.0)
    } else if arrival > 0.0 {
        1.0
    } else {
        0.0
    }
}

/// Latency blow-up as the node approaches saturation, bounded by
/// [`EPSILON`].
pub fn latency(base_latency: f64, utilization: f64) -> f64 {
    base_latency / (1.0 - utilization).max(EPSILON)
}

/// Leaky accumulator of the backlog.
pub fn next_queue_depth(queue_depth: f64, arrival: f64, capacity: f64, tick_seconds: f64) -> f64 {
    (queue_depth + (arrival - capacity) * tick_seconds).max(0.0)
}

/// Utilisation based health classification of a node that is not down.
pub fn classify(arrival: f64, queue_depth: f64, utilization: f64) -> NodeStatus {
    if arrival <= IDLE_THRESHOLD && queue_depth <= IDLE_THRESHOLD {
        NodeStatus::Idle
    } else if utilization >= OVERLOADED_UTILIZATION {
        NodeStatus::Overloaded
    } else if utilization >= STRESSED_UTILIZATION {
        NodeStatus::Stressed
    } else {
        NodeStatus::Healthy
    }
}

/// Admission control of a load balancer.
///
/// Returns the admitted flow and the rejected volume. With backpressure
/// disabled everything is admitted.
pub fn admit(arrival: Flow, lb: &LoadBalancerConfig) -> (Flow, f64) {
    if !lb.backpressure_enabled {
        return (arrival, 0.0);
    }
    let line = lb.max_rps * lb.backpressure_threshold.value();
    let admitted = arrival.cap(line);
    let rejected = (arrival.total() - admitted.total()).max(0.0);
    (admitted, rejected)
}

/// Evaluate one node for the current tick.
///
/// `arrival` is the inbound flow summed over all inbound edges. Clients
/// forward it together with the load they generate.
pub fn evaluate(
    config: &NodeConfig,
    arrival: Flow,
    state: &NodeState,
    ctx: TickContext,
) -> Evaluation {
    if state.manually_down {
        return down(config, arrival, state);
    }

    match config {
        NodeConfig::Client(client) => generate(client, arrival, ctx),
        NodeConfig::LoadBalancer(lb) => {
            let (admitted, rejected) = admit(arrival, lb);
            let mut evaluation = capped(
                admitted,
                lb.max_rps,
                LOAD_BALANCER_ROUTING_LATENCY,
                state.queue_depth,
                ctx,
            );
            evaluation.dropped += rejected;
            evaluation.drop_rate = rejected;
            if rejected > IDLE_THRESHOLD
                && matches!(
                    evaluation.status,
                    NodeStatus::Idle | NodeStatus::Healthy | NodeStatus::Stressed
                )
            {
                evaluation.status = NodeStatus::Rejecting;
            }
            evaluation
        }
        NodeConfig::AppServer(server) => serve(server, arrival, state, ctx),
        NodeConfig::Database(db) => serve(&db.server, arrival, state, ctx),
        NodeConfig::DbRouter(_) => Evaluation {
            effective_capacity: None,
            utilization: 0.0,
            latency: DB_ROUTER_ROUTING_LATENCY,
            throughput: arrival,
            generated: 0.0,
            dropped: 0.0,
            drop_rate: 0.0,
            queue_depth: 0.0,
            status: classify(arrival.total(), 0.0, 0.0),
        },
    }
}

/// Offered load of a client for this tick.
pub fn offered_load(client: &ClientConfig, spike_active: bool) -> Flow {
    let multiplier = if spike_active { SPIKE_MULTIPLIER } else { 1.0 };
    Flow::split(client.rps * multiplier, client.read_ratio)
}

fn generate(client: &ClientConfig, arrival: Flow, ctx: TickContext) -> Evaluation {
    let offered = offered_load(client, ctx.spike_active);
    let throughput = arrival + offered;
    Evaluation {
        effective_capacity: None,
        utilization: 0.0,
        latency: 0.0,
        throughput,
        generated: offered.total(),
        dropped: 0.0,
        drop_rate: 0.0,
        queue_depth: 0.0,
        status: classify(throughput.total(), 0.0, 0.0),
    }
}

fn serve(server: &ServerConfig, arrival: Flow, state: &NodeState, ctx: TickContext) -> Evaluation {
    let capacity = effective_capacity(server, false);
    capped(arrival, capacity, server.base_latency, state.queue_depth, ctx)
}

fn capped(
    arrival: Flow,
    capacity: f64,
    base_latency: f64,
    queue_depth: f64,
    ctx: TickContext,
) -> Evaluation {
    let total = arrival.total();
    let utilization = utilization(total, capacity);
    let queue_depth = next_queue_depth(queue_depth, total, capacity, ctx.tick_seconds);

    Evaluation {
        effective_capacity: Some(capacity),
        utilization,
        latency: latency(base_latency, utilization),
        throughput: arrival.cap(capacity),
        generated: 0.0,
        dropped: (total - capacity).max(0.0),
        drop_rate: 0.0,
        queue_depth,
        status: classify(total, queue_depth, utilization),
    }
}

/// A failed node serves nothing and loses everything it receives. Its
/// backlog is frozen until it comes back.
fn down(config: &NodeConfig, arrival: Flow, state: &NodeState) -> Evaluation {
    let total = arrival.total();
    let capacity = match config {
        NodeConfig::Client(_) | NodeConfig::DbRouter(_) => None,
        _ => Some(0.0),
    };
    Evaluation {
        effective_capacity: capacity,
        utilization: utilization(total, 0.0),
        latency: 0.0,
        throughput: Flow::ZERO,
        generated: 0.0,
        dropped: total,
        drop_rate: 0.0,
        queue_depth: state.queue_depth,
        status: NodeStatus::Down,
    }
}
