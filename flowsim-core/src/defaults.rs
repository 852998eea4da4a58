//! Default values used when a node payload omits a field.
//!
//! The visual editor sends `0` for capacities it did not set, so the
//! capacity and latency defaults below also apply to zero values. See
//! [`NodeSpec::into_node`] for the exact rules.
//!
//! [`NodeSpec::into_node`]: crate::wire::NodeSpec::into_node

/// Offered load of a client node when neither the node nor the session
/// carries one.
///
/// ```
/// # use flowsim_core::defaults::*;
/// assert_eq!(DEFAULT_TRAFFIC_RPS, 100.0);
/// ```
pub const DEFAULT_TRAFFIC_RPS: f64 = 100.0;

/// Fraction of traffic tagged as reads by clients and database routers.
pub const DEFAULT_READ_RATIO: f64 = 0.7;

/// Load balancer capacity (requests per second).
pub const DEFAULT_LOAD_BALANCER_MAX_RPS: f64 = 500.0;

/// Utilisation above which an enabled backpressure starts rejecting.
pub const DEFAULT_BACKPRESSURE_THRESHOLD: f64 = 0.9;

/// Application server capacity (requests per second).
pub const DEFAULT_APP_SERVER_MAX_RPS: f64 = 100.0;

/// Application server service time at zero contention (milliseconds).
pub const DEFAULT_APP_SERVER_BASE_LATENCY: f64 = 20.0;

/// Database capacity (queries per second).
pub const DEFAULT_DATABASE_MAX_RPS: f64 = 50.0;

/// Database service time at zero contention (milliseconds).
pub const DEFAULT_DATABASE_BASE_LATENCY: f64 = 50.0;

/// Routing overhead of a load balancer at zero contention (milliseconds).
pub const LOAD_BALANCER_ROUTING_LATENCY: f64 = 0.5;

/// Fixed routing overhead of a database router (milliseconds).
pub const DB_ROUTER_ROUTING_LATENCY: f64 = 1.0;

/// Lower bound of `1 - utilization` in the latency blow-up.
///
/// Bounds the reported latency of a saturated node to
/// `base_latency / EPSILON`.
pub const EPSILON: f64 = 0.01;

/// Flows below this value are considered zero when classifying a node.
pub const IDLE_THRESHOLD: f64 = 1e-9;

/// Utilisation at which a node stops being `healthy`.
pub const STRESSED_UTILIZATION: f64 = 0.6;

/// Utilisation at which a node is `overloaded` (and a bottleneck).
pub const OVERLOADED_UTILIZATION: f64 = 0.85;

/// Multiplier applied to every client while a traffic spike is active.
pub const SPIKE_MULTIPLIER: f64 = 2.0;

/// Simulated seconds covered by one tick.
pub const DEFAULT_TICK_SECONDS: f64 = 1.0;
