pub(crate) mod config;
mod id;

pub use self::{
    config::{ConfigError, ConfigPatch, FieldValue},
    id::NodeId,
};
use crate::{defaults, measure::Ratio};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The role a node plays in the request flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Client,
    #[serde(alias = "loadbalancer")]
    LoadBalancer,
    #[serde(alias = "appserver")]
    AppServer,
    Database,
    #[serde(alias = "dbrouter")]
    DbRouter,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Client => "client",
            Self::LoadBalancer => "load_balancer",
            Self::AppServer => "app_server",
            Self::Database => "database",
            Self::DbRouter => "db_router",
        };
        f.write_str(name)
    }
}

/// How a load balancer spreads its throughput over its outgoing edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    /// Equal share per live target.
    #[default]
    #[serde(alias = "round-robin", alias = "roundrobin")]
    RoundRobin,
    /// Share proportional to each live target's static `maxRPS`.
    #[serde(alias = "capacity-weighted", alias = "weighted")]
    CapacityWeighted,
}

/// Health classification of a node for the current tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    #[default]
    Idle,
    Healthy,
    Stressed,
    Overloaded,
    Down,
    /// A load balancer whose backpressure is shedding traffic this tick.
    Rejecting,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClientConfig {
    /// Offered load before the spike multiplier.
    pub rps: f64,
    pub read_ratio: Ratio,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadBalancerConfig {
    pub max_rps: f64,
    pub algorithm: Algorithm,
    pub backpressure_enabled: bool,
    /// Admission line as a fraction of `max_rps`. Never zero.
    pub backpressure_threshold: Ratio,
}

/// Capacity parameters shared by application servers and databases.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServerConfig {
    pub max_rps: f64,
    /// Service time at zero contention, in milliseconds.
    pub base_latency: f64,
    /// Maximum requests held at once. `0` means unbounded.
    pub concurrency_limit: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DatabaseConfig {
    pub server: ServerConfig,
    /// Replicas only receive read-tagged traffic from database routers.
    pub is_replica: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DbRouterConfig {
    pub read_ratio: Ratio,
}

/// The user-set configuration of a node, one variant per [`NodeKind`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeConfig {
    Client(ClientConfig),
    LoadBalancer(LoadBalancerConfig),
    AppServer(ServerConfig),
    Database(DatabaseConfig),
    DbRouter(DbRouterConfig),
}

impl NodeConfig {
    /// A client offering `rps` with the default read ratio.
    pub fn client(rps: f64) -> Self {
        Self::Client(ClientConfig {
            rps,
            read_ratio: Ratio::clamped(defaults::DEFAULT_READ_RATIO),
        })
    }

    /// A round robin load balancer without backpressure.
    pub fn load_balancer(max_rps: f64) -> Self {
        Self::LoadBalancer(LoadBalancerConfig {
            max_rps,
            algorithm: Algorithm::RoundRobin,
            backpressure_enabled: false,
            backpressure_threshold: Ratio::clamped(defaults::DEFAULT_BACKPRESSURE_THRESHOLD),
        })
    }

    pub fn app_server(max_rps: f64, base_latency: f64) -> Self {
        Self::AppServer(ServerConfig {
            max_rps,
            base_latency,
            concurrency_limit: 0.0,
        })
    }

    /// A primary database.
    pub fn database(max_rps: f64, base_latency: f64) -> Self {
        Self::Database(DatabaseConfig {
            server: ServerConfig {
                max_rps,
                base_latency,
                concurrency_limit: 0.0,
            },
            is_replica: false,
        })
    }

    /// A read replica database.
    pub fn replica(max_rps: f64, base_latency: f64) -> Self {
        Self::Database(DatabaseConfig {
            server: ServerConfig {
                max_rps,
                base_latency,
                concurrency_limit: 0.0,
            },
            is_replica: true,
        })
    }

    pub fn db_router(read_ratio: Ratio) -> Self {
        Self::DbRouter(DbRouterConfig { read_ratio })
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Client(_) => NodeKind::Client,
            Self::LoadBalancer(_) => NodeKind::LoadBalancer,
            Self::AppServer(_) => NodeKind::AppServer,
            Self::Database(_) => NodeKind::Database,
            Self::DbRouter(_) => NodeKind::DbRouter,
        }
    }

    /// The configured `maxRPS`, if this kind of node has one.
    pub fn max_rps(&self) -> Option<f64> {
        match self {
            Self::LoadBalancer(lb) => Some(lb.max_rps),
            Self::AppServer(server) => Some(server.max_rps),
            Self::Database(db) => Some(db.server.max_rps),
            Self::Client(_) | Self::DbRouter(_) => None,
        }
    }

    pub fn server(&self) -> Option<&ServerConfig> {
        match self {
            Self::AppServer(server) => Some(server),
            Self::Database(db) => Some(&db.server),
            _ => None,
        }
    }

    pub fn is_replica(&self) -> bool {
        matches!(self, Self::Database(DatabaseConfig { is_replica: true, .. }))
    }
}

/// Runtime state of a node. Never set by the user directly, except for
/// `manually_down` which failure injection toggles.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NodeState {
    pub status: NodeStatus,
    /// Backlog accumulated while arrival exceeded capacity. Always `>= 0`.
    pub queue_depth: f64,
    /// Forces `status = down` and a capacity of zero.
    pub manually_down: bool,
}

impl NodeState {
    /// Reset the metrics to their idle values. `manually_down` is kept.
    pub fn reset_metrics(&mut self) {
        self.status = NodeStatus::Idle;
        self.queue_depth = 0.0;
    }
}

/// A node of the topology: identity, configuration and runtime state.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    id: NodeId,
    label: String,
    config: NodeConfig,
    state: NodeState,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, label: impl Into<String>, config: NodeConfig) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            config,
            state: NodeState::default(),
        }
    }

    #[inline]
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[inline]
    pub fn kind(&self) -> NodeKind {
        self.config.kind()
    }

    #[inline]
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    #[inline]
    pub fn state(&self) -> &NodeState {
        &self.state
    }

    #[inline]
    pub fn is_down(&self) -> bool {
        self.state.manually_down
    }

    /// Apply a single field change, validating it against this node kind.
    pub fn apply(&mut self, patch: &ConfigPatch) -> Result<(), ConfigError> {
        patch.apply_to(&mut self.config)
    }

    pub(crate) fn state_mut(&mut self) -> &mut NodeState {
        &mut self.state
    }

    /// Same identity, label and config: runtime state is not compared.
    pub fn same_definition(&self, other: &Self) -> bool {
        self.id == other.id && self.label == other.label && self.config == other.config
    }

    /// Take `other`'s label and configuration, keep our runtime state.
    pub(crate) fn redefine(&mut self, other: Node) {
        self.label = other.label;
        self.config = other.config;
    }

    /// Start from a given runtime state instead of idle.
    #[must_use]
    pub fn with_state(mut self, state: NodeState) -> Self {
        self.state = state;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_accepts_editor_names() {
        let kinds: Vec<NodeKind> =
            serde_json::from_str(r#"["loadbalancer","appserver","dbrouter","load_balancer"]"#)
                .unwrap();
        assert_eq!(
            kinds,
            vec![
                NodeKind::LoadBalancer,
                NodeKind::AppServer,
                NodeKind::DbRouter,
                NodeKind::LoadBalancer
            ]
        );
    }

    #[test]
    fn kind_serializes_with_snake_case() {
        assert_eq!(
            serde_json::to_string(&NodeKind::DbRouter).unwrap(),
            "\"db_router\""
        );
        assert_eq!(NodeKind::AppServer.to_string(), "app_server");
    }

    #[test]
    fn status_serializes_with_snake_case() {
        assert_eq!(
            serde_json::to_string(&NodeStatus::Overloaded).unwrap(),
            "\"overloaded\""
        );
    }

    #[test]
    fn only_capacity_nodes_have_max_rps() {
        let client = NodeConfig::Client(ClientConfig {
            rps: 10.0,
            read_ratio: Ratio::ONE,
        });
        let server = NodeConfig::AppServer(ServerConfig {
            max_rps: 100.0,
            base_latency: 20.0,
            concurrency_limit: 0.0,
        });
        assert_eq!(client.max_rps(), None);
        assert_eq!(server.max_rps(), Some(100.0));
    }

    #[test]
    fn reset_metrics_keeps_failure_injection() {
        let mut state = NodeState {
            status: NodeStatus::Down,
            queue_depth: 12.0,
            manually_down: true,
        };
        state.reset_metrics();
        assert_eq!(state.status, NodeStatus::Idle);
        assert_eq!(state.queue_depth, 0.0);
        assert!(state.manually_down);
    }
}
