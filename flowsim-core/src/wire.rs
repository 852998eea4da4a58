//! Structured payloads exchanged with the editor.
//!
//! The editor sends a flat record per node: every node carries the same
//! optional fields whatever its kind. Fields that do not exist on a kind
//! are ignored here; zero capacities mean "not set" and take the
//! defaults of [`crate::defaults`].

use crate::{
    defaults::{
        DEFAULT_APP_SERVER_BASE_LATENCY, DEFAULT_APP_SERVER_MAX_RPS, DEFAULT_BACKPRESSURE_THRESHOLD,
        DEFAULT_DATABASE_BASE_LATENCY, DEFAULT_DATABASE_MAX_RPS, DEFAULT_LOAD_BALANCER_MAX_RPS,
        DEFAULT_READ_RATIO, DEFAULT_TRAFFIC_RPS,
    },
    node::{
        Algorithm, ClientConfig, ConfigError, ConfigPatch, DatabaseConfig, DbRouterConfig,
        FieldValue, LoadBalancerConfig, Node, NodeConfig, NodeId, NodeKind, ServerConfig,
        config::{capacity, rate, ratio, threshold},
    },
    topology::Edge,
};
use serde::{Deserialize, Serialize};

/// A node definition as sent by the editor.
///
/// Numeric fields left at `0` take their default, as the editor sends `0`
/// for anything unset. This includes `readRatio`, so a write-only client
/// is created with the default ratio and then patched with
/// `{"field": "readRatio", "value": 0}`.
///
/// ```
/// use flowsim_core::{node::NodeKind, wire::NodeSpec};
///
/// let spec: NodeSpec = serde_json::from_str(
///     r#"{"id":"db","type":"database","maxRPS":0,"isReplica":true}"#,
/// ).unwrap();
/// let node = spec.into_node(100.0).unwrap();
///
/// assert_eq!(node.kind(), NodeKind::Database);
/// assert_eq!(node.label(), "db");
/// // zero means "use the default"
/// assert_eq!(node.config().max_rps(), Some(50.0));
/// assert!(node.config().is_replica());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSpec {
    pub id: NodeId,
    #[serde(rename = "type", alias = "kind")]
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rps: Option<f64>,
    #[serde(
        rename = "maxRPS",
        alias = "maxRps",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub max_rps: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_latency: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency_limit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<Algorithm>,
    /// `0` is read as unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_ratio: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backpressure_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backpressure_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_replica: Option<bool>,
}

/// `None` and `0` both mean "not set".
fn or_default(value: Option<f64>, default: f64) -> f64 {
    match value {
        Some(value) if value != 0.0 => value,
        _ => default,
    }
}

impl NodeSpec {
    /// A node of `kind` with every optional field unset.
    pub fn new(id: impl Into<NodeId>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            kind,
            label: None,
            rps: None,
            max_rps: None,
            base_latency: None,
            concurrency_limit: None,
            algorithm: None,
            read_ratio: None,
            backpressure_enabled: None,
            backpressure_threshold: None,
            is_replica: None,
        }
    }

    /// Resolve defaults and validate the fields meaningful for this kind.
    ///
    /// `traffic_rps` is the offered load given to a client that does not
    /// set its own `rps`.
    pub fn into_node(self, traffic_rps: f64) -> Result<Node, ConfigError> {
        let config = match self.kind {
            NodeKind::Client => NodeConfig::Client(ClientConfig {
                rps: rate("rps", or_default(self.rps, traffic_rps))?,
                read_ratio: self.read_ratio()?,
            }),
            NodeKind::LoadBalancer => NodeConfig::LoadBalancer(LoadBalancerConfig {
                max_rps: capacity(
                    "maxRPS",
                    or_default(self.max_rps, DEFAULT_LOAD_BALANCER_MAX_RPS),
                )?,
                algorithm: self.algorithm.unwrap_or_default(),
                backpressure_enabled: self.backpressure_enabled.unwrap_or(false),
                backpressure_threshold: threshold(
                    "backpressureThreshold",
                    or_default(self.backpressure_threshold, DEFAULT_BACKPRESSURE_THRESHOLD),
                )?,
            }),
            NodeKind::AppServer => NodeConfig::AppServer(self.server(
                DEFAULT_APP_SERVER_MAX_RPS,
                DEFAULT_APP_SERVER_BASE_LATENCY,
            )?),
            NodeKind::Database => NodeConfig::Database(DatabaseConfig {
                server: self.server(DEFAULT_DATABASE_MAX_RPS, DEFAULT_DATABASE_BASE_LATENCY)?,
                is_replica: self.is_replica.unwrap_or(false),
            }),
            NodeKind::DbRouter => NodeConfig::DbRouter(DbRouterConfig {
                read_ratio: self.read_ratio()?,
            }),
        };

        let label = match self.label {
            Some(label) if !label.is_empty() => label,
            _ => self.id.as_str().to_owned(),
        };
        Ok(Node::new(self.id, label, config))
    }

    fn read_ratio(&self) -> Result<crate::measure::Ratio, ConfigError> {
        ratio("readRatio", or_default(self.read_ratio, DEFAULT_READ_RATIO))
    }

    fn server(&self, max_rps: f64, base_latency: f64) -> Result<ServerConfig, ConfigError> {
        Ok(ServerConfig {
            max_rps: capacity("maxRPS", or_default(self.max_rps, max_rps))?,
            base_latency: capacity("baseLatency", or_default(self.base_latency, base_latency))?,
            concurrency_limit: rate("concurrencyLimit", self.concurrency_limit.unwrap_or(0.0))?,
        })
    }
}

/// A full topology: the body of a create or update-graph request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchitectureSpec {
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    /// Offered load of clients without their own `rps`.
    #[serde(rename = "trafficRPS", default, skip_serializing_if = "Option::is_none")]
    pub traffic_rps: Option<f64>,
}

impl ArchitectureSpec {
    /// The session traffic, [`DEFAULT_TRAFFIC_RPS`] when unset or zero.
    pub fn traffic_rps(&self) -> Result<f64, ConfigError> {
        rate("trafficRPS", or_default(self.traffic_rps, DEFAULT_TRAFFIC_RPS))
    }

    /// Resolve every node, giving clients without `rps` the `traffic_rps`.
    pub fn into_parts(self, traffic_rps: f64) -> Result<(Vec<Node>, Vec<Edge>), ConfigError> {
        let nodes = self
            .nodes
            .into_iter()
            .map(|spec| spec.into_node(traffic_rps))
            .collect::<Result<_, _>>()?;
        Ok((nodes, self.edges))
    }
}

/// `{nodeId, field, value}`: a change to a single configuration field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigUpdate {
    pub node_id: NodeId,
    pub field: String,
    pub value: FieldValue,
}

impl ConfigUpdate {
    pub fn patch(self) -> Result<(NodeId, ConfigPatch), ConfigError> {
        let patch = ConfigPatch::parse(&self.field, self.value)?;
        Ok((self.node_id, patch))
    }
}

/// `{nodeId, down}`: failure injection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleNode {
    pub node_id: NodeId,
    pub down: bool,
}

/// `{rps?, spike?}`: traffic shaping. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrafficUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rps: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spike: Option<bool>,
}
