use crate::node::{NodeId, NodeKind, NodeStatus};
use serde::{Deserialize, Serialize};

/// The immutable result of one tick, as streamed to observers.
///
/// Rates are in requests per second, latencies in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickSnapshot {
    /// Starts at `1` for the first tick of a session.
    pub tick: u64,
    /// Wall clock time of the tick, milliseconds since the unix epoch.
    pub timestamp: u64,
    /// Offered demand: output of every live client, spike included.
    #[serde(rename = "totalRPS")]
    pub total_rps: f64,
    /// Throughput absorbed by terminal nodes.
    #[serde(rename = "servedRPS")]
    pub served_rps: f64,
    /// Sum of every node's `dropped`.
    #[serde(rename = "droppedRPS")]
    pub dropped_rps: f64,
    pub spike_active: bool,
    /// Every node that is `overloaded` this tick.
    pub bottleneck_ids: Vec<NodeId>,
    pub nodes: Vec<NodeSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub kind: NodeKind,
    pub label: String,
    pub status: NodeStatus,
    pub utilization: f64,
    pub latency: f64,
    pub throughput: f64,
    pub queue_depth: f64,
    pub dropped: f64,
    /// Volume rejected by load balancer admission control.
    pub drop_rate: f64,
    pub read_throughput: f64,
    pub write_throughput: f64,
    pub arrival_read: f64,
    pub arrival_write: f64,
    /// `null` for nodes without a capacity limit.
    pub effective_capacity: Option<f64>,
    pub manually_down: bool,
}

impl TickSnapshot {
    pub fn node(&self, id: &str) -> Option<&NodeSnapshot> {
        self.nodes.iter().find(|node| node.id.as_str() == id)
    }
}

impl NodeSnapshot {
    #[inline]
    pub fn arrival(&self) -> f64 {
        self.arrival_read + self.arrival_write
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names() {
        let snapshot = TickSnapshot {
            tick: 3,
            timestamp: 1_700_000_000_000,
            total_rps: 200.0,
            served_rps: 150.0,
            dropped_rps: 50.0,
            spike_active: false,
            bottleneck_ids: vec!["api".into()],
            nodes: vec![NodeSnapshot {
                id: "api".into(),
                kind: NodeKind::AppServer,
                label: "API".to_owned(),
                status: NodeStatus::Overloaded,
                utilization: 1.0,
                latency: 2_000.0,
                throughput: 100.0,
                queue_depth: 100.0,
                dropped: 50.0,
                drop_rate: 0.0,
                read_throughput: 70.0,
                write_throughput: 30.0,
                arrival_read: 105.0,
                arrival_write: 45.0,
                effective_capacity: None,
                manually_down: false,
            }],
        };

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["totalRPS"], 200.0);
        assert_eq!(json["servedRPS"], 150.0);
        assert_eq!(json["droppedRPS"], 50.0);
        assert_eq!(json["spikeActive"], false);
        assert_eq!(json["bottleneckIds"][0], "api");

        let node = &json["nodes"][0];
        assert_eq!(node["kind"], "app_server");
        assert_eq!(node["status"], "overloaded");
        assert_eq!(node["queueDepth"], 100.0);
        assert_eq!(node["readThroughput"], 70.0);
        assert_eq!(node["arrivalWrite"], 45.0);
        assert!(node["effectiveCapacity"].is_null());
        assert_eq!(node["manuallyDown"], false);

        assert_eq!(snapshot.node("api").unwrap().arrival(), 150.0);
        assert!(snapshot.node("db").is_none());
    }
}
