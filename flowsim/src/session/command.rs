use crate::{SessionError, stream::SnapshotStream};
use flowsim_core::{
    Simulation, TickSnapshot,
    node::{ConfigPatch, NodeId},
    topology::TopologyDelta,
    wire::ArchitectureSpec,
};
use std::sync::Arc;
use tokio::sync::oneshot;

pub(crate) type Reply<T> = oneshot::Sender<Result<T, SessionError>>;

/// A structural change to the topology of a session.
#[derive(Debug, Clone)]
pub enum GraphUpdate {
    Delta(TopologyDelta),
    /// Full replacement payload, diffed against the current graph.
    Replace(ArchitectureSpec),
}

/// Messages consumed one at a time by the session engine.
pub(crate) enum Command {
    Start(Box<Simulation>, Reply<()>),
    Stop(Reply<()>),
    UpdateGraph(GraphUpdate, Reply<()>),
    UpdateConfig {
        node_id: NodeId,
        patch: ConfigPatch,
        reply: Reply<()>,
    },
    ToggleNode {
        node_id: NodeId,
        down: bool,
        reply: Reply<()>,
    },
    SetTrafficSpike(bool, Reply<()>),
    SetTrafficRps(f64, Reply<()>),
    ResetQueues(Reply<()>),
    Subscribe(Reply<SnapshotStream>),
    Snapshot(Reply<Option<Arc<TickSnapshot>>>),
}

impl Command {
    /// Answer the command without executing it.
    pub(crate) fn reject(self, error: SessionError) {
        // the caller may have given up waiting, nothing to do then
        match self {
            Self::Start(_, reply)
            | Self::Stop(reply)
            | Self::UpdateGraph(_, reply)
            | Self::UpdateConfig { reply, .. }
            | Self::ToggleNode { reply, .. }
            | Self::SetTrafficSpike(_, reply)
            | Self::SetTrafficRps(_, reply)
            | Self::ResetQueues(reply) => {
                let _ = reply.send(Err(error));
            }
            Self::Subscribe(reply) => {
                let _ = reply.send(Err(error));
            }
            Self::Snapshot(reply) => {
                let _ = reply.send(Err(error));
            }
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::Start(..) => "start",
            Self::Stop(..) => "stop",
            Self::UpdateGraph(..) => "update_graph",
            Self::UpdateConfig { .. } => "update_config",
            Self::ToggleNode { .. } => "toggle_node",
            Self::SetTrafficSpike(..) => "set_traffic_spike",
            Self::SetTrafficRps(..) => "set_traffic_rps",
            Self::ResetQueues(..) => "reset_queues",
            Self::Subscribe(..) => "subscribe",
            Self::Snapshot(..) => "snapshot",
        }
    }
}
