/*!
# flowsim

Runs [`flowsim_core`] simulations as live sessions on a tokio runtime.

Every session is an actor: a single task owning its [`Simulation`],
applying commands from a mailbox and advancing one tick per period.
Each tick's [`TickSnapshot`] is broadcast to every subscriber of the
session. The [`SessionRegistry`] creates, finds and stops sessions.

```
use flowsim::{RegistryConfig, SessionRegistry};
use flowsim_core::{node::NodeKind, topology::Edge, wire::{ArchitectureSpec, NodeSpec}};

# #[tokio::main(flavor = "current_thread")]
# async fn main() -> anyhow::Result<()> {
let registry = SessionRegistry::new(RegistryConfig::default());
let session = registry
    .create_session(ArchitectureSpec {
        nodes: vec![
            NodeSpec::new("users", NodeKind::Client),
            NodeSpec::new("api", NodeKind::AppServer),
        ],
        edges: vec![Edge::new("users", "api")],
        traffic_rps: Some(50.0),
    })
    .await?;

let mut snapshots = session.subscribe().await?;
let first = snapshots.next().await.expect("session is running");
assert_eq!(first.tick, 1);
assert_eq!(first.total_rps, 50.0);

registry.shutdown().await?;
# Ok(())
# }
```

[`Simulation`]: flowsim_core::Simulation
[`TickSnapshot`]: flowsim_core::TickSnapshot
*/

mod config;
pub mod defaults;
mod error;
mod registry;
mod session;
mod shutdown;
mod stream;

pub use self::{
    config::{EngineConfig, RegistryConfig},
    error::SessionError,
    registry::SessionRegistry,
    session::{GraphUpdate, SessionHandle, SessionId},
    stream::SnapshotStream,
};
