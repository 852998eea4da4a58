//! Deterministic, discrete-time request flow simulation.
//!
//! A [`Topology`] of clients, load balancers, application servers,
//! databases and database routers is evaluated one tick at a time: client
//! traffic is pushed through the graph in topological order, every node
//! applies its capacity model, and the result of the tick is returned as
//! an immutable [`TickSnapshot`].
//!
//! This crate has no notion of wall clock time or concurrency. A
//! [`Simulation`] only advances when [`Simulation::step`] is called, which
//! makes it suitable for tests and for driving from an async runtime.
//!
//! ```
//! use flowsim_core::{
//!     node::{Node, NodeConfig, NodeId, NodeStatus},
//!     sim::Simulation,
//!     topology::{Edge, Topology},
//! };
//!
//! let topology = Topology::new(
//!     vec![
//!         Node::new("users", "Users", NodeConfig::client(150.0)),
//!         Node::new("api", "API", NodeConfig::app_server(100.0, 20.0)),
//!     ],
//!     vec![Edge::new("users", "api")],
//! )?;
//! let mut sim = Simulation::new(topology, 150.0);
//!
//! let snapshot = sim.step(0);
//! let api = snapshot.node("api").unwrap();
//! assert_eq!(api.status, NodeStatus::Overloaded);
//! assert_eq!(snapshot.bottleneck_ids, vec![NodeId::from("api")]);
//! # Ok::<(), flowsim_core::topology::TopologyError>(())
//! ```
//!
//! [`Topology`]: topology::Topology
//! [`TickSnapshot`]: snapshot::TickSnapshot
//! [`Simulation`]: sim::Simulation
//! [`Simulation::step`]: sim::Simulation::step

pub mod behavior;
pub mod defaults;
pub mod measure;
pub mod node;
pub mod propagation;
pub mod sim;
pub mod snapshot;
pub mod topology;
pub mod wire;

pub use self::{
    sim::{SimError, Simulation},
    snapshot::{NodeSnapshot, TickSnapshot},
};
