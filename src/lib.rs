//! Discrete-time water routing over a directed network of hydrological
//! nodes.
//!
//! A [`Network`] of inflow, storage, and outlet nodes is wrapped in a
//! [`System`], which resolves a dependency-respecting evaluation order once
//! and then advances the whole network step by step. Each storage node owns
//! a [`Reservoir`] that runs a conservative water-balance update; every node
//! appends one record per step to its [`Log`], collected in the system's
//! [`Ledger`] for inspection or export after the run.
//!
//! ```
//! use hydronet::{Network, Reservoir, System};
//!
//! let mut network = Network::new();
//! let inflow = network.add_inflow("inflow", vec![0.0, 1.0, 2.0], 0)?;
//! let storage = network.add_storage("storage", Reservoir::default(), &[inflow])?;
//! network.add_outlet("outlet", &[storage])?;
//!
//! let mut system = System::new(network)?;
//! system.simulate(3)?;
//! assert_eq!(system.log("outlet").unwrap().len(), 3);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod network;
pub mod reservoir;
pub mod simulation;

pub use network::{Network, NetworkError, Node, NodeId, NodeKind, OrderError, Tag};
pub use reservoir::{
    Balance, ConfigurationError, FailureState, OperationMode, Outlet, Reservoir, ReleaseRange,
};
pub use simulation::{Ledger, Log, StepError, StepFailure, System};
