//! The node graph: roles, arena storage, wiring, and evaluation ordering.
pub mod graph;
pub mod node;
pub mod topology;

// Re-export key types for convenient access
pub use graph::{Network, NetworkError};
pub use node::{Node, NodeId, NodeKind, Tag};
pub use topology::OrderError;
