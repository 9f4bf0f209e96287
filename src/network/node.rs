//! Defines the node roles and the `Node` type stored at each vertex of a
//! water-routing network.

use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};

use crate::reservoir::Reservoir;

/// A unique, stable identifier for a node within a network.
///
/// This is a type alias for `petgraph::graph::NodeIndex` to abstract the
/// underlying graph implementation. Identifiers stay valid for the life of
/// the network because nodes are never removed.
pub type NodeId = NodeIndex;

/// The role a node plays in the routing network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tag {
    /// Upstream-most role: introduces new flow from a data series.
    Inflow,
    /// Accepts upstream flow, stores water, releases downstream.
    Storage,
    /// Downstream-most role: relays the sum of its senders out of the network.
    Outlet,
}

impl Tag {
    /// Lowercase label, used for default node names and log headers.
    pub fn as_str(&self) -> &'static str {
        match self {
            Tag::Inflow => "inflow",
            Tag::Storage => "storage",
            Tag::Outlet => "outlet",
        }
    }
}

/// Per-role payload.
///
/// The role set is closed and per-variant record shapes differ, so roles are
/// an enum rather than an open trait object.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Flow read from a fixed series, one value per step.
    Inflow {
        data: Vec<f64>,
        /// Index into `data` of the first simulated step.
        starting_position: usize,
    },
    /// Routed storage. The reservoir is owned exclusively by this node.
    Storage { reservoir: Reservoir },
    /// Terminal relay with no internal state.
    Outlet,
}

/// A node in the network: the graph vertex weight.
///
/// A node does not own its senders; the graph's edges carry that relation
/// and the node only reads its senders' last-computed outputs.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Unique human-readable identifier; log files derive from it.
    pub name: String,
    pub kind: NodeKind,
}

impl Node {
    pub fn tag(&self) -> Tag {
        match self.kind {
            NodeKind::Inflow { .. } => Tag::Inflow,
            NodeKind::Storage { .. } => Tag::Storage,
            NodeKind::Outlet => Tag::Outlet,
        }
    }

    /// Column names for this node's log, fixed for the node's lifetime.
    ///
    /// Inflow and outlet nodes record a single column named after the node.
    /// Storage nodes record the aggregate inflow, one release column per
    /// reservoir outlet, then spill and storage.
    pub fn output_headers(&self) -> Vec<String> {
        match &self.kind {
            NodeKind::Inflow { .. } | NodeKind::Outlet => vec![self.name.clone()],
            NodeKind::Storage { reservoir } => {
                let mut headers = vec![Tag::Inflow.as_str().to_string()];
                headers.extend(reservoir.output_headers());
                headers
            }
        }
    }
}
