//! The network arena: node storage, wiring, and unique-name enforcement.

use log::debug;
use petgraph::graph::DiGraph;
use petgraph::Direction;
use std::collections::HashSet;
use thiserror::Error;

use super::node::{Node, NodeId, NodeKind, Tag};
use crate::reservoir::Reservoir;

/// Invalid wiring or node data, reported while the network is being built.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NetworkError {
    #[error("no node with id {id:?} in this network")]
    UnknownNode { id: NodeId },
    #[error("node '{node}' references unknown sender {sender:?}")]
    UnknownSender { node: String, sender: NodeId },
    #[error("'{sender}' already sends flow to '{node}'")]
    DuplicateSender { node: String, sender: String },
    #[error("'{sender}' does not send flow to '{node}'")]
    NoSuchSender { node: String, sender: String },
    #[error("inflow node '{node}' cannot receive flow")]
    InflowReceivesFlow { node: String },
    #[error("inflow series for '{node}' has negative value {value} at index {index}")]
    NegativeInflow {
        node: String,
        index: usize,
        value: f64,
    },
}

/// A collection of nodes connected by the senders relation.
///
/// Nodes live in an index arena; edges point sender -> receiver. Wiring may
/// be edited freely here, but once a `System` takes ownership the graph is
/// fixed for the rest of the run.
#[derive(Debug, Clone, Default)]
pub struct Network {
    pub(crate) graph: DiGraph<Node, ()>,
    used_names: HashSet<String>,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Adds an inflow node reading from `data`, beginning at
    /// `starting_position`. The series must be non-negative.
    pub fn add_inflow(
        &mut self,
        name: &str,
        data: Vec<f64>,
        starting_position: usize,
    ) -> Result<NodeId, NetworkError> {
        if let Some((index, &value)) = data.iter().enumerate().find(|(_, v)| **v < 0.0) {
            return Err(NetworkError::NegativeInflow {
                node: name.to_string(),
                index,
                value,
            });
        }
        let name = self.unique_name(name, Tag::Inflow);
        Ok(self.push_node(Node {
            name,
            kind: NodeKind::Inflow {
                data,
                starting_position,
            },
        }))
    }

    /// Adds a storage node owning `reservoir`, fed by `senders`.
    pub fn add_storage(
        &mut self,
        name: &str,
        reservoir: Reservoir,
        senders: &[NodeId],
    ) -> Result<NodeId, NetworkError> {
        self.check_senders(name, senders)?;
        let name = self.unique_name(name, Tag::Storage);
        let id = self.push_node(Node {
            name,
            kind: NodeKind::Storage { reservoir },
        });
        for &sender in senders {
            self.graph.add_edge(sender, id, ());
        }
        Ok(id)
    }

    /// Adds a terminal outlet node relaying the sum of `senders`.
    pub fn add_outlet(&mut self, name: &str, senders: &[NodeId]) -> Result<NodeId, NetworkError> {
        self.check_senders(name, senders)?;
        let name = self.unique_name(name, Tag::Outlet);
        let id = self.push_node(Node {
            name,
            kind: NodeKind::Outlet,
        });
        for &sender in senders {
            self.graph.add_edge(sender, id, ());
        }
        Ok(id)
    }

    /// Wires `sender` into `receiver`. Both nodes must already exist.
    pub fn add_sender(&mut self, receiver: NodeId, sender: NodeId) -> Result<(), NetworkError> {
        self.check_pair(receiver, sender)?;
        if self.graph[receiver].tag() == Tag::Inflow {
            return Err(NetworkError::InflowReceivesFlow {
                node: self.graph[receiver].name.clone(),
            });
        }
        if self.graph.find_edge(sender, receiver).is_some() {
            return Err(NetworkError::DuplicateSender {
                node: self.graph[receiver].name.clone(),
                sender: self.graph[sender].name.clone(),
            });
        }
        self.graph.add_edge(sender, receiver, ());
        Ok(())
    }

    /// Unwires an existing sender edge.
    pub fn remove_sender(&mut self, receiver: NodeId, sender: NodeId) -> Result<(), NetworkError> {
        self.check_pair(receiver, sender)?;
        match self.graph.find_edge(sender, receiver) {
            Some(edge) => {
                self.graph.remove_edge(edge);
                Ok(())
            }
            None => Err(NetworkError::NoSuchSender {
                node: self.graph[receiver].name.clone(),
                sender: self.graph[sender].name.clone(),
            }),
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.graph.node_weight(id)
    }

    /// Looks a node up by its (unique) name.
    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.graph.node_indices().find(|&id| self.graph[id].name == name)
    }

    /// The upstream nodes whose output `id` consumes, in insertion order.
    pub fn senders(&self, id: NodeId) -> Vec<NodeId> {
        let mut senders: Vec<NodeId> = self
            .graph
            .neighbors_directed(id, Direction::Incoming)
            .collect();
        senders.sort_unstable();
        senders
    }

    fn push_node(&mut self, node: Node) -> NodeId {
        debug!("adding {} node '{}'", node.tag().as_str(), node.name);
        self.graph.add_node(node)
    }

    // Names must stay unique: logs and exported files are keyed by them.
    fn unique_name(&mut self, requested: &str, tag: Tag) -> String {
        let base = if requested.is_empty() {
            tag.as_str()
        } else {
            requested
        };
        let mut candidate = base.to_string();
        let mut counter = 1;
        while self.used_names.contains(&candidate) {
            counter += 1;
            candidate = format!("{base}_{counter}");
        }
        self.used_names.insert(candidate.clone());
        candidate
    }

    fn check_senders(&self, receiver: &str, senders: &[NodeId]) -> Result<(), NetworkError> {
        let mut seen = HashSet::new();
        for &sender in senders {
            if sender.index() >= self.graph.node_count() {
                return Err(NetworkError::UnknownSender {
                    node: receiver.to_string(),
                    sender,
                });
            }
            if !seen.insert(sender) {
                return Err(NetworkError::DuplicateSender {
                    node: receiver.to_string(),
                    sender: self.graph[sender].name.clone(),
                });
            }
        }
        Ok(())
    }

    fn check_pair(&self, receiver: NodeId, sender: NodeId) -> Result<(), NetworkError> {
        if receiver.index() >= self.graph.node_count() {
            return Err(NetworkError::UnknownNode { id: receiver });
        }
        if sender.index() >= self.graph.node_count() {
            return Err(NetworkError::UnknownSender {
                node: self.graph[receiver].name.clone(),
                sender,
            });
        }
        Ok(())
    }
}
