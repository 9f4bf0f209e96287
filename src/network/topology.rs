//! Deterministic evaluation ordering over the senders relation.

use petgraph::graph::DiGraph;
use petgraph::Direction;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use thiserror::Error;

use super::node::{Node, NodeId};

/// The senders relation could not be linearized.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrderError {
    #[error("cycle detected in senders relation involving node '{node}'")]
    Cycle { node: String },
}

/// Returns an evaluation order in which every node appears after all of its
/// senders (Kahn's algorithm).
///
/// The ready set is a min-heap on node index, so ties between nodes with no
/// ordering constraint always break toward earlier insertion order and
/// repeated calls over the same network yield identical sequences.
/// Disconnected subgraphs are ordered alongside each other.
pub fn sort(graph: &DiGraph<Node, ()>) -> Result<Vec<NodeId>, OrderError> {
    let count = graph.node_count();
    let mut in_degree = vec![0usize; count];
    let mut ready = BinaryHeap::with_capacity(count);
    let mut order = Vec::with_capacity(count);

    // 1. Seed with nodes that have no senders.
    for id in graph.node_indices() {
        let degree = graph.neighbors_directed(id, Direction::Incoming).count();
        in_degree[id.index()] = degree;
        if degree == 0 {
            ready.push(Reverse(id));
        }
    }

    // 2. Repeatedly emit the lowest-index ready node.
    while let Some(Reverse(id)) = ready.pop() {
        order.push(id);
        for receiver in graph.neighbors_directed(id, Direction::Outgoing) {
            let waiting = &mut in_degree[receiver.index()];
            *waiting -= 1;
            if *waiting == 0 {
                ready.push(Reverse(receiver));
            }
        }
    }

    // 3. Anything left waiting sits on a cycle.
    if order.len() != count {
        let stuck = graph
            .node_indices()
            .find(|id| in_degree[id.index()] > 0)
            .expect("BUG: a short order must leave a node with waiting senders");
        return Err(OrderError::Cycle {
            node: graph[stuck].name.clone(),
        });
    }

    Ok(order)
}
