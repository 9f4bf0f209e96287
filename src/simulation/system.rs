//! The simulation orchestrator: drives the time-step loop over an ordered
//! network and routes each node's record into its log.

use log::{debug, info};
use petgraph::Direction;
use smallvec::SmallVec;
use std::io;
use std::path::PathBuf;

use super::ledger::{Ledger, Log, StepError, StepFailure};
use crate::network::{topology, Network, NodeId, NodeKind, OrderError};

/// A runnable water-routing system.
///
/// Construction resolves the evaluation order once. `simulate` may then be
/// called any number of times; step indices continue from the count already
/// completed, so a `simulate(5)` followed by another `simulate(5)` matches a
/// single `simulate(10)`.
#[derive(Debug, Clone)]
pub struct System {
    network: Network,
    order: Vec<NodeId>,
    /// Flattened sender lists, indexed by node.
    senders: Vec<SmallVec<[NodeId; 2]>>,
    ledger: Ledger,
    steps_completed: usize,
    log_directory: Option<PathBuf>,
}

impl System {
    /// Takes ownership of the network and computes the evaluation order.
    pub fn new(network: Network) -> Result<Self, OrderError> {
        let order = topology::sort(&network.graph)?;
        debug!(
            "evaluation order: {:?}",
            order
                .iter()
                .map(|&id| network.graph[id].name.as_str())
                .collect::<Vec<_>>()
        );

        let mut senders = Vec::with_capacity(network.node_count());
        let mut ledger = Ledger::default();
        for id in network.graph.node_indices() {
            let mut list: SmallVec<[NodeId; 2]> = network
                .graph
                .neighbors_directed(id, Direction::Incoming)
                .collect();
            list.sort_unstable();
            senders.push(list);

            let node = &network.graph[id];
            ledger.register(node.name.clone(), Log::new(node.output_headers()));
        }

        Ok(Self {
            network,
            order,
            senders,
            ledger,
            steps_completed: 0,
            log_directory: None,
        })
    }

    /// Like [`System::new`], with a destination directory for log export.
    pub fn with_log_directory(
        network: Network,
        directory: impl Into<PathBuf>,
    ) -> Result<Self, OrderError> {
        let mut system = Self::new(network)?;
        system.log_directory = Some(directory.into());
        Ok(system)
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn steps_completed(&self) -> usize {
        self.steps_completed
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn into_ledger(self) -> Ledger {
        self.ledger
    }

    pub fn log(&self, name: &str) -> Option<&Log> {
        self.ledger.get(name)
    }

    /// Runs `step_count` further time steps.
    ///
    /// Halts at the first failing node; records appended before the failure
    /// are kept and stay readable through the ledger.
    pub fn simulate(&mut self, step_count: usize) -> Result<(), StepFailure> {
        let first = self.steps_completed;
        let mut outputs = vec![0.0; self.network.node_count()];
        for step in first..first + step_count {
            self.step_forward(step, &mut outputs)?;
            self.steps_completed = step + 1;
        }
        info!(
            "simulated steps {first}..{} over {} nodes",
            self.steps_completed,
            self.network.node_count()
        );
        Ok(())
    }

    /// Writes one delimited file per node into the configured log directory.
    pub fn flush_logs(&self) -> io::Result<()> {
        match &self.log_directory {
            Some(directory) => self.ledger.flush_all(directory),
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "no log directory configured",
            )),
        }
    }

    /// Evaluates every node once, in dependency order.
    ///
    /// `outputs` holds each node's current-step output; a node's slot is
    /// written before any downstream node reads it, so within one step every
    /// node sees exactly its senders' finished values.
    fn step_forward(&mut self, step: usize, outputs: &mut [f64]) -> Result<(), StepFailure> {
        for &id in &self.order {
            let received: f64 = self.senders[id.index()]
                .iter()
                .map(|sender| outputs[sender.index()])
                .sum();

            let node = &mut self.network.graph[id];
            let sent = match &mut node.kind {
                NodeKind::Inflow {
                    data,
                    starting_position,
                } => {
                    let position = *starting_position + step;
                    let value = data.get(position).copied().ok_or_else(|| StepFailure {
                        node: node.name.clone(),
                        step,
                        source: StepError::OutOfData {
                            position,
                            len: data.len(),
                        },
                    })?;
                    self.ledger.at_mut(id.index()).append(vec![value]);
                    value
                }
                NodeKind::Storage { reservoir } => {
                    let balance = reservoir.operate(step, received);
                    let mut row = Vec::with_capacity(balance.releases.len() + 3);
                    row.push(received);
                    row.extend(balance.releases.iter().copied());
                    row.push(balance.spilled);
                    row.push(balance.volume);
                    self.ledger.at_mut(id.index()).append(row);
                    balance.outflow()
                }
                NodeKind::Outlet => {
                    self.ledger.at_mut(id.index()).append(vec![received]);
                    received
                }
            };
            outputs[id.index()] = sent;
        }
        Ok(())
    }
}
