//! Per-node record series and the ledger that owns them.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

pub use self::error::{StepError, StepFailure};
mod error {
    use thiserror::Error;

    /// A single node's per-step failure.
    #[derive(Error, Debug, Clone, PartialEq)]
    pub enum StepError {
        #[error("inflow series exhausted (position {position} beyond series of length {len})")]
        OutOfData { position: usize, len: usize },
    }

    /// A step-level failure, attributed to the originating node and step.
    ///
    /// Records appended before the failing node are kept; nothing is rolled
    /// back.
    #[derive(Error, Debug, Clone, PartialEq)]
    #[error("step {step} failed at node '{node}'")]
    pub struct StepFailure {
        pub node: String,
        pub step: usize,
        #[source]
        pub source: StepError,
    }
}

/// An append-only record series for one node: one row per completed step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Log {
    /// Column names, fixed at creation.
    pub data_headers: Vec<String>,
    /// One row per step, in step order.
    pub data: Vec<Vec<f64>>,
}

impl Log {
    pub fn new(data_headers: Vec<String>) -> Self {
        Self {
            data_headers,
            data: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub(crate) fn append(&mut self, row: Vec<f64>) {
        debug_assert_eq!(
            row.len(),
            self.data_headers.len(),
            "row shape must match the headers"
        );
        self.data.push(row);
    }

    /// Writes the series as a comma-delimited table: headers, then one row
    /// per step.
    pub fn flush<W: Write>(&self, mut out: W) -> io::Result<()> {
        writeln!(out, "{}", self.data_headers.join(","))?;
        for row in &self.data {
            let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
            writeln!(out, "{}", cells.join(","))?;
        }
        Ok(())
    }
}

/// Name-keyed logs in node-insertion order.
///
/// Owned by the `System` and read after a run; the explicit replacement for
/// a process-wide registry, so results live exactly as long as the system
/// that produced them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    entries: Vec<(String, Log)>,
}

impl Ledger {
    pub(crate) fn register(&mut self, name: String, log: Log) -> usize {
        self.entries.push((name, log));
        self.entries.len() - 1
    }

    pub(crate) fn at_mut(&mut self, index: usize) -> &mut Log {
        &mut self.entries[index].1
    }

    pub fn get(&self, name: &str) -> Option<&Log> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, log)| log)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Log)> {
        self.entries.iter().map(|(name, log)| (name.as_str(), log))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serializes every log, headers and rows, as JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Writes one `<name>.csv` per log into `directory`.
    pub fn flush_all(&self, directory: &Path) -> io::Result<()> {
        for (name, log) in self.iter() {
            let file = File::create(directory.join(format!("{name}.csv")))?;
            log.flush(BufWriter::new(file))?;
        }
        Ok(())
    }
}
