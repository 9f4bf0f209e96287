//! Time-step orchestration and result bookkeeping.
pub mod ledger;
pub mod system;

// Re-export key types for convenient access
pub use ledger::{Ledger, Log, StepError, StepFailure};
pub use system::System;
