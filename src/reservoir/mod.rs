//! The reservoir water-balance model owned by a storage node.

pub mod outlet;

pub use outlet::{FailureState, Outlet, ReleaseRange};

use log::warn;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;

/// Invalid reservoir parameters, reported at construction.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("reservoir capacity {value} is negative")]
    Capacity { value: f64 },
    #[error("outlet '{outlet}' height {height} is outside [0, {capacity}]")]
    OutletHeight {
        outlet: String,
        height: f64,
        capacity: f64,
    },
    #[error("outlet '{outlet}' release range [{min}, {max}] is invalid")]
    ReleaseRange { outlet: String, min: f64, max: f64 },
    #[error("initial volume {volume} is outside [0, {capacity}]")]
    InitialVolume { volume: f64, capacity: f64 },
}

/// How releases are chosen each step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OperationMode {
    /// Releases are a fixed function of volume relative to outlet heights.
    Passive,
    /// Releases additionally track a requested total release per step.
    ///
    /// `targets[t]` is the request for cumulative step `t`; steps beyond the
    /// end of the series fall back to passive behavior.
    Active { targets: Vec<f64> },
}

/// Result of one water-balance update.
#[derive(Debug, Clone, PartialEq)]
pub struct Balance {
    /// Release through each outlet, in ascending height order.
    pub releases: SmallVec<[f64; 2]>,
    /// Volume discharged over capacity without passing an outlet.
    pub spilled: f64,
    /// Storage volume at the end of the step.
    pub volume: f64,
}

impl Balance {
    /// Total flow delivered downstream this step.
    pub fn outflow(&self) -> f64 {
        self.releases.iter().sum()
    }
}

/// A reservoir: capacity, release paths, operating mode, and current volume.
///
/// `0 <= volume <= capacity` holds at the end of every step; water over
/// capacity is diverted to spill, never retained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservoir {
    capacity: f64,
    outlets: Vec<Outlet>,
    mode: OperationMode,
    volume: f64,
}

impl Default for Reservoir {
    /// Capacity 1, a single unlimited outlet at the capacity height, passive
    /// operation, empty storage.
    fn default() -> Self {
        Self {
            capacity: 1.0,
            outlets: outlet::normalize_outlets(vec![Outlet::at_height(1.0)]),
            mode: OperationMode::Passive,
            volume: 0.0,
        }
    }
}

impl Reservoir {
    /// Validates and normalizes the configuration.
    ///
    /// A capacity of zero is a valid degenerate pass-through; an empty
    /// outlet list is a valid store-then-spill configuration.
    pub fn new(
        capacity: f64,
        outlets: Vec<Outlet>,
        mode: OperationMode,
        initial_volume: f64,
    ) -> Result<Self, ConfigurationError> {
        if !(capacity >= 0.0) {
            return Err(ConfigurationError::Capacity { value: capacity });
        }
        let outlets = outlet::normalize_outlets(outlets);
        for outlet in &outlets {
            if !(outlet.height >= 0.0 && outlet.height <= capacity) {
                return Err(ConfigurationError::OutletHeight {
                    outlet: outlet.name.clone(),
                    height: outlet.height,
                    capacity,
                });
            }
            let ReleaseRange { min, max } = outlet.design_range;
            if !(min >= 0.0 && max >= min) {
                return Err(ConfigurationError::ReleaseRange {
                    outlet: outlet.name.clone(),
                    min,
                    max,
                });
            }
        }
        if !(initial_volume >= 0.0 && initial_volume <= capacity) {
            return Err(ConfigurationError::InitialVolume {
                volume: initial_volume,
                capacity,
            });
        }
        Ok(Self {
            capacity,
            outlets,
            mode,
            volume: initial_volume,
        })
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn outlets(&self) -> &[Outlet] {
        &self.outlets
    }

    /// Column names this reservoir contributes to its storage node's log:
    /// one release column per outlet, then spill and storage.
    pub fn output_headers(&self) -> Vec<String> {
        let mut headers: Vec<String> = self.outlets.iter().map(|o| o.name.clone()).collect();
        headers.push("spilled".to_string());
        headers.push("storage".to_string());
        headers
    }

    /// Runs one water-balance update and mutates the stored volume.
    ///
    /// `step` is the cumulative step index, used to look up Active-mode
    /// targets. Conservation holds every step:
    /// `inflow == outflow + spilled + (new_volume - old_volume)`.
    pub fn operate(&mut self, step: usize, inflow: f64) -> Balance {
        // 1. Provisional fill: all water available this step.
        let provisional = self.volume + inflow;

        // 2. Releases, ascending height order. Each release is deducted
        // before the next outlet is evaluated so the total can never exceed
        // the water present.
        let mut remaining = provisional;
        let mut remaining_target = match &self.mode {
            OperationMode::Passive => f64::INFINITY,
            OperationMode::Active { targets } => match targets.get(step) {
                Some(&target) => target.max(0.0).min(provisional),
                None => {
                    warn!("operating targets exhausted at step {step}; releasing passively");
                    f64::INFINITY
                }
            },
        };
        let mut releases: SmallVec<[f64; 2]> = SmallVec::with_capacity(self.outlets.len());
        for outlet in &self.outlets {
            let range = outlet.release_range(remaining);
            let release = remaining_target.clamp(range.min, range.max);
            releases.push(release);
            remaining -= release;
            remaining_target = (remaining_target - release).max(0.0);
        }

        // 3. Capacity enforcement: excess over capacity becomes spill.
        let volume = remaining.min(self.capacity);
        let spilled = (remaining - self.capacity).max(0.0);

        let balance = Balance {
            releases,
            spilled,
            volume,
        };
        debug_assert!(
            (inflow - (balance.outflow() + spilled + (volume - self.volume))).abs()
                <= 1e-9 * provisional.abs().max(1.0),
            "water balance violated at step {step}"
        );
        self.volume = volume;
        balance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn passive(capacity: f64, outlets: Vec<Outlet>) -> Reservoir {
        Reservoir::new(capacity, outlets, OperationMode::Passive, 0.0).expect("valid reservoir")
    }

    // Against the default reservoir: capacity 1, unlimited outlet at height
    // 1, starting empty.
    #[rstest]
    #[case(0.0, 0.0, 0.0, 0.0)]
    #[case(1.0, 0.0, 0.0, 1.0)]
    #[case(3.0, 2.0, 0.0, 1.0)]
    fn default_reservoir_balance(
        #[case] inflow: f64,
        #[case] outflow: f64,
        #[case] spilled: f64,
        #[case] volume: f64,
    ) {
        let mut reservoir = Reservoir::default();
        let balance = reservoir.operate(0, inflow);
        assert_eq!(balance.outflow(), outflow);
        assert_eq!(balance.spilled, spilled);
        assert_eq!(balance.volume, volume);
    }

    #[test]
    fn conservation_holds_across_steps() {
        let mut reservoir = passive(
            10.0,
            vec![Outlet::with_range(2.0, ReleaseRange::new(0.0, 1.5))],
        );
        let inflows = [0.0, 4.0, 1.0, 0.0, 7.5, 12.0, 0.25];
        for (step, &inflow) in inflows.iter().enumerate() {
            let before = reservoir.volume();
            let balance = reservoir.operate(step, inflow);
            assert_eq!(
                inflow,
                balance.outflow() + balance.spilled + (balance.volume - before),
                "conservation at step {step}"
            );
            assert!(balance.volume >= 0.0 && balance.volume <= reservoir.capacity());
            assert!(balance.outflow() >= 0.0 && balance.spilled >= 0.0);
        }
    }

    #[test]
    fn zero_capacity_passes_everything_through() {
        let mut reservoir = passive(0.0, vec![Outlet::at_height(0.0)]);
        let balance = reservoir.operate(0, 3.0);
        assert_eq!(balance.outflow(), 3.0);
        assert_eq!(balance.spilled, 0.0);
        assert_eq!(balance.volume, 0.0);
    }

    #[test]
    fn no_outlets_accumulates_then_spills() {
        let mut reservoir = passive(2.0, vec![]);
        assert_eq!(reservoir.operate(0, 1.5).spilled, 0.0);
        let balance = reservoir.operate(1, 1.5);
        assert_eq!(balance.outflow(), 0.0);
        assert_eq!(balance.spilled, 1.0);
        assert_eq!(balance.volume, 2.0);
    }

    #[test]
    fn ascending_outlets_release_lowest_first() {
        // Lower gate capped at 1 per step; upper gate unlimited above 3.
        let mut reservoir = passive(
            5.0,
            vec![
                Outlet::with_range(3.0, ReleaseRange::UNLIMITED),
                Outlet::with_range(1.0, ReleaseRange::new(0.0, 1.0)),
            ],
        );
        let balance = reservoir.operate(0, 5.0);
        assert_eq!(balance.releases.as_slice(), &[1.0, 1.0]);
        assert_eq!(balance.volume, 3.0);
    }

    #[test]
    fn closed_outlet_forces_storage_and_spill() {
        let mut outlet = Outlet::at_height(0.0);
        outlet.failure_state = FailureState::Closed;
        let mut reservoir = passive(1.0, vec![outlet]);
        assert_eq!(reservoir.operate(0, 1.0).outflow(), 0.0);
        let balance = reservoir.operate(1, 1.0);
        assert_eq!(balance.outflow(), 0.0);
        assert_eq!(balance.spilled, 1.0);
        assert_eq!(balance.volume, 1.0);
    }

    #[test]
    fn open_outlet_ignores_a_zero_target() {
        let mut outlet = Outlet::with_range(0.0, ReleaseRange::new(0.0, 2.0));
        outlet.failure_state = FailureState::Open;
        let mode = OperationMode::Active {
            targets: vec![0.0],
        };
        let mut reservoir = Reservoir::new(5.0, vec![outlet], mode, 4.0).expect("valid reservoir");
        assert_eq!(reservoir.operate(0, 0.0).outflow(), 2.0);
    }

    #[test]
    fn active_targets_clip_to_available_water() {
        let mode = OperationMode::Active {
            targets: vec![0.0, 2.0, 50.0],
        };
        let mut reservoir =
            Reservoir::new(4.0, vec![Outlet::at_height(0.0)], mode, 0.0).expect("valid reservoir");
        assert_eq!(reservoir.operate(0, 3.0).outflow(), 0.0);
        assert_eq!(reservoir.operate(1, 0.0).outflow(), 2.0);
        // Requested 50, only 1 left above the invert.
        assert_eq!(reservoir.operate(2, 0.0).outflow(), 1.0);
    }

    #[test]
    fn exhausted_targets_fall_back_to_passive() {
        let mode = OperationMode::Active {
            targets: vec![0.0],
        };
        let mut reservoir =
            Reservoir::new(4.0, vec![Outlet::at_height(0.0)], mode, 0.0).expect("valid reservoir");
        reservoir.operate(0, 2.0);
        assert_eq!(reservoir.operate(1, 0.0).outflow(), 2.0);
    }

    #[test]
    fn minimum_release_is_forced_in_active_mode() {
        let outlets = vec![Outlet::with_range(0.0, ReleaseRange::new(1.0, 5.0))];
        let mode = OperationMode::Active {
            targets: vec![0.0],
        };
        let mut reservoir = Reservoir::new(10.0, outlets, mode, 4.0).expect("valid reservoir");
        assert_eq!(reservoir.operate(0, 0.0).outflow(), 1.0);
    }

    #[test]
    fn rejects_negative_capacity() {
        let err = Reservoir::new(-1.0, vec![], OperationMode::Passive, 0.0).unwrap_err();
        assert_eq!(err, ConfigurationError::Capacity { value: -1.0 });
    }

    #[test]
    fn rejects_outlet_above_capacity() {
        let err = Reservoir::new(1.0, vec![Outlet::at_height(2.0)], OperationMode::Passive, 0.0)
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::OutletHeight { .. }));
    }

    #[test]
    fn rejects_inverted_release_range() {
        let outlets = vec![Outlet::with_range(0.0, ReleaseRange::new(3.0, 1.0))];
        let err = Reservoir::new(1.0, outlets, OperationMode::Passive, 0.0).unwrap_err();
        assert!(matches!(err, ConfigurationError::ReleaseRange { .. }));
    }

    #[test]
    fn rejects_overfull_initial_volume() {
        let err = Reservoir::new(1.0, vec![], OperationMode::Passive, 2.0).unwrap_err();
        assert!(matches!(err, ConfigurationError::InitialVolume { .. }));
    }

    #[test]
    fn configuration_round_trips_through_json() {
        let reservoir = passive(
            5.0,
            vec![Outlet::with_range(1.0, ReleaseRange::new(0.0, 2.0))],
        );
        let json = serde_json::to_string(&reservoir).expect("serialize");
        let back: Reservoir = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, reservoir);
    }
}
