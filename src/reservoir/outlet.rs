//! Outlet specifications: the release paths out of a reservoir.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Minimum and maximum release through an outlet, in reservoir volume units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReleaseRange {
    pub min: f64,
    pub max: f64,
}

impl ReleaseRange {
    /// No lower bound, no upper bound.
    pub const UNLIMITED: ReleaseRange = ReleaseRange {
        min: 0.0,
        max: f64::INFINITY,
    };

    /// No release possible.
    pub const SHUT: ReleaseRange = ReleaseRange { min: 0.0, max: 0.0 };

    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

impl Default for ReleaseRange {
    fn default() -> Self {
        Self::UNLIMITED
    }
}

/// Condition of an outlet gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FailureState {
    /// Gate operates within its design range.
    #[default]
    None,
    /// Failed open: releases without control at the maximum of its range.
    Open,
    /// Failed closed: cannot make releases.
    Closed,
}

/// A gate or other release path at a reservoir.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outlet {
    /// Unique label within the owning reservoir, normalized to `name@height`.
    pub name: String,
    /// Invert height of the outlet, in the same units as reservoir volume.
    pub height: f64,
    /// Min and max release in the non-failure state.
    pub design_range: ReleaseRange,
    pub failure_state: FailureState,
}

impl Outlet {
    /// An unnamed, unlimited outlet at the given height.
    pub fn at_height(height: f64) -> Self {
        Self {
            name: String::new(),
            height,
            design_range: ReleaseRange::UNLIMITED,
            failure_state: FailureState::None,
        }
    }

    pub fn with_range(height: f64, design_range: ReleaseRange) -> Self {
        Self {
            design_range,
            ..Self::at_height(height)
        }
    }

    /// The release possible through this outlet given the volume of water
    /// currently available to it.
    ///
    /// Nothing passes while the water sits below the invert; above it the
    /// design range applies, clipped to the head actually present, and the
    /// failure state overrides the result.
    pub fn release_range(&self, volume: f64) -> ReleaseRange {
        let head = volume - self.height;
        if head <= 0.0 {
            return ReleaseRange::SHUT;
        }
        let nominal = ReleaseRange::new(
            self.design_range.min.min(head),
            head.min(self.design_range.max),
        );
        match self.failure_state {
            FailureState::None => nominal,
            FailureState::Open => ReleaseRange::new(nominal.max, nominal.max),
            FailureState::Closed => ReleaseRange::SHUT,
        }
    }
}

/// Sorts outlets ascending by height and assigns unique `name@height`
/// labels, so storage log columns stay unambiguous.
pub(crate) fn normalize_outlets(mut outlets: Vec<Outlet>) -> Vec<Outlet> {
    outlets.sort_by(|a, b| a.height.total_cmp(&b.height).then_with(|| a.name.cmp(&b.name)));
    let mut used = HashSet::new();
    for outlet in &mut outlets {
        let base = if outlet.name.is_empty() {
            "outlet"
        } else {
            outlet.name.as_str()
        };
        let mut candidate = format!("{}@{}", base, outlet.height);
        let mut counter = 1;
        while !used.insert(candidate.clone()) {
            counter += 1;
            candidate = format!("{}_{}@{}", base, counter, outlet.height);
        }
        outlet.name = candidate;
    }
    outlets
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0.5, 0.0, 0.0)] // below the invert
    #[case(1.0, 0.0, 0.0)] // exactly at the invert
    #[case(1.5, 0.0, 0.5)]
    #[case(3.0, 0.0, 2.0)]
    fn release_tracks_head_above_invert(#[case] volume: f64, #[case] min: f64, #[case] max: f64) {
        let outlet = Outlet::at_height(1.0);
        let range = outlet.release_range(volume);
        assert_eq!(range.min, min);
        assert_eq!(range.max, max);
    }

    #[test]
    fn design_range_caps_release() {
        let outlet = Outlet::with_range(1.0, ReleaseRange::new(0.0, 0.25));
        assert_eq!(outlet.release_range(5.0).max, 0.25);
    }

    #[test]
    fn minimum_release_never_exceeds_available_head() {
        let outlet = Outlet::with_range(0.0, ReleaseRange::new(2.0, 10.0));
        let range = outlet.release_range(0.5);
        assert_eq!(range.min, 0.5);
        assert_eq!(range.max, 0.5);
    }

    #[test]
    fn failed_open_releases_at_maximum() {
        let mut outlet = Outlet::with_range(0.0, ReleaseRange::new(0.0, 2.0));
        outlet.failure_state = FailureState::Open;
        let range = outlet.release_range(5.0);
        assert_eq!(range.min, 2.0);
        assert_eq!(range.max, 2.0);
    }

    #[test]
    fn failed_closed_releases_nothing() {
        let mut outlet = Outlet::at_height(0.0);
        outlet.failure_state = FailureState::Closed;
        assert_eq!(outlet.release_range(5.0), ReleaseRange::SHUT);
    }

    #[test]
    fn normalize_sorts_and_labels() {
        let outlets = normalize_outlets(vec![
            Outlet::at_height(2.0),
            Outlet::at_height(0.0),
            Outlet::at_height(0.0),
        ]);
        let names: Vec<&str> = outlets.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["outlet@0", "outlet_2@0", "outlet@2"]);
        assert!(outlets.windows(2).all(|w| w[0].height <= w[1].height));
    }
}
