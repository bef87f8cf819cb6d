// SPDX-License-Identifier: AGPL-3.0-only

//! Hard cutoffs on count, samples, simulated time, and wall time.
//!
//! Four independent axes, each with an optional minimum and maximum.
//! Completion is *gated* on every specified minimum being reached, and
//! *forced* by any specified maximum being reached, independently of
//! convergence.

use serde::{Deserialize, Serialize};

/// Cutoff parameters. Unset bounds do not constrain the run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CutoffCheckParams {
    /// Minimum number of steps or passes.
    pub min_count: Option<u64>,
    /// Maximum number of steps or passes.
    pub max_count: Option<u64>,
    /// Minimum number of samples.
    pub min_sample: Option<u64>,
    /// Maximum number of samples.
    pub max_sample: Option<u64>,
    /// Minimum simulated time.
    pub min_time: Option<f64>,
    /// Maximum simulated time.
    pub max_time: Option<f64>,
    /// Minimum elapsed wall time in seconds.
    pub min_clocktime: Option<f64>,
    /// Maximum elapsed wall time in seconds.
    pub max_clocktime: Option<f64>,
}

impl CutoffCheckParams {
    /// Whether every specified minimum has been reached. Time minimums
    /// only apply when the driver supplies a simulated time.
    #[must_use]
    pub fn all_minimums_met(
        &self,
        count: u64,
        time: Option<f64>,
        clocktime: f64,
        n_samples: u64,
    ) -> bool {
        if self.min_count.is_some_and(|min| count < min) {
            return false;
        }
        if self.min_sample.is_some_and(|min| n_samples < min) {
            return false;
        }
        if let (Some(min), Some(t)) = (self.min_time, time) {
            if t < min {
                return false;
            }
        }
        if self.min_clocktime.is_some_and(|min| clocktime < min) {
            return false;
        }
        true
    }

    /// Whether any specified maximum has been reached.
    #[must_use]
    pub fn any_maximum_met(
        &self,
        count: u64,
        time: Option<f64>,
        clocktime: f64,
        n_samples: u64,
    ) -> bool {
        if self.max_count.is_some_and(|max| count >= max) {
            return true;
        }
        if self.max_sample.is_some_and(|max| n_samples >= max) {
            return true;
        }
        if let (Some(max), Some(t)) = (self.max_time, time) {
            if t >= max {
                return true;
            }
        }
        if self.max_clocktime.is_some_and(|max| clocktime >= max) {
            return true;
        }
        false
    }
}
