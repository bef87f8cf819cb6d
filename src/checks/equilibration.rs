// SPDX-License-Identifier: AGPL-3.0-only

//! Equilibration detection by two-halves agreement.
//!
//! A component is equilibrated from the earliest prefix length `N_eq`
//! such that the mean over `[N_eq, N)` agrees, to within the requested
//! precision, with the mean over the second half `[N_eq + (N − N_eq)/2,
//! N)`. A still-drifting component never satisfies the test and reports
//! `is_equilibrated = false`.
//!
//! Weighted observations are rescaled to `w_i · y_i · N / Σw` before the
//! scan, so N-fold-way chains equilibrate on the same footing as
//! unweighted ones.

use serde::{Deserialize, Serialize};

use crate::sampling::{RequestedPrecision, SamplerComponent};

/// Equilibration verdict for one component.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndividualEquilibrationCheckResult {
    /// Whether the component has stopped drifting.
    pub is_equilibrated: bool,
    /// Earliest sample index from which the tail is equilibrated
    /// (the number of samples to discard).
    pub n_equilibration: u64,
}

/// Equilibration verdicts for all requested components.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EquilibrationCheckResults {
    /// Whether every requested component is equilibrated.
    pub all_equilibrated: bool,
    /// Samples to discard so that every component is equilibrated
    /// (the maximum of the individual `n_equilibration` values).
    pub n_samples_for_all_to_equilibrate: u64,
    /// Per-component verdicts, in component order.
    pub individual_results: Vec<(SamplerComponent, IndividualEquilibrationCheckResult)>,
}

/// Find the earliest equilibrated prefix of one component's observations.
///
/// The agreement tolerance is the requested absolute precision when
/// absolute convergence is required, otherwise the requested relative
/// precision scaled by the magnitude of the tail mean.
#[must_use]
pub fn default_equilibration_check(
    observations: &[f64],
    sample_weight: &[f64],
    requested_precision: RequestedPrecision,
) -> IndividualEquilibrationCheckResult {
    let n = observations.len();
    if n < 2 {
        return IndividualEquilibrationCheckResult {
            is_equilibrated: false,
            n_equilibration: n as u64,
        };
    }

    // Rescale weighted observations; an empty weight vector means
    // unweighted.
    let scaled: Vec<f64>;
    let obs: &[f64] = if sample_weight.is_empty() {
        observations
    } else {
        debug_assert_eq!(sample_weight.len(), n);
        let w_sum: f64 = sample_weight.iter().sum();
        let scale = n as f64 / w_sum;
        scaled = observations
            .iter()
            .zip(sample_weight)
            .map(|(y, w)| y * w * scale)
            .collect();
        &scaled
    };

    // Suffix sums make every candidate prefix an O(1) query.
    let mut suffix = vec![0.0; n + 1];
    for i in (0..n).rev() {
        suffix[i] = suffix[i + 1] + obs[i];
    }
    let tail_mean = |start: usize| (suffix[start] - suffix[n]) / (n - start) as f64;

    for start in 0..n - 1 {
        let mid = start + (n - start) / 2;
        let full = tail_mean(start);
        let half = tail_mean(mid);
        let tol = if requested_precision.abs_convergence_is_required {
            requested_precision.abs_precision
        } else if requested_precision.rel_convergence_is_required {
            requested_precision.rel_precision * full.abs()
        } else {
            f64::INFINITY
        };
        if (full - half).abs() < tol {
            return IndividualEquilibrationCheckResult {
                is_equilibrated: true,
                n_equilibration: start as u64,
            };
        }
    }

    IndividualEquilibrationCheckResult {
        is_equilibrated: false,
        n_equilibration: n as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_series_equilibrates_immediately() {
        let obs = vec![1.0; 100];
        let r = default_equilibration_check(&obs, &[], RequestedPrecision::abs(0.01));
        assert!(r.is_equilibrated);
        assert_eq!(r.n_equilibration, 0);
    }

    #[test]
    fn transient_prefix_is_discarded() {
        // 20 samples of a decaying transient, then a flat tail.
        let mut obs: Vec<f64> = (0..20).map(|i| 10.0 * 0.5_f64.powi(i)).collect();
        obs.extend(std::iter::repeat(0.0).take(80));
        let r = default_equilibration_check(&obs, &[], RequestedPrecision::abs(0.001));
        assert!(r.is_equilibrated);
        assert!(r.n_equilibration > 0, "transient must be discarded");
        assert!(r.n_equilibration < 25, "tail should equilibrate shortly after the transient");
    }

    #[test]
    fn drifting_series_never_equilibrates() {
        let obs: Vec<f64> = (0..100).map(f64::from).collect();
        let r = default_equilibration_check(&obs, &[], RequestedPrecision::abs(0.01));
        assert!(!r.is_equilibrated);
        assert_eq!(r.n_equilibration, 100);
    }

    #[test]
    fn too_short_series_is_inconclusive() {
        let r = default_equilibration_check(&[1.0], &[], RequestedPrecision::abs(0.1));
        assert!(!r.is_equilibrated);
    }

    #[test]
    fn relative_tolerance_scales_with_mean() {
        // Small fluctuations around 1000: abs 0.01 fails, rel 1% passes.
        let obs: Vec<f64> = (0..100)
            .map(|i| 1000.0 + if i % 2 == 0 { 0.5 } else { -0.5 })
            .collect();
        let strict = default_equilibration_check(&obs, &[], RequestedPrecision::abs(1e-12));
        let relative = default_equilibration_check(&obs, &[], RequestedPrecision::rel(0.01));
        assert!(!strict.is_equilibrated);
        assert!(relative.is_equilibrated);
    }

    #[test]
    fn unit_weights_match_unweighted() {
        let obs: Vec<f64> = (0..50).map(|i| f64::from(i % 5)).collect();
        let w = vec![1.0; 50];
        let a = default_equilibration_check(&obs, &[], RequestedPrecision::abs(0.5));
        let b = default_equilibration_check(&obs, &w, RequestedPrecision::abs(0.5));
        assert_eq!(a, b);
    }
}
