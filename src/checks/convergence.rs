// SPDX-License-Identifier: AGPL-3.0-only

//! Per-component precision-vs-requested convergence decision.
//!
//! Statistics are computed over the equilibrated tail of each requested
//! component. A component converges when its calculated precision meets
//! every *required* criterion (absolute and/or relative) simultaneously;
//! the run converges when every requested component does. Components are
//! independent, so they are evaluated in parallel.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::sampling::{RequestedPrecision, Sampler, SamplerComponent, SamplerMap};
use crate::statistics::{BasicStatistics, BasicStatisticsCalculator};

/// Convergence verdict for one component.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndividualConvergenceCheckResult {
    /// Whether every required criterion is met.
    pub is_converged: bool,
    /// The precision demanded of this component.
    pub requested_precision: RequestedPrecision,
    /// Statistics over the equilibrated tail.
    pub stats: BasicStatistics,
}

/// Convergence verdicts for all requested components.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceCheckResults {
    /// Whether every requested component is converged.
    pub all_converged: bool,
    /// Per-component verdicts, in component order.
    pub individual_results: Vec<(SamplerComponent, IndividualConvergenceCheckResult)>,
}

/// Check convergence of every requested component over the last
/// `n_samples_for_statistics` samples.
///
/// # Panics
///
/// Panics if a requested component names a sampler or component index
/// that does not exist; parameter validation is expected to have caught
/// this before the run started.
#[must_use]
pub fn convergence_check(
    samplers: &SamplerMap,
    sample_weight: &Sampler,
    requested_precision: &BTreeMap<SamplerComponent, RequestedPrecision>,
    n_samples_for_statistics: usize,
    calculator: &BasicStatisticsCalculator,
) -> ConvergenceCheckResults {
    let requested: Vec<(&SamplerComponent, &RequestedPrecision)> =
        requested_precision.iter().collect();

    let individual_results: Vec<(SamplerComponent, IndividualConvergenceCheckResult)> = requested
        .par_iter()
        .map(|(component, requested)| {
            let sampler = samplers.get(&component.sampler_name).unwrap_or_else(|| {
                panic!(
                    "convergence check: no sampler named '{}'",
                    component.sampler_name
                )
            });
            let column = sampler.component(component.component_index);
            let tail = &column[column.len() - n_samples_for_statistics.min(column.len())..];
            let weights = sample_weight.component(0);
            let weight_tail = if weights.is_empty() {
                weights
            } else {
                &weights[weights.len() - n_samples_for_statistics.min(weights.len())..]
            };
            let stats = calculator.calc(tail, weight_tail);
            let result = IndividualConvergenceCheckResult {
                is_converged: is_converged(&stats, requested),
                requested_precision: **requested,
                stats,
            };
            ((*component).clone(), result)
        })
        .collect();

    ConvergenceCheckResults {
        all_converged: individual_results.iter().all(|(_, r)| r.is_converged),
        individual_results,
    }
}

/// All required criteria met simultaneously.
fn is_converged(stats: &BasicStatistics, requested: &RequestedPrecision) -> bool {
    if requested.abs_convergence_is_required
        && !(stats.calculated_precision <= requested.abs_precision)
    {
        return false;
    }
    if requested.rel_convergence_is_required
        && !(stats.calculated_precision <= requested.rel_precision * stats.mean.abs())
    {
        return false;
    }
    true
}
