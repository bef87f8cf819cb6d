// SPDX-License-Identifier: AGPL-3.0-only

//! The termination predicate: cutoffs, equilibration, and convergence
//! composed on a check schedule.
//!
//! Decision order (evaluated once per event by the driver):
//!
//! 1. If any specified cutoff maximum is met: complete (forced).
//! 2. If any specified cutoff minimum is unmet: incomplete.
//! 3. If the sample count has not reached the next scheduled check: wait.
//! 4. If any requested component is not equilibrated: incomplete.
//! 5. Complete iff every requested component is converged.
//!
//! The check schedule mirrors the sampling schedule but is indexed in
//! samples taken: the k-th check fires at sample count
//! `round(begin + (period / checks_per_period) * k)` (linear) or
//! `round(begin + period ^ ((k + shift) / checks_per_period))` (log).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::checks::convergence::{convergence_check, ConvergenceCheckResults};
use crate::checks::cutoff::CutoffCheckParams;
use crate::checks::equilibration::{
    default_equilibration_check, EquilibrationCheckResults, IndividualEquilibrationCheckResult,
};
use crate::error::QuenchError;
use crate::sampling::{
    get_n_samples, RequestedPrecision, Sampler, SamplerComponent, SamplerMap,
};
use crate::statistics::BasicStatisticsCalculator;

/// Parameters of the completion check.
#[derive(Clone, Debug)]
pub struct CompletionCheckParams {
    /// Hard cutoffs that gate or force completion.
    pub cutoff_params: CutoffCheckParams,
    /// Statistics knobs (confidence, weighted method, resamples).
    pub calculator: BasicStatisticsCalculator,
    /// Precision demanded of each requested component.
    pub requested_precision: BTreeMap<SamplerComponent, RequestedPrecision>,
    /// Log (true) or linear (false) check spacing.
    pub log_spacing: bool,
    /// Sample count of the first convergence check.
    pub check_begin: f64,
    /// A number of samples; sets the check spacing.
    pub check_period: f64,
    /// Checks per `check_period`.
    pub checks_per_period: f64,
    /// Log-spacing shift.
    pub check_shift: f64,
}

impl Default for CompletionCheckParams {
    fn default() -> Self {
        Self {
            cutoff_params: CutoffCheckParams::default(),
            calculator: BasicStatisticsCalculator::default(),
            requested_precision: BTreeMap::new(),
            log_spacing: false,
            check_begin: 0.0,
            check_period: 10.0,
            checks_per_period: 1.0,
            check_shift: 1.0,
        }
    }
}

/// One entry of a host-supplied `convergence` list: which components of
/// which quantity, to what precision.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConvergenceSpec {
    /// Name of the sampled quantity.
    pub quantity: String,
    /// Required absolute precision.
    pub abs_precision: Option<f64>,
    /// Required relative precision.
    pub rel_precision: Option<f64>,
    /// Alias for `abs_precision` (older inputs).
    pub precision: Option<f64>,
    /// Select components by index. Exclusive with `component_name`.
    pub component_index: Option<Vec<usize>>,
    /// Select components by name. Exclusive with `component_index`.
    pub component_name: Option<Vec<String>>,
}

/// Resolve a `convergence` list against the registered sampling
/// functions' component names.
///
/// Neither selector means every component of the quantity. Errors carry
/// paths of the form `convergence/<i>/<option>` and are all collected.
///
/// # Errors
///
/// Returns every validation problem found.
pub fn requested_precision_from_specs(
    specs: &[ConvergenceSpec],
    component_names: &BTreeMap<String, Vec<String>>,
) -> Result<BTreeMap<SamplerComponent, RequestedPrecision>, Vec<QuenchError>> {
    let mut requested = BTreeMap::new();
    let mut errors = Vec::new();

    for (i, spec) in specs.iter().enumerate() {
        let path = |option: &str| {
            if option.is_empty() {
                format!("convergence/{i}")
            } else {
                format!("convergence/{i}/{option}")
            }
        };

        let Some(names) = component_names.get(&spec.quantity) else {
            errors.push(QuenchError::params(
                &path("quantity"),
                format!("'{}' is not a sampling option", spec.quantity),
            ));
            continue;
        };

        let precision = match (spec.precision, spec.abs_precision, spec.rel_precision) {
            (Some(_), Some(_), _) => {
                errors.push(QuenchError::params(
                    &path(""),
                    "cannot specify both \"precision\" and \"abs_precision\"",
                ));
                continue;
            }
            (Some(abs), None, None) | (None, Some(abs), None) => RequestedPrecision::abs(abs),
            (None, None, Some(rel)) => RequestedPrecision::rel(rel),
            (Some(abs), None, Some(rel)) | (None, Some(abs), Some(rel)) => {
                RequestedPrecision::abs_and_rel(abs, rel)
            }
            (None, None, None) => {
                errors.push(QuenchError::params(
                    &path(""),
                    "one of \"abs_precision\", \"rel_precision\", \"precision\" is required",
                ));
                continue;
            }
        };

        let indices: Vec<usize> = match (&spec.component_index, &spec.component_name) {
            (Some(_), Some(_)) => {
                errors.push(QuenchError::params(
                    &path(""),
                    "cannot specify both \"component_index\" and \"component_name\"",
                ));
                continue;
            }
            (Some(index_list), None) => {
                let mut ok = Vec::new();
                for &index in index_list {
                    if index >= names.len() {
                        errors.push(QuenchError::params(
                            &path("component_index"),
                            format!(
                                "for '{}', component index {index} is out of range: \
                                 valid range is [0, {})",
                                spec.quantity,
                                names.len()
                            ),
                        ));
                    } else {
                        ok.push(index);
                    }
                }
                ok
            }
            (None, Some(name_list)) => {
                let mut ok = Vec::new();
                for name in name_list {
                    if let Some(index) = names.iter().position(|n| n == name) {
                        ok.push(index);
                    } else {
                        errors.push(QuenchError::params(
                            &path("component_name"),
                            format!("for '{}', component name '{name}' is not valid", spec.quantity),
                        ));
                    }
                }
                ok
            }
            (None, None) => (0..names.len()).collect(),
        };

        for index in indices {
            requested.insert(
                SamplerComponent::new(&spec.quantity, index, &names[index]),
                precision,
            );
        }
    }

    if errors.is_empty() {
        Ok(requested)
    } else {
        Err(errors)
    }
}

/// Results of the most recent completion check.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionCheckResults {
    /// Whether every specified cutoff minimum is reached.
    pub has_all_minimums_met: bool,
    /// Whether any specified cutoff maximum is reached.
    pub has_any_maximum_met: bool,
    /// Count (steps or passes) at the check.
    pub count: u64,
    /// Simulated time at the check, when the driver has a clock.
    pub time: Option<f64>,
    /// Elapsed wall time in seconds at the check.
    pub clocktime: f64,
    /// Samples taken at the check.
    pub n_samples: u64,
    /// The termination decision.
    pub is_complete: bool,
    /// Samples taken when equilibration/convergence last ran; `None`
    /// when no convergence check has run.
    pub n_samples_at_convergence_check: Option<u64>,
    /// Per-component equilibration verdicts from the last convergence
    /// check.
    pub equilibration_check_results: EquilibrationCheckResults,
    /// Per-component convergence verdicts from the last convergence
    /// check.
    pub convergence_check_results: ConvergenceCheckResults,
}

/// Composes cutoff, equilibration, and convergence checks into the
/// termination predicate.
#[derive(Clone, Debug)]
pub struct CompletionCheck {
    params: CompletionCheckParams,
    results: CompletionCheckResults,
    /// Index of the next scheduled convergence check.
    n_checks: u64,
}

impl CompletionCheck {
    /// Create a completion check.
    #[must_use]
    pub fn new(params: CompletionCheckParams) -> Self {
        Self {
            params,
            results: CompletionCheckResults::default(),
            n_checks: 0,
        }
    }

    /// The parameters.
    #[must_use]
    pub const fn params(&self) -> &CompletionCheckParams {
        &self.params
    }

    /// Results of the most recent check.
    #[must_use]
    pub const fn results(&self) -> &CompletionCheckResults {
        &self.results
    }

    /// Sample count at which the k-th convergence check fires.
    fn check_at(&self, k: u64) -> u64 {
        let n = k as f64;
        let p = &self.params;
        let target = if p.log_spacing {
            p.check_begin + p.check_period.powf((n + p.check_shift) / p.checks_per_period)
        } else {
            p.check_begin + (p.check_period / p.checks_per_period) * n
        };
        target.round().max(0.0) as u64
    }

    /// Evaluate the termination predicate.
    ///
    /// Calling again with no new samples yields the same decision.
    pub fn check(
        &mut self,
        samplers: &SamplerMap,
        sample_weight: &Sampler,
        count: u64,
        time: Option<f64>,
        clocktime: f64,
    ) -> bool {
        let n_samples = get_n_samples(samplers);
        let cutoff = self.params.cutoff_params;

        self.results.count = count;
        self.results.time = time;
        self.results.clocktime = clocktime;
        self.results.n_samples = n_samples;
        self.results.has_all_minimums_met =
            cutoff.all_minimums_met(count, time, clocktime, n_samples);
        self.results.has_any_maximum_met =
            cutoff.any_maximum_met(count, time, clocktime, n_samples);

        // A hard maximum caps the run even when minimums are unmet;
        // otherwise a max below an unreachable min could never terminate.
        if self.results.has_any_maximum_met {
            self.results.is_complete = true;
            return true;
        }
        if !self.results.has_all_minimums_met {
            self.results.is_complete = false;
            return false;
        }
        if n_samples < self.check_at(self.n_checks) {
            self.results.is_complete = false;
            return false;
        }

        self.run_convergence_check(samplers, sample_weight, n_samples);

        // Only advance the schedule past an inconclusive check; a
        // conclusive one must re-evaluate identically if re-queried.
        if !self.results.is_complete {
            while self.check_at(self.n_checks) <= n_samples {
                self.n_checks += 1;
            }
        }
        self.results.is_complete
    }

    /// Run equilibration then convergence over the requested components.
    fn run_convergence_check(
        &mut self,
        samplers: &SamplerMap,
        sample_weight: &Sampler,
        n_samples: u64,
    ) {
        self.results.n_samples_at_convergence_check = Some(n_samples);

        let weights = sample_weight.component(0);
        let mut individual_results = Vec::with_capacity(self.params.requested_precision.len());
        let mut all_equilibrated = true;
        let mut n_equilibration_max: u64 = 0;
        for (component, requested) in &self.params.requested_precision {
            let sampler = samplers.get(&component.sampler_name).unwrap_or_else(|| {
                panic!(
                    "completion check: no sampler named '{}'",
                    component.sampler_name
                )
            });
            let observations = sampler.component(component.component_index);
            let result: IndividualEquilibrationCheckResult =
                default_equilibration_check(observations, weights, *requested);
            all_equilibrated &= result.is_equilibrated;
            n_equilibration_max = n_equilibration_max.max(result.n_equilibration);
            individual_results.push((component.clone(), result));
        }
        self.results.equilibration_check_results = EquilibrationCheckResults {
            all_equilibrated,
            n_samples_for_all_to_equilibrate: n_equilibration_max,
            individual_results,
        };

        if !all_equilibrated {
            self.results.convergence_check_results = ConvergenceCheckResults::default();
            self.results.is_complete = false;
            return;
        }

        let n_for_statistics = (n_samples - n_equilibration_max) as usize;
        self.results.convergence_check_results = convergence_check(
            samplers,
            sample_weight,
            &self.params.requested_precision,
            n_for_statistics,
            &self.params.calculator,
        );
        // An empty request list is vacuously converged.
        self.results.is_complete = self.results.convergence_check_results.all_converged;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::rng::{Lcg64, RandomEngine};

    fn samplers_with_noise(n: usize, scale: f64) -> SamplerMap {
        let mut rng = Lcg64::new(9);
        let mut sampler = Sampler::new(vec![1]);
        for _ in 0..n {
            sampler.push_back(&[0.5 + scale * (rng.uniform() - 0.5)]);
        }
        let mut map = SamplerMap::new();
        map.insert("q".into(), sampler);
        map
    }

    fn request_q(abs: f64) -> BTreeMap<SamplerComponent, RequestedPrecision> {
        let mut map = BTreeMap::new();
        map.insert(SamplerComponent::new("q", 0, "0"), RequestedPrecision::abs(abs));
        map
    }

    #[test]
    fn min_gates_completion() {
        let mut check = CompletionCheck::new(CompletionCheckParams {
            cutoff_params: CutoffCheckParams {
                min_count: Some(100),
                ..CutoffCheckParams::default()
            },
            ..CompletionCheckParams::default()
        });
        let samplers = samplers_with_noise(50, 0.0);
        assert!(!check.check(&samplers, &Sampler::scalar(), 99, None, 0.0));
        assert!(!check.results().has_all_minimums_met);
        assert!(check.check(&samplers, &Sampler::scalar(), 100, None, 0.0));
        assert!(check.results().has_all_minimums_met);
    }

    #[test]
    fn max_forces_completion_over_impossible_convergence() {
        let mut check = CompletionCheck::new(CompletionCheckParams {
            cutoff_params: CutoffCheckParams {
                max_count: Some(50),
                ..CutoffCheckParams::default()
            },
            requested_precision: request_q(1e-12),
            ..CompletionCheckParams::default()
        });
        let samplers = samplers_with_noise(10, 1.0);
        assert!(!check.check(&samplers, &Sampler::scalar(), 49, None, 0.0));
        assert!(check.check(&samplers, &Sampler::scalar(), 50, None, 0.0));
        let results = check.results();
        assert!(results.is_complete);
        assert!(results.has_any_maximum_met);
        assert!(results.n_samples_at_convergence_check.is_none());
    }

    #[test]
    fn max_before_min_still_completes() {
        let mut check = CompletionCheck::new(CompletionCheckParams {
            cutoff_params: CutoffCheckParams {
                min_count: Some(1000),
                max_clocktime: Some(60.0),
                ..CutoffCheckParams::default()
            },
            ..CompletionCheckParams::default()
        });
        let samplers = samplers_with_noise(10, 1.0);
        // Wall-time max reached while count min is not: the max wins.
        assert!(check.check(&samplers, &Sampler::scalar(), 10, None, 61.0));
        let results = check.results();
        assert!(results.is_complete);
        assert!(!results.has_all_minimums_met);
        assert!(results.has_any_maximum_met);
    }

    #[test]
    fn converged_quantity_completes() {
        let mut check = CompletionCheck::new(CompletionCheckParams {
            requested_precision: request_q(0.01),
            ..CompletionCheckParams::default()
        });
        let samplers = samplers_with_noise(10_000, 0.01);
        assert!(check.check(&samplers, &Sampler::scalar(), 10_000, None, 1.0));
        let results = check.results();
        assert!(results.is_complete);
        assert_eq!(results.n_samples_at_convergence_check, Some(10_000));
        assert!(results.equilibration_check_results.all_equilibrated);
        assert!(results.convergence_check_results.all_converged);
        let (_, conv) = &results.convergence_check_results.individual_results[0];
        assert!(conv.stats.calculated_precision <= 0.01);
    }

    #[test]
    fn completion_check_is_idempotent() {
        let mut check = CompletionCheck::new(CompletionCheckParams {
            requested_precision: request_q(0.01),
            ..CompletionCheckParams::default()
        });
        let samplers = samplers_with_noise(10_000, 0.01);
        let first = check.check(&samplers, &Sampler::scalar(), 10_000, None, 1.0);
        let snapshot = check.results().clone();
        let second = check.check(&samplers, &Sampler::scalar(), 10_000, None, 1.0);
        assert_eq!(first, second);
        assert_eq!(&snapshot, check.results());
    }

    #[test]
    fn incomplete_check_is_idempotent_too() {
        let mut check = CompletionCheck::new(CompletionCheckParams {
            requested_precision: request_q(1e-12),
            ..CompletionCheckParams::default()
        });
        let samplers = samplers_with_noise(100, 1.0);
        let first = check.check(&samplers, &Sampler::scalar(), 100, None, 1.0);
        let second = check.check(&samplers, &Sampler::scalar(), 100, None, 1.0);
        assert!(!first);
        assert_eq!(first, second);
    }

    #[test]
    fn check_schedule_waits_for_begin() {
        let mut check = CompletionCheck::new(CompletionCheckParams {
            check_begin: 100.0,
            requested_precision: request_q(10.0),
            ..CompletionCheckParams::default()
        });
        let samplers = samplers_with_noise(50, 0.01);
        assert!(!check.check(&samplers, &Sampler::scalar(), 50, None, 0.0));
        assert!(
            check.results().n_samples_at_convergence_check.is_none(),
            "no convergence check should run before check_begin samples"
        );
    }

    #[test]
    fn empty_convergence_list_completes_at_min() {
        let mut check = CompletionCheck::new(CompletionCheckParams {
            cutoff_params: CutoffCheckParams {
                min_count: Some(100),
                ..CutoffCheckParams::default()
            },
            ..CompletionCheckParams::default()
        });
        let samplers = samplers_with_noise(5, 1.0);
        assert!(!check.check(&samplers, &Sampler::scalar(), 99, None, 0.0));
        assert!(check.check(&samplers, &Sampler::scalar(), 100, None, 0.0));
    }

    #[test]
    fn linear_check_schedule_counts() {
        let check = CompletionCheck::new(CompletionCheckParams {
            check_begin: 100.0,
            check_period: 10.0,
            ..CompletionCheckParams::default()
        });
        assert_eq!(check.check_at(0), 100);
        assert_eq!(check.check_at(1), 110);
        assert_eq!(check.check_at(5), 150);
    }

    #[test]
    fn log_check_schedule_counts() {
        let check = CompletionCheck::new(CompletionCheckParams {
            log_spacing: true,
            check_begin: 0.0,
            check_period: 10.0,
            check_shift: 1.0,
            ..CompletionCheckParams::default()
        });
        assert_eq!(check.check_at(0), 10);
        assert_eq!(check.check_at(1), 100);
        assert_eq!(check.check_at(2), 1000);
    }

    #[test]
    fn results_serde_round_trip() {
        let mut check = CompletionCheck::new(CompletionCheckParams {
            requested_precision: request_q(0.01),
            ..CompletionCheckParams::default()
        });
        let samplers = samplers_with_noise(10_000, 0.01);
        check.check(&samplers, &Sampler::scalar(), 10_000, None, 1.0);
        let json = serde_json::to_string(check.results()).unwrap();
        let back: CompletionCheckResults = serde_json::from_str(&json).unwrap();
        assert_eq!(check.results(), &back);
    }

    #[test]
    fn specs_resolve_all_components_by_default() {
        let mut names = BTreeMap::new();
        names.insert("comp_n".to_string(), vec!["Va".to_string(), "O".to_string()]);
        let specs = vec![ConvergenceSpec {
            quantity: "comp_n".into(),
            abs_precision: Some(0.001),
            ..ConvergenceSpec::default()
        }];
        let requested = requested_precision_from_specs(&specs, &names).unwrap();
        assert_eq!(requested.len(), 2);
    }

    #[test]
    fn specs_select_by_name() {
        let mut names = BTreeMap::new();
        names.insert("comp_n".to_string(), vec!["Va".to_string(), "O".to_string()]);
        let specs = vec![ConvergenceSpec {
            quantity: "comp_n".into(),
            precision: Some(0.001),
            component_name: Some(vec!["O".into()]),
            ..ConvergenceSpec::default()
        }];
        let requested = requested_precision_from_specs(&specs, &names).unwrap();
        assert_eq!(requested.len(), 1);
        assert_eq!(requested.keys().next().unwrap().component_index, 1);
    }

    #[test]
    fn specs_collect_all_errors_with_paths() {
        let mut names = BTreeMap::new();
        names.insert("comp_n".to_string(), vec!["Va".to_string()]);
        let specs = vec![
            ConvergenceSpec {
                quantity: "nope".into(),
                abs_precision: Some(0.1),
                ..ConvergenceSpec::default()
            },
            ConvergenceSpec {
                quantity: "comp_n".into(),
                abs_precision: Some(0.1),
                component_index: Some(vec![7]),
                ..ConvergenceSpec::default()
            },
            ConvergenceSpec {
                quantity: "comp_n".into(),
                abs_precision: Some(0.1),
                component_index: Some(vec![0]),
                component_name: Some(vec!["Va".into()]),
                ..ConvergenceSpec::default()
            },
        ];
        let errors = requested_precision_from_specs(&specs, &names).unwrap_err();
        assert_eq!(errors.len(), 3);
        let text: Vec<String> = errors.iter().map(ToString::to_string).collect();
        assert!(text[0].starts_with("convergence/0/quantity:"));
        assert!(text[1].starts_with("convergence/1/component_index:"));
        assert!(text[2].starts_with("convergence/2:"));
    }

    #[test]
    fn spec_requires_some_precision() {
        let mut names = BTreeMap::new();
        names.insert("q".to_string(), vec!["0".to_string()]);
        let specs = vec![ConvergenceSpec {
            quantity: "q".into(),
            ..ConvergenceSpec::default()
        }];
        let errors = requested_precision_from_specs(&specs, &names).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("required"));
    }
}
