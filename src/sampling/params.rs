// SPDX-License-Identifier: AGPL-3.0-only

//! Sampling schedule parameters and their validation grammar.
//!
//! A host parser populates [`SamplingParams`]; [`SamplingParams::validate`]
//! applies the option grammar (valid modes, period bounds, known quantity
//! names) and collects every problem found, each tagged with the path of
//! the offending option.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::QuenchError;

/// What to count when deciding whether a sample is due.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleMode {
    /// Sample on Monte Carlo step counts.
    #[serde(rename = "step")]
    ByStep,
    /// Sample on pass counts (one pass = one step per mutating site).
    #[default]
    #[serde(rename = "pass")]
    ByPass,
    /// Sample on simulated time (kinetic Monte Carlo only).
    #[serde(rename = "time")]
    ByTime,
}

/// Spacing of successive sample targets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleMethod {
    /// `x_n = begin + (period / samples_per_period) * n`
    #[default]
    Linear,
    /// `x_n = begin + period ^ ((n + shift) / samples_per_period)`
    Log,
}

/// Parameters describing what to sample and when.
///
/// Serde names follow the host-facing record grammar (`sample_by`,
/// `spacing`, `quantities`, `sample_trajectory`), so a JSON parser can
/// populate this record directly.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SamplingParams {
    /// Sample by step, pass, or time.
    #[serde(rename = "sample_by")]
    pub sample_mode: SampleMode,
    /// Linear or logarithmic spacing of sample targets.
    #[serde(rename = "spacing", default)]
    pub sample_method: SampleMethod,
    /// Count or time at which the first sample is taken.
    #[serde(default)]
    pub begin: f64,
    /// A number of counts, or a period of time; sets the sampling spacing.
    pub period: f64,
    /// Number of samples per `period`.
    #[serde(default = "default_samples_per_period")]
    pub samples_per_period: f64,
    /// Log-spacing shift; see [`SampleMethod::Log`].
    #[serde(default)]
    pub shift: f64,
    /// If true, draw successive sample targets stochastically with the
    /// same mean rate as the deterministic schedule.
    #[serde(default)]
    pub stochastic_sample_period: bool,
    /// Names of registered sampling functions to evaluate at each sample.
    #[serde(rename = "quantities", default)]
    pub sampler_names: Vec<String>,
    /// If true, save the configuration at each sample.
    #[serde(rename = "sample_trajectory", default)]
    pub do_sample_trajectory: bool,
    /// If true, record the simulated time at each sample. Set by the
    /// driver, not by input.
    #[serde(skip)]
    pub do_sample_time: bool,
}

fn default_samples_per_period() -> f64 {
    1.0
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            sample_mode: SampleMode::ByPass,
            sample_method: SampleMethod::Linear,
            begin: 0.0,
            period: 1.0,
            samples_per_period: 1.0,
            shift: 0.0,
            stochastic_sample_period: false,
            sampler_names: Vec::new(),
            do_sample_trajectory: false,
            do_sample_time: false,
        }
    }
}

impl SamplingParams {
    /// Validate against the set of registered sampling-function names.
    ///
    /// `time_sampling_allowed` is false for drivers without a simulated
    /// clock; `sample_by == "time"` is then rejected.
    ///
    /// # Errors
    ///
    /// Returns every validation problem found, each carrying the path of
    /// the offending option.
    pub fn validate(
        &self,
        sampling_function_names: &BTreeSet<String>,
        time_sampling_allowed: bool,
    ) -> Result<(), Vec<QuenchError>> {
        let mut errors = Vec::new();

        if self.sample_mode == SampleMode::ByTime && !time_sampling_allowed {
            errors.push(QuenchError::params(
                "sample_by",
                "\"sample_by\" must be one of \"pass\" or \"step\"",
            ));
        }

        match self.sample_method {
            SampleMethod::Log => {
                if self.period <= 1.0 {
                    errors.push(QuenchError::params(
                        "period",
                        "for \"spacing\" == \"log\", \"period\" must be > 1.0",
                    ));
                }
            }
            SampleMethod::Linear => {
                if self.period <= 0.0 {
                    errors.push(QuenchError::params(
                        "period",
                        "for \"spacing\" == \"linear\", \"period\" must be > 0.0",
                    ));
                }
            }
        }

        for name in &self.sampler_names {
            if !sampling_function_names.contains(name) {
                errors.push(QuenchError::params(
                    "quantities",
                    format!("'{name}' is not a sampling option"),
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
