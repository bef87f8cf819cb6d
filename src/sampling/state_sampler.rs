// SPDX-License-Identifier: AGPL-3.0-only

//! Sample scheduling, sampling-function dispatch, and per-sample
//! bookkeeping.
//!
//! A [`StateSampler`] owns the schedule (when samples are due), the list
//! of sampling functions (what is sampled), one [`Sampler`] per function
//! (where it goes), and the step/pass/count/time counters that drive the
//! schedule.
//!
//! Deterministic schedules place the n-th sample at
//!
//! ```text
//! LINEAR:  x_n = begin + (period / samples_per_period) * n
//! LOG:     x_n = begin + period ^ ((n + shift) / samples_per_period)
//! ```
//!
//! With `stochastic_sample_period`, successive targets are instead drawn
//! from an exponential (time mode) or geometric (count mode) distribution
//! whose rate equals the instantaneous deterministic rate, giving the same
//! mean cadence with Poisson-distributed sample times.
//!
//! Scheduled targets must strictly increase; a schedule that revisits a
//! target is a parameter error and aborts the run.

use std::fmt;

use crate::rng::RandomEngine;
use crate::sampling::params::{SampleMethod, SampleMode, SamplingParams};
use crate::sampling::sampler::{default_component_names, Sampler, SamplerMap};

/// A function evaluated when a sample is taken.
///
/// The function takes no arguments: it closes over the live state it
/// observes. The driver's pre-sample hook refreshes any shared scratch
/// (total rate, atom positions) before the closure runs.
pub struct StateSamplingFunction {
    /// Function name, and the name of the sampled quantity.
    pub name: String,
    /// Description of the function.
    pub description: String,
    /// Shape of the sampled quantity; row-major unrolling.
    pub shape: Vec<usize>,
    /// One name per component of the result.
    pub component_names: Vec<String>,
    /// The function to be evaluated.
    pub function: Box<dyn Fn() -> Vec<f64>>,
}

impl StateSamplingFunction {
    /// Create a sampling function with default component names.
    #[must_use]
    pub fn new(
        name: &str,
        description: &str,
        shape: Vec<usize>,
        function: Box<dyn Fn() -> Vec<f64>>,
    ) -> Self {
        let component_names = default_component_names(&shape);
        Self {
            name: name.to_string(),
            description: description.to_string(),
            shape,
            component_names,
            function,
        }
    }

    /// Create a sampling function with custom component names.
    ///
    /// # Panics
    ///
    /// Panics if the number of names does not match the shape.
    #[must_use]
    pub fn with_component_names(
        name: &str,
        description: &str,
        component_names: Vec<String>,
        shape: Vec<usize>,
        function: Box<dyn Fn() -> Vec<f64>>,
    ) -> Self {
        assert_eq!(
            component_names.len(),
            shape.iter().product::<usize>(),
            "component_names length must equal the product of the shape"
        );
        Self {
            name: name.to_string(),
            description: description.to_string(),
            shape,
            component_names,
            function,
        }
    }

    /// Evaluate the function.
    #[must_use]
    pub fn eval(&self) -> Vec<f64> {
        (self.function)()
    }
}

impl fmt::Debug for StateSamplingFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateSamplingFunction")
            .field("name", &self.name)
            .field("shape", &self.shape)
            .field("component_names", &self.component_names)
            .finish_non_exhaustive()
    }
}

/// Schedules samples, dispatches sampling functions, and stores results.
pub struct StateSampler {
    /// Sample by step, pass, or time.
    pub sample_mode: SampleMode,
    /// Linear or logarithmic spacing.
    pub sample_method: SampleMethod,
    /// See [`SamplingParams`].
    pub begin: f64,
    /// See [`SamplingParams`].
    pub period: f64,
    /// See [`SamplingParams`].
    pub samples_per_period: f64,
    /// See [`SamplingParams`].
    pub shift: f64,
    /// Draw targets stochastically at the deterministic mean rate.
    pub stochastic_sample_period: bool,
    /// Save the configuration at each sample.
    pub do_sample_trajectory: bool,
    /// Record simulated time at each sample.
    pub do_sample_time: bool,

    functions: Vec<StateSamplingFunction>,
    engine: Box<dyn RandomEngine>,

    /// Monte Carlo steps taken.
    pub step: u64,
    /// Monte Carlo passes taken (`step / steps_per_pass`).
    pub pass: u64,
    /// Steps per pass; the number of mutating sites.
    pub steps_per_pass: u64,
    /// Steps (BY_STEP) or passes (otherwise).
    pub count: u64,
    /// Simulated time, set by the driver.
    pub time: f64,
    /// Steps with an accepted event.
    pub n_accept: u64,
    /// Steps with a rejected event.
    pub n_reject: u64,
    /// Next count at which a sample is due (count modes).
    pub next_sample_count: u64,
    /// Next simulated time at which a sample is due (time mode).
    pub next_sample_time: f64,

    /// One sampler per sampling function, by quantity name.
    pub samplers: SamplerMap,
    /// Count at each sample.
    pub sample_count: Vec<u64>,
    /// Simulated time at each sample, when recorded.
    pub sample_time: Vec<f64>,
    /// Weight given to each sample (N-fold way); empty when unweighted.
    pub sample_weight: Sampler,
    /// Wall clock seconds at each sample.
    pub sample_clocktime: Vec<f64>,
    /// Configuration at each sample, when `do_sample_trajectory`.
    pub sample_trajectory: Vec<Vec<i32>>,
}

impl StateSampler {
    /// Create a sampler from schedule parameters, sampling functions, and
    /// a random engine (used only for stochastic cadence).
    ///
    /// Call [`Self::reset`] with the real steps-per-pass before sampling.
    #[must_use]
    pub fn new(
        params: &SamplingParams,
        functions: Vec<StateSamplingFunction>,
        engine: Box<dyn RandomEngine>,
    ) -> Self {
        let mut sampler = Self {
            sample_mode: params.sample_mode,
            sample_method: params.sample_method,
            begin: params.begin,
            period: params.period,
            samples_per_period: params.samples_per_period,
            shift: params.shift,
            stochastic_sample_period: params.stochastic_sample_period,
            do_sample_trajectory: params.do_sample_trajectory,
            do_sample_time: params.do_sample_time,
            functions,
            engine,
            step: 0,
            pass: 0,
            steps_per_pass: 1,
            count: 0,
            time: 0.0,
            n_accept: 0,
            n_reject: 0,
            next_sample_count: 0,
            next_sample_time: 0.0,
            samplers: SamplerMap::new(),
            sample_count: Vec::new(),
            sample_time: Vec::new(),
            sample_weight: Sampler::scalar(),
            sample_clocktime: Vec::new(),
            sample_trajectory: Vec::new(),
        };
        sampler.reset(1);
        sampler
    }

    /// Reset counters and sampled data; set `steps_per_pass`.
    ///
    /// # Panics
    ///
    /// Panics if the first scheduled target is negative (parameter error).
    pub fn reset(&mut self, steps_per_pass: u64) {
        assert!(steps_per_pass > 0, "steps_per_pass must be nonzero");
        self.steps_per_pass = steps_per_pass;
        self.step = 0;
        self.pass = 0;
        self.count = 0;
        self.time = 0.0;
        self.n_accept = 0;
        self.n_reject = 0;
        self.samplers = self
            .functions
            .iter()
            .map(|f| {
                (
                    f.name.clone(),
                    Sampler::with_component_names(f.shape.clone(), f.component_names.clone()),
                )
            })
            .collect();
        self.sample_count.clear();
        self.sample_time.clear();
        self.sample_weight.clear();
        self.sample_clocktime.clear();
        self.sample_trajectory.clear();

        if self.sample_mode == SampleMode::ByTime {
            self.next_sample_count = 0;
            self.next_sample_time = self.sample_at(0);
            assert!(
                self.next_sample_time >= 0.0,
                "sampling period parameter error: next_sample_time < 0.0"
            );
        } else {
            self.next_sample_time = 0.0;
            let target = self.sample_at(0).round();
            assert!(
                target >= 0.0,
                "sampling period parameter error: next_sample_count < 0"
            );
            self.next_sample_count = target as u64;
        }
    }

    /// Number of samples taken.
    #[must_use]
    pub fn n_samples(&self) -> u64 {
        self.sample_count.len() as u64
    }

    /// The sampling functions, in evaluation order.
    #[must_use]
    pub fn functions(&self) -> &[StateSamplingFunction] {
        &self.functions
    }

    /// The count or time at which the `sample_index`-th sample is due.
    ///
    /// With `stochastic_sample_period`, `sample_index` must equal the
    /// number of samples already taken: the next target is the previous
    /// one plus a geometric (count) or exponential (time) increment at
    /// the instantaneous deterministic rate.
    pub fn sample_at(&mut self, sample_index: usize) -> f64 {
        let n = sample_index as f64;
        if self.stochastic_sample_period {
            if sample_index == 0 {
                return self.begin;
            }
            let rate = match self.sample_method {
                SampleMethod::Linear => self.samples_per_period / self.period,
                SampleMethod::Log => {
                    self.samples_per_period
                        / (self.period.ln()
                            * self
                                .period
                                .powf((n + self.shift) / self.samples_per_period))
                }
            };
            if self.sample_mode == SampleMode::ByTime {
                let last = self.sample_time.last().copied().unwrap_or(self.begin);
                last + self.engine.exponential(rate)
            } else {
                let last = self.sample_count.last().copied().unwrap_or(0);
                last as f64 + f64::from(self.geometric_count_step(rate))
            }
        } else {
            match self.sample_method {
                SampleMethod::Linear => self.begin + (self.period / self.samples_per_period) * n,
                SampleMethod::Log => {
                    self.begin
                        + self
                            .period
                            .powf((n + self.shift) / self.samples_per_period)
                }
            }
        }
    }

    /// Geometric deviate: number of counts until the next sample at the
    /// given per-count rate.
    fn geometric_count_step(&mut self, sample_rate: f64) -> u32 {
        let mut dn = 1;
        loop {
            if self.engine.uniform() < sample_rate {
                return dn;
            }
            dn += 1;
        }
    }

    /// Take a sample now: record bookkeeping, evaluate every function,
    /// and advance the schedule.
    ///
    /// # Panics
    ///
    /// Panics if the next scheduled target does not strictly increase.
    pub fn sample_data(&mut self, clocktime: f64, occupation: Option<&[i32]>) {
        self.sample_count.push(self.count);
        if self.do_sample_time || self.sample_mode == SampleMode::ByTime {
            self.sample_time.push(self.time);
        }
        self.sample_clocktime.push(clocktime);
        if self.do_sample_trajectory {
            if let Some(occ) = occupation {
                self.sample_trajectory.push(occ.to_vec());
            }
        }

        for i in 0..self.functions.len() {
            let value = self.functions[i].eval();
            let name = &self.functions[i].name;
            if let Some(sampler) = self.samplers.get_mut(name) {
                sampler.push_back(&value);
            }
        }

        if self.sample_mode == SampleMode::ByTime {
            self.next_sample_time = self.sample_at(self.sample_time.len());
            assert!(
                self.next_sample_time > self.time,
                "sampling period parameter error: next_sample_time <= current time"
            );
        } else {
            let target = self.sample_at(self.sample_count.len()).round();
            let next = target as u64;
            assert!(
                target >= 0.0 && next > self.count,
                "sampling period parameter error: next_sample_count <= current count"
            );
            self.next_sample_count = next;
        }
    }

    /// Take a sample if one is due at the current count (count modes).
    /// Returns whether a sample was taken.
    pub fn sample_data_by_count_if_due(
        &mut self,
        clocktime: f64,
        occupation: Option<&[i32]>,
    ) -> bool {
        if self.sample_mode != SampleMode::ByTime && self.count == self.next_sample_count {
            self.sample_data(clocktime, occupation);
            true
        } else {
            false
        }
    }

    /// Set the weight given to the next sample (N-fold way).
    pub fn push_back_sample_weight(&mut self, weight: f64) {
        self.sample_weight.push_back(&[weight]);
    }

    /// Record one accepted event.
    pub fn increment_n_accept(&mut self) {
        self.n_accept += 1;
    }

    /// Record one rejected event.
    pub fn increment_n_reject(&mut self) {
        self.n_reject += 1;
    }

    /// Advance by one Monte Carlo step, updating pass and count.
    pub fn increment_step(&mut self) {
        self.step += 1;
        self.pass = self.step / self.steps_per_pass;
        self.count = if self.sample_mode == SampleMode::ByStep {
            self.step
        } else {
            self.pass
        };
    }

    /// Set the simulated time (from the event selector).
    pub fn set_time(&mut self, event_time: f64) {
        self.time = event_time;
    }
}

impl fmt::Debug for StateSampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateSampler")
            .field("sample_mode", &self.sample_mode)
            .field("sample_method", &self.sample_method)
            .field("count", &self.count)
            .field("time", &self.time)
            .field("n_samples", &self.sample_count.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::rng::Lcg64;

    fn constant_f(name: &str, value: f64) -> StateSamplingFunction {
        StateSamplingFunction::new(
            name,
            "constant test quantity",
            vec![1],
            Box::new(move || vec![value]),
        )
    }

    fn sampler_with(params: SamplingParams) -> StateSampler {
        StateSampler::new(
            &params,
            vec![constant_f("q", 1.5)],
            Box::new(Lcg64::new(42)),
        )
    }

    /// Drive `n_steps` steps; return the counts at which samples fired.
    fn drive(sampler: &mut StateSampler, n_steps: u64) -> Vec<u64> {
        let mut fired = Vec::new();
        for _ in 0..n_steps {
            if sampler.sample_data_by_count_if_due(0.0, None) {
                fired.push(sampler.count);
            }
            sampler.increment_step();
        }
        fired
    }

    #[test]
    fn linear_by_step_cadence() {
        let mut s = sampler_with(SamplingParams {
            sample_mode: SampleMode::ByStep,
            period: 10.0,
            ..SamplingParams::default()
        });
        s.reset(1);
        let fired = drive(&mut s, 45);
        assert_eq!(fired, vec![0, 10, 20, 30, 40]);
    }

    #[test]
    fn log_cadence_powers_of_period() {
        let mut s = sampler_with(SamplingParams {
            sample_mode: SampleMode::ByStep,
            sample_method: SampleMethod::Log,
            period: 10.0,
            shift: 1.0,
            ..SamplingParams::default()
        });
        s.reset(1);
        let fired = drive(&mut s, 1200);
        assert_eq!(fired, vec![10, 100, 1000]);
    }

    #[test]
    fn by_pass_counts_passes() {
        let mut s = sampler_with(SamplingParams {
            sample_mode: SampleMode::ByPass,
            period: 2.0,
            ..SamplingParams::default()
        });
        s.reset(5); // 5 steps per pass
        let fired = drive(&mut s, 25);
        // Samples due at pass counts 0, 2, 4.
        assert_eq!(fired, vec![0, 2, 4]);
        assert_eq!(s.pass, 5);
        assert_eq!(s.step, 25);
    }

    #[test]
    fn samples_per_period_subdivides() {
        let mut s = sampler_with(SamplingParams {
            sample_mode: SampleMode::ByStep,
            period: 10.0,
            samples_per_period: 2.0,
            ..SamplingParams::default()
        });
        s.reset(1);
        let fired = drive(&mut s, 21);
        assert_eq!(fired, vec![0, 5, 10, 15, 20]);
    }

    #[test]
    fn sampled_values_recorded() {
        let mut s = sampler_with(SamplingParams {
            sample_mode: SampleMode::ByStep,
            period: 5.0,
            ..SamplingParams::default()
        });
        s.reset(1);
        drive(&mut s, 11);
        let sampler = &s.samplers["q"];
        assert_eq!(sampler.n_samples(), 3); // counts 0, 5, 10
        assert_eq!(sampler.component(0), &[1.5, 1.5, 1.5]);
        assert_eq!(s.sample_count, vec![0, 5, 10]);
    }

    #[test]
    fn stochastic_linear_mean_rate() {
        let mut s = sampler_with(SamplingParams {
            sample_mode: SampleMode::ByStep,
            period: 10.0,
            stochastic_sample_period: true,
            ..SamplingParams::default()
        });
        s.reset(1);
        let n_steps = 1_000_000;
        let fired = drive(&mut s, n_steps);
        let expected = n_steps as f64 / 10.0;
        let actual = fired.len() as f64;
        assert!(
            (actual - expected).abs() / expected < 0.01,
            "stochastic cadence should average 1 sample / 10 steps: got {actual} in {n_steps}"
        );
    }

    #[test]
    fn by_time_schedule_targets() {
        let mut s = sampler_with(SamplingParams {
            sample_mode: SampleMode::ByTime,
            period: 2.0,
            do_sample_time: true,
            ..SamplingParams::default()
        });
        s.reset(1);
        assert_eq!(s.next_sample_time, 0.0);
        s.set_time(0.0);
        s.sample_data(0.0, None);
        assert_eq!(s.next_sample_time, 2.0);
        s.set_time(2.0);
        s.sample_data(0.0, None);
        assert_eq!(s.next_sample_time, 4.0);
        assert_eq!(s.sample_time, vec![0.0, 2.0]);
    }

    #[test]
    #[should_panic(expected = "next_sample_count <= current count")]
    fn non_increasing_schedule_aborts() {
        // LOG with period just above 1 rounds successive targets to the
        // same count.
        let mut s = sampler_with(SamplingParams {
            sample_mode: SampleMode::ByStep,
            sample_method: SampleMethod::Log,
            period: 1.01,
            ..SamplingParams::default()
        });
        s.reset(1);
        // First target is round(1.01^0) = 1; second round(1.01^1) = 1 too.
        s.increment_step();
        s.sample_data(0.0, None);
    }

    #[test]
    fn accept_reject_counters() {
        let mut s = sampler_with(SamplingParams::default());
        s.reset(4);
        s.increment_n_accept();
        s.increment_n_accept();
        s.increment_n_reject();
        assert_eq!(s.n_accept, 2);
        assert_eq!(s.n_reject, 1);
    }

    #[test]
    fn sample_weight_recorded() {
        let mut s = sampler_with(SamplingParams::default());
        s.reset(1);
        s.push_back_sample_weight(2.0);
        s.push_back_sample_weight(0.5);
        assert_eq!(s.sample_weight.component(0), &[2.0, 0.5]);
    }

    #[test]
    fn trajectory_snapshots_when_requested() {
        let mut s = StateSampler::new(
            &SamplingParams {
                sample_mode: SampleMode::ByStep,
                period: 1.0,
                do_sample_trajectory: true,
                ..SamplingParams::default()
            },
            vec![constant_f("q", 0.0)],
            Box::new(Lcg64::new(1)),
        );
        s.reset(1);
        let occ = vec![1, -1, 1];
        s.sample_data(0.0, Some(&occ));
        assert_eq!(s.sample_trajectory, vec![vec![1, -1, 1]]);
    }

    #[test]
    fn reset_clears_sampled_data() {
        let mut s = sampler_with(SamplingParams {
            sample_mode: SampleMode::ByStep,
            period: 1.0,
            ..SamplingParams::default()
        });
        s.reset(1);
        drive(&mut s, 5);
        assert!(s.n_samples() > 0);
        s.reset(1);
        assert_eq!(s.n_samples(), 0);
        assert_eq!(s.samplers["q"].n_samples(), 0);
        assert_eq!(s.count, 0);
    }
}
