// SPDX-License-Identifier: AGPL-3.0-only

//! One sampling fixture: a labelled state sampler paired with its
//! completion check.
//!
//! A run carries one or more fixtures; each samples on its own schedule
//! and decides its own completion. The driver wraps each sample in
//! pre/post hooks that refresh shared scratch (total rate, atom
//! positions, previous-sample snapshots) for the sampling functions.

use crate::checks::{CompletionCheck, CompletionCheckParams};
use crate::error::QuenchError;
use crate::results::RunResults;
use crate::rng::RandomEngine;
use crate::sampling::{SampleMode, SamplingParams, StateSampler, StateSamplingFunction};

/// Parameters of one sampling fixture.
#[derive(Clone, Debug)]
pub struct SamplingFixtureParams {
    /// Label identifying the fixture in shared scratch and status output.
    pub label: String,
    /// What to sample and when.
    pub sampling_params: SamplingParams,
    /// When the fixture is complete.
    pub completion_check_params: CompletionCheckParams,
}

/// A labelled state sampler plus completion check.
pub struct SamplingFixture {
    label: String,
    state_sampler: StateSampler,
    completion_check: CompletionCheck,
}

impl SamplingFixture {
    /// Create a fixture. `functions` must be the sampling functions named
    /// by `params.sampling_params.sampler_names`, validated beforehand.
    ///
    /// # Errors
    ///
    /// Returns the collected validation errors of the sampling
    /// parameters.
    pub fn new(
        params: SamplingFixtureParams,
        functions: Vec<StateSamplingFunction>,
        engine: Box<dyn RandomEngine>,
        time_sampling_allowed: bool,
    ) -> Result<Self, Vec<QuenchError>> {
        let names = functions.iter().map(|f| f.name.clone()).collect();
        params
            .sampling_params
            .validate(&names, time_sampling_allowed)?;
        Ok(Self {
            label: params.label,
            state_sampler: StateSampler::new(&params.sampling_params, functions, engine),
            completion_check: CompletionCheck::new(params.completion_check_params),
        })
    }

    /// The fixture label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The state sampler.
    #[must_use]
    pub const fn state_sampler(&self) -> &StateSampler {
        &self.state_sampler
    }

    /// The state sampler, mutably.
    pub fn state_sampler_mut(&mut self) -> &mut StateSampler {
        &mut self.state_sampler
    }

    /// The completion check.
    #[must_use]
    pub const fn completion_check(&self) -> &CompletionCheck {
        &self.completion_check
    }

    /// Reset counters and sampled data for a new run.
    pub fn initialize(&mut self, steps_per_pass: u64) {
        self.state_sampler.reset(steps_per_pass);
    }

    /// Evaluate this fixture's completion predicate.
    pub fn is_complete(&mut self, clocktime: f64) -> bool {
        let s = &self.state_sampler;
        let time = if s.do_sample_time || s.sample_mode == SampleMode::ByTime {
            Some(s.time)
        } else {
            None
        };
        self.completion_check.check(
            &s.samplers,
            &s.sample_weight,
            s.count,
            time,
            clocktime,
        )
    }

    /// Take a count-scheduled sample if due, wrapped in the driver's
    /// pre/post hooks. Returns whether a sample fired.
    pub fn sample_data_by_count_if_due(
        &mut self,
        clocktime: f64,
        occupation: Option<&[i32]>,
        pre: &mut dyn FnMut(&Self),
        post: &mut dyn FnMut(&Self),
    ) -> bool {
        let s = &self.state_sampler;
        if s.sample_mode == SampleMode::ByTime || s.count != s.next_sample_count {
            return false;
        }
        pre(self);
        self.state_sampler.sample_data(clocktime, occupation);
        post(self);
        true
    }

    /// Take every time-scheduled sample due at or before `event_time`,
    /// each at its *scheduled* time, wrapped in the driver's pre/post
    /// hooks. Returns how many samples fired.
    pub fn sample_data_by_time_if_due(
        &mut self,
        event_time: f64,
        clocktime: f64,
        occupation: Option<&[i32]>,
        pre: &mut dyn FnMut(&Self),
        post: &mut dyn FnMut(&Self),
    ) -> usize {
        let mut fired = 0;
        while self.state_sampler.sample_mode == SampleMode::ByTime
            && event_time >= self.state_sampler.next_sample_time
        {
            // Schedule-true: the sample sees the scheduled time, not the
            // event time that overshot it.
            let scheduled = self.state_sampler.next_sample_time;
            self.state_sampler.set_time(scheduled);
            pre(self);
            self.state_sampler.sample_data(clocktime, occupation);
            post(self);
            fired += 1;
        }
        fired
    }

    /// Consume the fixture into final results.
    #[must_use]
    pub fn finalize(self, elapsed_clocktime: f64) -> RunResults {
        let s = self.state_sampler;
        RunResults {
            elapsed_clocktime,
            samplers: s.samplers,
            sample_count: s.sample_count,
            sample_time: s.sample_time,
            sample_weight: s.sample_weight,
            sample_clocktime: s.sample_clocktime,
            sample_trajectory: s.sample_trajectory,
            n_accept: s.n_accept,
            n_reject: s.n_reject,
            completion_check_results: self.completion_check.results().clone(),
            analysis: std::collections::BTreeMap::new(),
        }
    }

}
