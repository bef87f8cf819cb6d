// SPDX-License-Identifier: AGPL-3.0-only

//! The run manager: fixtures, wall clock, periodic status, and
//! finalization.
//!
//! Holds every sampling fixture of a run and fans driver calls out to
//! them in insertion order (which is also the tie-break order for samples
//! scheduled at the same count). With `global_cutoff` (the default) the
//! run is complete as soon as any fixture is; otherwise every fixture
//! must complete.

use std::time::Instant;

use serde_json::json;

use crate::method_log::MethodLog;
use crate::results::{make_analysis, ResultsAnalysisFunction, RunData, RunResults};
use crate::run::fixture::SamplingFixture;

/// Drives one or more sampling fixtures through a run.
pub struct RunManager {
    fixtures: Vec<SamplingFixture>,
    /// Complete when any fixture completes (true) or all do (false).
    pub global_cutoff: bool,
    method_log: Option<MethodLog>,
    begin: Instant,
}

impl RunManager {
    /// Create a run manager over the given fixtures.
    #[must_use]
    pub fn new(
        fixtures: Vec<SamplingFixture>,
        global_cutoff: bool,
        method_log: Option<MethodLog>,
    ) -> Self {
        Self {
            fixtures,
            global_cutoff,
            method_log,
            begin: Instant::now(),
        }
    }

    /// The fixtures, in insertion order.
    #[must_use]
    pub fn fixtures(&self) -> &[SamplingFixture] {
        &self.fixtures
    }

    /// Elapsed wall time of the run, seconds.
    #[must_use]
    pub fn elapsed_clocktime(&self) -> f64 {
        self.begin.elapsed().as_secs_f64()
    }

    /// Reset every fixture and restart the wall clock.
    pub fn initialize(&mut self, steps_per_pass: u64) {
        self.begin = Instant::now();
        for fixture in &mut self.fixtures {
            fixture.initialize(steps_per_pass);
        }
    }

    /// Evaluate the run-level completion predicate.
    pub fn is_complete(&mut self) -> bool {
        let clocktime = self.elapsed_clocktime();
        let mut n_complete = 0;
        for fixture in &mut self.fixtures {
            if fixture.is_complete(clocktime) {
                n_complete += 1;
            }
        }
        if self.global_cutoff {
            n_complete > 0
        } else {
            n_complete == self.fixtures.len()
        }
    }

    /// Write one status line per fixture if the log interval elapsed.
    pub fn write_status_if_due(&mut self) {
        let clocktime = self.elapsed_clocktime();
        let Some(log) = &mut self.method_log else {
            return;
        };
        if !log.is_due() {
            return;
        }
        for fixture in &self.fixtures {
            let s = fixture.state_sampler();
            log.write(&json!({
                "label": fixture.label(),
                "count": s.count,
                "step": s.step,
                "pass": s.pass,
                "time": s.time,
                "n_samples": s.n_samples(),
                "n_accept": s.n_accept,
                "n_reject": s.n_reject,
                "clocktime": clocktime,
            }));
        }
    }

    /// Fire count-scheduled samples due on any fixture.
    pub fn sample_data_by_count_if_due(
        &mut self,
        occupation: Option<&[i32]>,
        pre: &mut dyn FnMut(&SamplingFixture),
        post: &mut dyn FnMut(&SamplingFixture),
    ) {
        let clocktime = self.elapsed_clocktime();
        for fixture in &mut self.fixtures {
            fixture.sample_data_by_count_if_due(clocktime, occupation, pre, post);
        }
    }

    /// Fire time-scheduled samples due on any fixture at or before
    /// `event_time`.
    pub fn sample_data_by_time_if_due(
        &mut self,
        event_time: f64,
        occupation: Option<&[i32]>,
        pre: &mut dyn FnMut(&SamplingFixture),
        post: &mut dyn FnMut(&SamplingFixture),
    ) {
        let clocktime = self.elapsed_clocktime();
        for fixture in &mut self.fixtures {
            fixture.sample_data_by_time_if_due(event_time, clocktime, occupation, pre, post);
        }
    }

    /// Advance every fixture by one step.
    pub fn increment_step(&mut self) {
        for fixture in &mut self.fixtures {
            fixture.state_sampler_mut().increment_step();
        }
    }

    /// Set the simulated time on every fixture.
    pub fn set_time(&mut self, event_time: f64) {
        for fixture in &mut self.fixtures {
            fixture.state_sampler_mut().set_time(event_time);
        }
    }

    /// Record one accepted event on every fixture.
    pub fn increment_n_accept(&mut self) {
        for fixture in &mut self.fixtures {
            fixture.state_sampler_mut().increment_n_accept();
        }
    }

    /// Record one rejected event on every fixture.
    pub fn increment_n_reject(&mut self) {
        for fixture in &mut self.fixtures {
            fixture.state_sampler_mut().increment_n_reject();
        }
    }

    /// Consume the manager into one result per fixture, evaluating the
    /// analysis functions over each.
    #[must_use]
    pub fn finalize(
        self,
        run_data: &RunData,
        analysis_functions: &[ResultsAnalysisFunction],
    ) -> Vec<(String, RunResults)> {
        let elapsed = self.begin.elapsed().as_secs_f64();
        self.fixtures
            .into_iter()
            .map(|fixture| {
                let label = fixture.label().to_string();
                let mut results = fixture.finalize(elapsed);
                results.analysis = make_analysis(run_data, &results, analysis_functions);
                (label, results)
            })
            .collect()
    }
}
