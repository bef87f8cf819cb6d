// SPDX-License-Identifier: AGPL-3.0-only

//! Final run results and post-run analysis functions.
//!
//! A [`RunResults`] aggregates everything a downstream consumer needs:
//! the sampled data, the per-sample bookkeeping, accept/reject counters,
//! and the final completion-check results. [`ResultsAnalysisFunction`]s
//! are evaluated once over the finished run; a failing function fills its
//! output with NaNs of the correct length and is logged, without
//! affecting the run's completion status.

use std::collections::BTreeMap;
use std::fmt;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::checks::CompletionCheckResults;
use crate::error::QuenchError;
use crate::sampling::{default_component_names, Sampler, SamplerMap};

/// Initial and final configuration of one run, for analysis functions.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RunData {
    /// Occupation before the first event.
    pub initial_occupation: Vec<i32>,
    /// Occupation after the last event.
    pub final_occupation: Vec<i32>,
}

/// Aggregate results of one completed run.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RunResults {
    /// Elapsed wall time of the run, seconds.
    pub elapsed_clocktime: f64,
    /// Sampled data, by quantity name.
    pub samplers: SamplerMap,
    /// Count at each sample.
    pub sample_count: Vec<u64>,
    /// Simulated time at each sample, when recorded.
    pub sample_time: Vec<f64>,
    /// Sample weights (N-fold way); empty when unweighted.
    pub sample_weight: Sampler,
    /// Wall clock seconds at each sample.
    pub sample_clocktime: Vec<f64>,
    /// Configuration snapshots, when trajectory sampling was requested.
    pub sample_trajectory: Vec<Vec<i32>>,
    /// Steps with an accepted event.
    pub n_accept: u64,
    /// Steps with a rejected event.
    pub n_reject: u64,
    /// Final completion-check results.
    pub completion_check_results: CompletionCheckResults,
    /// Post-run analysis values, by analysis-function name.
    pub analysis: BTreeMap<String, Vec<f64>>,
}

/// A named vector-valued function of the finished run.
pub struct ResultsAnalysisFunction {
    /// Function name.
    pub name: String,
    /// Description of the function.
    pub description: String,
    /// Shape of the result; row-major unrolling.
    pub shape: Vec<usize>,
    /// One name per component of the result.
    pub component_names: Vec<String>,
    /// The function to be evaluated.
    #[allow(clippy::type_complexity)]
    pub function: Box<dyn Fn(&RunData, &RunResults) -> Result<Vec<f64>, QuenchError> + Send + Sync>,
}

impl ResultsAnalysisFunction {
    /// Create an analysis function with default component names.
    #[must_use]
    pub fn new(
        name: &str,
        description: &str,
        shape: Vec<usize>,
        function: Box<
            dyn Fn(&RunData, &RunResults) -> Result<Vec<f64>, QuenchError> + Send + Sync,
        >,
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

    /// Evaluate the function.
    ///
    /// # Errors
    ///
    /// Propagates the function's own failure.
    pub fn eval(&self, run_data: &RunData, results: &RunResults) -> Result<Vec<f64>, QuenchError> {
        (self.function)(run_data, results)
    }
}

impl fmt::Debug for ResultsAnalysisFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultsAnalysisFunction")
            .field("name", &self.name)
            .field("shape", &self.shape)
            .finish_non_exhaustive()
    }
}

/// Evaluate all analysis functions over a finished run.
///
/// Functions are independent and run in parallel. A failing function
/// contributes NaNs of its component length; the failure is reported on
/// stderr and does not abort.
#[must_use]
pub fn make_analysis(
    run_data: &RunData,
    results: &RunResults,
    analysis_functions: &[ResultsAnalysisFunction],
) -> BTreeMap<String, Vec<f64>> {
    let evaluated: Vec<(String, Result<Vec<f64>, QuenchError>)> = analysis_functions
        .par_iter()
        .map(|f| (f.name.clone(), f.eval(run_data, results)))
        .collect();

    let mut analysis = BTreeMap::new();
    for ((name, outcome), f) in evaluated.into_iter().zip(analysis_functions) {
        match outcome {
            Ok(value) => {
                analysis.insert(name, value);
            }
            Err(err) => {
                eprintln!("Results analysis '{name}' failed: {err}");
                analysis.insert(name, vec![f64::NAN; f.component_names.len()]);
            }
        }
    }
    analysis
}
