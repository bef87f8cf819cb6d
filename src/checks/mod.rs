// SPDX-License-Identifier: AGPL-3.0-only

//! Equilibration, convergence, cutoff, and completion checking.

mod completion;
mod convergence;
mod cutoff;
mod equilibration;

pub use completion::{
    requested_precision_from_specs, CompletionCheck, CompletionCheckParams,
    CompletionCheckResults, ConvergenceSpec,
};
pub use convergence::{convergence_check, ConvergenceCheckResults, IndividualConvergenceCheckResult};
pub use cutoff::CutoffCheckParams;
pub use equilibration::{
    default_equilibration_check, EquilibrationCheckResults, IndividualEquilibrationCheckResult,
};
