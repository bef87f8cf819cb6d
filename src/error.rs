// SPDX-License-Identifier: AGPL-3.0-only

//! Typed errors for quench configuration and run setup.
//!
//! Replaces `Result<_, String>` in public APIs with a proper enum so callers
//! can pattern-match on failure modes (bad parameters, inconsistent initial
//! occupation, failed analysis) rather than parsing opaque strings.
//!
//! Parameter validation collects *every* problem it finds, each tagged with
//! a path such as `convergence/2/component_name`, so a host can report them
//! all at once and refuse to start the run. Runtime invariant violations
//! (bucket underflow, species mismatch, non-increasing schedule targets)
//! are programming errors and abort via panic; they are not represented
//! here.

use std::fmt;

/// Errors arising from run configuration, setup, or post-run analysis.
#[derive(Debug, Clone, PartialEq)]
pub enum QuenchError {
    /// A parameter record failed validation. `path` locates the offending
    /// option (e.g. `convergence/2/component_name`).
    Params {
        /// Path to the offending option within the parameter record.
        path: String,
        /// What is wrong with it.
        msg: String,
    },

    /// Initial occupation is inconsistent with the candidate list
    /// (site, occupant index).
    InvalidOccupation {
        /// Linear site index of the offending site.
        site: usize,
        /// The occupant index found there.
        occ: i32,
    },

    /// A results-analysis function failed (name, underlying message).
    Analysis(String, String),
}

impl QuenchError {
    /// Shorthand for a parameter validation error.
    #[must_use]
    pub fn params(path: &str, msg: impl Into<String>) -> Self {
        Self::Params {
            path: path.to_string(),
            msg: msg.into(),
        }
    }
}

impl fmt::Display for QuenchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Params { path, msg } => write!(f, "{path}: {msg}"),
            Self::InvalidOccupation { site, occ } => {
                write!(
                    f,
                    "Occupation is inconsistent with the candidate list: \
                     site {site} has occupant index {occ}"
                )
            }
            Self::Analysis(name, msg) => {
                write!(f, "Results analysis '{name}' failed: {msg}")
            }
        }
    }
}

impl std::error::Error for QuenchError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_params_includes_path() {
        let err = QuenchError::params("convergence/2/component_name", "unknown component 'Va'");
        assert_eq!(
            err.to_string(),
            "convergence/2/component_name: unknown component 'Va'"
        );
    }

    #[test]
    fn display_invalid_occupation() {
        let err = QuenchError::InvalidOccupation { site: 7, occ: 3 };
        let msg = err.to_string();
        assert!(msg.contains("site 7"));
        assert!(msg.contains("occupant index 3"));
    }

    #[test]
    fn display_analysis_failure() {
        let err = QuenchError::Analysis("heat_capacity".into(), "empty sampler".into());
        assert!(err.to_string().contains("heat_capacity"));
        assert!(err.to_string().contains("empty sampler"));
    }

    #[test]
    fn error_trait_works() {
        let err = QuenchError::params("period", "must be > 0.0");
        let dyn_err: &dyn std::error::Error = &err;
        assert_eq!(dyn_err.to_string(), "period: must be > 0.0");
    }
}
