// SPDX-License-Identifier: AGPL-3.0-only

// Clippy pedantic/nursery + numerics allows are in [lints.clippy] in
// Cargo.toml. Library code must propagate errors, not panic:
#![deny(clippy::expect_used, clippy::unwrap_used)]
#![warn(missing_docs)]

//! quench — Monte Carlo simulation runtime for lattice systems
//!
//! Drives a stochastic chain of configuration-modifying events, collects
//! sampled observables along the chain, and terminates when statistical
//! convergence criteria are satisfied or hard cutoffs are reached.
//!
//! # Architecture
//!
//! - **`conversions`** — site ↔ asymmetric-unit / species index lookups
//! - **`events`** — occupation events and the occupant location tracker
//!   (per-candidate buckets, swap-pop updates, atom drift tracking)
//! - **`sampling`** — sample storage, schedules (linear/log,
//!   deterministic/stochastic), and sampling-function dispatch
//! - **`statistics`** — mean and autocorrelation-inflated precision,
//!   weighted (N-fold way) resampling
//! - **`checks`** — equilibration, convergence, cutoffs, and the
//!   completion predicate that composes them
//! - **`results`** — final aggregates and post-run analysis functions
//! - **`run`** — sampling fixtures and the run manager
//! - **`kmc`** — the kinetic Monte Carlo driver
//! - **`ising`** — square-lattice Ising semi-grand canonical model, the
//!   end-to-end validation vehicle
//! - **`rng`** — seeded LCG random engine behind a capability trait
//! - **`method_log`** — explicit periodic-status handle (no global sinks)
//!
//! # Reproducibility
//!
//! Every stochastic choice draws through one seeded engine per stream;
//! given the same seed, initial state, and calculators, the entire
//! trajectory (event stream, sample stream, convergence decision) is
//! deterministic.
//!
//! # License
//!
//! AGPL-3.0 — see LICENSE in repository root.

/// Equilibration, convergence, cutoff, and completion checking.
pub mod checks;
/// Read-only site/asymmetric-unit/species/occupant index conversions.
pub mod conversions;
/// Typed errors for configuration, setup, and analysis failures.
pub mod error;
/// Occupation events and the occupant location tracker.
pub mod events;
/// Square-lattice Ising semi-grand canonical model and calculator.
pub mod ising;
/// Kinetic Monte Carlo driver and its shared sampling scratch.
pub mod kmc;
/// Explicit periodic-status logging handle.
pub mod method_log;
/// Final run results and post-run analysis functions.
pub mod results;
/// Seeded random engine capability (LCG default).
pub mod rng;
/// Sampling fixtures and the run manager.
pub mod run;
/// Sample storage, schedules, and sampling-function dispatch.
pub mod sampling;
/// Mean, variance, autocorrelation, and weighted resampling.
pub mod statistics;
