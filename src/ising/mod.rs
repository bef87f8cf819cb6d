// SPDX-License-Identifier: AGPL-3.0-only

//! Square-lattice Ising model with a semi-grand canonical Metropolis
//! calculator.
//!
//! The validation vehicle for the runtime: a ±1 occupation on a periodic
//! square lattice, property calculators for formation energy and
//! parametric composition, a single-flip event generator, and a
//! Metropolis occupation loop wired to the state sampler and completion
//! check. Natural units: `k_B = 1`, so `β = 1 / temperature`.

mod model;
mod semigrand;

pub use model::{
    IsingConfiguration, IsingFormationEnergy, IsingParamComposition,
    IsingSemiGrandCanonicalEventGenerator, IsingState, SemiGrandCanonicalConditions,
};
pub use semigrand::{IsingSystem, SemiGrandCanonicalCalculator};
