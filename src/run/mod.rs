// SPDX-License-Identifier: AGPL-3.0-only

//! Sampling fixtures and the run manager that drives them.

mod fixture;
mod manager;

pub use fixture::{SamplingFixture, SamplingFixtureParams};
pub use manager::RunManager;
