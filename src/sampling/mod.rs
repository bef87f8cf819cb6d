// SPDX-License-Identifier: AGPL-3.0-only

//! Sample storage, sampling schedules, and sampling-function dispatch.

mod params;
mod sampler;
mod state_sampler;

pub use params::{SampleMethod, SampleMode, SamplingParams};
pub use sampler::{
    converge, default_component_names, get_n_samples, RequestedPrecision,
    RequestedPrecisionConstructor, Sampler, SamplerComponent, SamplerMap,
};
pub use state_sampler::{StateSampler, StateSamplingFunction};
