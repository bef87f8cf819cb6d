// SPDX-License-Identifier: AGPL-3.0-only

//! Append-only sample storage with component-wise views.
//!
//! A [`Sampler`] is a column-named matrix whose rows are successive
//! samples of a fixed-shape vector. Storage is one contiguous `Vec<f64>`
//! per component, so `component(i)` is a borrowed slice over every sample
//! of that component and growth is geometric (Vec doubling) rather than
//! per-sample reallocation.
//!
//! [`SamplerComponent`] names one scalar column across the sampler map;
//! [`RequestedPrecision`] is the convergence demand placed on it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::QuenchError;

/// Map of quantity name → sampler holding its samples.
pub type SamplerMap = BTreeMap<String, Sampler>;

/// Default component names for a tensor shape: `"0", "1", …` over the
/// row-major unrolled components. A scalar (empty shape) gets `["0"]`.
#[must_use]
pub fn default_component_names(shape: &[usize]) -> Vec<String> {
    let n: usize = shape.iter().product();
    (0..n).map(|i| i.to_string()).collect()
}

/// Number of samples shared by every sampler in a map (the minimum, so a
/// partially-written map reports conservatively).
#[must_use]
pub fn get_n_samples(samplers: &SamplerMap) -> u64 {
    samplers
        .values()
        .map(|s| s.n_samples() as u64)
        .min()
        .unwrap_or(0)
}

/// Append-only matrix of vector-valued samples.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Sampler {
    shape: Vec<usize>,
    component_names: Vec<String>,
    /// One contiguous column per component.
    columns: Vec<Vec<f64>>,
}

impl Sampler {
    /// Create a sampler for a tensor shape with default component names.
    #[must_use]
    pub fn new(shape: Vec<usize>) -> Self {
        let component_names = default_component_names(&shape);
        Self::with_component_names(shape, component_names)
    }

    /// Create a sampler with custom component names.
    ///
    /// # Panics
    ///
    /// Panics if the number of names does not match the shape, or if any
    /// name repeats; both are construction-time programming errors.
    #[must_use]
    pub fn with_component_names(shape: Vec<usize>, component_names: Vec<String>) -> Self {
        let n: usize = shape.iter().product();
        assert_eq!(
            component_names.len(),
            n,
            "component_names length must equal the product of the shape"
        );
        for (i, a) in component_names.iter().enumerate() {
            for b in &component_names[i + 1..] {
                assert_ne!(a, b, "component names must be unique: '{a}' repeats");
            }
        }
        Self {
            shape,
            component_names,
            columns: vec![Vec::new(); n],
        }
    }

    /// Scalar sampler (shape `[]`, one component). Used for sample weights.
    #[must_use]
    pub fn scalar() -> Self {
        Self::new(vec![])
    }

    /// Append one sample.
    ///
    /// # Panics
    ///
    /// Panics if `value.len()` does not match the number of components.
    pub fn push_back(&mut self, value: &[f64]) {
        assert_eq!(
            value.len(),
            self.columns.len(),
            "sample length {} does not match {} components",
            value.len(),
            self.columns.len()
        );
        for (column, &v) in self.columns.iter_mut().zip(value) {
            column.push(v);
        }
    }

    /// Discard all samples, keeping shape and names.
    pub fn clear(&mut self) {
        for column in &mut self.columns {
            column.clear();
        }
    }

    /// Number of samples taken so far.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    /// Number of scalar components per sample.
    #[must_use]
    pub fn n_components(&self) -> usize {
        self.columns.len()
    }

    /// Tensor shape of one sample.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Component names, in component-index order.
    #[must_use]
    pub fn component_names(&self) -> &[String] {
        &self.component_names
    }

    /// All samples of component `i`, without copying.
    #[must_use]
    pub fn component(&self, i: usize) -> &[f64] {
        &self.columns[i]
    }
}

/// One scalar column of one sampler, ordered by (name, component index).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SamplerComponent {
    /// Name of the sampled quantity.
    pub sampler_name: String,
    /// Component index within the sampler.
    pub component_index: usize,
    /// Component name at that index.
    pub component_name: String,
}

impl SamplerComponent {
    /// Create a sampler component key.
    #[must_use]
    pub fn new(sampler_name: &str, component_index: usize, component_name: &str) -> Self {
        Self {
            sampler_name: sampler_name.to_string(),
            component_index,
            component_name: component_name.to_string(),
        }
    }
}

/// Convergence demanded of one sampler component. A component is
/// converged when every *required* criterion is met simultaneously.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequestedPrecision {
    /// Whether absolute convergence is required.
    pub abs_convergence_is_required: bool,
    /// Required absolute precision of the mean.
    pub abs_precision: f64,
    /// Whether relative convergence is required.
    pub rel_convergence_is_required: bool,
    /// Required precision of the mean as a fraction of `|mean|`.
    pub rel_precision: f64,
}

impl Default for RequestedPrecision {
    fn default() -> Self {
        Self {
            abs_convergence_is_required: false,
            abs_precision: f64::INFINITY,
            rel_convergence_is_required: false,
            rel_precision: f64::INFINITY,
        }
    }
}

impl RequestedPrecision {
    /// Require absolute precision only.
    #[must_use]
    pub fn abs(value: f64) -> Self {
        Self {
            abs_convergence_is_required: true,
            abs_precision: value,
            ..Self::default()
        }
    }

    /// Require relative precision only.
    #[must_use]
    pub fn rel(value: f64) -> Self {
        Self {
            rel_convergence_is_required: true,
            rel_precision: value,
            ..Self::default()
        }
    }

    /// Require both absolute and relative precision.
    #[must_use]
    pub fn abs_and_rel(abs_value: f64, rel_value: f64) -> Self {
        Self {
            abs_convergence_is_required: true,
            abs_precision: abs_value,
            rel_convergence_is_required: true,
            rel_precision: rel_value,
        }
    }
}

/// Builder assigning requested precision to a sampler's components.
///
/// Starts with every component of the named sampler selected; narrow with
/// [`Self::component_index`] / [`Self::component_name`], then set the
/// precision. Convert into the map with [`Self::finish`].
#[derive(Clone, Debug)]
pub struct RequestedPrecisionConstructor {
    sampler_name: String,
    all_component_names: Vec<String>,
    requested: BTreeMap<SamplerComponent, RequestedPrecision>,
}

/// Start a requested-precision builder for one sampler in a map.
///
/// # Errors
///
/// Returns a params error if `sampler_name` is not in the map.
pub fn converge(
    samplers: &SamplerMap,
    sampler_name: &str,
) -> Result<RequestedPrecisionConstructor, QuenchError> {
    let sampler = samplers.get(sampler_name).ok_or_else(|| {
        QuenchError::params(
            "convergence/quantity",
            format!("'{sampler_name}' is not a sampling option"),
        )
    })?;
    let all_component_names = sampler.component_names().to_vec();
    let requested = all_component_names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            (
                SamplerComponent::new(sampler_name, i, name),
                RequestedPrecision::default(),
            )
        })
        .collect();
    Ok(RequestedPrecisionConstructor {
        sampler_name: sampler_name.to_string(),
        all_component_names,
        requested,
    })
}

impl RequestedPrecisionConstructor {
    /// Narrow the selection to one component by index.
    ///
    /// # Errors
    ///
    /// Returns a params error if the index is out of range.
    pub fn component_index(mut self, index: usize) -> Result<Self, QuenchError> {
        if index >= self.all_component_names.len() {
            return Err(QuenchError::params(
                "convergence/component_index",
                format!(
                    "component index {index} is out of range for '{}': valid range is [0, {})",
                    self.sampler_name,
                    self.all_component_names.len()
                ),
            ));
        }
        let key = SamplerComponent::new(
            &self.sampler_name,
            index,
            &self.all_component_names[index],
        );
        let value = self.requested[&key];
        self.requested.clear();
        self.requested.insert(key, value);
        Ok(self)
    }

    /// Narrow the selection to one component by name.
    ///
    /// # Errors
    ///
    /// Returns a params error if the name is unknown.
    pub fn component_name(self, name: &str) -> Result<Self, QuenchError> {
        let index = self
            .all_component_names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| {
                QuenchError::params(
                    "convergence/component_name",
                    format!(
                        "component name '{name}' is not valid for '{}'",
                        self.sampler_name
                    ),
                )
            })?;
        self.component_index(index)
    }

    /// Set absolute precision on the selected components.
    #[must_use]
    pub fn abs_precision(mut self, value: f64) -> Self {
        for req in self.requested.values_mut() {
            req.abs_convergence_is_required = true;
            req.abs_precision = value;
        }
        self
    }

    /// Set relative precision on the selected components.
    #[must_use]
    pub fn rel_precision(mut self, value: f64) -> Self {
        for req in self.requested.values_mut() {
            req.rel_convergence_is_required = true;
            req.rel_precision = value;
        }
        self
    }

    /// The selected components with their requested precision.
    #[must_use]
    pub fn finish(self) -> BTreeMap<SamplerComponent, RequestedPrecision> {
        self.requested
    }
}
