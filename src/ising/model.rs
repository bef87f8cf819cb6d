// SPDX-License-Identifier: AGPL-3.0-only

//! Ising configuration, conditions, and property calculators.
//!
//! The Hamiltonian is `H = -J Σ_<ij> s_i s_j` over nearest-neighbor
//! bonds of a periodic square lattice, with spins `s ∈ {-1, +1}` stored
//! directly in the occupation vector. Parametric composition is the up
//! fraction `x = N₊ / N` (so an all-up lattice has `x = 1`).

use serde::{Deserialize, Serialize};

use crate::rng::RandomEngine;

/// ±1 occupation on a periodic `rows × cols` square lattice.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsingConfiguration {
    /// Lattice shape: rows, columns.
    pub shape: [usize; 2],
    occupation: Vec<i32>,
}

impl IsingConfiguration {
    /// Create a lattice uniformly filled with `fill_value` (+1 or -1).
    ///
    /// # Panics
    ///
    /// Panics if `fill_value` is not ±1.
    #[must_use]
    pub fn new(shape: [usize; 2], fill_value: i32) -> Self {
        assert!(
            fill_value == 1 || fill_value == -1,
            "Ising occupation values are +1 or -1"
        );
        Self {
            shape,
            occupation: vec![fill_value; shape[0] * shape[1]],
        }
    }

    /// Total number of sites.
    #[must_use]
    pub fn n_sites(&self) -> usize {
        self.occupation.len()
    }

    /// Number of unit cells (one site per cell on this lattice).
    #[must_use]
    pub fn n_unitcells(&self) -> usize {
        self.occupation.len()
    }

    /// The occupation vector.
    #[must_use]
    pub fn occupation(&self) -> &[i32] {
        &self.occupation
    }

    /// Spin on site `l`.
    #[must_use]
    pub fn occ(&self, l: usize) -> i32 {
        self.occupation[l]
    }

    /// Set the spin on site `l`.
    ///
    /// # Panics
    ///
    /// Panics if `value` is not ±1.
    pub fn set_occ(&mut self, l: usize, value: i32) {
        assert!(
            value == 1 || value == -1,
            "Ising occupation values are +1 or -1"
        );
        self.occupation[l] = value;
    }

    /// Linear site index of (row, col).
    #[must_use]
    pub const fn site_index(&self, row: usize, col: usize) -> usize {
        row * self.shape[1] + col
    }

    /// The four nearest neighbors of site `l`, with periodic wrap.
    #[must_use]
    pub const fn neighbors(&self, l: usize) -> [usize; 4] {
        let [rows, cols] = self.shape;
        let row = l / cols;
        let col = l % cols;
        [
            self.site_index((row + 1) % rows, col),
            self.site_index((row + rows - 1) % rows, col),
            self.site_index(row, (col + 1) % cols),
            self.site_index(row, (col + cols - 1) % cols),
        ]
    }

    /// Sum of the four neighboring spins of site `l`.
    #[must_use]
    pub fn neighbor_sum(&self, l: usize) -> i32 {
        let nbrs = self.neighbors(l);
        self.occupation[nbrs[0]]
            + self.occupation[nbrs[1]]
            + self.occupation[nbrs[2]]
            + self.occupation[nbrs[3]]
    }
}

/// Semi-grand canonical thermodynamic conditions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SemiGrandCanonicalConditions {
    /// Temperature (natural units, `k_B = 1`).
    pub temperature: f64,
    /// Exchange chemical potential, one entry per independent
    /// composition component.
    pub exchange_potential: Vec<f64>,
}

impl SemiGrandCanonicalConditions {
    /// Create conditions.
    #[must_use]
    pub const fn new(temperature: f64, exchange_potential: Vec<f64>) -> Self {
        Self {
            temperature,
            exchange_potential,
        }
    }

    /// Inverse temperature.
    #[must_use]
    pub fn beta(&self) -> f64 {
        1.0 / self.temperature
    }
}

/// A Monte Carlo state: configuration plus conditions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IsingState {
    /// Current configuration.
    pub configuration: IsingConfiguration,
    /// Thermodynamic conditions of the chain.
    pub conditions: SemiGrandCanonicalConditions,
}

impl IsingState {
    /// Create a state.
    #[must_use]
    pub const fn new(
        configuration: IsingConfiguration,
        conditions: SemiGrandCanonicalConditions,
    ) -> Self {
        Self {
            configuration,
            conditions,
        }
    }
}

/// Formation-energy calculator for the square-lattice Ising model.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct IsingFormationEnergy {
    /// Coupling constant J.
    pub j: f64,
}

impl IsingFormationEnergy {
    /// Extensive formation energy `-J Σ_<ij> s_i s_j`.
    #[must_use]
    pub fn extensive_value(&self, config: &IsingConfiguration) -> f64 {
        // Each bond counted once via the right and down neighbors.
        let [rows, cols] = config.shape;
        let mut sum = 0i64;
        for row in 0..rows {
            for col in 0..cols {
                let s = i64::from(config.occ(config.site_index(row, col)));
                let right = i64::from(config.occ(config.site_index(row, (col + 1) % cols)));
                let down = i64::from(config.occ(config.site_index((row + 1) % rows, col)));
                sum += s * (right + down);
            }
        }
        -self.j * sum as f64
    }

    /// Intensive formation energy (per site).
    #[must_use]
    pub fn intensive_value(&self, config: &IsingConfiguration) -> f64 {
        self.extensive_value(config) / config.n_sites() as f64
    }

    /// Change in extensive formation energy for single-site occupation
    /// changes, each evaluated against the current configuration.
    #[must_use]
    pub fn occ_delta_extensive_value(
        &self,
        config: &IsingConfiguration,
        linear_site_index: &[usize],
        new_occ: &[i32],
    ) -> f64 {
        let mut delta = 0.0;
        for (&l, &new) in linear_site_index.iter().zip(new_occ) {
            let old = config.occ(l);
            delta += -self.j * f64::from((new - old) * config.neighbor_sum(l));
        }
        delta
    }
}

/// Parametric-composition calculator: `x = N₊ / N`.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct IsingParamComposition;

impl IsingParamComposition {
    /// Extensive composition `N·x` (the number of up spins).
    #[must_use]
    pub fn extensive_value(&self, config: &IsingConfiguration) -> Vec<f64> {
        let n_up = config.occupation().iter().filter(|&&s| s == 1).count();
        vec![n_up as f64]
    }

    /// Intensive composition `x`.
    #[must_use]
    pub fn intensive_value(&self, config: &IsingConfiguration) -> Vec<f64> {
        vec![self.extensive_value(config)[0] / config.n_sites() as f64]
    }

    /// Change in extensive composition for occupation changes.
    #[must_use]
    pub fn occ_delta_extensive_value(
        &self,
        config: &IsingConfiguration,
        linear_site_index: &[usize],
        new_occ: &[i32],
    ) -> Vec<f64> {
        let mut delta = 0.0;
        for (&l, &new) in linear_site_index.iter().zip(new_occ) {
            delta += f64::from(new - config.occ(l)) / 2.0;
        }
        vec![delta]
    }
}

/// Proposes and applies single-flip semi-grand canonical events.
#[derive(Debug, Default)]
pub struct IsingSemiGrandCanonicalEventGenerator {
    /// The most recently proposed event: one site, its flipped spin.
    pub linear_site_index: Vec<usize>,
    /// New occupation for each proposed site.
    pub new_occ: Vec<i32>,
}

impl IsingSemiGrandCanonicalEventGenerator {
    /// Create a generator.
    #[must_use]
    pub fn new() -> Self {
        Self {
            linear_site_index: vec![0],
            new_occ: vec![0],
        }
    }

    /// Propose a flip of one uniformly chosen site.
    pub fn propose(&mut self, state: &IsingState, rng: &mut dyn RandomEngine) {
        let l = rng.index(state.configuration.n_sites());
        self.linear_site_index[0] = l;
        self.new_occ[0] = -state.configuration.occ(l);
    }

    /// Apply the proposed event to the state.
    pub fn apply(&self, state: &mut IsingState) {
        for (&l, &new) in self.linear_site_index.iter().zip(&self.new_occ) {
            state.configuration.set_occ(l, new);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::rng::Lcg64;

    fn all_up_25x25() -> IsingState {
        IsingState::new(
            IsingConfiguration::new([25, 25], 1),
            SemiGrandCanonicalConditions::new(2000.0, vec![0.0]),
        )
    }

    #[test]
    fn configuration_counts_sites() {
        let state = all_up_25x25();
        assert_eq!(state.configuration.n_sites(), 625);
        assert_eq!(state.configuration.n_unitcells(), 625);
    }

    #[test]
    fn all_up_extensive_energy() {
        // 2 bonds per site, all aligned: E = -2 N J.
        let state = all_up_25x25();
        let f = IsingFormationEnergy { j: 0.1 };
        let expected = 625.0 * 2.0 * -0.1;
        assert!((f.extensive_value(&state.configuration) - expected).abs() < 1e-12);
        assert!((f.intensive_value(&state.configuration) - 2.0 * -0.1).abs() < 1e-12);
    }

    #[test]
    fn single_flip_energy_delta() {
        // Flipping one up spin among all-up costs 8 J.
        let state = all_up_25x25();
        let f = IsingFormationEnergy { j: 0.1 };
        let delta = f.occ_delta_extensive_value(&state.configuration, &[0], &[-1]);
        assert!((delta - 8.0 * 0.1).abs() < 1e-12);
        // A no-op "flip" costs nothing.
        let none = f.occ_delta_extensive_value(&state.configuration, &[0], &[1]);
        assert!(none.abs() < 1e-12);
    }

    #[test]
    fn energy_delta_matches_recompute() {
        let mut state = all_up_25x25();
        let f = IsingFormationEnergy { j: 0.1 };
        let mut rng = Lcg64::new(33);
        for _ in 0..200 {
            let l = rng.index(state.configuration.n_sites());
            let new = -state.configuration.occ(l);
            let before = f.extensive_value(&state.configuration);
            let delta = f.occ_delta_extensive_value(&state.configuration, &[l], &[new]);
            state.configuration.set_occ(l, new);
            let after = f.extensive_value(&state.configuration);
            assert!(
                (after - before - delta).abs() < 1e-9,
                "local delta must match global recompute"
            );
        }
    }

    #[test]
    fn composition_all_up_is_one() {
        let state = all_up_25x25();
        let x = IsingParamComposition;
        assert_eq!(x.extensive_value(&state.configuration), vec![625.0]);
        assert_eq!(x.intensive_value(&state.configuration), vec![1.0]);
    }

    #[test]
    fn composition_delta_for_flip() {
        let state = all_up_25x25();
        let x = IsingParamComposition;
        let delta = x.occ_delta_extensive_value(&state.configuration, &[0], &[-1]);
        assert_eq!(delta, vec![-1.0]);
    }

    #[test]
    fn neighbors_wrap_periodically() {
        let config = IsingConfiguration::new([3, 3], 1);
        let corner = config.site_index(0, 0);
        let nbrs = config.neighbors(corner);
        assert!(nbrs.contains(&config.site_index(1, 0)));
        assert!(nbrs.contains(&config.site_index(2, 0)));
        assert!(nbrs.contains(&config.site_index(0, 1)));
        assert!(nbrs.contains(&config.site_index(0, 2)));
    }

    #[test]
    fn proposed_flip_negates_current_spin() {
        let state = all_up_25x25();
        let mut generator = IsingSemiGrandCanonicalEventGenerator::new();
        let mut rng = Lcg64::new(4);
        for _ in 0..100 {
            generator.propose(&state, &mut rng);
            let l = generator.linear_site_index[0];
            assert!(l < 625);
            assert_eq!(generator.new_occ[0], -state.configuration.occ(l));
        }
    }

    #[test]
    fn apply_writes_proposed_flip() {
        let mut state = all_up_25x25();
        let mut generator = IsingSemiGrandCanonicalEventGenerator::new();
        let mut rng = Lcg64::new(4);
        generator.propose(&state, &mut rng);
        let l = generator.linear_site_index[0];
        generator.apply(&mut state);
        assert_eq!(state.configuration.occ(l), -1);
    }

    #[test]
    fn configuration_serde_round_trip() {
        let config = IsingConfiguration::new([2, 3], -1);
        let json = serde_json::to_string(&config).expect("serializes");
        let back: IsingConfiguration = serde_json::from_str(&json).expect("deserializes");
        assert_eq!(config, back);
    }
}
