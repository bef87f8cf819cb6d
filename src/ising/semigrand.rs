// SPDX-License-Identifier: AGPL-3.0-only

//! Semi-grand canonical potential and Metropolis calculator.
//!
//! The potential is `Φ = E_f − N·(µ · x)`; events are accepted with
//! probability `min(1, exp(−β ΔΦ))`. The calculator drives a single
//! sampling fixture: samples fire on the fixture's schedule at the
//! current count (before the step that advances past it) and the
//! completion check is consulted once per event.

use std::cell::RefCell;
use std::rc::Rc;

use crate::checks::CompletionCheckParams;
use crate::error::QuenchError;
use crate::method_log::MethodLog;
use crate::results::{ResultsAnalysisFunction, RunData, RunResults};
use crate::rng::{Lcg64, RandomEngine};
use crate::run::{RunManager, SamplingFixture, SamplingFixtureParams};
use crate::sampling::{SamplingParams, StateSamplingFunction};

use super::model::{
    IsingFormationEnergy, IsingParamComposition, IsingSemiGrandCanonicalEventGenerator, IsingState,
};

/// Seed salt separating the sampler's stochastic-cadence stream from the
/// Metropolis stream.
const SAMPLER_SEED_SALT: u64 = 0x9e37_79b9_7f4a_7c15;

/// The model's property calculators.
#[derive(Clone, Copy, Debug)]
pub struct IsingSystem {
    /// Formation-energy calculator.
    pub formation_energy: IsingFormationEnergy,
    /// Parametric-composition calculator.
    pub param_composition: IsingParamComposition,
}

/// Semi-grand canonical Metropolis calculator over an Ising state.
pub struct SemiGrandCanonicalCalculator {
    system: IsingSystem,
    state: Rc<RefCell<IsingState>>,
}

impl SemiGrandCanonicalCalculator {
    /// Create a calculator owning the (shared) state.
    #[must_use]
    pub fn new(system: IsingSystem, initial_state: IsingState) -> Self {
        Self {
            system,
            state: Rc::new(RefCell::new(initial_state)),
        }
    }

    /// Shared handle to the live state (sampling functions hold clones).
    #[must_use]
    pub fn state(&self) -> Rc<RefCell<IsingState>> {
        Rc::clone(&self.state)
    }

    /// Extensive semi-grand canonical potential `E_f − N·(µ · x)`.
    #[must_use]
    pub fn potential_extensive(&self) -> f64 {
        let state = self.state.borrow();
        let e_f = self.system.formation_energy.extensive_value(&state.configuration);
        let n_x = self.system.param_composition.extensive_value(&state.configuration);
        e_f - dot(&state.conditions.exchange_potential, &n_x)
    }

    /// Intensive semi-grand canonical potential (per unit cell).
    #[must_use]
    pub fn potential_intensive(&self) -> f64 {
        let n = self.state.borrow().configuration.n_unitcells() as f64;
        self.potential_extensive() / n
    }

    /// Change in extensive potential for an occupation change.
    #[must_use]
    pub fn potential_occ_delta_extensive(
        &self,
        linear_site_index: &[usize],
        new_occ: &[i32],
    ) -> f64 {
        let state = self.state.borrow();
        let d_ef = self.system.formation_energy.occ_delta_extensive_value(
            &state.configuration,
            linear_site_index,
            new_occ,
        );
        let d_nx = self.system.param_composition.occ_delta_extensive_value(
            &state.configuration,
            linear_site_index,
            new_occ,
        );
        d_ef - dot(&state.conditions.exchange_potential, &d_nx)
    }

    /// The standard sampling functions: `param_composition`,
    /// `formation_energy`, and `potential_energy` (all intensive).
    #[must_use]
    pub fn default_sampling_functions(&self) -> Vec<StateSamplingFunction> {
        let n_components = self.state.borrow().conditions.exchange_potential.len();
        let system = self.system;

        let state = self.state();
        let composition_f = StateSamplingFunction::new(
            "param_composition",
            "parametric composition (up fraction)",
            vec![n_components],
            Box::new(move || {
                let state = state.borrow();
                system.param_composition.intensive_value(&state.configuration)
            }),
        );

        let state = self.state();
        let formation_f = StateSamplingFunction::new(
            "formation_energy",
            "formation energy per unit cell",
            vec![1],
            Box::new(move || {
                let state = state.borrow();
                vec![system.formation_energy.intensive_value(&state.configuration)]
            }),
        );

        let state = self.state();
        let potential_f = StateSamplingFunction::new(
            "potential_energy",
            "semi-grand canonical potential per unit cell",
            vec![1],
            Box::new(move || {
                let state = state.borrow();
                let n = state.configuration.n_unitcells() as f64;
                let e_f = system.formation_energy.extensive_value(&state.configuration);
                let n_x = system.param_composition.extensive_value(&state.configuration);
                vec![(e_f - dot(&state.conditions.exchange_potential, &n_x)) / n]
            }),
        );

        vec![composition_f, formation_f, potential_f]
    }

    /// Run the Metropolis chain to completion.
    ///
    /// # Errors
    ///
    /// Returns the collected validation errors of the sampling
    /// parameters.
    pub fn run(
        &mut self,
        sampling_params: &SamplingParams,
        completion_check_params: CompletionCheckParams,
        event_generator: &mut IsingSemiGrandCanonicalEventGenerator,
        analysis_functions: &[ResultsAnalysisFunction],
        seed: u64,
        method_log: Option<MethodLog>,
    ) -> Result<RunResults, Vec<QuenchError>> {
        let functions = self.default_sampling_functions();
        let requested: Vec<StateSamplingFunction> = functions
            .into_iter()
            .filter(|f| sampling_params.sampler_names.contains(&f.name))
            .collect();
        let fixture = SamplingFixture::new(
            SamplingFixtureParams {
                label: "thermo".to_string(),
                sampling_params: sampling_params.clone(),
                completion_check_params,
            },
            requested,
            Box::new(Lcg64::new(seed ^ SAMPLER_SEED_SALT)),
            false,
        )?;
        let mut manager = RunManager::new(vec![fixture], true, method_log);

        let initial_occupation = self.state.borrow().configuration.occupation().to_vec();
        let n_sites = self.state.borrow().configuration.n_sites();
        let beta = self.state.borrow().conditions.beta();
        manager.initialize(n_sites as u64);

        let mut rng = Lcg64::new(seed);
        while !manager.is_complete() {
            manager.write_status_if_due();

            {
                let state = self.state.borrow();
                manager.sample_data_by_count_if_due(
                    Some(state.configuration.occupation()),
                    &mut |_| {},
                    &mut |_| {},
                );
            }

            {
                let state = self.state.borrow();
                event_generator.propose(&state, &mut rng);
            }
            let d_potential = self.potential_occ_delta_extensive(
                &event_generator.linear_site_index,
                &event_generator.new_occ,
            );
            let accept = d_potential <= 0.0 || rng.uniform() < (-beta * d_potential).exp();
            if accept {
                event_generator.apply(&mut self.state.borrow_mut());
                manager.increment_n_accept();
            } else {
                manager.increment_n_reject();
            }
            manager.increment_step();
        }

        let run_data = RunData {
            initial_occupation,
            final_occupation: self.state.borrow().configuration.occupation().to_vec(),
        };
        let mut results = manager.finalize(&run_data, analysis_functions);
        let (_, results) = results.swap_remove(0);
        Ok(results)
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::ising::model::{IsingConfiguration, SemiGrandCanonicalConditions};

    fn calculator(temperature: f64, mu: f64) -> SemiGrandCanonicalCalculator {
        SemiGrandCanonicalCalculator::new(
            IsingSystem {
                formation_energy: IsingFormationEnergy { j: 0.1 },
                param_composition: IsingParamComposition,
            },
            IsingState::new(
                IsingConfiguration::new([25, 25], 1),
                SemiGrandCanonicalConditions::new(temperature, vec![mu]),
            ),
        )
    }

    #[test]
    fn potential_all_up_with_mu() {
        // Φ = N (−2J − µ·x) with x = 1 at all-up.
        let calc = calculator(2000.0, 2.0);
        let expected = 625.0 * (2.0 * -0.1 - 2.0);
        assert!((calc.potential_extensive() - expected).abs() < 1e-9);
        assert!((calc.potential_intensive() - (2.0 * -0.1 - 2.0)).abs() < 1e-12);
    }

    #[test]
    fn potential_delta_includes_exchange_term() {
        // Flip one up spin: ΔΦ = 8J − µ·(−1).
        let calc = calculator(2000.0, 2.0);
        let delta = calc.potential_occ_delta_extensive(&[0], &[-1]);
        assert!((delta - (8.0 * 0.1 + 2.0)).abs() < 1e-12);
        // No-op flip costs nothing.
        let none = calc.potential_occ_delta_extensive(&[0], &[1]);
        assert!(none.abs() < 1e-12);
    }

    #[test]
    fn sampling_functions_read_live_state() {
        let calc = calculator(2000.0, 0.0);
        let functions = calc.default_sampling_functions();
        let composition = functions.iter().find(|f| f.name == "param_composition").unwrap();
        assert_eq!(composition.eval(), vec![1.0]);

        // Mutate the shared state; the closure must see the change.
        calc.state().borrow_mut().configuration.set_occ(0, -1);
        let x = composition.eval()[0];
        assert!((x - 624.0 / 625.0).abs() < 1e-12);
    }

    #[test]
    fn default_functions_have_expected_names() {
        let calc = calculator(2000.0, 0.0);
        let names: Vec<String> = calc
            .default_sampling_functions()
            .iter()
            .map(|f| f.name.clone())
            .collect();
        assert_eq!(
            names,
            vec!["param_composition", "formation_energy", "potential_energy"]
        );
    }
}
