// SPDX-License-Identifier: AGPL-3.0-only

//! Kinetic Monte Carlo driver.
//!
//! Couples an event selector, the occupant location tracker, the
//! sampling fixtures, and the completion check into one reproducible
//! trajectory. Per event:
//!
//! 1. Read the total rate, select the next event and its time increment.
//! 2. Fire count-scheduled samples due at the current count.
//! 3. Fire time-scheduled samples due at or before the event time, each
//!    at its *scheduled* time (a sample the event would overshoot still
//!    sees the scheduled clock).
//! 4. Apply the event through the tracker, advance the clock and the
//!    step counters.
//!
//! Sampling functions read shared scratch ([`KmcData`]) that the
//! driver's pre-sample hook refreshes before every sample: the fixture
//! label, the total rate read before event selection, the sampling-time
//! clock, and current/previous atom positions.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::events::{OccEvent, OccLocation};
use crate::run::RunManager;

/// Opaque handle naming one event of the selector's catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EventId(pub usize);

/// Selects events with exponentially distributed time increments.
pub trait EventSelector {
    /// Total rate of all possible events in the current configuration.
    fn total_rate(&self) -> f64;

    /// Select the next event and the time increment until it occurs
    /// (`Δt > 0`).
    fn select_event(&mut self) -> (EventId, f64);

    /// The occupation event behind an id.
    fn event(&self, id: EventId) -> &OccEvent;
}

/// Shared scratch read by sampling functions, refreshed by the driver.
#[derive(Clone, Debug, Default)]
pub struct KmcData {
    /// Label of the fixture currently sampling.
    pub sampling_fixture_label: String,
    /// Total event rate, read before the current event was selected.
    pub total_rate: f64,
    /// Simulation time as seen by sampling functions: the scheduled
    /// sample time for time-scheduled samples, the current event time
    /// otherwise.
    pub time: f64,
    /// Time of the previous sample, by fixture label.
    pub prev_time: BTreeMap<String, f64>,
    /// Current unwrapped atom positions (lattice-vector coordinates).
    pub atom_positions: Vec<[f64; 3]>,
    /// Atom positions at the previous sample, by fixture label.
    pub prev_atom_positions: BTreeMap<String, Vec<[f64; 3]>>,
}

/// Run a kinetic Monte Carlo trajectory to completion.
///
/// `occupation` is the caller-owned configuration, shared with any
/// sampling functions that read it; `occ_location` must already be
/// initialized from it. `kmc_data` is the scratch the sampling functions
/// close over.
pub fn kinetic_monte_carlo(
    occupation: &Rc<RefCell<Vec<i32>>>,
    occ_location: &mut OccLocation,
    kmc_data: &Rc<RefCell<KmcData>>,
    event_selector: &mut dyn EventSelector,
    run_manager: &mut RunManager,
) {
    {
        let mut data = kmc_data.borrow_mut();
        data.time = 0.0;
        data.atom_positions = occ_location.atom_positions();
        data.prev_time.clear();
        data.prev_atom_positions.clear();
        let atom_positions = data.atom_positions.clone();
        for fixture in run_manager.fixtures() {
            data.prev_time.insert(fixture.label().to_string(), 0.0);
            data.prev_atom_positions
                .insert(fixture.label().to_string(), atom_positions.clone());
        }
    }

    run_manager.initialize(occ_location.mol_size() as u64);

    while !run_manager.is_complete() {
        run_manager.write_status_if_due();

        let total_rate = event_selector.total_rate();
        let (event_id, time_increment) = event_selector.select_event();
        let event_time = kmc_data.borrow().time + time_increment;

        {
            let occ = occupation.borrow();
            let mut pre = |fixture: &crate::run::SamplingFixture| {
                let mut data = kmc_data.borrow_mut();
                data.sampling_fixture_label = fixture.label().to_string();
                data.total_rate = total_rate;
                data.atom_positions = occ_location.atom_positions();
                if fixture.state_sampler().sample_mode == crate::sampling::SampleMode::ByTime {
                    data.time = fixture.state_sampler().time;
                }
            };
            let mut post = |fixture: &crate::run::SamplingFixture| {
                let mut data = kmc_data.borrow_mut();
                let time = data.time;
                let positions = data.atom_positions.clone();
                data.prev_time.insert(fixture.label().to_string(), time);
                data.prev_atom_positions
                    .insert(fixture.label().to_string(), positions);
            };

            run_manager.sample_data_by_count_if_due(Some(&occ), &mut pre, &mut post);
            run_manager.sample_data_by_time_if_due(event_time, Some(&occ), &mut pre, &mut post);
        }

        occ_location.apply(
            event_selector.event(event_id),
            &mut occupation.borrow_mut(),
        );
        kmc_data.borrow_mut().time = event_time;
        run_manager.set_time(event_time);
        run_manager.increment_n_accept();
        run_manager.increment_step();
    }
}
