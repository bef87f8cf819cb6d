// SPDX-License-Identifier: AGPL-3.0-only

//! Occupation events and occupant location tracking.
//!
//! [`OccLocation`] keeps a bidirectional index between lattice sites and
//! the occupants currently resident on them, bucketed by
//! (asymmetric unit, species) candidate class, so event proposal is an
//! O(1) random pick and event application is O(sites changed).

mod candidate;
mod occ_location;

pub use candidate::{OccCandidate, OccCandidateList};
pub use occ_location::{Atom, AtomLocation, AtomTraj, Mol, OccEvent, OccLocation, OccTransform};
