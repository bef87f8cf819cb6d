// SPDX-License-Identifier: AGPL-3.0-only

//! Candidate classes of mutable occupants.
//!
//! An [`OccCandidate`] is one (asymmetric unit, species) pair; the
//! [`OccCandidateList`] is the ordered set of all such pairs in the
//! system. The position of a candidate in the list is its `cand_index`,
//! which names the corresponding bucket in the occupant tracker.

use serde::{Deserialize, Serialize};

use crate::conversions::Conversions;

/// One class of mutable occupant: a species on an asymmetric unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OccCandidate {
    /// Asymmetric unit index.
    pub asym: usize,
    /// Species type index.
    pub species_index: usize,
}

impl OccCandidate {
    /// Create a candidate from an asymmetric unit and species index.
    #[must_use]
    pub const fn new(asym: usize, species_index: usize) -> Self {
        Self {
            asym,
            species_index,
        }
    }
}

/// Ordered set of all candidate classes; order defines `cand_index`.
#[derive(Clone, Debug, Default)]
pub struct OccCandidateList {
    candidates: Vec<OccCandidate>,
}

impl OccCandidateList {
    /// Build from an explicit candidate ordering.
    #[must_use]
    pub const fn new(candidates: Vec<OccCandidate>) -> Self {
        Self { candidates }
    }

    /// Build from conversion tables: every allowed (asym, species) pair on
    /// asymmetric units with more than one allowed occupant, in
    /// (asym, occupant-index) order.
    #[must_use]
    pub fn from_conversions(convert: &Conversions) -> Self {
        let mut candidates = Vec::new();
        for asym in 0..convert.asym_size() {
            if convert.occ_size(asym) < 2 {
                continue;
            }
            for occ in 0..convert.occ_size(asym) {
                candidates.push(OccCandidate::new(asym, convert.species_index(asym, occ)));
            }
        }
        Self { candidates }
    }

    /// Number of candidate classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Candidate at `cand_index`.
    #[must_use]
    pub fn get(&self, cand_index: usize) -> &OccCandidate {
        &self.candidates[cand_index]
    }

    /// `cand_index` of an (asym, species) pair, if it is a candidate.
    #[must_use]
    pub fn index(&self, asym: usize, species_index: usize) -> Option<usize> {
        let cand = OccCandidate::new(asym, species_index);
        self.candidates.iter().position(|c| *c == cand)
    }

    /// Iterate candidates in `cand_index` order.
    pub fn iter(&self) -> impl Iterator<Item = &OccCandidate> {
        self.candidates.iter()
    }
}
