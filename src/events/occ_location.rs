// SPDX-License-Identifier: AGPL-3.0-only

//! Occupant ↔ site index with per-candidate buckets and O(k) event
//! application.
//!
//! The tables (invariants hold after every `apply`):
//!
//! - `mols[i].id == i` for every occupant record.
//! - `mols[i].loc == j` iff `loc[cand_index_of(mols[i])][j] == i`.
//! - `l_to_mol[l] == i` iff `mols[i].l == l`; non-mutating sites carry the
//!   sentinel `mols.len()`.
//! - `mols[i].species_index` agrees with `occupation[mols[i].l]` through
//!   the conversion tables.
//!
//! Bucket removal is swap-pop: the vacated slot is overwritten with the
//! bucket's last entry, whose back-reference is fixed in the same step, so
//! deletions touch exactly two records and never allocate.
//!
//! When atom tracking is enabled, each atom carries its initial unit-cell
//! coordinate (`bijk_begin`) plus accumulated lattice-vector drift
//! (`delta_ijk`), giving unwrapped positions across periodic boundaries.

use crate::conversions::Conversions;
use crate::error::QuenchError;
use crate::events::candidate::OccCandidateList;
use crate::rng::RandomEngine;

/// One atom component of a resident occupant, tracked across events.
#[derive(Clone, Debug)]
pub struct Atom {
    /// Species type index of the parent occupant.
    pub species_index: usize,
    /// Index of this atom within its species' component list.
    pub atom_index: usize,
    /// Position in the tracker's atom arena.
    pub id: usize,
    /// Initial (sublattice, unit-cell coordinate) position.
    pub bijk_begin: (usize, [i64; 3]),
    /// Accumulated lattice-vector displacement since initialization.
    pub delta_ijk: [i64; 3],
    /// Initial component slot within the parent occupant.
    pub mol_comp_begin: usize,
}

/// One currently-resident occupant on one mutating site.
#[derive(Clone, Debug, Default)]
pub struct Mol {
    /// Position in the tracker's mol array.
    pub id: usize,
    /// Linear site index currently occupied.
    pub l: usize,
    /// Asymmetric unit index (consistent with `l`).
    pub asym: usize,
    /// Species type index (consistent with `occupation[l]`).
    pub species_index: usize,
    /// Atom arena ids of this occupant's components (empty when atoms are
    /// not tracked or the species has no components).
    pub component: Vec<usize>,
    /// Position within the bucket for this occupant's candidate class.
    pub loc: usize,
}

/// One occupant transformation within an event.
#[derive(Clone, Copy, Debug)]
pub struct OccTransform {
    /// Site whose occupant is transformed.
    pub l: usize,
    /// Id of the occupant being transformed.
    pub mol_id: usize,
    /// Asymmetric unit of the site.
    pub asym: usize,
    /// Species index before the transformation.
    pub from_species: usize,
    /// Species index after the transformation.
    pub to_species: usize,
}

/// An atom slot: occupant id plus component position.
#[derive(Clone, Copy, Debug)]
pub struct AtomLocation {
    /// Site index of the slot.
    pub l: usize,
    /// Occupant id of the slot.
    pub mol_id: usize,
    /// Component position within the occupant.
    pub mol_comp: usize,
}

/// One atom hop within an event.
#[derive(Clone, Copy, Debug)]
pub struct AtomTraj {
    /// Slot the atom leaves.
    pub from: AtomLocation,
    /// Slot the atom arrives in.
    pub to: AtomLocation,
    /// Lattice-vector displacement of the hop.
    pub delta_ijk: [i64; 3],
}

/// A Monte Carlo event that modifies occupation.
///
/// `linear_site_index` / `new_occ` form the minimal event; the remaining
/// fields are the bookkeeping needed to keep the occupant and atom tables
/// consistent (and to record hops for transport analysis).
#[derive(Clone, Debug, Default)]
pub struct OccEvent {
    /// Sites whose occupation changes.
    pub linear_site_index: Vec<usize>,
    /// New occupant index on each changed site.
    pub new_occ: Vec<i32>,
    /// Occupant table updates derived from the occupation change.
    pub occ_transform: Vec<OccTransform>,
    /// Atom hops, when trajectories are tracked.
    pub atom_traj: Vec<AtomTraj>,
}

/// Occupant location tracker.
pub struct OccLocation {
    convert: Conversions,
    candidate_list: OccCandidateList,
    /// `loc[cand_index][i]` is a mol id; one bucket per candidate class.
    loc: Vec<Vec<usize>>,
    mols: Vec<Mol>,
    atoms: Vec<Atom>,
    /// `l_to_mol[l]` is a mol id, or `mols.len()` for non-mutating sites.
    l_to_mol: Vec<usize>,
    update_atoms: bool,
    /// Scratch for atom-hop source slots; reused across `apply` calls.
    traj_scratch: Vec<usize>,
}

impl OccLocation {
    /// Create an empty tracker. Call [`Self::initialize`] before use.
    #[must_use]
    pub fn new(convert: Conversions, candidate_list: OccCandidateList, update_atoms: bool) -> Self {
        let n_cand = candidate_list.len();
        Self {
            convert,
            candidate_list,
            loc: vec![Vec::new(); n_cand],
            mols: Vec::new(),
            atoms: Vec::new(),
            l_to_mol: Vec::new(),
            update_atoms,
            traj_scratch: Vec::new(),
        }
    }

    /// Rebuild all tables from an occupation vector.
    ///
    /// # Errors
    ///
    /// Returns [`QuenchError::InvalidOccupation`] if a mutating site's
    /// occupant index is out of range or its (asym, species) pair is not a
    /// candidate.
    pub fn initialize(&mut self, occupation: &[i32]) -> Result<(), QuenchError> {
        for bucket in &mut self.loc {
            bucket.clear();
        }
        self.mols.clear();
        self.atoms.clear();
        self.l_to_mol.clear();
        self.l_to_mol.resize(occupation.len(), usize::MAX);

        for (l, &occ) in occupation.iter().enumerate() {
            let asym = self.convert.l_to_asym(l);
            if self.convert.occ_size(asym) < 2 {
                continue;
            }
            let invalid = QuenchError::InvalidOccupation { site: l, occ };
            if occ < 0 || occ as usize >= self.convert.occ_size(asym) {
                return Err(invalid);
            }
            let species = self.convert.species_index(asym, occ as usize);
            let Some(cand_index) = self.candidate_list.index(asym, species) else {
                return Err(invalid);
            };

            let mol_id = self.mols.len();
            let mut mol = Mol {
                id: mol_id,
                l,
                asym,
                species_index: species,
                component: Vec::new(),
                loc: self.loc[cand_index].len(),
            };
            if self.update_atoms {
                for atom_index in 0..self.convert.components_size(species) {
                    let atom_id = self.atoms.len();
                    self.atoms.push(Atom {
                        species_index: species,
                        atom_index,
                        id: atom_id,
                        bijk_begin: self.convert.l_to_bijk(l),
                        delta_ijk: [0; 3],
                        mol_comp_begin: atom_index,
                    });
                    mol.component.push(atom_id);
                }
            }
            self.loc[cand_index].push(mol_id);
            self.l_to_mol[l] = mol_id;
            self.mols.push(mol);
        }

        // Non-mutating sites carry the sentinel |mols|.
        let sentinel = self.mols.len();
        for entry in &mut self.l_to_mol {
            if *entry == usize::MAX {
                *entry = sentinel;
            }
        }
        Ok(())
    }

    /// Uniformly pick an occupant of one candidate class.
    ///
    /// # Panics
    ///
    /// Panics if the bucket for `cand_index` is empty; selecting from an
    /// empty class is a programming error.
    pub fn choose_mol(&self, cand_index: usize, rng: &mut dyn RandomEngine) -> &Mol {
        let bucket = &self.loc[cand_index];
        assert!(
            !bucket.is_empty(),
            "choose_mol: bucket for candidate {cand_index} is empty"
        );
        &self.mols[bucket[rng.index(bucket.len())]]
    }

    /// Update occupation and all tables to reflect that `event` occurred.
    ///
    /// Infallible in steady state; inputs violating the table invariants
    /// (unknown candidate, species mismatch, empty source bucket) abort.
    pub fn apply(&mut self, event: &OccEvent, occupation: &mut [i32]) {
        // Snapshot atom ids at hop sources before transforms resize
        // component lists.
        if self.update_atoms {
            self.traj_scratch.clear();
            for traj in &event.atom_traj {
                self.traj_scratch
                    .push(self.mols[traj.from.mol_id].component[traj.from.mol_comp]);
            }
        }

        for t in &event.occ_transform {
            let (slot, l) = {
                let mol = &self.mols[t.mol_id];
                assert_eq!(
                    mol.species_index, t.from_species,
                    "apply: occupant {} is species {}, transform expects {}",
                    t.mol_id, mol.species_index, t.from_species
                );
                assert_eq!(
                    mol.asym, t.asym,
                    "apply: occupant {} asym mismatch",
                    t.mol_id
                );
                (mol.loc, mol.l)
            };

            // Swap-pop out of the source bucket.
            let from_cand = self
                .candidate_list
                .index(t.asym, t.from_species)
                .unwrap_or_else(|| {
                    panic!(
                        "apply: (asym {}, species {}) is not a candidate",
                        t.asym, t.from_species
                    )
                });
            let bucket = &mut self.loc[from_cand];
            let last = *bucket
                .last()
                .unwrap_or_else(|| panic!("apply: source bucket {from_cand} underflow"));
            bucket[slot] = last;
            bucket.pop();
            self.mols[last].loc = slot;

            // Transform species and occupation.
            let to_occ = self
                .convert
                .occ_index(t.asym, t.to_species)
                .unwrap_or_else(|| {
                    panic!(
                        "apply: species {} not allowed on asym {}",
                        t.to_species, t.asym
                    )
                });
            self.mols[t.mol_id].species_index = t.to_species;
            occupation[l] = to_occ as i32;

            // Append to the destination bucket.
            let to_cand = self
                .candidate_list
                .index(t.asym, t.to_species)
                .unwrap_or_else(|| {
                    panic!(
                        "apply: (asym {}, species {}) is not a candidate",
                        t.asym, t.to_species
                    )
                });
            let bucket = &mut self.loc[to_cand];
            bucket.push(t.mol_id);
            self.mols[t.mol_id].loc = bucket.len() - 1;

            if self.update_atoms {
                self.resize_components(t.mol_id, t.to_species);
            }
        }

        // Carry hopped atoms to their destination slots and accumulate
        // their lattice-vector drift.
        for (traj, &atom_id) in event.atom_traj.iter().zip(&self.traj_scratch) {
            self.mols[traj.to.mol_id].component[traj.to.mol_comp] = atom_id;
            let atom = &mut self.atoms[atom_id];
            atom.delta_ijk[0] += traj.delta_ijk[0];
            atom.delta_ijk[1] += traj.delta_ijk[1];
            atom.delta_ijk[2] += traj.delta_ijk[2];
        }
    }

    /// Grow or shrink a mol's component list to its new species' atom
    /// count, creating fresh atom records as needed.
    fn resize_components(&mut self, mol_id: usize, to_species: usize) {
        let n_new = self.convert.components_size(to_species);
        let l = self.mols[mol_id].l;
        let bijk = self.convert.l_to_bijk(l);
        let n_old = self.mols[mol_id].component.len();
        for atom_index in n_old..n_new {
            let atom_id = self.atoms.len();
            self.atoms.push(Atom {
                species_index: to_species,
                atom_index,
                id: atom_id,
                bijk_begin: bijk,
                delta_ijk: [0; 3],
                mol_comp_begin: atom_index,
            });
            self.mols[mol_id].component.push(atom_id);
        }
        self.mols[mol_id].component.truncate(n_new);
        for &atom_id in &self.mols[mol_id].component {
            self.atoms[atom_id].species_index = to_species;
        }
    }

    /// Total number of mutating sites.
    #[must_use]
    pub fn mol_size(&self) -> usize {
        self.mols.len()
    }

    /// Access an occupant by id.
    #[must_use]
    pub fn mol(&self, mol_id: usize) -> &Mol {
        &self.mols[mol_id]
    }

    /// Number of occupants of one candidate class.
    #[must_use]
    pub fn cand_size(&self, cand_index: usize) -> usize {
        self.loc[cand_index].len()
    }

    /// Mol id at position `loc` in the bucket for `cand_index`.
    #[must_use]
    pub fn mol_id(&self, cand_index: usize, loc: usize) -> usize {
        self.loc[cand_index][loc]
    }

    /// Mol id on site `l`, or [`Self::mol_size`] for non-mutating sites.
    #[must_use]
    pub fn l_to_mol_id(&self, l: usize) -> usize {
        self.l_to_mol[l]
    }

    /// Number of tracked atoms.
    #[must_use]
    pub fn atoms_size(&self) -> usize {
        self.atoms.len()
    }

    /// Access a tracked atom by id.
    #[must_use]
    pub fn atom(&self, atom_id: usize) -> &Atom {
        &self.atoms[atom_id]
    }

    /// Unwrapped atom positions in lattice-vector (unit-cell) coordinates:
    /// `bijk_begin + delta_ijk` per atom, in atom-id order.
    #[must_use]
    pub fn atom_positions(&self) -> Vec<[f64; 3]> {
        self.atoms
            .iter()
            .map(|a| {
                let (_, begin) = a.bijk_begin;
                [
                    (begin[0] + a.delta_ijk[0]) as f64,
                    (begin[1] + a.delta_ijk[1]) as f64,
                    (begin[2] + a.delta_ijk[2]) as f64,
                ]
            })
            .collect()
    }

    /// The conversion tables.
    #[must_use]
    pub const fn convert(&self) -> &Conversions {
        &self.convert
    }

    /// The candidate list.
    #[must_use]
    pub const fn candidate_list(&self) -> &OccCandidateList {
        &self.candidate_list
    }
}
