// SPDX-License-Identifier: AGPL-3.0-only

//! Read-only index conversions between sites, asymmetric units, occupants,
//! and species.
//!
//! A configuration stores one occupant *index* per lattice site; which
//! species that index denotes depends on the site's asymmetric unit. This
//! table answers, in O(1):
//!
//! - site index → asymmetric unit index
//! - (asym, occupant index) → species index, and the inverse
//! - species index → number of atom components
//! - site index → sublattice + unit-cell coordinate (for trajectory
//!   tracking across periodic boundaries)
//!
//! Site ordering is sublattice-major: `l = b * n_cells + (i + j*na +
//! k*na*nb)` for unit cell (i, j, k) in an `na × nb × nc` supercell.

/// Immutable lookup shared by the occupant tracker and event generators.
#[derive(Clone, Debug)]
pub struct Conversions {
    /// Supercell dimensions in unit cells along each lattice vector.
    dims: [usize; 3],
    /// Asymmetric unit index for each sublattice.
    sublat_to_asym: Vec<usize>,
    /// Species index for each (asym, occupant index) pair.
    occ_to_species: Vec<Vec<usize>>,
    /// Occupant index for each (asym, species index) pair; `None` when the
    /// species is not allowed on that asymmetric unit.
    species_to_occ: Vec<Vec<Option<usize>>>,
    /// One name per species index.
    species_names: Vec<String>,
    /// Number of atom components per species index (1 for atomic species,
    /// more for molecules, 0 for vacancies).
    species_atom_count: Vec<usize>,
}

impl Conversions {
    /// Build the conversion tables.
    ///
    /// `sublat_to_asym[b]` gives the asymmetric unit of sublattice `b`;
    /// `allowed[asym]` lists, in occupant-index order, the species indices
    /// allowed on that asymmetric unit; `species_names[s]` and
    /// `species_atom_count[s]` describe species `s`.
    ///
    /// # Panics
    ///
    /// Panics if an `allowed` entry names a species index out of range.
    #[must_use]
    pub fn new(
        dims: [usize; 3],
        sublat_to_asym: Vec<usize>,
        allowed: Vec<Vec<usize>>,
        species_names: Vec<String>,
        species_atom_count: Vec<usize>,
    ) -> Self {
        let n_species = species_names.len();
        assert_eq!(
            species_atom_count.len(),
            n_species,
            "species_atom_count must have one entry per species"
        );
        let mut species_to_occ = vec![vec![None; n_species]; allowed.len()];
        for (asym, occ_list) in allowed.iter().enumerate() {
            for (occ, &s) in occ_list.iter().enumerate() {
                assert!(s < n_species, "species index {s} out of range");
                species_to_occ[asym][s] = Some(occ);
            }
        }
        Self {
            dims,
            sublat_to_asym,
            occ_to_species: allowed,
            species_to_occ,
            species_names,
            species_atom_count,
        }
    }

    /// Convenience: one sublattice, one asymmetric unit, atomic species
    /// `0..n_species` all allowed in occupant-index order.
    #[must_use]
    pub fn single_sublattice(dims: [usize; 3], species_names: Vec<String>) -> Self {
        let n = species_names.len();
        let atom_count = vec![1; n];
        Self::new(dims, vec![0], vec![(0..n).collect()], species_names, atom_count)
    }

    /// Number of unit cells in the supercell.
    #[must_use]
    pub const fn n_cells(&self) -> usize {
        self.dims[0] * self.dims[1] * self.dims[2]
    }

    /// Total number of sites.
    #[must_use]
    pub fn n_sites(&self) -> usize {
        self.sublat_to_asym.len() * self.n_cells()
    }

    /// Number of asymmetric units.
    #[must_use]
    pub fn asym_size(&self) -> usize {
        self.occ_to_species.len()
    }

    /// Number of species.
    #[must_use]
    pub fn species_size(&self) -> usize {
        self.species_names.len()
    }

    /// Asymmetric unit index of site `l`.
    #[must_use]
    pub fn l_to_asym(&self, l: usize) -> usize {
        self.sublat_to_asym[l / self.n_cells()]
    }

    /// Sublattice index and unit-cell coordinate of site `l`.
    #[must_use]
    pub fn l_to_bijk(&self, l: usize) -> (usize, [i64; 3]) {
        let n_cells = self.n_cells();
        let b = l / n_cells;
        let c = l % n_cells;
        let i = c % self.dims[0];
        let j = (c / self.dims[0]) % self.dims[1];
        let k = c / (self.dims[0] * self.dims[1]);
        (b, [i as i64, j as i64, k as i64])
    }

    /// Site index for sublattice `b` and (wrapped) unit-cell coordinate.
    #[must_use]
    pub fn bijk_to_l(&self, b: usize, ijk: [i64; 3]) -> usize {
        let wrap = |x: i64, n: usize| -> usize { (x.rem_euclid(n as i64)) as usize };
        let i = wrap(ijk[0], self.dims[0]);
        let j = wrap(ijk[1], self.dims[1]);
        let k = wrap(ijk[2], self.dims[2]);
        b * self.n_cells() + i + j * self.dims[0] + k * self.dims[0] * self.dims[1]
    }

    /// Number of allowed occupants on asymmetric unit `asym`.
    #[must_use]
    pub fn occ_size(&self, asym: usize) -> usize {
        self.occ_to_species[asym].len()
    }

    /// Species index of occupant `occ` on asymmetric unit `asym`.
    #[must_use]
    pub fn species_index(&self, asym: usize, occ: usize) -> usize {
        self.occ_to_species[asym][occ]
    }

    /// Occupant index of species `species` on asymmetric unit `asym`, if
    /// the species is allowed there.
    #[must_use]
    pub fn occ_index(&self, asym: usize, species: usize) -> Option<usize> {
        self.species_to_occ[asym][species]
    }

    /// Whether `species` is an allowed occupant of `asym`.
    #[must_use]
    pub fn species_allowed(&self, asym: usize, species: usize) -> bool {
        self.species_to_occ[asym][species].is_some()
    }

    /// Name of species `species`.
    #[must_use]
    pub fn species_name(&self, species: usize) -> &str {
        &self.species_names[species]
    }

    /// Number of atom components of species `species`.
    #[must_use]
    pub fn components_size(&self, species: usize) -> usize {
        self.species_atom_count[species]
    }
}
