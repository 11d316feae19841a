use super::boundary::Boundary;
use super::element::{ElementIndex, ElementTable};
use crate::core::histogram::kernel::PairSource;
use itertools::Itertools;
use nalgebra::Point3;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("Length mismatch: {what} has {found} entries, expected {expected}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("Atom {atom} references element index {element}, but only {num_elements} elements are defined")]
    ElementOutOfRange {
        atom: usize,
        element: usize,
        num_elements: usize,
    },
    #[error("Non-finite coordinate for atom {0}")]
    NonFiniteCoordinate(usize),
    #[error("Atom index {index} is out of range for a configuration of {len} atoms")]
    AtomOutOfRange { index: usize, len: usize },
    #[error("Atom index {0} appears more than once in the moved subset")]
    DuplicateAtom(usize),
    #[error("Moved subset is empty")]
    EmptySubset,
    #[error("Duplicate element name '{0}'")]
    DuplicateElement(String),
    #[error("Element names must not be blank")]
    EmptyElementName,
    #[error("Invalid boundary: {0}")]
    InvalidBoundary(String),
}

/// Move and acceptance counters maintained by the outer Monte Carlo loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepCounters {
    /// Number of moves generated so far; drives scale-factor refits.
    pub generated: u64,
    /// Number of moves accepted so far; drives shape-function refreshes.
    pub accepted: u64,
}

/// The engine-owned atomic state every constraint reads.
///
/// Coordinates are Cartesian. Element and molecule indices are per atom; the
/// per-element populations are cached so that density normalisation stays
/// independent of the number of atoms.
#[derive(Debug, Clone)]
pub struct Configuration {
    coordinates: Vec<Point3<f64>>,
    element_index: Vec<ElementIndex>,
    molecule_index: Vec<usize>,
    elements: ElementTable,
    populations: Vec<usize>,
    boundary: Boundary,
    workers: usize,
    pub counters: StepCounters,
}

impl Configuration {
    pub fn new(
        elements: ElementTable,
        boundary: Boundary,
        coordinates: Vec<Point3<f64>>,
        element_index: Vec<ElementIndex>,
        molecule_index: Vec<usize>,
    ) -> Result<Self, ModelError> {
        let n = coordinates.len();
        if element_index.len() != n {
            return Err(ModelError::LengthMismatch {
                what: "element index",
                expected: n,
                found: element_index.len(),
            });
        }
        if molecule_index.len() != n {
            return Err(ModelError::LengthMismatch {
                what: "molecule index",
                expected: n,
                found: molecule_index.len(),
            });
        }
        if let Some(atom) = coordinates.iter().position(|p| !is_finite_point(p)) {
            return Err(ModelError::NonFiniteCoordinate(atom));
        }

        let mut populations = vec![0; elements.len()];
        for (atom, element) in element_index.iter().enumerate() {
            let slot = populations.get_mut(element.index()).ok_or(
                ModelError::ElementOutOfRange {
                    atom,
                    element: element.index(),
                    num_elements: elements.len(),
                },
            )?;
            *slot += 1;
        }

        Ok(Self {
            coordinates,
            element_index,
            molecule_index,
            elements,
            populations,
            boundary,
            workers: 1,
            counters: StepCounters::default(),
        })
    }

    /// Sets the worker-count hint handed to the histogram kernel.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn len(&self) -> usize {
        self.coordinates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }

    pub fn coordinates(&self) -> &[Point3<f64>] {
        &self.coordinates
    }

    pub(crate) fn coordinates_mut(&mut self) -> &mut [Point3<f64>] {
        &mut self.coordinates
    }

    pub fn element_index(&self) -> &[ElementIndex] {
        &self.element_index
    }

    pub fn molecule_index(&self) -> &[usize] {
        &self.molecule_index
    }

    pub fn elements(&self) -> &ElementTable {
        &self.elements
    }

    pub fn num_elements(&self) -> usize {
        self.elements.len()
    }

    pub fn populations(&self) -> &[usize] {
        &self.populations
    }

    pub fn boundary(&self) -> &Boundary {
        &self.boundary
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn volume(&self) -> f64 {
        self.boundary.volume()
    }

    pub fn number_density(&self) -> f64 {
        self.len() as f64 / self.volume()
    }

    pub fn source(&self) -> PairSource<'_> {
        PairSource {
            coordinates: &self.coordinates,
            molecule_index: &self.molecule_index,
            element_index: &self.element_index,
            num_elements: self.elements.len(),
        }
    }

    /// Copies the listed atoms into a standalone set, preserving subset order.
    pub fn gather(&self, subset: &[usize]) -> Result<GatheredAtoms, ModelError> {
        self.validate_subset(subset)?;
        Ok(GatheredAtoms {
            coordinates: subset.iter().map(|&i| self.coordinates[i]).collect(),
            molecule_index: subset.iter().map(|&i| self.molecule_index[i]).collect(),
            element_index: subset.iter().map(|&i| self.element_index[i]).collect(),
            num_elements: self.elements.len(),
        })
    }

    pub fn validate_subset(&self, subset: &[usize]) -> Result<(), ModelError> {
        if subset.is_empty() {
            return Err(ModelError::EmptySubset);
        }
        if let Some(&index) = subset.iter().find(|&&i| i >= self.len()) {
            return Err(ModelError::AtomOutOfRange {
                index,
                len: self.len(),
            });
        }
        if let Some(index) = subset.iter().duplicates().next() {
            return Err(ModelError::DuplicateAtom(*index));
        }
        Ok(())
    }

    /// Writes accepted coordinates for a subset of atoms.
    pub fn move_atoms(
        &mut self,
        subset: &[usize],
        coordinates: &[Point3<f64>],
    ) -> Result<(), ModelError> {
        self.validate_subset(subset)?;
        if coordinates.len() != subset.len() {
            return Err(ModelError::LengthMismatch {
                what: "moved coordinates",
                expected: subset.len(),
                found: coordinates.len(),
            });
        }
        if let Some(k) = coordinates.iter().position(|p| !is_finite_point(p)) {
            return Err(ModelError::NonFiniteCoordinate(subset[k]));
        }
        for (&i, p) in subset.iter().zip(coordinates) {
            self.coordinates[i] = *p;
        }
        Ok(())
    }

    /// Removes one atom for good; later atoms shift down by one index.
    pub fn remove_atom(&mut self, index: usize) -> Result<(), ModelError> {
        if index >= self.len() {
            return Err(ModelError::AtomOutOfRange {
                index,
                len: self.len(),
            });
        }
        self.coordinates.remove(index);
        self.molecule_index.remove(index);
        let element = self.element_index.remove(index);
        self.populations[element.index()] -= 1;
        Ok(())
    }

    pub fn set_boundary(&mut self, boundary: Boundary) {
        self.boundary = boundary;
    }

    pub fn set_molecule_index(&mut self, molecule_index: Vec<usize>) -> Result<(), ModelError> {
        if molecule_index.len() != self.len() {
            return Err(ModelError::LengthMismatch {
                what: "molecule index",
                expected: self.len(),
                found: molecule_index.len(),
            });
        }
        self.molecule_index = molecule_index;
        Ok(())
    }
}

/// Owned copy of a subset of atoms, used to histogram the subset on its own.
#[derive(Debug, Clone)]
pub struct GatheredAtoms {
    coordinates: Vec<Point3<f64>>,
    molecule_index: Vec<usize>,
    element_index: Vec<ElementIndex>,
    num_elements: usize,
}

impl GatheredAtoms {
    pub fn source(&self) -> PairSource<'_> {
        PairSource {
            coordinates: &self.coordinates,
            molecule_index: &self.molecule_index,
            element_index: &self.element_index,
            num_elements: self.num_elements,
        }
    }
}

#[inline]
fn is_finite_point(p: &Point3<f64>) -> bool {
    p.iter().all(|v| v.is_finite())
}
