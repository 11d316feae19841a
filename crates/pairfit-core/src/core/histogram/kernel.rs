use super::bins::BinSpec;
use super::table::PairHistogram;
use crate::core::models::boundary::Boundary;
use crate::core::models::configuration::ModelError;
use crate::core::models::element::ElementIndex;
use nalgebra::Point3;
use thiserror::Error;
use tracing::trace;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum HistogramError {
    #[error("Invalid bin specification: {0}")]
    InvalidBins(String),
    #[error("Invalid pair source: {0}")]
    Model(#[from] ModelError),
    #[error("Degenerate distance {distance} between atoms {first} and {second}")]
    InvalidDistance {
        first: usize,
        second: usize,
        distance: f64,
    },
}

/// Borrowed atom arrays the kernel bins distances over.
#[derive(Debug, Clone, Copy)]
pub struct PairSource<'a> {
    pub(crate) coordinates: &'a [Point3<f64>],
    pub(crate) molecule_index: &'a [usize],
    pub(crate) element_index: &'a [ElementIndex],
    pub(crate) num_elements: usize,
}

impl<'a> PairSource<'a> {
    pub fn new(
        coordinates: &'a [Point3<f64>],
        molecule_index: &'a [usize],
        element_index: &'a [ElementIndex],
        num_elements: usize,
    ) -> Result<Self, ModelError> {
        let n = coordinates.len();
        if molecule_index.len() != n {
            return Err(ModelError::LengthMismatch {
                what: "molecule index",
                expected: n,
                found: molecule_index.len(),
            });
        }
        if element_index.len() != n {
            return Err(ModelError::LengthMismatch {
                what: "element index",
                expected: n,
                found: element_index.len(),
            });
        }
        if let Some((atom, element)) = element_index
            .iter()
            .enumerate()
            .find(|(_, e)| e.index() >= num_elements)
        {
            return Err(ModelError::ElementOutOfRange {
                atom,
                element: element.index(),
                num_elements,
            });
        }
        Ok(Self {
            coordinates,
            molecule_index,
            element_index,
            num_elements,
        })
    }

    pub fn len(&self) -> usize {
        self.coordinates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }

    pub fn num_elements(&self) -> usize {
        self.num_elements
    }
}

/// Which partners a subset atom is paired with in [`HistogramKernel::partial`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartialScope {
    /// Every other atom of the source; pairs inside the subset are seen from both ends.
    AllAtoms,
    /// Only the other subset atoms, again seen from both ends.
    SubsetOnly,
}

/// Bins interatomic distances into per-element-pair intra/inter histograms.
#[derive(Debug, Clone)]
pub struct HistogramKernel<'b> {
    boundary: &'b Boundary,
    bins: BinSpec,
    workers: usize,
}

impl<'b> HistogramKernel<'b> {
    pub fn new(boundary: &'b Boundary, bins: BinSpec, workers: usize) -> Self {
        Self {
            boundary,
            bins,
            workers: workers.max(1),
        }
    }

    /// Histogram of every pair `i < j` of the source.
    pub fn full(&self, source: &PairSource<'_>) -> Result<PairHistogram, HistogramError> {
        let n = source.len();
        let rows: Vec<usize> = (0..n).collect();
        let hist = self.fan_out(source, &rows, |row, hist| {
            self.bin_row(source, row, (row + 1)..n, hist)
        })?;
        trace!(atoms = n, counts = hist.total(), "Full pair histogram computed");
        Ok(hist)
    }

    /// Histogram of the pairs anchored on the atoms of `subset`.
    pub fn partial(
        &self,
        source: &PairSource<'_>,
        subset: &[usize],
        scope: PartialScope,
    ) -> Result<PairHistogram, HistogramError> {
        let n = source.len();
        if let Some(&index) = subset.iter().find(|&&i| i >= n) {
            return Err(ModelError::AtomOutOfRange { index, len: n }.into());
        }
        let mut seen = vec![false; n];
        for &i in subset {
            if std::mem::replace(&mut seen[i], true) {
                return Err(ModelError::DuplicateAtom(i).into());
            }
        }

        let hist = match scope {
            PartialScope::AllAtoms => self.fan_out(source, subset, |row, hist| {
                self.bin_row(source, row, (0..n).filter(|&j| j != row), hist)
            })?,
            PartialScope::SubsetOnly => self.fan_out(source, subset, |row, hist| {
                self.bin_row(
                    source,
                    row,
                    subset.iter().copied().filter(|&j| j != row),
                    hist,
                )
            })?,
        };
        trace!(
            subset = subset.len(),
            counts = hist.total(),
            "Partial pair histogram computed"
        );
        Ok(hist)
    }

    fn bin_row(
        &self,
        source: &PairSource<'_>,
        row: usize,
        partners: impl Iterator<Item = usize>,
        hist: &mut PairHistogram,
    ) -> Result<(), HistogramError> {
        let origin = &source.coordinates[row];
        let element = source.element_index[row];
        let molecule = source.molecule_index[row];
        for j in partners {
            let distance = self.boundary.distance(origin, &source.coordinates[j]);
            if !distance.is_finite() {
                return Err(HistogramError::InvalidDistance {
                    first: row,
                    second: j,
                    distance,
                });
            }
            if let Some(bin) = self.bins.locate(distance) {
                hist.record(
                    element,
                    source.element_index[j],
                    molecule == source.molecule_index[j],
                    bin,
                );
            }
        }
        Ok(())
    }

    /// Splits `rows` into `workers` contiguous chunks, bins each into its own
    /// histogram and sums the results.
    fn fan_out<F>(
        &self,
        source: &PairSource<'_>,
        rows: &[usize],
        bin_one: F,
    ) -> Result<PairHistogram, HistogramError>
    where
        F: Fn(usize, &mut PairHistogram) -> Result<(), HistogramError> + Sync,
    {
        let empty = || PairHistogram::new(source.num_elements, self.bins.size());
        if rows.is_empty() {
            return Ok(empty());
        }
        let chunk_len = rows.len().div_ceil(self.workers);
        let chunks: Vec<&[usize]> = rows.chunks(chunk_len).collect();

        #[cfg(not(feature = "parallel"))]
        let iterator = chunks.iter();

        #[cfg(feature = "parallel")]
        let iterator = chunks.par_iter();

        let partials: Vec<PairHistogram> = iterator
            .map(|chunk| -> Result<PairHistogram, HistogramError> {
                let mut local = empty();
                for &row in chunk.iter() {
                    bin_one(row, &mut local)?;
                }
                Ok(local)
            })
            .collect::<Result<_, HistogramError>>()?;

        let mut total = empty();
        for partial in &partials {
            total += partial;
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::histogram::table::PairComponent;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    struct Atoms {
        coordinates: Vec<Point3<f64>>,
        molecules: Vec<usize>,
        elements: Vec<ElementIndex>,
        num_elements: usize,
    }

    impl Atoms {
        fn source(&self) -> PairSource<'_> {
            PairSource::new(
                &self.coordinates,
                &self.molecules,
                &self.elements,
                self.num_elements,
            )
            .unwrap()
        }
    }

    fn random_atoms(n: usize, length: f64, seed: u64) -> Atoms {
        let mut rng = StdRng::seed_from_u64(seed);
        Atoms {
            coordinates: (0..n)
                .map(|_| {
                    Point3::new(
                        rng.gen_range(0.0..length),
                        rng.gen_range(0.0..length),
                        rng.gen_range(0.0..length),
                    )
                })
                .collect(),
            molecules: (0..n).map(|i| i / 3).collect(),
            elements: (0..n).map(|i| ElementIndex::new(i % 2)).collect(),
            num_elements: 2,
        }
    }

    #[test]
    fn two_atoms_in_periodic_box_fill_a_single_inter_bin() {
        let boundary = Boundary::cubic(10.0).unwrap();
        let atoms = Atoms {
            coordinates: vec![Point3::new(1.0, 1.0, 1.0), Point3::new(1.35, 1.0, 1.0)],
            molecules: vec![0, 1],
            elements: vec![ElementIndex::new(0); 2],
            num_elements: 1,
        };
        let kernel = HistogramKernel::new(&boundary, BinSpec::new(0.0, 1.0, 0.1).unwrap(), 1);
        let hist = kernel.full(&atoms.source()).unwrap();

        let e0 = ElementIndex::new(0);
        for bin in 0..10 {
            let expected = if bin == 3 { 1.0 } else { 0.0 };
            assert_eq!(hist.get(PairComponent::Inter, e0, e0, bin), expected);
            assert_eq!(hist.get(PairComponent::Intra, e0, e0, bin), 0.0);
        }
    }

    #[test]
    fn pairs_across_the_periodic_face_use_the_nearest_image() {
        let boundary = Boundary::cubic(10.0).unwrap();
        let atoms = Atoms {
            coordinates: vec![Point3::new(0.1, 5.0, 5.0), Point3::new(9.85, 5.0, 5.0)],
            molecules: vec![0, 0],
            elements: vec![ElementIndex::new(0); 2],
            num_elements: 1,
        };
        let kernel = HistogramKernel::new(&boundary, BinSpec::new(0.0, 1.0, 0.1).unwrap(), 1);
        let hist = kernel.full(&atoms.source()).unwrap();
        let e0 = ElementIndex::new(0);
        assert_eq!(hist.get(PairComponent::Intra, e0, e0, 2), 1.0);
        assert_eq!(hist.total(), 1.0);
    }

    #[test]
    fn worker_count_does_not_change_counts() {
        let boundary = Boundary::cubic(8.0).unwrap();
        let atoms = random_atoms(60, 8.0, 7);
        let bins = BinSpec::new(0.0, 4.0, 0.1).unwrap();
        let reference = HistogramKernel::new(&boundary, bins, 1)
            .full(&atoms.source())
            .unwrap();
        for workers in [2, 3, 7, 64, 200] {
            let hist = HistogramKernel::new(&boundary, bins, workers)
                .full(&atoms.source())
                .unwrap();
            assert_eq!(hist, reference, "workers = {workers}");
        }
    }

    #[test]
    fn partial_all_atoms_minus_subset_equals_pairs_touching_subset() {
        let boundary = Boundary::cubic(6.0).unwrap();
        let atoms = random_atoms(30, 6.0, 11);
        let bins = BinSpec::new(0.0, 3.0, 0.25).unwrap();
        let kernel = HistogramKernel::new(&boundary, bins, 4);
        let subset = [3, 17, 4];

        let anchored = kernel
            .partial(&atoms.source(), &subset, PartialScope::AllAtoms)
            .unwrap();
        let inside = kernel
            .partial(&atoms.source(), &subset, PartialScope::SubsetOnly)
            .unwrap();

        // Pairs touching the subset, counted directly.
        let source = atoms.source();
        let mut expected = PairHistogram::new(2, bins.size());
        for i in 0..source.len() {
            for j in (i + 1)..source.len() {
                if !(subset.contains(&i) || subset.contains(&j)) {
                    continue;
                }
                let d = boundary.distance(&source.coordinates[i], &source.coordinates[j]);
                if let Some(bin) = bins.locate(d) {
                    expected.record(
                        source.element_index[i],
                        source.element_index[j],
                        source.molecule_index[i] == source.molecule_index[j],
                        bin,
                    );
                }
            }
        }

        // SubsetOnly sees each internal pair twice; removing it once leaves one copy.
        let mut half_inside = inside.clone();
        let mut single = PairHistogram::new(2, bins.size());
        for (k, &i) in subset.iter().enumerate() {
            for &j in &subset[k + 1..] {
                let d = boundary.distance(&source.coordinates[i], &source.coordinates[j]);
                if let Some(bin) = bins.locate(d) {
                    single.record(
                        source.element_index[i],
                        source.element_index[j],
                        source.molecule_index[i] == source.molecule_index[j],
                        bin,
                    );
                }
            }
        }
        half_inside -= &single;
        assert_eq!(half_inside, single);
        assert_eq!(&anchored - &single, expected);
    }

    #[test]
    fn partial_rejects_bad_subsets() {
        let boundary = Boundary::cubic(6.0).unwrap();
        let atoms = random_atoms(5, 6.0, 1);
        let kernel = HistogramKernel::new(&boundary, BinSpec::new(0.0, 3.0, 0.5).unwrap(), 1);
        assert_eq!(
            kernel.partial(&atoms.source(), &[9], PartialScope::AllAtoms),
            Err(HistogramError::Model(ModelError::AtomOutOfRange { index: 9, len: 5 }))
        );
        assert_eq!(
            kernel.partial(&atoms.source(), &[1, 1], PartialScope::AllAtoms),
            Err(HistogramError::Model(ModelError::DuplicateAtom(1)))
        );
    }

    #[test]
    fn source_rejects_mismatched_arrays() {
        let coords = vec![Point3::origin(); 3];
        let molecules = vec![0; 2];
        let elements = vec![ElementIndex::new(0); 3];
        assert!(matches!(
            PairSource::new(&coords, &molecules, &elements, 1),
            Err(ModelError::LengthMismatch { .. })
        ));
        let molecules = vec![0; 3];
        assert!(matches!(
            PairSource::new(&coords, &molecules, &elements, 0),
            Err(ModelError::ElementOutOfRange { .. })
        ));
    }

    #[test]
    fn nan_coordinates_are_reported_as_degenerate_distances() {
        let boundary = Boundary::open(100.0).unwrap();
        let atoms = Atoms {
            coordinates: vec![Point3::origin(), Point3::new(f64::NAN, 0.0, 0.0)],
            molecules: vec![0, 1],
            elements: vec![ElementIndex::new(0); 2],
            num_elements: 1,
        };
        let kernel = HistogramKernel::new(&boundary, BinSpec::new(0.0, 1.0, 0.1).unwrap(), 1);
        assert!(matches!(
            kernel.full(&atoms.source()),
            Err(HistogramError::InvalidDistance { first: 0, second: 1, .. })
        ));
    }
}
