use crate::core::models::element::{ElementIndex, ElementPair};
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// Which part of a pair correlation a value refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PairComponent {
    /// Pairs of atoms that belong to the same molecule.
    Intra,
    /// Pairs of atoms from different molecules.
    Inter,
    Total,
}

/// Per-(element, element, bin) pair counts split into intra- and intermolecular tallies.
///
/// Counts are stored per ordered element pair. The kernel always records a hetero pair
/// in the `[min][max]` slot, but arithmetic on histograms never assumes that, so the
/// physical count of an unordered pair is always `[i][j] + [j][i]` for `i != j` and
/// `[i][i]` for self pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct PairHistogram {
    num_elements: usize,
    bins: usize,
    intra: Vec<f64>,
    inter: Vec<f64>,
}

impl PairHistogram {
    pub fn new(num_elements: usize, bins: usize) -> Self {
        let len = num_elements * num_elements * bins;
        Self {
            num_elements,
            bins,
            intra: vec![0.0; len],
            inter: vec![0.0; len],
        }
    }

    pub fn num_elements(&self) -> usize {
        self.num_elements
    }

    pub fn bins(&self) -> usize {
        self.bins
    }

    #[inline]
    fn offset(&self, a: ElementIndex, b: ElementIndex) -> usize {
        (a.index() * self.num_elements + b.index()) * self.bins
    }

    /// Adds one pair count in the canonical slot of its element pair.
    #[inline]
    pub fn record(&mut self, a: ElementIndex, b: ElementIndex, same_molecule: bool, bin: usize) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let idx = self.offset(lo, hi) + bin;
        if same_molecule {
            self.intra[idx] += 1.0;
        } else {
            self.inter[idx] += 1.0;
        }
    }

    /// Stored value for the ordered slot `[a][b][bin]`.
    pub fn get(&self, component: PairComponent, a: ElementIndex, b: ElementIndex, bin: usize) -> f64 {
        let idx = self.offset(a, b) + bin;
        match component {
            PairComponent::Intra => self.intra[idx],
            PairComponent::Inter => self.inter[idx],
            PairComponent::Total => self.intra[idx] + self.inter[idx],
        }
    }

    /// Physical counts of an unordered element pair, both orientations combined.
    pub fn pair_counts(&self, component: PairComponent, pair: ElementPair) -> Vec<f64> {
        let forward = self.offset(pair.first(), pair.second());
        let backward = self.offset(pair.second(), pair.first());
        let read = |buffer: &[f64], bin: usize| {
            if pair.is_self_pair() {
                buffer[forward + bin]
            } else {
                buffer[forward + bin] + buffer[backward + bin]
            }
        };
        (0..self.bins)
            .map(|bin| match component {
                PairComponent::Intra => read(&self.intra, bin),
                PairComponent::Inter => read(&self.inter, bin),
                PairComponent::Total => read(&self.intra, bin) + read(&self.inter, bin),
            })
            .collect()
    }

    pub fn intra(&self) -> &[f64] {
        &self.intra
    }

    pub fn inter(&self) -> &[f64] {
        &self.inter
    }

    /// Sum of every stored count.
    pub fn total(&self) -> f64 {
        self.intra.iter().chain(&self.inter).sum()
    }

    pub fn same_shape(&self, other: &Self) -> bool {
        self.num_elements == other.num_elements && self.bins == other.bins
    }

}

impl AddAssign<&PairHistogram> for PairHistogram {
    fn add_assign(&mut self, rhs: &PairHistogram) {
        assert!(self.same_shape(rhs), "histogram shapes differ");
        self.intra.iter_mut().zip(&rhs.intra).for_each(|(a, b)| *a += b);
        self.inter.iter_mut().zip(&rhs.inter).for_each(|(a, b)| *a += b);
    }
}

impl SubAssign<&PairHistogram> for PairHistogram {
    fn sub_assign(&mut self, rhs: &PairHistogram) {
        assert!(self.same_shape(rhs), "histogram shapes differ");
        self.intra.iter_mut().zip(&rhs.intra).for_each(|(a, b)| *a -= b);
        self.inter.iter_mut().zip(&rhs.inter).for_each(|(a, b)| *a -= b);
    }
}

impl Add<&PairHistogram> for &PairHistogram {
    type Output = PairHistogram;
    fn add(self, rhs: &PairHistogram) -> Self::Output {
        let mut out = self.clone();
        out += rhs;
        out
    }
}

impl Sub<&PairHistogram> for &PairHistogram {
    type Output = PairHistogram;
    fn sub(self, rhs: &PairHistogram) -> Self::Output {
        let mut out = self.clone();
        out -= rhs;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn e(i: usize) -> ElementIndex {
        ElementIndex::new(i)
    }

    #[test]
    fn record_stores_hetero_pairs_in_canonical_slot() {
        let mut hist = PairHistogram::new(2, 4);
        hist.record(e(1), e(0), false, 2);
        assert_eq!(hist.get(PairComponent::Inter, e(0), e(1), 2), 1.0);
        assert_eq!(hist.get(PairComponent::Inter, e(1), e(0), 2), 0.0);
        assert_eq!(hist.get(PairComponent::Intra, e(0), e(1), 2), 0.0);
    }

    #[test]
    fn pair_counts_combine_both_orientations() {
        let mut hist = PairHistogram::new(2, 3);
        hist.record(e(0), e(1), true, 0);
        let mut flipped = PairHistogram::new(2, 3);
        flipped.record(e(0), e(1), true, 0);
        // Flip by hand: subtract the canonical entry and add the reverse one.
        flipped.intra[hist.offset(e(0), e(1))] = 0.0;
        flipped.intra[hist.offset(e(1), e(0))] = 1.0;
        let pair = ElementPair::new(e(0), e(1));
        assert_eq!(hist.pair_counts(PairComponent::Intra, pair), vec![1.0, 0.0, 0.0]);
        assert_eq!(flipped.pair_counts(PairComponent::Intra, pair), vec![1.0, 0.0, 0.0]);
        assert_eq!(flipped.pair_counts(PairComponent::Total, pair), vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn self_pairs_are_not_doubled() {
        let mut hist = PairHistogram::new(1, 2);
        hist.record(e(0), e(0), false, 1);
        let pair = ElementPair::new(e(0), e(0));
        assert_eq!(hist.pair_counts(PairComponent::Inter, pair), vec![0.0, 1.0]);
    }

    #[test]
    fn arithmetic_is_entry_wise() {
        let mut a = PairHistogram::new(2, 2);
        a.record(e(0), e(0), false, 0);
        a.record(e(0), e(1), true, 1);
        let mut b = PairHistogram::new(2, 2);
        b.record(e(0), e(1), true, 1);

        let diff = &a - &b;
        assert_eq!(diff.total(), 1.0);
        assert_eq!(diff.get(PairComponent::Inter, e(0), e(0), 0), 1.0);

        let sum = &diff + &b;
        assert_eq!(sum, a);
    }

    #[test]
    #[should_panic(expected = "histogram shapes differ")]
    fn arithmetic_rejects_shape_mismatch() {
        let mut a = PairHistogram::new(2, 2);
        a -= &PairHistogram::new(2, 3);
    }
}
