use super::TransformError;
use super::grid::RadialGrid;
use crate::core::histogram::table::{PairComponent, PairHistogram};
use crate::core::models::element::ElementPair;
use crate::core::weighting::scheme::WeightingScheme;
use std::collections::BTreeMap;
use std::f64::consts::PI;

/// Element populations and the volume they occupy.
#[derive(Debug, Clone, PartialEq)]
pub struct Population {
    pub counts: Vec<usize>,
    pub volume: f64,
}

impl Population {
    pub fn new(counts: Vec<usize>, volume: f64) -> Result<Self, TransformError> {
        if !(volume > 0.0) || !volume.is_finite() {
            return Err(TransformError::Degenerate(format!(
                "volume must be positive, got {volume}"
            )));
        }
        Ok(Self { counts, volume })
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    pub fn number_density(&self) -> f64 {
        self.total() as f64 / self.volume
    }

    /// Number of distinct atom pairs of an element pair.
    pub fn pair_count(&self, pair: ElementPair) -> f64 {
        let a = self.counts[pair.first().index()] as f64;
        if pair.is_self_pair() {
            a * (a - 1.0) / 2.0
        } else {
            a * self.counts[pair.second().index()] as f64
        }
    }

    /// Copy with one atom of the given element removed.
    pub fn without_one(&self, element: usize) -> Result<Self, TransformError> {
        let mut counts = self.counts.clone();
        match counts.get_mut(element) {
            Some(n) if *n > 0 => *n -= 1,
            _ => {
                return Err(TransformError::Degenerate(format!(
                    "element {element} has no atom left to remove"
                )));
            }
        }
        Ok(Self {
            counts,
            volume: self.volume,
        })
    }
}

/// Weighted pair correlation `g(r)` of a histogram, summed over element pairs.
pub fn weighted_g(
    hist: &PairHistogram,
    scheme: &WeightingScheme,
    population: &Population,
    grid: &RadialGrid,
) -> Vec<f64> {
    let mut g = vec![0.0; grid.len()];
    for (pair, weight) in scheme.pairs() {
        add_partial(&mut g, hist, PairComponent::Total, pair, weight, population);
    }
    g.iter_mut()
        .zip(grid.shell_volumes())
        .for_each(|(v, shell)| *v /= shell);
    g
}

fn add_partial(
    out: &mut [f64],
    hist: &PairHistogram,
    component: PairComponent,
    pair: ElementPair,
    weight: f64,
    population: &Population,
) {
    let pairs = population.pair_count(pair);
    if pairs == 0.0 {
        return;
    }
    let density = pairs / population.volume;
    let counts = hist.pair_counts(component, pair);
    out.iter_mut()
        .zip(counts)
        .for_each(|(v, n)| *v += weight * n / density);
}

/// `G(r) = 4π ρ₀ r (g(r) - 1)`.
pub fn reduced_pdf(g: &[f64], r: &[f64], density: f64) -> Vec<f64> {
    g.iter()
        .zip(r)
        .map(|(g, r)| 4.0 * PI * density * r * (g - 1.0))
        .collect()
}

/// Per-pair observables indexed by element pair and component.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialObservables {
    values: BTreeMap<(ElementPair, PairComponent), Vec<f64>>,
}

impl PartialObservables {
    /// Weighted partial `g` of every pair and component.
    pub fn from_histogram(
        hist: &PairHistogram,
        scheme: &WeightingScheme,
        population: &Population,
        grid: &RadialGrid,
    ) -> Self {
        let mut values = BTreeMap::new();
        for (pair, weight) in scheme.pairs() {
            for component in [PairComponent::Intra, PairComponent::Inter, PairComponent::Total] {
                let mut partial = vec![0.0; grid.len()];
                add_partial(&mut partial, hist, component, pair, weight, population);
                partial
                    .iter_mut()
                    .zip(grid.shell_volumes())
                    .for_each(|(v, shell)| *v /= shell);
                values.insert((pair, component), partial);
            }
        }
        Self { values }
    }

    pub fn get(&self, pair: ElementPair, component: PairComponent) -> Option<&[f64]> {
        self.values.get(&(pair, component)).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Applies `f` to every stored array.
    pub fn map_values(self, mut f: impl FnMut(&[f64]) -> Vec<f64>) -> Self {
        Self {
            values: self
                .values
                .into_iter()
                .map(|(key, v)| (key, f(&v)))
                .collect(),
        }
    }
}

/// Model observable with its per-pair breakdown.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintValue {
    /// Scaled model after the window function, compared with the data.
    pub total: Vec<f64>,
    /// Scaled model before the window function.
    pub unsmoothed: Vec<f64>,
    pub partials: PartialObservables,
}
