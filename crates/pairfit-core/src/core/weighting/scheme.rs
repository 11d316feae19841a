use super::properties::WeightingProperty;
use crate::core::models::element::ElementPair;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum WeightingError {
    #[error("Unsupported weighting: {0}")]
    UnsupportedProperty(String),
    #[error("No {property} value for element '{element}'")]
    UnknownElement {
        element: String,
        property: WeightingProperty,
    },
    #[error("Weight of element '{element}' is not finite ({value})")]
    NonFiniteWeight { element: String, value: f64 },
    #[error("Got {found} element weights for {expected} populations")]
    LengthMismatch { expected: usize, found: usize },
    #[error("Weighting scheme is degenerate: {0}")]
    Degenerate(String),
}

/// Normalised weight of every unordered element pair.
///
/// The raw weight of a self pair `(e, e)` is `N_e (N_e - 1) b_e²` and that of a
/// hetero pair `(e, f)` is `2 N_e N_f b_e b_f`; raw weights are divided by their sum,
/// so the weights always add up to one whatever the populations are.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightingScheme {
    weights: BTreeMap<ElementPair, f64>,
}

impl WeightingScheme {
    pub fn compute(populations: &[usize], element_weights: &[f64]) -> Result<Self, WeightingError> {
        if populations.len() != element_weights.len() {
            return Err(WeightingError::LengthMismatch {
                expected: populations.len(),
                found: element_weights.len(),
            });
        }

        let raw: BTreeMap<ElementPair, f64> = ElementPair::all(populations.len())
            .into_iter()
            .map(|pair| {
                let (a, b) = (pair.first().index(), pair.second().index());
                let (na, nb) = (populations[a] as f64, populations[b] as f64);
                let value = if pair.is_self_pair() {
                    na * (na - 1.0).max(0.0) * element_weights[a] * element_weights[a]
                } else {
                    2.0 * na * nb * element_weights[a] * element_weights[b]
                };
                (pair, value)
            })
            .collect();

        let norm: f64 = raw.values().sum();
        if norm == 0.0 || !norm.is_finite() {
            return Err(WeightingError::Degenerate(format!(
                "raw pair weights sum to {norm}"
            )));
        }

        Ok(Self {
            weights: raw.into_iter().map(|(pair, w)| (pair, w / norm)).collect(),
        })
    }

    /// Weight of a pair, zero for pairs outside the scheme.
    pub fn weight(&self, pair: ElementPair) -> f64 {
        self.weights.get(&pair).copied().unwrap_or(0.0)
    }

    /// Pairs with their weights, in lexicographic pair order.
    pub fn pairs(&self) -> impl Iterator<Item = (ElementPair, f64)> + '_ {
        self.weights.iter().map(|(&pair, &w)| (pair, w))
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn sum(&self) -> f64 {
        self.weights.values().sum()
    }
}
