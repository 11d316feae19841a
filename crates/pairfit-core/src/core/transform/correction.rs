use super::TransformError;
use serde::Deserialize;

/// When and within which bounds the model scale factor is refitted.
///
/// A `frequency` of zero keeps the scale factor fixed.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScaleFactorPolicy {
    pub frequency: u64,
    pub minimum: f64,
    pub maximum: f64,
}

impl Default for ScaleFactorPolicy {
    fn default() -> Self {
        Self {
            frequency: 0,
            minimum: 0.8,
            maximum: 1.2,
        }
    }
}

impl ScaleFactorPolicy {
    pub fn validate(&self) -> Result<(), TransformError> {
        if !(self.minimum.is_finite() && self.maximum.is_finite()) || self.minimum > self.maximum {
            return Err(TransformError::InvalidParameter(format!(
                "scale factor bounds [{}, {}] are invalid",
                self.minimum, self.maximum
            )));
        }
        Ok(())
    }

    /// Whether a refit is due at the given generated-move count.
    pub fn is_due(&self, step: u64) -> bool {
        self.frequency > 0 && step % self.frequency == 0
    }

    /// Least-squares scale of `model` onto `data`, clamped to the policy bounds.
    pub fn fit(&self, data: &[f64], model: &[f64], weights: &[f64]) -> Result<f64, TransformError> {
        let (mut numerator, mut denominator) = (0.0, 0.0);
        for ((y, f), w) in data.iter().zip(model).zip(weights) {
            numerator += w * y * f;
            denominator += w * f * f;
        }
        if denominator == 0.0 || !denominator.is_finite() || !numerator.is_finite() {
            return Err(TransformError::Degenerate(
                "model is identically zero over the fitted range".to_string(),
            ));
        }
        Ok((numerator / denominator).clamp(self.minimum, self.maximum))
    }
}

/// Normalised smoothing kernel convolved with the model observable.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowFunction {
    kernel: Vec<f64>,
}

impl WindowFunction {
    pub fn new(values: Vec<f64>) -> Result<Self, TransformError> {
        if values.is_empty() {
            return Err(TransformError::InvalidParameter(
                "window function must not be empty".to_string(),
            ));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(TransformError::InvalidParameter(
                "window function contains non-finite values".to_string(),
            ));
        }
        let sum: f64 = values.iter().sum();
        if sum == 0.0 {
            return Err(TransformError::Degenerate(
                "window function sums to zero".to_string(),
            ));
        }
        Ok(Self {
            kernel: values.into_iter().map(|v| v / sum).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.kernel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kernel.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.kernel
    }

    /// Centered convolution returning as many values as `signal` holds.
    pub fn convolve_same(&self, signal: &[f64]) -> Vec<f64> {
        let n = signal.len();
        let m = self.kernel.len();
        let offset = (m - 1) / 2;
        (0..n)
            .map(|i| {
                let full = i + offset;
                self.kernel
                    .iter()
                    .enumerate()
                    .filter_map(|(k, w)| {
                        full.checked_sub(k)
                            .filter(|&j| j < n)
                            .map(|j| w * signal[j])
                    })
                    .sum()
            })
            .collect()
    }
}

/// `Σ wᵢ (yᵢ - fᵢ)²`.
pub fn standard_error(data: &[f64], model: &[f64], weights: &[f64]) -> f64 {
    data.iter()
        .zip(model)
        .zip(weights)
        .map(|((y, f), w)| w * (y - f) * (y - f))
        .sum()
}
