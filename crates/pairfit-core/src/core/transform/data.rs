use super::TransformError;
use std::ops::Range;

const SORT_TOLERANCE: f64 = 1e-6;

/// Measured observable: sample positions (`r` or `Q`), values and optional weights.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentalData {
    x: Vec<f64>,
    y: Vec<f64>,
    weights: Option<Vec<f64>>,
}

impl ExperimentalData {
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Result<Self, TransformError> {
        if x.len() != y.len() {
            return Err(TransformError::LengthMismatch {
                what: "experimental values",
                expected: x.len(),
                found: y.len(),
            });
        }
        if x.len() < 2 {
            return Err(TransformError::InvalidData(format!(
                "at least two data points are required, got {}",
                x.len()
            )));
        }
        if let Some(i) = x.iter().zip(&y).position(|(a, b)| !a.is_finite() || !b.is_finite()) {
            return Err(TransformError::InvalidData(format!(
                "data point {i} is not finite"
            )));
        }
        if x[0] < 0.0 {
            return Err(TransformError::InvalidData(format!(
                "first data position {} is negative",
                x[0]
            )));
        }
        if let Some(i) = x.windows(2).position(|w| w[1] < w[0] - SORT_TOLERANCE) {
            return Err(TransformError::InvalidData(format!(
                "data positions are not sorted at index {}",
                i + 1
            )));
        }
        Ok(Self { x, y, weights: None })
    }

    pub fn with_weights(mut self, weights: Vec<f64>) -> Result<Self, TransformError> {
        if weights.len() != self.x.len() {
            return Err(TransformError::LengthMismatch {
                what: "data weights",
                expected: self.x.len(),
                found: weights.len(),
            });
        }
        if let Some(i) = weights.iter().position(|w| !w.is_finite() || *w < 0.0) {
            return Err(TransformError::InvalidData(format!(
                "data weight {i} must be finite and non-negative"
            )));
        }
        self.weights = Some(weights);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn y(&self) -> &[f64] {
        &self.y
    }

    pub fn weights(&self) -> Option<&[f64]> {
        self.weights.as_deref()
    }

    /// Index of the sample nearest to `value`.
    fn nearest_index(&self, value: f64) -> usize {
        self.x
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| (*a - value).abs().total_cmp(&(*b - value).abs()))
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    /// Selects the samples between `limits`, each bound snapped to the nearest sample.
    ///
    /// Weights of the selected samples are rescaled to sum to their count.
    pub fn select(&self, limits: Option<(f64, f64)>) -> Result<UsedData, TransformError> {
        let range = match limits {
            None => 0..self.len(),
            Some((lower, upper)) => {
                if !(lower.is_finite() && upper.is_finite()) || lower > upper {
                    return Err(TransformError::InvalidData(format!(
                        "invalid limits ({lower}, {upper})"
                    )));
                }
                self.nearest_index(lower)..self.nearest_index(upper) + 1
            }
        };
        if range.len() < 2 {
            return Err(TransformError::InvalidData(format!(
                "limits select {} data point(s), at least two are required",
                range.len()
            )));
        }

        let weights = match &self.weights {
            None => vec![1.0; range.len()],
            Some(all) => {
                let slice = &all[range.clone()];
                let sum: f64 = slice.iter().sum();
                if sum <= 0.0 {
                    return Err(TransformError::Degenerate(
                        "data weights of the selected range sum to zero".to_string(),
                    ));
                }
                let scale = range.len() as f64 / sum;
                slice.iter().map(|w| w * scale).collect()
            }
        };

        Ok(UsedData {
            x: self.x[range.clone()].to_vec(),
            y: self.y[range.clone()].to_vec(),
            weights,
            range,
        })
    }
}

/// The slice of experimental data a constraint compares against.
#[derive(Debug, Clone, PartialEq)]
pub struct UsedData {
    pub range: Range<usize>,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub weights: Vec<f64>,
}

impl UsedData {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: usize) -> ExperimentalData {
        let x = (0..n).map(|i| 0.05 + 0.1 * i as f64).collect();
        let y = (0..n).map(|i| i as f64).collect();
        ExperimentalData::new(x, y).unwrap()
    }

    #[test]
    fn new_validates_shape_and_order() {
        assert!(ExperimentalData::new(vec![0.0], vec![1.0]).is_err());
        assert!(ExperimentalData::new(vec![0.0, 1.0], vec![1.0]).is_err());
        assert!(ExperimentalData::new(vec![-0.5, 1.0], vec![1.0, 1.0]).is_err());
        assert!(ExperimentalData::new(vec![1.0, 0.5], vec![1.0, 1.0]).is_err());
        assert!(ExperimentalData::new(vec![0.0, f64::NAN], vec![1.0, 1.0]).is_err());
    }

    #[test]
    fn limits_snap_to_nearest_samples() {
        let data = ramp(20);
        let used = data.select(Some((0.31, 0.74))).unwrap();
        assert_eq!(used.range, 3..8);
        assert_eq!(used.y, vec![3.0, 4.0, 5.0, 6.0, 7.0]);
        assert_eq!(data.select(None).unwrap().len(), 20);
    }

    #[test]
    fn limits_selecting_a_single_point_are_rejected() {
        let data = ramp(10);
        assert!(data.select(Some((0.42, 0.43))).is_err());
        assert!(data.select(Some((0.8, 0.2))).is_err());
    }

    #[test]
    fn selected_weights_are_renormalised() {
        let data = ramp(4).with_weights(vec![0.0, 1.0, 3.0, 100.0]).unwrap();
        let used = data.select(Some((0.0, 0.25))).unwrap();
        assert_eq!(used.range, 0..3);
        let sum: f64 = used.weights.iter().sum();
        assert!((sum - 3.0).abs() < 1e-12);
        assert!((used.weights[2] - 2.25).abs() < 1e-12);
    }

    #[test]
    fn all_zero_weights_are_degenerate() {
        let data = ramp(3).with_weights(vec![0.0; 3]).unwrap();
        assert!(matches!(data.select(None), Err(TransformError::Degenerate(_))));
    }
}
