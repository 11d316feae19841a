use super::TransformError;
use crate::core::histogram::bins::BinSpec;
use crate::core::models::boundary::Boundary;
use nalgebra::{DMatrix, DVector};
use serde::Deserialize;
use std::f64::consts::PI;
use tracing::debug;

const UNIFORM_TOLERANCE: f64 = 1e-6;

/// Real-space shells the pair histogram is binned on.
#[derive(Debug, Clone, PartialEq)]
pub struct RadialGrid {
    centers: Vec<f64>,
    edges: Vec<f64>,
    shell_volumes: Vec<f64>,
    bins: BinSpec,
}

impl RadialGrid {
    /// Grid whose shell centers are the given uniformly spaced distances.
    pub fn from_centers(centers: &[f64]) -> Result<Self, TransformError> {
        if centers.len() < 2 {
            return Err(TransformError::InvalidGrid(
                "at least two shell centers are required".to_string(),
            ));
        }
        let width = centers[1] - centers[0];
        if width <= 0.0 {
            return Err(TransformError::InvalidGrid(format!(
                "bin width must be positive, got {width}"
            )));
        }
        if let Some(i) = centers
            .windows(2)
            .position(|w| ((w[1] - w[0]) - width).abs() > UNIFORM_TOLERANCE)
        {
            return Err(TransformError::InvalidGrid(format!(
                "distances are not uniformly spaced at index {}",
                i + 1
            )));
        }
        let mut edges: Vec<f64> = centers.iter().map(|c| c - width / 2.0).collect();
        edges.push(centers[centers.len() - 1] + width / 2.0);
        Self::build(centers.to_vec(), edges, width)
    }

    /// Grid over consecutive edges spaced by `width`.
    pub fn from_edges(edges: Vec<f64>, width: f64) -> Result<Self, TransformError> {
        if edges.len() < 2 {
            return Err(TransformError::InvalidGrid(
                "at least two shell edges are required".to_string(),
            ));
        }
        let centers = edges.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect();
        Self::build(centers, edges, width)
    }

    fn build(centers: Vec<f64>, edges: Vec<f64>, width: f64) -> Result<Self, TransformError> {
        let min = edges[0];
        let max = edges[edges.len() - 1];
        let bins = BinSpec::new(min, max, width)?;
        if bins.size() != centers.len() {
            return Err(TransformError::InvalidGrid(format!(
                "{} shells do not match {} bins of width {width}",
                centers.len(),
                bins.size()
            )));
        }
        let shell_volumes: Vec<f64> = edges
            .windows(2)
            .map(|w| 4.0 / 3.0 * PI * (w[1].powi(3) - w[0].powi(3)))
            .collect();
        if let Some(i) = shell_volumes.iter().position(|v| *v <= 0.0) {
            return Err(TransformError::Degenerate(format!(
                "shell {i} has non-positive volume"
            )));
        }
        Ok(Self {
            centers,
            edges,
            shell_volumes,
            bins,
        })
    }

    pub fn len(&self) -> usize {
        self.centers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centers.is_empty()
    }

    pub fn centers(&self) -> &[f64] {
        &self.centers
    }

    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    pub fn shell_volumes(&self) -> &[f64] {
        &self.shell_volumes
    }

    pub fn bins(&self) -> BinSpec {
        self.bins
    }

    pub fn width(&self) -> f64 {
        self.bins.width()
    }
}

/// Values `start, start + step, ...` strictly below `stop`.
pub(crate) fn arange(start: f64, stop: f64, step: f64) -> Vec<f64> {
    let count = ((stop - start) / step).ceil().max(0.0) as usize;
    (0..count).map(|k| start + k as f64 * step).collect()
}

/// User overrides for the real-space grid a structure factor is computed from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RealSpaceParameters {
    pub rmin: Option<f64>,
    pub rmax: Option<f64>,
    pub dr: Option<f64>,
}

impl RealSpaceParameters {
    /// Whether the derived grid follows the boundary geometry.
    pub fn depends_on_boundary(&self) -> bool {
        self.rmax.is_none()
    }

    /// Derives the real-space grid for the reciprocal-space samples `q`.
    pub fn radial_grid(&self, q: &[f64], boundary: &Boundary) -> Result<RadialGrid, TransformError> {
        if q.len() < 2 {
            return Err(TransformError::InvalidGrid(
                "at least two scattering vectors are required".to_string(),
            ));
        }
        let qmin = q[0];
        let qmax = q[q.len() - 1];
        let dq = q[1] - q[0];
        if qmin <= 0.0 {
            return Err(TransformError::InvalidGrid(format!(
                "smallest scattering vector must be positive, got {qmin}"
            )));
        }
        if dq <= 0.0 {
            return Err(TransformError::InvalidGrid(format!(
                "scattering vector step must be positive, got {dq}"
            )));
        }

        let resolution = 2.0 * PI / qmax;
        let rmin = self.rmin.unwrap_or(resolution);
        let dr = match self.dr {
            Some(dr) => dr,
            None => {
                let rounded = (resolution * 10.0).round() / 10.0;
                if rounded > resolution {
                    rounded - 0.1
                } else {
                    rounded
                }
            }
        };
        if !(dr > 0.0) {
            return Err(TransformError::InvalidGrid(format!(
                "real-space step must be positive, got {dr}"
            )));
        }
        let stop = match (self.rmax, boundary.box_lengths()) {
            (Some(rmax), _) => rmax + dr,
            (None, Some(lengths)) => lengths.iter().copied().fold(f64::INFINITY, f64::min) / 2.0,
            (None, None) => 2.0 * PI / dq + dr,
        };
        if !(rmin >= 0.0) || stop <= rmin {
            return Err(TransformError::InvalidGrid(format!(
                "empty real-space range [{rmin}, {stop})"
            )));
        }

        let edges = arange(rmin, stop, dr);
        debug!(rmin, stop, dr, shells = edges.len().saturating_sub(1), "Derived real-space grid");
        RadialGrid::from_edges(edges, dr)
    }
}

/// Discrete sine transform `M[q][r] = dr sin(q r) / q` between a real-space grid and
/// the scattering vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct SineTransform {
    matrix: DMatrix<f64>,
}

impl SineTransform {
    pub fn new(q: &[f64], r: &[f64], dr: f64) -> Self {
        let matrix = DMatrix::from_fn(q.len(), r.len(), |i, k| dr * (q[i] * r[k]).sin() / q[i]);
        Self { matrix }
    }

    /// `M · values`.
    pub fn apply(&self, values: &[f64]) -> Vec<f64> {
        let input = DVector::from_column_slice(values);
        (&self.matrix * input).iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_centers_places_edges_halfway() {
        let grid = RadialGrid::from_centers(&[0.5, 1.5, 2.5]).unwrap();
        assert_eq!(grid.edges(), &[0.0, 1.0, 2.0, 3.0]);
        assert_eq!(grid.bins().size(), 3);
        assert_eq!(grid.bins().locate(1.2), Some(1));
        let expected = 4.0 / 3.0 * PI * (8.0 - 1.0);
        assert!((grid.shell_volumes()[1] - expected).abs() < 1e-12);
    }

    #[test]
    fn from_centers_rejects_non_uniform_spacing() {
        assert!(matches!(
            RadialGrid::from_centers(&[0.5, 1.5, 2.6]),
            Err(TransformError::InvalidGrid(_))
        ));
        assert!(RadialGrid::from_centers(&[1.0, 1.0]).is_err());
    }

    #[test]
    fn structure_factor_grid_defaults_to_half_box() {
        let q: Vec<f64> = (1..=100).map(|i| 0.2 * i as f64).collect();
        let boundary = Boundary::cubic(20.0).unwrap();
        let grid = RealSpaceParameters::default().radial_grid(&q, &boundary).unwrap();
        // 2π/20 ≈ 0.314 rounds to 0.3
        assert!((grid.width() - 0.3).abs() < 1e-12);
        assert!((grid.edges()[0] - 2.0 * PI / 20.0).abs() < 1e-12);
        assert!(*grid.edges().last().unwrap() < 10.0);
    }

    #[test]
    fn structure_factor_grid_lowers_rounded_up_step() {
        // 2π/9 ≈ 0.698 rounds up to 0.7 and is lowered to 0.6
        let q = [3.0, 6.0, 9.0];
        let grid = RealSpaceParameters::default()
            .radial_grid(&q, &Boundary::cubic(30.0).unwrap())
            .unwrap();
        assert!((grid.width() - 0.6).abs() < 1e-12);
    }

    #[test]
    fn structure_factor_grid_honours_explicit_range() {
        let q = [0.5, 1.0, 1.5, 2.0];
        let params = RealSpaceParameters {
            rmin: Some(0.0),
            rmax: Some(2.0),
            dr: Some(0.5),
        };
        let grid = params.radial_grid(&q, &Boundary::open(1e3).unwrap()).unwrap();
        assert_eq!(grid.edges(), &[0.0, 0.5, 1.0, 1.5, 2.0]);
        assert!(!params.depends_on_boundary());
    }

    #[test]
    fn structure_factor_grid_requires_positive_q() {
        let q = [0.0, 0.5, 1.0];
        assert!(RealSpaceParameters::default()
            .radial_grid(&q, &Boundary::cubic(10.0).unwrap())
            .is_err());
    }

    #[test]
    fn sine_transform_matches_direct_sum() {
        let q = [0.5, 1.0];
        let r = [1.0, 2.0, 3.0];
        let transform = SineTransform::new(&q, &r, 0.1);
        let values = [1.0, -2.0, 0.5];
        let out = transform.apply(&values);
        for (i, qi) in q.iter().enumerate() {
            let expected: f64 = r
                .iter()
                .zip(values)
                .map(|(rk, v)| 0.1 * (qi * rk).sin() / qi * v)
                .sum();
            assert!((out[i] - expected).abs() < 1e-12);
        }
    }
}
