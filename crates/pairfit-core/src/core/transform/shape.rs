use super::TransformError;
use super::grid::{RadialGrid, SineTransform, arange};
use super::observable::{Population, reduced_pdf, weighted_g};
use crate::core::histogram::kernel::HistogramKernel;
use crate::core::models::boundary::Boundary;
use crate::core::models::configuration::Configuration;
use crate::core::weighting::scheme::WeightingScheme;
use serde::Deserialize;
use std::f64::consts::PI;
use tracing::{debug, warn};

/// Background subtracted from the model `G(r)`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ShapeFunction {
    /// Fixed values, one per experimental data point.
    Constant(Vec<f64>),
    /// Recomputed from the live atom geometry.
    Parameters(ShapeParameters),
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShapeParameters {
    pub rmin: f64,
    pub rmax: Option<f64>,
    pub dr: f64,
    pub qmin: f64,
    pub qmax: f64,
    pub dq: f64,
    /// Accepted moves between two recomputations; zero never refreshes.
    pub update_frequency: u64,
}

impl Default for ShapeParameters {
    fn default() -> Self {
        Self {
            rmin: 0.0,
            rmax: None,
            dr: 0.5,
            qmin: 0.001,
            qmax: 0.75,
            dq: 0.005,
            update_frequency: 1000,
        }
    }
}

impl ShapeParameters {
    pub fn validate(&self) -> Result<(), TransformError> {
        let invalid = |what: String| Err(TransformError::InvalidParameter(what));
        if !(self.dr > 0.0) || !(self.dq > 0.0) {
            return invalid(format!(
                "shape function steps must be positive (dr={}, dq={})",
                self.dr, self.dq
            ));
        }
        if !(self.qmin > 0.0) || !(self.qmax > self.qmin) {
            return invalid(format!(
                "shape function Q range ({}, {}) is invalid",
                self.qmin, self.qmax
            ));
        }
        if !(self.rmin >= 0.0) {
            return invalid(format!("shape function rmin {} is negative", self.rmin));
        }
        if let Some(rmax) = self.rmax {
            if !(rmax > self.rmin + self.dr) {
                return invalid(format!(
                    "shape function rmax {rmax} leaves no shell above rmin {}",
                    self.rmin
                ));
            }
        }
        Ok(())
    }

    /// Upper distance of the shape histogram for the current geometry.
    fn resolve_rmax(&self, configuration: &Configuration) -> f64 {
        if let Some(rmax) = self.rmax {
            return rmax;
        }
        match configuration.boundary().box_lengths() {
            Some(lengths) => lengths.iter().copied().fold(0.0, f64::max) + 10.0,
            None => {
                let coordinates = configuration.coordinates();
                let n = coordinates.len().max(1) as f64;
                let centroid = coordinates
                    .iter()
                    .fold(nalgebra::Vector3::zeros(), |acc, p| acc + p.coords)
                    / n;
                let spread = coordinates
                    .iter()
                    .map(|p| (p.coords - centroid).norm())
                    .fold(0.0, f64::max);
                let rmax = 2.0 * spread + 10.0;
                warn!(
                    rmax,
                    "Shape function rmax is not set for an open boundary; derived from the atom spread"
                );
                rmax
            }
        }
    }

    /// Evaluates the finite-size background at the shell `centers`.
    ///
    /// Distances are taken without periodic wrapping. The weighted `G(r)` of the
    /// configuration is transformed to `S(Q)` on the low-Q grid and back to real space.
    pub fn compute(
        &self,
        configuration: &Configuration,
        scheme: &WeightingScheme,
        centers: &[f64],
    ) -> Result<Vec<f64>, TransformError> {
        self.validate()?;
        let rmax = self.resolve_rmax(configuration);
        let shells = ((rmax - self.rmin) / self.dr).round() as usize;
        let edges: Vec<f64> = (0..=shells)
            .map(|k| self.rmin + k as f64 * self.dr)
            .collect();
        let grid = RadialGrid::from_edges(edges, self.dr)?;

        let unwrapped = Boundary::open(configuration.volume())?;
        let kernel = HistogramKernel::new(&unwrapped, grid.bins(), configuration.workers());
        let hist = kernel.full(&configuration.source())?;

        let population = Population::new(
            configuration.populations().to_vec(),
            configuration.volume(),
        )?;
        let g = weighted_g(&hist, scheme, &population, &grid);
        let big_g = reduced_pdf(&g, grid.centers(), population.number_density());

        let q = arange(self.qmin, self.qmax, self.dq);
        // S(Q) - 1 on the low-Q grid
        let s_minus_one = SineTransform::new(&q, grid.centers(), self.dr).apply(&big_g);
        debug!(shells = grid.len(), qpoints = q.len(), rmax, "Computed shape function");

        Ok(centers
            .iter()
            .map(|r| {
                2.0 / PI
                    * q.iter()
                        .zip(&s_minus_one)
                        .map(|(qi, s)| qi * s * (qi * r).sin() * self.dq)
                        .sum::<f64>()
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::element::{ElementIndex, ElementTable};
    use nalgebra::Point3;

    fn lattice(boundary: Boundary) -> Configuration {
        let mut coordinates = Vec::new();
        for i in 0..3 {
            for j in 0..3 {
                for k in 0..3 {
                    coordinates.push(Point3::new(i as f64 * 2.0, j as f64 * 2.0, k as f64 * 2.0));
                }
            }
        }
        let n = coordinates.len();
        Configuration::new(
            ElementTable::new(["Ar"]).unwrap(),
            boundary,
            coordinates,
            vec![ElementIndex::new(0); n],
            (0..n).collect(),
        )
        .unwrap()
    }

    #[test]
    fn defaults_match_documented_values() {
        let params = ShapeParameters::default();
        assert_eq!(params.dr, 0.5);
        assert_eq!(params.qmax, 0.75);
        assert_eq!(params.update_frequency, 1000);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn invalid_ranges_are_rejected() {
        let params = ShapeParameters {
            qmin: 0.0,
            ..Default::default()
        };
        assert!(params.validate().is_err());
        let params = ShapeParameters {
            rmin: 5.0,
            rmax: Some(5.2),
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn periodic_rmax_defaults_to_longest_box_vector_plus_ten() {
        let config = lattice(Boundary::orthorhombic(6.0, 7.0, 8.0).unwrap());
        assert_eq!(ShapeParameters::default().resolve_rmax(&config), 18.0);
    }

    #[test]
    fn open_rmax_defaults_to_twice_the_spread_plus_ten() {
        let config = lattice(Boundary::open(216.0).unwrap());
        let spread = (3.0f64 * 4.0).sqrt();
        let rmax = ShapeParameters::default().resolve_rmax(&config);
        assert!((rmax - (2.0 * spread + 10.0)).abs() < 1e-12);
    }

    #[test]
    fn compute_evaluates_at_every_center() {
        let config = lattice(Boundary::cubic(6.0).unwrap());
        let scheme = WeightingScheme::compute(config.populations(), &[1.0]).unwrap();
        let centers = [1.0, 2.0, 3.0, 4.0];
        let shape = ShapeParameters::default()
            .compute(&config, &scheme, &centers)
            .unwrap();
        assert_eq!(shape.len(), centers.len());
        assert!(shape.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn deserializes_both_forms() {
        #[derive(Deserialize)]
        struct Wrapper {
            shape: ShapeFunction,
        }
        let constant: Wrapper = toml::from_str("shape = [0.0, 0.5, 1.0]").unwrap();
        assert_eq!(constant.shape, ShapeFunction::Constant(vec![0.0, 0.5, 1.0]));

        let params: Wrapper = toml::from_str("shape = { rmax = 30.0, update_frequency = 10 }").unwrap();
        match params.shape {
            ShapeFunction::Parameters(p) => {
                assert_eq!(p.rmax, Some(30.0));
                assert_eq!(p.update_frequency, 10);
                assert_eq!(p.dq, 0.005);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
