use crate::core::models::boundary::Boundary;
use crate::core::transform::TransformError;
use crate::core::transform::data::UsedData;
use crate::core::transform::grid::{RadialGrid, RealSpaceParameters, SineTransform};
use tracing::debug;

/// Real-space grid of a constraint plus the map from `G(r)` to the observable.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservableGrid {
    radial: RadialGrid,
    sine: Option<SineTransform>,
}

impl ObservableGrid {
    pub fn radial(&self) -> &RadialGrid {
        &self.radial
    }

    /// Observable values for a reduced pair distribution on the radial grid.
    pub fn model(&self, reduced: &[f64]) -> Vec<f64> {
        match &self.sine {
            Some(sine) => sine.apply(reduced).into_iter().map(|s| s + 1.0).collect(),
            None => reduced.to_vec(),
        }
    }

    /// Partial values in observable space.
    pub fn partial(&self, values: &[f64]) -> Vec<f64> {
        match &self.sine {
            Some(sine) => sine.apply(values),
            None => values.to_vec(),
        }
    }
}

/// The measured quantity a constraint fits.
pub trait ObservableKind: Send + Sync + 'static {
    const NAME: &'static str;

    fn build_grid(
        used: &UsedData,
        real_space: &RealSpaceParameters,
        boundary: &Boundary,
    ) -> Result<ObservableGrid, TransformError>;

    /// Whether the grid has to be rebuilt when the boundary changes.
    fn follows_boundary(real_space: &RealSpaceParameters) -> bool;

    /// Slices a user-supplied background onto the radial grid. `data_len` is the
    /// number of experimental points before limits are applied.
    fn constant_shape(
        values: &[f64],
        data_len: usize,
        used: &UsedData,
        grid: &RadialGrid,
    ) -> Result<Vec<f64>, TransformError>;
}

/// Real-space reduced pair distribution function `G(r)`.
#[derive(Debug, Clone, Copy)]
pub struct PairDistribution;

impl ObservableKind for PairDistribution {
    const NAME: &'static str = "pair distribution";

    fn build_grid(
        used: &UsedData,
        _real_space: &RealSpaceParameters,
        _boundary: &Boundary,
    ) -> Result<ObservableGrid, TransformError> {
        let radial = RadialGrid::from_centers(&used.x)?;
        debug!(shells = radial.len(), width = radial.width(), "Built PDF grid");
        Ok(ObservableGrid { radial, sine: None })
    }

    fn follows_boundary(_real_space: &RealSpaceParameters) -> bool {
        false
    }

    fn constant_shape(
        values: &[f64],
        data_len: usize,
        used: &UsedData,
        _grid: &RadialGrid,
    ) -> Result<Vec<f64>, TransformError> {
        if values.len() != data_len {
            return Err(TransformError::LengthMismatch {
                what: "shape function",
                expected: data_len,
                found: values.len(),
            });
        }
        Ok(values[used.range.clone()].to_vec())
    }
}

/// Reciprocal-space total structure factor `S(Q)`.
#[derive(Debug, Clone, Copy)]
pub struct StructureFactor;

impl ObservableKind for StructureFactor {
    const NAME: &'static str = "structure factor";

    fn build_grid(
        used: &UsedData,
        real_space: &RealSpaceParameters,
        boundary: &Boundary,
    ) -> Result<ObservableGrid, TransformError> {
        let radial = real_space.radial_grid(&used.x, boundary)?;
        let sine = SineTransform::new(&used.x, radial.centers(), radial.width());
        Ok(ObservableGrid {
            radial,
            sine: Some(sine),
        })
    }

    fn follows_boundary(real_space: &RealSpaceParameters) -> bool {
        real_space.depends_on_boundary()
    }

    fn constant_shape(
        values: &[f64],
        _data_len: usize,
        _used: &UsedData,
        grid: &RadialGrid,
    ) -> Result<Vec<f64>, TransformError> {
        if values.len() != grid.len() {
            return Err(TransformError::LengthMismatch {
                what: "shape function",
                expected: grid.len(),
                found: values.len(),
            });
        }
        Ok(values.to_vec())
    }
}
