use crate::core::models::configuration::{Configuration, ModelError};
use nalgebra::Point3;
use std::ops::Deref;

/// Writes candidate coordinates for a subset of atoms and puts the originals back
/// when dropped.
///
/// Restoration runs on every exit path, including early returns and unwinding, so
/// the configuration is never observed in its trial state once the guard is gone.
pub struct CoordinateGuard<'c, 's> {
    configuration: &'c mut Configuration,
    subset: &'s [usize],
    originals: Vec<Point3<f64>>,
}

impl<'c, 's> CoordinateGuard<'c, 's> {
    pub fn new(
        configuration: &'c mut Configuration,
        subset: &'s [usize],
        candidates: &[Point3<f64>],
    ) -> Result<Self, ModelError> {
        configuration.validate_subset(subset)?;
        if candidates.len() != subset.len() {
            return Err(ModelError::LengthMismatch {
                what: "candidate coordinates",
                expected: subset.len(),
                found: candidates.len(),
            });
        }
        if let Some(k) = candidates
            .iter()
            .position(|p| p.iter().any(|v| !v.is_finite()))
        {
            return Err(ModelError::NonFiniteCoordinate(subset[k]));
        }

        let coordinates = configuration.coordinates_mut();
        let originals = subset.iter().map(|&i| coordinates[i]).collect();
        for (&i, p) in subset.iter().zip(candidates) {
            coordinates[i] = *p;
        }
        Ok(Self {
            configuration,
            subset,
            originals,
        })
    }
}

impl Deref for CoordinateGuard<'_, '_> {
    type Target = Configuration;

    fn deref(&self) -> &Self::Target {
        self.configuration
    }
}

impl Drop for CoordinateGuard<'_, '_> {
    fn drop(&mut self) {
        let coordinates = self.configuration.coordinates_mut();
        for (&i, p) in self.subset.iter().zip(&self.originals) {
            coordinates[i] = *p;
        }
    }
}
