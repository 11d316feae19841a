use super::configuration::ModelError;
use nalgebra::{Matrix3, Point3, Vector3};

/// Boundary geometry of the simulated configuration.
///
/// Periodic boxes are described by their basis vectors (stored as matrix columns)
/// and measure separations with the minimum-image convention. Open boundaries use
/// raw Euclidean separations; their volume is supplied by the engine because it
/// cannot be derived from the atoms alone.
#[derive(Debug, Clone, PartialEq)]
pub enum Boundary {
    Periodic {
        basis: Matrix3<f64>,
        inverse: Matrix3<f64>,
    },
    Open {
        volume: f64,
    },
}

impl Boundary {
    /// Creates a periodic boundary from a basis whose columns are the box vectors.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidBoundary`] if the basis contains non-finite
    /// values or is singular.
    pub fn periodic(basis: Matrix3<f64>) -> Result<Self, ModelError> {
        if basis.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::InvalidBoundary(
                "box basis contains non-finite values".to_string(),
            ));
        }
        let inverse = basis.try_inverse().ok_or_else(|| {
            ModelError::InvalidBoundary("box basis is singular".to_string())
        })?;
        if basis.determinant().abs() <= f64::EPSILON {
            return Err(ModelError::InvalidBoundary(
                "box basis encloses zero volume".to_string(),
            ));
        }
        Ok(Self::Periodic { basis, inverse })
    }

    pub fn orthorhombic(a: f64, b: f64, c: f64) -> Result<Self, ModelError> {
        Self::periodic(Matrix3::from_diagonal(&Vector3::new(a, b, c)))
    }

    pub fn cubic(length: f64) -> Result<Self, ModelError> {
        Self::orthorhombic(length, length, length)
    }

    pub fn open(volume: f64) -> Result<Self, ModelError> {
        if !volume.is_finite() || volume <= 0.0 {
            return Err(ModelError::InvalidBoundary(format!(
                "open boundary volume must be positive, got {volume}"
            )));
        }
        Ok(Self::Open { volume })
    }

    pub fn is_periodic(&self) -> bool {
        matches!(self, Self::Periodic { .. })
    }

    pub fn volume(&self) -> f64 {
        match self {
            Self::Periodic { basis, .. } => basis.determinant().abs(),
            Self::Open { volume } => *volume,
        }
    }

    /// Lengths of the three box vectors, or `None` for open boundaries.
    pub fn box_lengths(&self) -> Option<[f64; 3]> {
        match self {
            Self::Periodic { basis, .. } => Some([
                basis.column(0).norm(),
                basis.column(1).norm(),
                basis.column(2).norm(),
            ]),
            Self::Open { .. } => None,
        }
    }

    /// Shortest separation vector from `a` to `b`.
    #[inline]
    pub fn separation(&self, a: &Point3<f64>, b: &Point3<f64>) -> Vector3<f64> {
        let d = b - a;
        match self {
            Self::Periodic { basis, inverse } => {
                let mut frac = inverse * d;
                frac.apply(|x| *x = *x - x.round());
                basis * frac
            }
            Self::Open { .. } => d,
        }
    }

    #[inline]
    pub fn distance(&self, a: &Point3<f64>, b: &Point3<f64>) -> f64 {
        self.separation(a, b).norm()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn periodic_separation_uses_nearest_image() {
        let boundary = Boundary::orthorhombic(1.0, 1.0, 2.0).unwrap();
        let sep = boundary.separation(&Point3::origin(), &Point3::new(0.4, 1.1, 1.8));
        let expected = Vector3::new(0.4, 0.1, -0.2);
        assert!((sep - expected).norm() < 1e-12);
    }

    #[test]
    fn periodic_distance_wraps_across_faces() {
        let boundary = Boundary::orthorhombic(1.0, 2.0, 3.0).unwrap();
        let d = boundary.distance(&Point3::new(0.9, 1.9, 2.9), &Point3::new(0.1, 0.1, 0.1));
        let expected = (3.0f64 * 0.2 * 0.2).sqrt();
        assert!((d - expected).abs() < 1e-10);
    }

    #[test]
    fn periodic_images_of_same_point_have_zero_distance() {
        let boundary = Boundary::orthorhombic(1.0, 2.0, 3.0).unwrap();
        let d = boundary.distance(&Point3::new(0.5, 1.0, 1.0), &Point3::new(-0.5, 5.0, -5.0));
        assert!(d.abs() < 1e-10);
    }

    #[test]
    fn open_boundary_uses_raw_distance() {
        let boundary = Boundary::open(1000.0).unwrap();
        let d = boundary.distance(&Point3::origin(), &Point3::new(30.0, 40.0, 0.0));
        assert_eq!(d, 50.0);
        assert_eq!(boundary.volume(), 1000.0);
        assert!(boundary.box_lengths().is_none());
    }

    #[test]
    fn periodic_volume_is_determinant_of_basis() {
        let boundary = Boundary::orthorhombic(2.0, 3.0, 4.0).unwrap();
        assert!((boundary.volume() - 24.0).abs() < 1e-12);
        assert_eq!(boundary.box_lengths(), Some([2.0, 3.0, 4.0]));
    }

    #[test]
    fn singular_basis_is_rejected() {
        let basis = Matrix3::new(1.0, 2.0, 0.0, 2.0, 4.0, 0.0, 0.0, 0.0, 1.0);
        assert!(matches!(
            Boundary::periodic(basis),
            Err(ModelError::InvalidBoundary(_))
        ));
    }

    #[test]
    fn non_positive_open_volume_is_rejected() {
        assert!(Boundary::open(0.0).is_err());
        assert!(Boundary::open(f64::NAN).is_err());
    }
}
