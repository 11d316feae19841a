use super::kernel::HistogramError;

/// Uniform distance binning over `[min, max)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinSpec {
    min: f64,
    max: f64,
    width: f64,
    size: usize,
}

impl BinSpec {
    pub fn new(min: f64, max: f64, width: f64) -> Result<Self, HistogramError> {
        if !(min.is_finite() && max.is_finite() && width.is_finite()) {
            return Err(HistogramError::InvalidBins(format!(
                "non-finite bin parameters (min={min}, max={max}, width={width})"
            )));
        }
        if width <= 0.0 {
            return Err(HistogramError::InvalidBins(format!(
                "bin width must be positive, got {width}"
            )));
        }
        if max <= min {
            return Err(HistogramError::InvalidBins(format!(
                "maximum distance {max} must exceed minimum distance {min}"
            )));
        }
        let size = ((max - min) / width).round() as usize;
        if size == 0 {
            return Err(HistogramError::InvalidBins(format!(
                "range [{min}, {max}) holds no bin of width {width}"
            )));
        }
        Ok(Self {
            min,
            max,
            width,
            size,
        })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Bin holding `distance`, or `None` if it falls outside the range.
    #[inline]
    pub fn locate(&self, distance: f64) -> Option<usize> {
        if distance < self.min || distance >= self.max {
            return None;
        }
        let bin = ((distance - self.min) / self.width).floor() as usize;
        (bin < self.size).then_some(bin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_derives_bin_count_from_range() {
        let bins = BinSpec::new(0.0, 1.0, 0.1).unwrap();
        assert_eq!(bins.size(), 10);
    }

    #[test]
    fn locate_maps_distances_to_bins() {
        let bins = BinSpec::new(0.0, 1.0, 0.1).unwrap();
        assert_eq!(bins.locate(0.35), Some(3));
        assert_eq!(bins.locate(0.0), Some(0));
        assert_eq!(bins.locate(0.999), Some(9));
        assert_eq!(bins.locate(1.0), None);
        assert_eq!(bins.locate(-0.01), None);
    }

    #[test]
    fn locate_honours_non_zero_minimum() {
        let bins = BinSpec::new(1.5, 3.5, 0.5).unwrap();
        assert_eq!(bins.size(), 4);
        assert_eq!(bins.locate(1.4), None);
        assert_eq!(bins.locate(2.6), Some(2));
    }

    #[test]
    fn new_rejects_degenerate_ranges() {
        assert!(BinSpec::new(0.0, 1.0, 0.0).is_err());
        assert!(BinSpec::new(1.0, 1.0, 0.1).is_err());
        assert!(BinSpec::new(0.0, f64::INFINITY, 0.1).is_err());
    }
}
