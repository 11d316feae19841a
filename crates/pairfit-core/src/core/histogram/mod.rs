//! # Pair Histograms
//!
//! Distance binning for the pair-correlation constraints. [`bins::BinSpec`] fixes the
//! distance grid, [`table::PairHistogram`] stores intra- and intermolecular counts per
//! element pair, and [`kernel::HistogramKernel`] fills them for a whole configuration
//! or for the pairs anchored on a moving subset of atoms.

pub mod bins;
pub mod kernel;
pub mod table;
