//! # Observable Transform
//!
//! Turns pair histograms into the physical observables compared with experiment:
//! validated experimental data and its limits ([`data`]), real-space grids and the
//! sine transform to reciprocal space ([`grid`]), density normalisation into `g(r)`
//! and `G(r)` ([`observable`]), the scale-factor fit and window convolution
//! ([`correction`]) and the finite-size background ([`shape`]).

pub mod correction;
pub mod data;
pub mod grid;
pub mod observable;
pub mod shape;

use crate::core::histogram::kernel::HistogramError;
use crate::core::models::configuration::ModelError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransformError {
    #[error("Invalid experimental data: {0}")]
    InvalidData(String),
    #[error("Invalid grid: {0}")]
    InvalidGrid(String),
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("Length mismatch: {what} has {found} entries, expected {expected}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("Numerically degenerate: {0}")]
    Degenerate(String),
    #[error("Histogram error: {0}")]
    Histogram(#[from] HistogramError),
    #[error("Model error: {0}")]
    Model(#[from] ModelError),
}
