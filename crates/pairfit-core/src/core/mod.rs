//! # Core Module
//!
//! Stateless building blocks shared by every constraint.
//!
//! - **System Description** ([`models`]) - Elements, boundaries and atomic configurations
//! - **Pair Counting** ([`histogram`]) - Distance bins, per-pair histograms and the
//!   full/partial binning kernel
//! - **Weighting** ([`weighting`]) - Element properties and normalized pair weights
//! - **Observables** ([`transform`]) - Experimental data, radial grids, `G(r)`/`S(Q)`
//!   evaluation, scale factor fitting, smoothing and shape-function corrections

pub mod histogram;
pub mod models;
pub mod transform;
pub mod weighting;
