//! # Pair Weighting
//!
//! Per-element scattering properties ([`properties`]) and the population-normalised
//! weight they give every element pair ([`scheme`]).

pub mod properties;
pub mod scheme;
