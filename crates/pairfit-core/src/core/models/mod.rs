//! # Models Module
//!
//! Read-only descriptions of the atomic system a constraint is evaluated against.
//!
//! - [`element`] - Element symbols and their dense indices
//! - [`boundary`] - Periodic (minimum-image) and open boundary geometry
//! - [`configuration`] - Coordinates, per-atom element/molecule indices, populations and
//!   the step counters maintained by the owning engine

pub mod boundary;
pub mod configuration;
pub mod element;
