//! # pairfit
//!
//! Incremental pair-correlation constraints for Reverse Monte Carlo refinement of atomic
//! configurations against measured pair distribution functions `G(r)` and total
//! structure factors `S(Q)`.
//!
//! ## Architectural Philosophy
//!
//! The library is split into two layers:
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Configuration`, `Boundary`),
//!   the pair-distance histogram kernel, element weighting, and the pure transforms that
//!   turn a histogram into an observable and compare it with data.
//!
//! - **[`engine`]: The Constraint.** The stateful [`ExperimentalConstraint`] that owns the
//!   accepted histogram and updates it through a before/after/accept/reject move
//!   transaction, so each Monte Carlo step only rebins pairs touching the moved atoms.
//!   Settings are read from TOML or built with [`ConstraintConfigBuilder`].
//!
//! [`ExperimentalConstraint`]: engine::constraint::ExperimentalConstraint
//! [`ConstraintConfigBuilder`]: engine::config::ConstraintConfigBuilder

pub mod core;
pub mod engine;
