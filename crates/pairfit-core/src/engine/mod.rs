//! # Engine Module
//!
//! The stateful side of the library: an experimental constraint that keeps an accepted
//! pair histogram in sync with a configuration undergoing Monte Carlo moves.
//!
//! - **Constraint** ([`constraint`]) - Full computation, the move and amputation
//!   transactions, and the engine notifications
//! - **Observable Kinds** ([`kind`]) - `G(r)` and `S(Q)` grids and model mapping
//! - **Configuration** ([`config`]) - Constraint settings, TOML loading and the builder
//! - **State Tracking** ([`state`]) - Committed, original and staged data
//! - **Error Handling** ([`error`]) - Constraint errors and their coarse kinds
//!
//! A transaction never leaves the configuration in a trial state: candidate coordinates
//! are written through a guard that restores the originals on every exit path.

pub mod config;
pub mod constraint;
pub mod error;
pub mod kind;
pub mod state;
pub(crate) mod transaction;
