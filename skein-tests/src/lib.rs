//! Skein Tests - Deterministic Simulation Testing for Skein.
//!
//! This crate holds the history checker and the multi-node simulation tests.
//! Unit tests stay inline in each crate; end-to-end protocol tests live in
//! `skein-node/tests`.
//!
//! ## Test Organization
//!
//! **DST Tests** (`*_dst.rs`): Deterministic simulation with fault injection
//! - `log_dst`: several log services over shared simulated stores
//!
//! **Support Modules**:
//! - `history`: operation recording with logical timestamps
//! - `verification`: property checks over a recorded history
//! - `scenarios`: reusable cluster shapes, key sets, faults and seeds
//!
//! ## Naming Conventions
//!
//! - DST tests: `test_dst_<component>_<scenario>`
//! - Unit tests: `test_<scenario>`, inline under `#[cfg(test)]`

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod history;
pub mod scenarios;
pub mod verification;

// DST test modules (deterministic simulation with fault injection).
#[cfg(test)]
mod log_dst;
