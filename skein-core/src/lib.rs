//! Skein Core - Strongly-typed identifiers and configuration for Skein.
//!
//! Skein is an append-only, key-addressed log service layered on external
//! key-value stores. This crate holds the vocabulary shared by every other
//! crate: log keys, offsets, the core error type and explicit limits. It does
//! NOT talk to any store; see `skein-kv` for that.
//!
//! # Design Principles
//!
//! - **Strongly-typed values**: an [`Offset`] is never confused with a payload
//! - **Explicit limits**: every retry loop and scan has a bounded maximum
//! - **Explicit types**: use u32/u64, not usize
//! - **No unsafe code**

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;
mod limits;
mod types;

pub use error::{Error, Result};
pub use limits::Limits;
pub use types::{LogKey, Offset};
