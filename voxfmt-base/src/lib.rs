//! This library is an internal component of [`voxfmt`],
//! which defines the integer grid geometry and color types shared by every codec.
//! Prefer depending on [`voxfmt`], which re-exports everything here.
//!
//! [`voxfmt`]: https://crates.io/crates/voxfmt/

#![no_std]
// Crate-specific lint settings. (General settings can be found in the workspace manifest.)
#![forbid(unsafe_code)]
#![cfg_attr(
    not(test),
    warn(clippy::std_instead_of_core, clippy::std_instead_of_alloc)
)]

#[cfg(test)]
#[macro_use]
extern crate std;

/// Grid coordinates, regions and colors.
pub mod math;

// reexport for convenience of our dependents and tests
#[doc(hidden)]
pub use euclid;
