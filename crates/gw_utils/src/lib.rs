//! Shared utilities for the graphwire crates.
//!
//! - [`hash`]: hash containers built on *hashbrown* with a fixed *foldhash* seed.
//! - [`IdentityMap`]: a map keyed by object identity, used by handle tables.
#![no_std]

// -----------------------------------------------------------------------------
// Modules

mod identity_map;

pub mod hash;

// -----------------------------------------------------------------------------
// Top-level exports

pub use identity_map::IdentityMap;
