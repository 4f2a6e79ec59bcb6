//! Crate-level tests that drive whole sessions.
//!
//! - `helpers.rs`: a recording platform and session builders
//! - `integration.rs`: phase flow, joining, combat and game over
//! - `determinism.rs`: same seed, same game

pub(crate) mod helpers;
mod integration;
