//! Resolvers for the interaction step.
//!
//! Resolvers turn queued player choices into state changes. They are pure
//! with respect to the session: each takes the players it touches plus a
//! random source, mutates the players, and returns a description of what
//! happened for the session to announce.
//!
//! # Invariants
//!
//! - Resolvers draw from the random source in a fixed order, so a seeded
//!   session replays identically.
//! - Resolvers never talk to the platform; messaging is the session's job.
//!
//! # Available Resolvers
//!
//! - [`encounter`]: per-sector pairing of players who notice each other
//! - [`combat`]: two-way damage exchange and its narrative
//! - [`scavenge`]: item discovery for searching players

pub mod combat;
pub mod encounter;
pub mod scavenge;

pub use combat::{resolve_combat, Casualties, CombatOutcome};
pub use encounter::{pair_sector, EncounterChances, Sighting};
pub use scavenge::scavenge;
