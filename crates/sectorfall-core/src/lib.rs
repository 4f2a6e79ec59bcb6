//! # Sectorfall Core
//!
//! Game-session engine for Sectorfall, a survival minigame played inside a
//! chat community.
//!
//! Participants join, then every phase pick a map sector to move to and, once
//! there, decide whether to keep running, search for supplies, or fight
//! whoever they spotted. Fights and finds are announced to the channel; the
//! last player standing wins.
//!
//! ## Architecture
//!
//! - **Players and items**: [`player`], [`item`]
//! - **Resolvers**: encounter pairing, combat and scavenging ([`resolver`])
//! - **Session**: the phase state machine driving one game ([`session`])
//! - **Runtime**: the Tokio ticker and per-community registry ([`runtime`])
//! - **Platform**: trait contracts for messaging, prompts and roles ([`platform`])
//!
//! The engine is deterministic given a seed: players are kept in id order and
//! every random draw comes from one `ChaCha8Rng` per session.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sectorfall_core::{GameConfig, GameSession, ItemCatalog, Platform, SessionDriver};
//!
//! let platform = Platform::new(messenger, prompts, membership);
//! let session = GameSession::new(GameConfig::default(), ItemCatalog::default(), platform)?;
//! let mut driver = SessionDriver::new(session);
//! driver.resume()?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod item;
pub mod platform;
pub mod player;
pub mod resolver;
pub mod runtime;
pub mod session;
pub mod snapshot;

pub use config::{ConfigError, GameConfig};
pub use error::{SessionError, Transition};
pub use item::{CatalogError, Item, ItemCatalog, ItemKind};
pub use platform::{
    ChoicePrompts, DeliveryError, Membership, MessageHandle, Messenger, Platform, Recipient,
    RoleError,
};
pub use player::{Participant, ParticipantId, Player, PlayerAction, StepFlags};
pub use runtime::{CommunityId, SessionDriver, SessionRegistry};
pub use session::{GamePhase, GameSession, SessionState};
pub use snapshot::{PlayerSnapshot, SessionSnapshot};

#[cfg(test)]
mod tests;
