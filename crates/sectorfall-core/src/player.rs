//! Player model: participant identity, queued actions and step-scoped flags.
//!
//! A [`Player`] is owned by exactly one [`GameSession`](crate::session::GameSession).
//! Its `found_player` link is a weak reference expressed as a [`ParticipantId`]:
//! the target may have been removed from the session since the link was made,
//! so every reader must look the id up again.
//!
//! # Step-scoped state
//!
//! `found_player` and the [`StepFlags`] are only meaningful for one interaction
//! step. [`Player::clear_step_flags`] is called at the start of every
//! interaction step, before pairing.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::item::Item;
use crate::platform::MessageHandle;

/// Health every player starts with unless the config overrides it.
pub const DEFAULT_STARTING_HEALTH: i32 = 15;

/// Unique identifier of a chat participant.
///
/// Ordered by numeric value; the session stores players in a `BTreeMap`
/// keyed by this id so iteration order is stable.
///
/// # Example
///
/// ```
/// use sectorfall_core::player::ParticipantId;
///
/// let a = ParticipantId::new(1);
/// let b = ParticipantId::new(2);
/// assert!(a < b);
/// assert_eq!(b.as_u64(), 2);
/// ```
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParticipantId(u64);

impl ParticipantId {
    /// Creates a new `ParticipantId` from a raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParticipantId({})", self.0)
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ParticipantId {
    fn from(id: u64) -> Self {
        Self::new(id)
    }
}

/// A chat participant as seen by the platform: id plus display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Participant {
    /// Platform identifier.
    pub id: ParticipantId,
    /// Name used in narratives and prompts.
    pub name: String,
}

impl Participant {
    /// Creates a participant.
    #[must_use]
    pub fn new(id: impl Into<ParticipantId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// The action a player queued for the current interaction step.
///
/// The discriminant order matches the action prompt's option order.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerAction {
    /// Keep moving. Takes less damage, deals much less.
    #[default]
    Run,
    /// Search for supplies. Takes more damage, deals less.
    Search,
    /// Fight the player this one found.
    Attack,
}

/// Damage taken multiplier while running.
pub const DAMAGE_TAKEN_WHILE_RUNNING: f64 = 0.60;
/// Damage taken multiplier while searching.
pub const DAMAGE_TAKEN_WHILE_SEARCHING: f64 = 1.20;
/// Damage dealt multiplier while running.
pub const DAMAGE_DEALT_WHILE_RUNNING: f64 = 0.40;
/// Damage dealt multiplier while searching.
pub const DAMAGE_DEALT_WHILE_SEARCHING: f64 = 0.60;

impl PlayerAction {
    /// Maps an action-prompt option index to an action.
    #[must_use]
    pub const fn from_choice(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Run),
            1 => Some(Self::Search),
            2 => Some(Self::Attack),
            _ => None,
        }
    }

    /// Multiplier applied to damage this player takes.
    #[must_use]
    pub const fn damage_taken_multiplier(self) -> f64 {
        match self {
            Self::Run => DAMAGE_TAKEN_WHILE_RUNNING,
            Self::Search => DAMAGE_TAKEN_WHILE_SEARCHING,
            Self::Attack => 1.0,
        }
    }

    /// Multiplier applied to damage this player deals.
    #[must_use]
    pub const fn damage_dealt_multiplier(self) -> f64 {
        match self {
            Self::Run => DAMAGE_DEALT_WHILE_RUNNING,
            Self::Search => DAMAGE_DEALT_WHILE_SEARCHING,
            Self::Attack => 1.0,
        }
    }
}

impl fmt::Display for PlayerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Run => write!(f, "run"),
            Self::Search => write!(f, "search"),
            Self::Attack => write!(f, "attack"),
        }
    }
}

bitflags! {
    /// Flags that live for a single interaction step.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct StepFlags: u8 {
        /// Took part in a fight this step.
        const WAS_IN_COMBAT = 1 << 0;
        /// Health dropped to zero or below this step.
        const DIED_LAST_PHASE = 1 << 1;
        /// Picked up a medkit while scavenging this step.
        const FOUND_MEDKIT = 1 << 2;
    }
}

/// Per-participant game state.
#[derive(Debug, Clone)]
pub struct Player {
    participant: Participant,
    /// Current health. May go negative before the player is considered dead.
    pub health: i32,
    /// Sector the player is in, 1-based.
    pub current_sector: u32,
    /// Sector the player chose to move to, 1-based.
    pub next_sector: u32,
    /// Action queued for the current interaction step.
    pub next_action: PlayerAction,
    /// Player spotted during the current interaction step, if any.
    pub found_player: Option<ParticipantId>,
    /// Step-scoped flags.
    pub flags: StepFlags,
    items: Vec<Arc<Item>>,
    pub(crate) action_prompt: Option<MessageHandle>,
    pub(crate) status_message: Option<MessageHandle>,
}

impl Player {
    /// Creates a player in sector 1 with the given starting health.
    #[must_use]
    pub fn new(participant: Participant, starting_health: i32) -> Self {
        Self {
            participant,
            health: starting_health,
            current_sector: 1,
            next_sector: 1,
            next_action: PlayerAction::Run,
            found_player: None,
            flags: StepFlags::empty(),
            items: Vec::new(),
            action_prompt: None,
            status_message: None,
        }
    }

    /// Returns the participant id.
    #[must_use]
    pub fn id(&self) -> ParticipantId {
        self.participant.id
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.participant.name
    }

    /// Returns true while health is above zero.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    /// Returns true if the player fought this step.
    #[must_use]
    pub fn was_in_combat(&self) -> bool {
        self.flags.contains(StepFlags::WAS_IN_COMBAT)
    }

    /// Returns true if the player died this step.
    #[must_use]
    pub fn died_last_phase(&self) -> bool {
        self.flags.contains(StepFlags::DIED_LAST_PHASE)
    }

    /// Returns true if the player found a medkit this step.
    #[must_use]
    pub fn found_medkit(&self) -> bool {
        self.flags.contains(StepFlags::FOUND_MEDKIT)
    }

    /// Equipped items, in equip order.
    #[must_use]
    pub fn items(&self) -> &[Arc<Item>] {
        &self.items
    }

    /// Grants an item: fires its pickup effect and equips it if it is passive.
    pub fn grant_item(&mut self, item: Arc<Item>) {
        item.on_pickup(self);
        if item.is_equippable() {
            self.items.push(item);
        }
    }

    /// Resets everything that only lives for one interaction step.
    pub fn clear_step_flags(&mut self) {
        self.next_action = PlayerAction::Run;
        self.found_player = None;
        self.flags = StepFlags::empty();
    }

    /// Moves the player to the sector they queued. Returns true if they moved.
    pub fn apply_move(&mut self) -> bool {
        if self.current_sector == self.next_sector {
            false
        } else {
            self.current_sector = self.next_sector;
            true
        }
    }
}
