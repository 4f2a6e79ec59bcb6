//! Game session: the phase state machine and per-tick orchestration.
//!
//! A [`GameSession`] owns one community's players, configuration, random
//! source and platform collaborators. It is driven by [`GameSession::tick`],
//! normally from the [`SessionDriver`](crate::runtime::SessionDriver) ticker.
//!
//! # States
//!
//! ```text
//! NotStarted ──resume──▶ InProgress ◀──resume── Paused
//!                            │  └──────pause──────▶│
//!                            └──game over──▶ Complete
//! ```
//!
//! # Phases
//!
//! While in progress the phase alternates Movement, Interaction, Movement, ...
//! A fresh session reports `Interaction` so that its first tick opens the
//! welcome Movement phase, during which participants may still join.
//!
//! Each tick:
//!
//! - **Movement, fewer than two players**: nothing happens.
//! - **Movement → Interaction**: prune idle role members on the first pass,
//!   reset step flags, apply queued moves, pair every sector, prompt every
//!   living player for an action.
//! - **Interaction → Movement**: resolve fights and searches, announce them,
//!   send status updates, then either end the game (one or zero survivors)
//!   or prompt for movement.
//!
//! # Determinism
//!
//! Players live in a `BTreeMap`, so with a fixed `seed` every random draw
//! happens in the same order and a session replays identically.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{ConfigError, GameConfig};
use crate::error::{SessionError, Transition};
use crate::item::ItemCatalog;
use crate::platform::{DeliveryError, MessageHandle, Platform};
use crate::player::{Participant, ParticipantId, Player, PlayerAction};
use crate::resolver::{combat, encounter, scavenge, EncounterChances};
use crate::snapshot::{PlayerSnapshot, SessionSnapshot};

const WELCOME_MESSAGE: &str = "Welcome to the games!";

/// Lifecycle state of a session.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    /// Created, never resumed.
    NotStarted,
    /// Ticking.
    InProgress,
    /// Ticking suspended.
    Paused,
    /// Game over. Terminal.
    Complete,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not started"),
            Self::InProgress => write!(f, "in progress"),
            Self::Paused => write!(f, "paused"),
            Self::Complete => write!(f, "complete"),
        }
    }
}

/// Phase within an in-progress game.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GamePhase {
    /// Players pick the sector to move to.
    Movement,
    /// Players pick what to do about whoever they spotted.
    Interaction,
}

impl GamePhase {
    /// The phase that follows this one.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::Movement => Self::Interaction,
            Self::Interaction => Self::Movement,
        }
    }
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Movement => write!(f, "movement"),
            Self::Interaction => write!(f, "interaction"),
        }
    }
}

/// One community's game.
#[derive(Debug)]
pub struct GameSession {
    config: GameConfig,
    catalog: ItemCatalog,
    platform: Platform,
    rng: ChaCha8Rng,
    state: SessionState,
    phase: GamePhase,
    is_first_movement_phase: bool,
    players: BTreeMap<ParticipantId, Player>,
    movement_prompt: Option<MessageHandle>,
}

impl GameSession {
    /// Creates a session that has not started yet.
    ///
    /// # Errors
    ///
    /// Returns the [`ConfigError`] if `config` does not validate.
    pub fn new(
        config: GameConfig,
        catalog: ItemCatalog,
        platform: Platform,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            rng: config.rng(),
            config,
            catalog,
            platform,
            state: SessionState::NotStarted,
            phase: GamePhase::Interaction,
            is_first_movement_phase: true,
            players: BTreeMap::new(),
            movement_prompt: None,
        })
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    /// True until the first Movement phase has been left.
    #[must_use]
    pub fn is_first_movement_phase(&self) -> bool {
        self.is_first_movement_phase
    }

    /// Session configuration.
    #[must_use]
    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Number of map sectors.
    #[must_use]
    pub fn num_sectors(&self) -> u32 {
        self.config.num_sectors
    }

    /// Time between ticks.
    #[must_use]
    pub fn phase_period(&self) -> Duration {
        self.config.phase_period()
    }

    /// All players, dead or alive, in id order.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// Looks up one player.
    #[must_use]
    pub fn player(&self, id: ParticipantId) -> Option<&Player> {
        self.players.get(&id)
    }

    /// Number of players, including dead ones.
    #[must_use]
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Number of players with health above zero.
    #[must_use]
    pub fn living_count(&self) -> usize {
        self.players.values().filter(|p| p.is_alive()).count()
    }

    /// The active movement prompt, if one is up.
    #[must_use]
    pub fn movement_prompt(&self) -> Option<MessageHandle> {
        self.movement_prompt
    }

    #[cfg(test)]
    pub(crate) fn player_mut(&mut self, id: ParticipantId) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    /// Serializable view of the session for debugging and tests.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            phase: self.phase,
            num_sectors: self.config.num_sectors,
            phase_period_secs: self.config.phase_period_secs,
            is_first_movement_phase: self.is_first_movement_phase,
            players: self.players.values().map(PlayerSnapshot::from).collect(),
        }
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Adds a participant to the game.
    ///
    /// Allowed before the game starts and, when `allow_late_join` is set,
    /// until the first Movement phase ends. The participant is greeted by
    /// direct message and given the game role.
    ///
    /// # Errors
    ///
    /// - [`SessionError::JoinsClosed`] once joining is no longer possible
    /// - [`SessionError::AlreadyJoined`] for an existing player
    /// - [`SessionError::Delivery`] if the greeting could not be delivered; the
    ///   participant has been removed again and the channel told why
    pub fn join(&mut self, participant: Participant) -> Result<(), SessionError> {
        let joins_open = match self.state {
            SessionState::Complete => false,
            SessionState::NotStarted => self.is_first_movement_phase,
            SessionState::InProgress | SessionState::Paused => {
                self.is_first_movement_phase && self.config.allow_late_join
            }
        };
        if !joins_open {
            return Err(SessionError::JoinsClosed);
        }
        let id = participant.id;
        if self.players.contains_key(&id) {
            return Err(SessionError::AlreadyJoined(id));
        }

        self.players
            .insert(id, Player::new(participant, self.config.starting_health));

        if let Err(err) = self.platform.messenger.send_direct(id, WELCOME_MESSAGE) {
            self.remove_unreachable(id, &err);
            return Err(err.into());
        }
        if let Err(err) = self.platform.membership.grant_role(id) {
            warn!(participant = %id, %err, "could not grant game role");
        }

        info!(participant = %id, players = self.players.len(), "participant joined");
        Ok(())
    }

    /// Starts or resumes the game and runs one tick immediately.
    ///
    /// The recurring timer is owned by the runtime driver, which starts it
    /// after this returns.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidTransition`] if the game is complete or already
    /// in progress.
    pub fn resume_game(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Complete | SessionState::InProgress => {
                Err(SessionError::InvalidTransition {
                    action: Transition::Resume,
                    state: self.state,
                })
            }
            SessionState::NotStarted | SessionState::Paused => {
                info!(from = %self.state, phase = %self.phase, "resuming game");
                self.state = SessionState::InProgress;
                self.tick();
                Ok(())
            }
        }
    }

    /// Pauses the game.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidTransition`] if the game is complete, already
    /// paused, or has not started.
    pub fn pause_game(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Complete | SessionState::Paused | SessionState::NotStarted => {
                Err(SessionError::InvalidTransition {
                    action: Transition::Pause,
                    state: self.state,
                })
            }
            SessionState::InProgress => {
                info!(phase = %self.phase, "pausing game");
                self.state = SessionState::Paused;
                Ok(())
            }
        }
    }

    /// Advances the game by one phase.
    ///
    /// Does nothing unless the game is in progress, and does nothing while
    /// fewer than two players are waiting in a Movement phase.
    pub fn tick(&mut self) {
        if self.state != SessionState::InProgress {
            debug!(state = %self.state, "tick ignored");
            return;
        }
        if self.players.len() < 2 && self.phase == GamePhase::Movement {
            debug!(players = self.players.len(), "waiting for players");
            return;
        }

        if self.phase == GamePhase::Movement && self.is_first_movement_phase {
            self.prune_idle_members();
        }

        self.advance_phase();
        debug!(phase = %self.phase, "phase advanced");

        match self.phase {
            GamePhase::Movement => {
                if !self.is_first_movement_phase {
                    self.run_player_interactions();
                    if self.check_game_over() {
                        return;
                    }
                }
                self.send_movement_prompt();
            }
            GamePhase::Interaction => self.send_interaction_prompts(),
        }
    }

    /// Handles a selection reported by the choice-prompt collaborator.
    ///
    /// On the movement prompt, option `i` queues a move to sector `i + 1`; a
    /// non-player is admitted first if joins are still open. On a player's own
    /// action prompt, options map to run, search and attack. Selections on
    /// stale prompts or out of range are ignored.
    ///
    /// # Errors
    ///
    /// The [`join`](Self::join) errors when a non-player picks a sector.
    pub fn handle_choice(
        &mut self,
        message: MessageHandle,
        participant: Participant,
        index: usize,
    ) -> Result<(), SessionError> {
        if self.state == SessionState::Complete {
            return Ok(());
        }
        if self.movement_prompt == Some(message) {
            return self.choose_sector(participant, index);
        }

        let id = participant.id;
        let Some(player) = self.players.get_mut(&id) else {
            return Ok(());
        };
        if player.action_prompt != Some(message) {
            debug!(participant = %id, "selection on stale prompt ignored");
            return Ok(());
        }
        match PlayerAction::from_choice(index) {
            Some(PlayerAction::Attack) if player.found_player.is_none() => {
                debug!(participant = %id, "attack chosen with nobody in sight");
            }
            Some(action) => {
                debug!(participant = %id, %action, "action queued");
                player.next_action = action;
            }
            None => debug!(participant = %id, index, "action index out of range"),
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Phase steps
    // -------------------------------------------------------------------------

    fn advance_phase(&mut self) {
        if self.phase == GamePhase::Movement {
            self.is_first_movement_phase = false;
        }
        self.phase = self.phase.next();
    }

    fn choose_sector(
        &mut self,
        participant: Participant,
        index: usize,
    ) -> Result<(), SessionError> {
        let sector = u32::try_from(index)
            .ok()
            .and_then(|i| i.checked_add(1))
            .filter(|s| *s <= self.config.num_sectors);
        let Some(sector) = sector else {
            debug!(index, "sector index out of range");
            return Ok(());
        };

        let id = participant.id;
        if !self.players.contains_key(&id) {
            self.join(participant)?;
        }
        if let Some(player) = self.players.get_mut(&id) {
            player.next_sector = sector;
        }
        Ok(())
    }

    fn prune_idle_members(&mut self) {
        for member in self.platform.membership.role_members() {
            if self.players.contains_key(&member) {
                continue;
            }
            match self.platform.membership.revoke_role(member) {
                Ok(()) => debug!(participant = %member, "pruned idle role member"),
                Err(err) => warn!(participant = %member, %err, "could not prune role member"),
            }
        }
    }

    fn send_movement_prompt(&mut self) {
        self.retract_movement_prompt();

        let mut text = format!(
            "{}, please select a sector to move to.",
            self.platform.membership.role_mention()
        );
        if self.is_first_movement_phase {
            text = format!("Welcome to the games! {text}");
        }

        match self.platform.messenger.send_to_channel(&text) {
            Ok(handle) => {
                self.platform
                    .prompts
                    .present_choices(handle, self.config.num_sectors as usize);
                self.movement_prompt = Some(handle);
            }
            Err(err) => warn!(%err, "could not post movement prompt"),
        }
    }

    /// Queued moves are applied before pairing, so sightings use the sectors
    /// players just picked.
    fn send_interaction_prompts(&mut self) {
        self.retract_movement_prompt();

        let mut moved = BTreeMap::new();
        for player in self.players.values_mut() {
            if let Some(handle) = player.status_message.take() {
                self.platform.messenger.delete_message(handle);
            }
            if let Some(handle) = player.action_prompt.take() {
                self.platform.retract_prompt(handle);
            }
            player.clear_step_flags();
            if player.is_alive() {
                moved.insert(player.id(), player.apply_move());
            }
        }

        self.pair_all_sectors();

        let mut pending: Vec<ParticipantId> = moved.keys().copied().collect();
        while !pending.is_empty() {
            let mut unreachable = Vec::new();
            for id in pending.drain(..) {
                let arrived = moved.get(&id).copied().unwrap_or(false);
                if let Err(err) = self.send_action_prompt(id, arrived) {
                    unreachable.push((id, err));
                }
            }
            // Anyone who spotted a removed player is prompted again without the fight.
            for (id, err) in unreachable {
                for partner in self.remove_unreachable(id, &err) {
                    if !pending.contains(&partner) {
                        pending.push(partner);
                    }
                }
            }
        }
    }

    /// Replaces `id`'s action prompt with a fresh one.
    fn send_action_prompt(
        &mut self,
        id: ParticipantId,
        arrived: bool,
    ) -> Result<(), DeliveryError> {
        let Some(player) = self.players.get(&id) else {
            return Ok(());
        };
        let text = self.interaction_prompt_text(player, arrived);
        let options = if player.found_player.is_some() { 3 } else { 2 };

        if let Some(handle) = self.players.get_mut(&id).and_then(|p| p.action_prompt.take()) {
            self.platform.retract_prompt(handle);
        }
        let handle = self.platform.messenger.send_direct(id, &text)?;
        self.platform.prompts.present_choices(handle, options);
        if let Some(player) = self.players.get_mut(&id) {
            player.action_prompt = Some(handle);
        }
        Ok(())
    }

    fn pair_all_sectors(&mut self) {
        let chances = EncounterChances {
            notice: self.config.notice_chance,
            mutual: self.config.mutual_notice_chance,
        };

        for sector in 1..=self.config.num_sectors {
            let pool: Vec<ParticipantId> = self
                .players
                .values()
                .filter(|p| p.is_alive() && p.current_sector == sector)
                .map(Player::id)
                .collect();

            for sighting in encounter::pair_sector(&pool, chances, &mut self.rng) {
                if let Some(finder) = self.players.get_mut(&sighting.finder) {
                    finder.found_player = Some(sighting.target);
                }
                if sighting.mutual {
                    if let Some(target) = self.players.get_mut(&sighting.target) {
                        target.found_player = Some(sighting.finder);
                    }
                }
                debug!(
                    sector,
                    finder = %sighting.finder,
                    target = %sighting.target,
                    mutual = sighting.mutual,
                    "sighting"
                );
            }
        }
    }

    fn interaction_prompt_text(&self, player: &Player, arrived: bool) -> String {
        let mut lines = Vec::with_capacity(7);
        lines.push(if arrived {
            format!("You've arrived in sector {}.", player.current_sector)
        } else {
            format!("You're still in sector {}.", player.current_sector)
        });
        lines.push(format!("Your health is {}.", player.health));

        let spotted = player.found_player.and_then(|id| self.players.get(&id));
        match spotted {
            Some(other) => {
                let mut line = format!("You see {} in the distance.", other.name());
                if other.found_player != Some(player.id()) {
                    line.push_str(" It doesn't look like they see you.");
                }
                lines.push(line);
            }
            None => lines.push("You don't think anyone's around.".to_string()),
        }

        lines.push("What will you do?".to_string());
        lines.push("🏃 keep moving".to_string());
        lines.push("🔎 search for supplies".to_string());
        if spotted.is_some() {
            lines.push("🤜 fight".to_string());
        }
        lines.join("\n")
    }

    fn run_player_interactions(&mut self) {
        for player in self.players.values_mut() {
            if let Some(handle) = player.action_prompt.take() {
                self.platform.retract_prompt(handle);
            }
        }

        let mut narrative = Vec::new();

        let attackers: Vec<ParticipantId> = self
            .players
            .values()
            .filter(|p| p.is_alive() && p.next_action == PlayerAction::Attack)
            .map(Player::id)
            .collect();
        for id in attackers {
            if let Some(outcome) = self.fight(id) {
                narrative.push(outcome.narrative);
            }
        }

        let searchers: Vec<ParticipantId> = self
            .players
            .values()
            .filter(|p| {
                p.is_alive() && p.next_action == PlayerAction::Search && !p.was_in_combat()
            })
            .map(Player::id)
            .collect();
        for id in searchers {
            let Some(player) = self.players.get_mut(&id) else {
                continue;
            };
            if let Some(item) = scavenge::scavenge(
                player,
                &self.catalog,
                self.config.scavenge_chance,
                &mut self.rng,
            ) {
                info!(participant = %id, item = item.name(), "item found");
                narrative.push(scavenge::find_narrative(player, &item));
            }
        }

        if !narrative.is_empty() {
            if let Err(err) = self.platform.messenger.send_to_channel(&narrative.join("\n")) {
                warn!(%err, "could not announce interaction results");
            }
        }

        self.send_status_updates();
    }

    /// Runs the fight `id` queued, if it can still happen.
    fn fight(&mut self, id: ParticipantId) -> Option<combat::CombatOutcome> {
        let attacker = self.players.get(&id)?;
        if attacker.was_in_combat() {
            return None;
        }
        let target_id = attacker.found_player?;
        if target_id == id || !self.players.get(&target_id).is_some_and(Player::is_alive) {
            debug!(participant = %id, "attack target gone");
            return None;
        }

        let mut attacker = self.players.remove(&id)?;
        let Some(mut target) = self.players.remove(&target_id) else {
            self.players.insert(id, attacker);
            return None;
        };

        let outcome = combat::resolve_combat(&mut attacker, &mut target, &mut self.rng);
        info!(
            attacker = %id,
            target = %target_id,
            damage_to_attacker = outcome.damage_to_attacker,
            damage_to_target = outcome.damage_to_target,
            casualties = ?outcome.casualties,
            "combat resolved"
        );

        self.players.insert(id, attacker);
        self.players.insert(target_id, target);
        Some(outcome)
    }

    fn send_status_updates(&mut self) {
        let updates: Vec<(ParticipantId, String)> = self
            .players
            .values()
            .filter(|p| p.is_alive() || p.died_last_phase())
            .map(|p| {
                let text = if p.died_last_phase() {
                    "You died.".to_string()
                } else {
                    format!(
                        "You are in sector {}.\nYour health is {}.",
                        p.current_sector, p.health
                    )
                };
                (p.id(), text)
            })
            .collect();

        let mut unreachable = Vec::new();
        for (id, text) in updates {
            match self.platform.messenger.send_direct(id, &text) {
                Ok(handle) => {
                    if let Some(player) = self.players.get_mut(&id) {
                        player.status_message = Some(handle);
                    }
                }
                Err(err) => unreachable.push((id, err)),
            }
        }
        for (id, err) in unreachable {
            self.remove_unreachable(id, &err);
        }
    }

    fn check_game_over(&mut self) -> bool {
        let mut living = self.players.values().filter(|p| p.is_alive());
        let winner = living.next();
        if living.next().is_some() {
            return false;
        }

        let summary = match winner {
            Some(winner) => format!("Game over!\n{} came out on top!", winner.name()),
            None => "Game over!\nThere were no survivors.".to_string(),
        };
        info!(winner = ?winner.map(Player::id), "game over");

        if let Err(err) = self.platform.messenger.send_to_channel(&summary) {
            warn!(%err, "could not announce game over");
        }
        self.retract_movement_prompt();
        self.state = SessionState::Complete;
        true
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    fn retract_movement_prompt(&mut self) {
        if let Some(handle) = self.movement_prompt.take() {
            self.platform.retract_prompt(handle);
        }
    }

    /// Drops a participant who cannot receive direct messages.
    /// Drops a participant who cannot receive direct messages.
    ///
    /// Returns the players who had already been prompted while their sighting
    /// pointed at the removed participant; their links are cleared.
    fn remove_unreachable(
        &mut self,
        id: ParticipantId,
        err: &DeliveryError,
    ) -> Vec<ParticipantId> {
        let Some(mut player) = self.players.remove(&id) else {
            return Vec::new();
        };
        warn!(participant = %id, %err, "removing unreachable participant");

        let mut stale = Vec::new();
        for other in self.players.values_mut() {
            if other.found_player == Some(id) {
                other.found_player = None;
                if other.action_prompt.is_some() {
                    stale.push(other.id());
                }
            }
        }

        if let Some(handle) = player.action_prompt.take() {
            self.platform.retract_prompt(handle);
        }
        if let Some(handle) = player.status_message.take() {
            self.platform.messenger.delete_message(handle);
        }
        if let Err(err) = self.platform.membership.revoke_role(id) {
            warn!(participant = %id, %err, "could not revoke game role");
        }

        let notice = format!(
            "{}, I can't send you direct messages, so you have been removed from this game. \
             Allow direct messages to take part.",
            player.name()
        );
        if let Err(err) = self.platform.messenger.send_to_channel(&notice) {
            warn!(%err, "could not announce removal");
        }
        stale
    }
}
