//! Test helpers: a platform that records everything and session builders.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::GameConfig;
use crate::item::ItemCatalog;
use crate::platform::{
    ChoicePrompts, DeliveryError, Membership, MessageHandle, Messenger, Platform, Recipient,
    RoleError,
};
use crate::player::{Participant, ParticipantId};
use crate::session::GameSession;

const NAMES: [&str; 8] = [
    "Ash", "Birch", "Cedar", "Elm", "Fir", "Hazel", "Larch", "Oak",
];

// =============================================================================
// Recording platform
// =============================================================================

/// Everything the engine asked the platform to do.
#[derive(Debug, Default)]
pub struct Log {
    next_handle: u64,
    /// Channel posts in order.
    pub channel: Vec<(MessageHandle, String)>,
    /// Direct messages in order.
    pub direct: Vec<(ParticipantId, MessageHandle, String)>,
    /// Deleted messages in order.
    pub deleted: Vec<MessageHandle>,
    /// Prompts currently reporting selections, with their option count.
    pub active_prompts: BTreeMap<MessageHandle, usize>,
    /// Role holders.
    pub role: BTreeSet<ParticipantId>,
    /// Role revocations in order.
    pub revoked: Vec<ParticipantId>,
    /// Participants whose direct messages bounce.
    pub unreachable: BTreeSet<ParticipantId>,
}

impl Log {
    fn issue(&mut self) -> MessageHandle {
        self.next_handle += 1;
        MessageHandle::new(self.next_handle)
    }

    /// Channel texts in order.
    pub fn channel_texts(&self) -> Vec<&str> {
        self.channel.iter().map(|(_, text)| text.as_str()).collect()
    }

    /// Most recent channel text.
    pub fn last_channel(&self) -> Option<&str> {
        self.channel.last().map(|(_, text)| text.as_str())
    }

    /// Direct message texts to one participant, in order.
    pub fn dms_to(&self, id: ParticipantId) -> Vec<&str> {
        self.direct
            .iter()
            .filter(|(to, _, _)| *to == id)
            .map(|(_, _, text)| text.as_str())
            .collect()
    }

    /// The open prompt most recently sent to `id` by direct message.
    pub fn action_prompt_for(&self, id: ParticipantId) -> Option<(MessageHandle, usize)> {
        self.direct
            .iter()
            .rev()
            .filter(|(to, _, _)| *to == id)
            .find_map(|(_, handle, _)| {
                self.active_prompts
                    .get(handle)
                    .map(|options| (*handle, *options))
            })
    }

    /// The open prompt on a channel post, if any.
    pub fn channel_prompt(&self) -> Option<(MessageHandle, usize)> {
        self.channel.iter().rev().find_map(|(handle, _)| {
            self.active_prompts
                .get(handle)
                .map(|options| (*handle, *options))
        })
    }
}

/// Platform double implementing all three collaborator traits over one log.
#[derive(Debug, Clone, Default)]
pub struct RecordingPlatform {
    log: Arc<Mutex<Log>>,
}

impl RecordingPlatform {
    /// Fresh platform with an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the log for inspection.
    pub fn log(&self) -> MutexGuard<'_, Log> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Boxes clones of this double into a [`Platform`].
    pub fn platform(&self) -> Platform {
        Platform::new(self.clone(), self.clone(), self.clone())
    }

    /// Makes direct messages to `id` fail from now on.
    pub fn block_direct(&self, id: u64) {
        self.log().unreachable.insert(ParticipantId::new(id));
    }

    /// Gives `id` the role outside the game, as a stale member would have.
    pub fn add_member(&self, id: u64) {
        self.log().role.insert(ParticipantId::new(id));
    }
}

impl Messenger for RecordingPlatform {
    fn send_to_channel(&mut self, text: &str) -> Result<MessageHandle, DeliveryError> {
        let mut log = self.log();
        let handle = log.issue();
        log.channel.push((handle, text.to_string()));
        Ok(handle)
    }

    fn send_direct(
        &mut self,
        participant: ParticipantId,
        text: &str,
    ) -> Result<MessageHandle, DeliveryError> {
        let mut log = self.log();
        if log.unreachable.contains(&participant) {
            return Err(DeliveryError::new(
                Recipient::Participant(participant),
                "direct messages disabled",
            ));
        }
        let handle = log.issue();
        log.direct.push((participant, handle, text.to_string()));
        Ok(handle)
    }

    fn delete_message(&mut self, handle: MessageHandle) {
        self.log().deleted.push(handle);
    }
}

impl ChoicePrompts for RecordingPlatform {
    fn present_choices(&mut self, message: MessageHandle, option_count: usize) {
        self.log().active_prompts.insert(message, option_count);
    }

    fn stop_choices(&mut self, message: MessageHandle) {
        self.log().active_prompts.remove(&message);
    }
}

impl Membership for RecordingPlatform {
    fn role_mention(&self) -> String {
        "@survivors".to_string()
    }

    fn role_members(&self) -> Vec<ParticipantId> {
        self.log().role.iter().copied().collect()
    }

    fn grant_role(&mut self, participant: ParticipantId) -> Result<(), RoleError> {
        self.log().role.insert(participant);
        Ok(())
    }

    fn revoke_role(&mut self, participant: ParticipantId) -> Result<(), RoleError> {
        let mut log = self.log();
        log.role.remove(&participant);
        log.revoked.push(participant);
        Ok(())
    }
}

// =============================================================================
// Session builders
// =============================================================================

/// Default config with a fixed seed.
pub fn seeded_config(seed: u64) -> GameConfig {
    GameConfig::seeded(seed)
}

/// Config where every player notices, is noticed back, and every search
/// finds a medkit.
pub fn certain_config(seed: u64) -> GameConfig {
    GameConfig {
        notice_chance: 1.0,
        mutual_notice_chance: 1.0,
        scavenge_chance: 1.0,
        ..GameConfig::seeded(seed)
    }
}

/// A participant with a stable name derived from its id: 1 is Ash, 2 is Birch.
pub fn participant(id: u64) -> Participant {
    #[allow(clippy::cast_possible_truncation)]
    let name = NAMES[(id.saturating_sub(1) as usize) % NAMES.len()];
    Participant::new(id, name)
}

/// Builds a session over a fresh recording platform.
pub fn session_with(config: GameConfig) -> (GameSession, RecordingPlatform) {
    let platform = RecordingPlatform::new();
    let session = GameSession::new(config, ItemCatalog::default(), platform.platform())
        .expect("test config is valid");
    (session, platform)
}

/// Session with players `1..=n` joined and the game resumed, so the first
/// movement prompt is open.
pub fn started_session(n: u64, config: GameConfig) -> (GameSession, RecordingPlatform) {
    let (mut session, platform) = session_with(config);
    for id in 1..=n {
        session.join(participant(id)).expect("join before start");
    }
    session.resume_game().expect("fresh session resumes");
    (session, platform)
}

/// Picks `sector` (1-based) on the open movement prompt for every id.
pub fn move_all(session: &mut GameSession, ids: &[u64], sector: usize) {
    let prompt = session.movement_prompt().expect("movement prompt is open");
    for &id in ids {
        session
            .handle_choice(prompt, participant(id), sector - 1)
            .expect("sector choice accepted");
    }
}

/// Picks action `index` on each player's open action prompt.
pub fn act_all(session: &mut GameSession, platform: &RecordingPlatform, ids: &[u64], index: usize) {
    for &id in ids {
        let prompt = platform.log().action_prompt_for(ParticipantId::new(id));
        if let Some((handle, _)) = prompt {
            session
                .handle_choice(handle, participant(id), index)
                .expect("action choice accepted");
        }
    }
}
