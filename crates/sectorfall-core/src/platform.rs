//! Contracts for the chat-platform collaborators the engine drives.
//!
//! The engine never talks to a chat service directly. It sends text through a
//! [`Messenger`], attaches option prompts with [`ChoicePrompts`], and manages
//! the game role through [`Membership`]. Choice events flow back in through
//! [`GameSession::handle_choice`](crate::session::GameSession::handle_choice).
//!
//! All collaborators are `Send` so a session can be moved onto the ticker task.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::player::ParticipantId;

/// Opaque handle to a message the platform delivered.
///
/// The platform picks the values; the engine only stores and returns them.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageHandle(u64);

impl MessageHandle {
    /// Wraps a platform message id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the platform message id.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

/// Where a message was headed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Recipient {
    /// The shared game channel.
    Channel,
    /// A direct message to one participant.
    Participant(ParticipantId),
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Channel => write!(f, "the game channel"),
            Self::Participant(id) => write!(f, "participant {id}"),
        }
    }
}

/// A message could not be delivered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("could not deliver message to {recipient}: {reason}")]
pub struct DeliveryError {
    /// Intended recipient.
    pub recipient: Recipient,
    /// Platform-supplied reason.
    pub reason: String,
}

impl DeliveryError {
    /// Creates a delivery error.
    #[must_use]
    pub fn new(recipient: Recipient, reason: impl Into<String>) -> Self {
        Self {
            recipient,
            reason: reason.into(),
        }
    }
}

/// The game role could not be granted or revoked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("role update for participant {participant} failed: {reason}")]
pub struct RoleError {
    /// Participant whose role was being changed.
    pub participant: ParticipantId,
    /// Platform-supplied reason.
    pub reason: String,
}

/// Outbound messaging.
pub trait Messenger: Send {
    /// Posts to the shared game channel.
    ///
    /// # Errors
    ///
    /// Returns a [`DeliveryError`] if the channel rejects the message.
    fn send_to_channel(&mut self, text: &str) -> Result<MessageHandle, DeliveryError>;

    /// Sends a direct message to one participant.
    ///
    /// # Errors
    ///
    /// Returns a [`DeliveryError`] if the participant cannot receive direct
    /// messages. The engine treats this as permanent for the session.
    fn send_direct(
        &mut self,
        participant: ParticipantId,
        text: &str,
    ) -> Result<MessageHandle, DeliveryError>;

    /// Deletes a previously delivered message. Unknown handles are ignored.
    fn delete_message(&mut self, handle: MessageHandle);
}

/// Option prompts attached to delivered messages.
///
/// After `present_choices`, the platform reports every selection to the
/// engine until `stop_choices` is called for the same message.
pub trait ChoicePrompts: Send {
    /// Attaches `option_count` options to `message`.
    fn present_choices(&mut self, message: MessageHandle, option_count: usize);

    /// Stops reporting selections for `message`.
    fn stop_choices(&mut self, message: MessageHandle);
}

/// Holders of the game role.
pub trait Membership: Send {
    /// Text that mentions everyone holding the role.
    fn role_mention(&self) -> String;

    /// Participants currently holding the role.
    fn role_members(&self) -> Vec<ParticipantId>;

    /// Gives the role to a participant.
    ///
    /// # Errors
    ///
    /// Returns a [`RoleError`] if the platform refuses.
    fn grant_role(&mut self, participant: ParticipantId) -> Result<(), RoleError>;

    /// Takes the role from a participant.
    ///
    /// # Errors
    ///
    /// Returns a [`RoleError`] if the platform refuses.
    fn revoke_role(&mut self, participant: ParticipantId) -> Result<(), RoleError>;
}

/// The collaborators a session drives, boxed so sessions are not generic.
pub struct Platform {
    /// Outbound messaging.
    pub messenger: Box<dyn Messenger>,
    /// Option prompts.
    pub prompts: Box<dyn ChoicePrompts>,
    /// Role management.
    pub membership: Box<dyn Membership>,
}

impl Platform {
    /// Bundles three collaborators.
    pub fn new(
        messenger: impl Messenger + 'static,
        prompts: impl ChoicePrompts + 'static,
        membership: impl Membership + 'static,
    ) -> Self {
        Self {
            messenger: Box::new(messenger),
            prompts: Box::new(prompts),
            membership: Box::new(membership),
        }
    }

    /// Stops a prompt and deletes its message.
    pub(crate) fn retract_prompt(&mut self, message: MessageHandle) {
        self.prompts.stop_choices(message);
        self.messenger.delete_message(message);
    }
}

impl fmt::Debug for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Platform").finish_non_exhaustive()
    }
}
