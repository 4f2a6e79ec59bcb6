//! Session-level errors.

use std::fmt;

use thiserror::Error;

use crate::platform::DeliveryError;
use crate::player::ParticipantId;
use crate::runtime::CommunityId;
use crate::session::SessionState;

/// A requested state transition.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Transition {
    /// `resume_game`
    Resume,
    /// `pause_game`
    Pause,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resume => write!(f, "resume"),
            Self::Pause => write!(f, "pause"),
        }
    }
}

/// Errors surfaced by session and runtime operations.
///
/// Running out of players is not an error: such ticks are silently absorbed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The transition is not allowed from the current state. State is unchanged.
    #[error("cannot {action} a game that is {state}")]
    InvalidTransition {
        /// What was attempted.
        action: Transition,
        /// State at the time.
        state: SessionState,
    },
    /// The participant is already playing.
    #[error("participant {0} has already joined")]
    AlreadyJoined(ParticipantId),
    /// The first movement phase is over, or late joins are disabled.
    #[error("the game is no longer accepting players")]
    JoinsClosed,
    /// A direct message failed; the participant has been removed.
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
    /// The ticker needs a Tokio runtime.
    #[error("no Tokio runtime is available to drive the phase timer")]
    NoRuntime,
    /// The community already has a session.
    #[error("community {0} already has a game session")]
    SessionExists(CommunityId),
}
