//! Tokio glue: the recurring phase ticker and the per-community registry.
//!
//! [`GameSession`] itself is synchronous. A [`SessionDriver`] shares it behind
//! an `Arc<Mutex<_>>` with a spawned ticker task that calls
//! [`GameSession::tick`] once per phase period. The task exits on its own as
//! soon as a tick leaves the session anything other than in progress, and is
//! aborted on pause or when the driver is dropped.
//!
//! The ticker only holds the session lock for the duration of one synchronous
//! tick; it never awaits while holding it.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::SessionError;
use crate::platform::MessageHandle;
use crate::player::Participant;
use crate::session::{GameSession, SessionState};
use crate::snapshot::SessionSnapshot;

/// Identifier of the community (server, guild, room) a session belongs to.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CommunityId(u64);

impl CommunityId {
    /// Creates a new `CommunityId` from a raw value.
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

impl fmt::Debug for CommunityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommunityId({})", self.0)
    }
}

impl fmt::Display for CommunityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for CommunityId {
    fn from(id: u64) -> Self {
        Self::new(id)
    }
}

/// Owns a session and the timer that ticks it.
pub struct SessionDriver {
    session: Arc<Mutex<GameSession>>,
    timer: Option<JoinHandle<()>>,
}

impl SessionDriver {
    /// Wraps a session. No timer runs until [`resume`](Self::resume).
    #[must_use]
    pub fn new(session: GameSession) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
            timer: None,
        }
    }

    /// Resumes the game, ticks once, and starts the recurring ticker.
    ///
    /// # Errors
    ///
    /// - [`SessionError::NoRuntime`] when called outside a Tokio runtime; the
    ///   session is left untouched
    /// - the [`GameSession::resume_game`] errors
    pub fn resume(&mut self) -> Result<(), SessionError> {
        let runtime = Handle::try_current().map_err(|_| SessionError::NoRuntime)?;

        let (state, period) = {
            let mut session = self.lock();
            session.resume_game()?;
            (session.state(), session.phase_period())
        };

        self.stop_timer();
        if state == SessionState::InProgress {
            debug!(period_secs = period.as_secs(), "starting phase ticker");
            self.timer = Some(runtime.spawn(run_ticker(Arc::clone(&self.session), period)));
        }
        Ok(())
    }

    /// Pauses the game and cancels the ticker.
    ///
    /// # Errors
    ///
    /// The [`GameSession::pause_game`] errors. The timer is left alone then.
    pub fn pause(&mut self) -> Result<(), SessionError> {
        self.lock().pause_game()?;
        self.stop_timer();
        Ok(())
    }

    /// True while a ticker task is scheduled.
    #[must_use]
    pub fn is_timer_active(&self) -> bool {
        self.timer.as_ref().is_some_and(|timer| !timer.is_finished())
    }

    /// Runs `f` with exclusive access to the session.
    pub fn with_session<T>(&self, f: impl FnOnce(&mut GameSession) -> T) -> T {
        f(&mut self.lock())
    }

    /// See [`GameSession::join`].
    ///
    /// # Errors
    ///
    /// The [`GameSession::join`] errors.
    pub fn join(&self, participant: Participant) -> Result<(), SessionError> {
        self.lock().join(participant)
    }

    /// See [`GameSession::handle_choice`].
    ///
    /// # Errors
    ///
    /// The [`GameSession::handle_choice`] errors.
    pub fn handle_choice(
        &self,
        message: MessageHandle,
        participant: Participant,
        index: usize,
    ) -> Result<(), SessionError> {
        self.lock().handle_choice(message, participant, index)
    }

    /// Current session state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.lock().state()
    }

    /// See [`GameSession::snapshot`].
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.lock().snapshot()
    }

    fn lock(&self) -> MutexGuard<'_, GameSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn stop_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            debug!("stopping phase ticker");
            timer.abort();
        }
    }
}

impl Drop for SessionDriver {
    fn drop(&mut self) {
        self.stop_timer();
    }
}

impl fmt::Debug for SessionDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionDriver")
            .field("timer_active", &self.is_timer_active())
            .finish_non_exhaustive()
    }
}

async fn run_ticker(session: Arc<Mutex<GameSession>>, period: Duration) {
    // resume_game already ticked; the first timed tick is one period out.
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        if !tick_once(&session) {
            break;
        }
    }
}

/// Ticks once. Returns whether the ticker should keep going.
fn tick_once(session: &Mutex<GameSession>) -> bool {
    let mut session = session.lock().unwrap_or_else(PoisonError::into_inner);
    session.tick();
    let state = session.state();
    if state != SessionState::InProgress {
        debug!(%state, "phase ticker exiting");
    }
    state == SessionState::InProgress
}

/// At most one session per community.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<CommunityId, SessionDriver>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new session for `community`.
    ///
    /// # Errors
    ///
    /// [`SessionError::SessionExists`] if the community already has one.
    pub fn create(
        &mut self,
        community: CommunityId,
        session: GameSession,
    ) -> Result<&mut SessionDriver, SessionError> {
        match self.sessions.entry(community) {
            Entry::Occupied(_) => Err(SessionError::SessionExists(community)),
            Entry::Vacant(slot) => {
                info!(%community, "game session created");
                Ok(slot.insert(SessionDriver::new(session)))
            }
        }
    }

    /// The community's session, if any.
    #[must_use]
    pub fn get(&self, community: CommunityId) -> Option<&SessionDriver> {
        self.sessions.get(&community)
    }

    /// The community's session, mutably.
    pub fn get_mut(&mut self, community: CommunityId) -> Option<&mut SessionDriver> {
        self.sessions.get_mut(&community)
    }

    /// Unregisters a session. Dropping the returned driver stops its ticker.
    pub fn remove(&mut self, community: CommunityId) -> Option<SessionDriver> {
        let driver = self.sessions.remove(&community);
        if driver.is_some() {
            info!(%community, "game session removed");
        }
        driver
    }

    /// Number of registered sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// True if no sessions are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Pauses every running game and drops every session.
    pub fn shutdown(&mut self) {
        let count = self.sessions.len();
        for (community, mut driver) in self.sessions.drain() {
            if driver.state() != SessionState::InProgress {
                continue;
            }
            if let Err(err) = driver.pause() {
                warn!(%community, %err, "could not pause game during shutdown");
            }
        }
        info!(count, "all game sessions shut down");
    }
}
