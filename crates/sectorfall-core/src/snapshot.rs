//! Point-in-time views of a session.
//!
//! Snapshots own their data, serialize to JSON, and compare with `==`, which
//! makes them the unit of comparison for replay tests and the `--dump` output
//! of the simulation harness.

use std::fmt;

use serde::Serialize;

use crate::player::{ParticipantId, Player, PlayerAction, StepFlags};
use crate::session::{GamePhase, SessionState};

/// One player at snapshot time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerSnapshot {
    /// Participant id.
    pub id: ParticipantId,
    /// Display name.
    pub name: String,
    /// Health.
    pub health: i32,
    /// Current sector.
    pub current_sector: u32,
    /// Queued sector.
    pub next_sector: u32,
    /// Queued action.
    pub next_action: PlayerAction,
    /// Player spotted this step.
    pub found_player: Option<ParticipantId>,
    /// Step-scoped flags.
    pub flags: StepFlags,
    /// Names of equipped items, in equip order.
    pub items: Vec<String>,
}

impl From<&Player> for PlayerSnapshot {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id(),
            name: player.name().to_string(),
            health: player.health,
            current_sector: player.current_sector,
            next_sector: player.next_sector,
            next_action: player.next_action,
            found_player: player.found_player,
            flags: player.flags,
            items: player.items().iter().map(|i| i.name().to_string()).collect(),
        }
    }
}

/// Whole-session view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    /// Lifecycle state.
    pub state: SessionState,
    /// Current phase.
    pub phase: GamePhase,
    /// Map size.
    pub num_sectors: u32,
    /// Tick period in seconds.
    pub phase_period_secs: u64,
    /// Whether joins via the movement prompt are still possible.
    pub is_first_movement_phase: bool,
    /// Players in id order.
    pub players: Vec<PlayerSnapshot>,
}

impl SessionSnapshot {
    /// Living players in id order.
    pub fn living(&self) -> impl Iterator<Item = &PlayerSnapshot> {
        self.players.iter().filter(|p| p.health > 0)
    }
}

impl fmt::Display for SessionSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "game {} ({} phase, {} sectors, {}s period)",
            self.state, self.phase, self.num_sectors, self.phase_period_secs
        )?;
        for p in &self.players {
            write!(
                f,
                "  [{}] {:<16} hp {:>3}  sector {}",
                p.id, p.name, p.health, p.current_sector
            )?;
            if p.next_sector != p.current_sector {
                write!(f, " -> {}", p.next_sector)?;
            }
            if !p.items.is_empty() {
                write!(f, "  items: {}", p.items.join(", "))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
