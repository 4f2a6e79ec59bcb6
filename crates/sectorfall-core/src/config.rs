//! Session configuration.

use std::time::Duration;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::player::DEFAULT_STARTING_HEALTH;
use crate::resolver::encounter::{MUTUAL_NOTICE_CHANCE, NOTICE_CHANCE};
use crate::resolver::scavenge::SCAVENGE_CHANCE;

/// Invalid configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The map needs at least one sector.
    #[error("num_sectors must be at least 1")]
    NoSectors,
    /// Ticks need a non-zero period.
    #[error("phase_period_secs must be at least 1")]
    ZeroPeriod,
    /// Players must start alive.
    #[error("starting_health must be positive, got {0}")]
    StartingHealth(i32),
    /// A probability outside `[0, 1]`.
    #[error("{name} must be within [0, 1], got {value}")]
    Probability {
        /// Config field.
        name: &'static str,
        /// Offending value.
        value: f64,
    },
    /// The JSON document could not be parsed.
    #[error("failed to parse game config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Tunables for one game session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Number of map sectors, numbered from 1.
    pub num_sectors: u32,
    /// Seconds between ticks.
    pub phase_period_secs: u64,
    /// Health each player joins with.
    pub starting_health: i32,
    /// Chance a player notices someone in their sector.
    pub notice_chance: f64,
    /// Chance the noticed player notices back.
    pub mutual_notice_chance: f64,
    /// Chance a searching player finds an item.
    pub scavenge_chance: f64,
    /// Admit new players during the first movement phase.
    pub allow_late_join: bool,
    /// RNG seed. `None` seeds from OS entropy.
    pub seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            num_sectors: 6,
            phase_period_secs: 3 * 60,
            starting_health: DEFAULT_STARTING_HEALTH,
            notice_chance: NOTICE_CHANCE,
            mutual_notice_chance: MUTUAL_NOTICE_CHANCE,
            scavenge_chance: SCAVENGE_CHANCE,
            allow_late_join: true,
            seed: None,
        }
    }
}

impl GameConfig {
    /// Default config with a fixed seed.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Default::default()
        }
    }

    /// Parses and validates a JSON config. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON or any validation error.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every field is usable.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_sectors == 0 {
            return Err(ConfigError::NoSectors);
        }
        if self.phase_period_secs == 0 {
            return Err(ConfigError::ZeroPeriod);
        }
        if self.starting_health <= 0 {
            return Err(ConfigError::StartingHealth(self.starting_health));
        }
        for (name, value) in [
            ("notice_chance", self.notice_chance),
            ("mutual_notice_chance", self.mutual_notice_chance),
            ("scavenge_chance", self.scavenge_chance),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Probability { name, value });
            }
        }
        Ok(())
    }

    /// Tick period as a `Duration`.
    #[must_use]
    pub fn phase_period(&self) -> Duration {
        Duration::from_secs(self.phase_period_secs)
    }

    /// Builds the session RNG from `seed`.
    #[must_use]
    pub fn rng(&self) -> ChaCha8Rng {
        match self.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        }
    }
}
