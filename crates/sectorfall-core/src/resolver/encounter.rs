//! Encounter resolver: who spots whom inside one sector.
//!
//! Runs once per sector per interaction step over the living players in that
//! sector:
//!
//! 1. Every player independently notices someone with [`EncounterChances::notice`].
//! 2. Noticers are processed in pool order. Each removes itself from the pool,
//!    stops the sector if the pool is empty, and otherwise takes a uniformly
//!    random player out of the pool as its target.
//! 3. The target notices back with [`EncounterChances::mutual`], or always if
//!    it was itself a noticer.
//! 4. A target is dropped from the noticer list so it cannot act on a pool it
//!    has already left.
//!
//! Every participant therefore appears in at most one [`Sighting`].

use std::collections::BTreeSet;

use rand::Rng;

use crate::player::ParticipantId;

/// Chance a player notices someone.
pub const NOTICE_CHANCE: f64 = 0.40;
/// Chance the noticed player notices back.
pub const MUTUAL_NOTICE_CHANCE: f64 = 0.75;

/// Probabilities that drive pairing. Both must be within `[0, 1]`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct EncounterChances {
    /// Chance a player notices someone.
    pub notice: f64,
    /// Chance the noticed player notices back.
    pub mutual: f64,
}

impl Default for EncounterChances {
    fn default() -> Self {
        Self {
            notice: NOTICE_CHANCE,
            mutual: MUTUAL_NOTICE_CHANCE,
        }
    }
}

/// One player spotting another.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Sighting {
    /// The player who noticed.
    pub finder: ParticipantId,
    /// The player who was noticed.
    pub target: ParticipantId,
    /// Whether the target noticed the finder too.
    pub mutual: bool,
}

/// Pairs the players of one sector.
///
/// `pool` must not contain duplicates; its order is the processing order.
pub fn pair_sector<R: Rng + ?Sized>(
    pool: &[ParticipantId],
    chances: EncounterChances,
    rng: &mut R,
) -> Vec<Sighting> {
    let noticers: Vec<ParticipantId> = pool
        .iter()
        .copied()
        .filter(|_| rng.gen_bool(chances.notice))
        .collect();
    let mut still_noticing: BTreeSet<ParticipantId> = noticers.iter().copied().collect();
    let mut remaining: Vec<ParticipantId> = pool.to_vec();
    let mut sightings = Vec::new();

    for finder in noticers {
        if !still_noticing.contains(&finder) {
            continue;
        }
        remaining.retain(|id| *id != finder);
        if remaining.is_empty() {
            break;
        }

        let target = remaining.remove(rng.gen_range(0..remaining.len()));
        // Draw before checking so the number of draws is fixed per sighting.
        let aware = rng.gen_bool(chances.mutual);
        let mutual = aware || still_noticing.contains(&target);
        still_noticing.remove(&target);

        sightings.push(Sighting {
            finder,
            target,
            mutual,
        });
    }

    sightings
}
