//! Combat resolver: a simultaneous two-way exchange between two players.
//!
//! Each side strikes the other once per fight. A strike's damage is:
//!
//! 1. a base roll `2 * tan(2.4 * (U - 0.5)) + 5` with `U` uniform in `[0, 1)`,
//!    centred on 5 with a bounded heavy tail reaching roughly 0 and 10
//! 2. scaled by the defender's stance (damage taken)
//! 3. scaled by the striker's stance (damage dealt)
//! 4. folded through the striker's damage-dealt items, then the defender's
//!    damage-taken items
//! 5. rounded to the nearest whole point, never below zero
//!
//! A player dies when their health reaches 0 or below.

use rand::Rng;

use crate::item::{fold_damage_dealt, fold_damage_taken};
use crate::player::{Player, PlayerAction, StepFlags};

/// Centre of the base damage roll.
pub const BASE_DAMAGE: f64 = 5.0;
/// Scale of the tangent spread.
pub const DAMAGE_SPREAD: f64 = 2.0;
/// Steepness of the tangent tail. Must stay below `PI` so the roll is bounded.
pub const DAMAGE_TAIL: f64 = 2.4;

/// Base damage for a uniform draw `u` in `[0, 1)`, before any scaling.
///
/// # Example
///
/// ```
/// use sectorfall_core::resolver::combat::base_damage;
///
/// assert!((base_damage(0.5) - 5.0).abs() < 1e-12);
/// ```
#[must_use]
pub fn base_damage(u: f64) -> f64 {
    DAMAGE_SPREAD * (DAMAGE_TAIL * (u - 0.5)).tan() + BASE_DAMAGE
}

/// Damage `striker` inflicts on `defender` for the uniform draw `u`.
#[must_use]
pub fn strike_damage(u: f64, striker: &Player, defender: &Player) -> i32 {
    let mut damage = base_damage(u);
    damage *= defender.next_action.damage_taken_multiplier();
    damage *= striker.next_action.damage_dealt_multiplier();
    damage = fold_damage_dealt(striker.items(), damage);
    damage = fold_damage_taken(defender.items(), damage);

    // Bounded by the tangent roll times the item multipliers.
    #[allow(clippy::cast_possible_truncation)]
    let rounded = damage.round() as i32;
    rounded.max(0)
}

/// Who died in a fight.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Casualties {
    /// Both survived.
    None,
    /// Only the attacker died.
    Attacker,
    /// Only the target died.
    Target,
    /// Both died.
    Both,
}

/// Result of [`resolve_combat`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombatOutcome {
    /// Damage the attacker took.
    pub damage_to_attacker: i32,
    /// Damage the target took.
    pub damage_to_target: i32,
    /// Who died.
    pub casualties: Casualties,
    /// Multi-line description for the game channel.
    pub narrative: String,
}

/// Resolves a fight started by `attacker` against `target`.
///
/// Both players are marked as having been in combat, both take damage, and
/// any player at or below zero health is flagged as having died this step.
///
/// The target's strike is rolled first, then the attacker's.
pub fn resolve_combat<R: Rng + ?Sized>(
    attacker: &mut Player,
    target: &mut Player,
    rng: &mut R,
) -> CombatOutcome {
    attacker.flags.insert(StepFlags::WAS_IN_COMBAT);
    target.flags.insert(StepFlags::WAS_IN_COMBAT);

    let damage_to_attacker = strike_damage(rng.gen::<f64>(), target, attacker);
    let damage_to_target = strike_damage(rng.gen::<f64>(), attacker, target);

    attacker.health -= damage_to_attacker;
    target.health -= damage_to_target;

    let attacker_dead = !attacker.is_alive();
    let target_dead = !target.is_alive();
    if attacker_dead {
        attacker.flags.insert(StepFlags::DIED_LAST_PHASE);
    }
    if target_dead {
        target.flags.insert(StepFlags::DIED_LAST_PHASE);
    }

    let casualties = match (attacker_dead, target_dead) {
        (false, false) => Casualties::None,
        (true, false) => Casualties::Attacker,
        (false, true) => Casualties::Target,
        (true, true) => Casualties::Both,
    };

    let narrative = narrate(
        attacker,
        target,
        damage_to_attacker,
        damage_to_target,
        casualties,
    );

    CombatOutcome {
        damage_to_attacker,
        damage_to_target,
        casualties,
        narrative,
    }
}

fn narrate(
    attacker: &Player,
    target: &Player,
    damage_to_attacker: i32,
    damage_to_target: i32,
    casualties: Casualties,
) -> String {
    let (a, t) = (attacker.name(), target.name());
    let fought_back =
        target.found_player == Some(attacker.id()) && target.next_action == PlayerAction::Attack;

    let mut lines = Vec::with_capacity(4);
    lines.push(if fought_back {
        format!("{a} and {t} fought!")
    } else {
        format!("{a} attacked {t}!")
    });
    lines.push(format!("{a} dealt {damage_to_target} points of damage!"));
    lines.push(format!("{t} dealt {damage_to_attacker} points of damage!"));

    match casualties {
        Casualties::None => {}
        Casualties::Both => lines.push("They were both killed in the fight!".to_string()),
        Casualties::Target => lines.push(match target.next_action {
            PlayerAction::Run => format!("{t} tried to run, but was caught!"),
            PlayerAction::Search => format!("{t} never saw them coming."),
            PlayerAction::Attack => format!("{a} killed {t}!"),
        }),
        Casualties::Attacker => lines.push(if target.next_action == PlayerAction::Attack {
            format!("{t} killed {a}!")
        } else {
            format!("{t} killed {a} in self defense!")
        }),
    }

    lines.join("\n")
}
