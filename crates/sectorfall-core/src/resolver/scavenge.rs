//! Scavenge resolver: searching players may turn up an item.

use std::sync::Arc;

use rand::Rng;

use crate::item::{Item, ItemCatalog};
use crate::player::{Player, StepFlags};

/// Chance a searching player finds something.
pub const SCAVENGE_CHANCE: f64 = 0.05;

/// Rolls a search for `player`. On success draws an item from `catalog`,
/// grants it, and returns it.
///
/// Finding a medkit sets [`StepFlags::FOUND_MEDKIT`].
pub fn scavenge<R: Rng + ?Sized>(
    player: &mut Player,
    catalog: &ItemCatalog,
    chance: f64,
    rng: &mut R,
) -> Option<Arc<Item>> {
    if !rng.gen_bool(chance) {
        return None;
    }
    let item = catalog.choose(rng)?;
    if item.is_medkit() {
        player.flags.insert(StepFlags::FOUND_MEDKIT);
    }
    player.grant_item(Arc::clone(&item));
    Some(item)
}

/// Channel line announcing a find.
#[must_use]
pub fn find_narrative(player: &Player, item: &Item) -> String {
    format!("{} found a {}!", player.name(), item.name())
}
