//! Item model: immutable combat and recovery modifiers.
//!
//! Items are shared read-only definitions. A [`Player`] holds `Arc<Item>`
//! references to the passive items it has equipped; instant items are consumed
//! by their pickup effect and never equipped.
//!
//! Each [`ItemKind`] variant declares the hooks it takes part in through
//! [`Capabilities`]. The combat resolver folds every equipped item with the
//! matching capability over the running damage value, in equip order:
//!
//! ```
//! use std::sync::Arc;
//! use sectorfall_core::item::{fold_damage_dealt, Item, ItemKind};
//!
//! let sword = Arc::new(Item::new("Sword", 1.0, ItemKind::Weapon { damage_dealt_multiplier: 2.0 }));
//! assert!((fold_damage_dealt(&[sword], 5.0) - 10.0).abs() < 1e-12);
//! ```

use std::sync::Arc;

use bitflags::bitflags;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::player::Player;

/// Health restored by the default catalog's medkit.
pub const MEDKIT_HEALTH_BONUS: i32 = 7;

bitflags! {
    /// Hooks an item participates in.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Capabilities: u8 {
        /// Fires once when the item is granted.
        const ON_PICKUP = 1 << 0;
        /// Scales damage the holder deals.
        const DAMAGE_DEALT = 1 << 1;
        /// Scales damage the holder takes.
        const DAMAGE_TAKEN = 1 << 2;
    }
}

/// Concrete item behaviour.
///
/// Serialized with an internal `type` tag, e.g.
/// `{"type": "spiked_shield", "damage_taken_multiplier": 0.7, "damage_back_multiplier": 1.2}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemKind {
    /// Instant heal on pickup.
    Medkit {
        /// Health added when picked up.
        health_restored: i32,
    },
    /// Multiplies outgoing damage.
    Weapon {
        /// Outgoing damage factor.
        damage_dealt_multiplier: f64,
    },
    /// Multiplies incoming damage.
    Shield {
        /// Incoming damage factor.
        damage_taken_multiplier: f64,
    },
    /// A shield that also hurts whoever it is used against.
    SpikedShield {
        /// Incoming damage factor.
        damage_taken_multiplier: f64,
        /// Outgoing damage factor.
        damage_back_multiplier: f64,
    },
}

impl ItemKind {
    /// Returns the hooks this kind participates in.
    #[must_use]
    pub const fn capabilities(&self) -> Capabilities {
        match self {
            Self::Medkit { .. } => Capabilities::ON_PICKUP,
            Self::Weapon { .. } => Capabilities::DAMAGE_DEALT,
            Self::Shield { .. } => Capabilities::DAMAGE_TAKEN,
            Self::SpikedShield { .. } => {
                Capabilities::DAMAGE_TAKEN.union(Capabilities::DAMAGE_DEALT)
            }
        }
    }

    /// Short lowercase label for logs and state dumps.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Medkit { .. } => "medkit",
            Self::Weapon { .. } => "weapon",
            Self::Shield { .. } => "shield",
            Self::SpikedShield { .. } => "spiked shield",
        }
    }
}

/// An item definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    name: String,
    probability_weight: f64,
    #[serde(flatten)]
    kind: ItemKind,
}

impl Item {
    /// Creates an item definition.
    #[must_use]
    pub fn new(name: impl Into<String>, probability_weight: f64, kind: ItemKind) -> Self {
        Self {
            name: name.into(),
            probability_weight,
            kind,
        }
    }

    /// The standard medkit: +7 health, weight 1.
    #[must_use]
    pub fn medkit() -> Self {
        Self::new(
            "medkit",
            1.0,
            ItemKind::Medkit {
                health_restored: MEDKIT_HEALTH_BONUS,
            },
        )
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Relative weight for catalog draws.
    #[must_use]
    pub fn probability_weight(&self) -> f64 {
        self.probability_weight
    }

    /// Behaviour of this item.
    #[must_use]
    pub fn kind(&self) -> &ItemKind {
        &self.kind
    }

    /// Shorthand for `self.kind().capabilities()`.
    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        self.kind.capabilities()
    }

    /// Passive items stay equipped; instant ones are consumed on pickup.
    #[must_use]
    pub fn is_equippable(&self) -> bool {
        self.capabilities()
            .intersects(Capabilities::DAMAGE_DEALT | Capabilities::DAMAGE_TAKEN)
    }

    /// True for medkits.
    #[must_use]
    pub fn is_medkit(&self) -> bool {
        matches!(self.kind, ItemKind::Medkit { .. })
    }

    /// Pickup effect. Only medkits have one.
    pub fn on_pickup(&self, owner: &mut Player) {
        if let ItemKind::Medkit { health_restored } = self.kind {
            owner.health += health_restored;
        }
    }

    /// Scales damage dealt by the holder.
    #[must_use]
    pub fn modify_damage_dealt(&self, damage: f64) -> f64 {
        match self.kind {
            ItemKind::Weapon {
                damage_dealt_multiplier,
            } => damage * damage_dealt_multiplier,
            ItemKind::SpikedShield {
                damage_back_multiplier,
                ..
            } => damage * damage_back_multiplier,
            ItemKind::Medkit { .. } | ItemKind::Shield { .. } => damage,
        }
    }

    /// Scales damage taken by the holder.
    #[must_use]
    pub fn modify_damage_taken(&self, damage: f64) -> f64 {
        match self.kind {
            ItemKind::Shield {
                damage_taken_multiplier,
            }
            | ItemKind::SpikedShield {
                damage_taken_multiplier,
                ..
            } => damage * damage_taken_multiplier,
            ItemKind::Medkit { .. } | ItemKind::Weapon { .. } => damage,
        }
    }
}

/// Folds every `DAMAGE_DEALT` item over `damage`, in equip order.
#[must_use]
pub fn fold_damage_dealt(items: &[Arc<Item>], damage: f64) -> f64 {
    items
        .iter()
        .filter(|item| item.capabilities().contains(Capabilities::DAMAGE_DEALT))
        .fold(damage, |acc, item| item.modify_damage_dealt(acc))
}

/// Folds every `DAMAGE_TAKEN` item over `damage`, in equip order.
#[must_use]
pub fn fold_damage_taken(items: &[Arc<Item>], damage: f64) -> f64 {
    items
        .iter()
        .filter(|item| item.capabilities().contains(Capabilities::DAMAGE_TAKEN))
        .fold(damage, |acc, item| item.modify_damage_taken(acc))
}

/// Errors building an [`ItemCatalog`].
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog holds no items.
    #[error("item catalog is empty")]
    Empty,
    /// An item has a weight that cannot be drawn from.
    #[error("item `{name}` has invalid probability weight {weight}")]
    InvalidWeight {
        /// Offending item.
        name: String,
        /// Its weight.
        weight: f64,
    },
    /// The JSON document could not be parsed.
    #[error("failed to parse item catalog: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Read-only weighted pool of items available for scavenging.
#[derive(Debug, Clone)]
pub struct ItemCatalog {
    items: Vec<Arc<Item>>,
}

impl ItemCatalog {
    /// Builds a catalog, validating every weight.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Empty`] for an empty list and
    /// [`CatalogError::InvalidWeight`] for a weight that is not finite and positive.
    pub fn new(items: Vec<Item>) -> Result<Self, CatalogError> {
        if items.is_empty() {
            return Err(CatalogError::Empty);
        }
        if let Some(bad) = items
            .iter()
            .find(|i| !(i.probability_weight.is_finite() && i.probability_weight > 0.0))
        {
            return Err(CatalogError::InvalidWeight {
                name: bad.name.clone(),
                weight: bad.probability_weight,
            });
        }
        Ok(Self {
            items: items.into_iter().map(Arc::new).collect(),
        })
    }

    /// Parses a JSON array of items.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Parse`] for malformed JSON, otherwise the
    /// validation errors of [`ItemCatalog::new`].
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let items: Vec<Item> = serde_json::from_str(json)?;
        Self::new(items)
    }

    /// Draws an item, weighted by `probability_weight`.
    ///
    /// Weights are validated on construction, so this only returns `None`
    /// if the weighted sampler itself rejects them.
    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Arc<Item>> {
        self.items
            .choose_weighted(rng, |item| item.probability_weight)
            .ok()
            .map(Arc::clone)
    }

    /// All items in the catalog.
    #[must_use]
    pub fn items(&self) -> &[Arc<Item>] {
        &self.items
    }
}

impl Default for ItemCatalog {
    fn default() -> Self {
        Self {
            items: vec![Arc::new(Item::medkit())],
        }
    }
}
