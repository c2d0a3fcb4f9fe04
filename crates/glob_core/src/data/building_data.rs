//! Building type records as written in data files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::unit_data::UnitKind;
use crate::resources::ResourceKind;

/// Family of a building type; every level of a family shares it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuildingKind {
    /// Produces new units from corn.
    Swarm,
    /// Feeds hungry units.
    Food,
    /// Heals wounded units.
    Heal,
    /// Upgrades walking speed.
    WalkSpeed,
    /// Upgrades swimming.
    SwimSpeed,
    /// Upgrades attack strength.
    Attack,
    /// Upgrades building skills.
    Science,
    /// Shoots at enemy units.
    Defense,
    /// Attracts explorers.
    ExplorationFlag,
    /// Attracts warriors.
    WarFlag,
    /// Attracts workers that clear resources around it.
    ClearingFlag,
    /// Blocks the way.
    StoneWall,
    /// Exchanges luxury resources with allies.
    Market,
}

impl BuildingKind {
    /// Whether this kind is a flag (virtual building).
    #[must_use]
    pub const fn is_flag(self) -> bool {
        matches!(
            self,
            Self::ExplorationFlag | Self::WarFlag | Self::ClearingFlag
        )
    }
}

/// Data-driven building definition.
///
/// Construction sites and completed buildings are distinct records linked
/// by `next_level`: a site names the building it becomes, a completed
/// building names the site of its next upgrade.
///
/// # Example RON
///
/// ```ron
/// BuildingData(
///     name: "food_site_0",
///     kind: Food,
///     level: 0,
///     is_building_site: true,
///     width: 3,
///     height: 2,
///     hp_init: 20,
///     hp_max: 100,
///     hp_inc: 10,
///     max_resource: {Wood: 4, Stone: 2},
///     max_unit_working: 3,
///     next_level: Some("food_0"),
/// )
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingData {
    /// Unique identifier.
    pub name: String,

    /// Family.
    pub kind: BuildingKind,

    /// Upgrade level, starting at zero.
    pub level: u8,

    /// Whether this record is a construction site.
    #[serde(default)]
    pub is_building_site: bool,

    /// Footprint width in tiles.
    pub width: u8,

    /// Footprint height in tiles.
    pub height: u8,

    /// Horizontal offset from the cursor to the footprint's left edge.
    #[serde(default)]
    pub dec_left: u8,

    /// Vertical offset from the cursor to the footprint's top edge.
    #[serde(default)]
    pub dec_top: u8,

    /// Flags occupy no ground tile.
    #[serde(default)]
    pub is_virtual: bool,

    /// Unit kinds this building attracts as a zone.
    #[serde(default)]
    pub zonable: Vec<UnitKind>,

    /// Whether changing the zone range affects the forbidden-zone gradients.
    #[serde(default)]
    pub zonable_forbidden: bool,

    /// Whether the building takes part in resource exchange.
    #[serde(default)]
    pub can_exchange: bool,

    /// Initial range within which attracted units stay.
    #[serde(default)]
    pub default_unit_stay_range: u32,

    /// Largest accepted stay range; zero means no range at all.
    #[serde(default)]
    pub max_unit_stay_range: u32,

    /// Radius revealed around the building.
    #[serde(default = "default_viewing_range")]
    pub viewing_range: u32,

    /// Hit points on creation.
    pub hp_init: u32,

    /// Hit points when fully built.
    pub hp_max: u32,

    /// Hit points gained per delivered resource while under construction.
    #[serde(default)]
    pub hp_inc: u32,

    /// Damage absorbed per hit.
    #[serde(default)]
    pub armor: u32,

    /// Prestige awarded to the owner when this building is completed.
    #[serde(default)]
    pub prestige: u32,

    /// Resources the building stores, or needs to be completed for a site.
    #[serde(default)]
    pub max_resource: BTreeMap<ResourceKind, u32>,

    /// Corn consumed to produce one unit.
    #[serde(default)]
    pub resource_for_one_unit: u32,

    /// Ticks needed to produce one unit.
    #[serde(default)]
    pub unit_production_time: u32,

    /// Default number of workers requested.
    #[serde(default)]
    pub max_unit_working: u32,

    /// Shooting range of defensive buildings; zero disables shooting.
    #[serde(default)]
    pub shooting_range: u32,

    /// Damage per shot.
    #[serde(default)]
    pub shoot_damage: u32,

    /// Ticks between two shots.
    #[serde(default)]
    pub shoot_rythme: u32,

    /// Name of the type this one becomes on completion or upgrade.
    #[serde(default)]
    pub next_level: Option<String>,
}

const fn default_viewing_range() -> u32 {
    2
}

impl BuildingData {
    /// Whether `kind` units are attracted by this building.
    #[must_use]
    pub fn is_zonable(&self, kind: UnitKind) -> bool {
        self.zonable.contains(&kind)
    }
}
