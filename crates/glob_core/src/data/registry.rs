//! Immutable registry of building and unit types.
//!
//! The registry is built once from data records and shared by every game
//! through an `Arc`. Simulation state refers to types by index only, so a
//! save game can be loaded only against the registry it was written with.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::building_data::{BuildingData, BuildingKind};
use super::unit_data::{UnitData, UnitKind, NB_UNIT_KINDS};
use crate::error::{GameError, Result};
use crate::math::Fixed;
use crate::resources::NB_RESOURCES;

const BUNDLED_BUILDINGS: &str = include_str!("../../../../assets/data/buildings.ron");
const BUNDLED_UNITS: &str = include_str!("../../../../assets/data/units.ron");

/// Index of a building type in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BuildingTypeId(pub u32);

/// Index of a unit type in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnitTypeId(pub u32);

/// Resolved building type.
#[derive(Debug, Clone)]
pub struct BuildingType {
    /// Own index.
    pub id: BuildingTypeId,
    /// Unique name.
    pub name: String,
    /// Family.
    pub kind: BuildingKind,
    /// Upgrade level.
    pub level: u8,
    /// Construction site.
    pub is_building_site: bool,
    /// Footprint width.
    pub width: i32,
    /// Footprint height.
    pub height: i32,
    /// Cursor offset to the left edge.
    pub dec_left: i32,
    /// Cursor offset to the top edge.
    pub dec_top: i32,
    /// Occupies no ground tile.
    pub is_virtual: bool,
    /// Attracted unit kinds, indexed by [`UnitKind::index`].
    pub zonable: [bool; NB_UNIT_KINDS],
    /// Range changes affect forbidden-zone gradients.
    pub zonable_forbidden: bool,
    /// Takes part in exchange.
    pub can_exchange: bool,
    /// Initial stay range.
    pub default_unit_stay_range: u32,
    /// Largest stay range.
    pub max_unit_stay_range: u32,
    /// Revealed radius.
    pub viewing_range: i32,
    /// Initial hit points.
    pub hp_init: u32,
    /// Hit points when complete.
    pub hp_max: u32,
    /// Hit points per delivery during construction.
    pub hp_inc: u32,
    /// Damage absorbed per hit.
    pub armor: u32,
    /// Prestige awarded on completion.
    pub prestige: u32,
    /// Storage (or requirement for sites), indexed by resource kind.
    pub max_resource: [u32; NB_RESOURCES],
    /// Corn per produced unit.
    pub resource_for_one_unit: u32,
    /// Ticks per produced unit.
    pub unit_production_time: u32,
    /// Default requested workers.
    pub max_unit_working: u32,
    /// Shooting range.
    pub shooting_range: i32,
    /// Damage per shot.
    pub shoot_damage: u32,
    /// Ticks between shots.
    pub shoot_rythme: u32,
    /// Completed type (for sites) or next upgrade site (for buildings).
    pub next_level: Option<BuildingTypeId>,
}

impl BuildingType {
    /// Whether `kind` units are attracted.
    #[must_use]
    pub fn is_zonable(&self, kind: UnitKind) -> bool {
        self.zonable[kind.index()]
    }

    /// Whether the building accepts resource deliveries.
    #[must_use]
    pub fn is_fillable(&self) -> bool {
        self.max_resource.iter().any(|&m| m > 0)
    }

    /// Whether this type produces units.
    #[must_use]
    pub fn produces_units(&self) -> bool {
        !self.is_building_site && self.kind == BuildingKind::Swarm && self.unit_production_time > 0
    }
}

/// Resolved unit type.
#[derive(Debug, Clone)]
pub struct UnitType {
    /// Own index.
    pub id: UnitTypeId,
    /// Unique name.
    pub name: String,
    /// Kind.
    pub kind: UnitKind,
    /// Level.
    pub level: u8,
    /// Maximum hit points.
    pub hp: u32,
    /// Tiles per tick.
    pub walk_speed: Fixed,
    /// Uses the air layer.
    pub fly: bool,
    /// May enter water.
    pub swim: bool,
    /// Damage per attack.
    pub attack_strength: u32,
    /// Damage absorbed per hit.
    pub armor: u32,
    /// Units taken per harvest.
    pub harvest_amount: u8,
    /// Revealed radius.
    pub viewing_range: i32,
}

/// All building and unit types of a game.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    buildings: Vec<BuildingType>,
    units: Vec<UnitType>,
    building_names: HashMap<String, BuildingTypeId>,
}

impl TypeRegistry {
    /// Registry built from the data files bundled with the crate.
    ///
    /// # Errors
    ///
    /// Returns an error if the bundled data fails to parse or validate.
    pub fn standard() -> Result<Self> {
        Self::from_ron(
            BUNDLED_BUILDINGS,
            "assets/data/buildings.ron",
            BUNDLED_UNITS,
            "assets/data/units.ron",
        )
    }

    /// Parse two RON lists and build a registry.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::DataParseError`] if either source fails to
    /// parse, or [`GameError::InvalidData`] if the records are inconsistent.
    pub fn from_ron(
        buildings: &str,
        buildings_path: &str,
        units: &str,
        units_path: &str,
    ) -> Result<Self> {
        let buildings: Vec<BuildingData> =
            ron::from_str(buildings).map_err(|e| GameError::DataParseError {
                path: buildings_path.to_string(),
                message: e.to_string(),
            })?;
        let units: Vec<UnitData> = ron::from_str(units).map_err(|e| GameError::DataParseError {
            path: units_path.to_string(),
            message: e.to_string(),
        })?;
        Self::build(&buildings, &units)
    }

    /// Build a registry from records, resolving `next_level` names.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidData`] listing every inconsistency found.
    pub fn build(buildings: &[BuildingData], units: &[UnitData]) -> Result<Self> {
        let errors = validate(buildings, units);
        if !errors.is_empty() {
            return Err(GameError::InvalidData(errors.join("; ")));
        }

        let building_names: HashMap<String, BuildingTypeId> = buildings
            .iter()
            .enumerate()
            .map(|(i, b)| (b.name.clone(), BuildingTypeId(i as u32)))
            .collect();

        let buildings = buildings
            .iter()
            .enumerate()
            .map(|(i, data)| {
                let mut zonable = [false; NB_UNIT_KINDS];
                for kind in &data.zonable {
                    zonable[kind.index()] = true;
                }
                let mut max_resource = [0; NB_RESOURCES];
                for (kind, amount) in &data.max_resource {
                    max_resource[kind.index()] = *amount;
                }
                BuildingType {
                    id: BuildingTypeId(i as u32),
                    name: data.name.clone(),
                    kind: data.kind,
                    level: data.level,
                    is_building_site: data.is_building_site,
                    width: i32::from(data.width),
                    height: i32::from(data.height),
                    dec_left: i32::from(data.dec_left),
                    dec_top: i32::from(data.dec_top),
                    is_virtual: data.is_virtual,
                    zonable,
                    zonable_forbidden: data.zonable_forbidden,
                    can_exchange: data.can_exchange,
                    default_unit_stay_range: data.default_unit_stay_range,
                    max_unit_stay_range: data.max_unit_stay_range,
                    viewing_range: data.viewing_range as i32,
                    hp_init: data.hp_init,
                    hp_max: data.hp_max,
                    hp_inc: data.hp_inc,
                    armor: data.armor,
                    prestige: data.prestige,
                    max_resource,
                    resource_for_one_unit: data.resource_for_one_unit,
                    unit_production_time: data.unit_production_time,
                    max_unit_working: data.max_unit_working,
                    shooting_range: data.shooting_range as i32,
                    shoot_damage: data.shoot_damage,
                    shoot_rythme: data.shoot_rythme,
                    next_level: data
                        .next_level
                        .as_ref()
                        .and_then(|n| building_names.get(n).copied()),
                }
            })
            .collect::<Vec<_>>();

        let units = units
            .iter()
            .enumerate()
            .map(|(i, data)| UnitType {
                id: UnitTypeId(i as u32),
                name: data.name.clone(),
                kind: data.kind,
                level: data.level,
                hp: data.hp,
                walk_speed: data.walk_speed,
                fly: data.fly,
                swim: data.swim,
                attack_strength: data.attack_strength,
                armor: data.armor,
                harvest_amount: data.harvest_amount,
                viewing_range: data.viewing_range as i32,
            })
            .collect::<Vec<_>>();

        debug!(
            buildings = buildings.len(),
            units = units.len(),
            "Type registry built"
        );

        Ok(Self {
            buildings,
            units,
            building_names,
        })
    }

    /// Building type by id.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not part of this registry.
    #[must_use]
    pub fn building(&self, id: BuildingTypeId) -> &BuildingType {
        self.get_building(id)
            .unwrap_or_else(|| panic!("building type {} not in registry", id.0))
    }

    /// Building type by id, if present.
    #[must_use]
    pub fn get_building(&self, id: BuildingTypeId) -> Option<&BuildingType> {
        self.buildings.get(id.0 as usize)
    }

    /// Building type id by name.
    #[must_use]
    pub fn building_id(&self, name: &str) -> Option<BuildingTypeId> {
        self.building_names.get(name).copied()
    }

    /// Building type by name.
    #[must_use]
    pub fn building_by_name(&self, name: &str) -> Option<&BuildingType> {
        self.building_id(name).map(|id| self.building(id))
    }

    /// Type placed by the GUI when the player builds `kind` from scratch:
    /// the level-0 construction site, or the flag itself.
    #[must_use]
    pub fn placeable(&self, kind: BuildingKind) -> Option<BuildingTypeId> {
        self.buildings
            .iter()
            .find(|b| b.kind == kind && b.level == 0 && (b.is_building_site || b.is_virtual))
            .map(|b| b.id)
    }

    /// Number of building types.
    #[must_use]
    pub fn building_count(&self) -> usize {
        self.buildings.len()
    }

    /// All building types.
    pub fn buildings(&self) -> impl Iterator<Item = &BuildingType> {
        self.buildings.iter()
    }

    /// Unit type by id.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not part of this registry.
    #[must_use]
    pub fn unit(&self, id: UnitTypeId) -> &UnitType {
        self.units
            .get(id.0 as usize)
            .unwrap_or_else(|| panic!("unit type {} not in registry", id.0))
    }

    /// Unit type of `kind` at `level`, falling back to the highest level below.
    #[must_use]
    pub fn unit_type(&self, kind: UnitKind, level: u8) -> Option<&UnitType> {
        self.units
            .iter()
            .filter(|u| u.kind == kind && u.level <= level)
            .max_by_key(|u| u.level)
    }

    /// Number of unit types.
    #[must_use]
    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// All unit types.
    pub fn units(&self) -> impl Iterator<Item = &UnitType> {
        self.units.iter()
    }
}

/// Check records for consistency, returning every problem found.
#[must_use]
pub fn validate(buildings: &[BuildingData], units: &[UnitData]) -> Vec<String> {
    let mut errors = Vec::new();
    let mut names: HashMap<&str, &BuildingData> = HashMap::new();

    for building in buildings {
        if names.insert(building.name.as_str(), building).is_some() {
            errors.push(format!("Duplicate building type '{}'", building.name));
        }
        if building.width == 0 || building.height == 0 {
            errors.push(format!("Building '{}' has an empty footprint", building.name));
        }
        if building.is_building_site && building.next_level.is_none() {
            errors.push(format!(
                "Building site '{}' has no completed type",
                building.name
            ));
        }
    }

    for building in buildings {
        let Some(next) = &building.next_level else {
            continue;
        };
        match names.get(next.as_str()) {
            None => errors.push(format!(
                "Building '{}' has unknown next level '{}'",
                building.name, next
            )),
            Some(target) => {
                if target.width != building.width || target.height != building.height {
                    errors.push(format!(
                        "Building '{}' and its next level '{}' have different footprints",
                        building.name, next
                    ));
                }
                if target.kind != building.kind {
                    errors.push(format!(
                        "Building '{}' and its next level '{}' are different kinds",
                        building.name, next
                    ));
                }
            }
        }
    }

    let mut unit_names = HashMap::new();
    let mut unit_levels = HashMap::new();
    for unit in units {
        if unit_names.insert(unit.name.as_str(), ()).is_some() {
            errors.push(format!("Duplicate unit type '{}'", unit.name));
        }
        if unit_levels.insert((unit.kind, unit.level), ()).is_some() {
            errors.push(format!(
                "Duplicate unit type {:?} level {}",
                unit.kind, unit.level
            ));
        }
    }
    for kind in UnitKind::ALL {
        if !units.iter().any(|u| u.kind == kind && u.level == 0) {
            errors.push(format!("No level 0 unit type for {kind:?}"));
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_registry_loads() {
        let registry = TypeRegistry::standard().unwrap();
        assert!(registry.building_count() > 10);
        let site = registry.building_by_name("swarm_site_0").unwrap();
        assert!(site.is_building_site);
        let done = registry.building(site.next_level.unwrap());
        assert_eq!(done.name, "swarm_0");
        assert!(done.produces_units());
    }

    #[test]
    fn test_flags_are_virtual() {
        let registry = TypeRegistry::standard().unwrap();
        for kind in [
            BuildingKind::WarFlag,
            BuildingKind::ExplorationFlag,
            BuildingKind::ClearingFlag,
        ] {
            let id = registry.placeable(kind).unwrap();
            assert!(registry.building(id).is_virtual);
        }
    }

    #[test]
    fn test_unit_type_level_fallback() {
        let registry = TypeRegistry::standard().unwrap();
        let worker = registry.unit_type(UnitKind::Worker, 3).unwrap();
        assert_eq!(worker.kind, UnitKind::Worker);
        assert!(worker.level <= 3);
    }

    #[test]
    fn test_unknown_next_level_rejected() {
        let buildings = r#"[BuildingData(
            name: "a", kind: Food, level: 0, width: 1, height: 1,
            hp_init: 1, hp_max: 1, next_level: Some("missing"),
        )]"#;
        let units = r#"[
            UnitData(name: "w", kind: Worker, level: 0, hp: 1, walk_speed: 1.0),
            UnitData(name: "e", kind: Explorer, level: 0, hp: 1, walk_speed: 1.0, fly: true),
            UnitData(name: "x", kind: Warrior, level: 0, hp: 1, walk_speed: 1.0),
        ]"#;
        let err = TypeRegistry::from_ron(buildings, "b", units, "u").unwrap_err();
        assert!(matches!(err, GameError::InvalidData(msg) if msg.contains("missing")));
    }

    #[test]
    fn test_footprint_change_rejected() {
        let buildings = r#"[
            BuildingData(name: "s", kind: Food, level: 0, is_building_site: true,
                width: 2, height: 2, hp_init: 1, hp_max: 1, next_level: Some("b")),
            BuildingData(name: "b", kind: Food, level: 0, width: 3, height: 2,
                hp_init: 1, hp_max: 1),
        ]"#;
        let errors = validate(&ron::from_str::<Vec<BuildingData>>(buildings).unwrap(), &[]);
        assert!(errors.iter().any(|e| e.contains("different footprints")));
    }

    #[test]
    fn test_parse_error_names_file() {
        let err = TypeRegistry::from_ron("[", "broken.ron", "[]", "u").unwrap_err();
        assert!(matches!(err, GameError::DataParseError { path, .. } if path == "broken.ron"));
    }
}
