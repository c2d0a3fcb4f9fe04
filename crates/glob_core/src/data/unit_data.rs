//! Unit type records as written in data files.

use serde::{Deserialize, Serialize};

use crate::math::{fixed_decimal_serde, Fixed};

/// Number of unit kinds.
pub const NB_UNIT_KINDS: usize = 3;

/// Kind of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum UnitKind {
    /// Harvests, carries and builds.
    Worker,
    /// Flies around and reveals the map.
    Explorer,
    /// Fights enemy units and buildings.
    Warrior,
}

impl UnitKind {
    /// All kinds in index order.
    pub const ALL: [Self; NB_UNIT_KINDS] = [Self::Worker, Self::Explorer, Self::Warrior];

    /// Stable index, used by swarm ratios.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Data-driven unit definition.
///
/// # Example RON
///
/// ```ron
/// UnitData(
///     name: "warrior_0",
///     kind: Warrior,
///     level: 0,
///     hp: 40,
///     walk_speed: 0.5,
///     attack_strength: 4,
/// )
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitData {
    /// Unique identifier.
    pub name: String,

    /// Kind.
    pub kind: UnitKind,

    /// Skill level.
    pub level: u8,

    /// Maximum hit points.
    pub hp: u32,

    /// Tiles per tick on land.
    #[serde(with = "fixed_decimal_serde")]
    pub walk_speed: Fixed,

    /// Flying units use the air layer and ignore terrain.
    #[serde(default)]
    pub fly: bool,

    /// Whether the unit may enter water.
    #[serde(default)]
    pub swim: bool,

    /// Damage per attack.
    #[serde(default)]
    pub attack_strength: u32,

    /// Damage absorbed per hit.
    #[serde(default)]
    pub armor: u32,

    /// Resource units taken per harvest.
    #[serde(default = "default_harvest_amount")]
    pub harvest_amount: u8,

    /// Radius revealed around the unit.
    #[serde(default = "default_viewing_range")]
    pub viewing_range: u32,
}

const fn default_harvest_amount() -> u8 {
    1
}

const fn default_viewing_range() -> u32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_decimal_speed() {
        let source = r#"UnitData(
            name: "worker_0",
            kind: Worker,
            level: 0,
            hp: 25,
            walk_speed: 0.25,
        )"#;
        let data: UnitData = ron::from_str(source).unwrap();
        assert_eq!(data.walk_speed, Fixed::from_num(1) / Fixed::from_num(4));
        assert_eq!(data.harvest_amount, 1);
        assert!(!data.fly);
    }
}
