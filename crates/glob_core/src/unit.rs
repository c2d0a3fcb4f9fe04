//! Units: per-instance state owned by a team.

use serde::{Deserialize, Serialize};

use crate::checksum::{fold, rotr1};
use crate::data::{UnitKind, UnitType, UnitTypeId};
use crate::gradient::{direction_of, NEIGHBOURS};
use crate::ids::Gid;
use crate::map::Map;
use crate::math::{fixed_serde, wrapped_delta, Fixed};
use crate::resources::ResourceKind;

/// What a unit is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Activity {
    /// Waiting for a job.
    #[default]
    Free,
    /// Attached to a building or flag of its own team.
    Working {
        /// Building served.
        building: Gid,
    },
}

/// A unit on the map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    /// Own GID.
    pub gid: Gid,
    /// Type template.
    pub type_id: UnitTypeId,
    /// Kind, copied from the type.
    pub kind: UnitKind,
    /// Level, copied from the type.
    pub level: u8,
    /// Flying units live on the air layer.
    pub fly: bool,
    /// Tile x.
    pub x: i32,
    /// Tile y.
    pub y: i32,
    /// Last step x offset.
    pub dx: i32,
    /// Last step y offset.
    pub dy: i32,
    /// Facing, an index into the neighbour table.
    pub direction: u8,
    /// Movement accumulator in tiles; the unit acts when it reaches one.
    #[serde(with = "fixed_serde")]
    pub delta: Fixed,
    /// Remaining hit points.
    pub hp: u32,
    /// Current job.
    pub activity: Activity,
    /// Resource being carried.
    pub carried: Option<ResourceKind>,
}

impl Unit {
    /// Create a unit of `unit_type` at `(x, y)`.
    #[must_use]
    pub fn new(gid: Gid, unit_type: &UnitType, x: i32, y: i32) -> Self {
        Self {
            gid,
            type_id: unit_type.id,
            kind: unit_type.kind,
            level: unit_type.level,
            fly: unit_type.fly,
            x,
            y,
            dx: 0,
            dy: 0,
            direction: 0,
            delta: Fixed::ZERO,
            hp: unit_type.hp,
            activity: Activity::Free,
            carried: None,
        }
    }

    /// Set the facing from a step offset.
    pub fn set_direction(&mut self, dx: i32, dy: i32) {
        self.dx = dx;
        self.dy = dy;
        if let Some(direction) = direction_of(dx, dy) {
            self.direction = direction;
        }
    }

    /// Building served, if any.
    #[must_use]
    pub fn working_for(&self) -> Option<Gid> {
        match self.activity {
            Activity::Working { building } => Some(building),
            Activity::Free => None,
        }
    }

    /// Accumulate `speed`; true when the unit gets to act this tick.
    pub fn advance(&mut self, speed: Fixed) -> bool {
        self.delta += speed;
        if self.delta >= Fixed::ONE {
            self.delta -= Fixed::ONE;
            true
        } else {
            false
        }
    }

    /// Whether this unit may enter `(x, y)`.
    #[must_use]
    pub fn can_enter(&self, map: &Map, x: i32, y: i32, swim: bool) -> bool {
        if self.fly {
            map.is_free_for_air_unit(x, y)
        } else {
            map.is_free_for_ground_unit(x, y, swim)
        }
    }

    /// Move one tile by `(dx, dy)` if the destination is free.
    pub fn try_step(&mut self, map: &mut Map, dx: i32, dy: i32, swim: bool) -> bool {
        if dx == 0 && dy == 0 {
            return false;
        }
        let (nx, ny) = map.wrap(self.x + dx, self.y + dy);
        if !self.can_enter(map, nx, ny, swim) {
            return false;
        }
        if self.fly {
            map.set_air_unit(self.x, self.y, None);
            map.set_air_unit(nx, ny, Some(self.gid));
        } else {
            map.set_ground_unit(self.x, self.y, None);
            map.set_ground_unit(nx, ny, Some(self.gid));
        }
        self.x = nx;
        self.y = ny;
        self.set_direction(dx, dy);
        true
    }

    /// Step toward `(tx, ty)` along the shortest torus direction.
    ///
    /// When the direct tile is blocked the two neighbouring directions are
    /// tried, clockwise first.
    pub fn step_toward(&mut self, map: &mut Map, tx: i32, ty: i32, swim: bool) -> bool {
        let dx = wrapped_delta(self.x, tx, map.width()).signum();
        let dy = wrapped_delta(self.y, ty, map.height()).signum();
        if dx == 0 && dy == 0 {
            return false;
        }
        if self.try_step(map, dx, dy, swim) {
            return true;
        }
        let Some(dir) = direction_of(dx, dy) else {
            return false;
        };
        for turn in [1, 7] {
            let (ax, ay) = NEIGHBOURS[usize::from((dir + turn) % 8)];
            if self.try_step(map, ax, ay, swim) {
                return true;
            }
        }
        false
    }

    /// Checksum of the unit state.
    #[must_use]
    pub fn checksum(&self) -> u32 {
        let bits = self.delta.to_bits();
        let activity = match self.activity {
            Activity::Free => 0xFFFF,
            Activity::Working { building } => u32::from(building.raw()),
        };
        let carried = self.carried.map_or(0xFF, |k| k.index() as u32);
        let cs = fold([
            u32::from(self.gid.raw()),
            self.type_id.0,
            self.x as u32,
            self.y as u32,
            u32::from(self.direction),
            bits as u32,
            (bits >> 32) as u32,
            self.hp,
            activity,
        ]);
        rotr1(cs ^ carried)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::TypeRegistry;
    use crate::map::Terrain;

    fn worker() -> (Unit, Map) {
        let registry = TypeRegistry::standard().unwrap();
        let ut = registry.unit_type(UnitKind::Worker, 0).unwrap();
        let mut map = Map::new(16, 16, Terrain::Grass).unwrap();
        let unit = Unit::new(Gid::new(0, 0), ut, 2, 2);
        map.set_ground_unit(2, 2, Some(unit.gid));
        (unit, map)
    }

    #[test]
    fn test_advance_accumulates() {
        let (mut unit, _) = worker();
        let quarter = Fixed::from_num(1) / Fixed::from_num(4);
        let acted: Vec<bool> = (0..8).map(|_| unit.advance(quarter)).collect();
        assert_eq!(
            acted,
            [false, false, false, true, false, false, false, true]
        );
    }

    #[test]
    fn test_step_moves_map_layer() {
        let (mut unit, mut map) = worker();
        assert!(unit.try_step(&mut map, 1, 0, false));
        assert_eq!((unit.x, unit.y), (3, 2));
        assert_eq!(map.ground_unit(2, 2), None);
        assert_eq!(map.ground_unit(3, 2), Some(unit.gid));
        assert_eq!(unit.direction, 3);
    }

    #[test]
    fn test_step_toward_wraps_and_detours() {
        let (mut unit, mut map) = worker();
        unit.try_step(&mut map, -1, -1, false);
        assert_eq!((unit.x, unit.y), (1, 1));
        // Target across the wrap edge: the short way is left.
        map.set_terrain(0, 1, Terrain::Water);
        assert!(unit.step_toward(&mut map, 14, 1, false));
        assert_ne!((unit.x, unit.y), (1, 1));
        assert_eq!(unit.x, 0);
    }

    #[test]
    fn test_checksum_tracks_state() {
        let (mut unit, _) = worker();
        let before = unit.checksum();
        unit.hp -= 1;
        assert_ne!(unit.checksum(), before);
    }
}
