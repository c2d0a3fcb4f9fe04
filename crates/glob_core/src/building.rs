//! Buildings and flags: per-instance state owned by a team.
//!
//! Fields a player tunes through orders are [`Shadowed`]: the local player
//! sees their change at once while the authoritative value waits for the
//! order to come back through the network.

use serde::{Deserialize, Serialize};

use crate::checksum::{fold, rotr1};
use crate::data::{BuildingType, BuildingTypeId, TypeRegistry, UnitKind, NB_UNIT_KINDS};
use crate::gradient::{Gradient, GradientArea, LOCAL_GRADIENT_SIZE};
use crate::ids::Gid;
use crate::map::Map;
use crate::math::torus_distance;
use crate::resources::{ResourceKind, NB_RESOURCES};
use crate::shadowed::Shadowed;

/// Largest number of workers a player may request for one building.
pub const MAX_UNIT_WORKING_REQUEST: u32 = 20;

/// Life-cycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BuildingState {
    /// In service.
    #[default]
    Alive,
    /// Deletion ordered; removed on the owner's next step.
    WaitingForDestruction,
}

/// Movement medium of a local gradient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Medium {
    /// Walking and swimming units.
    Ground,
    /// Flying units.
    Air,
}

impl Medium {
    /// Cache slot: walkers and swimmers see different obstacles.
    const fn index(self, swim: bool) -> usize {
        match (self, swim) {
            (Self::Ground, false) => 0,
            (Self::Ground, true) => 1,
            (Self::Air, _) => 2,
        }
    }
}

/// Lazily computed gradients around a building.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalGradients {
    gradients: [Option<Gradient>; 3],
    locked: [bool; 3],
    generation: u32,
}

/// A building, construction site or flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Building {
    /// Own GID.
    pub gid: Gid,
    /// Current type (a site type while under construction).
    pub type_id: BuildingTypeId,
    /// Life-cycle state.
    pub state: BuildingState,
    /// Type to restore if an upgrade is cancelled.
    pub construction_previous: Option<BuildingTypeId>,
    /// Top-left tile; only flags ever move.
    pub position: Shadowed<(i32, i32)>,
    /// Remaining hit points.
    pub hp: u32,
    /// Stored (or delivered, for sites) resources.
    pub resources: [u32; NB_RESOURCES],
    /// Units attached to this building, in attachment order.
    pub units_working: Vec<Gid>,
    /// Ticks spent on the unit being produced.
    pub production_progress: u32,
    /// Units produced so far; drives the swarm ratio rotation.
    pub production_count: u32,
    /// Ticks until the next shot.
    pub shoot_cooldown: u32,
    /// Requested number of units.
    pub max_unit_working: Shadowed<u32>,
    /// Number the player asked for, kept across upgrades.
    pub max_unit_working_preferred: u32,
    /// Requested number once the current construction completes.
    pub max_unit_working_future: u32,
    /// Requested number before the current upgrade began.
    pub max_unit_working_previous: u32,
    /// Radius within which attracted units stay (flags).
    pub unit_stay_range: Shadowed<u32>,
    /// Exchange: resources accepted.
    pub receive_mask: Shadowed<u32>,
    /// Exchange: resources offered.
    pub send_mask: Shadowed<u32>,
    /// Clearing flag: resource kinds cleared, one bit per kind.
    pub clearing_mask: Shadowed<u8>,
    /// Flags: minimum unit level attracted.
    pub min_level_to_flag: Shadowed<u8>,
    /// Swarm: production weights per unit kind.
    pub ratios: Shadowed<[u32; NB_UNIT_KINDS]>,
    #[serde(skip)]
    gradients: LocalGradients,
}

impl Building {
    /// Create a building of type `bt` at `(x, y)`.
    #[must_use]
    pub fn new(
        gid: Gid,
        bt: &BuildingType,
        x: i32,
        y: i32,
        unit_working: u32,
        unit_working_future: u32,
    ) -> Self {
        let all_resources = ResourceKind::ALL.iter().fold(0u8, |m, k| m | k.bit());
        Self {
            gid,
            type_id: bt.id,
            state: BuildingState::Alive,
            construction_previous: None,
            position: Shadowed::new((x, y)),
            hp: bt.hp_init,
            resources: [0; NB_RESOURCES],
            units_working: Vec::new(),
            production_progress: 0,
            production_count: 0,
            shoot_cooldown: 0,
            max_unit_working: Shadowed::new(unit_working),
            max_unit_working_preferred: unit_working,
            max_unit_working_future: unit_working_future,
            max_unit_working_previous: unit_working,
            unit_stay_range: Shadowed::new(bt.default_unit_stay_range),
            receive_mask: Shadowed::new(0),
            send_mask: Shadowed::new(0),
            clearing_mask: Shadowed::new(all_resources),
            min_level_to_flag: Shadowed::new(0),
            ratios: Shadowed::new([1, 0, 0]),
            gradients: LocalGradients::default(),
        }
    }

    /// Authoritative x.
    #[must_use]
    pub fn x(&self) -> i32 {
        self.position.get().0
    }

    /// Authoritative y.
    #[must_use]
    pub fn y(&self) -> i32 {
        self.position.get().1
    }

    /// Whether the building is in service.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.state == BuildingState::Alive
    }

    /// First resource still missing, in resource order.
    #[must_use]
    pub fn needed_resource(&self, bt: &BuildingType) -> Option<ResourceKind> {
        ResourceKind::ALL
            .into_iter()
            .find(|k| self.resources[k.index()] < bt.max_resource[k.index()])
    }

    /// Whether a site has received everything it needs.
    #[must_use]
    pub fn is_site_complete(&self, bt: &BuildingType) -> bool {
        bt.is_building_site && self.needed_resource(bt).is_none()
    }

    /// Store one delivered unit of `kind`. Returns false if it was not needed.
    pub fn deliver(&mut self, bt: &BuildingType, kind: ResourceKind) -> bool {
        let i = kind.index();
        if self.resources[i] >= bt.max_resource[i] {
            return false;
        }
        self.resources[i] += 1;
        if bt.is_building_site {
            self.hp = (self.hp + bt.hp_inc).min(bt.hp_max);
        }
        true
    }

    /// Whether a unit of `kind` and `level` may be attached.
    #[must_use]
    pub fn accepts(&self, bt: &BuildingType, kind: UnitKind, level: u8) -> bool {
        if !self.is_alive() {
            return false;
        }
        if bt.is_virtual {
            bt.is_zonable(kind) && level >= *self.min_level_to_flag.get()
        } else {
            kind == UnitKind::Worker && self.needed_resource(bt).is_some()
        }
    }

    /// Number of units still wanted.
    #[must_use]
    pub fn missing_units(&self) -> usize {
        (*self.max_unit_working.get() as usize).saturating_sub(self.units_working.len())
    }

    /// Detach every unit and return them.
    pub fn release_all(&mut self) -> Vec<Gid> {
        std::mem::take(&mut self.units_working)
    }

    /// Detach the units in excess of the request, newest first.
    pub fn release_excess(&mut self) -> Vec<Gid> {
        let keep = *self.max_unit_working.get() as usize;
        if self.units_working.len() <= keep {
            return Vec::new();
        }
        self.units_working.split_off(keep)
    }

    /// Detach one unit.
    pub fn release(&mut self, unit: Gid) {
        self.units_working.retain(|&g| g != unit);
    }

    /// Order deletion. Returns the detached units.
    pub fn launch_delete(&mut self) -> Vec<Gid> {
        self.state = BuildingState::WaitingForDestruction;
        self.release_all()
    }

    /// Revoke a pending deletion. Returns false if there was none.
    pub fn cancel_delete(&mut self) -> bool {
        if self.state == BuildingState::WaitingForDestruction {
            self.state = BuildingState::Alive;
            true
        } else {
            false
        }
    }

    /// Turn a completed building into the site of its next level.
    ///
    /// Returns the detached units, or `None` if no upgrade is possible.
    pub fn launch_construction(
        &mut self,
        registry: &TypeRegistry,
        unit_working: u32,
        unit_working_future: u32,
    ) -> Option<Vec<Gid>> {
        let bt = registry.building(self.type_id);
        if !self.is_alive() || bt.is_building_site || self.construction_previous.is_some() {
            return None;
        }
        let site = registry.building(bt.next_level?);
        if !site.is_building_site {
            return None;
        }
        self.construction_previous = Some(self.type_id);
        self.type_id = site.id;
        self.max_unit_working_previous = *self.max_unit_working.get();
        self.max_unit_working.reset(unit_working);
        self.max_unit_working_future = unit_working_future;
        self.resources = [0; NB_RESOURCES];
        self.hp = self.hp.min(site.hp_max);
        self.production_progress = 0;
        Some(self.release_all())
    }

    /// Abandon an upgrade and restore the previous type.
    ///
    /// Returns the detached units, or `None` if no upgrade was in progress.
    pub fn cancel_construction(&mut self, registry: &TypeRegistry) -> Option<Vec<Gid>> {
        let previous = self.construction_previous.take()?;
        let bt = registry.building(previous);
        self.type_id = previous;
        self.max_unit_working.reset(self.max_unit_working_previous);
        self.resources = [0; NB_RESOURCES];
        self.hp = self.hp.clamp(1, bt.hp_max.max(1));
        Some(self.release_all())
    }

    /// Finish a construction site. Returns the completed type and the
    /// detached units, or `None` if the site is not complete.
    pub fn complete_construction(
        &mut self,
        registry: &TypeRegistry,
    ) -> Option<(BuildingTypeId, Vec<Gid>)> {
        let bt = registry.building(self.type_id);
        if !self.is_site_complete(bt) {
            return None;
        }
        let done = registry.building(bt.next_level?);
        self.type_id = done.id;
        self.construction_previous = None;
        self.max_unit_working.reset(self.max_unit_working_future);
        self.resources = [0; NB_RESOURCES];
        self.hp = done.hp_init;
        Some((done.id, self.release_all()))
    }

    /// Unit kind produced next according to the swarm ratios.
    #[must_use]
    pub fn next_production_kind(&self) -> Option<UnitKind> {
        let ratios = self.ratios.get();
        let total: u32 = ratios.iter().sum();
        if total == 0 {
            return None;
        }
        let mut pick = self.production_count % total;
        for kind in UnitKind::ALL {
            let weight = ratios[kind.index()];
            if pick < weight {
                return Some(kind);
            }
            pick -= weight;
        }
        None
    }

    /// Whether `(x, y)` touches the footprint (8-neighbourhood) or lies on it.
    #[must_use]
    pub fn is_adjacent(&self, bt: &BuildingType, map: &Map, x: i32, y: i32) -> bool {
        let (w, h) = (map.width(), map.height());
        let lx = (x - self.x() + 1).rem_euclid(w);
        let ly = (y - self.y() + 1).rem_euclid(h);
        lx <= bt.width + 1 && ly <= bt.height + 1
    }

    /// Whether `(x, y)` lies within the stay range of a flag.
    #[must_use]
    pub fn in_stay_range(&self, map: &Map, x: i32, y: i32) -> bool {
        let d = torus_distance(self.x(), self.y(), x, y, map.width(), map.height());
        d as u32 <= *self.unit_stay_range.get()
    }

    /// Mark the footprint plus viewing range as discovered for `vision`.
    pub fn set_map_discovered(&self, bt: &BuildingType, map: &mut Map, vision: u32) {
        let r = bt.viewing_range;
        map.set_map_discovered(
            self.x() - r,
            self.y() - r,
            bt.width + 2 * r,
            bt.height + 2 * r,
            vision,
        );
    }

    /// Drop cached local gradients.
    pub fn dirty_local_gradients(&mut self) {
        self.gradients.gradients = [None, None, None];
        self.gradients.locked = [false; 3];
    }

    /// Whether the local gradient window of this building overlaps a rectangle.
    #[must_use]
    pub fn local_area_intersects(
        &self,
        bt: &BuildingType,
        map: &Map,
        x: i32,
        y: i32,
        w: i32,
        h: i32,
    ) -> bool {
        self.local_area(bt, map).intersects(x, y, w, h)
    }

    fn local_area(&self, bt: &BuildingType, map: &Map) -> GradientArea {
        GradientArea::window(
            self.x() + bt.width / 2,
            self.y() + bt.height / 2,
            LOCAL_GRADIENT_SIZE,
            map.width(),
            map.height(),
        )
    }

    /// Gradient leading to this building for `medium`, computed on demand.
    ///
    /// Returns `None` while the building is locked: no tile around it is
    /// reachable and units fall back to direct stepping.
    pub fn local_gradient(
        &mut self,
        bt: &BuildingType,
        map: &Map,
        medium: Medium,
        swim: bool,
    ) -> Option<&Gradient> {
        if self.gradients.generation != map.generation() {
            self.dirty_local_gradients();
            self.gradients.generation = map.generation();
        }
        let i = medium.index(swim);
        if self.gradients.gradients[i].is_none() {
            let area = self.local_area(bt, map);
            let (bx, by, bw, bh) = (self.x(), self.y(), bt.width, bt.height);
            let (mw, mh) = (map.width(), map.height());
            let on_footprint = |x: i32, y: i32| {
                (x - bx).rem_euclid(mw) < bw && (y - by).rem_euclid(mh) < bh
            };
            let gradient = match medium {
                Medium::Ground => {
                    Gradient::compute(area, on_footprint, |x, y| map.is_ground_obstacle(x, y, swim))
                }
                Medium::Air => Gradient::compute(area, on_footprint, |_, _| false),
            };
            self.gradients.locked[i] = !gradient.has_reachable_tiles();
            self.gradients.gradients[i] = Some(gradient);
        }
        if self.gradients.locked[i] {
            None
        } else {
            self.gradients.gradients[i].as_ref()
        }
    }

    /// Whether a gradient for `medium` is cached.
    #[must_use]
    pub fn has_local_gradient(&self, medium: Medium, swim: bool) -> bool {
        self.gradients.gradients[medium.index(swim)].is_some()
    }

    /// Whether the gradient for `medium` is currently locked.
    #[must_use]
    pub fn is_locked(&self, medium: Medium, swim: bool) -> bool {
        self.gradients.locked[medium.index(swim)]
    }

    /// Checksum of the authoritative building state.
    #[must_use]
    pub fn checksum(&self) -> u32 {
        let (x, y) = *self.position.get();
        let cs = fold([
            u32::from(self.gid.raw()),
            self.type_id.0,
            self.state as u32,
            x as u32,
            y as u32,
            self.hp,
            *self.max_unit_working.get(),
            *self.unit_stay_range.get(),
            self.units_working.len() as u32,
            self.production_progress,
        ]);
        rotr1(self.resources.iter().fold(cs, |cs, &r| rotr1(cs ^ r)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gradient::UNREACHABLE;
    use crate::map::Terrain;

    fn registry() -> TypeRegistry {
        TypeRegistry::standard().unwrap()
    }

    fn building(registry: &TypeRegistry, name: &str) -> Building {
        let bt = registry.building_by_name(name).unwrap();
        Building::new(Gid::new(0, 0), bt, 4, 4, bt.max_unit_working, bt.max_unit_working)
    }

    #[test]
    fn test_site_completes_when_filled() {
        let registry = registry();
        let mut b = building(&registry, "food_site_0");
        let bt = registry.building(b.type_id).clone();
        assert!(!b.is_site_complete(&bt));
        while let Some(kind) = b.needed_resource(&bt) {
            assert!(b.deliver(&bt, kind));
        }
        assert_eq!(b.hp, bt.hp_max);
        let (done, released) = b.complete_construction(&registry).unwrap();
        assert_eq!(registry.building(done).name, "food_0");
        assert!(released.is_empty());
        assert_eq!(b.type_id, done);
    }

    #[test]
    fn test_upgrade_then_cancel_restores() {
        let registry = registry();
        let mut b = building(&registry, "food_0");
        let original = b.type_id;
        b.units_working.push(Gid::new(0, 7));
        let released = b.launch_construction(&registry, 4, 2).unwrap();
        assert_eq!(released, vec![Gid::new(0, 7)]);
        assert_eq!(registry.building(b.type_id).name, "food_site_1");
        assert_eq!(*b.max_unit_working.get(), 4);
        assert!(b.launch_construction(&registry, 1, 1).is_none());

        b.cancel_construction(&registry).unwrap();
        assert_eq!(b.type_id, original);
        assert!(b.cancel_construction(&registry).is_none());
    }

    #[test]
    fn test_last_level_cannot_upgrade() {
        let registry = registry();
        let mut b = building(&registry, "food_1");
        assert!(b.launch_construction(&registry, 1, 1).is_none());
    }

    #[test]
    fn test_delete_and_cancel() {
        let registry = registry();
        let mut b = building(&registry, "swarm_0");
        b.units_working.push(Gid::new(0, 3));
        assert_eq!(b.launch_delete(), vec![Gid::new(0, 3)]);
        assert!(!b.is_alive());
        assert!(b.cancel_delete());
        assert!(!b.cancel_delete());
    }

    #[test]
    fn test_release_excess_keeps_oldest() {
        let registry = registry();
        let mut b = building(&registry, "swarm_0");
        b.units_working = vec![Gid::new(0, 1), Gid::new(0, 2), Gid::new(0, 3)];
        b.max_unit_working.reset(1);
        assert_eq!(b.release_excess(), vec![Gid::new(0, 2), Gid::new(0, 3)]);
        assert_eq!(b.units_working, vec![Gid::new(0, 1)]);
    }

    #[test]
    fn test_ratio_rotation() {
        let registry = registry();
        let mut b = building(&registry, "swarm_0");
        b.ratios.reset([2, 0, 1]);
        let kinds: Vec<_> = (0..6)
            .map(|i| {
                b.production_count = i;
                b.next_production_kind().unwrap()
            })
            .collect();
        assert_eq!(
            kinds,
            [
                UnitKind::Worker,
                UnitKind::Worker,
                UnitKind::Warrior,
                UnitKind::Worker,
                UnitKind::Worker,
                UnitKind::Warrior
            ]
        );
        b.ratios.reset([0, 0, 0]);
        assert_eq!(b.next_production_kind(), None);
    }

    #[test]
    fn test_adjacency_wraps() {
        let registry = registry();
        let bt = registry.building_by_name("swarm_0").unwrap();
        let map = Map::new(16, 16, Terrain::Grass).unwrap();
        let b = Building::new(Gid::new(0, 0), bt, 15, 15, 1, 1);
        assert!(b.is_adjacent(bt, &map, 14, 14));
        assert!(b.is_adjacent(bt, &map, 1, 1));
        assert!(!b.is_adjacent(bt, &map, 2, 1));
    }

    #[test]
    fn test_local_gradient_locks_when_enclosed() {
        let registry = registry();
        let bt = registry.building_by_name("wall_0").unwrap();
        let mut map = Map::new(32, 32, Terrain::Grass).unwrap();
        let mut b = Building::new(Gid::new(0, 0), bt, 10, 10, 0, 0);
        assert!(b.local_gradient(bt, &map, Medium::Ground, false).is_some());
        for (dx, dy) in crate::gradient::NEIGHBOURS {
            map.set_terrain(10 + dx, 10 + dy, Terrain::Water);
        }
        assert!(b.local_gradient(bt, &map, Medium::Ground, false).is_none());
        assert!(b.is_locked(Medium::Ground, false));
        assert!(b.local_gradient(bt, &map, Medium::Air, false).is_some());
    }

    #[test]
    fn test_walker_and_swimmer_gradients_cached_apart() {
        let registry = registry();
        let bt = registry.building_by_name("wall_0").unwrap();
        let mut map = Map::new(32, 32, Terrain::Grass).unwrap();
        for y in 0..32 {
            map.set_terrain(13, y, Terrain::Water);
            map.set_terrain(20, y, Terrain::Water);
        }
        let fresh = |swim: bool| {
            let mut b = Building::new(Gid::new(0, 0), bt, 10, 10, 0, 0);
            b.local_gradient(bt, &map, Medium::Ground, swim)
                .map(|g| g.value(16, 10))
        };
        let (walker, swimmer) = (fresh(false), fresh(true));
        assert_eq!(walker, Some(UNREACHABLE));
        assert!(swimmer.is_some_and(|v| v > UNREACHABLE));

        let mut b = Building::new(Gid::new(0, 0), bt, 10, 10, 0, 0);
        let first = b.local_gradient(bt, &map, Medium::Ground, false).map(|g| g.value(16, 10));
        let second = b.local_gradient(bt, &map, Medium::Ground, true).map(|g| g.value(16, 10));
        assert_eq!((first, second), (walker, swimmer));
        let again = b.local_gradient(bt, &map, Medium::Ground, false).map(|g| g.value(16, 10));
        assert_eq!(again, walker);
    }

    #[test]
    fn test_checksum_ignores_local_prediction() {
        let registry = registry();
        let mut b = building(&registry, "swarm_0");
        let cs = b.checksum();
        b.max_unit_working.predict(9);
        assert_eq!(b.checksum(), cs);
        b.max_unit_working.commit(9, true);
        assert_ne!(b.checksum(), cs);
    }
}
