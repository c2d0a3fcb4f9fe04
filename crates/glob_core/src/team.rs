//! Teams: owners of units and buildings.
//!
//! A team holds fixed-capacity slot tables for its units and buildings,
//! its diplomatic masks and its victory state. Each tick it advances its
//! buildings (deletion, construction, production, shooting), attaches free
//! units to buildings that want them, then moves every unit.
//!
//! Combat never mutates another team directly: attacks are returned as
//! [`DamageEvent`]s that the game applies once every team has stepped.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::building::{Building, BuildingState, Medium};
use crate::checksum::{fold, rotr1, ChecksumReport};
use crate::data::{BuildingKind, BuildingType, BuildingTypeId, TypeRegistry, UnitKind, UnitType};
use crate::gradient::{Gradient, GradientArea, NEIGHBOURS, UNREACHABLE};
use crate::header::TeamKind;
use crate::ids::{team_mask, Gid, MAX_TEAMS, SLOTS_PER_TEAM};
use crate::map::{AreaLayer, Map};
use crate::math::torus_distance;
use crate::resources::ResourceKind;
use crate::slots::SlotTable;
use crate::sync_rand::SyncRand;
use crate::unit::{Activity, Unit};

/// Something hit by an attack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Target {
    /// A unit.
    Unit(Gid),
    /// A building.
    Building(Gid),
}

/// Attack emitted during a team step, applied by the game afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageEvent {
    /// Unit or building that attacked.
    pub attacker: Gid,
    /// What was hit.
    pub target: Target,
    /// Raw damage before armor.
    pub damage: u32,
}

/// Kind of a team event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamEventKind {
    /// A construction site or upgrade finished.
    BuildingCompleted,
    /// A swarm produced a unit.
    UnitProduced,
    /// One of the team's units was hit.
    UnitUnderAttack,
    /// One of the team's buildings was hit.
    BuildingUnderAttack,
    /// One of the team's units died.
    UnitLost,
    /// One of the team's buildings was destroyed.
    BuildingLost,
}

/// Notification for the team's players; not part of the simulation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeamEvent {
    /// What happened.
    pub kind: TeamEventKind,
    /// Entity concerned.
    pub gid: Gid,
    /// Where.
    pub x: i32,
    /// Where.
    pub y: i32,
    /// When.
    pub step: u32,
}

/// Team-wide gradients, dropped whenever the map's obstacles change.
#[derive(Debug, Clone, Default)]
struct TeamGradients {
    generation: u32,
    resources: BTreeMap<(ResourceKind, bool), Gradient>,
    forbidden: Option<Gradient>,
    guard: Option<Gradient>,
}

impl TeamGradients {
    fn sync(&mut self, map: &Map) {
        if self.generation != map.generation() {
            self.clear();
            self.generation = map.generation();
        }
    }

    fn clear(&mut self) {
        self.resources.clear();
        self.forbidden = None;
        self.guard = None;
    }

    fn resource(&mut self, map: &Map, kind: ResourceKind, swim: bool) -> &Gradient {
        self.sync(map);
        self.resources.entry((kind, swim)).or_insert_with(|| {
            Gradient::compute(
                GradientArea::whole_map(map.width(), map.height()),
                |x, y| map.has_resource(x, y, kind),
                |x, y| map.is_ground_obstacle(x, y, swim),
            )
        })
    }

    fn forbidden(&mut self, map: &Map, team: usize) -> &Gradient {
        self.sync(map);
        self.forbidden.get_or_insert_with(|| {
            Gradient::compute(
                GradientArea::whole_map(map.width(), map.height()),
                |x, y| {
                    !map.is_area(AreaLayer::Forbidden, x, y, team)
                        && !map.is_ground_obstacle(x, y, false)
                },
                |x, y| map.is_ground_obstacle(x, y, false),
            )
        })
    }

    fn guard(&mut self, map: &Map, team: usize) -> &Gradient {
        self.sync(map);
        self.guard.get_or_insert_with(|| {
            Gradient::compute(
                GradientArea::whole_map(map.width(), map.height()),
                |x, y| map.is_area(AreaLayer::GuardArea, x, y, team),
                |x, y| map.is_ground_obstacle(x, y, false),
            )
        })
    }
}

/// A team.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    /// Index in the game.
    pub team_number: usize,
    /// Human or AI controlled.
    pub kind: TeamKind,
    /// Own bit.
    pub me: u32,
    /// Teams this one does not attack.
    pub allies: u32,
    /// Teams this one attacks.
    pub enemies: u32,
    /// Teams sharing the vision of exchange buildings.
    pub shared_vision_exchange: u32,
    /// Teams sharing the vision of food buildings.
    pub shared_vision_food: u32,
    /// Teams sharing the vision of everything else.
    pub shared_vision_other: u32,
    /// Players controlling this team.
    pub players_mask: u32,
    units: SlotTable<Unit>,
    buildings: SlotTable<Building>,
    /// Victory score.
    pub prestige: u32,
    /// Enemy units killed.
    pub unit_kills: u32,
    /// Whether the team still plays.
    pub is_alive: bool,
    /// Whether the team has won.
    pub has_won: bool,
    /// While positive, new construction sites are refused.
    pub no_more_building_sites_countdown: u32,
    #[serde(skip)]
    virtual_buildings: Vec<usize>,
    #[serde(skip)]
    exchange_buildings: Vec<usize>,
    #[serde(skip)]
    gradients: TeamGradients,
    #[serde(skip)]
    events: Vec<TeamEvent>,
}

impl Team {
    /// Create an empty team.
    ///
    /// # Panics
    ///
    /// Panics if `team_number` is not below [`MAX_TEAMS`].
    #[must_use]
    pub fn new(team_number: usize, kind: TeamKind) -> Self {
        assert!(team_number < MAX_TEAMS, "team {team_number} out of range");
        let mut team = Self {
            team_number,
            kind,
            me: 0,
            allies: 0,
            enemies: 0,
            shared_vision_exchange: 0,
            shared_vision_food: 0,
            shared_vision_other: 0,
            players_mask: 0,
            units: SlotTable::with_capacity(SLOTS_PER_TEAM),
            buildings: SlotTable::with_capacity(SLOTS_PER_TEAM),
            prestige: 0,
            unit_kills: 0,
            is_alive: true,
            has_won: false,
            no_more_building_sites_countdown: 0,
            virtual_buildings: Vec::new(),
            exchange_buildings: Vec::new(),
            gradients: TeamGradients::default(),
            events: Vec::new(),
        };
        team.set_correct_masks();
        team
    }

    /// Reset diplomacy: allied only with itself, at war with everyone else.
    pub fn set_correct_masks(&mut self) {
        self.me = team_mask(self.team_number);
        self.allies = self.me;
        self.enemies = !self.me;
        self.shared_vision_exchange = self.me;
        self.shared_vision_food = self.me;
        self.shared_vision_other = self.me;
    }

    /// Whether `gid` belongs to a team this one attacks.
    #[must_use]
    pub fn is_enemy(&self, gid: Gid) -> bool {
        gid.team() < MAX_TEAMS && self.enemies & team_mask(gid.team()) != 0
    }

    /// Unit table.
    #[must_use]
    pub fn units(&self) -> &SlotTable<Unit> {
        &self.units
    }

    /// Building table.
    #[must_use]
    pub fn buildings(&self) -> &SlotTable<Building> {
        &self.buildings
    }

    /// Unit in `slot`.
    #[must_use]
    pub fn unit(&self, slot: usize) -> Option<&Unit> {
        self.units.get(slot)
    }

    /// Mutable unit in `slot`.
    pub fn unit_mut(&mut self, slot: usize) -> Option<&mut Unit> {
        self.units.get_mut(slot)
    }

    /// Building in `slot`.
    #[must_use]
    pub fn building(&self, slot: usize) -> Option<&Building> {
        self.buildings.get(slot)
    }

    /// Mutable building in `slot`.
    pub fn building_mut(&mut self, slot: usize) -> Option<&mut Building> {
        self.buildings.get_mut(slot)
    }

    /// Slots of flags, ascending.
    #[must_use]
    pub fn virtual_buildings(&self) -> &[usize] {
        &self.virtual_buildings
    }

    /// Slots of exchange buildings, ascending.
    #[must_use]
    pub fn exchange_buildings(&self) -> &[usize] {
        &self.exchange_buildings
    }

    /// Events since the last [`Team::clear_events`].
    #[must_use]
    pub fn events(&self) -> &[TeamEvent] {
        &self.events
    }

    /// Record an event.
    pub fn push_event(&mut self, kind: TeamEventKind, gid: Gid, x: i32, y: i32, step: u32) {
        self.events.push(TeamEvent {
            kind,
            gid,
            x,
            y,
            step,
        });
    }

    /// Forget all events.
    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    /// Vision mask used when a building of type `bt` reveals the map.
    #[must_use]
    pub fn vision_for(&self, bt: &BuildingType) -> u32 {
        let shared = if bt.can_exchange {
            self.shared_vision_exchange
        } else if bt.kind == BuildingKind::Food {
            self.shared_vision_food
        } else {
            self.shared_vision_other
        };
        shared | self.me
    }

    /// Place a new unit. Fails if the tile is taken or no slot is free.
    pub fn add_unit(
        &mut self,
        map: &mut Map,
        registry: &TypeRegistry,
        x: i32,
        y: i32,
        kind: UnitKind,
        level: u8,
    ) -> Option<Gid> {
        let ut = registry.unit_type(kind, level)?;
        let (x, y) = map.wrap(x, y);
        let free = if ut.fly {
            map.is_free_for_air_unit(x, y)
        } else {
            map.is_free_for_ground_unit(x, y, ut.swim)
        };
        if !free {
            return None;
        }
        let team = self.team_number;
        let slot = self
            .units
            .insert_with(|slot| Unit::new(Gid::new(team, slot), ut, x, y))?;
        let gid = Gid::new(team, slot);
        if ut.fly {
            map.set_air_unit(x, y, Some(gid));
        } else {
            map.set_ground_unit(x, y, Some(gid));
        }
        Some(gid)
    }

    /// Place a new building in the lowest free slot. Room is not checked.
    #[allow(clippy::too_many_arguments)]
    pub fn add_building(
        &mut self,
        map: &mut Map,
        registry: &TypeRegistry,
        x: i32,
        y: i32,
        type_id: BuildingTypeId,
        unit_working: u32,
        unit_working_future: u32,
    ) -> Option<Gid> {
        let bt = registry.building(type_id);
        let (x, y) = map.wrap(x, y);
        let team = self.team_number;
        let slot = self.buildings.insert_with(|slot| {
            Building::new(
                Gid::new(team, slot),
                bt,
                x,
                y,
                unit_working,
                unit_working_future,
            )
        })?;
        let gid = Gid::new(team, slot);
        if bt.is_virtual {
            insert_sorted(&mut self.virtual_buildings, slot);
        } else {
            map.set_building(x, y, bt.width, bt.height, Some(gid));
        }
        if bt.can_exchange {
            insert_sorted(&mut self.exchange_buildings, slot);
        }
        Some(gid)
    }

    /// Remove a unit from the team and the map, detaching it from its building.
    pub fn remove_unit(&mut self, map: &mut Map, slot: usize) -> Option<Unit> {
        let unit = self.units.remove(slot)?;
        if unit.fly {
            if map.air_unit(unit.x, unit.y) == Some(unit.gid) {
                map.set_air_unit(unit.x, unit.y, None);
            }
        } else if map.ground_unit(unit.x, unit.y) == Some(unit.gid) {
            map.set_ground_unit(unit.x, unit.y, None);
        }
        if let Some(building) = unit.working_for() {
            if let Some(b) = self.buildings.get_mut(building.slot()) {
                b.release(unit.gid);
            }
        }
        Some(unit)
    }

    /// Remove a building from the team and the map, freeing its units.
    pub fn remove_building(
        &mut self,
        map: &mut Map,
        registry: &TypeRegistry,
        slot: usize,
    ) -> Option<Building> {
        let building = self.buildings.remove(slot)?;
        self.free_units(&building.units_working);
        let bt = registry.building(building.type_id);
        if !bt.is_virtual {
            map.set_building(building.x(), building.y(), bt.width, bt.height, None);
        }
        self.virtual_buildings.retain(|&s| s != slot);
        self.exchange_buildings.retain(|&s| s != slot);
        Some(building)
    }

    /// Remove every unit and building of the team from the map.
    pub fn clear_map(&mut self, map: &mut Map, registry: &TypeRegistry) {
        for slot in self.units.occupied() {
            self.remove_unit(map, slot);
        }
        for slot in self.buildings.occupied() {
            self.remove_building(map, registry, slot);
        }
        self.gradients.clear();
        self.events.clear();
    }

    /// Mark units detached from a building as free.
    pub(crate) fn free_units(&mut self, gids: &[Gid]) {
        for gid in gids {
            if let Some(unit) = self.units.get_mut(gid.slot()) {
                if unit.working_for().is_some() {
                    unit.activity = Activity::Free;
                }
            }
        }
    }

    /// Recompute the staffing of one building after its settings changed.
    pub fn update_building(&mut self, registry: &TypeRegistry, slot: usize) {
        let Some(b) = self.buildings.get_mut(slot) else {
            return;
        };
        let bt = registry.building(b.type_id);
        let mut released = if b.is_alive() {
            b.release_excess()
        } else {
            b.release_all()
        };
        if bt.is_virtual {
            let min_level = *b.min_level_to_flag.get();
            let too_low: Vec<Gid> = b
                .units_working
                .iter()
                .copied()
                .filter(|g| self.units.get(g.slot()).is_some_and(|u| u.level < min_level))
                .collect();
            for gid in too_low {
                b.release(gid);
                released.push(gid);
            }
        }
        self.free_units(&released);
    }

    /// Release every unit of a building and let them be re-attached.
    pub fn flush_staffing(&mut self, registry: &TypeRegistry, slot: usize) {
        let Some(b) = self.buildings.get_mut(slot) else {
            return;
        };
        let requested = *b.max_unit_working.get();
        b.max_unit_working.reset(0);
        self.update_building(registry, slot);
        if let Some(b) = self.buildings.get_mut(slot) {
            b.max_unit_working.reset(requested);
        }
        self.update_building(registry, slot);
    }

    /// Rebuild derived lists and drop every cached gradient.
    pub fn update(&mut self, registry: &TypeRegistry) {
        self.virtual_buildings.clear();
        self.exchange_buildings.clear();
        for (slot, b) in self.buildings.iter_mut() {
            let bt = registry.building(b.type_id);
            if bt.is_virtual {
                self.virtual_buildings.push(slot);
            }
            if bt.can_exchange {
                self.exchange_buildings.push(slot);
            }
            b.dirty_local_gradients();
        }
        self.gradients.clear();
    }

    /// Drop team-wide gradients (resources, forbidden zone, guard area).
    pub fn dirty_global_gradient(&mut self) {
        self.gradients.clear();
    }

    /// Drop the forbidden-zone and guard-area gradients.
    pub fn dirty_area_gradients(&mut self) {
        self.gradients.forbidden = None;
        self.gradients.guard = None;
    }

    /// Drop the local gradients of buildings whose window overlaps a rectangle.
    #[allow(clippy::too_many_arguments)]
    pub fn dirty_local_gradient(
        &mut self,
        map: &Map,
        registry: &TypeRegistry,
        x: i32,
        y: i32,
        w: i32,
        h: i32,
    ) {
        for (_, b) in self.buildings.iter_mut() {
            let bt = registry.building(b.type_id);
            if b.local_area_intersects(bt, map, x, y, w, h) {
                b.dirty_local_gradients();
            }
        }
    }

    /// Drop the local gradients of every war flag.
    pub fn dirty_war_flag_gradient(&mut self, registry: &TypeRegistry) {
        for &slot in &self.virtual_buildings {
            if let Some(b) = self.buildings.get_mut(slot) {
                if registry.building(b.type_id).kind == BuildingKind::WarFlag {
                    b.dirty_local_gradients();
                }
            }
        }
    }

    /// Whether the team owns a unit or a real (non-flag) building.
    #[must_use]
    pub fn has_presence(&self, registry: &TypeRegistry) -> bool {
        !self.units.is_empty()
            || self
                .buildings
                .iter()
                .any(|(_, b)| !registry.building(b.type_id).is_virtual)
    }

    /// Advance one tick. Returns the attacks to apply.
    pub fn sync_step(
        &mut self,
        map: &mut Map,
        registry: &TypeRegistry,
        rand: &mut SyncRand,
        step: u32,
    ) -> Vec<DamageEvent> {
        let mut damage = Vec::new();
        self.gradients.sync(map);
        self.buildings_step(map, registry, step, &mut damage);
        self.assign_units(registry);
        self.units_step(map, registry, rand, &mut damage);
        if self.no_more_building_sites_countdown > 0 {
            self.no_more_building_sites_countdown -= 1;
        }
        self.is_alive &= self.has_presence(registry);
        damage
    }

    fn buildings_step(
        &mut self,
        map: &mut Map,
        registry: &TypeRegistry,
        step: u32,
        damage: &mut Vec<DamageEvent>,
    ) {
        for slot in self.buildings.occupied() {
            let Some(b) = self.buildings.get_mut(slot) else {
                continue;
            };
            if b.state == BuildingState::WaitingForDestruction {
                self.remove_building(map, registry, slot);
                continue;
            }
            let bt = registry.building(b.type_id);
            if bt.is_building_site {
                let (gid, x, y) = (b.gid, b.x(), b.y());
                if let Some((done, released)) = b.complete_construction(registry) {
                    let done = registry.building(done);
                    self.prestige += done.prestige;
                    self.free_units(&released);
                    if done.can_exchange {
                        insert_sorted(&mut self.exchange_buildings, slot);
                    }
                    self.push_event(TeamEventKind::BuildingCompleted, gid, x, y, step);
                    tracing::debug!(
                        team = self.team_number,
                        building = %gid,
                        building_type = %done.name,
                        "Construction completed"
                    );
                }
                continue;
            }
            if bt.produces_units() {
                self.produce(map, registry, slot, step);
            }
            if bt.shooting_range > 0 {
                self.shoot(map, registry, slot, damage);
            }
        }
    }

    fn produce(&mut self, map: &mut Map, registry: &TypeRegistry, slot: usize, step: u32) {
        let corn = ResourceKind::Corn.index();
        let Some(b) = self.buildings.get_mut(slot) else {
            return;
        };
        let bt = registry.building(b.type_id);
        if b.resources[corn] < bt.resource_for_one_unit {
            return;
        }
        if b.production_progress < bt.unit_production_time {
            b.production_progress += 1;
            return;
        }
        let Some(kind) = b.next_production_kind() else {
            return;
        };
        let Some(ut) = registry.unit_type(kind, 0) else {
            return;
        };
        let spot = ring(b.x(), b.y(), bt.width, bt.height).find(|&(x, y)| {
            if ut.fly {
                map.is_free_for_air_unit(x, y)
            } else {
                map.is_free_for_ground_unit(x, y, ut.swim)
            }
        });
        let Some((x, y)) = spot else {
            return;
        };
        let (source, cost) = (b.gid, bt.resource_for_one_unit);
        let Some(gid) = self.add_unit(map, registry, x, y, kind, 0) else {
            return;
        };
        if let Some(b) = self.buildings.get_mut(slot) {
            b.resources[corn] -= cost;
            b.production_progress = 0;
            b.production_count += 1;
        }
        self.push_event(TeamEventKind::UnitProduced, gid, x, y, step);
        tracing::debug!(team = self.team_number, swarm = %source, unit = %gid, ?kind, "Unit produced");
    }

    fn shoot(
        &mut self,
        map: &Map,
        registry: &TypeRegistry,
        slot: usize,
        damage: &mut Vec<DamageEvent>,
    ) {
        let enemies = self.enemies;
        let Some(b) = self.buildings.get_mut(slot) else {
            return;
        };
        if b.shoot_cooldown > 0 {
            b.shoot_cooldown -= 1;
            return;
        }
        let bt = registry.building(b.type_id);
        let r = bt.shooting_range;
        for dy in -r..bt.height + r {
            for dx in -r..bt.width + r {
                let Some(target) = map.ground_unit(b.x() + dx, b.y() + dy) else {
                    continue;
                };
                if target.team() < MAX_TEAMS && enemies & team_mask(target.team()) != 0 {
                    damage.push(DamageEvent {
                        attacker: b.gid,
                        target: Target::Unit(target),
                        damage: bt.shoot_damage,
                    });
                    b.shoot_cooldown = bt.shoot_rythme;
                    return;
                }
            }
        }
    }

    fn assign_units(&mut self, registry: &TypeRegistry) {
        let mut free: Vec<usize> = self
            .units
            .iter()
            .filter(|(_, u)| u.activity == Activity::Free)
            .map(|(slot, _)| slot)
            .collect();
        if free.is_empty() {
            return;
        }
        for slot in self.buildings.occupied() {
            let Some(b) = self.buildings.get_mut(slot) else {
                continue;
            };
            let bt = registry.building(b.type_id);
            let mut missing = b.missing_units();
            let mut i = 0;
            while missing > 0 && i < free.len() {
                let Some(unit) = self.units.get_mut(free[i]) else {
                    i += 1;
                    continue;
                };
                if b.accepts(bt, unit.kind, unit.level) {
                    unit.activity = Activity::Working { building: b.gid };
                    b.units_working.push(unit.gid);
                    free.remove(i);
                    missing -= 1;
                } else {
                    i += 1;
                }
            }
            if free.is_empty() {
                break;
            }
        }
    }

    fn units_step(
        &mut self,
        map: &mut Map,
        registry: &TypeRegistry,
        rand: &mut SyncRand,
        damage: &mut Vec<DamageEvent>,
    ) {
        let vision = self.shared_vision_other | self.me;
        let mut ctx = UnitStep {
            map,
            registry,
            rand,
            gradients: &mut self.gradients,
            team: self.team_number,
            enemies: self.enemies,
            damage,
        };
        for slot in self.units.occupied() {
            let Some(unit) = self.units.get_mut(slot) else {
                continue;
            };
            let ut = registry.unit(unit.type_id);
            let r = ut.viewing_range;
            ctx.map
                .set_map_discovered(unit.x - r, unit.y - r, 2 * r + 1, 2 * r + 1, vision);
            if unit.advance(ut.walk_speed) {
                ctx.act(unit, ut, &mut self.buildings);
            }
        }
    }

    /// Check structural invariants against the map.
    ///
    /// # Errors
    ///
    /// Returns a description of the first violation found.
    pub fn integrity(&self, map: &Map, registry: &TypeRegistry) -> Result<(), String> {
        let team = self.team_number;
        for (slot, unit) in self.units.iter() {
            if unit.gid != Gid::new(team, slot) {
                return Err(format!("unit in slot {team}:{slot} has GID {}", unit.gid));
            }
            let on_map = if unit.fly {
                map.air_unit(unit.x, unit.y)
            } else {
                map.ground_unit(unit.x, unit.y)
            };
            if on_map != Some(unit.gid) {
                return Err(format!("unit {} missing from map at ({}, {})", unit.gid, unit.x, unit.y));
            }
            if let Some(building) = unit.working_for() {
                let listed = self
                    .buildings
                    .get(building.slot())
                    .is_some_and(|b| building.team() == team && b.units_working.contains(&unit.gid));
                if !listed {
                    return Err(format!("unit {} works for {building} which does not list it", unit.gid));
                }
            }
        }
        for (slot, b) in self.buildings.iter() {
            if b.gid != Gid::new(team, slot) {
                return Err(format!("building in slot {team}:{slot} has GID {}", b.gid));
            }
            let Some(bt) = registry.get_building(b.type_id) else {
                return Err(format!("building {} has unknown type {}", b.gid, b.type_id.0));
            };
            if !bt.is_virtual {
                for dy in 0..bt.height {
                    for dx in 0..bt.width {
                        if map.building(b.x() + dx, b.y() + dy) != Some(b.gid) {
                            return Err(format!("building {} footprint not on map", b.gid));
                        }
                    }
                }
            }
            for gid in &b.units_working {
                if self.units.get(gid.slot()).and_then(Unit::working_for) != Some(b.gid) {
                    return Err(format!("building {} lists {gid} which works elsewhere", b.gid));
                }
            }
        }
        Ok(())
    }

    /// Checksum of the team, appending entity values to `report`.
    #[must_use]
    pub fn checksum(&self, mut report: Option<&mut ChecksumReport>) -> u32 {
        let mut cs = fold([
            self.team_number as u32,
            self.me,
            self.allies,
            self.enemies,
            self.shared_vision_exchange,
            self.shared_vision_food,
            self.shared_vision_other,
            self.prestige,
            self.unit_kills,
            u32::from(self.is_alive),
            u32::from(self.has_won),
            self.no_more_building_sites_countdown,
        ]);
        for (_, unit) in self.units.iter() {
            let c = unit.checksum();
            if let Some(r) = report.as_deref_mut() {
                r.units.push((unit.gid, c));
            }
            cs = rotr1(cs ^ c);
        }
        for (_, b) in self.buildings.iter() {
            let c = b.checksum();
            if let Some(r) = report.as_deref_mut() {
                r.buildings.push((b.gid, c));
            }
            cs = rotr1(cs ^ c);
        }
        cs
    }
}

fn insert_sorted(list: &mut Vec<usize>, slot: usize) {
    if let Err(pos) = list.binary_search(&slot) {
        list.insert(pos, slot);
    }
}

/// Tiles surrounding a footprint, row-major.
fn ring(x: i32, y: i32, w: i32, h: i32) -> impl Iterator<Item = (i32, i32)> {
    (-1..=h).flat_map(move |dy| {
        (-1..=w)
            .filter(move |&dx| !(0..w).contains(&dx) || !(0..h).contains(&dy))
            .map(move |dx| (x + dx, y + dy))
    })
}

/// Borrowed context for moving one team's units.
struct UnitStep<'a> {
    map: &'a mut Map,
    registry: &'a TypeRegistry,
    rand: &'a mut SyncRand,
    gradients: &'a mut TeamGradients,
    team: usize,
    enemies: u32,
    damage: &'a mut Vec<DamageEvent>,
}

impl UnitStep<'_> {
    fn act(&mut self, unit: &mut Unit, ut: &UnitType, buildings: &mut SlotTable<Building>) {
        match unit.activity {
            Activity::Working { building } => {
                let Some(b) = buildings.get_mut(building.slot()) else {
                    unit.activity = Activity::Free;
                    return;
                };
                let registry = self.registry;
                let bt = registry.building(b.type_id);
                if bt.is_virtual {
                    self.serve_flag(unit, ut, b, bt);
                } else {
                    self.serve_building(unit, ut, b, bt);
                }
            }
            Activity::Free => self.idle(unit, ut),
        }
    }

    fn release(unit: &mut Unit, b: &mut Building) {
        b.release(unit.gid);
        unit.activity = Activity::Free;
    }

    fn serve_building(&mut self, unit: &mut Unit, ut: &UnitType, b: &mut Building, bt: &BuildingType) {
        if let Some(kind) = unit.carried {
            if b.is_adjacent(bt, self.map, unit.x, unit.y) {
                b.deliver(bt, kind);
                unit.carried = None;
                if b.needed_resource(bt).is_none() {
                    Self::release(unit, b);
                }
            } else {
                self.move_to_building(unit, ut, b, bt);
            }
            return;
        }
        let Some(kind) = b.needed_resource(bt) else {
            Self::release(unit, b);
            return;
        };
        if self.harvest_adjacent(unit, ut, |_, _, k| k == kind) {
            return;
        }
        let gradient = self.gradients.resource(self.map, kind, ut.swim);
        if gradient.value(unit.x, unit.y) == UNREACHABLE {
            Self::release(unit, b);
            return;
        }
        if let Some((dx, dy)) = gradient.best_step(unit.x, unit.y) {
            unit.try_step(self.map, dx, dy, ut.swim);
        }
    }

    fn serve_flag(&mut self, unit: &mut Unit, ut: &UnitType, b: &mut Building, bt: &BuildingType) {
        let in_range = b.in_stay_range(self.map, unit.x, unit.y);
        match bt.kind {
            BuildingKind::WarFlag => {
                if !self.attack_adjacent(unit, ut) && !in_range {
                    self.move_to_building(unit, ut, b, bt);
                }
            }
            BuildingKind::ClearingFlag => {
                if unit.carried.take().is_some() {
                    return;
                }
                let mask = *b.clearing_mask.get();
                let (fx, fy, range) = (b.x(), b.y(), *b.unit_stay_range.get());
                let (mw, mh) = (self.map.width(), self.map.height());
                let clears = |x: i32, y: i32, k: ResourceKind| {
                    mask & k.bit() != 0
                        && torus_distance(fx, fy, x, y, mw, mh) as u32 <= range
                };
                if in_range && self.harvest_adjacent(unit, ut, clears) {
                    return;
                }
                if in_range {
                    self.wander(unit, ut);
                } else {
                    self.move_to_building(unit, ut, b, bt);
                }
            }
            _ => {
                if in_range {
                    self.wander(unit, ut);
                } else {
                    self.move_to_building(unit, ut, b, bt);
                }
            }
        }
    }

    fn idle(&mut self, unit: &mut Unit, ut: &UnitType) {
        unit.carried = None;
        if !unit.fly && self.map.is_area(AreaLayer::Forbidden, unit.x, unit.y, self.team) {
            let gradient = self.gradients.forbidden(self.map, self.team);
            if let Some((dx, dy)) = gradient.best_step(unit.x, unit.y) {
                unit.try_step(self.map, dx, dy, ut.swim);
            }
            return;
        }
        match unit.kind {
            UnitKind::Warrior => {
                if self.attack_adjacent(unit, ut) {
                    return;
                }
                let gradient = self.gradients.guard(self.map, self.team);
                if gradient.value(unit.x, unit.y) != UNREACHABLE {
                    if let Some((dx, dy)) = gradient.best_step(unit.x, unit.y) {
                        unit.try_step(self.map, dx, dy, ut.swim);
                    }
                }
            }
            UnitKind::Explorer => self.wander(unit, ut),
            UnitKind::Worker => {
                let team = self.team;
                let map: &Map = self.map;
                let in_clear_area = |x: i32, y: i32| map.is_area(AreaLayer::ClearArea, x, y, team);
                let target = NEIGHBOURS.into_iter().find(|&(dx, dy)| {
                    let (x, y) = (unit.x + dx, unit.y + dy);
                    in_clear_area(x, y) && map.resource(x, y).is_some_and(|r| r.amount > 0)
                });
                if let Some((dx, dy)) = target {
                    self.map.harvest(unit.x + dx, unit.y + dy, ut.harvest_amount);
                    unit.set_direction(dx, dy);
                }
            }
        }
    }

    fn harvest_adjacent(
        &mut self,
        unit: &mut Unit,
        ut: &UnitType,
        wanted: impl Fn(i32, i32, ResourceKind) -> bool,
    ) -> bool {
        for (dx, dy) in NEIGHBOURS {
            let (x, y) = (unit.x + dx, unit.y + dy);
            let Some(resource) = self.map.resource(x, y) else {
                continue;
            };
            if resource.amount == 0 || !wanted(x, y, resource.kind) {
                continue;
            }
            if let Some(kind) = self.map.harvest(x, y, ut.harvest_amount) {
                unit.carried = Some(kind);
                unit.set_direction(dx, dy);
                return true;
            }
        }
        false
    }

    fn attack_adjacent(&mut self, unit: &mut Unit, ut: &UnitType) -> bool {
        if ut.attack_strength == 0 {
            return false;
        }
        let enemies = self.enemies;
        let is_enemy = |gid: Gid| gid.team() < MAX_TEAMS && enemies & team_mask(gid.team()) != 0;
        for (dx, dy) in NEIGHBOURS {
            let (x, y) = (unit.x + dx, unit.y + dy);
            let target = match (self.map.ground_unit(x, y), self.map.building(x, y)) {
                (Some(g), _) if is_enemy(g) => Target::Unit(g),
                (_, Some(g)) if is_enemy(g) => Target::Building(g),
                _ => continue,
            };
            self.damage.push(DamageEvent {
                attacker: unit.gid,
                target,
                damage: ut.attack_strength,
            });
            unit.set_direction(dx, dy);
            return true;
        }
        false
    }

    fn wander(&mut self, unit: &mut Unit, ut: &UnitType) {
        let (dx, dy) = NEIGHBOURS[self.rand.below(8) as usize];
        unit.try_step(self.map, dx, dy, ut.swim);
    }

    fn move_to_building(&mut self, unit: &mut Unit, ut: &UnitType, b: &mut Building, bt: &BuildingType) {
        let medium = if unit.fly { Medium::Air } else { Medium::Ground };
        let guided = match b.local_gradient(bt, self.map, medium, ut.swim) {
            Some(g) if g.value(unit.x, unit.y) != UNREACHABLE => Some(g.best_step(unit.x, unit.y)),
            _ => None,
        };
        match guided {
            Some(Some((dx, dy))) => {
                unit.try_step(self.map, dx, dy, ut.swim);
            }
            Some(None) => {}
            None => {
                unit.step_toward(self.map, b.x(), b.y(), ut.swim);
            }
        }
    }
}
