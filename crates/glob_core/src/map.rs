//! Toroidal tile map.
//!
//! Dimensions are powers of two so that every coordinate wraps with a
//! mask. Cells store terrain, resources, occupancy GIDs and per-team area
//! masks. Discovery and fog-of-war are per-team bit masks.
//!
//! The map never owns entities: ground units, air units and buildings are
//! recorded as GIDs pointing into the teams' slot tables.

use serde::{Deserialize, Serialize};

use crate::checksum::rotr1;
use crate::error::{GameError, Result};
use crate::ids::{team_mask, Gid};
use crate::resources::{Resource, ResourceKind};

/// Smallest accepted map side.
pub const MIN_MAP_SIZE: u32 = 16;

/// Largest accepted map side.
pub const MAX_MAP_SIZE: u32 = 1024;

/// Ground type of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Terrain {
    /// Buildable land.
    #[default]
    Grass,
    /// Walkable, not buildable.
    Sand,
    /// Only swimmers and flyers pass.
    Water,
}

/// Per-team tile layers altered by area orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AreaLayer {
    /// Units of the team avoid these tiles.
    Forbidden,
    /// Warriors of the team patrol these tiles.
    GuardArea,
    /// Workers of the team clear resources on these tiles.
    ClearArea,
}

impl AreaLayer {
    /// All layers.
    pub const ALL: [Self; 3] = [Self::Forbidden, Self::GuardArea, Self::ClearArea];

    const fn index(self) -> usize {
        self as usize
    }
}

/// One map tile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    /// Ground type.
    pub terrain: Terrain,
    /// Deposit, if any.
    pub resource: Option<Resource>,
    /// Walking or swimming unit standing here.
    pub ground_unit: Option<Gid>,
    /// Flying unit above this tile.
    pub air_unit: Option<Gid>,
    /// Building covering this tile.
    pub building: Option<Gid>,
    /// Team masks, indexed by [`AreaLayer`].
    pub areas: [u32; 3],
}

/// The game map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Map {
    width: u32,
    height: u32,
    cells: Vec<Cell>,
    discovered: Vec<u32>,
    #[serde(skip)]
    fog: [Vec<u32>; 2],
    #[serde(skip)]
    fog_current: usize,
    #[serde(skip)]
    local_areas: [Vec<bool>; 3],
    #[serde(skip)]
    generation: u32,
}

impl Map {
    /// Create a map filled with `terrain`.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidMapSize`] unless both sides are powers of
    /// two between 16 and 1024.
    pub fn new(width: u32, height: u32, terrain: Terrain) -> Result<Self> {
        let valid = |s: u32| s.is_power_of_two() && (MIN_MAP_SIZE..=MAX_MAP_SIZE).contains(&s);
        if !valid(width) || !valid(height) {
            return Err(GameError::InvalidMapSize { width, height });
        }
        let len = (width * height) as usize;
        let mut map = Self {
            width,
            height,
            cells: vec![
                Cell {
                    terrain,
                    ..Cell::default()
                };
                len
            ],
            discovered: vec![0; len],
            fog: Default::default(),
            fog_current: 0,
            local_areas: Default::default(),
            generation: 0,
        };
        map.rebuild_derived();
        Ok(map)
    }

    /// Size the layers that are not saved; called after deserialization.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Integrity`] if the loaded dimensions or layer
    /// lengths are inconsistent.
    pub fn finish_load(&mut self) -> Result<()> {
        let valid = |s: u32| s.is_power_of_two() && (MIN_MAP_SIZE..=MAX_MAP_SIZE).contains(&s);
        if !valid(self.width) || !valid(self.height) {
            return Err(GameError::Integrity(format!(
                "map size {}x{} is not valid",
                self.width, self.height
            )));
        }
        let len = (self.width * self.height) as usize;
        if self.cells.len() != len || self.discovered.len() != len {
            return Err(GameError::Integrity(format!(
                "map layers hold {} cells and {} discovery masks, expected {len}",
                self.cells.len(),
                self.discovered.len()
            )));
        }
        self.rebuild_derived();
        Ok(())
    }

    fn rebuild_derived(&mut self) {
        let len = self.cells.len();
        self.fog = [vec![0; len], vec![0; len]];
        self.fog_current = 0;
        self.local_areas = [vec![false; len], vec![false; len], vec![false; len]];
        self.generation = self.generation.wrapping_add(1);
    }

    /// Width in tiles.
    #[must_use]
    pub const fn width(&self) -> i32 {
        self.width as i32
    }

    /// Height in tiles.
    #[must_use]
    pub const fn height(&self) -> i32 {
        self.height as i32
    }

    /// Mask wrapping x coordinates.
    #[must_use]
    pub const fn w_mask(&self) -> i32 {
        self.width as i32 - 1
    }

    /// Mask wrapping y coordinates.
    #[must_use]
    pub const fn h_mask(&self) -> i32 {
        self.height as i32 - 1
    }

    /// Wrap a coordinate pair onto the torus.
    #[must_use]
    pub const fn wrap(&self, x: i32, y: i32) -> (i32, i32) {
        (x & self.w_mask(), y & self.h_mask())
    }

    fn index(&self, x: i32, y: i32) -> usize {
        let (x, y) = self.wrap(x, y);
        (y as usize) * (self.width as usize) + x as usize
    }

    /// Counter bumped whenever obstacles or resources change.
    ///
    /// Cached gradients compare it to decide whether they are stale.
    #[must_use]
    pub const fn generation(&self) -> u32 {
        self.generation
    }

    fn touch(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    /// Tile at `(x, y)` (wrapped).
    #[must_use]
    pub fn cell(&self, x: i32, y: i32) -> &Cell {
        &self.cells[self.index(x, y)]
    }

    /// Terrain at `(x, y)`.
    #[must_use]
    pub fn terrain(&self, x: i32, y: i32) -> Terrain {
        self.cell(x, y).terrain
    }

    /// Change the terrain at `(x, y)`.
    pub fn set_terrain(&mut self, x: i32, y: i32, terrain: Terrain) {
        let i = self.index(x, y);
        self.cells[i].terrain = terrain;
        self.touch();
    }

    /// Deposit at `(x, y)`.
    #[must_use]
    pub fn resource(&self, x: i32, y: i32) -> Option<Resource> {
        self.cell(x, y).resource
    }

    /// Place or clear a deposit.
    pub fn set_resource(&mut self, x: i32, y: i32, resource: Option<Resource>) {
        let i = self.index(x, y);
        self.cells[i].resource = resource;
        self.touch();
    }

    /// Take up to `amount` units from the deposit at `(x, y)`.
    ///
    /// Returns the kind harvested, if anything was there. Stone deposits
    /// disappear when exhausted; other kinds stay and regrow.
    pub fn harvest(&mut self, x: i32, y: i32, amount: u8) -> Option<ResourceKind> {
        let i = self.index(x, y);
        let resource = self.cells[i].resource.as_mut()?;
        if resource.amount == 0 {
            return None;
        }
        let kind = resource.kind;
        resource.amount = resource.amount.saturating_sub(amount.max(1));
        if resource.amount == 0 {
            if !kind.regrows() {
                self.cells[i].resource = None;
            }
            self.touch();
        }
        Some(kind)
    }

    /// Whether `(x, y)` holds a harvestable deposit of `kind`.
    #[must_use]
    pub fn has_resource(&self, x: i32, y: i32, kind: ResourceKind) -> bool {
        matches!(self.resource(x, y), Some(r) if r.kind == kind && r.amount > 0)
    }

    /// Ground unit at `(x, y)`.
    #[must_use]
    pub fn ground_unit(&self, x: i32, y: i32) -> Option<Gid> {
        self.cell(x, y).ground_unit
    }

    /// Set the ground unit at `(x, y)`.
    pub fn set_ground_unit(&mut self, x: i32, y: i32, gid: Option<Gid>) {
        let i = self.index(x, y);
        self.cells[i].ground_unit = gid;
    }

    /// Air unit at `(x, y)`.
    #[must_use]
    pub fn air_unit(&self, x: i32, y: i32) -> Option<Gid> {
        self.cell(x, y).air_unit
    }

    /// Set the air unit at `(x, y)`.
    pub fn set_air_unit(&mut self, x: i32, y: i32, gid: Option<Gid>) {
        let i = self.index(x, y);
        self.cells[i].air_unit = gid;
    }

    /// Building covering `(x, y)`.
    #[must_use]
    pub fn building(&self, x: i32, y: i32) -> Option<Gid> {
        self.cell(x, y).building
    }

    /// Set the building of every tile of a `w` by `h` footprint.
    pub fn set_building(&mut self, x: i32, y: i32, w: i32, h: i32, gid: Option<Gid>) {
        for dy in 0..h {
            for dx in 0..w {
                let i = self.index(x + dx, y + dy);
                self.cells[i].building = gid;
            }
        }
        self.touch();
    }

    /// Whether a walking unit could stand on `(x, y)`.
    #[must_use]
    pub fn is_free_for_ground_unit(&self, x: i32, y: i32, can_swim: bool) -> bool {
        let cell = self.cell(x, y);
        cell.ground_unit.is_none()
            && cell.building.is_none()
            && cell.resource.is_none()
            && (can_swim || cell.terrain != Terrain::Water)
    }

    /// Whether a flying unit could hover over `(x, y)`.
    #[must_use]
    pub fn is_free_for_air_unit(&self, x: i32, y: i32) -> bool {
        self.cell(x, y).air_unit.is_none()
    }

    /// Whether walking units are stopped by terrain, deposits or buildings at `(x, y)`.
    #[must_use]
    pub fn is_ground_obstacle(&self, x: i32, y: i32, can_swim: bool) -> bool {
        let cell = self.cell(x, y);
        cell.building.is_some()
            || cell.resource.is_some()
            || (!can_swim && cell.terrain == Terrain::Water)
    }

    /// Whether a single tile could host a building right now.
    #[must_use]
    pub fn is_free_for_building(&self, x: i32, y: i32) -> bool {
        let cell = self.cell(x, y);
        cell.terrain == Terrain::Grass
            && cell.resource.is_none()
            && cell.building.is_none()
            && cell.ground_unit.is_none()
    }

    /// Whether every tile of a footprint could host a building right now.
    #[must_use]
    pub fn is_free_for_building_area(&self, x: i32, y: i32, w: i32, h: i32) -> bool {
        (0..h).all(|dy| (0..w).all(|dx| self.is_free_for_building(x + dx, y + dy)))
    }

    /// Whether a footprint is blocked only by things that move away.
    ///
    /// Terrain, deposits and buildings are hard obstacles; units are not.
    #[must_use]
    pub fn is_hard_space_for_building(&self, x: i32, y: i32, w: i32, h: i32) -> bool {
        (0..h).all(|dy| {
            (0..w).all(|dx| {
                let cell = self.cell(x + dx, y + dy);
                cell.terrain == Terrain::Grass && cell.resource.is_none() && cell.building.is_none()
            })
        })
    }

    /// Team mask of `layer` at `(x, y)`.
    #[must_use]
    pub fn area(&self, layer: AreaLayer, x: i32, y: i32) -> u32 {
        self.cell(x, y).areas[layer.index()]
    }

    /// Whether `team` has `layer` set at `(x, y)`.
    #[must_use]
    pub fn is_area(&self, layer: AreaLayer, x: i32, y: i32, team: usize) -> bool {
        self.area(layer, x, y) & team_mask(team) != 0
    }

    /// Set or clear the bit of `team` on `layer` at `(x, y)`.
    pub fn set_area(&mut self, layer: AreaLayer, x: i32, y: i32, team: usize, on: bool) {
        let i = self.index(x, y);
        let mask = &mut self.cells[i].areas[layer.index()];
        if on {
            *mask |= team_mask(team);
        } else {
            *mask &= !team_mask(team);
        }
    }

    /// Set or clear the bit of `team` on `layer` over a footprint.
    #[allow(clippy::too_many_arguments)]
    pub fn set_area_rect(
        &mut self,
        layer: AreaLayer,
        x: i32,
        y: i32,
        w: i32,
        h: i32,
        team: usize,
        on: bool,
    ) {
        for dy in 0..h {
            for dx in 0..w {
                self.set_area(layer, x + dx, y + dy, team, on);
            }
        }
    }

    /// Locally predicted value of `layer` at `(x, y)` for the local team.
    #[must_use]
    pub fn local_area(&self, layer: AreaLayer, x: i32, y: i32) -> bool {
        self.local_areas[layer.index()][self.index(x, y)]
    }

    /// Set the locally predicted value of `layer` at `(x, y)`.
    pub fn set_local_area(&mut self, layer: AreaLayer, x: i32, y: i32, on: bool) {
        let i = self.index(x, y);
        self.local_areas[layer.index()][i] = on;
    }

    /// Copy `team`'s authoritative area bits into the local layers.
    pub fn reset_local_areas(&mut self, team: usize) {
        let mask = team_mask(team);
        for layer in AreaLayer::ALL {
            let li = layer.index();
            for (local, cell) in self.local_areas[li].iter_mut().zip(&self.cells) {
                *local = cell.areas[li] & mask != 0;
            }
        }
    }

    /// Mark a rectangle as discovered and currently visible for `vision`.
    pub fn set_map_discovered(&mut self, x: i32, y: i32, w: i32, h: i32, vision: u32) {
        for dy in 0..h {
            for dx in 0..w {
                let i = self.index(x + dx, y + dy);
                self.discovered[i] |= vision;
                self.fog[self.fog_current][i] |= vision;
            }
        }
    }

    /// Forget all discovery and visibility.
    pub fn unset_map_discovered(&mut self) {
        self.discovered.fill(0);
        for fog in &mut self.fog {
            fog.fill(0);
        }
    }

    /// Whether `team` has ever seen `(x, y)`.
    #[must_use]
    pub fn is_map_discovered(&self, x: i32, y: i32, team: usize) -> bool {
        self.discovered[self.index(x, y)] & team_mask(team) != 0
    }

    /// Whether `team` currently sees `(x, y)`.
    ///
    /// A tile stays visible until one full fog period passes without
    /// anything of the team seeing it.
    #[must_use]
    pub fn is_fog_discovered(&self, x: i32, y: i32, team: usize) -> bool {
        let i = self.index(x, y);
        (self.fog[0][i] | self.fog[1][i]) & team_mask(team) != 0
    }

    /// Start a new fog period: the older buffer is cleared and becomes current.
    pub fn switch_fog_of_war(&mut self) {
        self.fog_current ^= 1;
        self.fog[self.fog_current].fill(0);
    }

    /// Clear every trace of `team` from the area and discovery layers.
    pub fn clear_team(&mut self, team: usize) {
        let keep = !team_mask(team);
        for cell in &mut self.cells {
            for mask in &mut cell.areas {
                *mask &= keep;
            }
        }
        for mask in &mut self.discovered {
            *mask &= keep;
        }
        for fog in &mut self.fog {
            for mask in fog.iter_mut() {
                *mask &= keep;
            }
        }
    }

    /// Ambient per-tick step: deposits on one row grow back by one unit.
    pub fn sync_step(&mut self, step: u32) {
        let y = (step % self.height) as i32;
        let mut grew_from_empty = false;
        for x in 0..self.width() {
            let i = self.index(x, y);
            if let Some(resource) = self.cells[i].resource.as_mut() {
                if resource.kind.regrows() && resource.amount < resource.kind.max_amount() {
                    grew_from_empty |= resource.amount == 0;
                    resource.amount += 1;
                }
            }
        }
        if grew_from_empty {
            self.touch();
        }
    }

    /// Every GID stored on the map, with its position and layer name.
    pub fn gids(&self) -> impl Iterator<Item = (i32, i32, &'static str, Gid)> + '_ {
        let w = self.width as usize;
        self.cells.iter().enumerate().flat_map(move |(i, cell)| {
            let (x, y) = ((i % w) as i32, (i / w) as i32);
            [
                ("ground", cell.ground_unit),
                ("air", cell.air_unit),
                ("building", cell.building),
            ]
            .into_iter()
            .filter_map(move |(layer, gid)| gid.map(|g| (x, y, layer, g)))
        })
    }

    /// Checksum of the map.
    ///
    /// The light variant covers dimensions and deposits; the heavy one also
    /// folds in every occupancy GID and area mask.
    #[must_use]
    pub fn checksum(&self, heavy: bool) -> u32 {
        let mut cs = self.width;
        cs = rotr1(cs) ^ self.height;
        let total: u32 = self
            .cells
            .iter()
            .filter_map(|c| c.resource)
            .map(|r| u32::from(r.amount))
            .sum();
        cs = rotr1(cs) ^ total;
        if heavy {
            let raw = |g: Option<Gid>| g.map_or(0xFFFF, |g| u32::from(g.raw()));
            for cell in &self.cells {
                cs = rotr1(cs) ^ raw(cell.ground_unit);
                cs ^= raw(cell.air_unit) << 16;
                cs = rotr1(cs) ^ raw(cell.building);
                cs ^= cell.areas[0] ^ cell.areas[1].rotate_left(8) ^ cell.areas[2].rotate_left(16);
            }
        }
        cs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map() -> Map {
        Map::new(32, 32, Terrain::Grass).unwrap()
    }

    #[test]
    fn test_rejects_bad_sizes() {
        assert!(Map::new(30, 32, Terrain::Grass).is_err());
        assert!(Map::new(8, 8, Terrain::Grass).is_err());
        assert!(Map::new(2048, 16, Terrain::Grass).is_err());
        assert!(Map::new(16, 1024, Terrain::Grass).is_ok());
    }

    #[test]
    fn test_coordinates_wrap() {
        let mut m = map();
        m.set_ground_unit(-1, 33, Some(Gid::new(0, 4)));
        assert_eq!(m.ground_unit(31, 1), Some(Gid::new(0, 4)));
    }

    #[test]
    fn test_building_footprint_wraps() {
        let mut m = map();
        let gid = Gid::new(1, 0);
        m.set_building(31, 31, 2, 2, Some(gid));
        assert_eq!(m.building(0, 0), Some(gid));
        assert_eq!(m.building(31, 0), Some(gid));
        assert!(!m.is_free_for_building_area(30, 30, 2, 2));
        m.set_building(31, 31, 2, 2, None);
        assert!(m.is_free_for_building_area(30, 30, 3, 3));
    }

    #[test]
    fn test_hard_space_ignores_units() {
        let mut m = map();
        m.set_ground_unit(5, 5, Some(Gid::new(0, 0)));
        assert!(!m.is_free_for_building_area(4, 4, 2, 2));
        assert!(m.is_hard_space_for_building(4, 4, 2, 2));
        m.set_terrain(4, 4, Terrain::Water);
        assert!(!m.is_hard_space_for_building(4, 4, 2, 2));
    }

    #[test]
    fn test_harvest_and_regrow() {
        let mut m = map();
        m.set_resource(3, 0, Some(Resource { kind: ResourceKind::Corn, amount: 1 }));
        assert_eq!(m.harvest(3, 0, 1), Some(ResourceKind::Corn));
        assert!(!m.has_resource(3, 0, ResourceKind::Corn));
        assert_eq!(m.harvest(3, 0, 1), None);
        let before = m.generation();
        m.sync_step(32);
        assert!(m.has_resource(3, 0, ResourceKind::Corn));
        assert_ne!(m.generation(), before);
    }

    #[test]
    fn test_stone_disappears_when_exhausted() {
        let mut m = map();
        m.set_resource(1, 1, Some(Resource { kind: ResourceKind::Stone, amount: 1 }));
        assert_eq!(m.harvest(1, 1, 3), Some(ResourceKind::Stone));
        assert_eq!(m.resource(1, 1), None);
    }

    #[test]
    fn test_area_bits_per_team() {
        let mut m = map();
        m.set_area(AreaLayer::Forbidden, 2, 2, 3, true);
        m.set_area(AreaLayer::Forbidden, 2, 2, 5, true);
        assert!(m.is_area(AreaLayer::Forbidden, 2, 2, 3));
        m.set_area(AreaLayer::Forbidden, 2, 2, 3, false);
        assert!(!m.is_area(AreaLayer::Forbidden, 2, 2, 3));
        assert!(m.is_area(AreaLayer::Forbidden, 2, 2, 5));
        assert!(!m.is_area(AreaLayer::GuardArea, 2, 2, 5));

        m.reset_local_areas(5);
        assert!(m.local_area(AreaLayer::Forbidden, 2, 2));
        assert!(!m.local_area(AreaLayer::Forbidden, 3, 2));
    }

    #[test]
    fn test_fog_expires_after_two_switches() {
        let mut m = map();
        m.set_map_discovered(0, 0, 2, 2, team_mask(1));
        assert!(m.is_fog_discovered(1, 1, 1));
        m.switch_fog_of_war();
        assert!(m.is_fog_discovered(1, 1, 1));
        m.switch_fog_of_war();
        assert!(!m.is_fog_discovered(1, 1, 1));
        assert!(m.is_map_discovered(1, 1, 1));
    }

    #[test]
    fn test_heavy_checksum_sees_units() {
        let mut m = map();
        let light = m.checksum(false);
        let heavy = m.checksum(true);
        m.set_ground_unit(4, 4, Some(Gid::new(0, 1)));
        assert_eq!(m.checksum(false), light);
        assert_ne!(m.checksum(true), heavy);
    }

    #[test]
    fn test_serde_skips_derived_layers() {
        let mut m = map();
        m.set_map_discovered(0, 0, 1, 1, 1);
        m.set_local_area(AreaLayer::GuardArea, 0, 0, true);
        let bytes = bincode::serialize(&m).unwrap();
        let mut back: Map = bincode::deserialize(&bytes).unwrap();
        back.finish_load().unwrap();
        assert!(back.is_map_discovered(0, 0, 0));
        assert!(!back.is_fog_discovered(0, 0, 0));
        assert!(!back.local_area(AreaLayer::GuardArea, 0, 0));
        assert_eq!(back.checksum(true), m.checksum(true));
    }
}
