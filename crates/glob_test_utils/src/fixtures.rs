//! Test fixtures and helpers.
//!
//! Pre-built games and a builder for consistent scenario setup.

use std::sync::Arc;

use glob_core::prelude::*;

/// Registry built from the bundled data.
///
/// # Panics
///
/// Panics if the bundled data does not load.
#[must_use]
pub fn registry() -> Arc<TypeRegistry> {
    Arc::new(TypeRegistry::standard().expect("bundled type data loads"))
}

/// Type id of a bundled building.
///
/// # Panics
///
/// Panics if no building has that name.
#[must_use]
pub fn building_type(registry: &TypeRegistry, name: &str) -> BuildingTypeId {
    registry
        .building_id(name)
        .unwrap_or_else(|| panic!("no building type named {name}"))
}

#[derive(Debug, Clone)]
struct UnitSpec {
    x: i32,
    y: i32,
    team: usize,
    kind: UnitKind,
    level: u8,
}

#[derive(Debug, Clone)]
struct BuildingSpec {
    x: i32,
    y: i32,
    team: usize,
    name: String,
}

/// Builder for test games.
///
/// Each team gets one player of the matching kind, numbered like the team.
#[derive(Debug, Clone)]
pub struct GameBuilder {
    name: String,
    width: u32,
    height: u32,
    terrain: Terrain,
    teams: Vec<TeamKind>,
    units: Vec<UnitSpec>,
    buildings: Vec<BuildingSpec>,
    resources: Vec<(i32, i32, ResourceKind)>,
    water: Vec<(i32, i32)>,
    seeds: Option<[u32; 3]>,
}

impl GameBuilder {
    /// Start a grass map of the given size.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            name: "Test Map".to_string(),
            width,
            height,
            terrain: Terrain::Grass,
            teams: Vec::new(),
            units: Vec::new(),
            buildings: Vec::new(),
            resources: Vec::new(),
            water: Vec::new(),
            seeds: None,
        }
    }

    /// Set the map name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Add a team.
    #[must_use]
    pub fn team(mut self, kind: TeamKind) -> Self {
        self.teams.push(kind);
        self
    }

    /// Place a unit.
    #[must_use]
    pub fn unit(mut self, team: usize, kind: UnitKind, x: i32, y: i32) -> Self {
        self.units.push(UnitSpec { x, y, team, kind, level: 0 });
        self
    }

    /// Place a unit of a given level.
    #[must_use]
    pub fn unit_at_level(mut self, team: usize, kind: UnitKind, level: u8, x: i32, y: i32) -> Self {
        self.units.push(UnitSpec { x, y, team, kind, level });
        self
    }

    /// Place a bundled building by name.
    #[must_use]
    pub fn building(mut self, team: usize, name: &str, x: i32, y: i32) -> Self {
        self.buildings.push(BuildingSpec {
            x,
            y,
            team,
            name: name.to_string(),
        });
        self
    }

    /// Put a full deposit on a tile.
    #[must_use]
    pub fn resource(mut self, kind: ResourceKind, x: i32, y: i32) -> Self {
        self.resources.push((x, y, kind));
        self
    }

    /// Fill a rectangle with deposits.
    #[must_use]
    pub fn resource_field(mut self, kind: ResourceKind, x: i32, y: i32, w: i32, h: i32) -> Self {
        for dy in 0..h {
            for dx in 0..w {
                self.resources.push((x + dx, y + dy, kind));
            }
        }
        self
    }

    /// Turn a tile into water.
    #[must_use]
    pub fn water(mut self, x: i32, y: i32) -> Self {
        self.water.push((x, y));
        self
    }

    /// Seed the shared generator.
    #[must_use]
    pub fn seeds(mut self, seeds: [u32; 3]) -> Self {
        self.seeds = Some(seeds);
        self
    }

    /// Build the game.
    ///
    /// # Panics
    ///
    /// Panics if the map size is invalid, a team is missing, a building
    /// name is unknown or a placement is blocked.
    #[must_use]
    pub fn build(self) -> Game {
        let registry = registry();
        let map = Map::new(self.width, self.height, self.terrain).expect("valid map size");
        let mut game = Game::new(registry.clone(), map);
        game.map_header.name = self.name;
        for kind in &self.teams {
            game.add_team(*kind).expect("team fits");
        }
        let players = self
            .teams
            .iter()
            .enumerate()
            .map(|(i, kind)| BasePlayer {
                number: i,
                name: format!("player {i}"),
                team: i,
                kind: match kind {
                    TeamKind::Human => PlayerKind::Human,
                    TeamKind::Ai => PlayerKind::Ai,
                },
            })
            .collect();
        game.set_game_header(GameHeader {
            players,
            order_latency: 0,
        })
        .expect("players reference teams");

        for (x, y) in self.water {
            game.map.set_terrain(x, y, Terrain::Water);
        }
        for (x, y, kind) in self.resources {
            game.map.set_resource(x, y, Some(glob_core::resources::Resource::full(kind)));
        }
        for b in self.buildings {
            let type_id = building_type(&registry, &b.name);
            let bt = registry.building(type_id);
            let gid = game
                .add_building(b.x, b.y, type_id, b.team, bt.max_unit_working, bt.max_unit_working)
                .unwrap_or_else(|| panic!("{} does not fit at ({}, {})", b.name, b.x, b.y));
            game.teams[b.team].update_building(&registry, gid.slot());
        }
        for u in self.units {
            game.add_unit(u.x, u.y, u.team, u.kind, u.level)
                .unwrap_or_else(|| panic!("unit does not fit at ({}, {})", u.x, u.y));
        }
        if let Some(seeds) = self.seeds {
            game.sync_rand.set_seeds(seeds);
        }
        game
    }
}

/// Two human teams on a 64x64 map, each with a swarm, workers and food.
#[must_use]
pub fn duel() -> Game {
    GameBuilder::new(64, 64)
        .name("Duel")
        .team(TeamKind::Human)
        .team(TeamKind::Human)
        .building(0, "swarm_0", 8, 8)
        .building(1, "swarm_0", 40, 40)
        .resource_field(ResourceKind::Corn, 12, 4, 4, 3)
        .resource_field(ResourceKind::Wood, 4, 14, 3, 3)
        .resource_field(ResourceKind::Corn, 44, 36, 4, 3)
        .resource_field(ResourceKind::Wood, 36, 46, 3, 3)
        .unit(0, UnitKind::Worker, 6, 6)
        .unit(0, UnitKind::Worker, 7, 6)
        .unit(0, UnitKind::Worker, 10, 6)
        .unit(1, UnitKind::Worker, 38, 38)
        .unit(1, UnitKind::Worker, 39, 38)
        .unit(1, UnitKind::Worker, 42, 38)
        .build()
}

/// Two human teams split by a channel, with swimming workers.
///
/// Team 0's corn lies across the water, and a food site sits on the
/// bank, so walkers and swimmers reach the same buildings by different
/// routes.
#[must_use]
pub fn lakeside() -> Game {
    let mut builder = GameBuilder::new(64, 64)
        .name("Lakeside")
        .team(TeamKind::Human)
        .team(TeamKind::Human)
        .seeds([3, 5, 8])
        .building(0, "swarm_0", 8, 8)
        .building(0, "food_site_0", 16, 12)
        .building(1, "swarm_0", 40, 40)
        .resource_field(ResourceKind::Corn, 28, 6, 3, 3)
        .resource_field(ResourceKind::Wood, 4, 16, 3, 3)
        .resource_field(ResourceKind::Corn, 44, 36, 4, 3)
        .unit_at_level(0, UnitKind::Worker, 1, 6, 6)
        .unit_at_level(0, UnitKind::Worker, 1, 7, 6)
        .unit(0, UnitKind::Worker, 10, 6)
        .unit_at_level(1, UnitKind::Worker, 1, 38, 38)
        .unit(1, UnitKind::Worker, 39, 38);
    for y in 0..64 {
        for x in 22..25 {
            builder = builder.water(x, y);
        }
    }
    builder.build()
}

/// Four teams with warriors close enough to fight.
#[must_use]
pub fn skirmish() -> Game {
    let mut builder = GameBuilder::new(64, 64)
        .name("Skirmish")
        .team(TeamKind::Human)
        .team(TeamKind::Ai)
        .team(TeamKind::Human)
        .team(TeamKind::Ai)
        .seeds([7, 11, 13]);
    for team in 0..4 {
        let (bx, by) = ((team as i32 % 2) * 32 + 6, (team as i32 / 2) * 32 + 6);
        builder = builder
            .building(team, "swarm_0", bx, by)
            .resource_field(ResourceKind::Corn, bx + 4, by, 3, 3)
            .unit(team, UnitKind::Worker, bx - 2, by)
            .unit(team, UnitKind::Worker, bx - 2, by + 1)
            .unit(team, UnitKind::Warrior, 30 + team as i32, 30)
            .unit(team, UnitKind::Warrior, 30 + team as i32, 31);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_places_everything() {
        let game = GameBuilder::new(32, 32)
            .team(TeamKind::Human)
            .team(TeamKind::Ai)
            .building(1, "swarm_0", 4, 4)
            .unit(0, UnitKind::Worker, 20, 20)
            .resource(ResourceKind::Wood, 10, 10)
            .water(0, 31)
            .build();
        assert_eq!(game.teams.len(), 2);
        assert_eq!(game.players.len(), 2);
        assert_eq!(game.players[1].kind, PlayerKind::Ai);
        assert_eq!(game.map.building(5, 5), Some(Gid::new(1, 0)));
        assert_eq!(game.map.ground_unit(20, 20), Some(Gid::new(0, 0)));
        assert!(game.map.has_resource(10, 10, ResourceKind::Wood));
        assert_eq!(game.map.terrain(0, 31), Terrain::Water);
    }

    #[test]
    fn test_lakeside_has_swimmers_and_water() {
        let game = lakeside();
        assert_eq!(game.map.terrain(23, 40), Terrain::Water);
        let swimmers = game.teams[0]
            .units()
            .iter()
            .filter(|(_, u)| game.registry().unit(u.type_id).swim)
            .count();
        assert_eq!(swimmers, 2);
    }

    #[test]
    fn test_fixtures_pass_integrity() {
        for game in [duel(), skirmish(), lakeside()] {
            for team in &game.teams {
                team.integrity(&game.map, game.registry()).unwrap();
            }
        }
    }
}
