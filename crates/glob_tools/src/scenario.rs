//! Scenario descriptions for generating saved games.
//!
//! A scenario is a RON file listing the map size, the teams with their
//! starting buildings and units, and the resource fields. [`Scenario::build`]
//! turns it into a [`Game`] ready to be saved and simulated.
//!
//! # Example
//!
//! ```ron
//! Scenario(
//!     name: "Two Rivers",
//!     width: 64,
//!     height: 64,
//!     seeds: Some((5, 6, 7)),
//!     teams: [
//!         (
//!             kind: Human,
//!             player: "alice",
//!             buildings: [(name: "swarm_0", x: 8, y: 8)],
//!             units: [(kind: Worker, x: 6, y: 8)],
//!         ),
//!     ],
//!     resources: [(kind: Corn, x: 12, y: 8, width: 3, height: 3)],
//! )
//! ```

use std::fs;
use std::path::Path;
use std::sync::Arc;

use glob_core::data::{TypeRegistry, UnitKind};
use glob_core::game::Game;
use glob_core::header::{BasePlayer, GameHeader, TeamKind};
use glob_core::map::{Map, Terrain};
use glob_core::player::PlayerKind;
use glob_core::resources::{Resource, ResourceKind};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ToolError};

/// Smallest square given to each team by [`Scenario::starter`].
pub const STARTER_CELL: u32 = 16;

/// A building placed at game start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedBuilding {
    /// Type name from the data files.
    pub name: String,
    /// Top-left x.
    pub x: i32,
    /// Top-left y.
    pub y: i32,
}

/// A unit placed at game start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedUnit {
    /// Unit kind.
    pub kind: UnitKind,
    /// Tile x.
    pub x: i32,
    /// Tile y.
    pub y: i32,
    /// Requested level; the best available level below is used.
    #[serde(default)]
    pub level: u8,
}

/// A team and the player controlling it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioTeam {
    /// Controller kind.
    pub kind: TeamKind,
    /// Name of the controlling player.
    #[serde(default)]
    pub player: String,
    /// Starting buildings, completed.
    #[serde(default)]
    pub buildings: Vec<PlacedBuilding>,
    /// Starting units.
    #[serde(default)]
    pub units: Vec<PlacedUnit>,
}

/// A rectangle of full deposits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceField {
    /// Deposit kind.
    pub kind: ResourceKind,
    /// Left column.
    pub x: i32,
    /// Top row.
    pub y: i32,
    /// Columns covered.
    pub width: i32,
    /// Rows covered.
    pub height: i32,
}

/// A rectangle of water.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lake {
    /// Left column.
    pub x: i32,
    /// Top row.
    pub y: i32,
    /// Columns covered.
    pub width: i32,
    /// Rows covered.
    pub height: i32,
}

/// Full description of a starting position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Map name written to the header.
    pub name: String,
    /// Map width, a power of two.
    pub width: u32,
    /// Map height, a power of two.
    pub height: u32,
    /// Seeds of the shared generator; default seeds if absent.
    #[serde(default)]
    pub seeds: Option<(u32, u32, u32)>,
    /// Ticks between issuing and executing an order.
    #[serde(default)]
    pub order_latency: u32,
    /// Teams in team order; player `i` controls team `i`.
    pub teams: Vec<ScenarioTeam>,
    /// Deposits.
    #[serde(default)]
    pub resources: Vec<ResourceField>,
    /// Water.
    #[serde(default)]
    pub lakes: Vec<Lake>,
}

impl Scenario {
    /// Parse a scenario from RON source.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::Parse`] naming `path` if the source is malformed.
    pub fn from_ron(source: &str, path: &Path) -> Result<Self> {
        ron::from_str(source).map_err(|e| ToolError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Read and parse a scenario file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let source = fs::read_to_string(path).map_err(|e| ToolError::io(path, e))?;
        Self::from_ron(&source, path)
    }

    /// A symmetric start: each team gets a swarm, three workers, a corn
    /// field and a wood field in its own square of the map.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::Scenario`] if the map cannot fit the teams.
    pub fn starter(name: &str, size: u32, kinds: &[TeamKind]) -> Result<Self> {
        if kinds.is_empty() {
            return Err(ToolError::Scenario("a game needs at least one team".into()));
        }
        let columns = (1..).find(|c: &u32| c * c >= kinds.len() as u32).unwrap_or(1);
        let cell = size / columns;
        if cell < STARTER_CELL {
            return Err(ToolError::Scenario(format!(
                "a {size}x{size} map cannot hold {} starting positions",
                kinds.len()
            )));
        }

        let mut teams = Vec::with_capacity(kinds.len());
        let mut resources = Vec::new();
        for (i, kind) in kinds.iter().enumerate() {
            let i = i as u32;
            let bx = ((i % columns) * cell + cell / 2 - 2) as i32;
            let by = ((i / columns) * cell + cell / 2 - 2) as i32;
            teams.push(ScenarioTeam {
                kind: *kind,
                player: format!("player {i}"),
                buildings: vec![PlacedBuilding {
                    name: "swarm_0".into(),
                    x: bx,
                    y: by,
                }],
                units: (0..3)
                    .map(|dy| PlacedUnit {
                        kind: UnitKind::Worker,
                        x: bx - 2,
                        y: by + dy,
                        level: 0,
                    })
                    .collect(),
            });
            resources.push(ResourceField {
                kind: ResourceKind::Corn,
                x: bx + 4,
                y: by,
                width: 3,
                height: 3,
            });
            resources.push(ResourceField {
                kind: ResourceKind::Wood,
                x: bx,
                y: by + 4,
                width: 3,
                height: 3,
            });
        }

        Ok(Self {
            name: name.to_string(),
            width: size,
            height: size,
            seeds: None,
            order_latency: 0,
            teams,
            resources,
            lakes: Vec::new(),
        })
    }

    /// Build the game described by this scenario.
    ///
    /// Terrain comes first, then deposits, buildings and units, so a unit
    /// placed on a deposit or under a building is reported as blocked.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::Scenario`] for unknown building names or
    /// blocked placements, or [`ToolError::Game`] for an invalid map size
    /// or too many teams.
    pub fn build(&self, registry: Arc<TypeRegistry>) -> Result<Game> {
        let map = Map::new(self.width, self.height, Terrain::Grass)?;
        let mut game = Game::new(registry.clone(), map);
        game.map_header.name.clone_from(&self.name);
        for team in &self.teams {
            game.add_team(team.kind)?;
        }
        let players = self
            .teams
            .iter()
            .enumerate()
            .map(|(number, team)| BasePlayer {
                number,
                name: team.player.clone(),
                team: number,
                kind: match team.kind {
                    TeamKind::Human => PlayerKind::Human,
                    TeamKind::Ai => PlayerKind::Ai,
                },
            })
            .collect();
        game.set_game_header(GameHeader {
            players,
            order_latency: self.order_latency,
        })?;

        for lake in &self.lakes {
            for (x, y) in rect(lake.x, lake.y, lake.width, lake.height) {
                game.map.set_terrain(x, y, Terrain::Water);
            }
        }
        for field in &self.resources {
            for (x, y) in rect(field.x, field.y, field.width, field.height) {
                game.map.set_resource(x, y, Some(Resource::full(field.kind)));
            }
        }

        for (number, team) in self.teams.iter().enumerate() {
            for placed in &team.buildings {
                let type_id = registry.building_id(&placed.name).ok_or_else(|| {
                    ToolError::Scenario(format!("unknown building type '{}'", placed.name))
                })?;
                let full = registry.building(type_id).max_unit_working;
                let gid = game
                    .add_building(placed.x, placed.y, type_id, number, full, full)
                    .ok_or_else(|| {
                        ToolError::Scenario(format!(
                            "{} of team {number} does not fit at ({}, {})",
                            placed.name, placed.x, placed.y
                        ))
                    })?;
                game.teams[number].update_building(&registry, gid.slot());
            }
            for unit in &team.units {
                game.add_unit(unit.x, unit.y, number, unit.kind, unit.level)
                    .ok_or_else(|| {
                        ToolError::Scenario(format!(
                            "{:?} of team {number} does not fit at ({}, {})",
                            unit.kind, unit.x, unit.y
                        ))
                    })?;
            }
        }

        if let Some((a, b, c)) = self.seeds {
            game.sync_rand.set_seeds([a, b, c]);
        }
        tracing::debug!(
            name = %self.name,
            teams = self.teams.len(),
            "Scenario built"
        );
        Ok(game)
    }
}

fn rect(x: i32, y: i32, width: i32, height: i32) -> impl Iterator<Item = (i32, i32)> {
    (0..height).flat_map(move |dy| (0..width).map(move |dx| (x + dx, y + dy)))
}
