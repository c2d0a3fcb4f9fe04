//! Read-only views of saved games.
//!
//! [`inspect_save`] only decodes the header and the map section, the way a
//! map browser previews a file without loading its teams.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use glob_core::checksum::ChecksumReport;
use glob_core::game::{read_map_preview, Game};
use glob_core::header::TeamKind;
use glob_core::map::{Map, Terrain};
use glob_core::resources::ResourceKind;
use serde::Serialize;

use crate::error::{Result, ToolError};

/// Summary of a saved map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MapSummary {
    /// Map name.
    pub name: String,
    /// Save format version, major then minor.
    pub version: (u32, u32),
    /// Map width.
    pub width: i32,
    /// Map height.
    pub height: i32,
    /// Controller of each team.
    pub teams: Vec<TeamKind>,
    /// Water tiles.
    pub water: u32,
    /// Deposit tiles per kind.
    pub resources: BTreeMap<ResourceKind, u32>,
}

impl MapSummary {
    fn from_map(header: &glob_core::header::MapHeader, map: &Map) -> Self {
        let mut water = 0;
        let mut resources = BTreeMap::new();
        for y in 0..map.height() {
            for x in 0..map.width() {
                if map.terrain(x, y) == Terrain::Water {
                    water += 1;
                }
                if let Some(resource) = map.resource(x, y) {
                    *resources.entry(resource.kind).or_insert(0) += 1;
                }
            }
        }
        Self {
            name: header.name.clone(),
            version: (header.version_major, header.version_minor),
            width: map.width(),
            height: map.height(),
            teams: header.teams.iter().map(|t| t.kind).collect(),
            water,
            resources,
        }
    }
}

impl fmt::Display for MapSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Map:       {}", self.name)?;
        writeln!(f, "Version:   {}.{}", self.version.0, self.version.1)?;
        writeln!(f, "Size:      {}x{}", self.width, self.height)?;
        writeln!(f, "Teams:     {}", self.teams.len())?;
        for (i, kind) in self.teams.iter().enumerate() {
            writeln!(f, "  {i}: {kind:?}")?;
        }
        writeln!(f, "Water:     {} tiles", self.water)?;
        write!(f, "Resources:")?;
        if self.resources.is_empty() {
            write!(f, " none")?;
        }
        for (kind, count) in &self.resources {
            write!(f, " {kind:?}={count}")?;
        }
        Ok(())
    }
}

/// Preview the map of a saved game without loading its teams.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or its header and map
/// sections do not decode.
pub fn inspect_save(path: &Path) -> Result<MapSummary> {
    let file = File::open(path).map_err(|e| ToolError::io(path, e))?;
    let (header, map) = read_map_preview(&mut BufReader::new(file))?;
    Ok(MapSummary::from_map(&header, &map))
}

/// Summary of a loaded game.
#[must_use]
pub fn summarize_map(game: &Game) -> MapSummary {
    MapSummary::from_map(&game.map_header, &game.map)
}

/// Checksum of a game with its per-component breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChecksumSummary {
    /// Game checksum.
    pub checksum: u32,
    /// Per-component values.
    pub report: ChecksumReport,
}

impl fmt::Display for ChecksumSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = &self.report;
        writeln!(f, "Step {}: {:08x}", r.step, self.checksum)?;
        writeln!(f, "  header    {:08x}", r.header)?;
        for (i, cs) in r.teams.iter().enumerate() {
            writeln!(f, "  team {i:<4} {cs:08x}")?;
        }
        for (i, cs) in r.players.iter().enumerate() {
            writeln!(f, "  player {i:<2} {cs:08x}")?;
        }
        writeln!(f, "  map       {:08x}", r.map)?;
        writeln!(f, "  sync rand {:08x}", r.sync_rand)?;
        write!(f, "  script    {:08x}", r.script)
    }
}

/// Checksum `game` and keep the breakdown.
#[must_use]
pub fn checksum_game(game: &Game) -> ChecksumSummary {
    let mut report = ChecksumReport::default();
    let checksum = game.check_sum(Some(&mut report));
    ChecksumSummary { checksum, report }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glob_core::header::{BaseTeam, MapHeader};

    #[test]
    fn test_summary_counts_tiles() {
        let mut map = Map::new(16, 16, Terrain::Grass).unwrap();
        map.set_terrain(3, 3, Terrain::Water);
        map.set_terrain(4, 3, Terrain::Water);
        map.set_resource(
            5,
            5,
            Some(glob_core::resources::Resource::full(ResourceKind::Stone)),
        );
        let header = MapHeader {
            name: "Tiny".into(),
            teams: vec![BaseTeam::default()],
            ..MapHeader::default()
        };
        let summary = MapSummary::from_map(&header, &map);
        assert_eq!(summary.water, 2);
        assert_eq!(summary.resources.get(&ResourceKind::Stone), Some(&1));
        assert_eq!(summary.teams, vec![TeamKind::Human]);

        let text = summary.to_string();
        assert!(text.contains("Tiny"));
        assert!(text.contains("Stone=1"));
    }
}
