//! Map and game headers.
//!
//! The map header describes the static map (name, version, which teams
//! exist). The game header describes the session (players, order latency).

use serde::{Deserialize, Serialize};

use crate::checksum::{fold, rotr1};
use crate::player::PlayerKind;

/// Major save format version.
pub const VERSION_MAJOR: u32 = 0;

/// Minor save format version.
pub const VERSION_MINOR: u32 = 1;

/// Who drives a team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TeamKind {
    /// Controlled by at least one human player.
    #[default]
    Human,
    /// Controlled by an AI.
    Ai,
}

/// Team entry of the map header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseTeam {
    /// Controller kind.
    pub kind: TeamKind,
}

/// Static description of a map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapHeader {
    /// Major version the map was saved with.
    pub version_major: u32,
    /// Minor version the map was saved with.
    pub version_minor: u32,
    /// Display name.
    pub name: String,
    /// One entry per team.
    pub teams: Vec<BaseTeam>,
    /// Byte offset of the map section from the start of the stream.
    pub map_offset: u32,
}

impl Default for MapHeader {
    fn default() -> Self {
        Self {
            version_major: VERSION_MAJOR,
            version_minor: VERSION_MINOR,
            name: String::new(),
            teams: Vec::new(),
            map_offset: 0,
        }
    }
}

impl MapHeader {
    /// Checksum of the header; the map offset depends on encoding and is left out.
    #[must_use]
    pub fn checksum(&self) -> u32 {
        let mut cs = fold([self.version_major, self.version_minor, self.teams.len() as u32]);
        for byte in self.name.bytes() {
            cs = rotr1(cs ^ u32::from(byte));
        }
        for team in &self.teams {
            cs = rotr1(cs ^ team.kind as u32);
        }
        cs
    }
}

/// Player entry of the game header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasePlayer {
    /// Player index.
    pub number: usize,
    /// Display name.
    pub name: String,
    /// Team controlled.
    pub team: usize,
    /// Controller kind.
    pub kind: PlayerKind,
}

/// Session description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameHeader {
    /// Players, in player order.
    pub players: Vec<BasePlayer>,
    /// Ticks between issuing an order and executing it.
    pub order_latency: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_ignores_offset() {
        let mut header = MapHeader {
            name: "Islands".into(),
            teams: vec![BaseTeam::default(), BaseTeam { kind: TeamKind::Ai }],
            ..MapHeader::default()
        };
        let before = header.checksum();
        header.map_offset = 1234;
        assert_eq!(header.checksum(), before);
        header.teams[0].kind = TeamKind::Ai;
        assert_ne!(header.checksum(), before);
    }
}
