//! Save games.
//!
//! Layout: preamble, map header, game header, `GaBe`, step counter and
//! generator seeds, `GaSy`, teams and build projects, `GaTe`, map, `GaMa`,
//! players, `GaPl`, script state, campaign text. The map header is
//! rewritten at the end once the map offset is known.

use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use tracing::debug;

use super::{BuildProject, Game};
use crate::data::TypeRegistry;
use crate::error::{GameError, Result};
use crate::header::{GameHeader, MapHeader};
use crate::ids::MAX_TEAMS;
use crate::map::Map;
use crate::player::Player;
use crate::script::ScriptState;
use crate::stream::{
    expect_signature, read_preamble, read_section, write_preamble, write_section, write_signature,
    ByteOrder, SIG_BEGIN, SIG_MAP, SIG_PLAYERS, SIG_SYNC, SIG_TEAMS,
};
use crate::sync_rand::SyncRand;
use crate::team::Team;

impl Game {
    /// Write the game to `w` in byte order `order`.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails or the map lies beyond the 4 GiB
    /// reachable by the header offset.
    pub fn save<W: Write + Seek>(&self, w: &mut W, order: ByteOrder) -> Result<()> {
        let start = w.stream_position()?;
        write_preamble(w, order)?;

        let header_pos = w.stream_position()?;
        write_section(w, order, &self.map_header)?;
        write_section(w, order, &self.game_header)?;
        write_signature(w, SIG_BEGIN)?;

        write_section(w, order, &(self.step_counter, self.sync_rand.seeds()))?;
        write_signature(w, SIG_SYNC)?;

        write_section(w, order, &(&self.teams, &self.build_projects))?;
        write_signature(w, SIG_TEAMS)?;

        let map_pos = w.stream_position()?;
        write_section(w, order, &self.map)?;
        write_signature(w, SIG_MAP)?;

        write_section(w, order, &self.players)?;
        write_signature(w, SIG_PLAYERS)?;

        write_section(w, order, &self.script)?;
        write_section(w, order, &self.campaign_text)?;
        let end = w.stream_position()?;

        let map_offset = u32::try_from(map_pos - start)
            .map_err(|_| GameError::Integrity(format!("map offset {} does not fit", map_pos - start)))?;
        let header = MapHeader {
            map_offset,
            ..self.map_header.clone()
        };
        w.seek(SeekFrom::Start(header_pos))?;
        write_section(w, order, &header)?;
        w.seek(SeekFrom::Start(end))?;

        debug!(step = self.step_counter, bytes = end - start, map_offset, "Game saved");
        Ok(())
    }

    /// Read a game written by [`Game::save`].
    ///
    /// # Errors
    ///
    /// Returns an error on a bad preamble, a signature mismatch, an
    /// undecodable section or a structural inconsistency. No partially
    /// loaded game is ever returned.
    pub fn load<R: Read>(r: &mut R, registry: Arc<TypeRegistry>) -> Result<Self> {
        let order = read_preamble(r)?;

        let map_header: MapHeader = read_section(r, order)?;
        let game_header: GameHeader = read_section(r, order)?;
        expect_signature(r, "after headers", SIG_BEGIN)?;

        let (step_counter, seeds): (u32, [u32; 3]) = read_section(r, order)?;
        expect_signature(r, "after sync state", SIG_SYNC)?;

        let (teams, build_projects): (Vec<Team>, Vec<BuildProject>) = read_section(r, order)?;
        expect_signature(r, "after teams", SIG_TEAMS)?;

        let mut map: Map = read_section(r, order)?;
        map.finish_load()?;
        expect_signature(r, "after map", SIG_MAP)?;

        let players: Vec<Player> = read_section(r, order)?;
        expect_signature(r, "after players", SIG_PLAYERS)?;

        let script: ScriptState = read_section(r, order)?;
        let campaign_text: String = read_section(r, order)?;

        let mut game = Self::new(registry, map);
        game.map_header = map_header;
        game.game_header = game_header;
        game.step_counter = step_counter;
        game.sync_rand = SyncRand::from_seeds(seeds);
        game.teams = teams;
        game.build_projects = build_projects;
        game.players = players;
        game.script = script;
        game.campaign_text = campaign_text;

        game.validate_loaded()?;
        for team in &mut game.teams {
            team.update(&game.registry);
        }
        for team in &game.teams {
            team.integrity(&game.map, &game.registry)
                .map_err(|message| GameError::Integrity(format!("team {}: {message}", team.team_number)))?;
        }
        game.update_prestige_to_reach();

        debug!(
            step = game.step_counter,
            teams = game.teams.len(),
            players = game.players.len(),
            "Game loaded"
        );
        Ok(game)
    }

    fn validate_loaded(&self) -> Result<()> {
        if self.teams.len() > MAX_TEAMS {
            return Err(GameError::TooManyTeams { max: MAX_TEAMS });
        }
        if self.map_header.teams.len() != self.teams.len() {
            return Err(GameError::Integrity(format!(
                "map header lists {} teams, save holds {}",
                self.map_header.teams.len(),
                self.teams.len()
            )));
        }
        if let Some((i, team)) = self.teams.iter().enumerate().find(|(i, t)| t.team_number != *i) {
            return Err(GameError::Integrity(format!(
                "team at index {i} is numbered {}",
                team.team_number
            )));
        }
        for (x, y, layer, gid) in self.map.gids() {
            let exists = match layer {
                "building" => self.get_building(gid).is_some(),
                _ => self.get_unit(gid).is_some(),
            };
            if !exists {
                return Err(GameError::Integrity(format!(
                    "{layer} layer at ({x}, {y}) references missing {gid}"
                )));
            }
        }
        for player in &self.players {
            if player.team >= self.teams.len() {
                return Err(GameError::UnknownTeam {
                    player: player.number,
                    team: player.team,
                });
            }
        }
        for project in &self.build_projects {
            if project.team >= self.teams.len() || self.registry.get_building(project.type_id).is_none() {
                return Err(GameError::Integrity(format!(
                    "build project at ({}, {}) references team {} and type {}",
                    project.x, project.y, project.team, project.type_id.0
                )));
            }
        }
        Ok(())
    }
}

/// Read only the map header of a save.
///
/// # Errors
///
/// Returns an error on a bad preamble or an undecodable header.
pub fn read_map_header<R: Read>(r: &mut R) -> Result<MapHeader> {
    let order = read_preamble(r)?;
    read_section(r, order)
}

/// Read the map of a save without decoding teams or players.
///
/// The stream must be positioned at the start of the save.
///
/// # Errors
///
/// Returns an error on a bad preamble, an undecodable section or an
/// inconsistent map.
pub fn read_map_preview<R: Read + Seek>(r: &mut R) -> Result<(MapHeader, Map)> {
    let start = r.stream_position()?;
    let order = read_preamble(r)?;
    let header: MapHeader = read_section(r, order)?;
    r.seek(SeekFrom::Start(start + u64::from(header.map_offset)))?;
    let mut map: Map = read_section(r, order)?;
    map.finish_load()?;
    expect_signature(r, "after map", SIG_MAP)?;
    Ok((header, map))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::data::UnitKind;
    use crate::header::{BasePlayer, TeamKind};
    use crate::map::Terrain;
    use crate::player::PlayerKind;

    fn game() -> Game {
        let registry = Arc::new(TypeRegistry::standard().unwrap());
        let mut g = Game::new(registry, Map::new(32, 32, Terrain::Grass).unwrap());
        g.map_header.name = "Twin Rivers".into();
        g.add_team(TeamKind::Human).unwrap();
        g.add_team(TeamKind::Ai).unwrap();
        g.set_game_header(GameHeader {
            players: vec![BasePlayer { number: 0, name: "p".into(), team: 1, kind: PlayerKind::Ai }],
            order_latency: 2,
        })
        .unwrap();
        let swarm = g.registry().building_id("swarm_0").unwrap();
        g.add_building(2, 2, swarm, 0, 1, 1).unwrap();
        g.add_unit(9, 9, 1, UnitKind::Worker, 0).unwrap();
        g.add_unit(10, 9, 0, UnitKind::Warrior, 0).unwrap();
        for _ in 0..5 {
            g.sync_step(0);
        }
        g
    }

    fn saved(g: &Game, order: ByteOrder) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        g.save(&mut cursor, order).unwrap();
        cursor.into_inner()
    }

    #[test]
    fn test_save_load_preserves_checksum() {
        let g = game();
        for order in [ByteOrder::Little, ByteOrder::Big] {
            let bytes = saved(&g, order);
            let loaded = Game::load(&mut Cursor::new(&bytes), g.registry().clone()).unwrap();
            assert_eq!(loaded.check_sum(None), g.check_sum(None));
            assert_eq!(loaded.step_counter, g.step_counter);
            assert_eq!(loaded.prestige_to_reach, g.prestige_to_reach);
            assert_eq!(loaded.game_header.order_latency, 2);
        }
    }

    #[test]
    fn test_corrupted_signature_rejected() {
        let g = game();
        let mut bytes = saved(&g, ByteOrder::Little);
        let pos = bytes.windows(4).position(|w| w == SIG_TEAMS).unwrap();
        bytes[pos] = b'X';
        let err = Game::load(&mut Cursor::new(&bytes), g.registry().clone()).unwrap_err();
        assert!(matches!(err, GameError::SignatureMismatch { section: "after teams", .. }));
    }

    #[test]
    fn test_truncated_save_rejected() {
        let g = game();
        let bytes = saved(&g, ByteOrder::Little);
        let cut = &bytes[..bytes.len() / 2];
        assert!(Game::load(&mut Cursor::new(cut), g.registry().clone()).is_err());
    }

    #[test]
    fn test_oversized_length_prefix_rejected() {
        let g = game();
        let mut bytes = saved(&g, ByteOrder::Little);
        // Length of the map name: magic, flag, two version words.
        bytes[13..21].copy_from_slice(&(1u64 << 42).to_le_bytes());
        assert!(Game::load(&mut Cursor::new(&bytes), g.registry().clone()).is_err());
        assert!(read_map_header(&mut Cursor::new(&bytes)).is_err());
    }

    #[test]
    fn test_header_and_preview_without_teams() {
        let g = game();
        let bytes = saved(&g, ByteOrder::Big);
        let header = read_map_header(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(header.name, "Twin Rivers");
        assert_eq!(header.teams.len(), 2);
        assert!(header.map_offset > 0);

        let (_, map) = read_map_preview(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(map.width(), 32);
        assert_eq!(map.checksum(true), g.map.checksum(true));
    }

    #[test]
    fn test_dangling_player_rejected() {
        let mut g = game();
        g.players[0].team = 7;
        let bytes = saved(&g, ByteOrder::Little);
        let err = Game::load(&mut Cursor::new(&bytes), g.registry().clone()).unwrap_err();
        assert!(matches!(err, GameError::UnknownTeam { player: 0, team: 7 }));
    }
}
