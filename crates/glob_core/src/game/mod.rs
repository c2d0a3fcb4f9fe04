//! The game: top-level owner of the map, teams and players.
//!
//! All simulation state is reachable from [`Game`]. It is mutated only by
//! [`Game::execute_order`] and [`Game::sync_step`]; everything else is a
//! read-only accessor or a setup helper used while building a scenario.

mod orders;
mod persist;
mod tick;

pub use persist::{read_map_header, read_map_preview};

use std::ops::BitOr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::building::Building;
use crate::checksum::{rotr1, ChecksumReport};
use crate::data::{BuildingTypeId, TypeRegistry, UnitKind};
use crate::error::{GameError, Result};
use crate::header::{BaseTeam, GameHeader, MapHeader, TeamKind};
use crate::ids::{team_mask, Gid, MAX_PLAYERS, MAX_TEAMS};
use crate::map::Map;
use crate::player::{Player, PlayerKind};
use crate::script::ScriptState;
use crate::sync_rand::SyncRand;
use crate::team::{DamageEvent, Target, Team, TeamEventKind};
use crate::unit::Unit;

/// Smallest prestige goal, whatever the number of teams.
pub const MIN_PRESTIGE_TO_REACH: u32 = 500;

/// Prestige goal added per team.
pub const PRESTIGE_PER_TEAM: u32 = 150;

/// Construction deferred until its site is free of units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildProject {
    /// Top-left x.
    pub x: i32,
    /// Top-left y.
    pub y: i32,
    /// Owning team.
    pub team: usize,
    /// Type to place.
    pub type_id: BuildingTypeId,
    /// Units requested during construction.
    pub unit_working: u32,
    /// Units requested once built.
    pub unit_working_future: u32,
}

/// Layers cleared by [`Game::remove_unit_and_building_and_flags`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoveFlags(u8);

impl RemoveFlags {
    /// Walking units.
    pub const GROUND_UNIT: Self = Self(1);
    /// Flying units.
    pub const AIR_UNIT: Self = Self(2);
    /// Buildings.
    pub const BUILDING: Self = Self(4);
    /// Flags of any team standing exactly on the tile.
    pub const FLAG: Self = Self(8);
    /// Everything.
    pub const ALL: Self = Self(15);

    /// Whether all bits of `other` are set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for RemoveFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// A running game.
#[derive(Debug, Clone)]
pub struct Game {
    registry: Arc<TypeRegistry>,
    /// Static map description.
    pub map_header: MapHeader,
    /// Session description.
    pub game_header: GameHeader,
    /// The map.
    pub map: Map,
    /// Teams, indexed by team number.
    pub teams: Vec<Team>,
    /// Players, indexed by player number.
    pub players: Vec<Player>,
    /// Deferred constructions, in queue order.
    pub build_projects: Vec<BuildProject>,
    /// Shared pseudo-random generator.
    pub sync_rand: SyncRand,
    /// Mission script state.
    pub script: ScriptState,
    /// Campaign text shown by the mission.
    pub campaign_text: String,
    /// Ticks simulated so far.
    pub step_counter: u32,
    /// Total prestige ending the game; zero disables the check.
    pub prestige_to_reach: u32,
    /// Prestige summed over every team at the last victory check.
    pub total_prestige: u32,
    /// Whether the game is over.
    pub is_game_ended: bool,
    /// Whether some peer is late; suspends [`Game::sync_step`].
    pub any_player_waited: bool,
    /// Ticks spent waiting since the last real order.
    pub any_player_waited_time_for: u32,
    /// Players reported away by the last waiting order.
    pub mask_away_player: u32,
}

impl Game {
    /// Create a game with no teams on `map`.
    #[must_use]
    pub fn new(registry: Arc<TypeRegistry>, map: Map) -> Self {
        Self {
            registry,
            map_header: MapHeader::default(),
            game_header: GameHeader::default(),
            map,
            teams: Vec::new(),
            players: Vec::new(),
            build_projects: Vec::new(),
            sync_rand: SyncRand::default(),
            script: ScriptState::default(),
            campaign_text: String::new(),
            step_counter: 0,
            prestige_to_reach: 0,
            total_prestige: 0,
            is_game_ended: false,
            any_player_waited: false,
            any_player_waited_time_for: 0,
            mask_away_player: 0,
        }
    }

    /// Type registry shared by every entity.
    #[must_use]
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    fn update_prestige_to_reach(&mut self) {
        let teams = self.teams.len() as u32;
        self.prestige_to_reach = MIN_PRESTIGE_TO_REACH.max(PRESTIGE_PER_TEAM * teams);
    }

    /// Append a team. Returns its number.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::TooManyTeams`] once the game holds 32 teams.
    pub fn add_team(&mut self, kind: TeamKind) -> Result<usize> {
        let number = self.teams.len();
        if number >= MAX_TEAMS {
            return Err(GameError::TooManyTeams { max: MAX_TEAMS });
        }
        self.teams.push(Team::new(number, kind));
        self.map_header.teams.push(BaseTeam { kind });
        self.update_prestige_to_reach();
        Ok(number)
    }

    /// Remove the last team and everything it owns. Returns false if there
    /// was no team.
    pub fn remove_team(&mut self) -> bool {
        let Some(mut team) = self.teams.pop() else {
            return false;
        };
        team.clear_map(&mut self.map, &self.registry);
        self.map.clear_team(team.team_number);
        self.map_header.teams.pop();
        self.build_projects.retain(|p| p.team != team.team_number);
        self.update_prestige_to_reach();
        true
    }

    /// Install the session description: players and team player masks.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::TooManyPlayers`] or [`GameError::UnknownTeam`];
    /// the game is left unchanged.
    pub fn set_game_header(&mut self, header: GameHeader) -> Result<()> {
        if header.players.len() > MAX_PLAYERS {
            return Err(GameError::TooManyPlayers { max: MAX_PLAYERS });
        }
        for base in &header.players {
            if base.team >= self.teams.len() {
                return Err(GameError::UnknownTeam {
                    player: base.number,
                    team: base.team,
                });
            }
        }
        for team in &mut self.teams {
            team.players_mask = 0;
        }
        self.players = header
            .players
            .iter()
            .enumerate()
            .map(|(number, base)| Player::new(number, base.name.clone(), base.team, base.kind))
            .collect();
        for player in &self.players {
            self.teams[player.team].players_mask |= team_mask(player.number);
        }
        self.game_header = header;
        Ok(())
    }

    /// Place a unit of `kind` at the given level or the best one below it.
    ///
    /// # Panics
    ///
    /// Panics if `team` does not exist.
    pub fn add_unit(&mut self, x: i32, y: i32, team: usize, kind: UnitKind, level: u8) -> Option<Gid> {
        self.teams[team].add_unit(&mut self.map, &self.registry, x, y, kind, level)
    }

    /// Place a building without checking room.
    ///
    /// # Panics
    ///
    /// Panics if `team` does not exist or `type_id` is unknown.
    pub fn add_building(
        &mut self,
        x: i32,
        y: i32,
        type_id: BuildingTypeId,
        team: usize,
        unit_working: u32,
        unit_working_future: u32,
    ) -> Option<Gid> {
        let t = &mut self.teams[team];
        let gid = t.add_building(
            &mut self.map,
            &self.registry,
            x,
            y,
            type_id,
            unit_working,
            unit_working_future,
        )?;
        let bt = self.registry.building(type_id);
        if let Some(b) = t.building(gid.slot()) {
            if !bt.is_virtual {
                b.set_map_discovered(bt, &mut self.map, t.vision_for(bt));
            }
        }
        Some(gid)
    }

    /// Remove the selected layers at one tile. Returns true if anything
    /// was removed.
    pub fn remove_unit_and_building_and_flags(&mut self, x: i32, y: i32, flags: RemoveFlags) -> bool {
        let (x, y) = self.map.wrap(x, y);
        let mut removed = false;
        if flags.contains(RemoveFlags::GROUND_UNIT) {
            if let Some(gid) = self.map.ground_unit(x, y) {
                removed |= self.teams[gid.team()].remove_unit(&mut self.map, gid.slot()).is_some();
            }
        }
        if flags.contains(RemoveFlags::AIR_UNIT) {
            if let Some(gid) = self.map.air_unit(x, y) {
                removed |= self.teams[gid.team()].remove_unit(&mut self.map, gid.slot()).is_some();
            }
        }
        if flags.contains(RemoveFlags::BUILDING) {
            if let Some(gid) = self.map.building(x, y) {
                removed |= self.teams[gid.team()]
                    .remove_building(&mut self.map, &self.registry, gid.slot())
                    .is_some();
            }
        }
        if flags.contains(RemoveFlags::FLAG) {
            for team in &mut self.teams {
                let on_tile: Vec<usize> = team
                    .virtual_buildings()
                    .iter()
                    .copied()
                    .filter(|&slot| team.building(slot).is_some_and(|b| (b.x(), b.y()) == (x, y)))
                    .collect();
                for slot in on_tile {
                    removed |= team.remove_building(&mut self.map, &self.registry, slot).is_some();
                }
            }
        }
        removed
    }

    /// Square-brush variant of [`Game::remove_unit_and_building_and_flags`].
    ///
    /// Odd sizes are centered on `(x, y)`; even sizes extend one tile
    /// further up and left.
    pub fn remove_in_square(&mut self, x: i32, y: i32, size: i32, flags: RemoveFlags) -> bool {
        let half = size >> 1;
        let even = !size & 1;
        let mut removed = false;
        for ty in y - half..=y + half - even {
            for tx in x - half..=x + half - even {
                removed |= self.remove_unit_and_building_and_flags(tx, ty, flags);
            }
        }
        removed
    }

    fn flag_on_tile(&self, team: usize, x: i32, y: i32) -> bool {
        let t = &self.teams[team];
        t.virtual_buildings()
            .iter()
            .filter_map(|&slot| t.building(slot))
            .any(|b| (b.x(), b.y()) == (x, y))
    }

    /// Whether a building of `type_id` fits at `(x, y)` right now.
    ///
    /// Flags only need the exact tile free of the team's other flags. Other
    /// buildings need a free footprint and, with `check_fog`, a footprint
    /// the team has discovered.
    ///
    /// # Panics
    ///
    /// Panics if `team` does not exist or `type_id` is unknown.
    #[must_use]
    pub fn check_room_for_building(
        &self,
        x: i32,
        y: i32,
        type_id: BuildingTypeId,
        team: usize,
        check_fog: bool,
    ) -> bool {
        let bt = self.registry.building(type_id);
        let (x, y) = self.map.wrap(x, y);
        if bt.is_virtual {
            return !self.flag_on_tile(team, x, y);
        }
        if !self.map.is_free_for_building_area(x, y, bt.width, bt.height) {
            return false;
        }
        !check_fog
            || (0..bt.height).all(|dy| {
                (0..bt.width).all(|dx| self.map.is_map_discovered(x + dx, y + dy, team))
            })
    }

    /// [`Game::check_room_for_building`] with cursor coordinates; returns
    /// the verdict and the wrapped top-left corner.
    #[must_use]
    pub fn check_room_for_building_at_cursor(
        &self,
        mouse_x: i32,
        mouse_y: i32,
        type_id: BuildingTypeId,
        team: usize,
        check_fog: bool,
    ) -> (bool, i32, i32) {
        let bt = self.registry.building(type_id);
        let (x, y) = self.map.wrap(mouse_x - bt.dec_left, mouse_y - bt.dec_top);
        (self.check_room_for_building(x, y, type_id, team, check_fog), x, y)
    }

    /// Whether a footprint is blocked only by units.
    #[must_use]
    pub fn check_hard_room_for_building(&self, x: i32, y: i32, type_id: BuildingTypeId, team: usize) -> bool {
        let bt = self.registry.building(type_id);
        let (x, y) = self.map.wrap(x, y);
        if bt.is_virtual {
            return !self.flag_on_tile(team, x, y);
        }
        self.map.is_hard_space_for_building(x, y, bt.width, bt.height)
    }

    /// Unit addressed by `gid`.
    #[must_use]
    pub fn get_unit(&self, gid: Gid) -> Option<&Unit> {
        self.teams.get(gid.team())?.unit(gid.slot())
    }

    /// Building addressed by `gid`.
    #[must_use]
    pub fn get_building(&self, gid: Gid) -> Option<&Building> {
        self.teams.get(gid.team())?.building(gid.slot())
    }

    /// Team with the greatest prestige, lowest number first on ties.
    #[must_use]
    pub fn team_with_most_prestige(&self) -> Option<usize> {
        let mut best: Option<&Team> = None;
        for team in &self.teams {
            if best.map_or(true, |b| team.prestige > b.prestige) {
                best = Some(team);
            }
        }
        best.map(|t| t.team_number)
    }

    /// Wipe every team no player controls.
    pub fn clearing_uncontrolled_teams(&mut self) {
        for team in &mut self.teams {
            if team.players_mask == 0 {
                team.clear_map(&mut self.map, &self.registry);
                self.map.clear_team(team.team_number);
            }
        }
    }

    /// Rebuild discovery from every unit and building.
    pub fn regenerate_discovery_map(&mut self) {
        self.map.unset_map_discovered();
        for team in &self.teams {
            let unit_vision = team.shared_vision_other | team.me;
            for (_, unit) in team.units().iter() {
                self.map
                    .set_map_discovered(unit.x - 1, unit.y - 1, 3, 3, unit_vision);
            }
            for (_, b) in team.buildings().iter() {
                let bt = self.registry.building(b.type_id);
                b.set_map_discovered(bt, &mut self.map, team.vision_for(bt));
            }
        }
    }

    /// Drop the gradients of every war flag.
    pub fn dirty_war_flag_gradient(&mut self) {
        for team in &mut self.teams {
            team.dirty_war_flag_gradient(&self.registry);
        }
    }

    /// Forget every team event.
    pub fn clear_events_step(&mut self) {
        for team in &mut self.teams {
            team.clear_events();
        }
    }

    /// Copy `local_team`'s area layers into the local shadow layers.
    pub fn reset_local_view(&mut self, local_team: usize) {
        self.map.reset_local_areas(local_team);
    }

    /// Whether any player is connected over the network.
    #[must_use]
    pub fn has_network_player(&self) -> bool {
        self.players.iter().any(|p| p.kind == PlayerKind::Ip)
    }

    /// Checksum of the whole simulation state.
    #[must_use]
    pub fn check_sum(&self, mut report: Option<&mut ChecksumReport>) -> u32 {
        if let Some(r) = report.as_deref_mut() {
            *r = ChecksumReport {
                step: self.step_counter,
                ..ChecksumReport::default()
            };
        }

        let header = self.map_header.checksum();
        let mut cs = rotr1(header);
        if let Some(r) = report.as_deref_mut() {
            r.header = header;
            r.running.push(cs);
        }

        let mut teams_cs = 0u32;
        for team in &self.teams {
            let t = team.checksum(report.as_deref_mut());
            if let Some(r) = report.as_deref_mut() {
                r.teams.push(t);
            }
            teams_cs = rotr1(teams_cs ^ t);
            cs = rotr1(cs);
        }
        cs = rotr1(cs ^ teams_cs);
        if let Some(r) = report.as_deref_mut() {
            r.running.push(cs);
        }

        let mut players_cs = 0u32;
        for player in &self.players {
            let p = player.checksum();
            if let Some(r) = report.as_deref_mut() {
                r.players.push(p);
            }
            players_cs = rotr1(players_cs ^ p);
            cs = rotr1(cs);
        }
        cs = rotr1(cs ^ players_cs);
        if let Some(r) = report.as_deref_mut() {
            r.running.push(cs);
        }

        let map = self.map.checksum(self.has_network_player());
        cs = rotr1(cs ^ map);
        let sync_rand = self.sync_rand.checksum();
        cs = rotr1(cs ^ sync_rand);
        let script = self.script.checksum();
        cs ^= script;
        if let Some(r) = report {
            r.map = map;
            r.sync_rand = sync_rand;
            r.script = script;
            r.running.push(cs);
        }
        cs
    }

    /// Apply attacks in emission order.
    fn apply_damage(&mut self, events: &[DamageEvent]) {
        let step = self.step_counter;
        for event in events {
            let attacker_team = event.attacker.team();
            match event.target {
                Target::Unit(gid) => {
                    let Some(team) = self.teams.get_mut(gid.team()) else {
                        continue;
                    };
                    let Some(unit) = team.unit_mut(gid.slot()) else {
                        continue;
                    };
                    let armor = self.registry.unit(unit.type_id).armor;
                    let damage = event.damage.saturating_sub(armor).max(1);
                    unit.hp = unit.hp.saturating_sub(damage);
                    let (x, y, dead) = (unit.x, unit.y, unit.hp == 0);
                    if dead {
                        team.remove_unit(&mut self.map, gid.slot());
                        team.push_event(TeamEventKind::UnitLost, gid, x, y, step);
                        if let Some(killer) = self.teams.get_mut(attacker_team) {
                            killer.unit_kills += 1;
                            killer.prestige += 1;
                        }
                        tracing::debug!(step, unit = %gid, by = %event.attacker, "Unit killed");
                    } else {
                        team.push_event(TeamEventKind::UnitUnderAttack, gid, x, y, step);
                    }
                }
                Target::Building(gid) => {
                    let Some(team) = self.teams.get_mut(gid.team()) else {
                        continue;
                    };
                    let Some(b) = team.building_mut(gid.slot()) else {
                        continue;
                    };
                    let armor = self.registry.building(b.type_id).armor;
                    let damage = event.damage.saturating_sub(armor).max(1);
                    b.hp = b.hp.saturating_sub(damage);
                    let (x, y, dead) = (b.x(), b.y(), b.hp == 0);
                    if dead {
                        team.remove_building(&mut self.map, &self.registry, gid.slot());
                        team.push_event(TeamEventKind::BuildingLost, gid, x, y, step);
                        tracing::debug!(step, building = %gid, by = %event.attacker, "Building destroyed");
                    } else {
                        team.push_event(TeamEventKind::BuildingUnderAttack, gid, x, y, step);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::BasePlayer;
    use crate::map::Terrain;

    fn game(teams: usize) -> Game {
        let registry = Arc::new(TypeRegistry::standard().unwrap());
        let mut game = Game::new(registry, Map::new(64, 64, Terrain::Grass).unwrap());
        for _ in 0..teams {
            game.add_team(TeamKind::Human).unwrap();
        }
        game
    }

    #[test]
    fn test_prestige_to_reach() {
        let mut g = game(1);
        assert_eq!(g.prestige_to_reach, 500);
        for _ in 1..4 {
            g.add_team(TeamKind::Ai).unwrap();
        }
        assert_eq!(g.prestige_to_reach, 600);
        assert!(g.remove_team());
        assert_eq!(g.prestige_to_reach, 500);
    }

    #[test]
    fn test_team_limit() {
        let mut g = game(32);
        assert!(matches!(
            g.add_team(TeamKind::Ai),
            Err(GameError::TooManyTeams { max: 32 })
        ));
    }

    #[test]
    fn test_game_header_sets_player_masks() {
        let mut g = game(2);
        let header = GameHeader {
            players: vec![
                BasePlayer { number: 0, name: "a".into(), team: 1, kind: PlayerKind::Human },
                BasePlayer { number: 1, name: "b".into(), team: 1, kind: PlayerKind::Ai },
            ],
            order_latency: 5,
        };
        g.set_game_header(header).unwrap();
        assert_eq!(g.teams[0].players_mask, 0);
        assert_eq!(g.teams[1].players_mask, 0b11);

        let bad = GameHeader {
            players: vec![BasePlayer { number: 0, name: "c".into(), team: 7, kind: PlayerKind::Human }],
            order_latency: 0,
        };
        assert!(matches!(g.set_game_header(bad), Err(GameError::UnknownTeam { team: 7, .. })));
        assert_eq!(g.players.len(), 2);
    }

    #[test]
    fn test_virtual_room_only_blocked_by_own_flag() {
        let mut g = game(2);
        let flag = g.registry().building_id("exploration_flag").unwrap();
        assert!(g.check_room_for_building(5, 5, flag, 0, false));
        g.add_building(5, 5, flag, 0, 1, 1).unwrap();
        assert!(!g.check_room_for_building(5, 5, flag, 0, false));
        assert!(g.check_room_for_building(5, 5, flag, 1, false));
        assert!(g.check_room_for_building(6, 5, flag, 0, false));
        // Units and buildings do not matter to flags.
        g.add_unit(7, 7, 0, UnitKind::Worker, 0).unwrap();
        assert!(g.check_room_for_building(7, 7, flag, 0, false));
    }

    #[test]
    fn test_room_for_building() {
        let mut g = game(1);
        let site = g.registry().building_id("swarm_site_0").unwrap();
        assert!(g.check_room_for_building(10, 10, site, 0, false));
        assert!(!g.check_room_for_building(10, 10, site, 0, true));
        g.add_unit(11, 11, 0, UnitKind::Worker, 0).unwrap();
        assert!(!g.check_room_for_building(10, 10, site, 0, false));
        assert!(g.check_hard_room_for_building(10, 10, site, 0));
        let bt = g.registry().building(site).clone();
        let (ok, x, y) = g.check_room_for_building_at_cursor(bt.dec_left, bt.dec_top, site, 0, false);
        assert!(ok);
        assert_eq!((x, y), (0, 0));
    }

    #[test]
    fn test_remove_layers() {
        let mut g = game(2);
        let flag = g.registry().building_id("war_flag").unwrap();
        g.add_unit(3, 3, 0, UnitKind::Worker, 0).unwrap();
        g.add_unit(3, 3, 1, UnitKind::Explorer, 0).unwrap();
        g.add_building(3, 3, flag, 1, 0, 0).unwrap();

        assert!(g.remove_unit_and_building_and_flags(3, 3, RemoveFlags::AIR_UNIT));
        assert_eq!(g.map.air_unit(3, 3), None);
        assert!(g.map.ground_unit(3, 3).is_some());
        assert!(g.remove_unit_and_building_and_flags(3, 3, RemoveFlags::FLAG));
        assert!(g.teams[1].virtual_buildings().is_empty());
        assert!(g.remove_in_square(3, 3, 3, RemoveFlags::ALL));
        assert!(g.teams[0].units().is_empty());
        assert!(!g.remove_in_square(3, 3, 3, RemoveFlags::ALL));
    }

    #[test]
    fn test_remove_in_square_even_size() {
        let mut g = game(1);
        for (x, y) in [(9, 9), (10, 10), (11, 11)] {
            g.add_unit(x, y, 0, UnitKind::Worker, 0).unwrap();
        }
        g.remove_in_square(10, 10, 2, RemoveFlags::GROUND_UNIT);
        assert_eq!(g.map.ground_unit(9, 9), None);
        assert_eq!(g.map.ground_unit(10, 10), None);
        assert!(g.map.ground_unit(11, 11).is_some());
    }

    #[test]
    fn test_most_prestige_first_on_ties() {
        let mut g = game(3);
        g.teams[1].prestige = 4;
        g.teams[2].prestige = 4;
        assert_eq!(g.team_with_most_prestige(), Some(1));
    }

    #[test]
    fn test_damage_kills_and_scores() {
        let mut g = game(2);
        let attacker = g.add_unit(1, 1, 0, UnitKind::Warrior, 0).unwrap();
        let victim = g.add_unit(2, 1, 1, UnitKind::Worker, 0).unwrap();
        let hp = g.get_unit(victim).unwrap().hp;
        let hit = DamageEvent {
            attacker,
            target: Target::Unit(victim),
            damage: hp,
        };
        g.apply_damage(&[hit, hit]);
        assert!(g.get_unit(victim).is_none());
        assert_eq!(g.map.ground_unit(2, 1), None);
        assert_eq!(g.teams[0].unit_kills, 1);
        assert!(g.teams[1]
            .events()
            .iter()
            .any(|e| e.kind == TeamEventKind::UnitLost));
    }

    #[test]
    fn test_checksum_report_matches() {
        let mut g = game(2);
        g.add_unit(1, 1, 0, UnitKind::Worker, 0).unwrap();
        let mut report = ChecksumReport::default();
        let cs = g.check_sum(Some(&mut report));
        assert_eq!(cs, g.check_sum(None));
        assert_eq!(report.teams.len(), 2);
        assert_eq!(report.units.len(), 1);
        assert_eq!(report.running.last(), Some(&cs));
    }

    #[test]
    fn test_discovery_regenerates() {
        let mut g = game(1);
        g.add_unit(20, 20, 0, UnitKind::Worker, 0).unwrap();
        g.map.unset_map_discovered();
        assert!(!g.map.is_map_discovered(21, 21, 0));
        g.regenerate_discovery_map();
        assert!(g.map.is_map_discovered(21, 21, 0));
        assert!(!g.map.is_map_discovered(22, 22, 0));
    }
}
