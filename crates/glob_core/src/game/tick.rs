//! Tick advancement.

use tracing::{info, warn};

use super::{BuildProject, Game};
use crate::map::AreaLayer;

impl Game {
    /// Advance the simulation by one tick.
    ///
    /// While a peer is late only the waiting counter moves.
    pub fn sync_step(&mut self, local_team: usize) {
        if self.any_player_waited {
            self.any_player_waited_time_for += 1;
            return;
        }
        let step = self.step_counter;

        let mut damage = Vec::new();
        for team in &mut self.teams {
            damage.extend(team.sync_step(&mut self.map, &self.registry, &mut self.sync_rand, step));
        }
        self.apply_damage(&damage);

        #[cfg(feature = "debug-validation")]
        for team in &self.teams {
            if let Err(message) = team.integrity(&self.map, &self.registry) {
                panic!("team {} failed integrity at step {step}: {message}", team.team_number);
            }
        }

        self.map.sync_step(step);
        self.sync_rand.next();

        if step & 31 == 16 {
            self.fog_sync_step();
        }
        if step & 15 == 1 {
            self.build_project_sync_step(local_team);
        }
        if step & 31 == 0 {
            self.script_sync_step();
            self.won_sync_step();
        }

        self.step_counter += 1;
    }

    fn fog_sync_step(&mut self) {
        self.map.switch_fog_of_war();
        for team in &self.teams {
            for (_, b) in team.buildings().iter() {
                let bt = self.registry.building(b.type_id);
                if (!bt.is_building_site || bt.level > 0) && !bt.is_virtual {
                    b.set_map_discovered(bt, &mut self.map, team.vision_for(bt));
                }
            }
        }
    }

    fn clear_project_marks(&mut self, project: &BuildProject, local_team: usize) {
        let bt = self.registry.building(project.type_id);
        let (w, h) = (bt.width, bt.height);
        self.map
            .set_area_rect(AreaLayer::Forbidden, project.x, project.y, w, h, project.team, false);
        if project.team == local_team {
            for dy in 0..h {
                for dx in 0..w {
                    self.map
                        .set_local_area(AreaLayer::Forbidden, project.x + dx, project.y + dy, false);
                }
            }
        }
        if let Some(team) = self.teams.get_mut(project.team) {
            team.dirty_area_gradients();
        }
    }

    /// Promote, keep or drop every queued build project.
    pub fn build_project_sync_step(&mut self, local_team: usize) {
        let projects = std::mem::take(&mut self.build_projects);
        for project in projects {
            let (x, y, team, type_id) = (project.x, project.y, project.team, project.type_id);
            if !self.check_hard_room_for_building(x, y, type_id, team) {
                self.clear_project_marks(&project, local_team);
                info!(team, x, y, "Build project dropped: site is blocked");
            } else if self.check_room_for_building(x, y, type_id, team, false) {
                match self.add_building(x, y, type_id, team, project.unit_working, project.unit_working_future) {
                    Some(gid) => {
                        self.clear_project_marks(&project, local_team);
                        self.teams[team].update_building(&self.registry, gid.slot());
                        info!(team, x, y, building = %gid, "Build project started");
                    }
                    None => {
                        warn!(team, x, y, "Build project kept: no free building slot");
                        self.build_projects.push(project);
                    }
                }
            } else {
                self.build_projects.push(project);
            }
        }
    }

    /// Run the mission script and apply its verdicts to alive teams.
    pub fn script_sync_step(&mut self) {
        self.script.sync_step();
        for team in &mut self.teams {
            if !team.is_alive {
                continue;
            }
            if self.script.has_team_won(team.team_number) {
                team.has_won = true;
            }
            if self.script.has_team_lost(team.team_number) {
                team.is_alive = false;
            }
        }
    }

    /// Evaluate victory.
    ///
    /// A team wins once no team that it does not count as an ally is
    /// alive. Once the summed prestige reaches the goal the game ends and
    /// exactly the teams holding the greatest prestige win.
    pub fn won_sync_step(&mut self) {
        if self.prestige_to_reach == 0 {
            return;
        }
        let was_ended = self.is_game_ended;
        self.total_prestige = 0;
        self.is_game_ended = false;
        let mut greatest = 0;

        for i in 0..self.teams.len() {
            let me = self.teams[i].me;
            let is_other_alive = self
                .teams
                .iter()
                .enumerate()
                .any(|(j, other)| j != i && me & other.allies == 0 && other.is_alive);
            let team = &mut self.teams[i];
            team.has_won |= !is_other_alive;
            self.is_game_ended |= team.has_won;
            self.total_prestige += team.prestige;
            greatest = greatest.max(team.prestige);
        }

        if self.total_prestige >= self.prestige_to_reach {
            self.is_game_ended = true;
            for team in &mut self.teams {
                team.has_won = team.prestige == greatest;
            }
        }

        if self.is_game_ended && !was_ended {
            let winners: Vec<usize> = self
                .teams
                .iter()
                .filter(|t| t.has_won)
                .map(|t| t.team_number)
                .collect();
            info!(step = self.step_counter, ?winners, total_prestige = self.total_prestige, "Game ended");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::data::{TypeRegistry, UnitKind};
    use crate::header::TeamKind;
    use crate::map::{Map, Terrain};

    fn game(teams: usize) -> Game {
        let registry = Arc::new(TypeRegistry::standard().unwrap());
        let mut game = Game::new(registry, Map::new(64, 64, Terrain::Grass).unwrap());
        for _ in 0..teams {
            game.add_team(TeamKind::Human).unwrap();
        }
        for i in 0..teams {
            game.add_unit(4 * i as i32, 40, i, UnitKind::Worker, 0).unwrap();
        }
        game
    }

    #[test]
    fn test_project_kept_when_slots_are_full() {
        let mut g = game(1);
        let flag = g.registry().building_id("war_flag").unwrap();
        while g.add_building(1, 1, flag, 0, 1, 1).is_some() {}
        let site = g.registry().building_id("swarm_site_0").unwrap();
        let (w, h) = {
            let bt = g.registry().building(site);
            (bt.width, bt.height)
        };
        g.build_projects.push(BuildProject {
            x: 20,
            y: 20,
            team: 0,
            type_id: site,
            unit_working: 1,
            unit_working_future: 1,
        });
        g.map.set_area_rect(AreaLayer::Forbidden, 20, 20, w, h, 0, true);

        g.build_project_sync_step(0);
        assert_eq!(g.build_projects.len(), 1);
        assert!(g.map.is_area(AreaLayer::Forbidden, 20, 20, 0));
        assert_eq!(g.map.building(20, 20), None);

        // Freeing a slot lets the project start and clears its marks.
        g.teams[0].remove_building(&mut g.map, &g.registry, 0);
        g.build_project_sync_step(0);
        assert!(g.build_projects.is_empty());
        assert!(!g.map.is_area(AreaLayer::Forbidden, 20, 20, 0));
        assert!(g.map.building(20, 20).is_some());
    }

    #[test]
    fn test_waiting_suspends_everything() {
        let mut g = game(2);
        g.any_player_waited = true;
        let before = g.check_sum(None);
        for _ in 0..10 {
            g.sync_step(0);
        }
        assert_eq!(g.step_counter, 0);
        assert_eq!(g.any_player_waited_time_for, 10);
        assert_eq!(g.check_sum(None), before);
    }

    #[test]
    fn test_step_counter_and_rand_advance() {
        let mut g = game(2);
        let seeds = g.sync_rand.seeds();
        g.sync_step(0);
        assert_eq!(g.step_counter, 1);
        assert_ne!(g.sync_rand.seeds(), seeds);
    }

    #[test]
    fn test_prestige_victory_ties() {
        let mut g = game(4);
        assert_eq!(g.prestige_to_reach, 600);
        g.teams[0].prestige = 100;
        g.teams[1].prestige = 250;
        g.teams[2].prestige = 249;
        g.won_sync_step();
        assert!(!g.is_game_ended);
        g.teams[2].prestige = 250;
        g.won_sync_step();
        assert!(g.is_game_ended);
        assert_eq!(g.total_prestige, 600);
        let winners: Vec<bool> = g.teams.iter().map(|t| t.has_won).collect();
        assert_eq!(winners, [false, true, true, false]);
    }

    #[test]
    fn test_last_team_standing_wins() {
        let mut g = game(2);
        g.won_sync_step();
        assert!(!g.is_game_ended);
        g.teams[1].is_alive = false;
        g.won_sync_step();
        assert!(g.is_game_ended);
        assert!(g.teams[0].has_won);
        assert!(!g.teams[1].has_won);
    }

    #[test]
    fn test_allies_do_not_block_victory() {
        let mut g = game(2);
        g.teams[1].allies |= g.teams[0].me;
        g.won_sync_step();
        assert!(g.teams[0].has_won);
        assert!(!g.teams[1].has_won);
    }

    #[test]
    fn test_script_verdicts() {
        let mut g = game(2);
        g.script.declare_won(0);
        g.script.declare_lost(1);
        g.script_sync_step();
        assert!(g.teams[0].has_won);
        assert!(!g.teams[1].is_alive);
        assert_eq!(g.script.step, 1);
    }

    #[test]
    fn test_victory_checked_every_32_ticks() {
        let mut g = game(2);
        g.step_counter = 1;
        g.teams[0].prestige = 600;
        for _ in 0..30 {
            g.sync_step(0);
        }
        assert!(!g.is_game_ended);
        g.sync_step(0);
        assert_eq!(g.step_counter, 32);
        assert!(!g.is_game_ended);
        g.sync_step(0);
        assert!(g.is_game_ended);
        assert!(g.teams[0].has_won);
    }
}
