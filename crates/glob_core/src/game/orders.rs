//! Order execution.
//!
//! One handler per order variant. Stale orders (dead sender team, missing
//! building, wrong building kind) are dropped without error.

use tracing::{debug, info, warn};

use super::{BuildProject, Game};
use crate::building::{Building, MAX_UNIT_WORKING_REQUEST};
use crate::data::{BuildingType, UnitKind};
use crate::header::TeamKind;
use crate::ids::Gid;
use crate::map::AreaLayer;
use crate::order::{
    AreaAlteration, BrushMode, BuildingRef, Construction, CreateBuilding, ModifyBuilding,
    ModifyClearingFlag, ModifyExchange, ModifyFlag, ModifyMinLevelToFlag, ModifySwarm, MoveFlag,
    Order, OrderKind, SetAlliance,
};

const TARGET: &str = "glob_core::orders";

/// Slack around a flag or an area when dirtying local gradients.
const LOCAL_GRADIENT_MARGIN: i32 = 16;

/// Window of local gradients a forbidden flag of `range` at `(x, y)` can affect.
fn flag_window(x: i32, y: i32, range: u32) -> (i32, i32, i32, i32) {
    let r = i32::try_from(range).unwrap_or(i32::MAX / 4);
    let side = 2 * (r + LOCAL_GRADIENT_MARGIN);
    (x - r - LOCAL_GRADIENT_MARGIN, y - r - LOCAL_GRADIENT_MARGIN, side, side)
}

/// Who an order comes from, relative to this peer.
#[derive(Debug, Clone, Copy)]
struct Origin {
    /// The order was issued by this peer's player.
    from_local: bool,
    /// Team of this peer's player.
    local_team: Option<usize>,
    /// Team of the player who sent the order.
    sender_team: usize,
}

impl Game {
    /// Apply one order.
    ///
    /// `local_player` is the player of this peer; it decides whether local
    /// shadow values and area layers follow the order.
    pub fn execute_order(&mut self, order: &Order, local_player: usize) {
        self.any_player_waited = false;
        if !matches!(order.kind, OrderKind::WaitingForPlayer(_)) {
            self.any_player_waited_time_for = 0;
        }

        let Some(sender) = self.players.get(usize::from(order.sender)) else {
            debug!(target: TARGET, sender = order.sender, "Order from unknown player dropped");
            return;
        };
        let sender_alive = self.teams.get(sender.team).is_some_and(|t| t.is_alive);
        let origin = Origin {
            from_local: usize::from(order.sender) == local_player,
            local_team: self.players.get(local_player).map(|p| p.team),
            sender_team: sender.team,
        };

        debug!(
            target: TARGET,
            step = self.step_counter,
            sender = order.sender,
            team = sender.team,
            order_type = ?order.order_type(),
            "Executing order"
        );

        let needs_alive = matches!(
            order.kind,
            OrderKind::Create(_)
                | OrderKind::ModifyBuilding(_)
                | OrderKind::ModifyExchange(_)
                | OrderKind::ModifyFlag(_)
                | OrderKind::ModifyClearingFlag(_)
                | OrderKind::ModifyMinLevelToFlag(_)
                | OrderKind::ModifySwarm(_)
                | OrderKind::MoveFlag(_)
                | OrderKind::Construction(_)
                | OrderKind::CancelConstruction(_)
        );
        if needs_alive && !sender_alive {
            debug!(target: TARGET, sender = order.sender, "Order from dead team dropped");
            return;
        }

        match &order.kind {
            OrderKind::Create(p) => self.create(p, origin),
            OrderKind::ModifyBuilding(p) => self.modify_building(p, origin),
            OrderKind::ModifyExchange(p) => self.modify_exchange(p, origin),
            OrderKind::ModifyFlag(p) => self.modify_flag(p, origin),
            OrderKind::ModifyClearingFlag(p) => self.modify_clearing_flag(p, origin),
            OrderKind::ModifyMinLevelToFlag(p) => self.modify_min_level_to_flag(p, origin),
            OrderKind::MoveFlag(p) => self.move_flag(p, origin),
            OrderKind::AlterateForbidden(p) => self.alterate_area(AreaLayer::Forbidden, p, origin),
            OrderKind::AlterateGuardArea(p) => self.alterate_area(AreaLayer::GuardArea, p, origin),
            OrderKind::AlterateClearArea(p) => self.alterate_area(AreaLayer::ClearArea, p, origin),
            OrderKind::ModifySwarm(p) => self.modify_swarm(p, origin),
            OrderKind::Delete(p) => self.delete(p),
            OrderKind::CancelDelete(p) => self.cancel_delete(p),
            OrderKind::Construction(p) => self.construction(p),
            OrderKind::CancelConstruction(p) => self.cancel_construction(p),
            OrderKind::SetAlliance(p) => self.set_alliance(p),
            OrderKind::WaitingForPlayer(p) => {
                self.any_player_waited = true;
                self.mask_away_player = p.mask_away_player;
            }
            OrderKind::PlayerQuitGame(p) => {
                info!(target: TARGET, player = p.player, step = self.step_counter, "Player quit");
            }
        }
    }

    /// Apply the locally predicted side of an order before it round-trips.
    ///
    /// Only shadowed building fields are touched; the authoritative state
    /// changes when the order comes back through [`Game::execute_order`].
    pub fn predict(&mut self, order: &Order) {
        match &order.kind {
            OrderKind::ModifyBuilding(p) => {
                if let Some(b) = self.building_mut(p.gid) {
                    b.max_unit_working.predict(p.number_requested);
                }
            }
            OrderKind::ModifyExchange(p) => {
                if let Some(b) = self.building_mut(p.gid) {
                    b.receive_mask.predict(p.receive_mask);
                    b.send_mask.predict(p.send_mask);
                }
            }
            OrderKind::ModifyFlag(p) => {
                let Some(max) = self.building_type_of(p.gid).map(|bt| bt.max_unit_stay_range) else {
                    return;
                };
                if let Some(b) = self.building_mut(p.gid) {
                    b.unit_stay_range.predict(p.range.min(max));
                }
            }
            OrderKind::ModifyClearingFlag(p) => {
                if let Some(b) = self.building_mut(p.gid) {
                    b.clearing_mask.predict(p.mask);
                }
            }
            OrderKind::ModifyMinLevelToFlag(p) => {
                if let Some(b) = self.building_mut(p.gid) {
                    b.min_level_to_flag.predict(p.level);
                }
            }
            OrderKind::ModifySwarm(p) => {
                if let Some(b) = self.building_mut(p.gid) {
                    b.ratios.predict(p.ratios);
                }
            }
            OrderKind::MoveFlag(p) => {
                let position = self.map.wrap(p.x, p.y);
                if let Some(b) = self.building_mut(p.gid) {
                    b.position.predict(position);
                }
            }
            _ => {}
        }
    }

    fn building_mut(&mut self, gid: Gid) -> Option<&mut Building> {
        self.teams.get_mut(gid.team())?.building_mut(gid.slot())
    }

    fn building_type_of(&self, gid: Gid) -> Option<&BuildingType> {
        let b = self.get_building(gid)?;
        Some(self.registry.building(b.type_id))
    }

    fn create(&mut self, p: &CreateBuilding, origin: Origin) {
        if p.team != origin.sender_team {
            warn!(
                target: TARGET,
                team = p.team,
                sender_team = origin.sender_team,
                "Create for another team dropped"
            );
            return;
        }
        let Some(team) = self.teams.get(p.team) else {
            return;
        };
        let Some(bt) = self.registry.get_building(p.type_id) else {
            debug!(target: TARGET, type_id = p.type_id.0, "Create with unknown type dropped");
            return;
        };
        let (x, y) = self.map.wrap(p.x, p.y);
        if !bt.is_virtual && team.no_more_building_sites_countdown > 0 {
            debug!(target: TARGET, team = p.team, "Create refused during countdown");
            return;
        }
        let (is_virtual, w, h) = (bt.is_virtual, bt.width, bt.height);

        if is_virtual || self.check_room_for_building(x, y, p.type_id, p.team, false) {
            if let Some(gid) =
                self.add_building(x, y, p.type_id, p.team, p.unit_working, p.unit_working_future)
            {
                self.teams[p.team].update_building(&self.registry, gid.slot());
                debug!(target: TARGET, team = p.team, building = %gid, x, y, "Building created");
            }
        } else if self.check_hard_room_for_building(x, y, p.type_id, p.team) {
            self.build_projects.push(BuildProject {
                x,
                y,
                team: p.team,
                type_id: p.type_id,
                unit_working: p.unit_working,
                unit_working_future: p.unit_working_future,
            });
            self.map
                .set_area_rect(AreaLayer::Forbidden, x, y, w, h, p.team, true);
            if origin.local_team == Some(p.team) {
                for dy in 0..h {
                    for dx in 0..w {
                        self.map
                            .set_local_area(AreaLayer::Forbidden, x.wrapping_add(dx), y.wrapping_add(dy), true);
                    }
                }
            }
            self.teams[p.team].dirty_area_gradients();
            info!(team = p.team, x, y, "Build project queued: site is occupied");
        }
    }

    fn modify_building(&mut self, p: &ModifyBuilding, origin: Origin) {
        if p.number_requested > MAX_UNIT_WORKING_REQUEST {
            warn!(
                target: TARGET,
                building = %p.gid,
                requested = p.number_requested,
                max = MAX_UNIT_WORKING_REQUEST,
                "Unit request out of range dropped"
            );
            return;
        }
        let Some(team) = self.teams.get_mut(p.gid.team()) else {
            return;
        };
        let Some(b) = team.building_mut(p.gid.slot()) else {
            return;
        };
        if !b.is_alive() {
            return;
        }
        b.max_unit_working.commit(p.number_requested, origin.from_local);
        b.max_unit_working_preferred = p.number_requested;
        team.update_building(&self.registry, p.gid.slot());
    }

    fn modify_exchange(&mut self, p: &ModifyExchange, origin: Origin) {
        let Some(team) = self.teams.get_mut(p.gid.team()) else {
            return;
        };
        let Some(b) = team.building_mut(p.gid.slot()).filter(|b| b.is_alive()) else {
            return;
        };
        b.receive_mask.commit(p.receive_mask, origin.from_local);
        b.send_mask.commit(p.send_mask, origin.from_local);
        team.update_building(&self.registry, p.gid.slot());
    }

    fn modify_flag(&mut self, p: &ModifyFlag, origin: Origin) {
        let Some(bt) = self.building_type_of(p.gid).cloned() else {
            return;
        };
        if bt.max_unit_stay_range == 0 {
            return;
        }
        let range = p.range.min(bt.max_unit_stay_range);
        let team = &mut self.teams[p.gid.team()];
        let Some(b) = team.building_mut(p.gid.slot()).filter(|b| b.is_alive()) else {
            return;
        };
        let old = *b.unit_stay_range.get();
        let (bx, by) = (b.x(), b.y());
        b.unit_stay_range.commit(range, origin.from_local);
        if bt.zonable_forbidden {
            if range < old {
                team.dirty_global_gradient();
                let (x, y, w, h) = flag_window(bx, by, old);
                team.dirty_local_gradient(&self.map, &self.registry, x, y, w, h);
            }
        } else {
            b.dirty_local_gradients();
        }
    }

    fn modify_clearing_flag(&mut self, p: &ModifyClearingFlag, origin: Origin) {
        let Some(bt) = self.building_type_of(p.gid) else {
            return;
        };
        if !bt.is_virtual || !bt.is_zonable(UnitKind::Worker) {
            return;
        }
        if let Some(b) = self.teams[p.gid.team()]
            .building_mut(p.gid.slot())
            .filter(|b| b.is_alive())
        {
            b.clearing_mask.commit(p.mask, origin.from_local);
            b.dirty_local_gradients();
        }
    }

    fn modify_min_level_to_flag(&mut self, p: &ModifyMinLevelToFlag, origin: Origin) {
        let Some(bt) = self.building_type_of(p.gid) else {
            return;
        };
        if !bt.is_virtual || !(bt.is_zonable(UnitKind::Warrior) || bt.is_zonable(UnitKind::Explorer)) {
            return;
        }
        let team = &mut self.teams[p.gid.team()];
        if let Some(b) = team.building_mut(p.gid.slot()).filter(|b| b.is_alive()) {
            b.min_level_to_flag.commit(p.level, origin.from_local);
            team.flush_staffing(&self.registry, p.gid.slot());
        }
    }

    fn move_flag(&mut self, p: &MoveFlag, origin: Origin) {
        let Some(bt) = self.building_type_of(p.gid).cloned() else {
            return;
        };
        if !bt.is_virtual {
            return;
        }
        let (x, y) = self.map.wrap(p.x, p.y);
        let team = &mut self.teams[p.gid.team()];
        let Some(b) = team.building_mut(p.gid.slot()).filter(|b| b.is_alive()) else {
            return;
        };
        let (ox, oy) = (b.x(), b.y());
        let range = *b.unit_stay_range.get();
        b.position.commit((x, y), origin.from_local);
        b.dirty_local_gradients();
        if bt.zonable_forbidden && p.drop {
            team.dirty_global_gradient();
            let (x, y, w, h) = flag_window(ox, oy, range);
            team.dirty_local_gradient(&self.map, &self.registry, x, y, w, h);
        }
        debug!(target: TARGET, flag = %p.gid, x, y, "Flag moved");
    }

    fn alterate_area(&mut self, layer: AreaLayer, p: &AreaAlteration, origin: Origin) {
        if p.team >= self.teams.len() {
            return;
        }
        if !p.is_well_formed() {
            warn!(
                target: TARGET,
                team = p.team,
                bits = p.mask.len(),
                "Area order with mismatched mask dropped"
            );
            return;
        }
        let on = p.mode == BrushMode::Add;
        let local = origin.local_team == Some(p.team);
        for (x, y) in p.tiles() {
            self.map.set_area(layer, x, y, p.team, on);
            if local {
                self.map.set_local_area(layer, x, y, on);
            }
        }
        let team = &mut self.teams[p.team];
        match layer {
            AreaLayer::Forbidden => {
                if !on {
                    team.dirty_global_gradient();
                    let (x, y) = (
                        p.center_x.wrapping_add(p.min_x).wrapping_sub(LOCAL_GRADIENT_MARGIN),
                        p.center_y.wrapping_add(p.min_y).wrapping_sub(LOCAL_GRADIENT_MARGIN),
                    );
                    let w = p.max_x.wrapping_sub(p.min_x).wrapping_add(2 * LOCAL_GRADIENT_MARGIN);
                    let h = p.max_y.wrapping_sub(p.min_y).wrapping_add(2 * LOCAL_GRADIENT_MARGIN);
                    team.dirty_local_gradient(&self.map, &self.registry, x, y, w, h);
                }
                team.dirty_area_gradients();
            }
            AreaLayer::GuardArea => team.dirty_area_gradients(),
            AreaLayer::ClearArea => {}
        }
    }

    fn modify_swarm(&mut self, p: &ModifySwarm, origin: Origin) {
        let Some(bt) = self.building_type_of(p.gid) else {
            return;
        };
        if !bt.produces_units() {
            return;
        }
        let team = &mut self.teams[p.gid.team()];
        if let Some(b) = team.building_mut(p.gid.slot()).filter(|b| b.is_alive()) {
            b.ratios.commit(p.ratios, origin.from_local);
            team.update_building(&self.registry, p.gid.slot());
        }
    }

    fn delete(&mut self, p: &BuildingRef) {
        let Some(team) = self.teams.get_mut(p.gid.team()) else {
            return;
        };
        let Some(b) = team.building_mut(p.gid.slot()) else {
            return;
        };
        let released = b.launch_delete();
        let forbidden_zone = self.registry.building(b.type_id).zonable_forbidden;
        team.free_units(&released);
        if forbidden_zone {
            team.dirty_global_gradient();
        }
        debug!(target: TARGET, building = %p.gid, "Deletion scheduled");
    }

    fn cancel_delete(&mut self, p: &BuildingRef) {
        let Some(team) = self.teams.get_mut(p.gid.team()) else {
            return;
        };
        if let Some(b) = team.building_mut(p.gid.slot()) {
            b.cancel_delete();
        }
    }

    fn construction(&mut self, p: &Construction) {
        let Some(team) = self.teams.get_mut(p.gid.team()) else {
            return;
        };
        let Some(b) = team.building_mut(p.gid.slot()) else {
            return;
        };
        if let Some(released) = b.launch_construction(&self.registry, p.unit_working, p.unit_working_future) {
            team.free_units(&released);
            team.update_building(&self.registry, p.gid.slot());
            debug!(target: TARGET, building = %p.gid, "Upgrade started");
        }
    }

    fn cancel_construction(&mut self, p: &BuildingRef) {
        let Some(team) = self.teams.get_mut(p.gid.team()) else {
            return;
        };
        let Some(b) = team.building_mut(p.gid.slot()) else {
            return;
        };
        if let Some(released) = b.cancel_construction(&self.registry) {
            team.free_units(&released);
            team.update_building(&self.registry, p.gid.slot());
        }
    }

    fn set_alliance(&mut self, p: &SetAlliance) {
        let Some(team) = self.teams.get_mut(p.team) else {
            return;
        };
        team.allies = p.allies;
        team.enemies = p.enemies;
        team.shared_vision_exchange = p.vision_exchange;
        team.shared_vision_food = p.vision_food;
        team.shared_vision_other = p.vision_other;
        self.set_ai_alliance();
        self.dirty_war_flag_gradient();
    }

    /// Whether every non-AI team is allied with exactly the non-AI teams.
    fn humans_all_allied(&self) -> bool {
        let non_ai_mask = self
            .teams
            .iter()
            .filter(|t| t.kind != TeamKind::Ai)
            .fold(0, |m, t| m | t.me);
        self.teams
            .iter()
            .filter(|t| t.kind != TeamKind::Ai)
            .all(|t| t.allies == non_ai_mask)
    }

    /// Align AI diplomacy with the humans: when every human team is allied
    /// with every other, the AIs band together; otherwise each AI stands alone.
    pub fn set_ai_alliance(&mut self) {
        let humans_allied = self.humans_all_allied();
        let ai_mask = self
            .teams
            .iter()
            .filter(|t| t.kind == TeamKind::Ai)
            .fold(0, |m, t| m | t.me);
        for team in self.teams.iter_mut().filter(|t| t.kind == TeamKind::Ai) {
            let allies = if humans_allied { ai_mask } else { team.me };
            team.allies = allies;
            team.enemies = !allies;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::building::Medium;
    use crate::data::TypeRegistry;
    use crate::header::{BasePlayer, GameHeader};
    use crate::map::{Map, Terrain};
    use crate::order::{BitMask, WaitingForPlayer};
    use crate::player::PlayerKind;

    fn game() -> Game {
        let registry = Arc::new(TypeRegistry::standard().unwrap());
        let mut g = Game::new(registry, Map::new(64, 64, Terrain::Grass).unwrap());
        g.add_team(TeamKind::Human).unwrap();
        g.add_team(TeamKind::Ai).unwrap();
        g.set_game_header(GameHeader {
            players: vec![
                BasePlayer { number: 0, name: "human".into(), team: 0, kind: PlayerKind::Human },
                BasePlayer { number: 1, name: "ai".into(), team: 1, kind: PlayerKind::Ai },
            ],
            order_latency: 0,
        })
        .unwrap();
        g
    }

    fn order(sender: u8, kind: OrderKind) -> Order {
        Order::new(sender, 0, kind)
    }

    fn create(g: &Game, team: usize, name: &str, x: i32, y: i32) -> Order {
        order(
            team as u8,
            OrderKind::Create(CreateBuilding {
                team,
                x,
                y,
                type_id: g.registry().building_id(name).unwrap(),
                unit_working: 2,
                unit_working_future: 1,
            }),
        )
    }

    #[test]
    fn test_create_places_building() {
        let mut g = game();
        let o = create(&g, 0, "swarm_site_0", 66, 3);
        g.execute_order(&o, 0);
        let gid = g.map.building(2, 3).unwrap();
        assert_eq!(gid, Gid::new(0, 0));
        assert_eq!(*g.get_building(gid).unwrap().max_unit_working.get(), 2);
    }

    #[test]
    fn test_create_soft_blocked_queues_project() {
        let mut g = game();
        g.add_unit(10, 10, 0, UnitKind::Worker, 0).unwrap();
        let o = create(&g, 0, "swarm_site_0", 10, 10);
        g.execute_order(&o, 0);
        assert_eq!(g.map.building(10, 10), None);
        assert_eq!(g.build_projects.len(), 1);
        assert!(g.map.is_area(AreaLayer::Forbidden, 11, 11, 0));
        assert!(g.map.local_area(AreaLayer::Forbidden, 11, 11));
    }

    #[test]
    fn test_create_hard_blocked_dropped() {
        let mut g = game();
        g.map.set_terrain(10, 10, Terrain::Water);
        let o = create(&g, 0, "swarm_site_0", 10, 10);
        g.execute_order(&o, 0);
        assert!(g.build_projects.is_empty());
        assert!(g.teams[0].buildings().is_empty());
    }

    #[test]
    fn test_dead_team_orders_dropped() {
        let mut g = game();
        g.teams[0].is_alive = false;
        let o = create(&g, 0, "war_flag", 1, 1);
        g.execute_order(&o, 0);
        assert!(g.teams[0].buildings().is_empty());
        // Alliance changes still go through.
        g.execute_order(
            &order(
                0,
                OrderKind::SetAlliance(SetAlliance {
                    team: 0,
                    allies: 3,
                    enemies: 0,
                    vision_exchange: 1,
                    vision_food: 1,
                    vision_other: 1,
                }),
            ),
            0,
        );
        assert_eq!(g.teams[0].allies, 3);
    }

    #[test]
    fn test_modify_building_limits() {
        let mut g = game();
        let o = create(&g, 0, "war_flag", 1, 1);
        g.execute_order(&o, 0);
        let gid = Gid::new(0, 0);
        let modify = |n| order(0, OrderKind::ModifyBuilding(ModifyBuilding { gid, number_requested: n }));
        g.execute_order(&modify(20), 0);
        assert_eq!(*g.get_building(gid).unwrap().max_unit_working.get(), 20);
        g.execute_order(&modify(21), 0);
        assert_eq!(*g.get_building(gid).unwrap().max_unit_working.get(), 20);
    }

    #[test]
    fn test_prediction_round_trip() {
        let mut g = game();
        let o = create(&g, 0, "war_flag", 1, 1);
        g.execute_order(&o, 0);
        let gid = Gid::new(0, 0);
        let modify = order(0, OrderKind::ModifyBuilding(ModifyBuilding { gid, number_requested: 7 }));
        g.predict(&modify);
        let b = g.get_building(gid).unwrap();
        assert_eq!(*b.max_unit_working.local(), 7);
        assert_eq!(*b.max_unit_working.get(), 2);
        g.execute_order(&modify, 0);
        let b = g.get_building(gid).unwrap();
        assert_eq!(*b.max_unit_working.get(), 7);
        assert_eq!(b.max_unit_working.pending(), 0);
    }

    #[test]
    fn test_area_alteration_local_layer_only_for_own_team() {
        let mut g = game();
        let alteration = |team| AreaAlteration {
            team,
            mode: BrushMode::Add,
            center_x: 0,
            center_y: 0,
            min_x: 0,
            min_y: 0,
            max_x: 2,
            max_y: 1,
            mask: BitMask::from_fn(2, |_| true),
        };
        g.execute_order(&order(1, OrderKind::AlterateGuardArea(alteration(1))), 0);
        assert!(g.map.is_area(AreaLayer::GuardArea, 1, 0, 1));
        assert!(!g.map.local_area(AreaLayer::GuardArea, 1, 0));
        g.execute_order(&order(0, OrderKind::AlterateGuardArea(alteration(0))), 0);
        assert!(g.map.local_area(AreaLayer::GuardArea, 1, 0));

        let mut erase = alteration(0);
        erase.mode = BrushMode::Del;
        g.execute_order(&order(0, OrderKind::AlterateGuardArea(erase)), 0);
        assert!(!g.map.is_area(AreaLayer::GuardArea, 1, 0, 0));
        assert!(g.map.is_area(AreaLayer::GuardArea, 1, 0, 1));
    }

    #[test]
    fn test_waiting_resets_only_on_real_orders() {
        let mut g = game();
        let wait = order(0, OrderKind::WaitingForPlayer(WaitingForPlayer { mask_away_player: 2 }));
        g.execute_order(&wait, 0);
        assert!(g.any_player_waited);
        g.sync_step(0);
        g.sync_step(0);
        assert_eq!(g.any_player_waited_time_for, 2);
        g.execute_order(&wait, 0);
        assert_eq!(g.any_player_waited_time_for, 2);
        g.execute_order(&order(0, OrderKind::CancelDelete(BuildingRef { gid: Gid::new(0, 0) })), 0);
        assert!(!g.any_player_waited);
        assert_eq!(g.any_player_waited_time_for, 0);
        assert_eq!(g.mask_away_player, 2);
    }

    #[test]
    fn test_delete_and_cancel() {
        let mut g = game();
        let o = create(&g, 0, "swarm_site_0", 4, 4);
        g.execute_order(&o, 0);
        let gid = Gid::new(0, 0);
        g.execute_order(&order(0, OrderKind::Delete(BuildingRef { gid })), 0);
        assert!(!g.get_building(gid).unwrap().is_alive());
        g.execute_order(&order(0, OrderKind::CancelDelete(BuildingRef { gid })), 0);
        assert!(g.get_building(gid).unwrap().is_alive());
        g.execute_order(&order(0, OrderKind::Delete(BuildingRef { gid })), 0);
        g.sync_step(0);
        assert!(g.get_building(gid).is_none());
    }

    #[test]
    fn test_construction_and_cancel() {
        let mut g = game();
        let swarm = g.registry().building_id("swarm_0").unwrap();
        let gid = g.add_building(4, 4, swarm, 0, 1, 1).unwrap();
        g.execute_order(
            &order(0, OrderKind::Construction(Construction { gid, unit_working: 3, unit_working_future: 1 })),
            0,
        );
        let site = g.registry().building(g.get_building(gid).unwrap().type_id);
        assert!(site.is_building_site);
        assert_eq!(site.level, 1);
        g.execute_order(&order(0, OrderKind::CancelConstruction(BuildingRef { gid })), 0);
        assert_eq!(g.get_building(gid).unwrap().type_id, swarm);
    }

    #[test]
    fn test_ai_alliance_follows_humans() {
        let mut g = game();
        g.add_team(TeamKind::Ai).unwrap();
        g.set_ai_alliance();
        assert_eq!(g.teams[1].allies, 0b110);
        g.add_team(TeamKind::Human).unwrap();
        g.set_ai_alliance();
        assert_eq!(g.teams[1].allies, 0b010);
        assert_eq!(g.teams[2].enemies, !0b100);

        // Two humans, two AIs: the humans must be allied with exactly each other.
        let mut g = game();
        g.teams[1].kind = TeamKind::Human;
        g.add_team(TeamKind::Ai).unwrap();
        g.add_team(TeamKind::Ai).unwrap();
        g.teams[0].allies = 0b0111;
        g.teams[1].allies = 0b0011;
        g.set_ai_alliance();
        assert_eq!(g.teams[2].allies, 0b0100);
        assert_eq!(g.teams[3].allies, 0b1000);
        g.teams[0].allies = 0b0011;
        g.set_ai_alliance();
        assert_eq!(g.teams[2].allies, 0b1100);
        assert_eq!(g.teams[3].enemies, !0b1100);
    }

    #[test]
    fn test_create_for_other_team_dropped() {
        let mut g = game();
        let mut o = create(&g, 1, "swarm_site_0", 8, 8);
        o.sender = 0;
        g.execute_order(&o, 0);
        assert_eq!(g.map.building(8, 8), None);
        assert!(g.teams[1].buildings().is_empty());
        assert!(g.build_projects.is_empty());
    }

    /// Delete `gid`, apply `kind`, then cancel the deletion.
    fn apply_while_deleting(g: &mut Game, gid: Gid, kind: OrderKind) {
        g.execute_order(&order(0, OrderKind::Delete(BuildingRef { gid })), 0);
        g.execute_order(&order(0, kind), 0);
        g.execute_order(&order(0, OrderKind::CancelDelete(BuildingRef { gid })), 0);
        assert!(g.get_building(gid).unwrap().is_alive());
    }

    #[test]
    fn test_swarm_ratios_ignored_while_deleting() {
        let mut g = game();
        let swarm = g.registry().building_id("swarm_0").unwrap();
        let gid = g.add_building(4, 4, swarm, 0, 1, 1).unwrap();
        apply_while_deleting(&mut g, gid, OrderKind::ModifySwarm(ModifySwarm { gid, ratios: [0, 0, 7] }));
        assert_eq!(*g.get_building(gid).unwrap().ratios.get(), [1, 0, 0]);
    }

    #[test]
    fn test_exchange_ignored_while_deleting() {
        let mut g = game();
        let swarm = g.registry().building_id("swarm_0").unwrap();
        let gid = g.add_building(4, 4, swarm, 0, 1, 1).unwrap();
        apply_while_deleting(
            &mut g,
            gid,
            OrderKind::ModifyExchange(ModifyExchange { gid, receive_mask: 0xff, send_mask: 0xf0 }),
        );
        let b = g.get_building(gid).unwrap();
        assert_eq!(*b.receive_mask.get(), 0);
        assert_eq!(*b.send_mask.get(), 0);
    }

    #[test]
    fn test_flag_orders_ignored_while_deleting() {
        let mut g = game();
        g.execute_order(&create(&g, 0, "war_flag", 20, 20), 0);
        g.execute_order(&create(&g, 0, "clearing_flag", 40, 40), 0);
        let war = Gid::new(0, 0);
        let clearing = Gid::new(0, 1);

        apply_while_deleting(&mut g, war, OrderKind::ModifyFlag(ModifyFlag { gid: war, range: 9 }));
        assert_eq!(*g.get_building(war).unwrap().unit_stay_range.get(), 4);

        apply_while_deleting(
            &mut g,
            war,
            OrderKind::ModifyMinLevelToFlag(ModifyMinLevelToFlag { gid: war, level: 3 }),
        );
        assert_eq!(*g.get_building(war).unwrap().min_level_to_flag.get(), 0);

        apply_while_deleting(
            &mut g,
            war,
            OrderKind::MoveFlag(MoveFlag { gid: war, x: 50, y: 50, drop: true }),
        );
        assert_eq!(*g.get_building(war).unwrap().position.get(), (20, 20));

        let before = *g.get_building(clearing).unwrap().clearing_mask.get();
        apply_while_deleting(
            &mut g,
            clearing,
            OrderKind::ModifyClearingFlag(ModifyClearingFlag { gid: clearing, mask: 0 }),
        );
        assert_eq!(*g.get_building(clearing).unwrap().clearing_mask.get(), before);
    }

    #[test]
    fn test_mismatched_area_order_is_noop() {
        let mut g = game();
        let huge = AreaAlteration {
            team: 0,
            mode: BrushMode::Del,
            center_x: i32::MAX,
            center_y: i32::MAX,
            min_x: i32::MIN,
            min_y: 0,
            max_x: i32::MAX,
            max_y: 1,
            mask: BitMask::from_fn(8, |_| true),
        };
        g.execute_order(&order(0, OrderKind::AlterateForbidden(huge.clone())), 0);
        g.execute_order(&order(0, OrderKind::AlterateGuardArea(huge)), 0);
        for x in 0..64 {
            assert!(!g.map.is_area(AreaLayer::GuardArea, x, 0, 0));
        }

        // A well-formed brush at the edge of the coordinate range wraps.
        let edge = AreaAlteration {
            team: 0,
            mode: BrushMode::Add,
            center_x: i32::MAX,
            center_y: 0,
            min_x: 0,
            min_y: 0,
            max_x: 2,
            max_y: 1,
            mask: BitMask::from_fn(2, |_| true),
        };
        g.execute_order(&order(0, OrderKind::AlterateClearArea(edge)), 0);
        assert!(g.map.is_area(AreaLayer::ClearArea, 63, 0, 0));
        assert!(g.map.is_area(AreaLayer::ClearArea, 0, 0, 0));
    }

    #[test]
    fn test_flag_window_margin() {
        assert_eq!(flag_window(40, 40, 5), (19, 19, 42, 42));
        assert_eq!(flag_window(0, 0, 0), (-16, -16, 32, 32));
    }

    #[test]
    fn test_shrinking_war_flag_dirties_nearby_gradients() {
        let mut g = game();
        g.execute_order(&create(&g, 0, "war_flag", 10, 10), 0);
        g.execute_order(&create(&g, 0, "war_flag", 33, 10), 0);
        let far = Gid::new(0, 1);
        let registry = Arc::clone(&g.registry);
        let bt = registry.building(g.get_building(far).unwrap().type_id);
        let b = g.teams[0].building_mut(far.slot()).unwrap();
        assert!(b.local_gradient(bt, &g.map, Medium::Ground, false).is_some());
        assert!(b.has_local_gradient(Medium::Ground, false));

        let shrink = ModifyFlag { gid: Gid::new(0, 0), range: 1 };
        g.execute_order(&order(0, OrderKind::ModifyFlag(shrink)), 0);
        assert!(!g.get_building(far).unwrap().has_local_gradient(Medium::Ground, false));
    }

    #[test]
    fn test_min_level_flushes_staffing() {
        let mut g = game();
        let o = create(&g, 0, "war_flag", 30, 30);
        g.execute_order(&o, 0);
        g.add_unit(10, 10, 0, UnitKind::Warrior, 0).unwrap();
        g.sync_step(0);
        let gid = Gid::new(0, 0);
        assert_eq!(g.get_building(gid).unwrap().units_working.len(), 1);
        g.execute_order(
            &order(0, OrderKind::ModifyMinLevelToFlag(ModifyMinLevelToFlag { gid, level: 1 })),
            0,
        );
        assert!(g.get_building(gid).unwrap().units_working.is_empty());
        assert!(g.get_unit(Gid::new(0, 0)).unwrap().working_for().is_none());
    }
}
