//! Order execution and tick scheduling seen from the outside.

use glob_core::game::read_map_header;
use glob_core::order::{
    AreaAlteration, BitMask, BrushMode, BuildingRef, CreateBuilding, ModifyExchange, ModifyFlag,
    ModifySwarm, MoveFlag, WaitingForPlayer,
};
use glob_core::prelude::*;
use glob_test_utils::fixtures::{duel, registry, GameBuilder};

fn create(game: &Game, team: usize, name: &str, x: i32, y: i32) -> Order {
    Order::new(
        team as u8,
        game.step_counter,
        OrderKind::Create(CreateBuilding {
            team,
            x,
            y,
            type_id: game.registry().building_id(name).unwrap(),
            unit_working: 1,
            unit_working_future: 1,
        }),
    )
}

#[test]
fn test_blocked_site_becomes_project_then_building() {
    let mut game = GameBuilder::new(32, 32)
        .team(TeamKind::Human)
        .unit(0, UnitKind::Worker, 10, 10)
        .unit(0, UnitKind::Worker, 25, 25)
        .build();
    let order = create(&game, 0, "swarm_site_0", 10, 10);
    game.execute_order(&order, 0);
    assert!(game.teams[0].buildings().is_empty());
    assert_eq!(game.build_projects.len(), 1);
    assert!(game.map.is_area(AreaLayer::Forbidden, 10, 10, 0));

    assert!(game.remove_unit_and_building_and_flags(10, 10, RemoveFlags::GROUND_UNIT));
    game.sync_step(0);
    assert_eq!(game.build_projects.len(), 1);
    game.sync_step(0);
    assert!(game.build_projects.is_empty());
    assert_eq!(game.map.building(10, 10), Some(Gid::new(0, 0)));
    assert!(!game.map.is_area(AreaLayer::Forbidden, 10, 10, 0));
    assert!(!game.map.local_area(AreaLayer::Forbidden, 10, 10));
}

#[test]
fn test_project_dropped_when_hard_blocked() {
    let mut game = GameBuilder::new(32, 32)
        .team(TeamKind::Human)
        .unit(0, UnitKind::Worker, 10, 10)
        .build();
    let order = create(&game, 0, "swarm_site_0", 10, 10);
    game.execute_order(&order, 0);
    game.map.set_terrain(11, 11, Terrain::Water);
    game.sync_step(0);
    game.sync_step(0);
    assert!(game.build_projects.is_empty());
    assert!(!game.map.is_area(AreaLayer::Forbidden, 10, 10, 0));
}

#[test]
fn test_flag_room_is_exact_tile_per_team() {
    let mut game = duel();
    let flag = game.registry().building_id("war_flag").unwrap();
    assert!(game.check_room_for_building(20, 20, flag, 0, false));
    game.execute_order(&create(&game, 0, "war_flag", 20, 20), 0);
    assert!(!game.check_room_for_building(20, 20, flag, 0, false));
    assert!(game.check_room_for_building(21, 20, flag, 0, false));
    assert!(game.check_room_for_building(20, 20, flag, 1, false));
    // Flags stand on occupied tiles.
    assert!(game.check_room_for_building(8, 8, flag, 0, false));
}

#[test]
fn test_deleted_slot_is_reused_lowest_first() {
    let mut game = GameBuilder::new(64, 64).team(TeamKind::Human).build();
    for x in [4, 10, 16] {
        game.execute_order(&create(&game, 0, "wall_site_0", x, 4), 0);
    }
    assert_eq!(game.teams[0].buildings().len(), 3);
    let middle = Gid::new(0, 1);
    game.execute_order(
        &Order::new(0, 0, OrderKind::Delete(BuildingRef { gid: middle })),
        0,
    );
    game.sync_step(0);
    assert!(game.get_building(middle).is_none());
    game.execute_order(&create(&game, 0, "wall_site_0", 30, 4), 0);
    assert_eq!(game.map.building(30, 4), Some(middle));
    assert_eq!(game.map.building(10, 4), None);
}

#[test]
fn test_orders_survive_the_wire() {
    let mut direct = duel();
    let mut wired = duel();
    let order = create(&direct, 1, "food_site_0", 30, 20);
    let decoded = Order::from_bytes(&order.to_bytes().unwrap()).unwrap();
    assert_eq!(decoded, order);
    direct.execute_order(&order, 0);
    wired.execute_order(&decoded, 0);
    assert_eq!(direct.check_sum(None), wired.check_sum(None));
}

#[test]
fn test_waiting_freezes_until_a_real_order() {
    let mut game = duel();
    for _ in 0..5 {
        game.sync_step(0);
    }
    let frozen = game.check_sum(None);
    let wait = Order::new(1, 5, OrderKind::WaitingForPlayer(WaitingForPlayer { mask_away_player: 0b10 }));
    game.execute_order(&wait, 0);
    for _ in 0..20 {
        game.sync_step(0);
    }
    assert_eq!(game.step_counter, 5);
    assert_eq!(game.check_sum(None), frozen);
    assert_eq!(game.any_player_waited_time_for, 20);

    game.execute_order(&create(&game, 0, "war_flag", 2, 30), 0);
    game.sync_step(0);
    assert_eq!(game.step_counter, 6);
    assert_eq!(game.any_player_waited_time_for, 0);
}

#[test]
fn test_prestige_goal_ends_the_game() {
    let mut game = GameBuilder::new(32, 32)
        .team(TeamKind::Human)
        .team(TeamKind::Ai)
        .team(TeamKind::Human)
        .unit(0, UnitKind::Worker, 1, 1)
        .unit(1, UnitKind::Worker, 10, 10)
        .unit(2, UnitKind::Worker, 20, 20)
        .build();
    assert_eq!(game.prestige_to_reach, 500);
    game.teams[1].prestige = 300;
    game.teams[2].prestige = 199;
    game.sync_step(0);
    assert!(!game.is_game_ended);
    game.teams[0].prestige = 1;
    while game.step_counter <= 32 {
        game.sync_step(0);
    }
    assert!(game.is_game_ended);
    assert_eq!(game.team_with_most_prestige(), Some(1));
    let winners: Vec<bool> = game.teams.iter().map(|t| t.has_won).collect();
    assert_eq!(winners, [false, true, false]);
}

#[test]
fn test_saved_header_names_the_map() {
    let game = duel();
    let mut bytes = std::io::Cursor::new(Vec::new());
    game.save(&mut bytes, ByteOrder::Big).unwrap();
    bytes.set_position(0);
    let header = read_map_header(&mut bytes).unwrap();
    assert_eq!(header.name, "Duel");
    assert_eq!(header.teams.len(), 2);
}

/// Run `kind` between a deletion and its cancellation.
fn while_deleting(game: &mut Game, gid: Gid, kind: OrderKind) {
    game.execute_order(&Order::new(0, 0, OrderKind::Delete(BuildingRef { gid })), 0);
    game.execute_order(&Order::new(0, 0, kind), 0);
    game.execute_order(&Order::new(0, 0, OrderKind::CancelDelete(BuildingRef { gid })), 0);
}

#[test]
fn test_settings_of_dying_buildings_are_frozen() {
    let mut game = duel();
    let swarm = Gid::new(0, 0);
    while_deleting(&mut game, swarm, OrderKind::ModifySwarm(ModifySwarm { gid: swarm, ratios: [0, 0, 7] }));
    while_deleting(
        &mut game,
        swarm,
        OrderKind::ModifyExchange(ModifyExchange { gid: swarm, receive_mask: 3, send_mask: 3 }),
    );
    let b = game.get_building(swarm).unwrap();
    assert!(b.is_alive());
    assert_eq!(*b.ratios.get(), [1, 0, 0]);
    assert_eq!(*b.receive_mask.get(), 0);

    game.execute_order(&create(&game, 0, "exploration_flag", 30, 30), 0);
    let flag = Gid::new(0, 1);
    while_deleting(&mut game, flag, OrderKind::ModifyFlag(ModifyFlag { gid: flag, range: 15 }));
    while_deleting(
        &mut game,
        flag,
        OrderKind::MoveFlag(MoveFlag { gid: flag, x: 50, y: 2, drop: true }),
    );
    let b = game.get_building(flag).unwrap();
    assert_eq!(*b.unit_stay_range.get(), 5);
    assert_eq!(*b.position.get(), (30, 30));
}

#[test]
fn test_create_for_foreign_team_is_ignored() {
    let mut game = duel();
    let before = game.check_sum(None);
    let mut order = create(&game, 1, "food_site_0", 30, 20);
    order.sender = 0;
    game.execute_order(&order, 0);
    assert_eq!(game.map.building(30, 20), None);
    assert_eq!(game.teams[1].buildings().len(), 1);
    assert_eq!(game.check_sum(None), before);
}

#[test]
fn test_malformed_area_orders_are_ignored() {
    let mut game = duel();
    let before = game.check_sum(None);
    let brushes = [
        // Rectangle far larger than its mask.
        AreaAlteration {
            team: 0,
            mode: BrushMode::Add,
            center_x: 0,
            center_y: 0,
            min_x: -1_000_000,
            min_y: -1_000_000,
            max_x: 1_000_000,
            max_y: 1_000_000,
            mask: BitMask::from_fn(16, |_| true),
        },
        // Inverted rectangle.
        AreaAlteration {
            team: 0,
            mode: BrushMode::Del,
            center_x: 5,
            center_y: 5,
            min_x: 3,
            min_y: 0,
            max_x: 0,
            max_y: 2,
            mask: BitMask::from_fn(6, |_| true),
        },
        // Offsets at the edge of the coordinate range.
        AreaAlteration {
            team: 0,
            mode: BrushMode::Del,
            center_x: i32::MAX,
            center_y: i32::MIN,
            min_x: i32::MIN,
            min_y: i32::MIN,
            max_x: i32::MAX,
            max_y: i32::MAX,
            mask: BitMask::new(0),
        },
    ];
    for brush in brushes {
        game.execute_order(&Order::new(0, 0, OrderKind::AlterateForbidden(brush.clone())), 0);
        game.execute_order(&Order::new(0, 0, OrderKind::AlterateGuardArea(brush)), 0);
    }
    assert_eq!(game.check_sum(None), before);
}

#[test]
fn test_corrupted_length_is_an_error() {
    let game = duel();
    let mut bytes = Vec::new();
    game.save(&mut std::io::Cursor::new(&mut bytes), ByteOrder::Big).unwrap();
    bytes[13..21].copy_from_slice(&(1u64 << 42).to_be_bytes());
    assert!(Game::load(&mut std::io::Cursor::new(&bytes), registry()).is_err());
}

