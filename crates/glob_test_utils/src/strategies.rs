//! Proptest strategies for order streams.
//!
//! Orders are generated blind: GIDs point at low slots that may or may
//! not hold a building, positions may fall anywhere on the map and
//! requested counts may exceed the limits. A deterministic simulation
//! must absorb all of it identically on every peer.

use proptest::prelude::*;

use glob_core::data::BuildingTypeId;
use glob_core::ids::Gid;
use glob_core::order::{
    AreaAlteration, BitMask, BrushMode, BuildingRef, Construction, CreateBuilding, ModifyBuilding,
    ModifyClearingFlag, ModifyExchange, ModifyFlag, ModifyMinLevelToFlag, ModifySwarm, MoveFlag,
    Order, OrderKind, SetAlliance,
};

/// Slots targeted by generated building orders.
pub const MAX_TARGET_SLOT: usize = 8;

/// A GID of one of the first slots of a team.
pub fn arb_gid(teams: usize) -> impl Strategy<Value = Gid> + Clone {
    (0..teams, 0..MAX_TARGET_SLOT).prop_map(|(team, slot)| Gid::new(team, slot))
}

/// A map coordinate, sometimes outside the map to exercise wrapping.
pub fn arb_coord(size: i32) -> impl Strategy<Value = i32> {
    -size..2 * size
}

/// A building creation for `team`.
pub fn arb_create(
    team: usize,
    types: Vec<BuildingTypeId>,
    size: i32,
) -> impl Strategy<Value = OrderKind> {
    (
        proptest::sample::select(types),
        arb_coord(size),
        arb_coord(size),
        0u32..6,
        0u32..6,
    )
        .prop_map(move |(type_id, x, y, unit_working, unit_working_future)| {
            OrderKind::Create(CreateBuilding {
                team,
                x,
                y,
                type_id,
                unit_working,
                unit_working_future,
            })
        })
}

/// An area brush stroke.
pub fn arb_area(team: usize, size: i32) -> impl Strategy<Value = AreaAlteration> {
    (arb_coord(size), arb_coord(size), 1i32..6, 1i32..6, any::<bool>(), any::<u64>()).prop_map(
        move |(center_x, center_y, w, h, add, bits)| AreaAlteration {
            team,
            mode: if add { BrushMode::Add } else { BrushMode::Del },
            center_x,
            center_y,
            min_x: -(w / 2),
            min_y: -(h / 2),
            max_x: w - w / 2,
            max_y: h - h / 2,
            mask: BitMask::from_fn((w * h) as usize, |i| (bits >> (i % 64)) & 1 == 1),
        },
    )
}

/// Any order a player of `team` may send.
pub fn arb_order_kind(
    team: usize,
    teams: usize,
    types: Vec<BuildingTypeId>,
    size: i32,
) -> impl Strategy<Value = OrderKind> {
    let gid = arb_gid(teams);
    prop_oneof![
        arb_create(team, types, size),
        (gid.clone(), 0u32..24).prop_map(|(gid, number_requested)| {
            OrderKind::ModifyBuilding(ModifyBuilding { gid, number_requested })
        }),
        (gid.clone(), any::<u32>(), any::<u32>()).prop_map(|(gid, receive_mask, send_mask)| {
            OrderKind::ModifyExchange(ModifyExchange { gid, receive_mask, send_mask })
        }),
        (gid.clone(), 0u32..30).prop_map(|(gid, range)| OrderKind::ModifyFlag(ModifyFlag { gid, range })),
        (gid.clone(), any::<u8>()).prop_map(|(gid, mask)| {
            OrderKind::ModifyClearingFlag(ModifyClearingFlag { gid, mask })
        }),
        (gid.clone(), 0u8..4).prop_map(|(gid, level)| {
            OrderKind::ModifyMinLevelToFlag(ModifyMinLevelToFlag { gid, level })
        }),
        (gid.clone(), arb_coord(size), arb_coord(size), any::<bool>())
            .prop_map(|(gid, x, y, drop)| OrderKind::MoveFlag(MoveFlag { gid, x, y, drop })),
        arb_area(team, size).prop_map(OrderKind::AlterateForbidden),
        arb_area(team, size).prop_map(OrderKind::AlterateGuardArea),
        arb_area(team, size).prop_map(OrderKind::AlterateClearArea),
        (gid.clone(), [0u32..4, 0u32..4, 0u32..4])
            .prop_map(|(gid, ratios)| OrderKind::ModifySwarm(ModifySwarm { gid, ratios })),
        gid.clone().prop_map(|gid| OrderKind::Delete(BuildingRef { gid })),
        gid.clone().prop_map(|gid| OrderKind::CancelDelete(BuildingRef { gid })),
        (gid.clone(), 0u32..6, 0u32..6).prop_map(|(gid, unit_working, unit_working_future)| {
            OrderKind::Construction(Construction { gid, unit_working, unit_working_future })
        }),
        gid.prop_map(|gid| OrderKind::CancelConstruction(BuildingRef { gid })),
        (any::<u32>(), any::<u32>()).prop_map(move |(allies, vision)| {
            let me = 1u32 << team;
            OrderKind::SetAlliance(SetAlliance {
                team,
                allies: allies | me,
                enemies: !(allies | me),
                vision_exchange: vision,
                vision_food: vision,
                vision_other: vision,
            })
        }),
    ]
}

/// A schedule of orders over `ticks` ticks, sorted by tick.
///
/// Player `i` controls team `i`, as in
/// [`crate::fixtures::GameBuilder`].
pub fn arb_order_schedule(
    teams: usize,
    types: Vec<BuildingTypeId>,
    size: i32,
    ticks: u32,
    max_len: usize,
) -> impl Strategy<Value = Vec<Order>> {
    let order = (0..teams, 0..ticks).prop_flat_map(move |(team, step)| {
        arb_order_kind(team, teams, types.clone(), size)
            .prop_map(move |kind| Order::new(team as u8, step, kind))
    });
    proptest::collection::vec(order, 0..max_len).prop_map(|mut orders| {
        orders.sort_by_key(|o| o.step);
        orders
    })
}
