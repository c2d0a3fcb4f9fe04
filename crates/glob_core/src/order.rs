//! Orders: the only way players and AIs change the simulation.
//!
//! An [`Order`] is a closed sum type. On the wire it travels as an
//! envelope: one tag byte ([`OrderType`]), the sender byte, the step as a
//! little-endian `u32`, then the bincode encoding of the variant payload.

use bincode::Options;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::data::{BuildingTypeId, NB_UNIT_KINDS};
use crate::error::{GameError, Result};
use crate::ids::Gid;

/// Wire tag of each order variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OrderType {
    /// [`OrderKind::Create`].
    Create = 1,
    /// [`OrderKind::ModifyBuilding`].
    ModifyBuilding = 2,
    /// [`OrderKind::ModifyExchange`].
    ModifyExchange = 3,
    /// [`OrderKind::ModifyFlag`].
    ModifyFlag = 4,
    /// [`OrderKind::ModifyClearingFlag`].
    ModifyClearingFlag = 5,
    /// [`OrderKind::ModifyMinLevelToFlag`].
    ModifyMinLevelToFlag = 6,
    /// [`OrderKind::MoveFlag`].
    MoveFlag = 7,
    /// [`OrderKind::AlterateForbidden`].
    AlterateForbidden = 8,
    /// [`OrderKind::AlterateGuardArea`].
    AlterateGuardArea = 9,
    /// [`OrderKind::AlterateClearArea`].
    AlterateClearArea = 10,
    /// [`OrderKind::ModifySwarm`].
    ModifySwarm = 11,
    /// [`OrderKind::Delete`].
    Delete = 12,
    /// [`OrderKind::CancelDelete`].
    CancelDelete = 13,
    /// [`OrderKind::Construction`].
    Construction = 14,
    /// [`OrderKind::CancelConstruction`].
    CancelConstruction = 15,
    /// [`OrderKind::SetAlliance`].
    SetAlliance = 16,
    /// [`OrderKind::WaitingForPlayer`].
    WaitingForPlayer = 17,
    /// [`OrderKind::PlayerQuitGame`].
    PlayerQuitGame = 18,
}

impl TryFrom<u8> for OrderType {
    type Error = GameError;

    fn try_from(tag: u8) -> Result<Self> {
        Ok(match tag {
            1 => Self::Create,
            2 => Self::ModifyBuilding,
            3 => Self::ModifyExchange,
            4 => Self::ModifyFlag,
            5 => Self::ModifyClearingFlag,
            6 => Self::ModifyMinLevelToFlag,
            7 => Self::MoveFlag,
            8 => Self::AlterateForbidden,
            9 => Self::AlterateGuardArea,
            10 => Self::AlterateClearArea,
            11 => Self::ModifySwarm,
            12 => Self::Delete,
            13 => Self::CancelDelete,
            14 => Self::Construction,
            15 => Self::CancelConstruction,
            16 => Self::SetAlliance,
            17 => Self::WaitingForPlayer,
            18 => Self::PlayerQuitGame,
            other => return Err(GameError::MalformedOrder(format!("unknown order tag {other}"))),
        })
    }
}

/// Place a building, a construction site or a flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateBuilding {
    /// Owning team.
    pub team: usize,
    /// Top-left x, wrapped on execution.
    pub x: i32,
    /// Top-left y, wrapped on execution.
    pub y: i32,
    /// Type to place.
    pub type_id: BuildingTypeId,
    /// Units requested during construction.
    pub unit_working: u32,
    /// Units requested once built.
    pub unit_working_future: u32,
}

/// Change how many units a building requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifyBuilding {
    /// Target building.
    pub gid: Gid,
    /// Requested number of units.
    pub number_requested: u32,
}

/// Change the trade masks of a market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifyExchange {
    /// Target building.
    pub gid: Gid,
    /// Resources accepted.
    pub receive_mask: u32,
    /// Resources offered.
    pub send_mask: u32,
}

/// Change the stay range of a flag or area building.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifyFlag {
    /// Target building.
    pub gid: Gid,
    /// New range in tiles.
    pub range: u32,
}

/// Change which resources a clearing flag removes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifyClearingFlag {
    /// Target flag.
    pub gid: Gid,
    /// One bit per resource kind.
    pub mask: u8,
}

/// Change the minimum unit level a flag accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifyMinLevelToFlag {
    /// Target flag.
    pub gid: Gid,
    /// Minimum level.
    pub level: u8,
}

/// Move a flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveFlag {
    /// Target flag.
    pub gid: Gid,
    /// New x.
    pub x: i32,
    /// New y.
    pub y: i32,
    /// Whether this is the final drop of a drag.
    pub drop: bool,
}

/// Whether an area alteration paints or erases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BrushMode {
    /// Set the team bit.
    Add,
    /// Clear the team bit.
    Del,
}

/// Packed per-tile selection, row-major over the alteration rectangle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitMask {
    len: usize,
    bits: Vec<u8>,
}

impl BitMask {
    /// Mask of `len` bits, all clear.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            len,
            bits: vec![0; len.div_ceil(8)],
        }
    }

    /// Mask of `len` bits computed by `f`.
    #[must_use]
    pub fn from_fn(len: usize, f: impl Fn(usize) -> bool) -> Self {
        let mut mask = Self::new(len);
        for i in 0..len {
            mask.set(i, f(i));
        }
        mask
    }

    /// Number of bits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the mask has no bits.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the stored bytes hold exactly `len` bits.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.bits.len() == self.len.div_ceil(8)
    }

    /// Bit `i`; false past the end.
    #[must_use]
    pub fn get(&self, i: usize) -> bool {
        i < self.len && self.bits.get(i / 8).is_some_and(|b| b & (1 << (i % 8)) != 0)
    }

    /// Set bit `i`. Out-of-range indices are ignored.
    pub fn set(&mut self, i: usize, on: bool) {
        if i >= self.len {
            return;
        }
        if on {
            self.bits[i / 8] |= 1 << (i % 8);
        } else {
            self.bits[i / 8] &= !(1 << (i % 8));
        }
    }
}

/// Paint or erase an area layer over a rectangle.
///
/// The rectangle spans `[center + min, center + max)` on both axes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaAlteration {
    /// Team whose bit is changed.
    pub team: usize,
    /// Paint or erase.
    pub mode: BrushMode,
    /// Brush center x.
    pub center_x: i32,
    /// Brush center y.
    pub center_y: i32,
    /// Left offset.
    pub min_x: i32,
    /// Top offset.
    pub min_y: i32,
    /// Right offset, exclusive.
    pub max_x: i32,
    /// Bottom offset, exclusive.
    pub max_y: i32,
    /// One bit per tile of the rectangle.
    pub mask: BitMask,
}

impl AreaAlteration {
    /// Whether the rectangle has exactly one tile per mask bit.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        let w = i64::from(self.max_x) - i64::from(self.min_x);
        let h = i64::from(self.max_y) - i64::from(self.min_y);
        self.mask.is_consistent()
            && w >= 0
            && h >= 0
            && w.checked_mul(h).and_then(|area| u64::try_from(area).ok())
                == u64::try_from(self.mask.len()).ok()
    }

    /// Tiles selected by the mask, row-major, unwrapped.
    ///
    /// Empty when the rectangle does not match the mask length.
    pub fn tiles(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        let (min_y, max_y) = if self.is_well_formed() {
            (self.min_y, self.max_y)
        } else {
            (0, 0)
        };
        (min_y..max_y)
            .flat_map(move |dy| (self.min_x..self.max_x).map(move |dx| (dx, dy)))
            .enumerate()
            .filter(|(i, _)| self.mask.get(*i))
            .map(|(_, (dx, dy))| {
                (
                    self.center_x.wrapping_add(dx),
                    self.center_y.wrapping_add(dy),
                )
            })
    }
}

/// Change the production ratios of a swarm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifySwarm {
    /// Target swarm.
    pub gid: Gid,
    /// Weight per unit kind.
    pub ratios: [u32; NB_UNIT_KINDS],
}

/// Order naming a single building.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingRef {
    /// Target building.
    pub gid: Gid,
}

/// Upgrade a building.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Construction {
    /// Target building.
    pub gid: Gid,
    /// Units requested during construction.
    pub unit_working: u32,
    /// Units requested once built.
    pub unit_working_future: u32,
}

/// Change a team's diplomacy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetAlliance {
    /// Team changing its masks.
    pub team: usize,
    /// Teams not attacked.
    pub allies: u32,
    /// Teams attacked.
    pub enemies: u32,
    /// Vision shared through exchange buildings.
    pub vision_exchange: u32,
    /// Vision shared through food buildings.
    pub vision_food: u32,
    /// Vision shared through everything else.
    pub vision_other: u32,
}

/// Some peer is late; the simulation must not advance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitingForPlayer {
    /// Players that are away.
    pub mask_away_player: u32,
}

/// A player left.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerQuitGame {
    /// Player index.
    pub player: usize,
}

/// Order payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderKind {
    /// Place a building or flag.
    Create(CreateBuilding),
    /// Set the requested unit count.
    ModifyBuilding(ModifyBuilding),
    /// Set the trade masks.
    ModifyExchange(ModifyExchange),
    /// Set a stay range.
    ModifyFlag(ModifyFlag),
    /// Set a clearing flag's resources.
    ModifyClearingFlag(ModifyClearingFlag),
    /// Set a flag's minimum unit level.
    ModifyMinLevelToFlag(ModifyMinLevelToFlag),
    /// Move a flag.
    MoveFlag(MoveFlag),
    /// Edit the forbidden zone.
    AlterateForbidden(AreaAlteration),
    /// Edit the guard area.
    AlterateGuardArea(AreaAlteration),
    /// Edit the clearing area.
    AlterateClearArea(AreaAlteration),
    /// Set swarm ratios.
    ModifySwarm(ModifySwarm),
    /// Schedule deletion.
    Delete(BuildingRef),
    /// Revoke a scheduled deletion.
    CancelDelete(BuildingRef),
    /// Start an upgrade.
    Construction(Construction),
    /// Abandon an upgrade.
    CancelConstruction(BuildingRef),
    /// Change diplomacy.
    SetAlliance(SetAlliance),
    /// Suspend the simulation.
    WaitingForPlayer(WaitingForPlayer),
    /// A player left.
    PlayerQuitGame(PlayerQuitGame),
}

impl OrderKind {
    /// Wire tag of this variant.
    #[must_use]
    pub const fn order_type(&self) -> OrderType {
        match self {
            Self::Create(_) => OrderType::Create,
            Self::ModifyBuilding(_) => OrderType::ModifyBuilding,
            Self::ModifyExchange(_) => OrderType::ModifyExchange,
            Self::ModifyFlag(_) => OrderType::ModifyFlag,
            Self::ModifyClearingFlag(_) => OrderType::ModifyClearingFlag,
            Self::ModifyMinLevelToFlag(_) => OrderType::ModifyMinLevelToFlag,
            Self::MoveFlag(_) => OrderType::MoveFlag,
            Self::AlterateForbidden(_) => OrderType::AlterateForbidden,
            Self::AlterateGuardArea(_) => OrderType::AlterateGuardArea,
            Self::AlterateClearArea(_) => OrderType::AlterateClearArea,
            Self::ModifySwarm(_) => OrderType::ModifySwarm,
            Self::Delete(_) => OrderType::Delete,
            Self::CancelDelete(_) => OrderType::CancelDelete,
            Self::Construction(_) => OrderType::Construction,
            Self::CancelConstruction(_) => OrderType::CancelConstruction,
            Self::SetAlliance(_) => OrderType::SetAlliance,
            Self::WaitingForPlayer(_) => OrderType::WaitingForPlayer,
            Self::PlayerQuitGame(_) => OrderType::PlayerQuitGame,
        }
    }
}

/// An order with its envelope fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Issuing player.
    pub sender: u8,
    /// Tick the order was issued for.
    pub step: u32,
    /// Payload.
    pub kind: OrderKind,
}

/// Size of the fixed envelope header.
pub const ENVELOPE_HEADER_LEN: usize = 6;

fn payload_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .reject_trailing_bytes()
}

fn encode<T: Serialize>(payload: &T) -> Result<Vec<u8>> {
    payload_options()
        .serialize(payload)
        .map_err(|e| GameError::MalformedOrder(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    payload_options()
        .deserialize(bytes)
        .map_err(|e| GameError::MalformedOrder(e.to_string()))
}

impl Order {
    /// Build an order.
    #[must_use]
    pub const fn new(sender: u8, step: u32, kind: OrderKind) -> Self {
        Self { sender, step, kind }
    }

    /// Wire tag.
    #[must_use]
    pub const fn order_type(&self) -> OrderType {
        self.kind.order_type()
    }

    /// Encode as an envelope.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::MalformedOrder`] if the payload cannot be encoded.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let payload = match &self.kind {
            OrderKind::Create(p) => encode(p)?,
            OrderKind::ModifyBuilding(p) => encode(p)?,
            OrderKind::ModifyExchange(p) => encode(p)?,
            OrderKind::ModifyFlag(p) => encode(p)?,
            OrderKind::ModifyClearingFlag(p) => encode(p)?,
            OrderKind::ModifyMinLevelToFlag(p) => encode(p)?,
            OrderKind::MoveFlag(p) => encode(p)?,
            OrderKind::AlterateForbidden(p)
            | OrderKind::AlterateGuardArea(p)
            | OrderKind::AlterateClearArea(p) => encode(p)?,
            OrderKind::ModifySwarm(p) => encode(p)?,
            OrderKind::Delete(p) | OrderKind::CancelDelete(p) | OrderKind::CancelConstruction(p) => {
                encode(p)?
            }
            OrderKind::Construction(p) => encode(p)?,
            OrderKind::SetAlliance(p) => encode(p)?,
            OrderKind::WaitingForPlayer(p) => encode(p)?,
            OrderKind::PlayerQuitGame(p) => encode(p)?,
        };
        let mut bytes = Vec::with_capacity(ENVELOPE_HEADER_LEN + payload.len());
        bytes.push(self.order_type() as u8);
        bytes.push(self.sender);
        bytes.extend_from_slice(&self.step.to_le_bytes());
        bytes.extend_from_slice(&payload);
        Ok(bytes)
    }

    /// Decode an envelope.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::MalformedOrder`] on an unknown tag, a short
    /// envelope or a payload that does not decode exactly.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < ENVELOPE_HEADER_LEN {
            return Err(GameError::MalformedOrder(format!(
                "envelope of {} bytes is shorter than its header",
                bytes.len()
            )));
        }
        let order_type = OrderType::try_from(bytes[0])?;
        let sender = bytes[1];
        let step = u32::from_le_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]);
        let p = &bytes[ENVELOPE_HEADER_LEN..];
        let kind = match order_type {
            OrderType::Create => OrderKind::Create(decode(p)?),
            OrderType::ModifyBuilding => OrderKind::ModifyBuilding(decode(p)?),
            OrderType::ModifyExchange => OrderKind::ModifyExchange(decode(p)?),
            OrderType::ModifyFlag => OrderKind::ModifyFlag(decode(p)?),
            OrderType::ModifyClearingFlag => OrderKind::ModifyClearingFlag(decode(p)?),
            OrderType::ModifyMinLevelToFlag => OrderKind::ModifyMinLevelToFlag(decode(p)?),
            OrderType::MoveFlag => OrderKind::MoveFlag(decode(p)?),
            OrderType::AlterateForbidden => OrderKind::AlterateForbidden(decode(p)?),
            OrderType::AlterateGuardArea => OrderKind::AlterateGuardArea(decode(p)?),
            OrderType::AlterateClearArea => OrderKind::AlterateClearArea(decode(p)?),
            OrderType::ModifySwarm => OrderKind::ModifySwarm(decode(p)?),
            OrderType::Delete => OrderKind::Delete(decode(p)?),
            OrderType::CancelDelete => OrderKind::CancelDelete(decode(p)?),
            OrderType::Construction => OrderKind::Construction(decode(p)?),
            OrderType::CancelConstruction => OrderKind::CancelConstruction(decode(p)?),
            OrderType::SetAlliance => OrderKind::SetAlliance(decode(p)?),
            OrderType::WaitingForPlayer => OrderKind::WaitingForPlayer(decode(p)?),
            OrderType::PlayerQuitGame => OrderKind::PlayerQuitGame(decode(p)?),
        };
        Ok(Self { sender, step, kind })
    }
}
