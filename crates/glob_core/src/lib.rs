//! # Glob Core
//!
//! Deterministic lockstep simulation core for Globulation 2.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO beyond streams handed in by the caller
//! - No system randomness
//! - No floating-point math (uses fixed-point)
//!
//! Every peer holds a [`game::Game`], executes the same [`order::Order`]s
//! before the same tick and compares [`game::Game::check_sum`] values to
//! detect desyncs.
//!
//! ## Crate Structure
//!
//! - [`data`] - Building and unit templates loaded from RON
//! - [`map`] - Toroidal tile grid, area layers and fog of war
//! - [`team`] - Units, buildings and their per-tick behaviour
//! - [`order`] - Player orders and their wire encoding
//! - [`game`] - Order execution, tick advancement, victory, save games
//! - [`replay`] - Recording and playback of order streams

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod building;
pub mod checksum;
pub mod data;
pub mod error;
pub mod game;
pub mod gradient;
pub mod header;
pub mod ids;
pub mod map;
pub mod math;
pub mod order;
pub mod player;
pub mod replay;
pub mod resources;
pub mod script;
pub mod shadowed;
pub mod slots;
pub mod stream;
pub mod sync_rand;
pub mod team;
pub mod unit;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::building::{Building, BuildingState};
    pub use crate::checksum::{ChecksumReport, Divergence};
    pub use crate::data::{BuildingKind, BuildingTypeId, TypeRegistry, UnitKind};
    pub use crate::error::{GameError, Result};
    pub use crate::game::{BuildProject, Game, RemoveFlags};
    pub use crate::header::{BasePlayer, GameHeader, MapHeader, TeamKind};
    pub use crate::ids::Gid;
    pub use crate::map::{AreaLayer, Map, Terrain};
    pub use crate::math::Fixed;
    pub use crate::order::{Order, OrderKind, OrderType};
    pub use crate::player::{Player, PlayerKind};
    pub use crate::replay::{Replay, ReplayPlayer};
    pub use crate::resources::ResourceKind;
    pub use crate::stream::ByteOrder;
    pub use crate::team::{Team, TeamEvent, TeamEventKind};
    pub use crate::unit::{Activity, Unit};
}
