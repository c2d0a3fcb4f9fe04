//! Static type templates for buildings and units.
//!
//! Records are deserialized from RON and resolved into an immutable
//! [`TypeRegistry`] shared by every game.
//!
//! **Note:** This module reads no files itself; the bundled data is
//! compiled in and other sources are handed in as strings.

mod building_data;
mod registry;
mod unit_data;

pub use building_data::{BuildingData, BuildingKind};
pub use registry::{
    validate, BuildingType, BuildingTypeId, TypeRegistry, UnitType, UnitTypeId,
};
pub use unit_data::{UnitData, UnitKind, NB_UNIT_KINDS};
