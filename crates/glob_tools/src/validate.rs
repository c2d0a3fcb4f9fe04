//! Data validation utilities.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use glob_core::data::{validate, BuildingData, TypeRegistry, UnitData};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, ToolError};

/// File holding building records inside a data directory.
pub const BUILDINGS_FILE: &str = "buildings.ron";

/// File holding unit records inside a data directory.
pub const UNITS_FILE: &str = "units.ron";

/// What a valid data directory contains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataSummary {
    /// Building records, sites and flags included.
    pub buildings: usize,
    /// Of which construction sites.
    pub sites: usize,
    /// Of which flags.
    pub flags: usize,
    /// Unit records.
    pub units: usize,
}

fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let source = fs::read_to_string(path).map_err(|e| ToolError::io(path, e))?;
    ron::from_str(&source).map_err(|e| ToolError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Validate the RON data files in a directory.
///
/// # Errors
///
/// Returns an error if a file is missing or fails to parse, or
/// [`ToolError::Validation`] listing every inconsistency found.
pub fn validate_data_directory(path: &Path) -> Result<DataSummary> {
    let buildings: Vec<BuildingData> = read_records(&path.join(BUILDINGS_FILE))?;
    let units: Vec<UnitData> = read_records(&path.join(UNITS_FILE))?;

    let problems = validate(&buildings, &units);
    if !problems.is_empty() {
        return Err(ToolError::Validation(problems));
    }
    tracing::debug!(
        buildings = buildings.len(),
        units = units.len(),
        "Data directory is consistent"
    );
    Ok(DataSummary {
        buildings: buildings.len(),
        sites: buildings.iter().filter(|b| b.is_building_site).count(),
        flags: buildings.iter().filter(|b| b.is_virtual).count(),
        units: units.len(),
    })
}

/// Registry from a data directory, or the bundled one.
///
/// # Errors
///
/// Returns an error if the directory does not validate.
pub fn load_registry(data_dir: Option<&Path>) -> Result<Arc<TypeRegistry>> {
    let registry = match data_dir {
        None => TypeRegistry::standard()?,
        Some(dir) => {
            let buildings: Vec<BuildingData> = read_records(&dir.join(BUILDINGS_FILE))?;
            let units: Vec<UnitData> = read_records(&dir.join(UNITS_FILE))?;
            TypeRegistry::build(&buildings, &units)?
        }
    };
    Ok(Arc::new(registry))
}
