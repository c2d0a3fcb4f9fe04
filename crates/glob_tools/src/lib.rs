//! # Globulation 2 Development Tools
//!
//! Command-line tools for working with the simulation outside a client:
//! - Data validators
//! - Scenario generation into saved games
//! - Save inspection and checksum breakdowns
//! - Headless simulation and replay verification

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod error;
pub mod inspect;
pub mod scenario;
pub mod simulate;
pub mod validate;
