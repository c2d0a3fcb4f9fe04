//! # Glob Test Utilities
//!
//! Shared testing utilities for the workspace:
//! - Game fixtures and a scenario builder
//! - Determinism harness (repeat runs, divergence search, save round trips)
//! - Property-based strategies for order streams

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod determinism;
pub mod fixtures;
pub mod strategies;

/// Re-export proptest for convenience.
pub use proptest;
