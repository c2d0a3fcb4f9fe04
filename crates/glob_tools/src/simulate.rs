//! Headless simulation of saved games.
//!
//! Runs a saved game forward with no orders, optionally recording a
//! replay that [`verify_replay`] can later check against a fresh run.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use glob_core::data::TypeRegistry;
use glob_core::game::Game;
use glob_core::replay::{Replay, ReplayPlayer};
use glob_core::stream::ByteOrder;
use serde::Serialize;

use crate::error::{Result, ToolError};

/// Load a saved game.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or does not load.
pub fn load_game(path: &Path, registry: Arc<TypeRegistry>) -> Result<Game> {
    let file = File::open(path).map_err(|e| ToolError::io(path, e))?;
    Ok(Game::load(&mut BufReader::new(file), registry)?)
}

/// Save a game to a file.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn save_game(game: &Game, path: &Path, order: ByteOrder) -> Result<()> {
    let file = File::create(path).map_err(|e| ToolError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    game.save(&mut writer, order)?;
    writer
        .into_inner()
        .map_err(|e| ToolError::io(path, e.into_error()))?;
    Ok(())
}

/// Settings for a headless run.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Ticks to run.
    pub ticks: u64,
    /// Player whose view is maintained.
    pub local_player: usize,
    /// Stop as soon as the game ends.
    pub stop_when_ended: bool,
    /// Where to write a replay of the run.
    pub record: Option<PathBuf>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            ticks: 500,
            local_player: 0,
            stop_when_ended: true,
            record: None,
        }
    }
}

/// State of one team after a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeamSummary {
    /// Team number.
    pub number: usize,
    /// Whether the team still plays.
    pub is_alive: bool,
    /// Whether the team won.
    pub has_won: bool,
    /// Prestige.
    pub prestige: u32,
    /// Units owned.
    pub units: usize,
    /// Buildings and flags owned.
    pub buildings: usize,
}

/// Result of a headless run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulationSummary {
    /// Map name.
    pub map_name: String,
    /// Ticks actually run.
    pub ticks: u64,
    /// Step counter at the end.
    pub step_counter: u32,
    /// Checksum at the end.
    pub checksum: u32,
    /// Whether the game ended.
    pub is_game_ended: bool,
    /// Team with the most prestige, if any.
    pub leader: Option<usize>,
    /// Per-team state.
    pub teams: Vec<TeamSummary>,
}

impl SimulationSummary {
    fn from_game(game: &Game, ticks: u64) -> Self {
        Self {
            map_name: game.map_header.name.clone(),
            ticks,
            step_counter: game.step_counter,
            checksum: game.check_sum(None),
            is_game_ended: game.is_game_ended,
            leader: game.team_with_most_prestige(),
            teams: game
                .teams
                .iter()
                .map(|t| TeamSummary {
                    number: t.team_number,
                    is_alive: t.is_alive,
                    has_won: t.has_won,
                    prestige: t.prestige,
                    units: t.units().len(),
                    buildings: t.buildings().len(),
                })
                .collect(),
        }
    }
}

/// Run `game` forward according to `config`.
///
/// # Errors
///
/// Returns an error if a replay was requested and cannot be written.
pub fn simulate(game: &mut Game, config: &SimulationConfig) -> Result<SimulationSummary> {
    let mut replay = match config.record {
        Some(_) => Some(Replay::new(game)?),
        None => None,
    };

    let mut ticks = 0;
    while ticks < config.ticks {
        if config.stop_when_ended && game.is_game_ended {
            break;
        }
        game.sync_step(config.local_player);
        ticks += 1;
    }

    let summary = SimulationSummary::from_game(game, ticks);
    tracing::info!(
        map = %summary.map_name,
        ticks,
        checksum = summary.checksum,
        ended = summary.is_game_ended,
        "Simulation finished"
    );

    if let (Some(replay), Some(path)) = (replay.as_mut(), config.record.as_ref()) {
        replay.finalize(ticks, summary.checksum);
        replay.save(path)?;
        tracing::info!(path = %path.display(), "Replay written");
    }
    Ok(summary)
}

/// Outcome of a replay check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplayVerdict {
    /// Map name.
    pub map_name: String,
    /// Ticks replayed.
    pub ticks: u64,
    /// Orders replayed.
    pub orders: usize,
    /// Checksum reached, equal to the recorded one.
    pub checksum: u32,
}

/// Replay a recording and check that it reaches the recorded checksum.
///
/// # Errors
///
/// Returns an error if the replay cannot be read or restored, or
/// [`glob_core::error::GameError::DesyncDetected`] if it diverges.
pub fn verify_replay(path: &Path, registry: Arc<TypeRegistry>) -> Result<ReplayVerdict> {
    let replay = Replay::load(path)?;
    let verdict = ReplayVerdict {
        map_name: replay.map_name.clone(),
        ticks: replay.final_tick,
        orders: replay.order_count(),
        checksum: replay.final_checksum,
    };
    let mut player = ReplayPlayer::new(replay, registry)?;
    player.verify()?;
    Ok(verdict)
}
