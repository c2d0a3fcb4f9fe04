//! Globulation 2 - Development Tools

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use glob_core::header::TeamKind;
use glob_core::stream::ByteOrder;
use glob_tools::error::Result;
use glob_tools::inspect::{checksum_game, inspect_save};
use glob_tools::scenario::Scenario;
use glob_tools::simulate::{load_game, save_game, simulate, verify_replay, SimulationConfig};
use glob_tools::validate::{load_registry, validate_data_directory};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "glob2-tools")]
#[command(about = "Development tools for the Globulation 2 simulation")]
#[command(version)]
struct Cli {
    /// Data directory to load types from instead of the bundled data
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate data files
    Validate {
        /// Path to data directory
        #[arg(default_value = "assets/data")]
        path: PathBuf,
    },

    /// Generate a saved game from a scenario
    Generate {
        /// Output save file
        output: PathBuf,

        /// Scenario file; a symmetric start is generated if absent
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Map name for a generated start
        #[arg(long, default_value = "Generated")]
        name: String,

        /// Map side for a generated start
        #[arg(long, default_value = "64")]
        size: u32,

        /// Team controllers for a generated start
        #[arg(long, value_delimiter = ',', value_parser = parse_team_kind, default_value = "human,ai")]
        teams: Vec<TeamKind>,

        /// Write the save big-endian
        #[arg(long)]
        big_endian: bool,
    },

    /// Show the header and map of a saved game
    Inspect {
        /// Save file
        save: PathBuf,

        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the checksum of a saved game, per component
    Checksum {
        /// Save file
        save: PathBuf,

        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a saved game headless
    Simulate {
        /// Save file
        save: PathBuf,

        /// Ticks to run
        #[arg(short, long, default_value = "500")]
        ticks: u64,

        /// Keep running after the game ends
        #[arg(long)]
        past_end: bool,

        /// Record a replay of the run
        #[arg(long)]
        record: Option<PathBuf>,

        /// Save the final state
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// Replay a recording and check its final checksum
    Verify {
        /// Replay file
        replay: PathBuf,
    },
}

fn parse_team_kind(s: &str) -> std::result::Result<TeamKind, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "human" | "h" => Ok(TeamKind::Human),
        "ai" | "a" => Ok(TeamKind::Ai),
        other => Err(format!("unknown team kind '{other}', expected human or ai")),
    }
}

fn print<T: Serialize + std::fmt::Display>(value: &T, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{value}");
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let data = cli.data.as_deref();
    match cli.command {
        Commands::Validate { path } => {
            tracing::info!("Validating data files in: {}", path.display());
            let summary = validate_data_directory(&path)?;
            tracing::info!(
                buildings = summary.buildings,
                sites = summary.sites,
                flags = summary.flags,
                units = summary.units,
                "Validation passed"
            );
        }
        Commands::Generate {
            output,
            scenario,
            name,
            size,
            teams,
            big_endian,
        } => {
            let scenario = match scenario {
                Some(path) => Scenario::load(&path)?,
                None => Scenario::starter(&name, size, &teams)?,
            };
            let game = scenario.build(load_registry(data)?)?;
            let order = if big_endian { ByteOrder::Big } else { ByteOrder::Little };
            save_game(&game, &output, order)?;
            tracing::info!(
                map = %scenario.name,
                teams = scenario.teams.len(),
                "Wrote {}",
                output.display()
            );
        }
        Commands::Inspect { save, json } => {
            print(&inspect_save(&save)?, json)?;
        }
        Commands::Checksum { save, json } => {
            let game = load_game(&save, load_registry(data)?)?;
            print(&checksum_game(&game), json)?;
        }
        Commands::Simulate {
            save,
            ticks,
            past_end,
            record,
            output,
            json,
        } => {
            let mut game = load_game(&save, load_registry(data)?)?;
            let config = SimulationConfig {
                ticks,
                stop_when_ended: !past_end,
                record,
                ..SimulationConfig::default()
            };
            let summary = simulate(&mut game, &config)?;
            if let Some(path) = output {
                save_game(&game, &path, ByteOrder::Little)?;
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!(
                    "{}: {} ticks, step {}, checksum {:08x}{}",
                    summary.map_name,
                    summary.ticks,
                    summary.step_counter,
                    summary.checksum,
                    if summary.is_game_ended { ", ended" } else { "" }
                );
                for team in &summary.teams {
                    println!(
                        "  team {}: prestige {}, {} units, {} buildings{}",
                        team.number,
                        team.prestige,
                        team.units,
                        team.buildings,
                        if team.is_alive { "" } else { " (dead)" }
                    );
                }
            }
        }
        Commands::Verify { replay } => {
            let verdict = verify_replay(&replay, load_registry(data)?)?;
            tracing::info!(
                map = %verdict.map_name,
                ticks = verdict.ticks,
                orders = verdict.orders,
                "Replay verified at {:08x}",
                verdict.checksum
            );
        }
    }
    Ok(())
}

fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}
