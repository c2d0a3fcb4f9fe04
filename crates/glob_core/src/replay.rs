//! Replays: a starting save plus the orders executed on top of it.
//!
//! Playing a replay back re-executes every order before the tick it was
//! recorded at, so a correct replay ends on the recorded checksum.

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::data::TypeRegistry;
use crate::error::{GameError, Result};
use crate::game::Game;
use crate::order::Order;
use crate::stream::ByteOrder;

/// Replay file format version.
pub const REPLAY_VERSION: u32 = 1;

/// Player and team number used during playback; matches no real player,
/// so no local shadow state is touched.
pub const SPECTATOR: usize = usize::MAX;

/// An order with the tick it was executed before.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayOrder {
    /// Number of ticks simulated before the order ran.
    pub tick: u64,
    /// The order.
    pub order: Order,
}

/// A recorded game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Replay {
    /// Format version.
    pub version: u32,
    /// Name of the map played.
    pub map_name: String,
    /// Save of the game at tick zero.
    pub initial_state: Vec<u8>,
    /// Orders in execution order.
    pub orders: Vec<ReplayOrder>,
    /// Ticks recorded.
    pub final_tick: u64,
    /// Checksum of the game after the last tick.
    pub final_checksum: u32,
}

impl Replay {
    /// Start recording from `game`.
    ///
    /// # Errors
    ///
    /// Returns an error if the game cannot be saved.
    pub fn new(game: &Game) -> Result<Self> {
        let mut cursor = Cursor::new(Vec::new());
        game.save(&mut cursor, ByteOrder::Little)?;
        Ok(Self {
            version: REPLAY_VERSION,
            map_name: game.map_header.name.clone(),
            initial_state: cursor.into_inner(),
            orders: Vec::new(),
            final_tick: 0,
            final_checksum: 0,
        })
    }

    /// Record an order executed before tick `tick`.
    pub fn record(&mut self, tick: u64, order: Order) {
        self.orders.push(ReplayOrder { tick, order });
    }

    /// Close the recording.
    pub fn finalize(&mut self, final_tick: u64, final_checksum: u32) {
        self.final_tick = final_tick;
        self.final_checksum = final_checksum;
    }

    /// Write the replay to a file.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or writing fails.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = bincode::serialize(self)?;
        std::fs::write(path.as_ref(), bytes)?;
        debug!(path = %path.as_ref().display(), orders = self.orders.len(), "Replay saved");
        Ok(())
    }

    /// Read a replay from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if reading or decoding fails, or
    /// [`GameError::Integrity`] if the version differs.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        let replay: Self = bincode::deserialize(&bytes)?;
        if replay.version != REPLAY_VERSION {
            return Err(GameError::Integrity(format!(
                "replay version {} is not {REPLAY_VERSION}",
                replay.version
            )));
        }
        Ok(replay)
    }

    /// Load the starting game.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedded save does not load.
    pub fn restore(&self, registry: Arc<TypeRegistry>) -> Result<Game> {
        Game::load(&mut Cursor::new(&self.initial_state), registry)
    }

    /// Orders recorded before `tick`.
    #[must_use]
    pub fn orders_at(&self, tick: u64) -> Vec<&Order> {
        self.orders
            .iter()
            .filter(|o| o.tick == tick)
            .map(|o| &o.order)
            .collect()
    }

    /// Number of recorded orders.
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.orders.len()
    }
}

/// Plays a replay back tick by tick.
#[derive(Debug)]
pub struct ReplayPlayer {
    replay: Replay,
    registry: Arc<TypeRegistry>,
    game: Game,
    tick: u64,
    next_order: usize,
}

impl ReplayPlayer {
    /// Restore the starting game of `replay`.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedded save does not load.
    pub fn new(replay: Replay, registry: Arc<TypeRegistry>) -> Result<Self> {
        let game = replay.restore(registry.clone())?;
        Ok(Self {
            replay,
            registry,
            game,
            tick: 0,
            next_order: 0,
        })
    }

    /// Run one tick. Returns whether ticks remain.
    pub fn advance(&mut self) -> bool {
        if self.is_finished() {
            return false;
        }
        while let Some(recorded) = self.replay.orders.get(self.next_order) {
            if recorded.tick > self.tick {
                break;
            }
            self.game.execute_order(&recorded.order, SPECTATOR);
            self.next_order += 1;
        }
        self.game.sync_step(SPECTATOR);
        self.tick += 1;
        !self.is_finished()
    }

    /// Restart from the initial state and play up to `tick`.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedded save does not load.
    pub fn seek(&mut self, tick: u64) -> Result<()> {
        self.game = self.replay.restore(self.registry.clone())?;
        self.tick = 0;
        self.next_order = 0;
        while self.tick < tick && self.advance() {}
        Ok(())
    }

    /// Play to the end and compare with the recorded checksum.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::DesyncDetected`] if the checksums differ.
    pub fn verify(&mut self) -> Result<()> {
        self.seek(self.replay.final_tick)?;
        let local = self.game.check_sum(None);
        if local != self.replay.final_checksum {
            warn!(tick = self.tick, local, expected = self.replay.final_checksum, "Replay diverged");
            return Err(GameError::DesyncDetected {
                step: self.game.step_counter,
                local,
                remote: self.replay.final_checksum,
            });
        }
        Ok(())
    }

    /// Ticks played.
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Current game.
    #[must_use]
    pub const fn game(&self) -> &Game {
        &self.game
    }

    /// The replay.
    #[must_use]
    pub const fn replay(&self) -> &Replay {
        &self.replay
    }

    /// Whether every recorded tick has been played.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.tick >= self.replay.final_tick
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::UnitKind;
    use crate::header::TeamKind;
    use crate::map::{Map, Terrain};
    use crate::order::{CreateBuilding, OrderKind};

    fn game() -> Game {
        let registry = Arc::new(TypeRegistry::standard().unwrap());
        let mut g = Game::new(registry, Map::new(32, 32, Terrain::Grass).unwrap());
        g.map_header.name = "Duel".into();
        g.add_team(TeamKind::Human).unwrap();
        g.add_team(TeamKind::Human).unwrap();
        g.set_game_header(crate::header::GameHeader {
            players: vec![
                crate::header::BasePlayer {
                    number: 0,
                    name: "a".into(),
                    team: 0,
                    kind: crate::player::PlayerKind::Human,
                },
                crate::header::BasePlayer {
                    number: 1,
                    name: "b".into(),
                    team: 1,
                    kind: crate::player::PlayerKind::Human,
                },
            ],
            order_latency: 0,
        })
        .unwrap();
        for i in 0..3 {
            g.add_unit(4 + i, 4, 0, UnitKind::Worker, 0).unwrap();
            g.add_unit(20 + i, 20, 1, UnitKind::Worker, 0).unwrap();
        }
        g
    }

    fn record(ticks: u64) -> Replay {
        let mut g = game();
        let mut replay = Replay::new(&g).unwrap();
        let site = g.registry().building_id("swarm_site_0").unwrap();
        for tick in 0..ticks {
            if tick == 3 {
                let order = Order::new(
                    0,
                    g.step_counter,
                    OrderKind::Create(CreateBuilding {
                        team: 0,
                        x: 8,
                        y: 8,
                        type_id: site,
                        unit_working: 3,
                        unit_working_future: 1,
                    }),
                );
                g.execute_order(&order, 0);
                replay.record(tick, order);
            }
            g.sync_step(0);
        }
        replay.finalize(ticks, g.check_sum(None));
        replay
    }

    #[test]
    fn test_replay_orders_at() {
        let replay = record(10);
        assert_eq!(replay.map_name, "Duel");
        assert_eq!(replay.order_count(), 1);
        assert_eq!(replay.orders_at(3).len(), 1);
        assert!(replay.orders_at(4).is_empty());
    }

    #[test]
    fn test_replay_verifies() {
        let replay = record(80);
        let registry = Arc::new(TypeRegistry::standard().unwrap());
        let mut player = ReplayPlayer::new(replay, registry).unwrap();
        player.verify().unwrap();
        assert!(player.is_finished());
        assert!(player.game().get_building(crate::ids::Gid::new(0, 0)).is_some());
    }

    #[test]
    fn test_tampered_replay_diverges() {
        let mut replay = record(40);
        replay.orders.clear();
        let registry = Arc::new(TypeRegistry::standard().unwrap());
        let mut player = ReplayPlayer::new(replay, registry).unwrap();
        assert!(matches!(player.verify(), Err(GameError::DesyncDetected { .. })));
    }

    #[test]
    fn test_replay_file_round_trip() {
        let replay = record(5);
        let dir = std::env::temp_dir().join(format!("glob_core_replay_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("duel.rep");
        replay.save(&path).unwrap();
        let loaded = Replay::load(&path).unwrap();
        assert_eq!(loaded.final_tick, 5);
        assert_eq!(loaded.final_checksum, replay.final_checksum);
        assert_eq!(loaded.orders, replay.orders);
        let _ = std::fs::remove_dir_all(dir);
    }
}
