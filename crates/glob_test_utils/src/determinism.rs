//! Determinism testing utilities.
//!
//! Lockstep peers only exchange orders, so every peer must compute the
//! same state from the same order stream. The helpers here run games
//! side by side and compare [`Game::check_sum`] after every tick.
//!
//! # Sources of divergence
//!
//! - **Iteration order**: entities are always visited in GID order; a
//!   hashed container anywhere in the tick would break this.
//! - **Randomness**: only the shared [`glob_core::sync_rand::SyncRand`]
//!   may be consulted.
//! - **Local state**: shadow values and local area layers belong to the
//!   viewing player and must never feed back into the simulation.
//! - **Derived caches**: gradients and building lists are rebuilt after a
//!   load; a cache that differs from its recomputation desyncs reloaded
//!   games.

use std::io::Cursor;
use std::thread;

use glob_core::checksum::{ChecksumReport, Divergence};
use glob_core::game::Game;
use glob_core::order::Order;
use glob_core::stream::ByteOrder;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Final checksum of each run.
    pub checksums: Vec<u32>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    fn from_checksums(checksums: Vec<u32>, ticks: u64) -> Self {
        Self {
            is_deterministic: checksums.windows(2).all(|w| w[0] == w[1]),
            checksums,
            ticks,
        }
    }

    /// Distinct checksums (one for a deterministic game).
    #[must_use]
    pub fn unique_checksums(&self) -> Vec<u32> {
        let mut unique = self.checksums.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the runs agreed, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different checksums.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique checksums: {} (expected 1)\n\
                 All checksums: {:08x?}",
                self.checksums.len(),
                self.ticks,
                self.unique_checksums().len(),
                self.checksums
            );
        }
    }
}

/// Where two games first disagreed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DivergencePoint {
    /// Ticks run before the mismatch was seen.
    pub tick: u64,
    /// First differing component, if the reports can tell.
    pub component: Option<Divergence>,
}

/// Run `runs` copies of a state for `ticks` ticks and compare final hashes.
///
/// # Example
///
/// ```ignore
/// use glob_test_utils::determinism::verify_determinism;
///
/// let result = verify_determinism(
///     3,
///     200,
///     glob_test_utils::fixtures::duel,
///     |game| game.sync_step(0),
///     |game| game.check_sum(None),
/// );
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u32,
{
    let mut checksums = Vec::with_capacity(runs);
    for _ in 0..runs {
        let mut state = setup();
        for _ in 0..ticks {
            step(&mut state);
        }
        checksums.push(hash(&state));
    }
    DeterminismResult::from_checksums(checksums, ticks)
}

/// Execute the orders scheduled for the current tick, then advance.
///
/// An order runs before tick `order.step`, counted in calls to this
/// function rather than in [`Game::step_counter`] so that waiting ticks
/// still consume the schedule.
pub fn step_with_orders(game: &mut Game, orders: &[Order], tick: u64, local_player: usize) {
    for order in orders.iter().filter(|o| u64::from(o.step) == tick) {
        game.execute_order(order, local_player);
    }
    game.sync_step(local_player);
}

/// Play an order schedule on `game` for `ticks` ticks.
pub fn play(game: &mut Game, orders: &[Order], ticks: u64) {
    for tick in 0..ticks {
        step_with_orders(game, orders, tick, 0);
    }
}

/// Play the same schedule on two fresh games and compare final checksums.
pub fn verify_game_determinism<F>(setup: F, orders: &[Order], ticks: u64) -> DeterminismResult
where
    F: Fn() -> Game,
{
    let checksums = (0..2)
        .map(|_| {
            let mut game = setup();
            play(&mut game, orders, ticks);
            game.check_sum(None)
        })
        .collect();
    DeterminismResult::from_checksums(checksums, ticks)
}

/// Play the same schedule on two games seen by different local players.
///
/// Local predictions and shadow layers differ between the two, the
/// checksums must not.
pub fn verify_peer_agreement<F>(setup: F, orders: &[Order], ticks: u64, players: (usize, usize)) -> bool
where
    F: Fn() -> Game,
{
    let mut a = setup();
    let mut b = setup();
    for tick in 0..ticks {
        step_with_orders(&mut a, orders, tick, players.0);
        step_with_orders(&mut b, orders, tick, players.1);
        if a.check_sum(None) != b.check_sum(None) {
            return false;
        }
    }
    true
}

/// Compare two games tick by tick and report the first mismatch.
///
/// Returns `None` if the games agree for `ticks` ticks.
pub fn find_first_divergence(
    mut a: Game,
    mut b: Game,
    orders: &[Order],
    ticks: u64,
) -> Option<DivergencePoint> {
    let compare = |a: &Game, b: &Game, tick: u64| {
        let mut ra = ChecksumReport::default();
        let mut rb = ChecksumReport::default();
        let ca = a.check_sum(Some(&mut ra));
        let cb = b.check_sum(Some(&mut rb));
        if ca == cb {
            return None;
        }
        let component = ra.first_difference(&rb);
        tracing::warn!(tick, local = ca, remote = cb, ?component, "Games diverged");
        Some(DivergencePoint { tick, component })
    };

    if let Some(point) = compare(&a, &b, 0) {
        return Some(point);
    }
    for tick in 0..ticks {
        step_with_orders(&mut a, orders, tick, 0);
        step_with_orders(&mut b, orders, tick, 0);
        if let Some(point) = compare(&a, &b, tick + 1) {
            return Some(point);
        }
    }
    None
}

/// Save and reload `game`, then check that both copies agree now and
/// for `ticks` more ticks.
pub fn verify_save_round_trip(game: &Game, ticks: u64) -> bool {
    let mut bytes = Cursor::new(Vec::new());
    if game.save(&mut bytes, ByteOrder::native()).is_err() {
        return false;
    }
    bytes.set_position(0);
    let Ok(loaded) = Game::load(&mut bytes, game.registry().clone()) else {
        return false;
    };
    find_first_divergence(game.clone(), loaded, &[], ticks).is_none()
}

/// Run `num_games` games on scoped threads and collect final checksums.
///
/// # Panics
///
/// Panics if a simulation thread panics.
pub fn run_parallel_games<F>(setup: F, num_games: usize, ticks: u64) -> DeterminismResult
where
    F: Fn() -> Game + Sync,
{
    let checksums = thread::scope(|s| {
        let handles: Vec<_> = (0..num_games)
            .map(|_| {
                s.spawn(|| {
                    let mut game = setup();
                    for _ in 0..ticks {
                        game.sync_step(0);
                    }
                    game.check_sum(None)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("simulation thread panicked"))
            .collect()
    });
    DeterminismResult::from_checksums(checksums, ticks)
}
