//! Batch game runner.
//!
//! Plays one scenario under many seeds in parallel with rayon and
//! collects metrics across the games.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use skirmish_core::data::ScenarioData;
use tracing::{debug, info, warn};

use crate::error::{HeadlessError, Result};
use crate::metrics::{BatchSummary, GameMetrics};
use crate::runner::{HeadlessConfig, HeadlessRunner};

/// Configuration for a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Scenario file to run
    pub scenario: PathBuf,
    /// Number of games to run
    pub game_count: u32,
    /// Maximum parallel games (0 = use rayon default)
    pub parallel_games: u32,
    /// Output directory for results and replays
    pub output_dir: Option<PathBuf>,
    /// Starting seed; game `i` uses `seed_start + i`
    pub seed_start: u64,
    /// Ticks per game
    pub max_ticks: u64,
    /// Write a replay per game into `output_dir`
    pub save_replays: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            scenario: PathBuf::from("scenarios/gold_rush.ron"),
            game_count: 100,
            parallel_games: 0,
            output_dir: None,
            seed_start: 0,
            max_ticks: 9000, // 5 minutes at 30 tps
            save_replays: false,
        }
    }
}

impl BatchConfig {
    /// Create config for a specific scenario
    pub fn new(scenario: impl Into<PathBuf>, game_count: u32) -> Self {
        Self {
            scenario: scenario.into(),
            game_count,
            ..Default::default()
        }
    }

    /// Set output directory
    pub fn with_output(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Set seed start
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed_start = seed;
        self
    }

    /// Set ticks per game
    pub fn with_max_ticks(mut self, ticks: u64) -> Self {
        self.max_ticks = ticks;
        self
    }
}

/// Results from a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResults {
    /// Configuration used
    pub config: BatchConfig,
    /// Individual game metrics, in seed order
    pub games: Vec<GameMetrics>,
    /// Aggregate summary
    pub summary: BatchSummary,
    /// Total runtime
    pub duration_seconds: f64,
    /// Errors encountered
    pub errors: Vec<BatchError>,
}

impl BatchResults {
    /// Save results to a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or writing fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| HeadlessError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| HeadlessError::io(path, e))
    }

    /// Load results from a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if reading or decoding fails.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| HeadlessError::io(path, e))?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// A game that failed to run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchError {
    /// Game index
    pub game_index: u32,
    /// Seed used
    pub seed: u64,
    /// Error message
    pub message: String,
}

/// Play one game of `data` under `seed` for `max_ticks` ticks.
///
/// When `replay_dir` is given the game is recorded and its replay written
/// there as `game_<seed>.replay`.
///
/// # Errors
///
/// Returns an error if the scenario does not load or the replay cannot
/// be written.
pub fn run_single_game(
    data: &ScenarioData,
    seed: u64,
    max_ticks: u64,
    replay_dir: Option<&Path>,
) -> Result<GameMetrics> {
    let mut data = data.clone();
    data.config.seed = seed;
    let config = HeadlessConfig {
        record_replay: replay_dir.is_some(),
        game_id: Some(format!("game_{seed}")),
    };
    let mut runner = HeadlessRunner::from_scenario(&data, &config)?;
    runner.run_until(max_ticks);

    if let (Some(dir), Some(replay)) = (replay_dir, runner.replay()) {
        replay.save(dir.join(format!("game_{seed}.replay")))?;
    }
    Ok(runner.finish())
}

/// Load the configured scenario file and run the batch.
///
/// # Errors
///
/// Returns an error if the scenario file cannot be loaded or the thread
/// pool cannot be built.
pub fn run_batch(config: BatchConfig) -> Result<BatchResults> {
    let data = crate::scenario::load_scenario(&config.scenario)?;
    run_batch_with(config, &data)
}

/// Run a batch of games on already parsed scenario data.
///
/// # Errors
///
/// Returns an error if the thread pool or output directory cannot be
/// created. Failed games are collected in [`BatchResults::errors`].
pub fn run_batch_with(config: BatchConfig, data: &ScenarioData) -> Result<BatchResults> {
    let start = Instant::now();
    let completed = AtomicU32::new(0);

    info!(
        "Starting batch run: {} games of '{}'",
        config.game_count, data.name
    );

    let replay_dir = if config.save_replays {
        let dir = config
            .output_dir
            .as_deref()
            .ok_or_else(|| HeadlessError::Batch("saving replays needs an output directory".into()))?;
        std::fs::create_dir_all(dir).map_err(|e| HeadlessError::io(dir, e))?;
        Some(dir)
    } else {
        None
    };

    let mut builder = rayon::ThreadPoolBuilder::new();
    if config.parallel_games > 0 {
        builder = builder.num_threads(config.parallel_games as usize);
    }
    let pool = builder
        .build()
        .map_err(|e| HeadlessError::Batch(format!("thread pool: {e}")))?;

    let results: Vec<std::result::Result<GameMetrics, BatchError>> = pool.install(|| {
        (0..config.game_count)
            .into_par_iter()
            .map(|i| {
                let seed = config.seed_start.wrapping_add(u64::from(i));
                match run_single_game(data, seed, config.max_ticks, replay_dir) {
                    Ok(metrics) => {
                        let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                        if done % 10 == 0 {
                            debug!("Progress: {}/{}", done, config.game_count);
                        }
                        Ok(metrics)
                    }
                    Err(e) => {
                        warn!("Game {} failed: {}", i, e);
                        Err(BatchError {
                            game_index: i,
                            seed,
                            message: e.to_string(),
                        })
                    }
                }
            })
            .collect()
    });

    let (games, errors): (Vec<_>, Vec<_>) = results.into_iter().partition(|r| r.is_ok());
    let games: Vec<GameMetrics> = games.into_iter().filter_map(|r| r.ok()).collect();
    let errors: Vec<BatchError> = errors.into_iter().filter_map(|r| r.err()).collect();

    let summary = BatchSummary::from_games(&games);
    let duration_seconds = start.elapsed().as_secs_f64();

    info!(
        "Batch complete: {} games in {:.1}s ({:.1} games/sec)",
        games.len(),
        duration_seconds,
        games.len() as f64 / duration_seconds.max(f64::EPSILON)
    );

    Ok(BatchResults {
        config,
        games,
        summary,
        duration_seconds,
        errors,
    })
}

/// Play the same seed `runs` times in parallel and compare final hashes.
///
/// # Errors
///
/// Returns an error if any run fails to load.
pub fn verify_determinism(data: &ScenarioData, seed: u64, max_ticks: u64, runs: u32) -> Result<bool> {
    let hashes: Vec<u64> = (0..runs.max(1))
        .into_par_iter()
        .map(|_| run_single_game(data, seed, max_ticks, None).map(|m| m.final_state_hash))
        .collect::<Result<_>>()?;
    let deterministic = hashes.windows(2).all(|w| w[0] == w[1]);
    if !deterministic {
        warn!(seed, ?hashes, "runs diverged");
    }
    Ok(deterministic)
}
