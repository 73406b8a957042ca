//! Headless skirmish runner.
//!
//! Runs scenarios without graphics. Interactive sessions are controlled
//! via JSON on stdin/stdout; the other subcommands are meant for CI.
//!
//! # Usage
//!
//! ```bash
//! # Interactive mode - read commands from stdin
//! cargo run -p skirmish_headless -- run -s scenarios/gold_rush.ron
//!
//! # Run for a fixed time, write a report and a replay
//! cargo run -p skirmish_headless -- run -s scenarios/gold_rush.ron --ticks 3000 --replay-out game.replay
//!
//! # Run a batch over 100 seeds
//! cargo run -p skirmish_headless -- batch -s scenarios/gold_rush.ron --count 100 --output results/
//!
//! # Check that a seed always plays out the same
//! cargo run -p skirmish_headless -- verify -s scenarios/gold_rush.ron --seed 12345
//! ```
//!
//! Logs go to stderr; stdout carries protocol lines and reports.

use std::io::{self, BufWriter};
use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use skirmish_core::replay::{Replay, ReplayPlayer};
use skirmish_headless::{
    batch::{run_batch, verify_determinism, BatchConfig},
    runner::{HeadlessConfig, HeadlessRunner},
    scenario::load_scenario_with_seed,
    Result,
};

#[derive(Parser)]
#[command(name = "skirmish_headless")]
#[command(about = "Headless skirmish runner for CI, batch runs and replays")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single game, interactively or for a fixed number of ticks
    Run {
        /// Scenario file to load
        #[arg(short, long)]
        scenario: PathBuf,

        /// Override the scenario seed
        #[arg(long)]
        seed: Option<u64>,

        /// Run this many ticks instead of reading commands from stdin
        #[arg(short, long)]
        ticks: Option<u64>,

        /// Write the recorded replay here
        #[arg(long)]
        replay_out: Option<PathBuf>,
    },

    /// Run a batch of games over consecutive seeds
    Batch {
        /// Scenario file to run
        #[arg(short, long)]
        scenario: PathBuf,

        /// Number of games to run
        #[arg(short, long, default_value = "100")]
        count: u32,

        /// Parallel games (0 = one per core)
        #[arg(short, long, default_value = "0")]
        parallel: u32,

        /// Output directory
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// First seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Ticks per game
        #[arg(short, long, default_value = "9000")]
        ticks: u64,

        /// Write a replay per game
        #[arg(long)]
        replays: bool,
    },

    /// Verify determinism by running same seed multiple times
    Verify {
        /// Scenario to test
        #[arg(short, long)]
        scenario: PathBuf,

        /// Seed to verify
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,

        /// Ticks per run
        #[arg(short, long, default_value = "3000")]
        ticks: u64,
    },

    /// Replay a recorded game
    Replay {
        /// Replay file path
        file: PathBuf,

        /// Verify replay produces identical hash
        #[arg(long)]
        verify: bool,
    },

    /// Run N ticks for benchmarking
    Benchmark {
        /// Scenario to benchmark
        #[arg(short, long)]
        scenario: PathBuf,

        /// Number of ticks to run
        #[arg(short, long, default_value = "36000")]
        ticks: u64,
    },
}

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr (stdout is for protocol); RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_ansi(true),
        )
        .with(filter)
        .init();

    let result = match cli.command {
        Commands::Run {
            scenario,
            seed,
            ticks,
            replay_out,
        } => cmd_run(scenario, seed, ticks, replay_out),
        Commands::Batch {
            scenario,
            count,
            parallel,
            output,
            seed,
            ticks,
            replays,
        } => cmd_batch(scenario, count, parallel, output, seed, ticks, replays),
        Commands::Verify {
            scenario,
            seed,
            runs,
            ticks,
        } => cmd_verify(scenario, seed, runs, ticks),
        Commands::Replay { file, verify } => cmd_replay(file, verify),
        Commands::Benchmark { scenario, ticks } => cmd_benchmark(scenario, ticks),
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "command failed");
        eprintln!("FATAL: {e}");
        std::process::exit(1);
    }
}

/// Run a single game
fn cmd_run(
    scenario: PathBuf,
    seed: Option<u64>,
    ticks: Option<u64>,
    replay_out: Option<PathBuf>,
) -> Result<()> {
    let config = HeadlessConfig {
        record_replay: replay_out.is_some(),
        game_id: None,
    };
    let mut runner = HeadlessRunner::load(&scenario, seed, &config)?;

    match ticks {
        Some(ticks) => {
            tracing::info!(ticks, "running scenario");
            runner.run_until(ticks);
        }
        None => {
            tracing::info!("Starting interactive session");
            let stdin = io::stdin();
            runner.run_protocol(stdin.lock(), BufWriter::new(io::stdout().lock()))?;
        }
    }

    if let (Some(path), Some(replay)) = (&replay_out, runner.replay()) {
        replay.save(path)?;
        tracing::info!(path = %path.display(), commands = replay.command_count(), "replay written");
    }

    if ticks.is_some() {
        let metrics = runner.finish();
        println!("{}", serde_json::to_string_pretty(&metrics)?);
    }
    Ok(())
}

/// Run batch of games
fn cmd_batch(
    scenario: PathBuf,
    count: u32,
    parallel: u32,
    output: PathBuf,
    seed: u64,
    ticks: u64,
    replays: bool,
) -> Result<()> {
    let mut config = BatchConfig::new(scenario, count)
        .with_output(&output)
        .with_seed(seed)
        .with_max_ticks(ticks);
    config.parallel_games = parallel;
    config.save_replays = replays;

    tracing::info!(
        scenario = %config.scenario.display(),
        count,
        parallel,
        seed,
        ticks,
        output = %output.display(),
        "Batch configuration"
    );

    let results = run_batch(config)?;
    let results_path = output.join("batch_results.json");
    results.save(&results_path)?;

    eprintln!("\n{}", "=".repeat(50));
    eprintln!("BATCH COMPLETE");
    eprintln!("{}", "=".repeat(50));
    eprintln!("Games played: {}", results.games.len());
    if !results.errors.is_empty() {
        eprintln!("Games failed: {}", results.errors.len());
    }
    eprintln!("Average deliveries: {:.1}", results.summary.average_deliveries);
    eprintln!("Average deaths: {:.1}", results.summary.average_deaths);
    for (player, gathered) in &results.summary.average_gathered {
        for (resource, amount) in gathered {
            eprintln!("  {player} {resource}: {amount:.0}");
        }
    }
    eprintln!("Results: {}", results_path.display());
    Ok(())
}

/// Verify determinism of one seed
fn cmd_verify(scenario: PathBuf, seed: u64, runs: u32, ticks: u64) -> Result<()> {
    tracing::info!(
        "Verifying determinism: {} with seed {} ({} runs)",
        scenario.display(),
        seed,
        runs
    );

    let data = load_scenario_with_seed(&scenario, Some(seed))?;
    if verify_determinism(&data, seed, ticks, runs)? {
        eprintln!("PASS: All {runs} runs produced identical results");
        Ok(())
    } else {
        eprintln!("FAIL: Non-determinism detected!");
        std::process::exit(1);
    }
}

/// Replay a recorded game
fn cmd_replay(file: PathBuf, verify: bool) -> Result<()> {
    if verify {
        tracing::info!("Verifying replay: {}", file.display());
    } else {
        tracing::info!("Playing replay: {}", file.display());
    }

    let replay = Replay::load(&file)?;

    eprintln!("Loaded replay:");
    eprintln!("  Scenario: {}", replay.scenario_id);
    eprintln!("  Seed: {}", replay.seed);
    eprintln!("  Commands: {}", replay.command_count());
    eprintln!("  Duration: {} ticks", replay.duration());

    let mut player = ReplayPlayer::new(replay)?;

    if verify {
        eprintln!("Verifying replay...");
        player.verify()?;
        eprintln!("PASS: Replay verification successful");
        eprintln!("  Hash: {:016x}", player.replay().final_hash);
    } else {
        let mut last_percent = 0;
        while player.advance() {
            let percent = player.progress_percent();
            if percent > last_percent && percent % 10 == 0 {
                eprintln!("Progress: {percent}%");
                last_percent = percent;
            }
        }
        eprintln!("Replay finished at tick {}", player.current_tick());
        eprintln!("  Hash: {:016x}", player.simulation().state_hash());
    }
    Ok(())
}

/// Benchmark tick throughput
fn cmd_benchmark(scenario: PathBuf, ticks: u64) -> Result<()> {
    tracing::info!("Running {} tick benchmark", ticks);

    let mut runner = HeadlessRunner::load(&scenario, None, &HeadlessConfig::default())?;
    eprintln!(
        "Starting benchmark with {} units",
        runner.simulation().world().units.len()
    );

    // Warmup
    runner.tick(100);

    let start = Instant::now();
    let end = runner.simulation().get_tick() + ticks;
    runner.run_until(end);
    let elapsed = start.elapsed();

    let tps = ticks as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
    eprintln!("Ran {ticks} ticks in {:.2}s", elapsed.as_secs_f64());
    eprintln!("  {tps:.0} ticks/sec");
    eprintln!("  {:.1}x real time", tps / f64::from(skirmish_core::simulation::TICK_RATE));
    eprintln!("  Final hash: {:016x}", runner.simulation().state_hash());
    Ok(())
}
