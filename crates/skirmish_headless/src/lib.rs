//! Headless scenario runner for CI, batch runs and replay verification.
//!
//! This crate drives [`skirmish_core`] without any presentation layer:
//!
//! - **Interactive play**: a controller sends JSON commands on stdin and
//!   reads state on stdout
//! - **Batch runs**: one scenario played under many seeds in parallel
//! - **Replay verification**: recorded games are played back and their
//!   final state hash checked
//!
//! # Protocol
//!
//! Communication uses JSON lines (one JSON object per line):
//!
//! - **stdin**: commands from the controller (tick, harvest, attack, ...)
//! - **stdout**: state updates and responses
//! - **stderr**: logs
//!
//! See [`protocol`] for the full command and response format.
//!
//! # Example
//!
//! ```bash
//! # Play interactively
//! echo '{"cmd":"tick","count":60}' | cargo run -p skirmish_headless -- run -s scenarios/gold_rush.ron
//!
//! # Run for a fixed number of ticks and keep the replay
//! cargo run -p skirmish_headless -- run -s scenarios/gold_rush.ron --ticks 3000 --replay-out game.replay
//!
//! # Check a replay
//! cargo run -p skirmish_headless -- replay game.replay --verify
//! ```

pub mod batch;
pub mod error;
pub mod metrics;
pub mod protocol;
pub mod runner;
pub mod scenario;

pub use batch::{run_batch, BatchConfig, BatchResults};
pub use error::{HeadlessError, Result};
pub use metrics::{BatchSummary, GameMetrics, MetricsCollector};
pub use protocol::{Command, Response};
pub use runner::HeadlessRunner;
pub use scenario::load_scenario;
