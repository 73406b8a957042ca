//! Data structures for scenario content.
//!
//! Unit and missile types deserialize directly from RON; this module adds
//! the scenario file that ties them to a map, players and starting units.
//!
//! **Note:** This module contains no IO. Reading files is the headless
//! runner's job.

mod scenario;

pub use scenario::{BurningTierData, OrderData, ScenarioData, UnitPlacement};
