//! # Skirmish Core
//!
//! Deterministic engine core for a tile-based RTS: missiles, hit
//! resolution and resource harvesting.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering or audio, only events describing what to show
//! - No system randomness
//! - No floating-point math in game state
//!
//! This separation enables:
//! - Lockstep multiplayer (identical simulation across clients)
//! - Headless batch runs
//! - Replay systems
//! - Determinism testing
//!
//! ## Crate Structure
//!
//! - [`missile`] - Missile types, instances, controllers and hits
//! - [`harvest`] - The worker resource order
//! - [`world`] - Units, players, map and the synchronized RNG
//! - [`data`] - Scenario definitions loaded from RON
//! - [`simulation`] - Core simulation loop
//! - [`replay`] - Recording and playback
//! - [`math`] - Pixel, tile and fixed-point math

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod config;
pub mod damage;
pub mod data;
pub mod error;
pub mod events;
pub mod harvest;
pub mod map;
pub mod math;
pub mod missile;
pub mod movement;
pub mod pathfinding;
pub mod player;
pub mod replay;
pub mod rng;
pub mod simulation;
pub mod sound;
pub mod unit;
pub mod unit_type;
pub mod world;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{DuplicatePolicy, SearchRanges, SimConfig, WallConfig};
    pub use crate::data::{OrderData, ScenarioData, UnitPlacement};
    pub use crate::error::{GameError, Result};
    pub use crate::events::{DamageEvent, DeliveryEvent, TickEvents};
    pub use crate::harvest::{HarvestSite, ResourceOrder};
    pub use crate::map::{Terrain, TileMap, WallKind};
    pub use crate::math::{PixelPos, TilePos, PIXEL_TILE_SIZE};
    pub use crate::missile::{
        FireTarget, Missile, MissileClass, MissileStore, MissileType, MissileTypeId,
        MissileTypeRegistry,
    };
    pub use crate::player::{Player, PlayerId, ResourceKind};
    pub use crate::replay::{Replay, ReplayPlayer};
    pub use crate::simulation::{SimCommand, Simulation};
    pub use crate::sound::{SoundId, SoundTable};
    pub use crate::unit::{Unit, UnitHandle, UnitOrder};
    pub use crate::unit_type::{ResourceInfo, UnitStats, UnitType, UnitTypeId, UnitTypeRegistry};
    pub use crate::world::World;
}
