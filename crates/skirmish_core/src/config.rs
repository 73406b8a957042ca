//! Simulation configuration.
//!
//! Loaded from RON alongside the content data. Every field has a default
//! so a config file only needs to name what it changes.
//!
//! # Example RON
//!
//! ```ron
//! SimConfig(
//!     seed: 12345,
//!     duplicate_policy: Shadow,
//!     damage_formula: Some(Max(Const(1), Sub(Attacker(BasicDamage), Defender(Armor)))),
//! )
//! ```

use serde::{Deserialize, Serialize};

use crate::damage::DamageFormula;
use crate::error::{GameError, Result};
use crate::map::WallKind;

/// What a registry does when an identifier is registered twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DuplicatePolicy {
    /// Reject the second registration.
    #[default]
    Error,
    /// The later definition replaces the earlier one for name lookups.
    /// Entities created from the earlier definition keep it.
    Shadow,
}

/// Armor and hit points of wall segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WallConfig {
    /// Armor of human walls.
    pub human_armor: i32,
    /// Armor of orc walls.
    pub orc_armor: i32,
    /// Hit points of a freshly placed wall.
    pub max_hp: i32,
}

impl Default for WallConfig {
    fn default() -> Self {
        Self {
            human_armor: 20,
            orc_armor: 20,
            max_hp: 40,
        }
    }
}

impl WallConfig {
    /// Armor of a wall kind.
    #[must_use]
    pub const fn armor(&self, kind: WallKind) -> i32 {
        match kind {
            WallKind::Human => self.human_armor,
            WallKind::Orc => self.orc_armor,
        }
    }
}

/// Search radii used by harvesting workers, in tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRanges {
    /// Looking for another resource site near the lost or remembered one.
    pub resource: i32,
    /// Looking for any resource site when nothing is remembered.
    pub resource_far: i32,
    /// Looking for a deposit.
    pub depot: i32,
    /// Looking for forest near the remembered forest tile.
    pub terrain: i32,
    /// Looking for forest after the path to the current tile failed.
    pub terrain_far: i32,
    /// Looking for forest when leaving a depot.
    pub terrain_from_depot: i32,
}

impl Default for SearchRanges {
    fn default() -> Self {
        Self {
            resource: 15,
            resource_far: 1000,
            depot: 1000,
            terrain: 16,
            terrain_far: 9999,
            terrain_from_depot: 10,
        }
    }
}

/// Simulation-wide configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Seed of the synchronized random stream.
    pub seed: u64,
    /// Behaviour of type registries on duplicate identifiers.
    pub duplicate_policy: DuplicatePolicy,
    /// Global damage formula; `None` uses the stats formula.
    pub damage_formula: Option<DamageFormula>,
    /// Wall armor and hit points.
    pub walls: WallConfig,
    /// Path cycles after which an AI worker asks for a closer depot.
    pub ai_depot_request_cycles: u32,
    /// Worker search radii.
    pub search: SearchRanges,
    /// Upper bound on tiles expanded by one path search.
    pub max_path_nodes: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            duplicate_policy: DuplicatePolicy::Error,
            damage_formula: None,
            walls: WallConfig::default(),
            ai_depot_request_cycles: 300,
            search: SearchRanges::default(),
            max_path_nodes: 16_384,
        }
    }
}

impl SimConfig {
    /// Config with a given seed and defaults elsewhere.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    /// Parse a config from RON text.
    pub fn from_ron(text: &str) -> Result<Self> {
        let config: Self = ron::from_str(text).map_err(|e| GameError::DataParseError {
            path: "<config>".into(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the simulation cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.walls.max_hp <= 0 {
            return Err(GameError::InvalidConfig("wall max_hp must be positive".into()));
        }
        let s = &self.search;
        for (name, range) in [
            ("resource", s.resource),
            ("resource_far", s.resource_far),
            ("depot", s.depot),
            ("terrain", s.terrain),
            ("terrain_far", s.terrain_far),
            ("terrain_from_depot", s.terrain_from_depot),
        ] {
            if range < 0 {
                return Err(GameError::InvalidConfig(format!(
                    "search range '{name}' must not be negative"
                )));
            }
        }
        if self.max_path_nodes == 0 {
            return Err(GameError::InvalidConfig("max_path_nodes must be positive".into()));
        }
        Ok(())
    }
}
