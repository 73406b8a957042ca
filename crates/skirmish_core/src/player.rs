//! Players and their resource stockpiles.
//!
//! Delivered goods are scaled by the player's income percentage and
//! clamped to the storage cap. Harvest and return speeds are expressed
//! relative to [`SPEEDUP_FACTOR`] (100 = normal speed).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Normal speed for the harvest and return speed multipliers.
pub const SPEEDUP_FACTOR: i32 = 100;

/// Percent of delivered goods credited at default income.
pub const DEFAULT_INCOME: i32 = 100;

/// A harvestable resource kind.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum ResourceKind {
    /// Extracted from gold mines.
    Gold,
    /// Chopped from forest tiles.
    Wood,
    /// Pumped from oil patches.
    Oil,
}

impl ResourceKind {
    /// Number of resource kinds.
    pub const COUNT: usize = 3;

    /// All resource kinds in index order.
    pub const ALL: [Self; Self::COUNT] = [Self::Gold, Self::Wood, Self::Oil];

    /// Index into per-resource arrays.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Gold => 0,
            Self::Wood => 1,
            Self::Oil => 2,
        }
    }

    /// Lowercase display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Gold => "gold",
            Self::Wood => "wood",
            Self::Oil => "oil",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Player slot identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(pub u8);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Player state relevant to the engine core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Slot identifier.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// Alliance team; players on different teams are enemies.
    pub team: u8,
    /// Neutral players own resource sites and are nobody's enemy.
    #[serde(default)]
    pub neutral: bool,
    /// Controlled by the computer opponent.
    #[serde(default)]
    pub ai: bool,
    /// Current stockpile per resource.
    #[serde(default)]
    pub resources: [i32; ResourceKind::COUNT],
    /// Storage cap per resource, `None` for unlimited.
    #[serde(default)]
    pub max_resources: [Option<i32>; ResourceKind::COUNT],
    /// Percent of delivered goods credited per resource.
    #[serde(default = "default_incomes")]
    pub incomes: [i32; ResourceKind::COUNT],
    /// Harvest speed per resource relative to [`SPEEDUP_FACTOR`].
    #[serde(default = "default_speeds")]
    pub harvest_speed: [i32; ResourceKind::COUNT],
    /// Return speed per resource relative to [`SPEEDUP_FACTOR`].
    #[serde(default = "default_speeds")]
    pub return_speed: [i32; ResourceKind::COUNT],
    /// Lifetime total credited per resource.
    #[serde(default)]
    pub total_resources: [i32; ResourceKind::COUNT],
}

const fn default_incomes() -> [i32; ResourceKind::COUNT] {
    [DEFAULT_INCOME; ResourceKind::COUNT]
}

const fn default_speeds() -> [i32; ResourceKind::COUNT] {
    [SPEEDUP_FACTOR; ResourceKind::COUNT]
}

impl Player {
    /// Create a player with empty stockpiles and default rates.
    #[must_use]
    pub fn new(id: PlayerId, name: impl Into<String>, team: u8) -> Self {
        Self {
            id,
            name: name.into(),
            team,
            neutral: false,
            ai: false,
            resources: [0; ResourceKind::COUNT],
            max_resources: [None; ResourceKind::COUNT],
            incomes: default_incomes(),
            harvest_speed: default_speeds(),
            return_speed: default_speeds(),
            total_resources: [0; ResourceKind::COUNT],
        }
    }

    /// Create a neutral player, owner of resource sites.
    #[must_use]
    pub fn neutral(id: PlayerId) -> Self {
        Self {
            neutral: true,
            ..Self::new(id, "Neutral", u8::MAX)
        }
    }

    /// True when the two players are hostile to each other.
    #[must_use]
    pub fn is_enemy_of(&self, other: &Self) -> bool {
        !self.neutral && !other.neutral && self.team != other.team
    }

    /// Current stockpile of a resource.
    #[must_use]
    pub const fn resource(&self, kind: ResourceKind) -> i32 {
        self.resources[kind.index()]
    }

    /// Credit delivered goods, scaled by income and clamped to the cap.
    ///
    /// Returns the amount actually credited.
    pub fn deliver(&mut self, kind: ResourceKind, carried: i32) -> i32 {
        let i = kind.index();
        let scaled = carried * self.incomes[i] / 100;
        let credited = match self.max_resources[i] {
            Some(cap) => scaled.min((cap - self.resources[i]).max(0)),
            None => scaled,
        };
        self.resources[i] += credited;
        self.total_resources[i] += credited;
        credited
    }

    /// Harvest speed multiplier for a resource.
    #[must_use]
    pub const fn harvest_speed(&self, kind: ResourceKind) -> i32 {
        self.harvest_speed[kind.index()]
    }

    /// Return speed multiplier for a resource.
    #[must_use]
    pub const fn return_speed(&self, kind: ResourceKind) -> i32 {
        self.return_speed[kind.index()]
    }
}
