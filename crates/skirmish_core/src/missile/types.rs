//! Missile types and their registry.
//!
//! Missile types are registered by identifier while content loads, then
//! [`MissileTypeRegistry::init_all`] resolves the names they reference
//! (impact and smoke missiles, impact sounds, burning tiers) into ids.
//! After that the registry is read-only for the rest of the game.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::config::DuplicatePolicy;
use crate::error::{GameError, Result};
use crate::math::PixelPos;
use crate::sound::{SoundId, SoundTable};

/// Index of a registered missile type.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct MissileTypeId(pub u32);

/// Behaviour selector of a missile type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MissileClass {
    /// Does nothing; direct-fire weapons hit without a missile.
    #[default]
    None,
    /// Flies straight to the destination and hits.
    PointToPoint,
    /// Flies straight, then hits once its animation finishes.
    PointToPointWithHit,
    /// Flies straight, picking the animation row from the distance covered.
    PointToPointCycleOnce,
    /// Flies straight and bounces onward, hitting at every landing.
    PointToPointBounce,
    /// Stays in place and hits when its animation ends.
    Stay,
    /// Plays its animation forward, then backward, then hits.
    CycleOnce,
    /// Burns on a building while its hit points stay low.
    Fire,
    /// Flies straight and hits without animating.
    Hit,
    /// Flies along an arc.
    Parabolic,
    /// Waits on its tile until a ground unit steps on it.
    LandMine,
    /// Wanders randomly, damaging whatever stands on its tile.
    Whirlwind,
    /// Circles a unit, damaging its neighbours.
    FlameShield,
    /// Drains life from its target or enemies near the destination.
    DeathCoil,
}

const fn one() -> i32 {
    1
}

const fn unlimited() -> i32 {
    -1
}

/// Static description of a missile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissileType {
    /// Registry index, assigned on registration.
    #[serde(default)]
    pub id: MissileTypeId,
    /// Unique identifier.
    pub ident: String,
    /// Behaviour.
    #[serde(default)]
    pub class: MissileClass,
    /// Sprite width in pixels.
    #[serde(default)]
    pub width: i32,
    /// Sprite height in pixels.
    #[serde(default)]
    pub height: i32,
    /// Total sprite frames.
    #[serde(default = "one")]
    pub sprite_frames: i32,
    /// Facing directions in the sprite sheet.
    #[serde(default = "one")]
    pub num_directions: i32,
    /// Pixels advanced per controller invocation.
    #[serde(default)]
    pub speed: i32,
    /// Ticks between controller invocations.
    #[serde(default = "one")]
    pub sleep: i32,
    /// Ticks before the missile starts acting.
    #[serde(default)]
    pub start_delay: i32,
    /// Lifetime in ticks; negative for unlimited.
    #[serde(default = "unlimited")]
    pub ttl: i32,
    /// Splash radius in tiles; zero hits only the target.
    #[serde(default)]
    pub range: i32,
    /// Damage divisor per tile of distance from the impact.
    #[serde(default)]
    pub splash_factor: i32,
    /// Landings of a bouncing missile.
    #[serde(default)]
    pub num_bounces: i32,
    /// The firing unit can be damaged by its own missile.
    #[serde(default)]
    pub can_hit_owner: bool,
    /// Draw order key; lower draws first.
    #[serde(default)]
    pub draw_level: i32,
    /// Missile spawned at the impact point.
    #[serde(default)]
    pub impact_missile: Option<String>,
    /// Missile trailed behind during flight.
    #[serde(default)]
    pub smoke_missile: Option<String>,
    /// Sound played on impact.
    #[serde(default)]
    pub impact_sound: Option<String>,
    /// Particle effect spawned on impact.
    #[serde(default)]
    pub impact_particle: Option<String>,
    /// Resolved impact missile.
    #[serde(default)]
    pub impact: Option<MissileTypeId>,
    /// Resolved smoke missile.
    #[serde(default)]
    pub smoke: Option<MissileTypeId>,
    /// Resolved impact sound.
    #[serde(default)]
    pub impact_sound_id: Option<SoundId>,
}

impl MissileType {
    /// A type with default values and the given identifier.
    #[must_use]
    pub fn new(ident: impl Into<String>) -> Self {
        Self {
            id: MissileTypeId::default(),
            ident: ident.into(),
            class: MissileClass::None,
            width: 0,
            height: 0,
            sprite_frames: 1,
            num_directions: 1,
            speed: 0,
            sleep: 1,
            start_delay: 0,
            ttl: -1,
            range: 0,
            splash_factor: 0,
            num_bounces: 0,
            can_hit_owner: false,
            draw_level: 0,
            impact_missile: None,
            smoke_missile: None,
            impact_sound: None,
            impact_particle: None,
            impact: None,
            smoke: None,
            impact_sound_id: None,
        }
    }

    /// Half the sprite size, the offset from top-left to centre.
    #[must_use]
    pub const fn half_size(&self) -> PixelPos {
        PixelPos::new(self.width / 2, self.height / 2)
    }
}

/// A hit-point band of burning buildings and the fire shown in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurningTier {
    /// Buildings at or below this hit-point percentage use this tier.
    pub percent: i32,
    /// Fire missile identifier; `None` extinguishes the fire.
    pub missile: Option<String>,
    /// Resolved fire missile.
    #[serde(default)]
    pub resolved: Option<MissileTypeId>,
}

/// Registry of missile types.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissileTypeRegistry {
    types: Vec<MissileType>,
    by_ident: HashMap<String, MissileTypeId>,
    burning: Vec<BurningTier>,
    policy: DuplicatePolicy,
    initialized: bool,
}

impl MissileTypeRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new(policy: DuplicatePolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Register a new type with default values and return it for filling in.
    pub fn register(&mut self, ident: &str) -> Result<&mut MissileType> {
        let id = self.insert(MissileType::new(ident))?;
        let index = id.0 as usize;
        Ok(&mut self.types[index])
    }

    /// Register a fully described type, assigning its id.
    ///
    /// Under [`DuplicatePolicy::Shadow`] a repeated identifier gets a new id
    /// and name lookups return the newest definition.
    pub fn insert(&mut self, mut missile_type: MissileType) -> Result<MissileTypeId> {
        if self.by_ident.contains_key(&missile_type.ident) {
            match self.policy {
                DuplicatePolicy::Error => {
                    return Err(GameError::DuplicateIdentifier {
                        kind: "missile type",
                        ident: missile_type.ident,
                    })
                }
                DuplicatePolicy::Shadow => {
                    debug!(ident = %missile_type.ident, "missile type shadows earlier definition");
                }
            }
        }
        let id = MissileTypeId(self.types.len() as u32);
        missile_type.id = id;
        self.by_ident.insert(missile_type.ident.clone(), id);
        self.types.push(missile_type);
        self.initialized = false;
        Ok(id)
    }

    /// Type by identifier.
    #[must_use]
    pub fn lookup(&self, ident: &str) -> Option<&MissileType> {
        self.by_ident.get(ident).and_then(|id| self.get(*id))
    }

    /// Id by identifier.
    pub fn id_of(&self, ident: &str) -> Result<MissileTypeId> {
        self.by_ident
            .get(ident)
            .copied()
            .ok_or_else(|| GameError::UnknownMissileType(ident.to_string()))
    }

    /// Type by id.
    #[must_use]
    pub fn get(&self, id: MissileTypeId) -> Option<&MissileType> {
        self.types.get(id.0 as usize)
    }

    /// Number of registered types, shadowed ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// True when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// True once [`init_all`](Self::init_all) has resolved every reference.
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Add a burning tier: buildings at or below `percent` hit points show
    /// `missile`, or stop burning when it is `None`.
    pub fn add_burning_tier(&mut self, percent: i32, missile: Option<&str>) {
        self.burning.push(BurningTier {
            percent,
            missile: missile.map(str::to_string),
            resolved: None,
        });
        self.initialized = false;
    }

    /// Resolve every name reference.
    ///
    /// Unknown missile names are errors; unknown sound names are logged and
    /// left silent. Sleep, frame and direction counts are raised to at
    /// least 1.
    pub fn init_all(&mut self, sounds: &SoundTable) -> Result<()> {
        let resolve = |by_ident: &HashMap<String, MissileTypeId>,
                       owner: &str,
                       name: &Option<String>|
         -> Result<Option<MissileTypeId>> {
            match name {
                None => Ok(None),
                Some(name) => by_ident.get(name).copied().map(Some).ok_or_else(|| {
                    GameError::UnknownMissileType(format!("{name} (referenced by {owner})"))
                }),
            }
        };

        for i in 0..self.types.len() {
            let (impact, smoke) = {
                let t = &self.types[i];
                (
                    resolve(&self.by_ident, &t.ident, &t.impact_missile)?,
                    resolve(&self.by_ident, &t.ident, &t.smoke_missile)?,
                )
            };
            let t = &mut self.types[i];
            t.impact = impact;
            t.smoke = smoke;
            t.impact_sound_id = match &t.impact_sound {
                Some(name) => {
                    let id = sounds.lookup(name);
                    if id.is_none() {
                        warn!(missile = %t.ident, sound = %name, "unknown impact sound");
                    }
                    id
                }
                None => None,
            };
            t.sleep = t.sleep.max(1);
            t.sprite_frames = t.sprite_frames.max(1);
            t.num_directions = t.num_directions.clamp(1, 256);
        }

        for tier in &mut self.burning {
            tier.resolved = resolve(&self.by_ident, "burning tier", &tier.missile)?;
        }
        self.burning.sort_by(|a, b| b.percent.cmp(&a.percent));
        self.initialized = true;
        debug!(types = self.types.len(), tiers = self.burning.len(), "missile types initialized");
        Ok(())
    }

    /// Fire missile for a building at `percent` hit points.
    ///
    /// Picks the tier with the smallest percentage not below `percent`.
    /// `None` when no tier matches or the matching tier extinguishes.
    #[must_use]
    pub fn burning_missile(&self, percent: i32) -> Option<MissileTypeId> {
        self.burning
            .iter()
            .rev()
            .find(|tier| percent <= tier.percent)
            .and_then(|tier| tier.resolved)
    }

    /// Drop every type and tier.
    pub fn clear(&mut self) {
        self.types.clear();
        self.by_ident.clear();
        self.burning.clear();
        self.initialized = false;
    }
}
