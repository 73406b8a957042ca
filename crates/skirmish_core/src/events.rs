//! Events produced by a simulation tick.
//!
//! The core never plays sounds or draws particles; it records what
//! happened and the presentation layer consumes [`TickEvents`].

use serde::{Deserialize, Serialize};

use crate::map::WallKind;
use crate::math::{PixelPos, TilePos};
use crate::player::{PlayerId, ResourceKind};
use crate::sound::SoundId;
use crate::unit::UnitHandle;

/// A sound to play at a map position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoundEvent {
    /// Sound to play.
    pub sound: SoundId,
    /// Where it happens.
    pub at: PixelPos,
}

/// A particle effect to spawn at a map position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticleEvent {
    /// Effect name from the missile type.
    pub effect: String,
    /// Where it happens.
    pub at: PixelPos,
}

/// Damage applied to a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageEvent {
    /// Unit responsible, if any.
    pub attacker: Option<UnitHandle>,
    /// Unit damaged.
    pub target: UnitHandle,
    /// Amount subtracted from hit points.
    pub amount: i32,
    /// Hit points after the hit.
    pub remaining_hp: i32,
}

/// Damage applied to a wall tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WallEvent {
    /// Wall tile.
    pub tile: TilePos,
    /// Wall faction.
    pub kind: WallKind,
    /// Amount subtracted from hit points.
    pub amount: i32,
    /// The wall crumbled.
    pub destroyed: bool,
}

/// Goods credited to a player at a depot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryEvent {
    /// Delivering worker.
    pub worker: UnitHandle,
    /// Receiving depot.
    pub depot: UnitHandle,
    /// Owner credited.
    pub player: PlayerId,
    /// Resource delivered.
    pub resource: ResourceKind,
    /// Amount carried in.
    pub carried: i32,
    /// Amount credited after income and storage cap.
    pub credited: i32,
}

/// Events generated during a single tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickEvents {
    /// Impact sounds.
    pub sounds: Vec<SoundEvent>,
    /// Impact particle effects.
    pub particles: Vec<ParticleEvent>,
    /// Damage applied to units.
    pub damage_events: Vec<DamageEvent>,
    /// Units that died this tick.
    pub deaths: Vec<UnitHandle>,
    /// Damage applied to walls.
    pub wall_events: Vec<WallEvent>,
    /// Forest tiles harvested bare.
    pub forest_cleared: Vec<TilePos>,
    /// Goods delivered to depots.
    pub deliveries: Vec<DeliveryEvent>,
    /// Workers whose resource order ended without a target.
    pub gave_up: Vec<UnitHandle>,
    /// AI workers asking for a depot closer to their site.
    pub depot_requests: Vec<UnitHandle>,
}

impl TickEvents {
    /// True when nothing happened.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sounds.is_empty()
            && self.particles.is_empty()
            && self.damage_events.is_empty()
            && self.deaths.is_empty()
            && self.wall_events.is_empty()
            && self.forest_cleared.is_empty()
            && self.deliveries.is_empty()
            && self.gave_up.is_empty()
            && self.depot_requests.is_empty()
    }

    /// Move every event of `other` into `self`, keeping order.
    pub fn append(&mut self, other: &mut Self) {
        self.sounds.append(&mut other.sounds);
        self.particles.append(&mut other.particles);
        self.damage_events.append(&mut other.damage_events);
        self.deaths.append(&mut other.deaths);
        self.wall_events.append(&mut other.wall_events);
        self.forest_cleared.append(&mut other.forest_cleared);
        self.deliveries.append(&mut other.deliveries);
        self.gave_up.append(&mut other.gave_up);
        self.depot_requests.append(&mut other.depot_requests);
    }
}
