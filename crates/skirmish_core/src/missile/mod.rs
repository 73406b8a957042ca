//! Missiles: projectiles, spell effects and burning fires.
//!
//! - [`types`]: the type registry, loaded once and then read-only.
//! - [`instance`]: a single missile and its save record.
//! - [`store`]: global and local missile collections and the tick loop.
//! - `controller`: per-class behaviour.
//! - [`hit`]: impact resolution and splash damage.

pub(crate) mod animation;
pub(crate) mod controller;
pub mod hit;
pub mod instance;
pub mod store;
pub mod types;

pub use hit::splash_divisor;
pub use instance::{Missile, MissileSave};
pub use store::{MissileSprite, MissileStore, MissileStoreSave};
pub use types::{BurningTier, MissileClass, MissileType, MissileTypeId, MissileTypeRegistry};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{GameError, Result};
use crate::math::{PixelPos, TilePos};
use crate::unit::UnitHandle;
use crate::world::World;

/// Everything a missile controller may touch during a tick.
///
/// Missiles created while the collections are being iterated are queued
/// here and added to the store once the tick's loops are done.
pub struct MissileContext<'a> {
    /// The game world.
    pub world: &'a mut World,
    /// Missile types.
    pub types: &'a MissileTypeRegistry,
    spawned: Vec<Missile>,
}

impl<'a> MissileContext<'a> {
    /// A context with nothing queued.
    pub fn new(world: &'a mut World, types: &'a MissileTypeRegistry) -> Self {
        Self {
            world,
            types,
            spawned: Vec::new(),
        }
    }

    /// Queue a new missile between two centre points.
    pub fn spawn(
        &mut self,
        type_id: MissileTypeId,
        start: PixelPos,
        dest: PixelPos,
        local: bool,
    ) -> Option<&mut Missile> {
        let missile_type = self.types.get(type_id)?;
        let mut missile = Missile::new(missile_type, start, dest);
        missile.local = local;
        self.spawned.push(missile);
        self.spawned.last_mut()
    }

    /// Missiles queued during the tick.
    #[must_use]
    pub fn into_spawned(self) -> Vec<Missile> {
        self.spawned
    }
}

/// What an attack is aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FireTarget {
    /// A unit.
    Unit(UnitHandle),
    /// A map tile, for attacking walls or the ground.
    Tile(TilePos),
}

/// Fire `attacker`'s weapon at `target`.
///
/// Weapons whose missile class is `None` hit at once. Others launch a
/// missile from the centre of the attacker's outermost container toward
/// the target's nearest tile. Returns false when the target is dead or
/// off the map and nothing was fired.
///
/// # Errors
///
/// Returns `UnitNotFound` for a dead attacker handle and
/// `UnknownMissileType` when the attacker's weapon names no registered
/// missile.
pub fn fire_missile(
    store: &mut MissileStore,
    world: &mut World,
    types: &MissileTypeRegistry,
    attacker: UnitHandle,
    target: FireTarget,
) -> Result<bool> {
    let weapon = world
        .unit_type_of(attacker)
        .ok_or_else(|| GameError::UnitNotFound(attacker.to_string()))?
        .missile
        .clone()
        .ok_or_else(|| GameError::UnknownMissileType(format!("no weapon on {attacker}")))?;
    let missile_type = types
        .lookup(&weapon)
        .ok_or_else(|| GameError::UnknownMissileType(weapon.clone()))?;

    let goal_tile = match target {
        FireTarget::Unit(goal) => {
            let Some(unit) = world.units.get(goal).filter(|u| u.is_visible_as_goal()) else {
                trace!(%attacker, %goal, "goal gone, shot aborted");
                return Ok(false);
            };
            let from = world.unit(attacker)?.tile_pos;
            TilePos::new(
                from.x.clamp(unit.tile_pos.x, unit.tile_max().x),
                from.y.clamp(unit.tile_pos.y, unit.tile_max().y),
            )
        }
        FireTarget::Tile(tile) => {
            if !world.map.is_on_map(tile) {
                return Ok(false);
            }
            tile
        }
    };

    if missile_type.class == MissileClass::None {
        match target {
            FireTarget::Unit(goal) => {
                let damage = world.calculate_damage(attacker, goal);
                world.hit_unit(Some(attacker), goal, damage);
            }
            FireTarget::Tile(tile) => world.hit_wall(attacker, tile, 1),
        }
        return Ok(true);
    }

    let top = world.topmost_container(attacker);
    let start = world.unit(top)?.center_pixel();
    let dest = goal_tile.to_pixel_center();
    let missile = store.create(missile_type, start, dest, false);
    missile.set_source_unit(&mut world.units, attacker);
    if let FireTarget::Unit(goal) = target {
        missile.set_target_unit(&mut world.units, goal);
    }
    debug!(%attacker, missile = %missile_type.ident, ?goal_tile, "missile fired");
    Ok(true)
}

/// Attach fire missiles to buildings damaged this tick that are not yet
/// burning and whose hit points fall in a burning tier.
pub fn ignite_damaged_buildings(
    store: &mut MissileStore,
    world: &mut World,
    types: &MissileTypeRegistry,
) {
    for building in std::mem::take(&mut world.damaged_buildings) {
        let Some(unit) = world.units.get(building) else {
            continue;
        };
        if unit.destroyed || unit.burning || unit.under_construction {
            continue;
        }
        let percent = unit.hp * 100 / unit.max_hp.max(1);
        let center = unit.center_pixel();
        let Some(fire) = types.burning_missile(percent).and_then(|id| types.get(id)) else {
            continue;
        };
        let missile = store.create(fire, center, center, false);
        if missile.set_source_unit(&mut world.units, building) {
            if let Some(unit) = world.units.get_mut(building) {
                unit.burning = true;
            }
            debug!(unit = %building, percent, fire = %fire.ident, "building caught fire");
        }
    }
}
