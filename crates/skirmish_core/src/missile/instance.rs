//! Missile instances and their save records.

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::math::PixelPos;
use crate::missile::types::{MissileType, MissileTypeId, MissileTypeRegistry};
use crate::unit::{UnitHandle, UnitRegistry};

/// A missile in flight (or burning, or waiting on a tile).
///
/// Positions are the sprite's top-left pixel; the type's half size turns
/// them into the centre. `ttl == 0` means the missile is finished and will
/// be removed at the end of the tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Missile {
    /// Missile type.
    pub type_id: MissileTypeId,
    /// Current top-left pixel.
    pub position: PixelPos,
    /// Top-left pixel where the current flight leg started.
    pub source: PixelPos,
    /// Top-left pixel where the current flight leg ends.
    pub destination: PixelPos,
    /// Sprite frame; negative values are horizontally mirrored.
    pub sprite_frame: i32,
    /// Class-specific phase counter.
    pub state: i32,
    /// Ticks until the next animation frame, for classes that animate
    /// independently of their controller rate.
    pub anim_wait: i32,
    /// Ticks until the controller runs again.
    pub wait: i32,
    /// Ticks before the missile starts acting.
    pub delay: i32,
    /// Remaining lifetime; negative for unlimited.
    pub ttl: i32,
    /// Firing unit, claimed while referenced.
    pub source_unit: Option<UnitHandle>,
    /// Aimed-at unit, claimed while referenced.
    pub target_unit: Option<UnitHandle>,
    /// Fixed damage overriding the damage formula when non-zero.
    pub damage: i32,
    /// Pixels travelled along the current leg.
    pub current_step: i32,
    /// Length of the current leg.
    pub total_step: i32,
    /// Not drawn.
    pub hidden: bool,
    /// Client-side only; never changes game state.
    pub local: bool,
    /// Creation order, used to break draw-order ties.
    pub slot: u64,
    #[serde(skip)]
    pub(crate) expired: bool,
}

impl Missile {
    /// A missile of `missile_type` flying from pixel `start` to pixel `dest`.
    ///
    /// Both points are centres; the missile stores top-left positions.
    #[must_use]
    pub fn new(missile_type: &MissileType, start: PixelPos, dest: PixelPos) -> Self {
        let half = missile_type.half_size();
        Self {
            type_id: missile_type.id,
            position: start - half,
            source: start - half,
            destination: dest - half,
            sprite_frame: 0,
            state: 0,
            anim_wait: 0,
            wait: missile_type.sleep.max(1),
            delay: missile_type.start_delay,
            ttl: missile_type.ttl,
            source_unit: None,
            target_unit: None,
            damage: 0,
            current_step: 0,
            total_step: 0,
            hidden: false,
            local: false,
            slot: 0,
            expired: false,
        }
    }

    /// Centre pixel.
    #[must_use]
    pub fn center(&self, missile_type: &MissileType) -> PixelPos {
        self.position + missile_type.half_size()
    }

    /// Set the firing unit, claiming it. Returns false if the handle is dead.
    pub fn set_source_unit(&mut self, units: &mut UnitRegistry, handle: UnitHandle) -> bool {
        if !units.claim(handle) {
            return false;
        }
        if let Some(old) = self.source_unit.replace(handle) {
            units.release(old);
        }
        true
    }

    /// Set the aimed-at unit, claiming it. Returns false if the handle is dead.
    pub fn set_target_unit(&mut self, units: &mut UnitRegistry, handle: UnitHandle) -> bool {
        if !units.claim(handle) {
            return false;
        }
        if let Some(old) = self.target_unit.replace(handle) {
            units.release(old);
        }
        true
    }

    /// Release both unit claims. Safe to call more than once.
    pub fn release_units(&mut self, units: &mut UnitRegistry) {
        if let Some(source) = self.source_unit.take() {
            units.release(source);
        }
        if let Some(target) = self.target_unit.take() {
            units.release(target);
        }
    }

    /// Save record naming the type by identifier.
    pub fn save(&self, types: &MissileTypeRegistry) -> Result<MissileSave> {
        let missile_type = types.get(self.type_id).ok_or_else(|| {
            GameError::InvalidState(format!("missile slot {} has no type", self.slot))
        })?;
        Ok(MissileSave {
            type_ident: missile_type.ident.clone(),
            position: self.position,
            source: self.source,
            destination: self.destination,
            sprite_frame: self.sprite_frame,
            state: self.state,
            anim_wait: self.anim_wait,
            wait: self.wait,
            delay: self.delay,
            ttl: self.ttl,
            source_unit: self.source_unit,
            target_unit: self.target_unit,
            damage: self.damage,
            current_step: self.current_step,
            total_step: self.total_step,
            hidden: self.hidden,
            local: self.local,
            slot: self.slot,
        })
    }
}

/// Persisted form of a [`Missile`].
///
/// The type is stored by identifier so saves survive content reordering.
/// Unit claims are not re-taken on restore: they live in the saved unit
/// registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissileSave {
    /// Missile type identifier.
    pub type_ident: String,
    /// Current top-left pixel.
    pub position: PixelPos,
    /// Start of the current leg.
    pub source: PixelPos,
    /// End of the current leg.
    pub destination: PixelPos,
    /// Sprite frame.
    pub sprite_frame: i32,
    /// Class-specific phase.
    pub state: i32,
    /// Animation wait.
    pub anim_wait: i32,
    /// Controller wait.
    pub wait: i32,
    /// Start delay.
    pub delay: i32,
    /// Lifetime.
    pub ttl: i32,
    /// Firing unit.
    pub source_unit: Option<UnitHandle>,
    /// Aimed-at unit.
    pub target_unit: Option<UnitHandle>,
    /// Fixed damage.
    pub damage: i32,
    /// Leg progress.
    pub current_step: i32,
    /// Leg length.
    pub total_step: i32,
    /// Hidden flag.
    pub hidden: bool,
    /// Local flag.
    pub local: bool,
    /// Creation order.
    pub slot: u64,
}

impl MissileSave {
    /// Rebuild the missile, resolving the type identifier.
    pub fn restore(&self, types: &MissileTypeRegistry) -> Result<Missile> {
        let type_id = types.id_of(&self.type_ident)?;
        Ok(Missile {
            type_id,
            position: self.position,
            source: self.source,
            destination: self.destination,
            sprite_frame: self.sprite_frame,
            state: self.state,
            anim_wait: self.anim_wait,
            wait: self.wait,
            delay: self.delay,
            ttl: self.ttl,
            source_unit: self.source_unit,
            target_unit: self.target_unit,
            damage: self.damage,
            current_step: self.current_step,
            total_step: self.total_step,
            hidden: self.hidden,
            local: self.local,
            slot: self.slot,
            expired: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DuplicatePolicy;
    use crate::math::TilePos;
    use crate::player::PlayerId;
    use crate::unit::UnitSpawn;
    use crate::unit_type::UnitTypeId;

    fn arrow_registry() -> MissileTypeRegistry {
        let mut types = MissileTypeRegistry::new(DuplicatePolicy::Error);
        let arrow = types.register("missile-arrow").expect("register");
        arrow.width = 32;
        arrow.height = 32;
        arrow.sleep = 2;
        arrow.start_delay = 3;
        arrow.ttl = 50;
        types
    }

    #[test]
    fn test_new_centres_sprite() {
        let types = arrow_registry();
        let arrow = types.lookup("missile-arrow").expect("registered");
        let m = Missile::new(arrow, PixelPos::new(0, 0), PixelPos::new(100, 0));
        assert_eq!(m.position, PixelPos::new(-16, -16));
        assert_eq!(m.destination, PixelPos::new(84, -16));
        assert_eq!(m.center(arrow), PixelPos::new(0, 0));
        assert_eq!(m.wait, 2);
        assert_eq!(m.delay, 3);
        assert_eq!(m.ttl, 50);
    }

    #[test]
    fn test_claims_released_once() {
        let types = arrow_registry();
        let arrow = types.lookup("missile-arrow").expect("registered");
        let mut units = UnitRegistry::new();
        let archer = units.spawn(UnitSpawn {
            type_id: UnitTypeId(0),
            player: PlayerId(0),
            tile_pos: TilePos::new(0, 0),
            size: (1, 1),
            max_hp: 10,
        });
        let mut m = Missile::new(arrow, PixelPos::ZERO, PixelPos::ZERO);
        assert!(m.set_source_unit(&mut units, archer));
        assert!(m.set_target_unit(&mut units, archer));
        assert_eq!(units.refs(archer), 2);
        m.release_units(&mut units);
        m.release_units(&mut units);
        assert_eq!(units.refs(archer), 0);
    }

    #[test]
    fn test_save_restore_by_ident() {
        let types = arrow_registry();
        let arrow = types.lookup("missile-arrow").expect("registered");
        let mut m = Missile::new(arrow, PixelPos::new(10, 10), PixelPos::new(90, 40));
        m.state = 1;
        m.current_step = 24;
        m.slot = 7;
        let save = m.save(&types).expect("save");
        assert_eq!(save.type_ident, "missile-arrow");
        assert_eq!(save.restore(&types).expect("restore"), m);

        let empty = MissileTypeRegistry::new(DuplicatePolicy::Error);
        assert!(save.restore(&empty).is_err());
    }
}
