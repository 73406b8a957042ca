//! The two missile collections and the per-tick action loop.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::Result;
use crate::math::PixelPos;
use crate::missile::controller;
use crate::missile::instance::{Missile, MissileSave};
use crate::missile::types::{MissileType, MissileTypeId, MissileTypeRegistry};
use crate::missile::MissileContext;
use crate::unit::UnitRegistry;
use crate::world::World;

/// What a renderer needs to draw one missile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissileSprite {
    /// Missile type, for the sprite sheet.
    pub type_id: MissileTypeId,
    /// Top-left pixel.
    pub position: PixelPos,
    /// Frame; negative frames are mirrored.
    pub frame: i32,
    /// Draw order key.
    pub draw_level: i32,
    /// Creation order, breaking draw-level ties.
    pub slot: u64,
}

/// Global (game-state) and local (client-only) missiles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MissileStore {
    global: Vec<Missile>,
    local: Vec<Missile>,
    next_slot: u64,
}

impl MissileStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a missile of `missile_type` between two centre points.
    pub fn create(
        &mut self,
        missile_type: &MissileType,
        start: PixelPos,
        dest: PixelPos,
        local: bool,
    ) -> &mut Missile {
        let mut missile = Missile::new(missile_type, start, dest);
        missile.local = local;
        self.insert(missile)
    }

    /// Add a missile to the collection its `local` flag selects,
    /// giving it the next creation slot.
    pub fn insert(&mut self, mut missile: Missile) -> &mut Missile {
        missile.slot = self.next_slot;
        self.next_slot += 1;
        let list = if missile.local {
            &mut self.local
        } else {
            &mut self.global
        };
        list.push(missile);
        let last = list.len() - 1;
        &mut list[last]
    }

    /// Missiles that affect game state.
    #[must_use]
    pub fn global(&self) -> &[Missile] {
        &self.global
    }

    /// Client-side missiles.
    #[must_use]
    pub fn local(&self) -> &[Missile] {
        &self.local
    }

    /// Mutable access to the global missiles.
    pub fn global_mut(&mut self) -> &mut [Missile] {
        &mut self.global
    }

    /// Every missile, global first.
    pub fn iter(&self) -> impl Iterator<Item = &Missile> {
        self.global.iter().chain(self.local.iter())
    }

    /// Total missile count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.global.len() + self.local.len()
    }

    /// True when no missile exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.global.is_empty() && self.local.is_empty()
    }

    /// Run one tick for every missile, global collection first.
    ///
    /// Missiles spawned during the tick (impacts, smoke) join the store
    /// afterwards and first act on the next tick.
    pub fn tick_all(&mut self, world: &mut World, types: &MissileTypeRegistry) {
        let mut ctx = MissileContext::new(world, types);
        action_loop(&mut self.global, &mut ctx);
        action_loop(&mut self.local, &mut ctx);
        for missile in ctx.into_spawned() {
            self.insert(missile);
        }
    }

    /// Remove every missile, releasing its unit claims.
    pub fn clear(&mut self, units: &mut UnitRegistry) {
        for missile in self.global.iter_mut().chain(self.local.iter_mut()) {
            missile.release_units(units);
        }
        self.global.clear();
        self.local.clear();
    }

    /// Visible missiles overlapping `viewport` (inclusive top-left and
    /// exclusive bottom-right pixels, or everything when `None`), in
    /// draw order.
    #[must_use]
    pub fn draw_list(
        &self,
        types: &MissileTypeRegistry,
        viewport: Option<(PixelPos, PixelPos)>,
    ) -> Vec<MissileSprite> {
        let mut sprites: Vec<MissileSprite> = self
            .iter()
            .filter(|m| !m.hidden && m.delay <= 0)
            .filter_map(|m| {
                let missile_type = types.get(m.type_id)?;
                if let Some((min, max)) = viewport {
                    let end = m.position + PixelPos::new(missile_type.width, missile_type.height);
                    let outside = end.x < min.x
                        || end.y < min.y
                        || m.position.x >= max.x
                        || m.position.y >= max.y;
                    if outside {
                        return None;
                    }
                }
                Some(MissileSprite {
                    type_id: m.type_id,
                    position: m.position,
                    frame: m.sprite_frame,
                    draw_level: missile_type.draw_level,
                    slot: m.slot,
                })
            })
            .collect();
        sprites.sort_by_key(|s| (s.draw_level, s.slot));
        sprites
    }

    /// Save records for every missile, global first.
    pub fn save(&self, types: &MissileTypeRegistry) -> Result<MissileStoreSave> {
        Ok(MissileStoreSave {
            missiles: self
                .iter()
                .map(|m| m.save(types))
                .collect::<Result<Vec<_>>>()?,
            next_slot: self.next_slot,
        })
    }

    /// Rebuild a store from save records.
    pub fn restore(save: &MissileStoreSave, types: &MissileTypeRegistry) -> Result<Self> {
        let mut store = Self {
            next_slot: save.next_slot,
            ..Self::default()
        };
        for record in &save.missiles {
            let missile = record.restore(types)?;
            if missile.local {
                store.local.push(missile);
            } else {
                store.global.push(missile);
            }
        }
        Ok(store)
    }
}

/// Persisted form of a [`MissileStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissileStoreSave {
    /// Every missile, global first.
    pub missiles: Vec<MissileSave>,
    /// Next creation slot.
    pub next_slot: u64,
}

/// Advance every missile of one collection and drop the finished ones.
fn action_loop(missiles: &mut Vec<Missile>, ctx: &mut MissileContext<'_>) {
    for missile in missiles.iter_mut() {
        if missile.delay > 0 {
            missile.delay -= 1;
            continue;
        }
        if missile.ttl > 0 {
            missile.ttl -= 1;
        }
        if missile.ttl == 0 {
            expire(missile, ctx);
            continue;
        }
        missile.wait -= 1;
        if missile.wait > 0 {
            continue;
        }
        controller::run(missile, ctx);
        if missile.ttl == 0 {
            expire(missile, ctx);
        }
    }
    missiles.retain(|m| !m.expired);
}

fn expire(missile: &mut Missile, ctx: &mut MissileContext<'_>) {
    trace!(slot = missile.slot, type_id = missile.type_id.0, "missile expired");
    missile.release_units(&mut ctx.world.units);
    missile.expired = true;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DuplicatePolicy, SimConfig};
    use crate::map::TileMap;
    use crate::missile::types::MissileClass;
    use crate::sound::SoundTable;
    use crate::unit_type::UnitTypeRegistry;

    fn setup() -> (World, MissileTypeRegistry) {
        let mut types = MissileTypeRegistry::new(DuplicatePolicy::Error);
        {
            let t = types.register("missile-blizzard").expect("register");
            t.class = MissileClass::Stay;
            t.sprite_frames = 4;
            t.ttl = 5;
            t.draw_level = 50;
        }
        {
            let t = types.register("missile-delayed").expect("register");
            t.class = MissileClass::None;
            t.start_delay = 2;
            t.ttl = 3;
            t.draw_level = 10;
            t.width = 32;
            t.height = 32;
        }
        types.init_all(&SoundTable::new()).expect("init");
        let world = World::new(
            SimConfig::default(),
            TileMap::new(8, 8),
            UnitTypeRegistry::new(DuplicatePolicy::Error),
        );
        (world, types)
    }

    #[test]
    fn test_ttl_removes_missile() {
        let (mut world, types) = setup();
        let mut store = MissileStore::new();
        let t = types.lookup("missile-delayed").expect("registered");
        store.create(t, PixelPos::new(40, 40), PixelPos::new(40, 40), false);
        // two ticks of delay, then three of lifetime
        for _ in 0..4 {
            store.tick_all(&mut world, &types);
            assert_eq!(store.len(), 1);
        }
        store.tick_all(&mut world, &types);
        assert!(store.is_empty());
    }

    #[test]
    fn test_local_missiles_kept_apart() {
        let (mut world, types) = setup();
        let mut store = MissileStore::new();
        let t = types.lookup("missile-delayed").expect("registered");
        store.create(t, PixelPos::ZERO, PixelPos::ZERO, true);
        store.create(t, PixelPos::ZERO, PixelPos::ZERO, false);
        assert_eq!(store.local().len(), 1);
        assert_eq!(store.global().len(), 1);
        assert_eq!(store.global()[0].slot, 1);
        store.tick_all(&mut world, &types);
        assert_eq!(store.local()[0].delay, 1);
    }

    #[test]
    fn test_draw_list_order_and_viewport() {
        let (_, types) = setup();
        let mut store = MissileStore::new();
        let blizzard = types.lookup("missile-blizzard").expect("registered");
        let delayed = types.lookup("missile-delayed").expect("registered");
        store.create(blizzard, PixelPos::new(10, 10), PixelPos::new(10, 10), false);
        store.create(delayed, PixelPos::new(100, 100), PixelPos::new(100, 100), false).delay = 0;
        store.create(blizzard, PixelPos::new(20, 20), PixelPos::new(20, 20), true);
        store.create(blizzard, PixelPos::new(30, 30), PixelPos::new(30, 30), false).hidden = true;

        let all = store.draw_list(&types, None);
        let slots: Vec<u64> = all.iter().map(|s| s.slot).collect();
        assert_eq!(slots, vec![1, 0, 2]);

        let near = store.draw_list(&types, Some((PixelPos::ZERO, PixelPos::new(64, 64))));
        assert_eq!(near.len(), 2);
    }

    #[test]
    fn test_save_restore_keeps_collections() {
        let (_, types) = setup();
        let mut store = MissileStore::new();
        let t = types.lookup("missile-blizzard").expect("registered");
        store.create(t, PixelPos::new(8, 8), PixelPos::new(8, 8), false);
        store.create(t, PixelPos::new(9, 9), PixelPos::new(9, 9), true);
        let save = store.save(&types).expect("save");
        let restored = MissileStore::restore(&save, &types).expect("restore");
        assert_eq!(restored, store);
    }
}
