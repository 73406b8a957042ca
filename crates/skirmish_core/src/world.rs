//! Mutable game world shared by missiles and orders.
//!
//! The world owns the map, the unit arena, players and the synchronized
//! random stream, plus the event buffer of the tick in progress. Missile
//! controllers and unit orders act on it through the operations below.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::SimConfig;
use crate::damage::{calculate_damage, calculate_damage_stats, CombatStats};
use crate::error::{GameError, Result};
use crate::events::{DamageEvent, TickEvents, WallEvent};
use crate::map::{TileMap, WallHit};
use crate::math::{heading_from_delta, PixelPos, TilePos};
use crate::player::{Player, PlayerId};
use crate::rng::SyncRng;
use crate::unit::{Unit, UnitHandle, UnitRegistry, UnitSpawn};
use crate::unit_type::{UnitType, UnitTypeId, UnitTypeRegistry};

/// All mutable simulation state except missiles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct World {
    /// Simulation configuration.
    pub config: SimConfig,
    /// Tile map.
    pub map: TileMap,
    /// Registered unit types.
    pub unit_types: UnitTypeRegistry,
    /// Unit arena.
    pub units: UnitRegistry,
    /// Players by slot.
    pub players: Vec<Player>,
    /// Synchronized random stream.
    pub rng: SyncRng,
    /// Current tick.
    pub tick: u64,
    /// Events of the tick in progress.
    #[serde(skip)]
    pub events: TickEvents,
    /// Buildings damaged this tick, checked for ignition after missiles run.
    #[serde(skip)]
    pub damaged_buildings: Vec<UnitHandle>,
}

impl World {
    /// Create a world with no players or units.
    #[must_use]
    pub fn new(config: SimConfig, map: TileMap, unit_types: UnitTypeRegistry) -> Self {
        let rng = SyncRng::new(config.seed);
        Self {
            config,
            map,
            unit_types,
            units: UnitRegistry::new(),
            players: Vec::new(),
            rng,
            tick: 0,
            events: TickEvents::default(),
            damaged_buildings: Vec::new(),
        }
    }

    /// Add a player; its id must match its slot.
    pub fn add_player(&mut self, player: Player) -> Result<PlayerId> {
        let id = player.id;
        if usize::from(id.0) != self.players.len() {
            return Err(GameError::InvalidConfig(format!(
                "player {id} added at slot {}",
                self.players.len()
            )));
        }
        self.players.push(player);
        Ok(id)
    }

    /// Player by id.
    #[must_use]
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(usize::from(id.0))
    }

    /// Mutable player by id.
    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(usize::from(id.0))
    }

    /// True when the two players are hostile.
    #[must_use]
    pub fn are_enemies(&self, a: PlayerId, b: PlayerId) -> bool {
        match (self.player(a), self.player(b)) {
            (Some(a), Some(b)) => a.is_enemy_of(b),
            _ => false,
        }
    }

    /// Place a unit of a registered type.
    pub fn spawn_unit(
        &mut self,
        type_id: UnitTypeId,
        player: PlayerId,
        tile_pos: TilePos,
    ) -> Result<UnitHandle> {
        let unit_type = self
            .unit_types
            .get(type_id)
            .ok_or_else(|| GameError::UnknownUnitType(format!("{type_id:?}")))?;
        if self.player(player).is_none() {
            return Err(GameError::InvalidConfig(format!("unknown player {player}")));
        }
        let starting = unit_type.starting_resources;
        let gives = unit_type.gives_resource;
        let handle = self.units.spawn(UnitSpawn {
            type_id,
            player,
            tile_pos,
            size: (unit_type.tile_width, unit_type.tile_height),
            max_hp: unit_type.stats.max_hp,
        });
        if let Some(unit) = self.units.get_mut(handle) {
            unit.resources_held = starting;
            unit.current_resource = gives;
        }
        trace!(unit = %handle, ?type_id, ?tile_pos, "spawned unit");
        Ok(handle)
    }

    /// Unit behind a handle, or `UnitNotFound`.
    pub fn unit(&self, handle: UnitHandle) -> Result<&Unit> {
        self.units
            .get(handle)
            .ok_or_else(|| GameError::UnitNotFound(handle.to_string()))
    }

    /// Type of a unit.
    #[must_use]
    pub fn unit_type_of(&self, handle: UnitHandle) -> Option<&UnitType> {
        self.units
            .get(handle)
            .and_then(|u| self.unit_types.get(u.type_id))
    }

    /// Living, on-map units overlapping the inclusive rectangle.
    #[must_use]
    pub fn units_in_rect(&self, min: TilePos, max: TilePos) -> Vec<UnitHandle> {
        self.units.units_in_rect(min, max)
    }

    /// The outermost unit carrying `handle`, or `handle` itself.
    #[must_use]
    pub fn topmost_container(&self, handle: UnitHandle) -> UnitHandle {
        let mut current = handle;
        while let Some(parent) = self.units.get(current).and_then(|u| u.container) {
            current = parent;
        }
        current
    }

    /// Combat values of a unit for damage formulas.
    #[must_use]
    pub fn combat_stats(&self, handle: UnitHandle) -> Option<CombatStats> {
        let unit = self.units.get(handle)?;
        let stats = self.unit_types.get(unit.type_id)?.stats;
        Some(CombatStats {
            hp: unit.hp,
            max_hp: unit.max_hp,
            armor: stats.armor,
            basic_damage: stats.basic_damage,
            piercing_damage: stats.piercing_damage,
            bloodlust: unit.bloodlust,
        })
    }

    /// Damage `attacker` would deal to `defender`, drawing from the RNG.
    pub fn calculate_damage(&mut self, attacker: UnitHandle, defender: UnitHandle) -> i32 {
        let (Some(a), Some(d)) = (self.combat_stats(attacker), self.combat_stats(defender)) else {
            return 0;
        };
        calculate_damage(self.config.damage_formula.as_ref(), &a, &d, &mut self.rng)
    }

    /// Apply damage to a unit, killing it at zero hit points.
    pub fn hit_unit(&mut self, attacker: Option<UnitHandle>, target: UnitHandle, damage: i32) {
        debug_assert!(damage >= 0, "negative damage {damage}");
        if damage <= 0 {
            return;
        }
        let building = self.unit_type_of(target).is_some_and(|t| t.building);
        let Some(unit) = self.units.get_mut(target) else {
            return;
        };
        if unit.destroyed {
            return;
        }
        unit.hp -= damage;
        let remaining_hp = unit.hp;
        self.events.damage_events.push(DamageEvent {
            attacker,
            target,
            amount: damage,
            remaining_hp,
        });
        if remaining_hp <= 0 {
            self.let_unit_die(target);
        } else if building && !self.damaged_buildings.contains(&target) {
            self.damaged_buildings.push(target);
        }
    }

    /// Damage the wall on a tile with `attacker`'s weapon.
    pub fn hit_wall(&mut self, attacker: UnitHandle, tile: TilePos, splash: i32) {
        let Some(wall) = self.map.wall_at(tile) else {
            return;
        };
        let Some(stats) = self.combat_stats(attacker) else {
            return;
        };
        let armor = self.config.walls.armor(wall.kind);
        let damage = calculate_damage_stats(
            stats.basic_damage,
            stats.piercing_damage,
            armor,
            stats.bloodlust,
            &mut self.rng,
        ) / splash.max(1);
        let destroyed = matches!(self.map.hit_wall(tile, damage), WallHit::Destroyed);
        self.events.wall_events.push(WallEvent {
            tile,
            kind: wall.kind,
            amount: damage,
            destroyed,
        });
    }

    /// Restore hit points, capped at the maximum.
    pub fn heal(&mut self, target: UnitHandle, amount: i32) {
        if let Some(unit) = self.units.get_mut(target) {
            if !unit.destroyed {
                unit.hp = (unit.hp + amount.max(0)).min(unit.max_hp);
            }
        }
    }

    /// Kill a unit.
    ///
    /// Drops out every carried unit and cancels the unit's own order.
    /// Workers harvesting it are left alone; their next tick finds the
    /// site gone.
    pub fn let_unit_die(&mut self, handle: UnitHandle) {
        let Some(unit) = self.units.get_mut(handle) else {
            return;
        };
        if unit.destroyed {
            return;
        }
        unit.destroyed = true;
        unit.hp = unit.hp.min(0);
        let passengers = std::mem::take(&mut unit.inside);
        let container = unit.container.take();
        debug!(unit = %handle, tick = self.tick, "unit died");

        if let Some(container) = container {
            if let Some(parent) = self.units.get_mut(container) {
                parent.inside.retain(|h| *h != handle);
            }
        }
        for passenger in passengers {
            self.drop_out(passenger, None);
        }
        crate::harvest::cancel_order(self, handle);
        self.events.deaths.push(handle);
    }

    /// Put a unit inside another one, taking it off the map.
    pub fn enter_container(&mut self, handle: UnitHandle, container: UnitHandle) {
        let Some(parent) = self.units.get_mut(container) else {
            return;
        };
        if !parent.inside.contains(&handle) {
            parent.inside.push(handle);
        }
        let parent_pos = parent.tile_pos;
        if let Some(unit) = self.units.get_mut(handle) {
            unit.container = Some(container);
            unit.tile_pos = parent_pos;
        }
    }

    /// Take a unit out of its container and place it on the free tile
    /// around the container closest to `toward` (or the first free tile
    /// clockwise from the top-left when `toward` is `None`).
    pub fn drop_out(&mut self, handle: UnitHandle, toward: Option<PixelPos>) {
        let Some(container) = self.units.get(handle).and_then(|u| u.container) else {
            return;
        };
        let (min, max) = match self.units.get(container) {
            Some(parent) => (parent.tile_pos, parent.tile_max()),
            None => {
                let pos = self.units.get(handle).map_or(TilePos::ZERO, |u| u.tile_pos);
                (pos, pos)
            }
        };
        if let Some(parent) = self.units.get_mut(container) {
            parent.inside.retain(|h| *h != handle);
        }
        let target = toward.map(PixelPos::to_tile);
        let spot = self.free_tile_around(min, max, target);
        if let Some(unit) = self.units.get_mut(handle) {
            unit.container = None;
            unit.tile_pos = spot;
            if let Some(toward) = toward {
                let center = spot.to_pixel_center();
                unit.heading = heading_from_delta(toward.x - center.x, toward.y - center.y);
            }
        }
        trace!(unit = %handle, %container, ?spot, "dropped out");
    }

    fn free_tile_around(&self, min: TilePos, max: TilePos, toward: Option<TilePos>) -> TilePos {
        let blocked = self.blocked_tiles();
        for ring in 1..=self.map.width().max(self.map.height()) {
            let mut best: Option<(i32, TilePos)> = None;
            for pos in ring_tiles(min, max, ring) {
                if !self.map.is_passable(pos) || blocked.contains(&pos) {
                    continue;
                }
                let score = toward.map_or(0, |t| {
                    let d = t - pos;
                    d.x * d.x + d.y * d.y
                });
                if best.map_or(true, |(s, _)| score < s) {
                    best = Some((score, pos));
                }
            }
            if let Some((_, pos)) = best {
                return pos;
            }
        }
        self.map.clamp(min)
    }

    /// Tiles covered by living, on-map buildings.
    #[must_use]
    pub fn blocked_tiles(&self) -> Vec<TilePos> {
        let mut tiles = Vec::new();
        for unit in self.units.iter() {
            let is_building = self
                .unit_types
                .get(unit.type_id)
                .is_some_and(|t| t.building);
            if unit.is_visible_as_goal() && is_building {
                let max = unit.tile_max();
                for y in unit.tile_pos.y..=max.y {
                    for x in unit.tile_pos.x..=max.x {
                        tiles.push(TilePos::new(x, y));
                    }
                }
            }
        }
        tiles
    }

    /// Record an AI request for a depot closer to a worker's site.
    pub fn request_depot(&mut self, worker: UnitHandle) {
        debug!(unit = %worker, "AI worker requests a closer depot");
        self.events.depot_requests.push(worker);
    }

    /// Assign a worker to a resource site. No-op if already assigned.
    pub fn assign_worker(&mut self, worker: UnitHandle, site: UnitHandle) {
        if let Some(unit) = self.units.get_mut(site) {
            if !unit.mine.is_assigned(worker) {
                unit.mine.workers.push(worker);
            }
        }
    }

    /// Remove a worker from a resource site. No-op if not assigned.
    pub fn deassign_worker(&mut self, worker: UnitHandle, site: UnitHandle) {
        if let Some(unit) = self.units.get_mut(site) {
            unit.mine.workers.retain(|w| *w != worker);
            debug_assert!(
                unit.mine.active <= unit.mine.assigned(),
                "site {site} has more active than assigned workers"
            );
        }
    }
}

/// Tiles on the square ring `ring` tiles outside an inclusive rectangle,
/// clockwise from the top-left corner.
fn ring_tiles(min: TilePos, max: TilePos, ring: i32) -> Vec<TilePos> {
    let (x0, y0, x1, y1) = (min.x - ring, min.y - ring, max.x + ring, max.y + ring);
    let mut tiles = Vec::new();
    for x in x0..=x1 {
        tiles.push(TilePos::new(x, y0));
    }
    for y in (y0 + 1)..=y1 {
        tiles.push(TilePos::new(x1, y));
    }
    for x in (x0..x1).rev() {
        tiles.push(TilePos::new(x, y1));
    }
    for y in ((y0 + 1)..y1).rev() {
        tiles.push(TilePos::new(x0, y));
    }
    tiles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DuplicatePolicy;
    use crate::map::WallKind;
    use crate::unit_type::UnitType;

    fn world() -> (World, UnitTypeId, UnitTypeId) {
        let mut types = UnitTypeRegistry::new(DuplicatePolicy::Error);
        let footman = types
            .register(UnitType {
                stats: crate::unit_type::UnitStats {
                    max_hp: 60,
                    armor: 2,
                    basic_damage: 6,
                    piercing_damage: 3,
                },
                ..UnitType::new("unit-footman", 60)
            })
            .expect("register");
        let barracks = types
            .register(UnitType {
                building: true,
                tile_width: 3,
                tile_height: 3,
                ..UnitType::new("unit-barracks", 800)
            })
            .expect("register");
        let mut world = World::new(SimConfig::with_seed(5), TileMap::new(16, 16), types);
        world.add_player(Player::new(PlayerId(0), "Red", 0)).expect("player");
        world.add_player(Player::new(PlayerId(1), "Blue", 1)).expect("player");
        (world, footman, barracks)
    }

    #[test]
    fn test_hit_unit_kills_at_zero() {
        let (mut world, footman, _) = world();
        let a = world.spawn_unit(footman, PlayerId(0), TilePos::new(1, 1)).expect("spawn");
        world.hit_unit(None, a, 59);
        assert_eq!(world.unit(a).expect("alive").hp, 1);
        world.hit_unit(None, a, 5);
        assert!(!world.units.is_alive(a));
        assert_eq!(world.events.deaths, vec![a]);
        assert_eq!(world.events.damage_events.len(), 2);
    }

    #[test]
    fn test_damaged_buildings_recorded_once() {
        let (mut world, _, barracks) = world();
        let b = world.spawn_unit(barracks, PlayerId(1), TilePos::new(5, 5)).expect("spawn");
        world.hit_unit(None, b, 10);
        world.hit_unit(None, b, 10);
        assert_eq!(world.damaged_buildings, vec![b]);
    }

    #[test]
    fn test_dying_container_drops_passengers() {
        let (mut world, footman, barracks) = world();
        let b = world.spawn_unit(barracks, PlayerId(0), TilePos::new(5, 5)).expect("spawn");
        let f = world.spawn_unit(footman, PlayerId(0), TilePos::new(1, 1)).expect("spawn");
        world.enter_container(f, b);
        assert!(world.unit(f).expect("alive").is_contained());
        assert!(world.units_in_rect(TilePos::new(0, 0), TilePos::new(15, 15)).len() == 1);

        world.let_unit_die(b);
        let unit = world.unit(f).expect("alive");
        assert!(!unit.is_contained());
        assert_eq!(unit.distance_to_tile(TilePos::new(6, 6)), 2);
    }

    #[test]
    fn test_drop_out_toward_target() {
        let (mut world, footman, barracks) = world();
        let b = world.spawn_unit(barracks, PlayerId(0), TilePos::new(5, 5)).expect("spawn");
        let f = world.spawn_unit(footman, PlayerId(0), TilePos::new(1, 1)).expect("spawn");
        world.enter_container(f, b);
        world.drop_out(f, Some(TilePos::new(12, 6).to_pixel_center()));
        assert_eq!(world.unit(f).expect("alive").tile_pos, TilePos::new(8, 6));
        assert!(world.unit(b).expect("alive").inside.is_empty());
    }

    #[test]
    fn test_hit_wall_uses_wall_armor() {
        let (mut world, footman, _) = world();
        let a = world.spawn_unit(footman, PlayerId(0), TilePos::new(1, 1)).expect("spawn");
        let tile = TilePos::new(3, 3);
        world.map.place_wall(tile, WallKind::Human, 40);
        world.hit_wall(a, tile, 1);
        // max(1, 6 - 20) + 3 = 4, minus 0..3
        let event = world.events.wall_events[0];
        assert!((2..=4).contains(&event.amount));
        assert!(!event.destroyed);
    }

    #[test]
    fn test_heal_capped() {
        let (mut world, footman, _) = world();
        let a = world.spawn_unit(footman, PlayerId(0), TilePos::new(1, 1)).expect("spawn");
        world.hit_unit(None, a, 20);
        world.heal(a, 50);
        assert_eq!(world.unit(a).expect("alive").hp, 60);
    }

    #[test]
    fn test_assignment_is_idempotent() {
        let (mut world, footman, barracks) = world();
        let site = world.spawn_unit(barracks, PlayerId(0), TilePos::new(5, 5)).expect("spawn");
        let w = world.spawn_unit(footman, PlayerId(0), TilePos::new(1, 1)).expect("spawn");
        world.assign_worker(w, site);
        world.assign_worker(w, site);
        assert_eq!(world.unit(site).expect("alive").mine.assigned(), 1);
        world.deassign_worker(w, site);
        world.deassign_worker(w, site);
        assert_eq!(world.unit(site).expect("alive").mine.assigned(), 0);
    }

    #[test]
    fn test_ring_tiles_cover_perimeter() {
        let tiles = ring_tiles(TilePos::new(5, 5), TilePos::new(5, 5), 1);
        assert_eq!(tiles.len(), 8);
        assert_eq!(tiles[0], TilePos::new(4, 4));
        let tiles = ring_tiles(TilePos::new(5, 5), TilePos::new(7, 7), 1);
        assert_eq!(tiles.len(), 16);
    }
}
