//! Core simulation loop.
//!
//! A [`Simulation`] owns the world, the missile store and the content
//! registries, and advances them one tick at a time.
//!
//! # Determinism
//!
//! - No floating-point math in game state
//! - One synchronized random stream, seeded from the config
//! - Units, orders and missiles are processed in slot order
//!
//! # Tick order
//!
//! 1. Unit orders ([`tick_orders`])
//! 2. Missiles, global collection first ([`MissileStore::tick_all`])
//! 3. Fire on buildings damaged this tick
//! 4. Recycling of dead, unclaimed unit slots
//!
//! # Example
//!
//! ```
//! use skirmish_core::prelude::*;
//!
//! let mut unit_types = UnitTypeRegistry::new(DuplicatePolicy::Error);
//! unit_types.register(UnitType::new("unit-peasant", 30)).unwrap();
//! let world = World::new(SimConfig::with_seed(7), TileMap::new(8, 8), unit_types);
//! let types = MissileTypeRegistry::new(DuplicatePolicy::Error);
//! let mut sim = Simulation::new(world, types, SoundTable::new()).unwrap();
//!
//! let events = sim.tick();
//! assert!(events.is_empty());
//! assert_eq!(sim.get_tick(), 1);
//! ```

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::data::{OrderData, ScenarioData};
use crate::error::{GameError, Result};
use crate::events::TickEvents;
use crate::harvest::{cancel_order, issue_resource_order, tick_orders, ResourceOrder};
use crate::map::TileMap;
use crate::math::{PixelPos, TilePos};
use crate::missile::{
    fire_missile, ignite_damaged_buildings, FireTarget, MissileSprite, MissileStore,
    MissileStoreSave, MissileTypeRegistry,
};
use crate::player::PlayerId;
use crate::sound::SoundTable;
use crate::unit::UnitHandle;
use crate::unit_type::UnitTypeRegistry;
use crate::world::World;

/// Game ticks per second.
pub const TICK_RATE: u32 = 30;

/// A player command, recorded in replays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimCommand {
    /// Harvest a resource unit.
    Harvest {
        /// The worker.
        worker: UnitHandle,
        /// The resource site.
        mine: UnitHandle,
    },
    /// Harvest terrain at or near a tile.
    HarvestTerrain {
        /// The worker.
        worker: UnitHandle,
        /// Clicked tile.
        tile: TilePos,
    },
    /// Carry the current load home.
    ReturnGoods {
        /// The worker.
        worker: UnitHandle,
        /// Depot, or the nearest one.
        depot: Option<UnitHandle>,
    },
    /// Fire a unit's weapon.
    Fire {
        /// The shooter.
        attacker: UnitHandle,
        /// What to shoot at.
        target: FireTarget,
    },
    /// Stop whatever the unit is doing.
    Cancel {
        /// The unit.
        unit: UnitHandle,
    },
}

/// World, missiles and content, advanced together.
#[derive(Debug, Clone)]
pub struct Simulation {
    world: World,
    missiles: MissileStore,
    missile_types: MissileTypeRegistry,
    sounds: SoundTable,
    labels: BTreeMap<String, UnitHandle>,
}

/// Serialized form; missiles name their type by identifier.
#[derive(Serialize, Deserialize)]
struct SimulationState {
    world: World,
    missile_types: MissileTypeRegistry,
    sounds: SoundTable,
    labels: BTreeMap<String, UnitHandle>,
    missiles: MissileStoreSave,
}

impl Simulation {
    /// Wrap a prepared world. Resolves missile type references if that has
    /// not happened yet.
    ///
    /// # Errors
    ///
    /// Fails when a missile type names an unknown missile.
    pub fn new(
        world: World,
        mut missile_types: MissileTypeRegistry,
        sounds: SoundTable,
    ) -> Result<Self> {
        if !missile_types.is_initialized() {
            missile_types.init_all(&sounds)?;
        }
        Ok(Self {
            world,
            missiles: MissileStore::new(),
            missile_types,
            sounds,
            labels: BTreeMap::new(),
        })
    }

    /// Build a simulation from scenario data and issue its starting orders.
    ///
    /// # Errors
    ///
    /// Fails on duplicate or unknown identifiers, bad maps, units placed off
    /// the map and orders naming unknown labels or incapable units.
    pub fn from_scenario(data: &ScenarioData) -> Result<Self> {
        data.validate()?;
        let policy = data.config.duplicate_policy;

        let mut sounds = SoundTable::new();
        for name in &data.sounds {
            sounds.register(name);
        }

        let mut missile_types = MissileTypeRegistry::new(policy);
        for missile_type in &data.missile_types {
            missile_types.insert(missile_type.clone())?;
        }
        for tier in &data.burning_tiers {
            missile_types.add_burning_tier(tier.percent, tier.missile.as_deref());
        }
        missile_types.init_all(&sounds)?;

        let mut unit_types = UnitTypeRegistry::new(policy);
        for unit_type in &data.unit_types {
            unit_types.register(unit_type.clone())?;
        }
        for unit_type in unit_types.iter() {
            if let Some(missile) = &unit_type.missile {
                missile_types.id_of(missile)?;
            }
        }

        let map = TileMap::from_rows(&data.map, data.config.walls.max_hp)?;
        let mut world = World::new(data.config.clone(), map, unit_types);
        for player in &data.players {
            world.add_player(player.clone())?;
        }

        let mut labels = BTreeMap::new();
        for placement in &data.units {
            let type_id = world.unit_types.id_of(&placement.unit_type)?;
            let pos = TilePos::new(placement.x, placement.y);
            if !world.map.is_on_map(pos) {
                return Err(GameError::InvalidConfig(format!(
                    "{} placed off the map at {pos:?}",
                    placement.unit_type
                )));
            }
            let handle = world.spawn_unit(type_id, PlayerId(placement.player), pos)?;
            if let Some(unit) = world.units.get_mut(handle) {
                if let Some(resources) = placement.resources {
                    unit.resources_held = resources;
                }
                unit.under_construction = placement.under_construction;
            }
            if let Some(label) = &placement.label {
                labels.insert(label.clone(), handle);
            }
        }

        let mut sim = Self {
            world,
            missiles: MissileStore::new(),
            missile_types,
            sounds,
            labels,
        };
        for order in &data.orders {
            let command = sim.resolve_order(order)?;
            sim.apply_command(command)?;
        }
        debug!(
            scenario = %data.name,
            units = sim.world.units.len(),
            missile_types = sim.missile_types.len(),
            "scenario loaded"
        );
        Ok(sim)
    }

    fn resolve_order(&self, order: &OrderData) -> Result<SimCommand> {
        Ok(match order {
            OrderData::Harvest { worker, mine } => SimCommand::Harvest {
                worker: self.labelled(worker)?,
                mine: self.labelled(mine)?,
            },
            OrderData::HarvestTerrain { worker, x, y } => SimCommand::HarvestTerrain {
                worker: self.labelled(worker)?,
                tile: TilePos::new(*x, *y),
            },
            OrderData::ReturnGoods { worker, depot } => SimCommand::ReturnGoods {
                worker: self.labelled(worker)?,
                depot: depot.as_deref().map(|d| self.labelled(d)).transpose()?,
            },
            OrderData::Attack { attacker, target } => SimCommand::Fire {
                attacker: self.labelled(attacker)?,
                target: FireTarget::Unit(self.labelled(target)?),
            },
            OrderData::AttackTile { attacker, x, y } => SimCommand::Fire {
                attacker: self.labelled(attacker)?,
                target: FireTarget::Tile(TilePos::new(*x, *y)),
            },
        })
    }

    fn labelled(&self, label: &str) -> Result<UnitHandle> {
        self.unit_by_label(label)
            .ok_or_else(|| GameError::UnitNotFound(format!("label '{label}'")))
    }

    /// Current tick.
    #[must_use]
    pub const fn get_tick(&self) -> u64 {
        self.world.tick
    }

    /// The game world.
    #[must_use]
    pub const fn world(&self) -> &World {
        &self.world
    }

    /// Mutable game world.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// The missile store.
    #[must_use]
    pub const fn missiles(&self) -> &MissileStore {
        &self.missiles
    }

    /// Mutable missile store, for adjusting missiles already launched.
    pub fn missiles_mut(&mut self) -> &mut MissileStore {
        &mut self.missiles
    }

    /// Missile types.
    #[must_use]
    pub const fn missile_types(&self) -> &MissileTypeRegistry {
        &self.missile_types
    }

    /// Sound names.
    #[must_use]
    pub const fn sounds(&self) -> &SoundTable {
        &self.sounds
    }

    /// Unit placed under `label` by the scenario.
    #[must_use]
    pub fn unit_by_label(&self, label: &str) -> Option<UnitHandle> {
        self.labels.get(label).copied()
    }

    /// Scenario labels in name order.
    pub fn labels(&self) -> impl Iterator<Item = (&str, UnitHandle)> {
        self.labels.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Advance the simulation by one tick and return what happened.
    ///
    /// Events caused by commands applied since the previous tick are
    /// included.
    pub fn tick(&mut self) -> TickEvents {
        tick_orders(&mut self.world);
        self.missiles.tick_all(&mut self.world, &self.missile_types);
        ignite_damaged_buildings(&mut self.missiles, &mut self.world, &self.missile_types);
        let freed = self.world.units.collect_garbage();
        if !freed.is_empty() {
            trace!(tick = self.world.tick, freed = freed.len(), "recycled unit slots");
        }
        self.world.tick += 1;

        #[cfg(debug_assertions)]
        {
            let hash = self.state_hash();
            tracing::debug!(tick = self.world.tick, state_hash = hash, "Simulation state hash");
        }

        #[cfg(feature = "debug-validation")]
        self.validate_sites();

        std::mem::take(&mut self.world.events)
    }

    /// Check every resource site's worker counters and every missile's
    /// claims after a tick.
    #[cfg(feature = "debug-validation")]
    fn validate_sites(&self) {
        for unit in self.world.units.iter() {
            if unit.mine.active > unit.mine.assigned() {
                tracing::error!(
                    tick = self.world.tick,
                    site = %unit.handle,
                    active = unit.mine.active,
                    assigned = unit.mine.assigned(),
                    "site has more active than assigned workers"
                );
            }
        }
        for missile in self.missiles.iter() {
            for claimed in missile.source_unit.iter().chain(missile.target_unit.iter()) {
                if self.world.units.refs(*claimed) == 0 {
                    tracing::error!(tick = self.world.tick, unit = %claimed, "missile holds an unclaimed unit");
                }
            }
        }
    }

    /// Apply a player command.
    ///
    /// # Errors
    ///
    /// Fails when the command names dead units or units unable to carry it
    /// out; the simulation is left unchanged.
    pub fn apply_command(&mut self, command: SimCommand) -> Result<()> {
        trace!(tick = self.world.tick, ?command, "apply command");
        match command {
            SimCommand::Harvest { worker, mine } => {
                let order = ResourceOrder::harvest_unit(&self.world, worker, mine)?;
                issue_resource_order(&mut self.world, order);
            }
            SimCommand::HarvestTerrain { worker, tile } => {
                let order = ResourceOrder::harvest_terrain(&self.world, worker, tile)?;
                issue_resource_order(&mut self.world, order);
            }
            SimCommand::ReturnGoods { worker, depot } => {
                let order = ResourceOrder::return_goods(&self.world, worker, depot)?;
                issue_resource_order(&mut self.world, order);
            }
            SimCommand::Fire { attacker, target } => {
                self.fire_missile(attacker, target)?;
            }
            SimCommand::Cancel { unit } => {
                self.world.unit(unit)?;
                cancel_order(&mut self.world, unit);
            }
        }
        Ok(())
    }

    /// Fire `attacker`'s weapon. See [`fire_missile`].
    ///
    /// # Errors
    ///
    /// Fails for dead attackers and unknown weapons.
    pub fn fire_missile(&mut self, attacker: UnitHandle, target: FireTarget) -> Result<bool> {
        fire_missile(
            &mut self.missiles,
            &mut self.world,
            &self.missile_types,
            attacker,
            target,
        )
    }

    /// Launch a missile by type identifier between two centre pixels.
    ///
    /// Returns the missile's creation slot.
    ///
    /// # Errors
    ///
    /// Fails for unknown identifiers.
    pub fn launch_missile(
        &mut self,
        ident: &str,
        start: PixelPos,
        dest: PixelPos,
        source: Option<UnitHandle>,
        target: Option<UnitHandle>,
    ) -> Result<u64> {
        let missile_type = self
            .missile_types
            .lookup(ident)
            .ok_or_else(|| GameError::UnknownMissileType(ident.to_string()))?;
        let missile = self.missiles.create(missile_type, start, dest, false);
        if let Some(source) = source {
            missile.set_source_unit(&mut self.world.units, source);
        }
        if let Some(target) = target {
            missile.set_target_unit(&mut self.world.units, target);
        }
        Ok(missile.slot)
    }

    /// Sprites to draw, see [`MissileStore::draw_list`].
    #[must_use]
    pub fn draw_list(&self, viewport: Option<(PixelPos, PixelPos)>) -> Vec<MissileSprite> {
        self.missiles.draw_list(&self.missile_types, viewport)
    }

    /// Hash of the game state.
    ///
    /// Two simulations fed the same scenario and commands hash equal after
    /// every tick. Local missiles are included; they never diverge because
    /// they never touch game state.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        let world = &self.world;

        world.tick.hash(&mut hasher);
        world.rng.word_pos().hash(&mut hasher);

        for unit in world.units.iter() {
            unit.handle.hash(&mut hasher);
            unit.tile_pos.x.hash(&mut hasher);
            unit.tile_pos.y.hash(&mut hasher);
            unit.hp.hash(&mut hasher);
            unit.destroyed.hash(&mut hasher);
            unit.burning.hash(&mut hasher);
            unit.heading.hash(&mut hasher);
            unit.wait.hash(&mut hasher);
            unit.container.hash(&mut hasher);
            unit.current_resource.hash(&mut hasher);
            unit.resources_held.hash(&mut hasher);
            unit.mine.workers.hash(&mut hasher);
            unit.mine.active.hash(&mut hasher);
            if let Some(order) = unit.order.as_resource() {
                order.state.hash(&mut hasher);
                order.goal.hash(&mut hasher);
                order.goal_pos.x.hash(&mut hasher);
                order.goal_pos.y.hash(&mut hasher);
                order.depot.hash(&mut hasher);
                order.done_harvesting.hash(&mut hasher);
                order.time_to_harvest.hash(&mut hasher);
            }
        }

        for player in &world.players {
            player.resources.hash(&mut hasher);
        }

        for y in 0..world.map.height() {
            for x in 0..world.map.width() {
                if let Some(tile) = world.map.tile(TilePos::new(x, y)) {
                    tile.terrain.hash(&mut hasher);
                    tile.wall.map(|w| w.hp).hash(&mut hasher);
                }
            }
        }

        for missile in self.missiles.iter() {
            missile.slot.hash(&mut hasher);
            missile.type_id.hash(&mut hasher);
            missile.position.x.hash(&mut hasher);
            missile.position.y.hash(&mut hasher);
            missile.state.hash(&mut hasher);
            missile.ttl.hash(&mut hasher);
            missile.wait.hash(&mut hasher);
            missile.sprite_frame.hash(&mut hasher);
        }

        hasher.finish()
    }

    /// Serialize the simulation for saving, replays or network sync.
    ///
    /// # Errors
    ///
    /// Returns an error if a missile has no registered type or encoding
    /// fails.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let state = SimulationState {
            world: self.world.clone(),
            missile_types: self.missile_types.clone(),
            sounds: self.sounds.clone(),
            labels: self.labels.clone(),
            missiles: self.missiles.save(&self.missile_types)?,
        };
        bincode::serialize(&state)
            .map_err(|e| GameError::InvalidState(format!("Failed to serialize simulation: {e}")))
    }

    /// Deserialize simulation state from bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if decoding fails or a saved missile names an
    /// unknown type.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        let state: SimulationState = bincode::deserialize(data).map_err(|e| {
            GameError::InvalidState(format!("Failed to deserialize simulation: {e}"))
        })?;
        let missiles = MissileStore::restore(&state.missiles, &state.missile_types)?;
        Ok(Self {
            world: state.world,
            missiles,
            missile_types: state.missile_types,
            sounds: state.sounds,
            labels: state.labels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DuplicatePolicy, SimConfig};
    use crate::missile::MissileClass;
    use crate::player::{Player, ResourceKind};
    use crate::unit_type::{ResourceInfo, UnitStats, UnitType};

    fn simulation() -> (Simulation, UnitHandle, UnitHandle) {
        let mut unit_types = UnitTypeRegistry::new(DuplicatePolicy::Error);
        let archer = unit_types
            .register(UnitType {
                stats: UnitStats {
                    max_hp: 40,
                    armor: 0,
                    basic_damage: 3,
                    piercing_damage: 6,
                },
                missile: Some("missile-arrow".into()),
                harvests: vec![ResourceInfo {
                    resource: ResourceKind::Wood,
                    capacity: 100,
                    step: 0,
                    wait_at_resource: 1,
                    wait_at_depot: 0,
                    harvest_from_outside: true,
                    terrain_harvester: true,
                }],
                ..UnitType::new("unit-archer", 40)
            })
            .expect("register");
        let map = TileMap::from_rows(&["..........", "........TT"], 10).expect("map");
        let mut world = World::new(SimConfig::with_seed(42), map, unit_types);
        world.add_player(Player::new(PlayerId(0), "Red", 0)).expect("player");
        world.add_player(Player::new(PlayerId(1), "Blue", 1)).expect("player");
        let a = world.spawn_unit(archer, PlayerId(0), TilePos::new(0, 0)).expect("spawn");
        let b = world.spawn_unit(archer, PlayerId(1), TilePos::new(6, 0)).expect("spawn");

        let mut types = MissileTypeRegistry::new(DuplicatePolicy::Error);
        let arrow = types.register("missile-arrow").expect("register");
        arrow.class = MissileClass::PointToPoint;
        arrow.speed = 32;
        arrow.width = 8;
        arrow.height = 8;
        let sim = Simulation::new(world, types, SoundTable::new()).expect("simulation");
        (sim, a, b)
    }

    #[test]
    fn test_tick_advances() {
        let (mut sim, _, _) = simulation();
        assert_eq!(sim.get_tick(), 0);
        sim.tick();
        sim.tick();
        assert_eq!(sim.get_tick(), 2);
    }

    #[test]
    fn test_fire_command_hits_target() {
        let (mut sim, a, b) = simulation();
        sim.apply_command(SimCommand::Fire {
            attacker: a,
            target: FireTarget::Unit(b),
        })
        .expect("fire");
        assert_eq!(sim.missiles().len(), 1);
        assert_eq!(sim.world().units.refs(b), 1);

        let mut damage = Vec::new();
        for _ in 0..10 {
            damage.extend(sim.tick().damage_events);
        }
        assert_eq!(damage.len(), 1);
        assert_eq!(damage[0].target, b);
        assert!(sim.missiles().is_empty());
        assert_eq!(sim.world().units.refs(a), 0);
        assert_eq!(sim.world().units.refs(b), 0);
    }

    #[test]
    fn test_same_commands_same_hash() {
        let run = || {
            let (mut sim, a, b) = simulation();
            sim.apply_command(SimCommand::Fire {
                attacker: a,
                target: FireTarget::Unit(b),
            })
            .expect("fire");
            sim.apply_command(SimCommand::HarvestTerrain {
                worker: b,
                tile: TilePos::new(8, 1),
            })
            .expect("harvest");
            for _ in 0..20 {
                sim.tick();
            }
            sim.state_hash()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_serialize_round_trip_keeps_hash() {
        let (mut sim, a, b) = simulation();
        sim.fire_missile(a, FireTarget::Unit(b)).expect("fire");
        sim.tick();
        let bytes = sim.serialize().expect("serialize");
        let mut restored = Simulation::deserialize(&bytes).expect("deserialize");
        assert_eq!(restored.state_hash(), sim.state_hash());
        for _ in 0..10 {
            sim.tick();
            restored.tick();
        }
        assert_eq!(restored.state_hash(), sim.state_hash());
    }

    #[test]
    fn test_bad_command_is_rejected() {
        let (mut sim, a, _) = simulation();
        let result = sim.apply_command(SimCommand::ReturnGoods {
            worker: a,
            depot: None,
        });
        assert!(matches!(result, Err(GameError::CannotHarvest { .. })));
    }
}
