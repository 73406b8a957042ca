//! Unit instances and the generational unit registry.
//!
//! Units are addressed by [`UnitHandle`]: a slot index plus the slot's
//! generation. A slot is recycled only after its unit is destroyed *and*
//! every claim on it has been released, so a claimed handle keeps
//! resolving to the same (possibly destroyed) unit. Unclaimed handles to
//! recycled slots resolve to nothing.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::harvest::ResourceOrder;
use crate::math::{PixelPos, TilePos, PIXEL_TILE_SIZE};
use crate::player::{PlayerId, ResourceKind};
use crate::unit_type::UnitTypeId;

/// Generational reference to a unit.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct UnitHandle {
    index: u32,
    generation: u32,
}

impl UnitHandle {
    /// Slot index.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Slot generation.
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for UnitHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// Harvest bookkeeping on a resource site.
///
/// `workers` lists every worker assigned to the site in assignment order;
/// `active` counts those currently extracting. `active` never exceeds the
/// number of assigned workers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MineState {
    /// Assigned workers, oldest first.
    pub workers: Vec<UnitHandle>,
    /// Workers currently extracting.
    pub active: u32,
}

impl MineState {
    /// Number of assigned workers.
    #[must_use]
    pub fn assigned(&self) -> u32 {
        u32::try_from(self.workers.len()).unwrap_or(u32::MAX)
    }

    /// True when the worker is assigned here.
    #[must_use]
    pub fn is_assigned(&self, worker: UnitHandle) -> bool {
        self.workers.contains(&worker)
    }
}

/// The order a unit is currently executing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitOrder {
    /// Nothing to do.
    #[default]
    Idle,
    /// Gathering and returning resources.
    Resource(Box<ResourceOrder>),
}

impl UnitOrder {
    /// The resource order, if that is what the unit is doing.
    #[must_use]
    pub fn as_resource(&self) -> Option<&ResourceOrder> {
        match self {
            Self::Resource(order) => Some(order),
            Self::Idle => None,
        }
    }

    /// Mutable access to the resource order.
    pub fn as_resource_mut(&mut self) -> Option<&mut ResourceOrder> {
        match self {
            Self::Resource(order) => Some(order),
            Self::Idle => None,
        }
    }
}

/// A unit instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    /// This unit's handle.
    pub handle: UnitHandle,
    /// Unit type.
    pub type_id: UnitTypeId,
    /// Owner.
    pub player: PlayerId,
    /// Top-left tile of the footprint.
    pub tile_pos: TilePos,
    /// Footprint width in tiles.
    pub tile_width: i32,
    /// Footprint height in tiles.
    pub tile_height: i32,
    /// Current hit points.
    pub hp: i32,
    /// Maximum hit points.
    pub max_hp: i32,
    /// Outgoing damage doubled.
    pub bloodlust: bool,
    /// Dead or dying; kept in the registry while claimed.
    pub destroyed: bool,
    /// Building not yet finished.
    pub under_construction: bool,
    /// A fire missile is attached.
    pub burning: bool,
    /// Facing, 0..=255 clockwise from north.
    pub heading: u8,
    /// Ticks to skip before the order runs again.
    pub wait: i32,
    /// Move steps taken toward the current goal.
    pub path_cycles: u32,
    /// Unit carrying this one; a contained unit is off the map.
    pub container: Option<UnitHandle>,
    /// Units carried by this one.
    pub inside: Vec<UnitHandle>,
    /// Resource kind being carried or harvested.
    pub current_resource: Option<ResourceKind>,
    /// Carried load, or remaining stock for resource sites.
    pub resources_held: i32,
    /// Harvest bookkeeping when this unit is a resource site.
    pub mine: MineState,
    /// Current order.
    pub order: UnitOrder,
}

impl Unit {
    /// Bottom-right tile of the footprint.
    #[must_use]
    pub const fn tile_max(&self) -> TilePos {
        TilePos::new(
            self.tile_pos.x + self.tile_width - 1,
            self.tile_pos.y + self.tile_height - 1,
        )
    }

    /// Pixel at the footprint centre.
    #[must_use]
    pub const fn center_pixel(&self) -> PixelPos {
        PixelPos::new(
            self.tile_pos.x * PIXEL_TILE_SIZE + self.tile_width * PIXEL_TILE_SIZE / 2,
            self.tile_pos.y * PIXEL_TILE_SIZE + self.tile_height * PIXEL_TILE_SIZE / 2,
        )
    }

    /// True when the unit is inside another unit.
    #[must_use]
    pub const fn is_contained(&self) -> bool {
        self.container.is_some()
    }

    /// Alive and on the map, so it can be targeted or harvested.
    #[must_use]
    pub const fn is_visible_as_goal(&self) -> bool {
        !self.destroyed && self.container.is_none()
    }

    /// Chebyshev tile distance from the footprint to a tile.
    #[must_use]
    pub fn distance_to_tile(&self, pos: TilePos) -> i32 {
        pos.distance_to_rect(self.tile_pos, self.tile_max())
    }

    /// Chebyshev tile distance between two footprints.
    #[must_use]
    pub fn distance_to_unit(&self, other: &Self) -> i32 {
        let dx = (other.tile_pos.x - self.tile_max().x)
            .max(self.tile_pos.x - other.tile_max().x)
            .max(0);
        let dy = (other.tile_pos.y - self.tile_max().y)
            .max(self.tile_pos.y - other.tile_max().y)
            .max(0);
        dx.max(dy)
    }

    /// True when the footprint overlaps the inclusive tile rectangle.
    #[must_use]
    pub fn overlaps(&self, min: TilePos, max: TilePos) -> bool {
        let own_max = self.tile_max();
        self.tile_pos.x <= max.x
            && own_max.x >= min.x
            && self.tile_pos.y <= max.y
            && own_max.y >= min.y
    }
}

/// Parameters for placing a new unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitSpawn {
    /// Unit type.
    pub type_id: UnitTypeId,
    /// Owner.
    pub player: PlayerId,
    /// Top-left tile.
    pub tile_pos: TilePos,
    /// Footprint width and height.
    pub size: (i32, i32),
    /// Starting and maximum hit points.
    pub max_hp: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Slot {
    generation: u32,
    refs: u32,
    unit: Option<Unit>,
}

/// Arena of units with generational handles and claim counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitRegistry {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl UnitRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a unit, reusing a recycled slot when one is free.
    pub fn spawn(&mut self, spawn: UnitSpawn) -> UnitHandle {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    refs: 0,
                    unit: None,
                });
                u32::try_from(self.slots.len() - 1).unwrap_or(u32::MAX)
            }
        };
        let slot = &mut self.slots[index as usize];
        let handle = UnitHandle {
            index,
            generation: slot.generation,
        };
        slot.unit = Some(Unit {
            handle,
            type_id: spawn.type_id,
            player: spawn.player,
            tile_pos: spawn.tile_pos,
            tile_width: spawn.size.0,
            tile_height: spawn.size.1,
            hp: spawn.max_hp,
            max_hp: spawn.max_hp,
            bloodlust: false,
            destroyed: false,
            under_construction: false,
            burning: false,
            heading: 0,
            wait: 0,
            path_cycles: 0,
            container: None,
            inside: Vec::new(),
            current_resource: None,
            resources_held: 0,
            mine: MineState::default(),
            order: UnitOrder::Idle,
        });
        handle
    }

    fn slot(&self, handle: UnitHandle) -> Option<&Slot> {
        self.slots
            .get(handle.index as usize)
            .filter(|s| s.generation == handle.generation && s.unit.is_some())
    }

    fn slot_mut(&mut self, handle: UnitHandle) -> Option<&mut Slot> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|s| s.generation == handle.generation && s.unit.is_some())
    }

    /// Unit behind a handle, destroyed units included.
    #[must_use]
    pub fn get(&self, handle: UnitHandle) -> Option<&Unit> {
        self.slot(handle).and_then(|s| s.unit.as_ref())
    }

    /// Mutable unit behind a handle, destroyed units included.
    pub fn get_mut(&mut self, handle: UnitHandle) -> Option<&mut Unit> {
        self.slot_mut(handle).and_then(|s| s.unit.as_mut())
    }

    /// True when the handle resolves to a unit that is not destroyed.
    #[must_use]
    pub fn is_alive(&self, handle: UnitHandle) -> bool {
        self.get(handle).is_some_and(|u| !u.destroyed)
    }

    /// Take a claim on a unit so its slot is not recycled.
    ///
    /// Returns false if the handle does not resolve.
    pub fn claim(&mut self, handle: UnitHandle) -> bool {
        match self.slot_mut(handle) {
            Some(slot) => {
                slot.refs += 1;
                true
            }
            None => false,
        }
    }

    /// Release a claim taken with [`claim`](Self::claim).
    pub fn release(&mut self, handle: UnitHandle) {
        if let Some(slot) = self.slot_mut(handle) {
            debug_assert!(slot.refs > 0, "released unclaimed unit {handle}");
            slot.refs = slot.refs.saturating_sub(1);
        }
    }

    /// Outstanding claims on a unit.
    #[must_use]
    pub fn refs(&self, handle: UnitHandle) -> u32 {
        self.slot(handle).map_or(0, |s| s.refs)
    }

    /// Handles of all units that are not destroyed, in slot order.
    #[must_use]
    pub fn alive_handles(&self) -> Vec<UnitHandle> {
        self.iter().filter(|u| !u.destroyed).map(|u| u.handle).collect()
    }

    /// Iterate every stored unit in slot order, destroyed ones included.
    pub fn iter(&self) -> impl Iterator<Item = &Unit> {
        self.slots.iter().filter_map(|s| s.unit.as_ref())
    }

    /// Living, on-map units whose footprint overlaps the inclusive rectangle.
    #[must_use]
    pub fn units_in_rect(&self, min: TilePos, max: TilePos) -> Vec<UnitHandle> {
        self.iter()
            .filter(|u| u.is_visible_as_goal() && u.overlaps(min, max))
            .map(|u| u.handle)
            .collect()
    }

    /// Recycle slots of destroyed units nobody claims any more.
    ///
    /// Returns the handles that became invalid.
    pub fn collect_garbage(&mut self) -> Vec<UnitHandle> {
        let mut freed = Vec::new();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let dead = slot.unit.as_ref().is_some_and(|u| u.destroyed);
            if dead && slot.refs == 0 {
                if let Some(unit) = slot.unit.take() {
                    freed.push(unit.handle);
                }
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(u32::try_from(index).unwrap_or(u32::MAX));
            }
        }
        freed
    }

    /// Number of stored units, destroyed ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// True when no unit is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn_at(registry: &mut UnitRegistry, x: i32, y: i32, size: i32) -> UnitHandle {
        registry.spawn(UnitSpawn {
            type_id: UnitTypeId(0),
            player: PlayerId(0),
            tile_pos: TilePos::new(x, y),
            size: (size, size),
            max_hp: 10,
        })
    }

    #[test]
    fn test_spawn_and_get() {
        let mut registry = UnitRegistry::new();
        let a = spawn_at(&mut registry, 1, 2, 1);
        let unit = registry.get(a).expect("spawned");
        assert_eq!(unit.tile_pos, TilePos::new(1, 2));
        assert_eq!(unit.hp, 10);
        assert!(registry.is_alive(a));
    }

    #[test]
    fn test_claimed_unit_survives_garbage_collection() {
        let mut registry = UnitRegistry::new();
        let a = spawn_at(&mut registry, 0, 0, 1);
        assert!(registry.claim(a));
        registry.get_mut(a).expect("alive").destroyed = true;
        assert!(registry.collect_garbage().is_empty());
        assert!(registry.get(a).is_some());
        assert!(!registry.is_alive(a));

        registry.release(a);
        assert_eq!(registry.collect_garbage(), vec![a]);
        assert!(registry.get(a).is_none());
    }

    #[test]
    fn test_recycled_slot_gets_new_generation() {
        let mut registry = UnitRegistry::new();
        let a = spawn_at(&mut registry, 0, 0, 1);
        registry.get_mut(a).expect("alive").destroyed = true;
        registry.collect_garbage();
        let b = spawn_at(&mut registry, 3, 3, 1);
        assert_eq!(a.index(), b.index());
        assert_ne!(a.generation(), b.generation());
        assert!(registry.get(a).is_none());
        assert!(!registry.claim(a));
    }

    #[test]
    fn test_units_in_rect() {
        let mut registry = UnitRegistry::new();
        let small = spawn_at(&mut registry, 1, 1, 1);
        let big = spawn_at(&mut registry, 4, 4, 3);
        let far = spawn_at(&mut registry, 20, 20, 1);
        let hits = registry.units_in_rect(TilePos::new(0, 0), TilePos::new(4, 4));
        assert_eq!(hits, vec![small, big]);
        assert!(!hits.contains(&far));
    }

    #[test]
    fn test_footprint_distances() {
        let mut registry = UnitRegistry::new();
        let big = spawn_at(&mut registry, 4, 4, 3);
        let small = spawn_at(&mut registry, 9, 5, 1);
        let big_unit = registry.get(big).expect("alive");
        let small_unit = registry.get(small).expect("alive");
        assert_eq!(big_unit.distance_to_tile(TilePos::new(5, 5)), 0);
        assert_eq!(big_unit.distance_to_tile(TilePos::new(8, 2)), 2);
        assert_eq!(big_unit.distance_to_unit(small_unit), 3);
        assert_eq!(small_unit.distance_to_unit(big_unit), 3);
        assert_eq!(big_unit.center_pixel(), PixelPos::new(176, 176));
    }

    #[test]
    fn test_mine_state_counts() {
        let mut registry = UnitRegistry::new();
        let worker = spawn_at(&mut registry, 0, 0, 1);
        let mut mine = MineState::default();
        assert_eq!(mine.assigned(), 0);
        mine.workers.push(worker);
        assert!(mine.is_assigned(worker));
        assert_eq!(mine.assigned(), 1);
    }
}
