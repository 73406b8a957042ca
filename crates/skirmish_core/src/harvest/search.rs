//! Searches used by harvesting workers: deposits, resource sites and
//! harvestable terrain.

use std::collections::VecDeque;

use crate::math::TilePos;
use crate::pathfinding::NavGrid;
use crate::player::ResourceKind;
use crate::unit::{Unit, UnitHandle};
use crate::world::World;

/// Flood-fill neighbour order.
const NEIGHBOURS: [(i32, i32); 8] = [
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
];

/// Nearest depot of the worker's owner accepting `kind` within `range`
/// tiles of the worker.
///
/// Depots still under construction count; workers wait at them.
#[must_use]
pub fn find_deposit(
    world: &World,
    worker: UnitHandle,
    range: i32,
    kind: ResourceKind,
) -> Option<UnitHandle> {
    let from = world.units.get(worker)?;
    nearest(world, from, range, |unit| {
        unit.player == from.player
            && world
                .unit_types
                .get(unit.type_id)
                .is_some_and(|t| t.can_store(kind))
    })
}

/// Nearest resource site giving `kind` with stock left, within `range`
/// tiles of `origin`.
///
/// `origin` itself qualifies, so a worker leaving a depot finds its old
/// site again while it has stock. Among equally near sites the one with
/// fewer assigned workers wins.
#[must_use]
pub fn find_resource(
    world: &World,
    origin: UnitHandle,
    range: i32,
    kind: ResourceKind,
) -> Option<UnitHandle> {
    let from = world.units.get(origin)?;
    world
        .units
        .iter()
        .filter(|unit| unit.is_visible_as_goal())
        .filter(|unit| {
            unit.resources_held > 0
                && world
                    .unit_types
                    .get(unit.type_id)
                    .is_some_and(|t| t.gives_resource == Some(kind))
        })
        .map(|unit| (unit.distance_to_unit(from), unit.mine.assigned(), unit.handle))
        .filter(|(distance, _, _)| *distance <= range)
        .min_by_key(|(distance, assigned, _)| (*distance, *assigned))
        .map(|(_, _, handle)| handle)
}

fn nearest(
    world: &World,
    from: &Unit,
    range: i32,
    accept: impl Fn(&Unit) -> bool,
) -> Option<UnitHandle> {
    world
        .units
        .iter()
        .filter(|unit| unit.handle != from.handle && unit.is_visible_as_goal() && accept(unit))
        .map(|unit| (unit.distance_to_unit(from), unit.handle))
        .filter(|(distance, _)| *distance <= range)
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, handle)| handle)
}

/// Harvestable terrain of `kind` reachable from `from` by a flood fill
/// over walkable tiles, at most `range` steps away.
///
/// The start tile itself may be blocked. Neighbours are visited in a fixed
/// order so the result is deterministic.
#[must_use]
pub fn find_terrain_resource(
    world: &World,
    from: TilePos,
    range: i32,
    kind: ResourceKind,
) -> Option<TilePos> {
    let map = &world.map;
    if !map.is_on_map(from) {
        return None;
    }
    let mut grid = NavGrid::from_map(map);
    for tile in world.blocked_tiles() {
        grid.block_rect(tile, tile);
    }
    let width = map.width();
    let index = |p: TilePos| (p.y * width + p.x) as usize;
    let mut seen = vec![false; (map.width() * map.height()) as usize];
    let mut queue = VecDeque::new();
    seen[index(from)] = true;
    queue.push_back((from, 0));

    while let Some((pos, depth)) = queue.pop_front() {
        for (dx, dy) in NEIGHBOURS {
            let next = TilePos::new(pos.x + dx, pos.y + dy);
            if !map.is_on_map(next) || seen[index(next)] {
                continue;
            }
            seen[index(next)] = true;
            if map.terrain_resource(next) == Some(kind) {
                return Some(next);
            }
            if depth < range && grid.is_walkable(next) {
                queue.push_back((next, depth + 1));
            }
        }
    }
    None
}
