//! Step-wise unit movement toward a goal.
//!
//! A moving unit advances one tile per call along a freshly searched A*
//! path and then waits `ticks_per_tile - 1` ticks before the next step.

use tracing::trace;

use crate::math::{heading_from_delta, TilePos};
use crate::pathfinding::{find_path, NavGrid, PathGoal};
use crate::unit::UnitHandle;
use crate::world::World;

/// What a unit is moving toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveGoal {
    /// Next to another unit's footprint.
    Unit(UnitHandle),
    /// Next to a map tile.
    Tile(TilePos),
}

/// Result of one movement step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The unit is within range of the goal.
    Reached,
    /// The unit took a step and is still on its way.
    Moving,
    /// No path leads to the goal.
    Unreachable,
}

/// Advance `handle` one step toward `goal`.
pub fn move_unit(world: &mut World, handle: UnitHandle, goal: MoveGoal) -> MoveOutcome {
    let Some(unit) = world.units.get(handle) else {
        return MoveOutcome::Unreachable;
    };
    let start = unit.tile_pos;
    let ticks_per_tile = world.unit_type_of(handle).map_or(1, |t| t.ticks_per_tile.max(1));
    let path_goal = match goal {
        MoveGoal::Unit(target) => match world.units.get(target) {
            Some(t) if !t.destroyed => PathGoal {
                min: t.tile_pos,
                max: t.tile_max(),
                range: 1,
            },
            _ => return MoveOutcome::Unreachable,
        },
        MoveGoal::Tile(pos) => PathGoal::tile(pos, 1),
    };
    if path_goal.is_reached(start) {
        return MoveOutcome::Reached;
    }

    let mut grid = NavGrid::from_map(&world.map);
    for tile in world.blocked_tiles() {
        grid.block_rect(tile, tile);
    }
    let path = match find_path(&grid, start, path_goal, world.config.max_path_nodes) {
        Ok(path) => path,
        Err(err) => {
            trace!(unit = %handle, %err, "path search failed");
            return MoveOutcome::Unreachable;
        }
    };
    let Some(&next) = path.get(1) else {
        return MoveOutcome::Reached;
    };

    if let Some(unit) = world.units.get_mut(handle) {
        let delta = next - start;
        unit.heading = heading_from_delta(delta.x, delta.y);
        unit.tile_pos = next;
        unit.path_cycles += 1;
        unit.wait = ticks_per_tile - 1;
    }
    if path_goal.is_reached(next) {
        MoveOutcome::Reached
    } else {
        MoveOutcome::Moving
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DuplicatePolicy, SimConfig};
    use crate::map::TileMap;
    use crate::player::{Player, PlayerId};
    use crate::unit_type::{UnitType, UnitTypeRegistry};

    fn world(rows: &[&str]) -> (World, UnitHandle) {
        let mut types = UnitTypeRegistry::new(DuplicatePolicy::Error);
        let walker = types
            .register(UnitType {
                ticks_per_tile: 3,
                ..UnitType::new("unit-peasant", 30)
            })
            .expect("register");
        let map = TileMap::from_rows(rows, 10).expect("valid map");
        let mut world = World::new(SimConfig::default(), map, types);
        world.add_player(Player::new(PlayerId(0), "Red", 0)).expect("player");
        let unit = world.spawn_unit(walker, PlayerId(0), TilePos::new(0, 0)).expect("spawn");
        (world, unit)
    }

    #[test]
    fn test_steps_until_adjacent() {
        let (mut world, unit) = world(&["......"]);
        let goal = MoveGoal::Tile(TilePos::new(5, 0));
        assert_eq!(move_unit(&mut world, unit, goal), MoveOutcome::Moving);
        assert_eq!(world.unit(unit).expect("alive").wait, 2);
        assert_eq!(move_unit(&mut world, unit, goal), MoveOutcome::Moving);
        assert_eq!(move_unit(&mut world, unit, goal), MoveOutcome::Moving);
        assert_eq!(move_unit(&mut world, unit, goal), MoveOutcome::Reached);
        let walker = world.unit(unit).expect("alive");
        assert_eq!(walker.tile_pos, TilePos::new(4, 0));
        assert_eq!(walker.path_cycles, 4);
        assert_eq!(move_unit(&mut world, unit, goal), MoveOutcome::Reached);
    }

    #[test]
    fn test_unreachable_goal() {
        let (mut world, unit) = world(&["..#..", "..#..", "..#.."]);
        let goal = MoveGoal::Tile(TilePos::new(4, 1));
        assert_eq!(move_unit(&mut world, unit, goal), MoveOutcome::Unreachable);
        assert_eq!(world.unit(unit).expect("alive").tile_pos, TilePos::new(0, 0));
    }

    #[test]
    fn test_forest_goal_is_reachable_from_side() {
        let (mut world, unit) = world(&["...T"]);
        let goal = MoveGoal::Tile(TilePos::new(3, 0));
        assert_eq!(move_unit(&mut world, unit, goal), MoveOutcome::Moving);
        assert_eq!(move_unit(&mut world, unit, goal), MoveOutcome::Reached);
    }
}
