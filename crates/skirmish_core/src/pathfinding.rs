//! Grid-based pathfinding using the A* algorithm.
//!
//! Paths are computed over whole tiles with integer costs and a
//! deterministic tie-breaker, so every client expands nodes in the same
//! order and picks the same path.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use crate::error::{GameError, Result};
use crate::map::TileMap;
use crate::math::TilePos;

/// Cell types for the navigation grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CellType {
    /// Passable ground.
    #[default]
    Walkable,
    /// Impassable terrain, walls and buildings.
    Blocked,
}

impl CellType {
    /// Returns true if this cell is walkable.
    #[must_use]
    pub const fn is_walkable(self) -> bool {
        matches!(self, Self::Walkable)
    }
}

/// Navigation grid for pathfinding, one cell per map tile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavGrid {
    width: i32,
    height: i32,
    cells: Vec<CellType>,
}

impl NavGrid {
    /// Build a grid from the map's passability.
    #[must_use]
    pub fn from_map(map: &TileMap) -> Self {
        let mut cells = Vec::with_capacity((map.width() * map.height()) as usize);
        for y in 0..map.height() {
            for x in 0..map.width() {
                cells.push(if map.is_passable(TilePos::new(x, y)) {
                    CellType::Walkable
                } else {
                    CellType::Blocked
                });
            }
        }
        Self {
            width: map.width(),
            height: map.height(),
            cells,
        }
    }

    /// Grid width in cells.
    #[must_use]
    pub const fn width(&self) -> i32 {
        self.width
    }

    /// Grid height in cells.
    #[must_use]
    pub const fn height(&self) -> i32 {
        self.height
    }

    /// Check if a cell lies within the grid.
    #[must_use]
    pub const fn in_bounds(&self, pos: TilePos) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width && pos.y < self.height
    }

    /// Mark every cell of an inclusive rectangle blocked.
    pub fn block_rect(&mut self, min: TilePos, max: TilePos) {
        for y in min.y..=max.y {
            for x in min.x..=max.x {
                self.set_cell(TilePos::new(x, y), CellType::Blocked);
            }
        }
    }

    /// Set a cell. Out-of-bounds positions are ignored.
    pub fn set_cell(&mut self, pos: TilePos, cell: CellType) {
        if self.in_bounds(pos) {
            let index = (pos.y * self.width + pos.x) as usize;
            self.cells[index] = cell;
        }
    }

    /// Cell at a position, `Blocked` outside the grid.
    #[must_use]
    pub fn cell(&self, pos: TilePos) -> CellType {
        if self.in_bounds(pos) {
            self.cells[(pos.y * self.width + pos.x) as usize]
        } else {
            CellType::Blocked
        }
    }

    /// Check if a cell is walkable.
    #[must_use]
    pub fn is_walkable(&self, pos: TilePos) -> bool {
        self.cell(pos).is_walkable()
    }
}

/// Where a path should end: any tile within `range` of the rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathGoal {
    /// Top-left tile of the goal.
    pub min: TilePos,
    /// Bottom-right tile of the goal.
    pub max: TilePos,
    /// Chebyshev distance from the goal that counts as arrived.
    pub range: i32,
}

impl PathGoal {
    /// A single-tile goal.
    #[must_use]
    pub const fn tile(pos: TilePos, range: i32) -> Self {
        Self {
            min: pos,
            max: pos,
            range,
        }
    }

    /// True when `pos` is close enough to the goal.
    #[must_use]
    pub fn is_reached(&self, pos: TilePos) -> bool {
        pos.distance_to_rect(self.min, self.max) <= self.range
    }

    fn heuristic(&self, pos: TilePos) -> i32 {
        (pos.distance_to_rect(self.min, self.max) - self.range).max(0)
    }
}

/// A node in the A* open set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AStarNode {
    pos: TilePos,
    f_score: i32,
    /// Tie-breaker for deterministic ordering when f_scores are equal.
    tie_breaker: u64,
}

impl Ord for AStarNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; lower f_score means higher priority.
        match other.f_score.cmp(&self.f_score) {
            Ordering::Equal => other.tie_breaker.cmp(&self.tie_breaker),
            ord => ord,
        }
    }
}

impl PartialOrd for AStarNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Direction offsets for 8-directional movement.
const DIRECTIONS: [(i32, i32); 8] = [
    (1, 0),   // East
    (1, 1),   // Southeast
    (0, 1),   // South
    (-1, 1),  // Southwest
    (-1, 0),  // West
    (-1, -1), // Northwest
    (0, -1),  // North
    (1, -1),  // Northeast
];

/// Check if a diagonal move is valid (no corner cutting through blocked cells).
#[inline]
fn is_diagonal_valid(grid: &NavGrid, from: TilePos, dx: i32, dy: i32) -> bool {
    if dx != 0 && dy != 0 {
        grid.is_walkable(TilePos::new(from.x + dx, from.y))
            && grid.is_walkable(TilePos::new(from.x, from.y + dy))
    } else {
        true
    }
}

/// Convert coordinates to a tie-breaker value for deterministic ordering.
#[inline]
fn coords_to_tie_breaker(pos: TilePos) -> u64 {
    (u64::from(pos.y as u32) << 32) | u64::from(pos.x as u32)
}

/// Find a path from `start` to any tile reaching `goal`.
///
/// The start tile may be blocked (a unit standing on its own footprint);
/// every other tile on the path is walkable. The returned path begins with
/// `start` and ends with the first tile that reaches the goal. At most
/// `max_nodes` tiles are expanded.
///
/// # Errors
///
/// Returns `GameError::InvalidState` if the start is outside the grid or
/// no path exists within the node budget.
pub fn find_path(
    grid: &NavGrid,
    start: TilePos,
    goal: PathGoal,
    max_nodes: usize,
) -> Result<Vec<TilePos>> {
    if !grid.in_bounds(start) {
        return Err(GameError::InvalidState("Start position outside grid".into()));
    }
    if goal.is_reached(start) {
        return Ok(vec![start]);
    }

    let mut open_set: BinaryHeap<AStarNode> = BinaryHeap::new();
    let mut came_from: HashMap<TilePos, TilePos> = HashMap::new();
    let mut g_score: HashMap<TilePos, i32> = HashMap::new();
    let mut expanded = 0usize;

    g_score.insert(start, 0);
    open_set.push(AStarNode {
        pos: start,
        f_score: goal.heuristic(start),
        tie_breaker: coords_to_tie_breaker(start),
    });

    while let Some(current) = open_set.pop() {
        if goal.is_reached(current.pos) {
            return Ok(reconstruct_path(&came_from, current.pos));
        }
        expanded += 1;
        if expanded > max_nodes {
            break;
        }

        let current_g = g_score.get(&current.pos).copied().unwrap_or(i32::MAX);
        if current.f_score > current_g.saturating_add(goal.heuristic(current.pos)) {
            // stale heap entry
            continue;
        }

        for &(dx, dy) in &DIRECTIONS {
            let next = TilePos::new(current.pos.x + dx, current.pos.y + dy);
            if !grid.is_walkable(next) || !is_diagonal_valid(grid, current.pos, dx, dy) {
                continue;
            }
            let tentative_g = current_g + 1;
            if tentative_g < g_score.get(&next).copied().unwrap_or(i32::MAX) {
                came_from.insert(next, current.pos);
                g_score.insert(next, tentative_g);
                open_set.push(AStarNode {
                    pos: next,
                    f_score: tentative_g + goal.heuristic(next),
                    tie_breaker: coords_to_tie_breaker(next),
                });
            }
        }
    }

    Err(GameError::InvalidState(format!(
        "No path from ({}, {}) to ({}, {})",
        start.x, start.y, goal.min.x, goal.min.y
    )))
}

/// Reconstruct path from came_from map.
fn reconstruct_path(came_from: &HashMap<TilePos, TilePos>, end: TilePos) -> Vec<TilePos> {
    let mut path = vec![end];
    let mut current = end;
    while let Some(&prev) = came_from.get(&current) {
        path.push(prev);
        current = prev;
    }
    path.reverse();
    path
}
