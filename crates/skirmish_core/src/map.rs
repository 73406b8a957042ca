//! Tile map: base terrain, harvestable forest and destructible walls.

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::math::TilePos;
use crate::player::ResourceKind;

/// Base terrain of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Terrain {
    /// Passable ground.
    #[default]
    Open,
    /// Harvestable, impassable forest.
    Forest,
    /// Impassable water.
    Water,
    /// Impassable rock.
    Rock,
}

/// Wall faction, selecting the armor used against missile hits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WallKind {
    /// Human wall segment.
    Human,
    /// Orc wall segment.
    Orc,
}

/// A wall segment standing on a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wall {
    /// Wall faction.
    pub kind: WallKind,
    /// Remaining hit points.
    pub hp: i32,
}

/// One map tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Tile {
    /// Base terrain.
    pub terrain: Terrain,
    /// Wall standing on the tile, if any.
    pub wall: Option<Wall>,
}

/// Result of damaging a wall tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WallHit {
    /// No wall on the tile.
    NoWall,
    /// Wall survived with the given hit points.
    Damaged(i32),
    /// Wall was destroyed and the tile is now open.
    Destroyed,
}

/// Rectangular tile map stored in row-major order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileMap {
    width: i32,
    height: i32,
    tiles: Vec<Tile>,
}

impl TileMap {
    /// Create an all-open map.
    ///
    /// # Panics
    ///
    /// Panics if width or height is not positive.
    #[must_use]
    pub fn new(width: i32, height: i32) -> Self {
        assert!(width > 0, "Map width must be positive");
        assert!(height > 0, "Map height must be positive");
        Self {
            width,
            height,
            tiles: vec![Tile::default(); (width * height) as usize],
        }
    }

    /// Parse a map from text rows.
    ///
    /// `.` open, `T` forest, `~` water, `#` rock, `H` human wall and
    /// `O` orc wall. Walls start with `wall_hp` hit points.
    pub fn from_rows<S: AsRef<str>>(rows: &[S], wall_hp: i32) -> Result<Self> {
        let height = rows.len();
        let width = rows.first().map_or(0, |r| r.as_ref().chars().count());
        if width == 0 || height == 0 {
            return Err(GameError::InvalidConfig("map has no tiles".into()));
        }
        let mut map = Self::new(width as i32, height as i32);
        for (y, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.chars().count() != width {
                return Err(GameError::InvalidConfig(format!(
                    "map row {y} has {} tiles, expected {width}",
                    row.chars().count()
                )));
            }
            for (x, c) in row.chars().enumerate() {
                let tile = match c {
                    '.' => Tile::default(),
                    'T' => Tile {
                        terrain: Terrain::Forest,
                        wall: None,
                    },
                    '~' => Tile {
                        terrain: Terrain::Water,
                        wall: None,
                    },
                    '#' => Tile {
                        terrain: Terrain::Rock,
                        wall: None,
                    },
                    'H' | 'O' => Tile {
                        terrain: Terrain::Open,
                        wall: Some(Wall {
                            kind: if c == 'H' {
                                WallKind::Human
                            } else {
                                WallKind::Orc
                            },
                            hp: wall_hp,
                        }),
                    },
                    other => {
                        return Err(GameError::InvalidConfig(format!(
                            "unknown map glyph '{other}' at ({x}, {y})"
                        )))
                    }
                };
                map.tiles[y * width + x] = tile;
            }
        }
        Ok(map)
    }

    /// Map width in tiles.
    #[must_use]
    pub const fn width(&self) -> i32 {
        self.width
    }

    /// Map height in tiles.
    #[must_use]
    pub const fn height(&self) -> i32 {
        self.height
    }

    /// True when the tile lies on the map.
    #[must_use]
    pub const fn is_on_map(&self, pos: TilePos) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width && pos.y < self.height
    }

    /// Clamp a tile position onto the map.
    #[must_use]
    pub fn clamp(&self, pos: TilePos) -> TilePos {
        TilePos::new(pos.x.clamp(0, self.width - 1), pos.y.clamp(0, self.height - 1))
    }

    fn index(&self, pos: TilePos) -> Option<usize> {
        self.is_on_map(pos)
            .then(|| (pos.y * self.width + pos.x) as usize)
    }

    /// Tile at a position.
    #[must_use]
    pub fn tile(&self, pos: TilePos) -> Option<&Tile> {
        self.index(pos).map(|i| &self.tiles[i])
    }

    /// Set the base terrain of a tile. Off-map positions are ignored.
    pub fn set_terrain(&mut self, pos: TilePos, terrain: Terrain) {
        if let Some(i) = self.index(pos) {
            self.tiles[i].terrain = terrain;
        }
    }

    /// Place a wall on a tile. Off-map positions are ignored.
    pub fn place_wall(&mut self, pos: TilePos, kind: WallKind, hp: i32) {
        if let Some(i) = self.index(pos) {
            self.tiles[i].wall = Some(Wall { kind, hp });
        }
    }

    /// Wall standing on the tile, if any.
    #[must_use]
    pub fn wall_at(&self, pos: TilePos) -> Option<Wall> {
        self.tile(pos).and_then(|t| t.wall)
    }

    /// Apply damage to the wall on a tile.
    pub fn hit_wall(&mut self, pos: TilePos, damage: i32) -> WallHit {
        let Some(i) = self.index(pos) else {
            return WallHit::NoWall;
        };
        let tile = &mut self.tiles[i];
        let Some(wall) = tile.wall.as_mut() else {
            return WallHit::NoWall;
        };
        wall.hp -= damage.max(0);
        if wall.hp <= 0 {
            tile.wall = None;
            WallHit::Destroyed
        } else {
            WallHit::Damaged(wall.hp)
        }
    }

    /// True when the tile is forest.
    #[must_use]
    pub fn is_forest(&self, pos: TilePos) -> bool {
        self.tile(pos).is_some_and(|t| t.terrain == Terrain::Forest)
    }

    /// Terrain resource harvestable at a tile.
    #[must_use]
    pub fn terrain_resource(&self, pos: TilePos) -> Option<ResourceKind> {
        self.is_forest(pos).then_some(ResourceKind::Wood)
    }

    /// Turn a forest tile into open ground. Returns false if it was not forest.
    pub fn clear_forest(&mut self, pos: TilePos) -> bool {
        match self.index(pos) {
            Some(i) if self.tiles[i].terrain == Terrain::Forest => {
                self.tiles[i].terrain = Terrain::Open;
                true
            }
            _ => false,
        }
    }

    /// True when ground units may stand on the tile.
    #[must_use]
    pub fn is_passable(&self, pos: TilePos) -> bool {
        self.tile(pos)
            .is_some_and(|t| t.terrain == Terrain::Open && t.wall.is_none())
    }

    /// Number of forest tiles left.
    #[must_use]
    pub fn forest_count(&self) -> usize {
        self.tiles
            .iter()
            .filter(|t| t.terrain == Terrain::Forest)
            .count()
    }
}
