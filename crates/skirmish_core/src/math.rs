//! Integer and fixed-point math for the pixel and tile coordinate spaces.
//!
//! The simulation never touches floating point. Map positions are whole
//! pixels or whole tiles; interpolation along a flight path uses a
//! sub-pixel fixed-point ratio so every client computes the same pixel.

use fixed::types::I22F10;
use serde::{Deserialize, Serialize};
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Sub-pixel fixed-point number (10 fractional bits, 1/1024 pixel precision).
pub type SubPixel = I22F10;

/// Width and height of one map tile in pixels.
pub const PIXEL_TILE_SIZE: i32 = 32;

/// Heading pointing up the map.
pub const HEADING_NORTH: u8 = 0;
/// Heading pointing right.
pub const HEADING_EAST: u8 = 64;
/// Heading pointing down the map.
pub const HEADING_SOUTH: u8 = 128;
/// Heading pointing left.
pub const HEADING_WEST: u8 = 192;

macro_rules! impl_point_ops {
    ($name:ident) => {
        impl Add for $name {
            type Output = Self;

            fn add(self, rhs: Self) -> Self::Output {
                Self::new(self.x + rhs.x, self.y + rhs.y)
            }
        }

        impl Sub for $name {
            type Output = Self;

            fn sub(self, rhs: Self) -> Self::Output {
                Self::new(self.x - rhs.x, self.y - rhs.y)
            }
        }

        impl Mul<i32> for $name {
            type Output = Self;

            fn mul(self, rhs: i32) -> Self::Output {
                Self::new(self.x * rhs, self.y * rhs)
            }
        }

        /// Component-wise integer division, truncating toward zero.
        impl Div<i32> for $name {
            type Output = Self;

            fn div(self, rhs: i32) -> Self::Output {
                Self::new(self.x / rhs, self.y / rhs)
            }
        }

        impl Neg for $name {
            type Output = Self;

            fn neg(self) -> Self::Output {
                Self::new(-self.x, -self.y)
            }
        }
    };
}

/// A position or offset in map pixels.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct PixelPos {
    /// Horizontal coordinate.
    pub x: i32,
    /// Vertical coordinate.
    pub y: i32,
}

impl PixelPos {
    /// The origin.
    pub const ZERO: Self = Self { x: 0, y: 0 };

    /// Create a new pixel position.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Chebyshev (king-move) distance to another pixel.
    #[must_use]
    pub fn chebyshev_distance(self, other: Self) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }

    /// The tile containing this pixel.
    ///
    /// Uses floor division so negative pixels map to negative tiles.
    #[must_use]
    pub const fn to_tile(self) -> TilePos {
        TilePos::new(
            self.x.div_euclid(PIXEL_TILE_SIZE),
            self.y.div_euclid(PIXEL_TILE_SIZE),
        )
    }
}

impl_point_ops!(PixelPos);

/// A position or offset in map tiles.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct TilePos {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl TilePos {
    /// The origin tile.
    pub const ZERO: Self = Self { x: 0, y: 0 };

    /// Create a new tile position.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Chebyshev (king-move) distance to another tile.
    #[must_use]
    pub fn chebyshev_distance(self, other: Self) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }

    /// Chebyshev distance from this tile to the closest tile of an
    /// inclusive rectangle. Zero when the tile lies inside it.
    #[must_use]
    pub fn distance_to_rect(self, min: Self, max: Self) -> i32 {
        let dx = if self.x < min.x {
            min.x - self.x
        } else if self.x > max.x {
            self.x - max.x
        } else {
            0
        };
        let dy = if self.y < min.y {
            min.y - self.y
        } else if self.y > max.y {
            self.y - max.y
        } else {
            0
        };
        dx.max(dy)
    }

    /// Pixel of the tile's top-left corner.
    #[must_use]
    pub const fn to_pixel(self) -> PixelPos {
        PixelPos::new(self.x * PIXEL_TILE_SIZE, self.y * PIXEL_TILE_SIZE)
    }

    /// Pixel at the centre of the tile.
    #[must_use]
    pub const fn to_pixel_center(self) -> PixelPos {
        PixelPos::new(
            self.x * PIXEL_TILE_SIZE + PIXEL_TILE_SIZE / 2,
            self.y * PIXEL_TILE_SIZE + PIXEL_TILE_SIZE / 2,
        )
    }
}

impl_point_ops!(TilePos);

/// Heading (0..=255, clockwise from north) of a direction vector.
///
/// Exact at the eight compass points; linear in between. The zero vector
/// points north.
#[must_use]
pub fn heading_from_delta(dx: i32, dy: i32) -> u8 {
    if dx == 0 && dy == 0 {
        return HEADING_NORTH;
    }
    let ax = i64::from(dx.unsigned_abs());
    let ay = i64::from(dy.unsigned_abs());
    let quarter = i64::from(HEADING_EAST);
    let q = quarter * ax / (ax + ay);
    let heading = match (dx >= 0, dy <= 0) {
        (true, true) => q,
        (true, false) => 2 * quarter - q,
        (false, false) => 2 * quarter + q,
        (false, true) => 4 * quarter - q,
    };
    // 256 wraps to north
    (heading & 0xFF) as u8
}

/// Linear interpolation from `from` toward `to` by `step / total`,
/// computed in sub-pixel precision and floored to whole pixels.
///
/// Returns `to` when `total` is zero or `step >= total`.
#[must_use]
pub fn interpolate(from: PixelPos, to: PixelPos, step: i32, total: i32) -> PixelPos {
    if total <= 0 || step >= total {
        return to;
    }
    let step = SubPixel::from_num(step);
    let total = SubPixel::from_num(total);
    let axis = |a: i32, b: i32| -> i32 {
        let ratio = SubPixel::from_num(b - a) / total;
        a + (ratio * step).to_num::<i32>()
    };
    PixelPos::new(axis(from.x, to.x), axis(from.y, to.y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_to_tile_floors() {
        assert_eq!(PixelPos::new(0, 0).to_tile(), TilePos::new(0, 0));
        assert_eq!(PixelPos::new(31, 63).to_tile(), TilePos::new(0, 1));
        assert_eq!(PixelPos::new(-1, -33).to_tile(), TilePos::new(-1, -2));
    }

    #[test]
    fn test_tile_center() {
        assert_eq!(TilePos::new(2, 3).to_pixel_center(), PixelPos::new(80, 112));
        assert_eq!(TilePos::new(2, 3).to_pixel(), PixelPos::new(64, 96));
    }

    #[test]
    fn test_chebyshev() {
        let a = PixelPos::new(0, 0);
        assert_eq!(a.chebyshev_distance(PixelPos::new(100, -30)), 100);
        assert_eq!(a.chebyshev_distance(PixelPos::new(-3, 40)), 40);
    }

    #[test]
    fn test_distance_to_rect() {
        let min = TilePos::new(5, 5);
        let max = TilePos::new(6, 6);
        assert_eq!(TilePos::new(5, 6).distance_to_rect(min, max), 0);
        assert_eq!(TilePos::new(3, 6).distance_to_rect(min, max), 2);
        assert_eq!(TilePos::new(8, 9).distance_to_rect(min, max), 3);
    }

    #[test]
    fn test_heading_compass_points() {
        assert_eq!(heading_from_delta(0, -5), HEADING_NORTH);
        assert_eq!(heading_from_delta(5, 0), HEADING_EAST);
        assert_eq!(heading_from_delta(0, 5), HEADING_SOUTH);
        assert_eq!(heading_from_delta(-5, 0), HEADING_WEST);
        assert_eq!(heading_from_delta(4, -4), 32);
        assert_eq!(heading_from_delta(-4, -4), 224);
        assert_eq!(heading_from_delta(0, 0), HEADING_NORTH);
    }

    #[test]
    fn test_interpolate_endpoints() {
        let from = PixelPos::new(-16, -16);
        let to = PixelPos::new(84, -16);
        assert_eq!(interpolate(from, to, 0, 100), from);
        assert_eq!(interpolate(from, to, 50, 100), PixelPos::new(34, -16));
        assert_eq!(interpolate(from, to, 100, 100), to);
        assert_eq!(interpolate(from, to, 130, 100), to);
    }

    #[test]
    fn test_interpolate_determinism() {
        let a = interpolate(PixelPos::new(3, 7), PixelPos::new(250, -91), 37, 247);
        let b = interpolate(PixelPos::new(3, 7), PixelPos::new(250, -91), 37, 247);
        assert_eq!(a, b);
    }
}
