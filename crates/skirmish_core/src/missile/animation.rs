//! Sprite frame bookkeeping for missiles.
//!
//! A missile sheet stores `num_directions / 2 + 1` columns (north, turning
//! clockwise to south); westward headings reuse the eastward column
//! mirrored, encoded as a negative frame `-(frame + 1)`. Rows are
//! animation steps.

use crate::math::{heading_from_delta, PixelPos};
use crate::missile::instance::Missile;
use crate::missile::types::MissileType;

/// Columns per animation row.
fn columns(missile_type: &MissileType) -> i32 {
    missile_type.num_directions.max(1) / 2 + 1
}

fn rows(missile_type: &MissileType) -> i32 {
    (missile_type.sprite_frames / columns(missile_type)).max(1)
}

/// Split a frame into (mirrored, column, row).
fn decode(missile: &Missile, missile_type: &MissileType) -> (bool, i32, i32) {
    let mirrored = missile.sprite_frame < 0;
    let frame = if mirrored {
        -missile.sprite_frame - 1
    } else {
        missile.sprite_frame
    };
    let cols = columns(missile_type);
    (mirrored, frame % cols, frame / cols)
}

fn encode(missile: &mut Missile, missile_type: &MissileType, mirrored: bool, col: i32, row: i32) {
    let frame = row * columns(missile_type) + col;
    missile.sprite_frame = if mirrored { -frame - 1 } else { frame };
}

/// Turn the sprite to face along `delta`, keeping the animation row.
pub(crate) fn apply_heading(missile: &mut Missile, missile_type: &MissileType, delta: PixelPos) {
    if missile_type.num_directions <= 1 || delta == PixelPos::ZERO {
        return;
    }
    let (_, _, row) = decode(missile, missile_type);
    let per_direction = (256 / missile_type.num_directions).max(1);
    let heading = i32::from(heading_from_delta(delta.x, delta.y));
    let dir = ((heading + per_direction / 2) & 0xFF) / per_direction;
    let cols = columns(missile_type);
    if dir < cols {
        encode(missile, missile_type, false, dir, row);
    } else {
        let col = (missile_type.num_directions - dir).clamp(0, cols - 1);
        encode(missile, missile_type, true, col, row);
    }
}

/// Step the animation one row forward (`sign > 0`) or backward.
///
/// Returns true when the step wrapped around, i.e. a cycle finished.
pub(crate) fn next_frame(missile: &mut Missile, missile_type: &MissileType, sign: i32) -> bool {
    let (mirrored, col, row) = decode(missile, missile_type);
    let rows = rows(missile_type);
    let (row, finished) = if sign >= 0 {
        if row + 1 >= rows {
            (0, true)
        } else {
            (row + 1, false)
        }
    } else if row <= 0 {
        (rows - 1, true)
    } else {
        (row - 1, false)
    };
    encode(missile, missile_type, mirrored, col, row);
    finished
}

/// Pick the animation row from the share of the leg already covered,
/// running up through the rows and back down once per flight.
pub(crate) fn frame_from_progress(missile: &mut Missile, missile_type: &MissileType) {
    if missile.total_step <= 0 {
        return;
    }
    let (mirrored, col, _) = decode(missile, missile_type);
    let rows = rows(missile_type);
    let steps = 2 * rows - 1;
    let covered = missile.current_step.clamp(0, missile.total_step);
    let index = (covered * steps / missile.total_step).min(steps - 1);
    let row = if index < rows { index } else { steps - 1 - index };
    encode(missile, missile_type, mirrored, col, row);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(frames: i32, directions: i32) -> MissileType {
        MissileType {
            sprite_frames: frames,
            num_directions: directions,
            ..MissileType::new("missile-test")
        }
    }

    fn missile(t: &MissileType) -> Missile {
        Missile::new(t, PixelPos::ZERO, PixelPos::ZERO)
    }

    #[test]
    fn test_heading_columns_and_mirroring() {
        let t = sheet(15, 8);
        let mut m = missile(&t);
        apply_heading(&mut m, &t, PixelPos::new(0, -10));
        assert_eq!(m.sprite_frame, 0);
        apply_heading(&mut m, &t, PixelPos::new(10, 0));
        assert_eq!(m.sprite_frame, 2);
        apply_heading(&mut m, &t, PixelPos::new(0, 10));
        assert_eq!(m.sprite_frame, 4);
        // west mirrors east
        apply_heading(&mut m, &t, PixelPos::new(-10, 0));
        assert_eq!(m.sprite_frame, -3);
    }

    #[test]
    fn test_next_frame_wraps() {
        let t = sheet(15, 8);
        let mut m = missile(&t);
        apply_heading(&mut m, &t, PixelPos::new(-10, 0));
        assert!(!next_frame(&mut m, &t, 1));
        assert_eq!(m.sprite_frame, -(5 + 2) - 1);
        assert!(!next_frame(&mut m, &t, 1));
        assert!(next_frame(&mut m, &t, 1));
        assert_eq!(m.sprite_frame, -3);
        assert!(next_frame(&mut m, &t, -1));
        assert_eq!(m.sprite_frame, -(10 + 2) - 1);
    }

    #[test]
    fn test_single_frame_finishes_every_step() {
        let t = sheet(1, 1);
        let mut m = missile(&t);
        assert!(next_frame(&mut m, &t, 1));
        assert!(next_frame(&mut m, &t, 1));
        assert_eq!(m.sprite_frame, 0);
    }

    #[test]
    fn test_frame_from_progress_rises_and_falls() {
        let t = sheet(3, 1);
        let mut m = missile(&t);
        m.total_step = 100;
        let mut seen = Vec::new();
        for step in [0, 20, 40, 60, 80, 99] {
            m.current_step = step;
            frame_from_progress(&mut m, &t);
            seen.push(m.sprite_frame);
        }
        assert_eq!(seen, vec![0, 1, 2, 1, 0, 0]);
    }
}
