//! Impact resolution: sounds, impact missiles, splash damage and walls.

use tracing::warn;

use crate::events::{ParticleEvent, SoundEvent};
use crate::math::{PixelPos, TilePos};
use crate::missile::instance::Missile;
use crate::missile::types::MissileType;
use crate::missile::MissileContext;
use crate::unit::UnitHandle;

/// Damage divisor for a goal `distance` tiles from the impact.
///
/// Never below 1, so the impact tile always takes full damage.
#[must_use]
pub const fn splash_divisor(distance: i32, splash_factor: i32) -> i32 {
    let divisor = distance * splash_factor;
    if divisor < 1 {
        1
    } else {
        divisor
    }
}

/// Sound, impact missile and particle effect at the missile's centre.
/// Returns the centre.
pub(crate) fn impact_feedback(
    missile: &Missile,
    missile_type: &MissileType,
    ctx: &mut MissileContext<'_>,
) -> PixelPos {
    let center = missile.center(missile_type);
    if let Some(sound) = missile_type.impact_sound_id {
        ctx.world.events.sounds.push(SoundEvent { sound, at: center });
    }
    if let Some(impact) = missile_type.impact {
        ctx.spawn(impact, center, center, missile.local);
    }
    if let Some(effect) = &missile_type.impact_particle {
        ctx.world.events.particles.push(ParticleEvent {
            effect: effect.clone(),
            at: center,
        });
    }
    center
}

/// Resolve a missile's impact.
pub(crate) fn resolve_hit(
    missile: &mut Missile,
    missile_type: &MissileType,
    ctx: &mut MissileContext<'_>,
) {
    let center = impact_feedback(missile, missile_type, ctx);
    if missile.local {
        return;
    }
    let Some(source) = missile.source_unit else {
        return;
    };
    let tile = center.to_tile();
    if !ctx.world.map.is_on_map(tile) {
        warn!(slot = missile.slot, x = center.x, y = center.y, "missile hit off the map");
        return;
    }

    if missile_type.range == 0 {
        match missile.target_unit {
            Some(target) if !ctx.world.units.is_alive(target) => {
                ctx.world.units.release(target);
                missile.target_unit = None;
            }
            Some(target) => missile_hits_goal(missile, missile_type, Some(source), target, 1, ctx),
            None => ctx.world.hit_wall(source, tile, 1),
        }
        return;
    }

    let range = missile_type.range;
    let min = TilePos::new(tile.x - range + 1, tile.y - range + 1);
    let max = TilePos::new(tile.x + range, tile.y + range);
    let goals: Vec<(UnitHandle, i32)> = ctx
        .world
        .units_in_rect(min, max)
        .into_iter()
        .filter_map(|goal| {
            let source_type = ctx.world.unit_type_of(source)?;
            let goal_type = ctx.world.unit_type_of(goal)?;
            if !source_type.can_target(goal_type) {
                return None;
            }
            let distance = ctx.world.units.get(goal)?.distance_to_tile(tile);
            Some((goal, splash_divisor(distance, missile_type.splash_factor)))
        })
        .collect();
    for (goal, splash) in goals {
        missile_hits_goal(missile, missile_type, Some(source), goal, splash, ctx);
    }

    for y in min.y..=max.y {
        for x in min.x..=max.x {
            let pos = TilePos::new(x, y);
            if ctx.world.map.is_on_map(pos) {
                let splash = splash_divisor(pos.chebyshev_distance(tile), missile_type.splash_factor);
                ctx.world.hit_wall(source, pos, splash);
            }
        }
    }
}

/// Damage one goal, divided by `splash`.
///
/// The missile's fixed damage wins when non-zero; otherwise the damage
/// formula runs for the source against the goal.
pub(crate) fn missile_hits_goal(
    missile: &Missile,
    missile_type: &MissileType,
    source: Option<UnitHandle>,
    goal: UnitHandle,
    splash: i32,
    ctx: &mut MissileContext<'_>,
) {
    if !missile_type.can_hit_owner && missile.source_unit == Some(goal) {
        return;
    }
    if !ctx.world.units.is_alive(goal) {
        return;
    }
    let splash = splash.max(1);
    let damage = if missile.damage != 0 {
        missile.damage / splash
    } else if let Some(source) = source {
        ctx.world.calculate_damage(source, goal) / splash
    } else {
        0
    };
    ctx.world.hit_unit(source, goal, damage.max(0));
}

/// Damage every unit covering `tile`.
pub(crate) fn damage_tile_occupants(
    missile: &Missile,
    missile_type: &MissileType,
    tile: TilePos,
    ctx: &mut MissileContext<'_>,
) {
    for goal in ctx.world.units_in_rect(tile, tile) {
        missile_hits_goal(missile, missile_type, missile.source_unit, goal, 1, ctx);
    }
}
