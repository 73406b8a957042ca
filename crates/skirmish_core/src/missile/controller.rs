//! Per-class missile behaviour.
//!
//! [`run`] is invoked by the action loop whenever a missile's wait runs
//! out. Each controller resets `wait` for its next invocation and sets
//! `ttl = 0` when the missile is done.

use tracing::{trace, warn};

use crate::math::{interpolate, PixelPos, TilePos};
use crate::missile::animation;
use crate::missile::hit;
use crate::missile::instance::Missile;
use crate::missile::types::{MissileClass, MissileType};
use crate::missile::MissileContext;
use crate::unit::UnitHandle;

/// Orbit offsets of a flame shield, 10 degrees apart on a 32 pixel radius.
const FLAME_SHIELD_ORBIT: [(i32, i32); 36] = [
    (32, 0), (32, 6), (30, 11), (28, 16), (25, 21), (21, 25),
    (16, 28), (11, 30), (6, 32), (0, 32), (-6, 32), (-11, 30),
    (-16, 28), (-21, 25), (-25, 21), (-28, 16), (-30, 11), (-32, 6),
    (-32, 0), (-32, -6), (-30, -11), (-28, -16), (-25, -21), (-21, -25),
    (-16, -28), (-11, -30), (-6, -32), (0, -32), (6, -32), (11, -30),
    (16, -28), (21, -25), (25, -21), (28, -16), (30, -11), (32, -6),
];

/// Ticks between flame shield damage pulses.
const FLAME_SHIELD_PULSE_TICKS: u64 = 8;
/// Ticks between whirlwind damage pulses.
const WHIRLWIND_PULSE_TICKS: u64 = 3;
/// Ticks between whirlwind course changes.
const WHIRLWIND_RETARGET_TICKS: u64 = 100;
/// How far a whirlwind may wander per course change, in tiles.
const WHIRLWIND_WANDER_TILES: i32 = 2;
/// Length of a bounce in pixels.
const PIXEL_BOUNCE: i32 = 48;
/// Radius of a death coil's area drain, in tiles.
const DEATH_COIL_RADIUS: i32 = 2;

/// Arc constants of parabolic missiles.
const PARABOLA_K: i32 = -2048;
const PARABOLA_Z_TO_X: i32 = 4;
const PARABOLA_Z_TO_Y: i32 = 1024;

/// Run the missile's class controller once.
pub(crate) fn run(missile: &mut Missile, ctx: &mut MissileContext<'_>) {
    let types = ctx.types;
    let Some(missile_type) = types.get(missile.type_id) else {
        warn!(slot = missile.slot, type_id = missile.type_id.0, "missile has no type");
        missile.ttl = 0;
        return;
    };
    match missile_type.class {
        MissileClass::None => missile.wait = missile_type.sleep,
        MissileClass::PointToPoint => point_to_point(missile, missile_type, ctx),
        MissileClass::PointToPointWithHit => point_to_point_with_hit(missile, missile_type, ctx),
        MissileClass::PointToPointCycleOnce => {
            point_to_point_cycle_once(missile, missile_type, ctx);
        }
        MissileClass::PointToPointBounce => point_to_point_bounce(missile, missile_type, ctx),
        MissileClass::Stay => stay(missile, missile_type, ctx),
        MissileClass::CycleOnce => cycle_once(missile, missile_type, ctx),
        MissileClass::Fire => fire(missile, missile_type, ctx),
        MissileClass::Hit => hit_class(missile, missile_type, ctx),
        MissileClass::Parabolic => parabolic(missile, missile_type, ctx),
        MissileClass::LandMine => land_mine(missile, missile_type, ctx),
        MissileClass::Whirlwind => whirlwind(missile, missile_type, ctx),
        MissileClass::FlameShield => flame_shield(missile, missile_type, ctx),
        MissileClass::DeathCoil => death_coil(missile, missile_type, ctx),
    }
}

/// Start a new flight leg when the state is even.
///
/// Returns true when the missile already sits on its destination.
fn init_move(missile: &mut Missile, missile_type: &MissileType) -> bool {
    if missile.state % 2 != 0 {
        return false;
    }
    missile.current_step = 0;
    missile.total_step = 0;
    let delta = missile.destination - missile.position;
    if delta == PixelPos::ZERO {
        return true;
    }
    animation::apply_heading(missile, missile_type, delta);
    missile.total_step = missile.source.chebyshev_distance(missile.destination);
    missile.state += 1;
    false
}

/// Advance `speed` pixels along the current leg. True on arrival.
fn point_to_point_step(
    missile: &mut Missile,
    missile_type: &MissileType,
    ctx: &mut MissileContext<'_>,
) -> bool {
    if init_move(missile, missile_type) {
        return true;
    }
    missile.current_step += missile_type.speed;
    if missile.total_step <= 0 || missile.current_step >= missile.total_step {
        missile.position = missile.destination;
        return true;
    }
    missile.position = interpolate(
        missile.source,
        missile.destination,
        missile.current_step,
        missile.total_step,
    );
    spawn_smoke(missile, missile_type, ctx);
    false
}

fn spawn_smoke(missile: &Missile, missile_type: &MissileType, ctx: &mut MissileContext<'_>) {
    if let Some(smoke) = missile_type.smoke {
        if missile.current_step > 0 {
            let center = missile.center(missile_type);
            ctx.spawn(smoke, center, center, missile.local);
        }
    }
}

fn finish_with_hit(missile: &mut Missile, missile_type: &MissileType, ctx: &mut MissileContext<'_>) {
    hit::resolve_hit(missile, missile_type, ctx);
    missile.ttl = 0;
}

fn point_to_point(missile: &mut Missile, missile_type: &MissileType, ctx: &mut MissileContext<'_>) {
    missile.wait = missile_type.sleep;
    if point_to_point_step(missile, missile_type, ctx) {
        finish_with_hit(missile, missile_type, ctx);
    } else {
        animation::next_frame(missile, missile_type, 1);
    }
}

fn point_to_point_with_hit(
    missile: &mut Missile,
    missile_type: &MissileType,
    ctx: &mut MissileContext<'_>,
) {
    missile.wait = missile_type.sleep;
    if point_to_point_step(missile, missile_type, ctx)
        && animation::next_frame(missile, missile_type, 1)
    {
        finish_with_hit(missile, missile_type, ctx);
    }
}

fn point_to_point_cycle_once(
    missile: &mut Missile,
    missile_type: &MissileType,
    ctx: &mut MissileContext<'_>,
) {
    missile.wait = missile_type.sleep;
    if point_to_point_step(missile, missile_type, ctx) {
        finish_with_hit(missile, missile_type, ctx);
    } else {
        animation::frame_from_progress(missile, missile_type);
    }
}

fn point_to_point_bounce(
    missile: &mut Missile,
    missile_type: &MissileType,
    ctx: &mut MissileContext<'_>,
) {
    missile.wait = missile_type.sleep;
    if !point_to_point_step(missile, missile_type, ctx) {
        animation::next_frame(missile, missile_type, 1);
        return;
    }
    if missile.state < 2 * missile_type.num_bounces - 1 && missile.total_step > 0 {
        let leg = missile.destination - missile.source;
        missile.destination = missile.destination + leg * PIXEL_BOUNCE / missile.total_step;
        missile.state += 1;
        missile.source = missile.position;
        trace!(slot = missile.slot, state = missile.state, "missile bounced");
        point_to_point_step(missile, missile_type, ctx);
        hit::resolve_hit(missile, missile_type, ctx);
    } else {
        finish_with_hit(missile, missile_type, ctx);
    }
}

fn stay(missile: &mut Missile, missile_type: &MissileType, ctx: &mut MissileContext<'_>) {
    missile.wait = missile_type.sleep;
    if animation::next_frame(missile, missile_type, 1) {
        finish_with_hit(missile, missile_type, ctx);
    }
}

fn cycle_once(missile: &mut Missile, missile_type: &MissileType, ctx: &mut MissileContext<'_>) {
    missile.wait = missile_type.sleep;
    match missile.state {
        0 | 2 => missile.state += 1,
        1 => {
            if animation::next_frame(missile, missile_type, 1) {
                missile.state += 1;
            }
        }
        3 => {
            if animation::next_frame(missile, missile_type, -1) {
                finish_with_hit(missile, missile_type, ctx);
            }
        }
        _ => missile.ttl = 0,
    }
}

fn hit_class(missile: &mut Missile, missile_type: &MissileType, ctx: &mut MissileContext<'_>) {
    missile.wait = missile_type.sleep;
    if point_to_point_step(missile, missile_type, ctx) {
        finish_with_hit(missile, missile_type, ctx);
    }
}

fn fire(missile: &mut Missile, missile_type: &MissileType, ctx: &mut MissileContext<'_>) {
    missile.wait = missile_type.sleep;
    let Some(source) = missile.source_unit else {
        missile.ttl = 0;
        return;
    };
    if !ctx.world.units.is_alive(source) {
        if let Some(unit) = ctx.world.units.get_mut(source) {
            unit.burning = false;
        }
        missile.ttl = 0;
        return;
    }
    if !animation::next_frame(missile, missile_type, 1) {
        return;
    }
    missile.sprite_frame = 0;

    let percent = ctx
        .world
        .units
        .get(source)
        .map_or(0, |u| u.hp * 100 / u.max_hp.max(1));
    let types = ctx.types;
    match types.burning_missile(percent) {
        None => {
            if let Some(unit) = ctx.world.units.get_mut(source) {
                unit.burning = false;
            }
            trace!(unit = %source, percent, "fire went out");
            missile.ttl = 0;
        }
        Some(next) if next != missile.type_id => {
            if let Some(next_type) = types.get(next) {
                let center = missile.center(missile_type);
                missile.type_id = next;
                missile.position = center - next_type.half_size();
                trace!(unit = %source, percent, fire = %next_type.ident, "fire changed");
            }
        }
        Some(_) => {}
    }
}

fn parabolic(missile: &mut Missile, missile_type: &MissileType, ctx: &mut MissileContext<'_>) {
    missile.wait = missile_type.sleep;
    if init_move(missile, missile_type) {
        finish_with_hit(missile, missile_type, ctx);
        return;
    }
    missile.current_step += missile_type.speed;
    if missile.total_step <= 0 || missile.current_step >= missile.total_step {
        missile.position = missile.destination;
        finish_with_hit(missile, missile_type, ctx);
        return;
    }
    let ground = interpolate(
        missile.source,
        missile.destination,
        missile.current_step,
        missile.total_step,
    );
    let z = missile.current_step * (missile.total_step - missile.current_step) / PARABOLA_K;
    missile.position = ground + PixelPos::new(z * PARABOLA_Z_TO_X / 64, z * PARABOLA_Z_TO_Y / 64);
    spawn_smoke(missile, missile_type, ctx);
    animation::frame_from_progress(missile, missile_type);
}

fn land_mine(missile: &mut Missile, missile_type: &MissileType, ctx: &mut MissileContext<'_>) {
    let tile = missile.center(missile_type).to_tile();
    let triggered = ctx.world.units_in_rect(tile, tile).into_iter().any(|h| {
        (missile_type.can_hit_owner || missile.source_unit != Some(h))
            && !ctx.world.unit_type_of(h).is_some_and(|t| t.is_flying())
    });
    if triggered {
        trace!(slot = missile.slot, ?tile, "land mine triggered");
        finish_with_hit(missile, missile_type, ctx);
        return;
    }
    if missile.anim_wait == 0 {
        animation::next_frame(missile, missile_type, 1);
        missile.anim_wait = missile_type.sleep;
    } else {
        missile.anim_wait -= 1;
    }
    missile.wait = 1;
}

/// Clock for periodic effects: the remaining lifetime when limited,
/// else the world tick.
fn pulse_clock(missile: &Missile, ctx: &MissileContext<'_>) -> u64 {
    u64::try_from(missile.ttl).unwrap_or(ctx.world.tick)
}

fn whirlwind(missile: &mut Missile, missile_type: &MissileType, ctx: &mut MissileContext<'_>) {
    if missile.anim_wait == 0 {
        if animation::next_frame(missile, missile_type, 1) {
            point_to_point_step(missile, missile_type, ctx);
        }
        missile.anim_wait = missile_type.sleep;
    } else {
        missile.anim_wait -= 1;
    }
    missile.wait = 1;

    let clock = pulse_clock(missile, ctx);
    let tile = missile.center(missile_type).to_tile();
    if clock % WHIRLWIND_PULSE_TICKS == 0 {
        hit::damage_tile_occupants(missile, missile_type, tile, ctx);
    }
    if clock % WHIRLWIND_RETARGET_TICKS == 0 {
        let span = 2 * WHIRLWIND_WANDER_TILES + 1;
        let dx = ctx.world.rng.below(span) - WHIRLWIND_WANDER_TILES;
        let dy = ctx.world.rng.below(span) - WHIRLWIND_WANDER_TILES;
        let next = ctx.world.map.clamp(TilePos::new(tile.x + dx, tile.y + dy));
        missile.destination = next.to_pixel_center() - missile_type.half_size();
        missile.source = missile.position;
        missile.state = 0;
        trace!(slot = missile.slot, ?next, "whirlwind changes course");
    }
}

fn flame_shield(missile: &mut Missile, missile_type: &MissileType, ctx: &mut MissileContext<'_>) {
    missile.wait = missile_type.sleep;
    let Some(target) = missile.target_unit else {
        missile.ttl = 0;
        return;
    };
    let index = missile.ttl.rem_euclid(36);
    let top = ctx.world.topmost_container(target);
    let (Some(carrier), Some(unit)) = (ctx.world.units.get(top), ctx.world.units.get(target)) else {
        missile.ttl = 0;
        return;
    };
    let center = carrier.center_pixel();
    let contained = unit.is_contained();
    let dead = unit.destroyed || carrier.destroyed;
    let (min, max) = (unit.tile_pos, unit.tile_max());

    let (dx, dy) = FLAME_SHIELD_ORBIT[index as usize];
    missile.position = center + PixelPos::new(dx, dy) - missile_type.half_size();
    missile.hidden = contained;
    animation::next_frame(missile, missile_type, 1);

    if dead {
        missile.ttl = index;
        return;
    }
    if contained || pulse_clock(missile, ctx) % FLAME_SHIELD_PULSE_TICKS != 0 {
        return;
    }
    let neighbours = ctx.world.units_in_rect(
        TilePos::new(min.x - 1, min.y - 1),
        TilePos::new(max.x + 1, max.y + 1),
    );
    for goal in neighbours.into_iter().filter(|h| *h != target) {
        hit::missile_hits_goal(missile, missile_type, missile.source_unit, goal, 1, ctx);
    }
}

/// Drain life on arrival.
///
/// A missile without fixed damage uses the caster's stats. A caster that
/// died in flight drains nothing.
fn death_coil(missile: &mut Missile, missile_type: &MissileType, ctx: &mut MissileContext<'_>) {
    missile.wait = missile_type.sleep;
    if !point_to_point_step(missile, missile_type, ctx) {
        return;
    }
    missile.ttl = 0;
    hit::impact_feedback(missile, missile_type, ctx);
    let Some(source) = missile.source_unit else {
        return;
    };
    if !ctx.world.units.is_alive(source) {
        return;
    }

    if let Some(target) = missile.target_unit.filter(|t| ctx.world.units.is_alive(*t)) {
        let damage = coil_damage(missile, source, target, ctx);
        ctx.world.hit_unit(Some(source), target, damage);
        ctx.world.heal(source, damage);
        return;
    }

    let Some(caster) = ctx.world.units.get(source).map(|u| u.player) else {
        return;
    };
    let tile = (missile.destination + missile_type.half_size()).to_tile();
    let enemies: Vec<_> = ctx
        .world
        .units_in_rect(
            TilePos::new(tile.x - DEATH_COIL_RADIUS, tile.y - DEATH_COIL_RADIUS),
            TilePos::new(tile.x + DEATH_COIL_RADIUS, tile.y + DEATH_COIL_RADIUS),
        )
        .into_iter()
        .filter(|h| {
            ctx.world
                .units
                .get(*h)
                .is_some_and(|u| ctx.world.are_enemies(caster, u.player))
        })
        .collect();
    if enemies.is_empty() {
        return;
    }
    let damage = coil_damage(missile, source, enemies[0], ctx);
    let share = damage / i32::try_from(enemies.len()).unwrap_or(i32::MAX);
    for enemy in enemies {
        ctx.world.hit_unit(Some(source), enemy, share);
    }
    ctx.world.heal(source, damage);
}

fn coil_damage(
    missile: &Missile,
    source: UnitHandle,
    goal: UnitHandle,
    ctx: &mut MissileContext<'_>,
) -> i32 {
    let damage = if missile.damage != 0 {
        missile.damage
    } else {
        ctx.world.calculate_damage(source, goal)
    };
    damage.max(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orbit_radius() {
        for (dx, dy) in FLAME_SHIELD_ORBIT {
            let r2 = dx * dx + dy * dy;
            assert!((31 * 31..=33 * 33).contains(&r2), "({dx}, {dy})");
        }
    }
}
