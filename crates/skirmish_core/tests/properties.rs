//! Property tests for missile flight, splash and resource site counters.

use proptest::prelude::*;
use skirmish_core::missile::splash_divisor;
use skirmish_core::prelude::*;
use skirmish_test_utils::determinism::strategies::{arb_pixel, arb_speed};
use skirmish_test_utils::fixtures::economy;

fn flight_sim(class: MissileClass, speed: i32) -> Simulation {
    let mut unit_types = UnitTypeRegistry::new(DuplicatePolicy::Error);
    unit_types
        .register(UnitType::new("unit-dummy", 10))
        .expect("register");
    let world = World::new(SimConfig::with_seed(1), TileMap::new(64, 64), unit_types);
    let mut types = MissileTypeRegistry::new(DuplicatePolicy::Error);
    let missile = types.register("missile-probe").expect("register");
    missile.class = class;
    missile.speed = speed;
    missile.sprite_frames = 4;
    Simulation::new(world, types, SoundTable::new()).expect("simulation")
}

proptest! {
    #[test]
    fn prop_splash_divisor_at_least_one(distance in -100i32..10_000, factor in -100i32..10_000) {
        prop_assert!(splash_divisor(distance, factor) >= 1);
    }

    #[test]
    fn prop_splash_divisor_is_distance_times_factor(distance in 1i32..1000, factor in 1i32..1000) {
        prop_assert_eq!(splash_divisor(distance, factor), distance * factor);
        prop_assert_eq!(splash_divisor(0, factor), 1);
    }

    /// The step counter never goes backwards and the missile lands exactly
    /// on its destination, within one invocation of the ideal count.
    #[test]
    fn prop_point_to_point_lands_exactly(
        start in arb_pixel(),
        dest in arb_pixel(),
        speed in arb_speed(),
    ) {
        let mut sim = flight_sim(MissileClass::PointToPointWithHit, speed);
        let slot = sim
            .launch_missile("missile-probe", start, dest, None, None)
            .expect("launch");
        let distance = start.chebyshev_distance(dest);
        let budget = distance / speed + 2;

        let mut last_step = 0;
        let mut landed = false;
        for _ in 0..budget {
            sim.tick();
            let Some(missile) = sim.missiles().iter().find(|m| m.slot == slot) else {
                break;
            };
            prop_assert!(missile.current_step >= last_step);
            last_step = missile.current_step;
            if missile.position == dest {
                landed = true;
                break;
            }
        }
        prop_assert!(landed, "missile from {:?} to {:?} at speed {} never landed", start, dest, speed);
    }

    /// Random harvest, cancel and wait sequences keep every site's active
    /// count within its assigned count.
    #[test]
    fn prop_active_never_exceeds_assigned(
        ops in proptest::collection::vec((0usize..3, 0usize..3, 1u64..40), 1..25),
    ) {
        let mut sim = economy(17);
        let workers: Vec<UnitHandle> = ["p1", "p2", "p3"]
            .iter()
            .map(|name| sim.unit_by_label(name).expect("worker"))
            .collect();
        let mine = sim.unit_by_label("mine").expect("mine");

        for (op, who, wait) in ops {
            let worker = workers[who];
            let command = match op {
                0 => SimCommand::Harvest { worker, mine },
                1 => SimCommand::Cancel { unit: worker },
                _ => SimCommand::ReturnGoods { worker, depot: None },
            };
            // Returning empty-handed is refused; that is fine here.
            let _ = sim.apply_command(command);
            for _ in 0..wait {
                sim.tick();
                for unit in sim.world().units.iter() {
                    prop_assert!(unit.mine.active <= unit.mine.assigned());
                }
            }
        }
    }
}
