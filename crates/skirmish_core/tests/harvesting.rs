//! Worker economy over whole scenarios.

use skirmish_core::harvest::{GATHER_RESOURCE, MOVE_TO_DEPOT};
use skirmish_core::prelude::*;
use skirmish_test_utils::fixtures::{economy, scenario};

fn assert_site_counts(sim: &Simulation) {
    for unit in sim.world().units.iter() {
        assert!(
            unit.mine.active <= unit.mine.assigned(),
            "{} active {} > assigned {} at tick {}",
            unit.handle,
            unit.mine.active,
            unit.mine.assigned(),
            sim.get_tick()
        );
    }
}

fn label(sim: &Simulation, name: &str) -> UnitHandle {
    sim.unit_by_label(name).expect("label")
}

#[test]
fn test_economy_delivers_gold_and_wood() {
    let mut sim = economy(1);
    let mut gold_trips = 0;
    let mut wood_trips = 0;
    for _ in 0..1500 {
        let events = sim.tick();
        for delivery in events.deliveries {
            assert_eq!(delivery.depot, label(&sim, "hall"));
            assert_eq!(delivery.carried, 100);
            match delivery.resource {
                ResourceKind::Gold => gold_trips += 1,
                ResourceKind::Wood => wood_trips += 1,
                ResourceKind::Oil => unreachable!("nobody harvests oil"),
            }
        }
        assert_site_counts(&sim);
    }
    assert!(gold_trips >= 3, "gold trips: {gold_trips}");
    assert!(wood_trips >= 1, "wood trips: {wood_trips}");

    let player = sim.world().player(PlayerId(0)).expect("player");
    assert_eq!(player.resource(ResourceKind::Gold), gold_trips * 100);
    assert_eq!(player.resource(ResourceKind::Wood), wood_trips * 100);
    let mine = sim.world().unit(label(&sim, "mine")).expect("mine");
    assert_eq!(mine.resources_held, 10_000 - gold_trips * 100 - carried_gold(&sim));
}

fn carried_gold(sim: &Simulation) -> i32 {
    ["p1", "p2", "p3"]
        .iter()
        .filter_map(|name| sim.world().unit(label(sim, name)).ok())
        .filter(|u| u.current_resource == Some(ResourceKind::Gold))
        .map(|u| u.resources_held)
        .sum()
}

#[test]
fn test_single_slot_mine_holds_one_extractor() {
    let mut sim = economy(2);
    let mine = label(&sim, "mine");
    let mut saw_extracting = false;
    for _ in 0..600 {
        sim.tick();
        let world = sim.world();
        let site = world.unit(mine).expect("mine");
        assert!(site.mine.active <= 1);
        let inside = world
            .units
            .iter()
            .filter(|u| !u.destroyed && u.container == Some(mine))
            .count();
        assert!(inside <= 1, "{inside} workers inside at tick {}", sim.get_tick());
        saw_extracting |= site.mine.active == 1;
    }
    assert!(saw_extracting);
}

#[test]
fn test_mine_destroyed_with_worker_inside() {
    let mut sim = economy(3);
    let mine = label(&sim, "mine");
    let inside = (0..400).find_map(|_| {
        sim.tick();
        sim.world()
            .units
            .iter()
            .find(|u| u.container == Some(mine))
            .map(|u| u.handle)
    });
    let worker = inside.expect("a worker enters the mine");
    assert_eq!(
        sim.world().unit(worker).expect("worker").order.as_resource().map(|o| o.state),
        Some(GATHER_RESOURCE)
    );

    sim.world_mut().hit_unit(None, mine, 30_000);
    let mut gave_up = Vec::new();
    for _ in 0..20 {
        gave_up.extend(sim.tick().gave_up);
        assert_site_counts(&sim);
    }

    let unit = sim.world().unit(worker).expect("worker survives");
    assert_eq!(unit.container, None);
    for other in sim.world().units.iter() {
        if let Some(order) = other.order.as_resource() {
            assert_ne!(order.site, HarvestSite::Mine(mine), "{} still mines", other.handle);
            assert_ne!(order.goal, Some(mine));
        }
    }
    let carrying = unit.resources_held > 0;
    let heading_home = unit
        .order
        .as_resource()
        .is_some_and(|o| o.state == MOVE_TO_DEPOT);
    assert!(
        gave_up.contains(&worker) || heading_home || carrying,
        "worker neither gave up nor went home"
    );
    for _ in 0..40 {
        sim.tick();
    }
    assert!(sim.world().units.get(mine).is_none(), "dead mine is recycled");
}

#[test]
fn test_cancel_command_frees_site() {
    let mut sim = economy(4);
    let mine = label(&sim, "mine");
    for _ in 0..200 {
        sim.tick();
    }
    for name in ["p1", "p2", "p3"] {
        sim.apply_command(SimCommand::Cancel {
            unit: label(&sim, name),
        })
        .expect("cancel");
        assert_site_counts(&sim);
    }
    sim.tick();
    let site = sim.world().unit(mine).expect("mine");
    assert_eq!(site.mine.assigned(), 0);
    assert_eq!(site.mine.active, 0);
    for name in ["p1", "p2", "p3"] {
        let unit = sim.world().unit(label(&sim, name)).expect("worker");
        assert!(unit.order.as_resource().is_none());
        assert_eq!(unit.container, None);
    }
}

#[test]
fn test_return_goods_from_scenario_file() {
    let body = r#"
        name: "return",
        map: ["............", "............", "............", "............"],
        players: [(id: 0, name: "Red", team: 0)],
        units: [
            (label: Some("hall"), unit_type: "unit-town-hall", player: 0, x: 0, y: 0),
            (label: Some("loaded"), unit_type: "unit-peasant", player: 0, x: 9, y: 2),
        ],
        orders: [],
    "#;
    let data = scenario(body, 8);
    let mut sim = Simulation::from_scenario(&data).expect("scenario");
    let worker = label(&sim, "loaded");
    {
        let unit = sim.world_mut().units.get_mut(worker).expect("worker");
        unit.current_resource = Some(ResourceKind::Wood);
        unit.resources_held = 60;
    }
    sim.apply_command(SimCommand::ReturnGoods {
        worker,
        depot: None,
    })
    .expect("return goods");

    let mut delivered = None;
    for _ in 0..100 {
        if let Some(d) = sim.tick().deliveries.first().copied() {
            delivered = Some(d);
            break;
        }
    }
    let delivery = delivered.expect("goods delivered");
    assert_eq!(delivery.carried, 60);
    assert_eq!(delivery.resource, ResourceKind::Wood);
    let player = sim.world().player(PlayerId(0)).expect("player");
    assert_eq!(player.resource(ResourceKind::Wood), 60);
}

#[test]
fn test_bad_scenario_order_is_rejected() {
    let body = r#"
        name: "bad",
        map: ["......", "......"],
        players: [(id: 0, name: "Red", team: 0)],
        units: [(label: Some("hall"), unit_type: "unit-town-hall", player: 0, x: 0, y: 0)],
        orders: [Harvest(worker: "hall", mine: "nobody")],
    "#;
    let data = scenario(body, 1);
    assert!(matches!(
        Simulation::from_scenario(&data),
        Err(GameError::UnitNotFound(_))
    ));
}
