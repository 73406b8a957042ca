//! Resource harvesting.
//!
//! A worker's [`ResourceOrder`] loops through gathering at a site (a
//! resource unit or forest terrain), carrying the load to a depot and
//! heading back out. Phases are plain integers so the two movement phases
//! can count retries inside their ranges:
//!
//! | phase | meaning |
//! |-------|---------|
//! | [`START_RESOURCE`] | resolve the resource kind and site |
//! | [`MOVE_TO_RESOURCE`]`..`[`UNREACHABLE_RESOURCE`] | walking to the site, one step per retry |
//! | [`UNREACHABLE_RESOURCE`] | give up |
//! | [`START_GATHERING`] | wait for a free slot and start extracting |
//! | [`GATHER_RESOURCE`] | load until full |
//! | [`STOP_GATHERING`] | leave the site and pick a depot |
//! | [`MOVE_TO_DEPOT`]`..`[`UNREACHABLE_DEPOT`] | walking to the depot |
//! | [`UNREACHABLE_DEPOT`] | give up |
//! | [`RETURN_RESOURCE`] | wait in the depot, then start over |
//!
//! Every failure ends in [`ResourceOrder::give_up`], which releases the
//! site and goal so nothing dangles once the order is dropped.

mod order;
pub mod search;

pub use order::{HarvestSite, ResourceOrder};
pub use search::{find_deposit, find_resource, find_terrain_resource};

use crate::unit::{UnitHandle, UnitOrder};
use crate::world::World;

/// Resolve the resource and site.
pub const START_RESOURCE: i32 = 0;
/// First tick of walking to the site.
pub const MOVE_TO_RESOURCE: i32 = 5;
/// The site could not be reached.
pub const UNREACHABLE_RESOURCE: i32 = 31;
/// Waiting for a slot at the site.
pub const START_GATHERING: i32 = 55;
/// Loading.
pub const GATHER_RESOURCE: i32 = 60;
/// Leaving the site.
pub const STOP_GATHERING: i32 = 65;
/// First tick of walking to the depot.
pub const MOVE_TO_DEPOT: i32 = 70;
/// The depot could not be reached.
pub const UNREACHABLE_DEPOT: i32 = 100;
/// Inside or next to the depot after delivering.
pub const RETURN_RESOURCE: i32 = 120;

/// Run one tick of every living unit's order, in slot order.
///
/// Finished orders are released and the unit becomes idle.
pub fn tick_orders(world: &mut World) {
    for handle in world.units.alive_handles() {
        let Some(unit) = world.units.get_mut(handle) else {
            continue;
        };
        let UnitOrder::Resource(mut order) = std::mem::take(&mut unit.order) else {
            continue;
        };
        if !order.finished {
            order.execute(world);
        }
        if !world.units.is_alive(handle) && !order.finished {
            order.give_up(world);
        }
        if order.finished {
            order.release(world);
        } else if let Some(unit) = world.units.get_mut(handle) {
            unit.order = UnitOrder::Resource(order);
        }
    }
}

/// Cancel a unit's order through the give-up path.
pub fn cancel_order(world: &mut World, handle: UnitHandle) {
    let Some(unit) = world.units.get_mut(handle) else {
        return;
    };
    if let UnitOrder::Resource(mut order) = std::mem::take(&mut unit.order) {
        order.give_up(world);
    }
}

/// Replace the worker's order, cancelling whatever it was doing.
pub fn issue_resource_order(world: &mut World, order: ResourceOrder) {
    let worker = order.worker;
    cancel_order(world, worker);
    if let Some(unit) = world.units.get_mut(worker) {
        unit.order = UnitOrder::Resource(Box::new(order));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DuplicatePolicy, SimConfig};
    use crate::map::TileMap;
    use crate::math::TilePos;
    use crate::player::{Player, PlayerId, ResourceKind};
    use crate::unit_type::{ResourceInfo, UnitType, UnitTypeId, UnitTypeRegistry};

    struct Fixture {
        world: World,
        peasant: UnitTypeId,
        hall: UnitTypeId,
        mine: UnitTypeId,
    }

    fn fixture(rows: &[&str], max_on_board: u32) -> Fixture {
        let mut types = UnitTypeRegistry::new(DuplicatePolicy::Error);
        let peasant = types
            .register(UnitType {
                harvests: vec![
                    ResourceInfo {
                        resource: ResourceKind::Gold,
                        capacity: 100,
                        step: 25,
                        wait_at_resource: 2,
                        wait_at_depot: 0,
                        harvest_from_outside: true,
                        terrain_harvester: false,
                    },
                    ResourceInfo {
                        resource: ResourceKind::Wood,
                        capacity: 100,
                        step: 0,
                        wait_at_resource: 1,
                        wait_at_depot: 0,
                        harvest_from_outside: true,
                        terrain_harvester: true,
                    },
                ],
                ..UnitType::new("unit-peasant", 30)
            })
            .expect("register");
        let hall = types
            .register(UnitType {
                building: true,
                tile_width: 2,
                tile_height: 2,
                can_store: vec![ResourceKind::Gold, ResourceKind::Wood],
                ..UnitType::new("unit-town-hall", 1200)
            })
            .expect("register");
        let mine = types
            .register(UnitType {
                building: true,
                tile_width: 2,
                tile_height: 2,
                gives_resource: Some(ResourceKind::Gold),
                starting_resources: 1000,
                max_on_board,
                ..UnitType::new("unit-gold-mine", 25500)
            })
            .expect("register");
        let map = TileMap::from_rows(rows, 10).expect("valid map");
        let mut world = World::new(SimConfig::default(), map, types);
        world.add_player(Player::new(PlayerId(0), "Red", 0)).expect("player");
        world.add_player(Player::neutral(PlayerId(1))).expect("player");
        Fixture {
            world,
            peasant,
            hall,
            mine,
        }
    }

    fn order_of(world: &World, worker: UnitHandle) -> &ResourceOrder {
        world
            .unit(worker)
            .expect("worker")
            .order
            .as_resource()
            .expect("resource order")
    }

    #[test]
    fn test_gather_stops_exactly_at_capacity() {
        let mut f = fixture(&["................"; 8], 0);
        f.world.spawn_unit(f.hall, PlayerId(0), TilePos::new(0, 2)).expect("spawn");
        let mine = f.world.spawn_unit(f.mine, PlayerId(1), TilePos::new(6, 2)).expect("spawn");
        let worker = f.world.spawn_unit(f.peasant, PlayerId(0), TilePos::new(5, 2)).expect("spawn");
        let order = ResourceOrder::harvest_unit(&f.world, worker, mine).expect("harvester");
        issue_resource_order(&mut f.world, order);

        let mut loads = Vec::new();
        for _ in 0..20 {
            tick_orders(&mut f.world);
            let held = f.world.unit(worker).expect("worker").resources_held;
            assert!(held <= 100, "overfilled to {held}");
            if held > 0 && loads.last() != Some(&held) {
                loads.push(held);
            }
            if order_of(&f.world, worker).done_harvesting {
                break;
            }
        }
        assert_eq!(loads, vec![25, 50, 75, 100]);
        assert_eq!(f.world.unit(mine).expect("mine").resources_held, 900);
        assert_eq!(f.world.unit(mine).expect("mine").mine.active, 1);
    }

    #[test]
    fn test_full_trip_delivers_to_player() {
        let mut f = fixture(&["................"; 8], 0);
        let hall = f.world.spawn_unit(f.hall, PlayerId(0), TilePos::new(0, 2)).expect("spawn");
        let mine = f.world.spawn_unit(f.mine, PlayerId(1), TilePos::new(6, 2)).expect("spawn");
        let worker = f.world.spawn_unit(f.peasant, PlayerId(0), TilePos::new(5, 2)).expect("spawn");
        let order = ResourceOrder::harvest_unit(&f.world, worker, mine).expect("harvester");
        issue_resource_order(&mut f.world, order);

        for _ in 0..14 {
            tick_orders(&mut f.world);
        }
        let gold = f.world.player(PlayerId(0)).expect("player").resource(ResourceKind::Gold);
        assert_eq!(gold, 100);
        let delivery = f.world.events.deliveries[0];
        assert_eq!((delivery.worker, delivery.depot, delivery.carried), (worker, hall, 100));

        // heading back to the same mine
        let order = order_of(&f.world, worker);
        assert_eq!(order.goal, Some(mine));
        assert!((MOVE_TO_RESOURCE..UNREACHABLE_RESOURCE).contains(&order.state));
        assert_eq!(f.world.unit(mine).expect("mine").mine.workers, vec![worker]);
    }

    #[test]
    fn test_capacity_gate_and_wake_up() {
        let mut f = fixture(&["................"; 8], 1);
        f.world.spawn_unit(f.hall, PlayerId(0), TilePos::new(0, 2)).expect("spawn");
        let mine = f.world.spawn_unit(f.mine, PlayerId(1), TilePos::new(6, 2)).expect("spawn");
        let first = f.world.spawn_unit(f.peasant, PlayerId(0), TilePos::new(5, 2)).expect("spawn");
        let second = f.world.spawn_unit(f.peasant, PlayerId(0), TilePos::new(5, 3)).expect("spawn");
        for worker in [first, second] {
            let order = ResourceOrder::harvest_unit(&f.world, worker, mine).expect("harvester");
            issue_resource_order(&mut f.world, order);
        }

        tick_orders(&mut f.world);
        assert_eq!(order_of(&f.world, first).state, GATHER_RESOURCE);
        assert_eq!(order_of(&f.world, second).state, START_GATHERING);
        assert_eq!(f.world.unit(second).expect("worker").wait, 10);
        let site = &f.world.unit(mine).expect("mine").mine;
        assert_eq!((site.active, site.assigned()), (1, 2));

        let unit = f.world.units.get_mut(first).expect("worker");
        unit.resources_held = 50;
        let mut order = std::mem::take(&mut unit.order);
        let resource = order.as_resource_mut().expect("resource order");
        assert!(resource.stop_gathering(&mut f.world));
        resource.state = MOVE_TO_DEPOT;
        f.world.units.get_mut(first).expect("worker").order = order;

        assert_eq!(f.world.unit(second).expect("worker").wait, 0);
        assert_eq!(f.world.unit(mine).expect("mine").mine.active, 0);
        tick_orders(&mut f.world);
        assert_eq!(order_of(&f.world, second).state, GATHER_RESOURCE);
    }

    #[test]
    fn test_exhausted_mine_sends_worker_home() {
        let mut f = fixture(&["................"; 8], 0);
        let hall = f.world.spawn_unit(f.hall, PlayerId(0), TilePos::new(0, 2)).expect("spawn");
        let mine = f.world.spawn_unit(f.mine, PlayerId(1), TilePos::new(6, 2)).expect("spawn");
        let worker = f.world.spawn_unit(f.peasant, PlayerId(0), TilePos::new(5, 2)).expect("spawn");
        f.world.units.get_mut(mine).expect("mine").resources_held = 30;
        let order = ResourceOrder::harvest_unit(&f.world, worker, mine).expect("harvester");
        issue_resource_order(&mut f.world, order);

        for _ in 0..5 {
            tick_orders(&mut f.world);
        }
        assert!(!f.world.units.is_alive(mine));
        assert_eq!(f.world.events.deaths, vec![mine]);
        let order = order_of(&f.world, worker);
        assert_eq!(order.state, MOVE_TO_DEPOT);
        assert_eq!(order.goal, Some(hall));
        assert_eq!(order.site, HarvestSite::None);
        assert_eq!(f.world.unit(worker).expect("worker").resources_held, 30);
        let site = &f.world.unit(mine).expect("mine").mine;
        assert_eq!((site.active, site.assigned()), (0, 0));
    }

    #[test]
    fn test_terrain_harvest_clears_forest() {
        let mut f = fixture(&["........", "...T....", "........"], 0);
        f.world.spawn_unit(f.hall, PlayerId(0), TilePos::new(6, 0)).expect("spawn");
        let worker = f.world.spawn_unit(f.peasant, PlayerId(0), TilePos::new(0, 1)).expect("spawn");
        let tile = TilePos::new(3, 1);
        let order = ResourceOrder::harvest_terrain(&f.world, worker, TilePos::new(2, 2))
            .expect("terrain harvester");
        assert_eq!(order.goal_pos, tile);
        issue_resource_order(&mut f.world, order);

        for _ in 0..4 {
            tick_orders(&mut f.world);
        }
        assert_eq!(f.world.events.forest_cleared, vec![tile]);
        assert_eq!(f.world.map.terrain_resource(tile), None);
        let unit = f.world.unit(worker).expect("worker");
        assert_eq!(unit.resources_held, 100);
        assert_eq!(unit.current_resource, Some(ResourceKind::Wood));
    }

    #[test]
    fn test_cancel_releases_site() {
        let mut f = fixture(&["................"; 8], 0);
        let mine = f.world.spawn_unit(f.mine, PlayerId(1), TilePos::new(6, 2)).expect("spawn");
        let worker = f.world.spawn_unit(f.peasant, PlayerId(0), TilePos::new(5, 2)).expect("spawn");
        let order = ResourceOrder::harvest_unit(&f.world, worker, mine).expect("harvester");
        issue_resource_order(&mut f.world, order);
        tick_orders(&mut f.world);
        assert_eq!(f.world.unit(mine).expect("mine").mine.active, 1);

        cancel_order(&mut f.world, worker);
        let site = &f.world.unit(mine).expect("mine").mine;
        assert_eq!((site.active, site.assigned()), (0, 0));
        assert!(f.world.unit(worker).expect("worker").order.as_resource().is_none());
        assert_eq!(f.world.events.gave_up, vec![worker]);
    }

    #[test]
    fn test_no_depot_gives_up() {
        let mut f = fixture(&["................"; 8], 0);
        let mine = f.world.spawn_unit(f.mine, PlayerId(1), TilePos::new(6, 2)).expect("spawn");
        let worker = f.world.spawn_unit(f.peasant, PlayerId(0), TilePos::new(5, 2)).expect("spawn");
        let order = ResourceOrder::harvest_unit(&f.world, worker, mine).expect("harvester");
        issue_resource_order(&mut f.world, order);
        for _ in 0..12 {
            tick_orders(&mut f.world);
        }
        assert_eq!(f.world.events.gave_up, vec![worker]);
        let unit = f.world.unit(worker).expect("worker");
        assert!(unit.order.as_resource().is_none());
        assert_eq!(unit.resources_held, 0);
        assert_eq!(f.world.unit(mine).expect("mine").mine.assigned(), 0);
    }

    #[test]
    fn test_harvest_unit_rejects_non_resources() {
        let mut f = fixture(&["........"], 0);
        let worker = f.world.spawn_unit(f.peasant, PlayerId(0), TilePos::new(0, 0)).expect("spawn");
        let hall = f.world.spawn_unit(f.hall, PlayerId(0), TilePos::new(4, 0)).expect("spawn");
        assert!(matches!(
            ResourceOrder::harvest_unit(&f.world, worker, hall),
            Err(crate::error::GameError::CannotHarvest { .. })
        ));
        assert!(ResourceOrder::return_goods(&f.world, worker, None).is_err());
    }
}
