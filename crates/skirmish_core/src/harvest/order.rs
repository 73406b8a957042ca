//! The resource order: one worker's harvest loop.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{GameError, Result};
use crate::events::DeliveryEvent;
use crate::harvest::search::{find_deposit, find_resource, find_terrain_resource};
use crate::harvest::{
    GATHER_RESOURCE, MOVE_TO_DEPOT, MOVE_TO_RESOURCE, RETURN_RESOURCE, START_GATHERING,
    START_RESOURCE, STOP_GATHERING, UNREACHABLE_DEPOT, UNREACHABLE_RESOURCE,
};
use crate::math::{heading_from_delta, TilePos};
use crate::movement::{move_unit, MoveGoal, MoveOutcome};
use crate::player::{ResourceKind, SPEEDUP_FACTOR};
use crate::unit::{Unit, UnitHandle};
use crate::unit_type::ResourceInfo;
use crate::world::World;

/// Ticks a worker waits before retrying a failed path.
const RETRY_WAIT: i32 = 5;
/// Ticks a worker waits at a full or unfinished site.
const BLOCKED_WAIT: i32 = 10;
/// Radius searched for forest around a clicked tile.
const TERRAIN_ORDER_SNAP: i32 = 20;

/// Where the worker harvests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HarvestSite {
    /// Nothing remembered.
    #[default]
    None,
    /// A resource unit the worker is assigned to.
    Mine(UnitHandle),
    /// A terrain position to look for resources around.
    Terrain(TilePos),
}

/// Harvest order of one worker.
///
/// `state` walks through the phases defined in [`crate::harvest`]. All
/// unit references are generational handles and are re-validated before
/// every use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceOrder {
    /// Current phase.
    pub state: i32,
    /// Resource kind being harvested.
    pub current_resource: Option<ResourceKind>,
    /// Unit moved toward: a resource site or a depot.
    pub goal: Option<UnitHandle>,
    /// Terrain tile harvested by terrain harvesters.
    pub goal_pos: TilePos,
    /// The worker executing this order.
    pub worker: UnitHandle,
    /// Remembered harvest site.
    pub site: HarvestSite,
    /// Depot the worker delivers to.
    pub depot: Option<UnitHandle>,
    /// Fully loaded; nothing left to gather this trip.
    pub done_harvesting: bool,
    /// Ticks until the next load increment.
    pub time_to_harvest: i32,
    /// The order ended and will be dropped.
    pub finished: bool,
    /// Ticks spent blocked at a full site, for wake-up fairness.
    pub waiting_ticks: i32,
    extracting_from: Option<UnitHandle>,
    depot_requested: bool,
}

impl ResourceOrder {
    fn blank(worker: UnitHandle) -> Self {
        Self {
            state: START_RESOURCE,
            current_resource: None,
            goal: None,
            goal_pos: TilePos::new(-1, -1),
            worker,
            site: HarvestSite::None,
            depot: None,
            done_harvesting: false,
            time_to_harvest: 0,
            finished: false,
            waiting_ticks: 0,
            extracting_from: None,
            depot_requested: false,
        }
    }

    /// Harvest from a resource unit.
    ///
    /// # Errors
    ///
    /// `UnitNotFound` for dead handles, `CannotHarvest` when the site gives
    /// nothing the worker can gather.
    pub fn harvest_unit(world: &World, worker: UnitHandle, mine: UnitHandle) -> Result<Self> {
        world.unit(worker)?;
        let site = world.unit(mine)?;
        if !site.is_visible_as_goal() {
            return Err(GameError::UnitNotFound(mine.to_string()));
        }
        let kind = world
            .unit_type_of(mine)
            .and_then(|t| t.gives_resource)
            .ok_or_else(|| cannot_harvest(worker, format!("{mine} gives no resource")))?;
        match world.unit_type_of(worker).and_then(|t| t.resource_info(kind)) {
            Some(info) if !info.terrain_harvester => {}
            _ => return Err(cannot_harvest(worker, format!("cannot gather {kind}"))),
        }
        let mut order = Self::blank(worker);
        order.goal = Some(mine);
        order.goal_pos = site.tile_pos;
        order.current_resource = Some(kind);
        Ok(order)
    }

    /// Harvest map terrain at `tile`, or the nearest harvestable tile
    /// around it when `tile` holds nothing.
    ///
    /// # Errors
    ///
    /// `CannotHarvest` when the worker gathers no terrain resource or no
    /// such terrain lies nearby.
    pub fn harvest_terrain(world: &World, worker: UnitHandle, tile: TilePos) -> Result<Self> {
        world.unit(worker)?;
        let kind = terrain_kind(world, worker)
            .ok_or_else(|| cannot_harvest(worker, "gathers no terrain resource".into()))?;
        let pos = if world.map.terrain_resource(tile) == Some(kind) {
            tile
        } else {
            find_terrain_resource(world, world.map.clamp(tile), TERRAIN_ORDER_SNAP, kind)
                .ok_or_else(|| cannot_harvest(worker, format!("no {kind} near {tile:?}")))?
        };
        let mut order = Self::blank(worker);
        order.goal_pos = pos;
        order.current_resource = Some(kind);
        Ok(order)
    }

    /// Carry the worker's load to `depot`, or to the nearest depot.
    ///
    /// Without any depot the order starts unreachable and gives up on its
    /// first tick.
    ///
    /// # Errors
    ///
    /// `CannotHarvest` when the worker carries nothing.
    pub fn return_goods(
        world: &World,
        worker: UnitHandle,
        depot: Option<UnitHandle>,
    ) -> Result<Self> {
        let unit = world.unit(worker)?;
        let kind = unit
            .current_resource
            .filter(|_| unit.resources_held > 0)
            .ok_or_else(|| cannot_harvest(worker, "carries nothing".into()))?;
        let depot = depot
            .filter(|d| world.units.get(*d).is_some_and(Unit::is_visible_as_goal))
            .or_else(|| find_deposit(world, worker, world.config.search.depot, kind));
        let mut order = Self::blank(worker);
        order.current_resource = Some(kind);
        order.done_harvesting = true;
        let terrain = world
            .unit_type_of(worker)
            .and_then(|t| t.resource_info(kind))
            .is_some_and(|i| i.terrain_harvester);
        if terrain {
            order.site = HarvestSite::Terrain(unit.tile_pos);
        }
        match depot {
            Some(depot) => {
                order.state = MOVE_TO_DEPOT;
                order.goal = Some(depot);
                order.depot = Some(depot);
            }
            None => order.state = UNREACHABLE_DEPOT,
        }
        Ok(order)
    }

    /// True while the worker counts as active on a site.
    #[must_use]
    pub const fn is_extracting(&self) -> bool {
        self.extracting_from.is_some()
    }

    /// Waiting at a full site for a free slot.
    #[must_use]
    pub fn is_waiting_to_gather(&self, world: &World) -> bool {
        self.state == START_GATHERING
            && world.units.get(self.worker).is_some_and(|u| u.wait != 0)
    }

    fn info(&self, world: &World) -> Option<ResourceInfo> {
        let kind = self.current_resource?;
        world.unit_type_of(self.worker)?.resource_info(kind).copied()
    }

    fn harvest_time(&self, world: &World, info: &ResourceInfo) -> i32 {
        if info.wait_at_resource <= 0 {
            return 1;
        }
        let speed = world
            .units
            .get(self.worker)
            .and_then(|u| world.player(u.player))
            .map_or(SPEEDUP_FACTOR, |p| p.harvest_speed(info.resource));
        (info.wait_at_resource * SPEEDUP_FACTOR / speed.max(1)).max(1)
    }

    fn is_contained(&self, world: &World) -> bool {
        world.units.get(self.worker).is_some_and(Unit::is_contained)
    }

    fn set_wait(&self, world: &mut World, wait: i32) {
        if let Some(unit) = world.units.get_mut(self.worker) {
            unit.wait = wait;
        }
    }

    fn reset_path_cycles(&self, world: &mut World) {
        if let Some(unit) = world.units.get_mut(self.worker) {
            unit.path_cycles = 0;
        }
    }

    /// Run one tick of the order.
    pub fn execute(&mut self, world: &mut World) {
        let Some(unit) = world.units.get_mut(self.worker) else {
            self.finished = true;
            return;
        };
        if unit.wait > 0 {
            unit.wait -= 1;
            return;
        }

        if self.state == START_RESOURCE && !self.init(world) {
            self.give_up(world);
            return;
        }

        if (MOVE_TO_RESOURCE..UNREACHABLE_RESOURCE).contains(&self.state) {
            match self.move_to_resource(world) {
                MoveOutcome::Unreachable => {
                    self.state += 1;
                    self.set_wait(world, RETRY_WAIT);
                    return;
                }
                MoveOutcome::Moving => return,
                MoveOutcome::Reached => self.state = START_GATHERING,
            }
        }

        if self.state == UNREACHABLE_RESOURCE {
            self.give_up(world);
            return;
        }

        if self.state == START_GATHERING {
            if !self.start_gathering(world) {
                return;
            }
            self.state = GATHER_RESOURCE;
        }

        if self.state == GATHER_RESOURCE {
            if !self.gather_resource(world) {
                return;
            }
            self.state = STOP_GATHERING;
        }

        if self.state == STOP_GATHERING {
            if self.stop_gathering(world) {
                self.state = MOVE_TO_DEPOT;
            }
            return;
        }

        if (MOVE_TO_DEPOT..UNREACHABLE_DEPOT).contains(&self.state) {
            match self.move_to_depot(world) {
                MoveOutcome::Unreachable => {
                    self.state += 1;
                    self.set_wait(world, RETRY_WAIT);
                }
                MoveOutcome::Reached => self.state = RETURN_RESOURCE,
                MoveOutcome::Moving => {}
            }
            return;
        }

        if self.state == UNREACHABLE_DEPOT {
            self.give_up(world);
            return;
        }

        if self.state == RETURN_RESOURCE && self.wait_in_depot(world) {
            self.state = START_RESOURCE;
            // leave the depot and head out in the same tick
            self.execute(world);
        }
    }

    /// Resolve the resource kind and site membership, then start moving.
    ///
    /// Returns false when the order cannot continue.
    fn init(&mut self, world: &mut World) -> bool {
        self.stop_extracting(world);
        if let HarvestSite::Mine(mine) = self.site {
            world.deassign_worker(self.worker, mine);
        }
        self.site = HarvestSite::None;

        let kind = match self.goal {
            Some(goal) => {
                let Some(site) = world.units.get(goal) else {
                    return false;
                };
                if site.destroyed {
                    return false;
                }
                let under_construction = site.under_construction;
                let kind = world.unit_type_of(goal).and_then(|t| t.gives_resource);
                if kind.is_some() && !under_construction {
                    world.assign_worker(self.worker, goal);
                    self.site = HarvestSite::Mine(goal);
                }
                kind
            }
            None => {
                self.site = HarvestSite::Terrain(self.goal_pos);
                terrain_kind(world, self.worker)
            }
        };
        let Some(kind) = kind else {
            return false;
        };
        let Some(worker_type) = world.unit_type_of(self.worker) else {
            return false;
        };
        if worker_type.resource_info(kind).is_none() {
            return false;
        }

        if let Some(unit) = world.units.get_mut(self.worker) {
            if unit.current_resource != Some(kind) {
                unit.resources_held = 0;
                unit.current_resource = Some(kind);
            }
            unit.path_cycles = 0;
        }
        self.current_resource = Some(kind);
        self.state = MOVE_TO_RESOURCE;
        true
    }

    fn move_to_resource(&mut self, world: &mut World) -> MoveOutcome {
        let Some(info) = self.info(world) else {
            return MoveOutcome::Unreachable;
        };
        if !info.terrain_harvester {
            let Some(goal) = self.goal else {
                return MoveOutcome::Unreachable;
            };
            if !world.units.get(goal).is_some_and(Unit::is_visible_as_goal) {
                // start_gathering redirects or gives up
                return MoveOutcome::Reached;
            }
            return move_unit(world, self.worker, MoveGoal::Unit(goal));
        }

        let kind = info.resource;
        if world.map.terrain_resource(self.goal_pos) != Some(kind) {
            match find_terrain_resource(world, self.goal_pos, world.config.search.terrain, kind) {
                Some(pos) => self.goal_pos = pos,
                None => return MoveOutcome::Unreachable,
            }
        }
        match move_unit(world, self.worker, MoveGoal::Tile(self.goal_pos)) {
            MoveOutcome::Unreachable => {
                self.set_wait(world, BLOCKED_WAIT);
                let from = world.units.get(self.worker).map_or(self.goal_pos, |u| u.tile_pos);
                match find_terrain_resource(world, from, world.config.search.terrain_far, kind) {
                    Some(pos) if pos != self.goal_pos => {
                        trace!(unit = %self.worker, ?pos, "found a better place to harvest");
                        self.goal_pos = pos;
                        MoveOutcome::Moving
                    }
                    _ => MoveOutcome::Unreachable,
                }
            }
            outcome => outcome,
        }
    }

    /// Begin extracting at the site.
    ///
    /// Returns false when the worker has to wait, was redirected or gave up.
    pub fn start_gathering(&mut self, world: &mut World) -> bool {
        let Some(info) = self.info(world) else {
            self.give_up(world);
            return false;
        };
        let Some(worker_pos) = world.units.get(self.worker).map(|u| u.tile_pos) else {
            return false;
        };

        if info.terrain_harvester {
            let delta = self.goal_pos - worker_pos;
            let harvest_time = self.harvest_time(world, &info);
            if let Some(unit) = world.units.get_mut(self.worker) {
                unit.heading = heading_from_delta(delta.x, delta.y);
            }
            self.time_to_harvest = harvest_time;
            self.done_harvesting = false;
            if let HarvestSite::Mine(mine) = self.site {
                world.deassign_worker(self.worker, mine);
            }
            self.site = HarvestSite::Terrain(self.goal_pos);
            return true;
        }

        let Some(goal) = self.goal else {
            self.give_up(world);
            return false;
        };
        let Some(site) = world.units.get(goal).filter(|u| u.is_visible_as_goal()) else {
            let range = world.config.search.resource;
            match find_resource(world, self.worker, range, info.resource) {
                Some(next) => {
                    debug!(unit = %self.worker, lost = %goal, found = %next, "resource gone, redirecting");
                    self.goal = Some(next);
                    self.goal_pos = TilePos::new(-1, -1);
                    self.state = START_RESOURCE;
                }
                None => self.give_up(world),
            }
            return false;
        };

        let center = site.center_pixel();
        let (active, inside, under_construction) =
            (site.mine.active, site.inside.len(), site.under_construction);
        let (max_on_board, max_harvesters) = world
            .unit_type_of(goal)
            .map_or((0, 0), |t| (t.max_on_board, t.max_harvesters));
        if let Some(unit) = world.units.get_mut(self.worker) {
            let from = unit.center_pixel();
            unit.heading = heading_from_delta(center.x - from.x, center.y - from.y);
        }

        if (max_on_board > 0 && active >= max_on_board) || under_construction {
            self.block(world);
            return false;
        }
        if !info.harvest_from_outside {
            let room =
                max_harvesters == 0 || u32::try_from(inside).unwrap_or(u32::MAX) < max_harvesters;
            if !room {
                self.block(world);
                return false;
            }
            world.enter_container(self.worker, goal);
            self.goal = None;
        }

        world.assign_worker(self.worker, goal);
        self.site = HarvestSite::Mine(goal);
        if let Some(site) = world.units.get_mut(goal) {
            site.mine.active += 1;
        }
        self.extracting_from = Some(goal);
        self.time_to_harvest = self.harvest_time(world, &info);
        self.done_harvesting = false;
        self.waiting_ticks = 0;
        trace!(unit = %self.worker, site = %goal, "started gathering");
        true
    }

    fn block(&mut self, world: &mut World) {
        self.set_wait(world, BLOCKED_WAIT);
        self.waiting_ticks += BLOCKED_WAIT;
    }

    /// Count down and load resources.
    ///
    /// Returns true once the worker should head back to a depot.
    pub fn gather_resource(&mut self, world: &mut World) -> bool {
        let Some(info) = self.info(world) else {
            self.give_up(world);
            return false;
        };
        self.time_to_harvest -= 1;
        if self.done_harvesting {
            return true;
        }
        if info.terrain_harvester && world.map.terrain_resource(self.goal_pos) != Some(info.resource) {
            self.state = MOVE_TO_RESOURCE;
            return false;
        }

        while !self.done_harvesting && self.time_to_harvest < 0 {
            self.time_to_harvest += self.harvest_time(world, &info);
            let step = if info.step > 0 { info.step } else { info.capacity };
            let held = world.units.get(self.worker).map_or(0, |u| u.resources_held);
            let mut load = step.min(info.capacity - held).max(0);

            if info.terrain_harvester {
                let held = self.add_load(world, load);
                if load > 0 && held == info.capacity && world.map.clear_forest(self.goal_pos) {
                    world.events.forest_cleared.push(self.goal_pos);
                }
                if held >= info.capacity {
                    self.done_harvesting = true;
                }
                return false;
            }

            let Some(source) = self.extracting_from else {
                self.give_up(world);
                return false;
            };
            let visible = world.units.get(source).is_some_and(Unit::is_visible_as_goal);
            if visible {
                if let Some(site) = world.units.get_mut(source) {
                    load = load.min(site.resources_held);
                    site.resources_held -= load;
                }
                self.add_load(world, load);
            }
            let exhausted = world.units.get(source).map_or(true, |s| s.resources_held == 0);
            if !visible || exhausted {
                self.lose_site(world, source);
                return false;
            }

            let held = world.units.get(self.worker).map_or(0, |u| u.resources_held);
            if held >= info.capacity {
                self.done_harvesting = true;
                if !info.harvest_from_outside {
                    return true;
                }
            }
        }
        false
    }

    fn add_load(&self, world: &mut World, load: i32) -> i32 {
        match world.units.get_mut(self.worker) {
            Some(unit) => {
                unit.resources_held += load;
                unit.resources_held
            }
            None => 0,
        }
    }

    /// The site ran dry or vanished: send every worker extracting from it
    /// elsewhere, then destroy it once.
    fn lose_site(&mut self, world: &mut World, source: UnitHandle) {
        debug!(unit = %self.worker, site = %source, "resource is destroyed");
        let dead = !world.units.is_alive(source);
        let others: Vec<UnitHandle> = world
            .units
            .get(source)
            .map(|s| s.mine.workers.clone())
            .unwrap_or_default();

        self.lose_resource(world, source);
        for other in others.into_iter().filter(|w| *w != self.worker) {
            let Some(unit) = world.units.get_mut(other) else {
                continue;
            };
            let mut order = std::mem::take(&mut unit.order);
            if let Some(resource) = order.as_resource_mut() {
                if resource.state == GATHER_RESOURCE && resource.extracting_from == Some(source) {
                    resource.lose_resource(world, source);
                }
            }
            if let Some(unit) = world.units.get_mut(other) {
                unit.order = order;
            }
        }
        if !dead {
            world.let_unit_die(source);
        }
    }

    /// React to losing `source` while extracting from it: keep gathering
    /// elsewhere, carry the load home, or give up.
    pub fn lose_resource(&mut self, world: &mut World, source: UnitHandle) {
        let Some(info) = self.info(world) else {
            self.give_up(world);
            return;
        };
        self.stop_extracting(world);
        world.deassign_worker(self.worker, source);
        if self.site == HarvestSite::Mine(source) {
            self.site = HarvestSite::None;
        }
        if self.goal == Some(source) {
            self.goal = None;
        }
        let held = world.units.get(self.worker).map_or(0, |u| u.resources_held);
        let search = world.config.search;

        if info.harvest_from_outside && held < info.capacity {
            if let Some(next) = find_resource(world, self.worker, search.resource, info.resource) {
                self.goal = Some(next);
                self.goal_pos = TilePos::new(-1, -1);
                self.state = START_RESOURCE;
                return;
            }
        }

        if held > 0 {
            if let Some(depot) = find_deposit(world, self.worker, search.depot, info.resource) {
                if self.is_contained(world) {
                    let toward = world.units.get(depot).map(Unit::center_pixel);
                    world.drop_out(self.worker, toward);
                }
                self.done_harvesting = true;
                self.goal = Some(depot);
                self.depot = Some(depot);
                self.state = MOVE_TO_DEPOT;
                self.reset_path_cycles(world);
                return;
            }
        }

        if self.is_contained(world) {
            world.drop_out(self.worker, None);
        }
        self.goal_pos = TilePos::new(-1, -1);
        match find_resource(world, self.worker, search.resource, info.resource) {
            Some(next) => {
                debug!(unit = %self.worker, found = %next, "resource exhausted, found another");
                self.goal = Some(next);
                self.state = START_RESOURCE;
            }
            None => {
                debug!(unit = %self.worker, "resource exhausted, nothing else nearby");
                self.give_up(world);
            }
        }
    }

    /// Leave the site and pick a depot.
    ///
    /// Returns false when no depot takes the load; the order then gives up.
    pub fn stop_gathering(&mut self, world: &mut World) -> bool {
        let Some(info) = self.info(world) else {
            self.give_up(world);
            return false;
        };
        if info.terrain_harvester {
            if let Some(unit) = world.units.get(self.worker) {
                self.site = HarvestSite::Terrain(unit.tile_pos);
            }
        } else {
            let source = self.extracting_from;
            self.stop_extracting(world);
            if info.harvest_from_outside {
                self.goal = None;
            }
            if let Some(source) = source {
                self.site = HarvestSite::Mine(source);
                self.wake_waiting_worker(world, source);
            }
        }

        let held = world.units.get(self.worker).map_or(0, |u| u.resources_held);
        let depot = find_deposit(world, self.worker, world.config.search.depot, info.resource);
        match depot {
            Some(depot) if held > 0 => {
                if self.is_contained(world) {
                    let toward = world.units.get(depot).map(Unit::center_pixel);
                    world.drop_out(self.worker, toward);
                }
                self.goal = Some(depot);
                self.depot = Some(depot);
                self.depot_requested = false;
                self.reset_path_cycles(world);
                true
            }
            _ => {
                debug!(unit = %self.worker, resource = %info.resource, "no deposit for the load");
                if self.is_contained(world) {
                    world.drop_out(self.worker, None);
                }
                self.give_up(world);
                false
            }
        }
    }

    /// Unfreeze the worker that waited longest at a capacity-limited site.
    fn wake_waiting_worker(&self, world: &mut World, site: UnitHandle) {
        let Some(mine) = world.units.get(site) else {
            return;
        };
        if world.unit_type_of(site).map_or(0, |t| t.max_on_board) == 0 {
            return;
        }
        let mut next: Option<(UnitHandle, i32)> = None;
        for &worker in &mine.mine.workers {
            if worker == self.worker {
                continue;
            }
            let Some(order) = world.units.get(worker).and_then(|u| u.order.as_resource()) else {
                continue;
            };
            if !order.is_waiting_to_gather(world) {
                continue;
            }
            if next.map_or(true, |(_, ticks)| order.waiting_ticks > ticks) {
                next = Some((worker, order.waiting_ticks));
            }
        }
        if let Some((worker, waited)) = next {
            debug!(unit = %self.worker, woken = %worker, waited, site = %site, "unfreezing resource gathering");
            if let Some(unit) = world.units.get_mut(worker) {
                unit.wait = 0;
            }
        }
    }

    fn move_to_depot(&mut self, world: &mut World) -> MoveOutcome {
        let Some(info) = self.info(world) else {
            self.give_up(world);
            return MoveOutcome::Moving;
        };
        let (player, cycles) = match world.units.get(self.worker) {
            Some(unit) => (unit.player, unit.path_cycles),
            None => return MoveOutcome::Unreachable,
        };
        let ai = world.player(player).is_some_and(|p| p.ai);
        if ai && !self.depot_requested && cycles > world.config.ai_depot_request_cycles {
            world.request_depot(self.worker);
            self.depot_requested = true;
        }

        let depot = self
            .goal
            .filter(|d| world.units.get(*d).is_some_and(Unit::is_visible_as_goal));
        let Some(depot) = depot else {
            self.goal = None;
            match find_deposit(world, self.worker, world.config.search.depot, info.resource) {
                Some(next) => {
                    debug!(unit = %self.worker, depot = %next, "depot destroyed, going to another");
                    self.goal = Some(next);
                    self.depot = Some(next);
                }
                None => {
                    debug!(unit = %self.worker, "depot destroyed, no other deposit");
                    self.give_up(world);
                }
            }
            return MoveOutcome::Moving;
        };

        match move_unit(world, self.worker, MoveGoal::Unit(depot)) {
            MoveOutcome::Reached => {}
            other => return other,
        }
        if world.units.get(depot).is_some_and(|d| d.under_construction) {
            self.set_wait(world, BLOCKED_WAIT);
            return MoveOutcome::Moving;
        }

        self.goal = None;
        self.depot = Some(depot);
        let wait = info.wait_at_depot;
        if wait > 0 {
            world.enter_container(self.worker, depot);
        }

        let Some(unit) = world.units.get_mut(self.worker) else {
            return MoveOutcome::Unreachable;
        };
        let carried = unit.resources_held;
        unit.resources_held = 0;
        unit.current_resource = None;
        let owner = unit.player;
        let (credited, return_speed) = match world.player_mut(owner) {
            Some(p) => (p.deliver(info.resource, carried), p.return_speed(info.resource)),
            None => (0, SPEEDUP_FACTOR),
        };
        world.events.deliveries.push(DeliveryEvent {
            worker: self.worker,
            depot,
            player: owner,
            resource: info.resource,
            carried,
            credited,
        });
        trace!(unit = %self.worker, %depot, carried, credited, "goods delivered");

        let mut wait = wait / (return_speed / SPEEDUP_FACTOR).max(1);
        if wait > 0 {
            wait -= 1;
        }
        self.set_wait(world, wait);
        MoveOutcome::Reached
    }

    /// Leave the depot toward the next harvest target.
    ///
    /// Returns false when nothing is left to harvest; the order then gives up.
    pub fn wait_in_depot(&mut self, world: &mut World) -> bool {
        let Some(info) = self.info(world) else {
            self.give_up(world);
            return false;
        };
        let search = world.config.search;

        if info.terrain_harvester {
            let from = match self.site {
                HarvestSite::Terrain(pos) => pos,
                _ => world.units.get(self.worker).map_or(self.goal_pos, |u| u.tile_pos),
            };
            let Some(pos) = find_terrain_resource(world, from, search.terrain_from_depot, info.resource)
            else {
                world.drop_out(self.worker, None);
                self.give_up(world);
                return false;
            };
            world.drop_out(self.worker, Some(pos.to_pixel_center()));
            self.goal_pos = pos;
            self.site = HarvestSite::Terrain(pos);
            return true;
        }

        let mine = match self.site {
            HarvestSite::Mine(mine) if world.units.get(mine).is_some() => Some(mine),
            _ => None,
        };
        let (origin, range) = match mine {
            Some(mine) => (mine, search.resource),
            None => (self.worker, search.resource_far),
        };
        let Some(goal) = find_resource(world, origin, range, info.resource) else {
            world.drop_out(self.worker, None);
            self.give_up(world);
            return false;
        };
        let toward = world.units.get(goal).map(Unit::center_pixel);
        world.drop_out(self.worker, toward);
        if mine != Some(goal) {
            if let Some(old) = mine {
                world.deassign_worker(self.worker, old);
            }
            world.assign_worker(self.worker, goal);
            self.site = HarvestSite::Mine(goal);
        }
        self.goal = Some(goal);
        self.goal_pos = TilePos::new(-1, -1);
        true
    }

    fn stop_extracting(&mut self, world: &mut World) {
        if let Some(site) = self.extracting_from.take() {
            if let Some(unit) = world.units.get_mut(site) {
                debug_assert!(unit.mine.active > 0, "site {site} has no active worker");
                unit.mine.active = unit.mine.active.saturating_sub(1);
            }
        }
    }

    /// End the order: release the site, drop the load and mark finished.
    pub fn give_up(&mut self, world: &mut World) {
        if !self.finished {
            debug!(unit = %self.worker, state = self.state, "gave up on resource gathering");
            world.events.gave_up.push(self.worker);
        }
        self.release(world);
        if self.is_contained(world) {
            world.drop_out(self.worker, None);
        }
        if let Some(unit) = world.units.get_mut(self.worker) {
            unit.resources_held = 0;
            unit.current_resource = None;
        }
        self.finished = true;
    }

    /// Drop every reference the order holds. Safe to call repeatedly.
    pub fn release(&mut self, world: &mut World) {
        self.stop_extracting(world);
        if let HarvestSite::Mine(mine) = self.site {
            world.deassign_worker(self.worker, mine);
        }
        self.site = HarvestSite::None;
        self.goal = None;
    }
}

/// Terrain resource the worker's type gathers, if any.
fn terrain_kind(world: &World, worker: UnitHandle) -> Option<ResourceKind> {
    world
        .unit_type_of(worker)?
        .harvests
        .iter()
        .find(|info| info.terrain_harvester)
        .map(|info| info.resource)
}

fn cannot_harvest(worker: UnitHandle, reason: String) -> GameError {
    GameError::CannotHarvest {
        unit: worker.to_string(),
        reason,
    }
}
