//! Test fixtures and helpers.
//!
//! Ready-made scenarios in RON, loaded through the same path as scenario
//! files on disk.

use skirmish_core::data::ScenarioData;
use skirmish_core::simulation::{SimCommand, Simulation};
use skirmish_core::missile::FireTarget;

/// Content shared by every fixture: missiles, fire tiers and unit types.
const CONTENT: &str = r#"
    sounds: ["arrow-hit", "explosion", "building-burn"],
    missile_types: [
        (ident: "missile-arrow", class: PointToPoint, width: 8, height: 8, speed: 16,
            impact_sound: Some("arrow-hit")),
        (ident: "missile-catapult-rock", class: Parabolic, width: 16, height: 16, speed: 8,
            range: 1, splash_factor: 4, smoke_missile: Some("missile-smoke"),
            impact_missile: Some("missile-explosion"), impact_sound: Some("explosion")),
        (ident: "missile-smoke", class: CycleOnce, width: 8, height: 8, sprite_frames: 3,
            sleep: 2, draw_level: 60),
        (ident: "missile-explosion", class: CycleOnce, width: 32, height: 32, sprite_frames: 4,
            sleep: 2, draw_level: 50, impact_particle: Some("dust")),
        (ident: "missile-small-fire", class: Fire, width: 32, height: 48, sprite_frames: 4,
            sleep: 3, draw_level: 40, impact_sound: Some("building-burn")),
        (ident: "missile-big-fire", class: Fire, width: 48, height: 48, sprite_frames: 4,
            sleep: 3, draw_level: 40),
    ],
    burning_tiers: [
        (percent: 75, missile: None),
        (percent: 50, missile: Some("missile-small-fire")),
        (percent: 25, missile: Some("missile-big-fire")),
    ],
    unit_types: [
        (ident: "unit-peasant", stats: (max_hp: 30, armor: 0, basic_damage: 3, piercing_damage: 2),
            harvests: [
                (resource: Gold, capacity: 100, step: 25, wait_at_resource: 3, wait_at_depot: 2),
                (resource: Wood, capacity: 100, step: 0, wait_at_resource: 6, wait_at_depot: 2,
                    harvest_from_outside: true, terrain_harvester: true),
            ]),
        (ident: "unit-archer", stats: (max_hp: 40, armor: 0, basic_damage: 3, piercing_damage: 6),
            missile: Some("missile-arrow")),
        (ident: "unit-catapult", stats: (max_hp: 110, armor: 0, basic_damage: 80, piercing_damage: 0),
            ticks_per_tile: 3, missile: Some("missile-catapult-rock")),
        (ident: "unit-town-hall", tile_width: 3, tile_height: 3, building: true,
            stats: (max_hp: 1200, armor: 20, basic_damage: 0, piercing_damage: 0),
            can_store: [Gold, Wood]),
        (ident: "unit-barracks", tile_width: 3, tile_height: 3, building: true,
            stats: (max_hp: 800, armor: 20, basic_damage: 0, piercing_damage: 0)),
        (ident: "unit-gold-mine", tile_width: 3, tile_height: 3, building: true,
            stats: (max_hp: 25500, armor: 20, basic_damage: 0, piercing_damage: 0),
            gives_resource: Some(Gold), starting_resources: 10000, max_on_board: 1),
    ],
"#;

const ECONOMY: &str = r#"
    name: "economy",
    map: [
        "....................TTTT",
        "....................TTTT",
        "....................TTTT",
        "....................TTTT",
        "....................TTTT",
        "....................TTTT",
        "....................TTTT",
        "....................TTTT",
        "....................TTTT",
        "....................TTTT",
    ],
    players: [
        (id: 0, name: "Red", team: 0),
        (id: 1, name: "Neutral", team: 255, neutral: true),
    ],
    units: [
        (label: Some("hall"), unit_type: "unit-town-hall", player: 0, x: 2, y: 3),
        (label: Some("mine"), unit_type: "unit-gold-mine", player: 1, x: 11, y: 3),
        (label: Some("p1"), unit_type: "unit-peasant", player: 0, x: 7, y: 2),
        (label: Some("p2"), unit_type: "unit-peasant", player: 0, x: 7, y: 4),
        (label: Some("p3"), unit_type: "unit-peasant", player: 0, x: 7, y: 6),
        (label: Some("logger"), unit_type: "unit-peasant", player: 0, x: 16, y: 8),
    ],
    orders: [
        Harvest(worker: "p1", mine: "mine"),
        Harvest(worker: "p2", mine: "mine"),
        Harvest(worker: "p3", mine: "mine"),
        HarvestTerrain(worker: "logger", x: 20, y: 8),
    ],
"#;

const BATTLE: &str = r#"
    name: "battle",
    map: [
        "....................",
        "....................",
        "....................",
        ".........HH.........",
        ".........HH.........",
        ".........OO.........",
        "....................",
        "....................",
    ],
    players: [
        (id: 0, name: "Red", team: 0),
        (id: 1, name: "Blue", team: 1),
    ],
    units: [
        (label: Some("red-archer-1"), unit_type: "unit-archer", player: 0, x: 3, y: 1),
        (label: Some("red-archer-2"), unit_type: "unit-archer", player: 0, x: 3, y: 6),
        (label: Some("red-catapult"), unit_type: "unit-catapult", player: 0, x: 2, y: 4),
        (label: Some("blue-archer-1"), unit_type: "unit-archer", player: 1, x: 16, y: 1),
        (label: Some("blue-archer-2"), unit_type: "unit-archer", player: 1, x: 16, y: 6),
        (label: Some("blue-barracks"), unit_type: "unit-barracks", player: 1, x: 15, y: 3),
    ],
    orders: [
        Attack(attacker: "red-archer-1", target: "blue-archer-1"),
        Attack(attacker: "blue-archer-2", target: "red-archer-2"),
        Attack(attacker: "red-catapult", target: "blue-barracks"),
    ],
"#;

/// Pairs of (attacker, target) labels that keep fighting in the battle
/// fixture.
pub const BATTLE_PAIRS: [(&str, &str); 4] = [
    ("red-archer-1", "blue-archer-1"),
    ("red-archer-2", "blue-archer-2"),
    ("blue-archer-1", "red-archer-1"),
    ("red-catapult", "blue-barracks"),
];

/// Parse a fixture body with the shared content and the given seed.
///
/// # Panics
///
/// Panics if the fixture text is invalid.
#[must_use]
pub fn scenario(body: &str, seed: u64) -> ScenarioData {
    let text = format!("ScenarioData({body}{CONTENT})");
    let mut data = ScenarioData::from_ron(&text, "fixture").expect("fixture scenario parses");
    data.config.seed = seed;
    data
}

/// Scenario data for [`economy`].
#[must_use]
pub fn economy_data(seed: u64) -> ScenarioData {
    scenario(ECONOMY, seed)
}

/// Scenario data for [`battle`].
#[must_use]
pub fn battle_data(seed: u64) -> ScenarioData {
    scenario(BATTLE, seed)
}

/// Three peasants mining one single-slot gold mine and a logger in the
/// forest, next to a town hall.
///
/// # Panics
///
/// Panics if the fixture cannot be built.
#[must_use]
pub fn economy(seed: u64) -> Simulation {
    Simulation::from_scenario(&economy_data(seed)).expect("economy fixture builds")
}

/// Archers and a catapult on each side of a wall, with an enemy barracks
/// that catches fire once damaged.
///
/// # Panics
///
/// Panics if the fixture cannot be built.
#[must_use]
pub fn battle(seed: u64) -> Simulation {
    Simulation::from_scenario(&battle_data(seed)).expect("battle fixture builds")
}

/// Fire commands for every [`BATTLE_PAIRS`] entry whose units are alive.
#[must_use]
pub fn battle_volley(sim: &Simulation) -> Vec<SimCommand> {
    BATTLE_PAIRS
        .iter()
        .filter_map(|(attacker, target)| {
            let attacker = sim.unit_by_label(attacker)?;
            let target = sim.unit_by_label(target)?;
            let units = &sim.world().units;
            (units.is_alive(attacker) && units.is_alive(target)).then_some(SimCommand::Fire {
                attacker,
                target: FireTarget::Unit(target),
            })
        })
        .collect()
}

/// Tick `sim` `ticks` times, firing a volley every `interval` ticks.
///
/// # Panics
///
/// Panics if a volley command is rejected.
pub fn run_battle(sim: &mut Simulation, ticks: u64, interval: u64) {
    for _ in 0..ticks {
        if sim.get_tick() % interval.max(1) == 0 {
            for command in battle_volley(sim) {
                sim.apply_command(command).expect("volley command");
            }
        }
        sim.tick();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixtures_build() {
        let sim = economy(1);
        assert_eq!(sim.world().players.len(), 2);
        assert!(sim.unit_by_label("logger").is_some());

        let sim = battle(1);
        assert_eq!(sim.missiles().len(), 3);
        assert_eq!(battle_volley(&sim).len(), 4);
    }

    #[test]
    fn test_seed_is_applied() {
        assert_eq!(economy(99).world().config.seed, 99);
    }
}
