//! Game metrics collection for reports and batch summaries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use skirmish_core::events::TickEvents;
use skirmish_core::player::{PlayerId, ResourceKind};
use skirmish_core::simulation::Simulation;
use skirmish_core::world::World;

/// Complete metrics for a single game.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameMetrics {
    /// Unique game identifier.
    pub game_id: String,
    /// Scenario name.
    pub scenario: String,
    /// Random seed used.
    pub seed: u64,
    /// Total game duration in ticks.
    pub duration_ticks: u64,
    /// Per-player metrics, keyed by player name.
    pub players: BTreeMap<String, PlayerMetrics>,
    /// Timed events log.
    pub events: Vec<TimedEvent>,
    /// Most missiles alive at once.
    pub peak_missiles: usize,
    /// Final simulation state hash (for determinism validation).
    pub final_state_hash: u64,
}

impl GameMetrics {
    /// Create a new game metrics instance.
    #[must_use]
    pub fn new(game_id: impl Into<String>, scenario: impl Into<String>, seed: u64) -> Self {
        Self {
            game_id: game_id.into(),
            scenario: scenario.into(),
            seed,
            ..Default::default()
        }
    }

    /// Get or create player metrics.
    pub fn player_mut(&mut self, name: &str) -> &mut PlayerMetrics {
        self.players
            .entry(name.to_string())
            .or_insert_with(|| PlayerMetrics::new(name))
    }

    /// Record a timed event.
    pub fn record_event(&mut self, tick: u64, event_type: EventType, details: impl Into<String>) {
        self.events.push(TimedEvent {
            tick,
            event_type,
            details: details.into(),
        });
    }

    /// Total deliveries across all players.
    #[must_use]
    pub fn total_deliveries(&self) -> u32 {
        self.players.values().map(|p| p.deliveries).sum()
    }

    /// Total unit deaths across all players.
    #[must_use]
    pub fn total_deaths(&self) -> u32 {
        self.players.values().map(|p| p.units_lost).sum()
    }
}

/// Metrics for a single player in a game.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayerMetrics {
    /// Player name.
    pub name: String,
    /// Goods credited per resource name.
    pub gathered: BTreeMap<String, i64>,
    /// Trips that ended at a depot.
    pub deliveries: u32,
    /// Damage this player's units dealt.
    pub damage_dealt: i64,
    /// Damage this player's units took.
    pub damage_taken: i64,
    /// Units this player lost.
    pub units_lost: u32,
    /// Final stockpile per resource name.
    pub final_resources: BTreeMap<String, i32>,
}

impl PlayerMetrics {
    /// Empty metrics for a player.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }
}

/// A notable moment in a game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimedEvent {
    /// Tick when the event happened.
    pub tick: u64,
    /// Kind of event.
    pub event_type: EventType,
    /// Free-form details.
    pub details: String,
}

/// Kinds of timed events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    /// A unit died.
    UnitDied,
    /// A wall tile was knocked down.
    WallDestroyed,
    /// A forest tile was cut clear.
    ForestCleared,
    /// A worker stopped harvesting for want of a site.
    WorkerGaveUp,
}

/// Accumulates [`GameMetrics`] from tick events.
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector {
    metrics: GameMetrics,
}

fn player_name(world: &World, id: PlayerId) -> String {
    world
        .player(id)
        .map_or_else(|| id.to_string(), |p| p.name.clone())
}

impl MetricsCollector {
    /// Start collecting for a game.
    #[must_use]
    pub fn new(game_id: impl Into<String>, scenario: impl Into<String>, seed: u64) -> Self {
        Self {
            metrics: GameMetrics::new(game_id, scenario, seed),
        }
    }

    /// Fold one tick's events into the metrics.
    ///
    /// Owners are looked up in `world` after the tick; units whose slot
    /// has already been recycled are skipped.
    pub fn record_tick(&mut self, tick: u64, events: &TickEvents, world: &World, missiles: usize) {
        let metrics = &mut self.metrics;
        metrics.peak_missiles = metrics.peak_missiles.max(missiles);

        for delivery in &events.deliveries {
            let player = metrics.player_mut(&player_name(world, delivery.player));
            player.deliveries += 1;
            *player
                .gathered
                .entry(delivery.resource.name().to_string())
                .or_default() += i64::from(delivery.credited);
        }

        for damage in &events.damage_events {
            let amount = i64::from(damage.amount);
            if let Some(owner) = damage.attacker.and_then(|a| world.units.get(a)).map(|u| u.player) {
                metrics.player_mut(&player_name(world, owner)).damage_dealt += amount;
            }
            if let Some(owner) = world.units.get(damage.target).map(|u| u.player) {
                metrics.player_mut(&player_name(world, owner)).damage_taken += amount;
            }
        }

        for dead in &events.deaths {
            if let Some(owner) = world.units.get(*dead).map(|u| u.player) {
                metrics.player_mut(&player_name(world, owner)).units_lost += 1;
            }
            metrics.record_event(tick, EventType::UnitDied, dead.to_string());
        }

        for wall in events.wall_events.iter().filter(|w| w.destroyed) {
            metrics.record_event(
                tick,
                EventType::WallDestroyed,
                format!("{:?} wall at ({}, {})", wall.kind, wall.tile.x, wall.tile.y),
            );
        }
        for tile in &events.forest_cleared {
            metrics.record_event(tick, EventType::ForestCleared, format!("({}, {})", tile.x, tile.y));
        }
        for worker in &events.gave_up {
            metrics.record_event(tick, EventType::WorkerGaveUp, worker.to_string());
        }
    }

    /// Close the game: store the final tick, hash and stockpiles.
    pub fn finalize(&mut self, sim: &Simulation) {
        let world = sim.world();
        self.metrics.duration_ticks = sim.get_tick();
        self.metrics.final_state_hash = sim.state_hash();
        for player in &world.players {
            let entry = self.metrics.player_mut(&player.name);
            for kind in ResourceKind::ALL {
                entry
                    .final_resources
                    .insert(kind.name().to_string(), player.resource(kind));
            }
        }
    }

    /// Metrics collected so far.
    #[must_use]
    pub fn metrics(&self) -> &GameMetrics {
        &self.metrics
    }

    /// Take the collected metrics.
    #[must_use]
    pub fn into_metrics(self) -> GameMetrics {
        self.metrics
    }
}

/// Aggregate over a batch of games.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Games that finished.
    pub games: usize,
    /// Mean game length in ticks.
    pub average_ticks: f64,
    /// Mean deliveries per game.
    pub average_deliveries: f64,
    /// Mean unit deaths per game.
    pub average_deaths: f64,
    /// Mean goods gathered per game, per player and resource.
    pub average_gathered: BTreeMap<String, BTreeMap<String, f64>>,
    /// Distinct final hashes; equals `games` when every seed played out differently.
    pub distinct_final_hashes: usize,
}

impl BatchSummary {
    /// Summarize finished games.
    #[must_use]
    pub fn from_games(games: &[GameMetrics]) -> Self {
        if games.is_empty() {
            return Self::default();
        }
        let count = games.len() as f64;
        let mean = |total: f64| total / count;

        let mut average_gathered: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
        for game in games {
            for (name, player) in &game.players {
                let per_resource = average_gathered.entry(name.clone()).or_default();
                for (resource, amount) in &player.gathered {
                    *per_resource.entry(resource.clone()).or_default() += *amount as f64 / count;
                }
            }
        }

        let mut hashes: Vec<u64> = games.iter().map(|g| g.final_state_hash).collect();
        hashes.sort_unstable();
        hashes.dedup();

        Self {
            games: games.len(),
            average_ticks: mean(games.iter().map(|g| g.duration_ticks as f64).sum()),
            average_deliveries: mean(games.iter().map(|g| f64::from(g.total_deliveries())).sum()),
            average_deaths: mean(games.iter().map(|g| f64::from(g.total_deaths())).sum()),
            average_gathered,
            distinct_final_hashes: hashes.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skirmish_test_utils::fixtures::{battle, economy, run_battle};

    fn collect(mut sim: Simulation, ticks: u64) -> GameMetrics {
        let mut collector = MetricsCollector::new("test", "fixture", sim.world().config.seed);
        for _ in 0..ticks {
            let events = sim.tick();
            let missiles = sim.missiles().len();
            collector.record_tick(sim.get_tick(), &events, sim.world(), missiles);
        }
        collector.finalize(&sim);
        collector.into_metrics()
    }

    #[test]
    fn test_economy_metrics_match_stockpile() {
        let metrics = collect(economy(1), 1200);
        let red = &metrics.players["Red"];
        assert!(red.deliveries > 0);
        assert_eq!(
            red.gathered.get("gold").copied().unwrap_or_default(),
            i64::from(red.final_resources["gold"])
        );
        assert_eq!(metrics.duration_ticks, 1200);
    }

    #[test]
    fn test_battle_metrics_count_damage() {
        let mut sim = battle(4);
        run_battle(&mut sim, 60, 10);
        let metrics = collect(sim, 120);
        let dealt: i64 = metrics.players.values().map(|p| p.damage_dealt).sum();
        assert!(metrics.peak_missiles > 0 || dealt > 0);
    }

    #[test]
    fn test_summary_averages() {
        let mut a = GameMetrics::new("a", "s", 1);
        a.duration_ticks = 100;
        a.final_state_hash = 1;
        a.player_mut("Red").deliveries = 4;
        a.player_mut("Red").gathered.insert("gold".into(), 400);
        let mut b = GameMetrics::new("b", "s", 2);
        b.duration_ticks = 300;
        b.final_state_hash = 1;
        b.player_mut("Red").deliveries = 2;

        let summary = BatchSummary::from_games(&[a, b]);
        assert_eq!(summary.games, 2);
        assert!((summary.average_ticks - 200.0).abs() < f64::EPSILON);
        assert!((summary.average_deliveries - 3.0).abs() < f64::EPSILON);
        assert!((summary.average_gathered["Red"]["gold"] - 200.0).abs() < f64::EPSILON);
        assert_eq!(summary.distinct_final_hashes, 1);
    }

    #[test]
    fn test_empty_summary() {
        assert_eq!(BatchSummary::from_games(&[]).games, 0);
    }
}
