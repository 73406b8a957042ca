//! Headless game runner implementation.

use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::path::Path;

use skirmish_core::data::ScenarioData;
use skirmish_core::events::TickEvents;
use skirmish_core::math::TilePos;
use skirmish_core::missile::FireTarget;
use skirmish_core::player::ResourceKind;
use skirmish_core::replay::Replay;
use skirmish_core::simulation::{SimCommand, Simulation};
use skirmish_core::unit::UnitHandle;
use tracing::{debug, info, warn};

use crate::error::{HeadlessError, Result};
use crate::metrics::{GameMetrics, MetricsCollector};
use crate::protocol::{
    Command, DeliveryReport, GameState, PlayerState, Response, TickReport, UnitState,
    PROTOCOL_VERSION,
};

/// Runner options.
#[derive(Debug, Clone, Default)]
pub struct HeadlessConfig {
    /// Record every command for a replay.
    pub record_replay: bool,
    /// Identifier used in metrics; defaults to the scenario name.
    pub game_id: Option<String>,
}

/// Drives one simulation: applies commands, runs ticks, records the
/// replay and collects metrics.
#[derive(Debug)]
pub struct HeadlessRunner {
    sim: Simulation,
    scenario: String,
    names: BTreeMap<UnitHandle, String>,
    replay: Option<Replay>,
    collector: MetricsCollector,
}

impl HeadlessRunner {
    /// Build a runner from parsed scenario data.
    ///
    /// # Errors
    ///
    /// Returns an error if the scenario does not load or, when recording,
    /// the starting state cannot be serialized.
    pub fn from_scenario(data: &ScenarioData, config: &HeadlessConfig) -> Result<Self> {
        let sim = Simulation::from_scenario(data)?;
        let replay = if config.record_replay {
            Some(Replay::new(data.name.clone(), &sim)?)
        } else {
            None
        };
        let game_id = config
            .game_id
            .clone()
            .unwrap_or_else(|| format!("{}-{}", data.name, data.config.seed));
        let names = sim
            .labels()
            .map(|(label, handle)| (handle, label.to_string()))
            .collect();
        info!(scenario = %data.name, seed = data.config.seed, units = sim.world().units.len(), "runner ready");
        Ok(Self {
            collector: MetricsCollector::new(game_id, data.name.clone(), data.config.seed),
            scenario: data.name.clone(),
            sim,
            names,
            replay,
        })
    }

    /// Load a scenario file and build a runner.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the scenario does
    /// not load.
    pub fn load(path: &Path, seed: Option<u64>, config: &HeadlessConfig) -> Result<Self> {
        let data = crate::scenario::load_scenario_with_seed(path, seed)?;
        Self::from_scenario(&data, config)
    }

    /// The simulation being driven.
    #[must_use]
    pub fn simulation(&self) -> &Simulation {
        &self.sim
    }

    /// Scenario name.
    #[must_use]
    pub fn scenario(&self) -> &str {
        &self.scenario
    }

    /// Metrics collected so far.
    #[must_use]
    pub fn metrics(&self) -> &GameMetrics {
        self.collector.metrics()
    }

    /// Run `count` ticks and merge their events.
    pub fn tick(&mut self, count: u32) -> TickEvents {
        let mut merged = TickEvents::default();
        for _ in 0..count {
            let mut events = self.sim.tick();
            let missiles = self.sim.missiles().len();
            self.collector
                .record_tick(self.sim.get_tick(), &events, self.sim.world(), missiles);
            merged.append(&mut events);
        }
        merged
    }

    /// Run until `max_ticks` have elapsed.
    pub fn run_until(&mut self, max_ticks: u64) {
        while self.sim.get_tick() < max_ticks {
            self.tick(1);
        }
    }

    /// Apply a command and record it for the replay.
    ///
    /// # Errors
    ///
    /// Returns the engine's refusal; nothing is recorded then.
    pub fn apply(&mut self, command: SimCommand) -> Result<()> {
        self.sim.apply_command(command)?;
        if let Some(replay) = self.replay.as_mut() {
            replay.record_command(self.sim.get_tick(), command);
        }
        Ok(())
    }

    /// The replay recorded so far, stamped with the current tick and hash.
    #[must_use]
    pub fn replay(&self) -> Option<Replay> {
        self.replay.as_ref().map(|r| {
            let mut replay = r.clone();
            replay.finalize(self.sim.get_tick(), self.sim.state_hash());
            replay
        })
    }

    /// Close the game and return its metrics.
    #[must_use]
    pub fn finish(mut self) -> GameMetrics {
        self.collector.finalize(&self.sim);
        self.collector.into_metrics()
    }

    fn unit(&self, label: &str) -> Result<UnitHandle> {
        self.sim
            .unit_by_label(label)
            .ok_or_else(|| HeadlessError::Protocol(format!("unknown unit label '{label}'")))
    }

    fn name_of(&self, handle: UnitHandle) -> String {
        self.names
            .get(&handle)
            .cloned()
            .unwrap_or_else(|| handle.to_string())
    }

    fn to_sim_command(&self, command: &Command) -> Result<Option<SimCommand>> {
        let command = match command {
            Command::Harvest { worker, mine } => SimCommand::Harvest {
                worker: self.unit(worker)?,
                mine: self.unit(mine)?,
            },
            Command::HarvestTerrain { worker, x, y } => SimCommand::HarvestTerrain {
                worker: self.unit(worker)?,
                tile: TilePos::new(*x, *y),
            },
            Command::ReturnGoods { worker, depot } => SimCommand::ReturnGoods {
                worker: self.unit(worker)?,
                depot: depot.as_deref().map(|d| self.unit(d)).transpose()?,
            },
            Command::Attack { attacker, target } => SimCommand::Fire {
                attacker: self.unit(attacker)?,
                target: FireTarget::Unit(self.unit(target)?),
            },
            Command::AttackTile { attacker, x, y } => SimCommand::Fire {
                attacker: self.unit(attacker)?,
                target: FireTarget::Tile(TilePos::new(*x, *y)),
            },
            Command::Cancel { unit } => SimCommand::Cancel {
                unit: self.unit(unit)?,
            },
            _ => return Ok(None),
        };
        Ok(Some(command))
    }

    /// Handle one protocol command.
    pub fn handle(&mut self, command: &Command) -> Response {
        match command {
            Command::Tick { count } => {
                let events = self.tick(*count);
                Response::TickReport(self.report(&events))
            }
            Command::Query => Response::State(self.state()),
            Command::Hash | Command::Quit => {
                let tick = self.sim.get_tick();
                let hash = self.sim.state_hash();
                if matches!(command, Command::Quit) {
                    Response::Bye { tick, hash }
                } else {
                    Response::Hash { tick, hash }
                }
            }
            Command::SaveReplay { path } => match self.replay() {
                Some(replay) => match replay.save(path) {
                    Ok(()) => Response::Ack {
                        cmd: command.name().to_string(),
                    },
                    Err(e) => Response::error(e.to_string()),
                },
                None => Response::error("replay recording is off"),
            },
            order => {
                let applied = self
                    .to_sim_command(order)
                    .and_then(|c| c.map_or(Ok(()), |c| self.apply(c)));
                match applied {
                    Ok(()) => Response::Ack {
                        cmd: order.name().to_string(),
                    },
                    Err(e) => {
                        debug!(cmd = order.name(), error = %e, "command rejected");
                        Response::error(e.to_string())
                    }
                }
            }
        }
    }

    /// Summarize merged tick events.
    #[must_use]
    pub fn report(&self, events: &TickEvents) -> TickReport {
        let sounds = events
            .sounds
            .iter()
            .map(|s| {
                self.sim
                    .sounds()
                    .name(s.sound)
                    .map_or_else(|| format!("{:?}", s.sound), str::to_string)
            })
            .collect();
        TickReport {
            tick: self.sim.get_tick(),
            hash: self.sim.state_hash(),
            deliveries: events
                .deliveries
                .iter()
                .map(|d| DeliveryReport {
                    worker: self.name_of(d.worker),
                    player: d.player.0,
                    resource: d.resource.name().to_string(),
                    credited: d.credited,
                })
                .collect(),
            deaths: events.deaths.iter().map(|h| self.name_of(*h)).collect(),
            damage_dealt: events.damage_events.iter().map(|d| i64::from(d.amount)).sum(),
            walls_destroyed: events
                .wall_events
                .iter()
                .filter(|w| w.destroyed)
                .map(|w| (w.tile.x, w.tile.y))
                .collect(),
            forest_cleared: events.forest_cleared.iter().map(|t| (t.x, t.y)).collect(),
            gave_up: events.gave_up.iter().map(|h| self.name_of(*h)).collect(),
            sounds,
        }
    }

    /// Snapshot the game for controllers.
    #[must_use]
    pub fn state(&self) -> GameState {
        let world = self.sim.world();
        let players = world
            .players
            .iter()
            .map(|p| PlayerState {
                id: p.id.0,
                name: p.name.clone(),
                gold: p.resource(ResourceKind::Gold),
                wood: p.resource(ResourceKind::Wood),
                oil: p.resource(ResourceKind::Oil),
            })
            .collect();
        let units = world
            .units
            .iter()
            .filter(|u| !u.destroyed)
            .map(|u| UnitState {
                label: self.names.get(&u.handle).cloned(),
                handle: u.handle.to_string(),
                unit_type: world
                    .unit_types
                    .get(u.type_id)
                    .map(|t| t.ident.clone())
                    .unwrap_or_default(),
                player: u.player.0,
                x: u.tile_pos.x,
                y: u.tile_pos.y,
                hp: u.hp,
                max_hp: u.max_hp,
                carrying: u
                    .current_resource
                    .filter(|_| u.resources_held > 0)
                    .map(|r| (r.name().to_string(), u.resources_held)),
                harvest_state: u.order.as_resource().map(|o| o.state),
                inside: u.container.is_some(),
            })
            .collect();
        GameState {
            tick: self.sim.get_tick(),
            hash: self.sim.state_hash(),
            players,
            units,
            missiles: self.sim.missiles().len(),
        }
    }

    /// Serve the JSON-lines protocol until `quit` or end of input.
    ///
    /// Malformed lines get an error response and the session goes on.
    ///
    /// # Errors
    ///
    /// Returns an error if reading input or writing output fails.
    pub fn run_protocol<R: BufRead, W: Write>(&mut self, input: R, mut output: W) -> Result<()> {
        write_response(
            &mut output,
            &Response::Ready {
                version: PROTOCOL_VERSION.to_string(),
                scenario: self.scenario.clone(),
                tick: self.sim.get_tick(),
            },
        )?;

        for line in input.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let response = match serde_json::from_str::<Command>(line) {
                Ok(command) => {
                    let response = self.handle(&command);
                    if matches!(command, Command::Quit) {
                        write_response(&mut output, &response)?;
                        return Ok(());
                    }
                    response
                }
                Err(e) => {
                    warn!(error = %e, "unparseable command");
                    Response::error(format!("bad command: {e}"))
                }
            };
            write_response(&mut output, &response)?;
        }

        write_response(
            &mut output,
            &Response::Bye {
                tick: self.sim.get_tick(),
                hash: self.sim.state_hash(),
            },
        )
    }
}

fn write_response<W: Write>(output: &mut W, response: &Response) -> Result<()> {
    serde_json::to_writer(&mut *output, response)?;
    output.write_all(b"\n")?;
    output.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use skirmish_core::replay::ReplayPlayer;
    use skirmish_test_utils::fixtures::{battle_data, economy_data};

    fn recording() -> HeadlessConfig {
        HeadlessConfig {
            record_replay: true,
            game_id: None,
        }
    }

    fn session(runner: &mut HeadlessRunner, input: &str) -> Vec<serde_json::Value> {
        let mut out = Vec::new();
        runner
            .run_protocol(input.as_bytes(), &mut out)
            .expect("session runs");
        String::from_utf8(out)
            .expect("utf8")
            .lines()
            .map(|l| serde_json::from_str(l).expect("json line"))
            .collect()
    }

    #[test]
    fn test_protocol_session() {
        let mut runner =
            HeadlessRunner::from_scenario(&economy_data(1), &HeadlessConfig::default())
                .expect("runner");
        let lines = session(
            &mut runner,
            r#"{"cmd":"tick","count":5}
{"cmd":"query"}
not json
{"cmd":"cancel","unit":"logger"}
{"cmd":"cancel","unit":"ghost"}
{"cmd":"quit"}
{"cmd":"tick"}
"#,
        );
        assert_eq!(lines.len(), 7);
        assert_eq!(lines[0]["type"], "ready");
        assert_eq!(lines[1]["type"], "tick_report");
        assert_eq!(lines[1]["tick"], 5);
        assert_eq!(lines[2]["type"], "state");
        assert!(lines[2]["units"]
            .as_array()
            .expect("units")
            .iter()
            .any(|u| u["label"] == "mine"));
        assert_eq!(lines[3]["type"], "error");
        assert_eq!(lines[4]["type"], "ack");
        assert_eq!(lines[5]["type"], "error");
        assert_eq!(lines[6]["type"], "bye");
        assert_eq!(runner.simulation().get_tick(), 5);
    }

    #[test]
    fn test_end_of_input_says_bye() {
        let mut runner =
            HeadlessRunner::from_scenario(&economy_data(1), &HeadlessConfig::default())
                .expect("runner");
        let lines = session(&mut runner, "{\"cmd\":\"hash\"}\n");
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1]["type"], "hash");
        assert_eq!(lines[2]["type"], "bye");
    }

    #[test]
    fn test_recorded_commands_replay_exactly() {
        let mut runner = HeadlessRunner::from_scenario(&battle_data(3), &recording()).expect("runner");
        for round in 0..4 {
            runner.tick(15);
            let attack = if round % 2 == 0 {
                Command::Attack {
                    attacker: "red-archer-2".into(),
                    target: "blue-archer-2".into(),
                }
            } else {
                Command::AttackTile {
                    attacker: "red-catapult".into(),
                    x: 10,
                    y: 4,
                }
            };
            assert!(matches!(runner.handle(&attack), Response::Ack { .. }));
        }
        runner.tick(60);

        let replay = runner.replay().expect("recording");
        assert_eq!(replay.command_count(), 4);
        assert_eq!(replay.final_hash, runner.simulation().state_hash());

        let mut player = ReplayPlayer::new(replay).expect("player");
        player.verify().expect("replay reproduces the game");
    }

    #[test]
    fn test_save_replay_without_recording() {
        let mut runner =
            HeadlessRunner::from_scenario(&economy_data(1), &HeadlessConfig::default())
                .expect("runner");
        let response = runner.handle(&Command::SaveReplay {
            path: "unused.replay".into(),
        });
        assert!(matches!(response, Response::Error { .. }));
    }

    #[test]
    fn test_metrics_follow_deliveries() {
        let mut runner =
            HeadlessRunner::from_scenario(&economy_data(2), &HeadlessConfig::default())
                .expect("runner");
        let mut delivered = 0;
        for _ in 0..10 {
            let events = runner.tick(100);
            delivered += runner.report(&events).deliveries.len();
        }
        let metrics = runner.finish();
        assert_eq!(metrics.total_deliveries() as usize, delivered);
        assert_eq!(metrics.duration_ticks, 1000);
    }
}
