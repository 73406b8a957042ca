//! Replay recording and playback.
//!
//! A replay stores the simulation as it stood before the first tick and
//! every command applied afterwards. Playing the commands back on the
//! stored state reproduces the game exactly.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

use crate::error::{GameError, Result};
use crate::simulation::{SimCommand, Simulation};

/// A command and the tick it was applied before.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayCommand {
    /// Simulation tick when the command was issued.
    pub tick: u64,
    /// The command.
    pub command: SimCommand,
}

/// Replay file format version.
pub const REPLAY_VERSION: u32 = 1;

/// A recorded game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Replay {
    /// Replay format version.
    pub version: u32,
    /// Scenario name.
    pub scenario_id: String,
    /// Random seed used for the game.
    pub seed: u64,
    /// Serialized initial simulation state.
    pub initial_state: Vec<u8>,
    /// Commands in tick order.
    pub commands: Vec<ReplayCommand>,
    /// Tick the recording stopped at.
    pub final_tick: u64,
    /// State hash at `final_tick`.
    pub final_hash: u64,
}

impl Replay {
    /// Start a replay from the simulation's current state.
    ///
    /// # Errors
    ///
    /// Returns an error if the simulation cannot be serialized.
    pub fn new(scenario_id: impl Into<String>, initial_state: &Simulation) -> Result<Self> {
        Ok(Self {
            version: REPLAY_VERSION,
            scenario_id: scenario_id.into(),
            seed: initial_state.world().config.seed,
            initial_state: initial_state.serialize()?,
            commands: Vec::new(),
            final_tick: initial_state.get_tick(),
            final_hash: initial_state.state_hash(),
        })
    }

    /// Record a command applied before `tick` ran.
    pub fn record_command(&mut self, tick: u64, command: SimCommand) {
        self.commands.push(ReplayCommand { tick, command });
    }

    /// Store the end-of-game tick and hash.
    pub fn finalize(&mut self, final_tick: u64, final_hash: u64) {
        self.final_tick = final_tick;
        self.final_hash = final_hash;
    }

    /// Encode with bincode.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| GameError::InvalidState(format!("Failed to serialize replay: {e}")))
    }

    /// Decode and check the format version.
    ///
    /// # Errors
    ///
    /// Returns an error for corrupt data or a different format version.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let replay: Self = bincode::deserialize(bytes)
            .map_err(|e| GameError::InvalidState(format!("Failed to deserialize replay: {e}")))?;
        if replay.version != REPLAY_VERSION {
            return Err(GameError::InvalidState(format!(
                "Replay version mismatch: expected {REPLAY_VERSION}, got {}",
                replay.version
            )));
        }
        Ok(replay)
    }

    /// Save the replay to a file.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or writing fails.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path.as_ref(), self.to_bytes()?)
            .map_err(|e| GameError::InvalidState(format!("Failed to write replay file: {e}")))
    }

    /// Load a replay from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if reading or decoding fails.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())
            .map_err(|e| GameError::InvalidState(format!("Failed to read replay file: {e}")))?;
        Self::from_bytes(&bytes)
    }

    /// The simulation as it was when recording started.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored state cannot be decoded.
    pub fn restore_initial_state(&self) -> Result<Simulation> {
        Simulation::deserialize(&self.initial_state)
    }

    /// Commands issued at `tick`.
    #[must_use]
    pub fn commands_at_tick(&self, tick: u64) -> Vec<&ReplayCommand> {
        self.commands.iter().filter(|c| c.tick == tick).collect()
    }

    /// Final tick of the replay.
    #[must_use]
    pub const fn duration(&self) -> u64 {
        self.final_tick
    }

    /// Number of recorded commands.
    #[must_use]
    pub fn command_count(&self) -> usize {
        self.commands.len()
    }
}

/// Replay playback controller.
#[derive(Debug)]
pub struct ReplayPlayer {
    replay: Replay,
    simulation: Simulation,
    command_index: usize,
    /// Whether playback is paused.
    pub paused: bool,
}

impl ReplayPlayer {
    /// Start playback at the recorded initial state.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial state cannot be restored.
    pub fn new(replay: Replay) -> Result<Self> {
        let simulation = replay.restore_initial_state()?;
        Ok(Self {
            replay,
            simulation,
            command_index: 0,
            paused: false,
        })
    }

    /// Apply this tick's commands and run one tick.
    ///
    /// Returns true if there are more ticks to play.
    pub fn advance(&mut self) -> bool {
        if self.paused || self.is_finished() {
            return !self.is_finished();
        }
        self.step();
        !self.is_finished()
    }

    fn step(&mut self) {
        let tick = self.simulation.get_tick();
        while let Some(record) = self.replay.commands.get(self.command_index) {
            if record.tick > tick {
                break;
            }
            if let Err(e) = self.simulation.apply_command(record.command) {
                warn!(tick, command = ?record.command, error = %e, "replayed command rejected");
            }
            self.command_index += 1;
        }
        self.simulation.tick();
    }

    /// Restart from the initial state and play up to `target_tick`.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial state cannot be restored.
    pub fn seek(&mut self, target_tick: u64) -> Result<()> {
        self.simulation = self.replay.restore_initial_state()?;
        self.command_index = 0;
        let target = target_tick.min(self.replay.final_tick);
        while self.simulation.get_tick() < target {
            self.step();
        }
        Ok(())
    }

    /// Current tick.
    #[must_use]
    pub const fn current_tick(&self) -> u64 {
        self.simulation.get_tick()
    }

    /// The simulation being played.
    #[must_use]
    pub const fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    /// The replay being played.
    #[must_use]
    pub const fn replay(&self) -> &Replay {
        &self.replay
    }

    /// True once the final tick has been reached.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.simulation.get_tick() >= self.replay.final_tick
    }

    /// Play the whole replay and compare against the recorded hash.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::DesyncDetected`] when the hashes differ.
    pub fn verify(&mut self) -> Result<()> {
        self.seek(self.replay.final_tick)?;
        let local_hash = self.simulation.state_hash();
        if local_hash != self.replay.final_hash {
            return Err(GameError::DesyncDetected {
                tick: self.simulation.get_tick(),
                local_hash,
                remote_hash: self.replay.final_hash,
            });
        }
        Ok(())
    }

    /// Toggle pause state.
    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }

    /// Progress through the replay, 0 to 100.
    #[must_use]
    pub fn progress_percent(&self) -> u64 {
        if self.replay.final_tick == 0 {
            100
        } else {
            self.current_tick().min(self.replay.final_tick) * 100 / self.replay.final_tick
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DuplicatePolicy, SimConfig};
    use crate::map::TileMap;
    use crate::math::TilePos;
    use crate::missile::{FireTarget, MissileClass, MissileTypeRegistry};
    use crate::player::{Player, PlayerId};
    use crate::sound::SoundTable;
    use crate::unit::UnitHandle;
    use crate::unit_type::{UnitStats, UnitType, UnitTypeRegistry};
    use crate::world::World;

    fn create_test_simulation() -> (Simulation, UnitHandle, UnitHandle) {
        let mut unit_types = UnitTypeRegistry::new(DuplicatePolicy::Error);
        let knight = unit_types
            .register(UnitType {
                stats: UnitStats {
                    max_hp: 90,
                    armor: 2,
                    basic_damage: 8,
                    piercing_damage: 4,
                },
                missile: Some("missile-axe".into()),
                ..UnitType::new("unit-thrower", 90)
            })
            .expect("register");
        let mut world = World::new(SimConfig::with_seed(12345), TileMap::new(16, 4), unit_types);
        world.add_player(Player::new(PlayerId(0), "Red", 0)).expect("player");
        world.add_player(Player::new(PlayerId(1), "Blue", 1)).expect("player");
        let a = world.spawn_unit(knight, PlayerId(0), TilePos::new(1, 1)).expect("spawn");
        let b = world.spawn_unit(knight, PlayerId(1), TilePos::new(9, 1)).expect("spawn");

        let mut types = MissileTypeRegistry::new(DuplicatePolicy::Error);
        let axe = types.register("missile-axe").expect("register");
        axe.class = MissileClass::PointToPoint;
        axe.speed = 16;
        let sim = Simulation::new(world, types, SoundTable::new()).expect("simulation");
        (sim, a, b)
    }

    fn record(ticks: u64) -> Replay {
        let (mut sim, a, b) = create_test_simulation();
        let mut replay = Replay::new("duel", &sim).expect("replay");
        for tick in 0..ticks {
            if tick % 10 == 0 {
                let command = SimCommand::Fire {
                    attacker: a,
                    target: FireTarget::Unit(b),
                };
                sim.apply_command(command).expect("fire");
                replay.record_command(tick, command);
            }
            sim.tick();
        }
        replay.finalize(sim.get_tick(), sim.state_hash());
        replay
    }

    #[test]
    fn test_replay_create() {
        let (sim, _, _) = create_test_simulation();
        let replay = Replay::new("test_scenario", &sim).expect("replay");
        assert_eq!(replay.version, REPLAY_VERSION);
        assert_eq!(replay.scenario_id, "test_scenario");
        assert_eq!(replay.seed, 12345);
        assert!(replay.commands.is_empty());
    }

    #[test]
    fn test_replay_record_commands() {
        let replay = record(35);
        assert_eq!(replay.command_count(), 4);
        assert_eq!(replay.commands_at_tick(10).len(), 1);
        assert!(replay.commands_at_tick(7).is_empty());
        assert_eq!(replay.duration(), 35);
    }

    #[test]
    fn test_replay_bytes_round_trip() {
        let replay = record(20);
        let loaded = Replay::from_bytes(&replay.to_bytes().expect("encode")).expect("decode");
        assert_eq!(loaded.command_count(), replay.command_count());
        assert_eq!(loaded.final_hash, replay.final_hash);
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let mut replay = record(5);
        replay.version = REPLAY_VERSION + 1;
        let bytes = bincode::serialize(&replay).expect("encode");
        assert!(matches!(
            Replay::from_bytes(&bytes),
            Err(GameError::InvalidState(_))
        ));
    }

    #[test]
    fn test_playback_matches_recording() {
        let replay = record(60);
        let mut player = ReplayPlayer::new(replay).expect("player");
        player.verify().expect("replay reproduces the recorded hash");
        assert!(player.is_finished());
        assert_eq!(player.progress_percent(), 100);
    }

    #[test]
    fn test_tampered_hash_is_desync() {
        let mut replay = record(30);
        replay.final_hash ^= 1;
        let mut player = ReplayPlayer::new(replay).expect("player");
        assert!(matches!(
            player.verify(),
            Err(GameError::DesyncDetected { tick: 30, .. })
        ));
    }

    #[test]
    fn test_pause_and_seek() {
        let mut player = ReplayPlayer::new(record(40)).expect("player");
        player.toggle_pause();
        assert!(player.advance());
        assert_eq!(player.current_tick(), 0);
        player.toggle_pause();
        player.advance();
        assert_eq!(player.current_tick(), 1);
        player.seek(25).expect("seek");
        assert_eq!(player.current_tick(), 25);
        assert_eq!(player.progress_percent(), 62);
    }
}
