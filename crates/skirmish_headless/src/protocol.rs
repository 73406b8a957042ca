//! JSON protocol for headless play.
//!
//! The runner talks JSON lines (one JSON object per line):
//!
//! **Input (stdin):** commands from the controller
//! **Output (stdout):** responses and state
//!
//! Units are named by the labels given in the scenario file.
//!
//! # Protocol Flow
//!
//! 1. Runner starts, outputs `{"type":"ready",...}`
//! 2. The controller sends commands as JSON lines
//! 3. Every command gets exactly one response line
//! 4. `quit` or end of input ends the session with `{"type":"bye",...}`
//!
//! # Example Session
//!
//! ```text
//! <- {"type":"ready","version":"1.0","scenario":"gold rush","tick":0}
//! -> {"cmd":"tick","count":60}
//! <- {"type":"tick_report","tick":60,"hash":1234,"deliveries":[],...}
//! -> {"cmd":"harvest_terrain","worker":"red-logger","x":26,"y":2}
//! <- {"type":"ack","cmd":"harvest_terrain"}
//! -> {"cmd":"query"}
//! <- {"type":"state","tick":60,...}
//! ```

use serde::{Deserialize, Serialize};

/// Protocol version announced in the ready message.
pub const PROTOCOL_VERSION: &str = "1.0";

// ============================================================================
// Input Commands (controller -> runner)
// ============================================================================

/// Commands accepted by the headless runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    /// Advance simulation by N ticks (default: 1).
    Tick {
        /// Ticks to run.
        #[serde(default = "default_tick_count")]
        count: u32,
    },

    /// Query current game state without advancing time.
    Query,

    /// Current state hash.
    Hash,

    /// Send a worker to a resource site.
    Harvest {
        /// Worker label.
        worker: String,
        /// Resource site label.
        mine: String,
    },

    /// Send a worker to harvest terrain near a tile.
    HarvestTerrain {
        /// Worker label.
        worker: String,
        /// Tile column.
        x: i32,
        /// Tile row.
        y: i32,
    },

    /// Carry the worker's load home.
    ReturnGoods {
        /// Worker label.
        worker: String,
        /// Depot label; nearest depot when absent.
        #[serde(default)]
        depot: Option<String>,
    },

    /// Fire at a unit.
    Attack {
        /// Attacker label.
        attacker: String,
        /// Target label.
        target: String,
    },

    /// Fire at a tile.
    AttackTile {
        /// Attacker label.
        attacker: String,
        /// Tile column.
        x: i32,
        /// Tile row.
        y: i32,
    },

    /// Cancel a unit's current order.
    Cancel {
        /// Unit label.
        unit: String,
    },

    /// Write the replay recorded so far.
    SaveReplay {
        /// Output path.
        path: String,
    },

    /// End the session.
    Quit,
}

const fn default_tick_count() -> u32 {
    1
}

impl Command {
    /// The `cmd` tag of this command.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Tick { .. } => "tick",
            Self::Query => "query",
            Self::Hash => "hash",
            Self::Harvest { .. } => "harvest",
            Self::HarvestTerrain { .. } => "harvest_terrain",
            Self::ReturnGoods { .. } => "return_goods",
            Self::Attack { .. } => "attack",
            Self::AttackTile { .. } => "attack_tile",
            Self::Cancel { .. } => "cancel",
            Self::SaveReplay { .. } => "save_replay",
            Self::Quit => "quit",
        }
    }
}

// ============================================================================
// Output Responses (runner -> controller)
// ============================================================================

/// Responses written by the runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Session start.
    Ready {
        /// Protocol version.
        version: String,
        /// Scenario name.
        scenario: String,
        /// Starting tick.
        tick: u64,
    },

    /// What happened during a `tick` command.
    TickReport(TickReport),

    /// Full game state.
    State(GameState),

    /// State hash at a tick.
    Hash {
        /// Current tick.
        tick: u64,
        /// State hash.
        hash: u64,
    },

    /// Command accepted.
    Ack {
        /// The acknowledged command.
        cmd: String,
    },

    /// Command rejected; the game is unchanged.
    Error {
        /// Why.
        message: String,
    },

    /// Session over.
    Bye {
        /// Final tick.
        tick: u64,
        /// Final state hash.
        hash: u64,
    },
}

impl Response {
    /// Build an error response.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

/// Events gathered over one or more ticks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    /// Tick after the last step.
    pub tick: u64,
    /// State hash after the last step.
    pub hash: u64,
    /// Goods handed in at depots.
    pub deliveries: Vec<DeliveryReport>,
    /// Units that died.
    pub deaths: Vec<String>,
    /// Total damage dealt to units.
    pub damage_dealt: i64,
    /// Walls knocked down.
    pub walls_destroyed: Vec<(i32, i32)>,
    /// Forest tiles cut clear.
    pub forest_cleared: Vec<(i32, i32)>,
    /// Workers that found nothing to harvest.
    pub gave_up: Vec<String>,
    /// Sounds started, by name.
    pub sounds: Vec<String>,
}

/// One delivery at a depot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReport {
    /// Worker label or handle.
    pub worker: String,
    /// Receiving player.
    pub player: u8,
    /// Resource name.
    pub resource: String,
    /// Amount credited after income scaling.
    pub credited: i32,
}

/// Snapshot of the game for controllers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    /// Current tick.
    pub tick: u64,
    /// State hash.
    pub hash: u64,
    /// Players and stockpiles.
    pub players: Vec<PlayerState>,
    /// Live units.
    pub units: Vec<UnitState>,
    /// Missiles in flight or on display.
    pub missiles: usize,
}

/// A player's stockpile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerState {
    /// Player id.
    pub id: u8,
    /// Display name.
    pub name: String,
    /// Gold in stock.
    pub gold: i32,
    /// Wood in stock.
    pub wood: i32,
    /// Oil in stock.
    pub oil: i32,
}

/// A live unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitState {
    /// Scenario label, if the unit has one.
    pub label: Option<String>,
    /// Engine handle.
    pub handle: String,
    /// Unit type identifier.
    pub unit_type: String,
    /// Owner.
    pub player: u8,
    /// Tile column.
    pub x: i32,
    /// Tile row.
    pub y: i32,
    /// Hit points.
    pub hp: i32,
    /// Maximum hit points.
    pub max_hp: i32,
    /// Carried resource and amount.
    pub carrying: Option<(String, i32)>,
    /// Harvest phase, when harvesting.
    pub harvest_state: Option<i32>,
    /// Inside a building.
    pub inside: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tick_default_count() {
        let cmd: Command = serde_json::from_str(r#"{"cmd":"tick"}"#).expect("parse");
        assert_eq!(cmd, Command::Tick { count: 1 });
    }

    #[test]
    fn test_parse_orders() {
        let cmd: Command =
            serde_json::from_str(r#"{"cmd":"harvest","worker":"p1","mine":"mine"}"#).expect("parse");
        assert_eq!(cmd.name(), "harvest");

        let cmd: Command =
            serde_json::from_str(r#"{"cmd":"return_goods","worker":"p1"}"#).expect("parse");
        assert_eq!(
            cmd,
            Command::ReturnGoods {
                worker: "p1".into(),
                depot: None
            }
        );
    }

    #[test]
    fn test_unknown_command_is_rejected() {
        assert!(serde_json::from_str::<Command>(r#"{"cmd":"teleport"}"#).is_err());
    }

    #[test]
    fn test_response_tags() {
        let json = serde_json::to_string(&Response::Ack { cmd: "quit".into() }).expect("encode");
        assert_eq!(json, r#"{"type":"ack","cmd":"quit"}"#);

        let json = serde_json::to_string(&Response::TickReport(TickReport::default()))
            .expect("encode");
        assert!(json.starts_with(r#"{"type":"tick_report","tick":0"#), "{json}");
    }
}
