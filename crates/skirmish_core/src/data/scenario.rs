//! Scenario file: map, content, players, starting units and orders.

use serde::{Deserialize, Serialize};

use crate::config::SimConfig;
use crate::error::{GameError, Result};
use crate::missile::MissileType;
use crate::player::Player;
use crate::unit_type::UnitType;

/// Complete scenario definition.
///
/// # Example RON
///
/// ```ron
/// ScenarioData(
///     name: "gold rush",
///     map: [
///         "........",
///         "..TT....",
///     ],
///     sounds: ["explosion"],
///     missile_types: [MissileType(ident: "missile-arrow", class: PointToPoint, speed: 16)],
///     unit_types: [...],
///     players: [Player(id: 0, name: "Red", team: 0)],
///     units: [UnitPlacement(label: Some("p1"), unit_type: "unit-peasant", player: 0, x: 1, y: 1)],
///     orders: [HarvestTerrain(worker: "p1", x: 2, y: 1)],
/// )
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioData {
    /// Scenario name, used in replays and reports.
    pub name: String,

    /// Simulation configuration.
    #[serde(default)]
    pub config: SimConfig,

    /// Map rows, see [`TileMap::from_rows`](crate::map::TileMap::from_rows).
    pub map: Vec<String>,

    /// Sound names known to the presentation layer.
    #[serde(default)]
    pub sounds: Vec<String>,

    /// Missile types.
    #[serde(default)]
    pub missile_types: Vec<MissileType>,

    /// Burning building tiers.
    #[serde(default)]
    pub burning_tiers: Vec<BurningTierData>,

    /// Unit types.
    pub unit_types: Vec<UnitType>,

    /// Players; ids must match their position.
    pub players: Vec<Player>,

    /// Units placed at start.
    #[serde(default)]
    pub units: Vec<UnitPlacement>,

    /// Orders issued before the first tick.
    #[serde(default)]
    pub orders: Vec<OrderData>,
}

/// Fire shown on buildings at or below a hit point percentage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BurningTierData {
    /// Hit point percentage.
    pub percent: i32,
    /// Fire missile, or `None` to stop burning.
    #[serde(default)]
    pub missile: Option<String>,
}

/// A unit placed at scenario start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitPlacement {
    /// Name used by orders to refer to this unit.
    #[serde(default)]
    pub label: Option<String>,
    /// Unit type identifier.
    pub unit_type: String,
    /// Owner slot.
    pub player: u8,
    /// Top-left tile.
    pub x: i32,
    /// Top-left tile.
    pub y: i32,
    /// Overrides the type's starting resources.
    #[serde(default)]
    pub resources: Option<i32>,
    /// Placed as an unfinished building.
    #[serde(default)]
    pub under_construction: bool,
}

/// An order issued at scenario start, naming units by label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OrderData {
    /// Harvest a resource unit.
    Harvest {
        /// Worker label.
        worker: String,
        /// Resource site label.
        mine: String,
    },
    /// Harvest terrain around a tile.
    HarvestTerrain {
        /// Worker label.
        worker: String,
        /// Tile column.
        x: i32,
        /// Tile row.
        y: i32,
    },
    /// Carry the current load to a depot.
    ReturnGoods {
        /// Worker label.
        worker: String,
        /// Depot label; the nearest depot when absent.
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
}

impl ScenarioData {
    /// Parse a scenario from RON text. `origin` names the source in errors.
    pub fn from_ron(text: &str, origin: &str) -> Result<Self> {
        let data: Self = ron::from_str(text).map_err(|e| GameError::DataParseError {
            path: origin.to_string(),
            message: e.to_string(),
        })?;
        data.validate()?;
        Ok(data)
    }

    /// Check references that do not need the registries.
    pub fn validate(&self) -> Result<()> {
        self.config.validate()?;
        for (slot, player) in self.players.iter().enumerate() {
            if usize::from(player.id.0) != slot {
                return Err(GameError::InvalidConfig(format!(
                    "player {} listed at position {slot}",
                    player.id
                )));
            }
        }
        for unit in &self.units {
            if usize::from(unit.player) >= self.players.len() {
                return Err(GameError::InvalidConfig(format!(
                    "unit {} owned by unknown player {}",
                    unit.unit_type, unit.player
                )));
            }
        }
        let labels: Vec<&str> = self.units.iter().filter_map(|u| u.label.as_deref()).collect();
        for (i, label) in labels.iter().enumerate() {
            if labels[..i].contains(label) {
                return Err(GameError::DuplicateIdentifier {
                    kind: "unit label",
                    ident: (*label).to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = r#"
        ScenarioData(
            name: "tiny",
            map: ["....", ".TT."],
            missile_types: [
                (ident: "missile-arrow", class: PointToPoint, speed: 16, width: 8, height: 8),
            ],
            unit_types: [
                (ident: "unit-archer", stats: (max_hp: 40, armor: 0, basic_damage: 3, piercing_damage: 6), missile: Some("missile-arrow")),
            ],
            players: [(id: 0, name: "Red", team: 0), (id: 1, name: "Blue", team: 1)],
            units: [
                (label: Some("a"), unit_type: "unit-archer", player: 0, x: 0, y: 0),
                (label: Some("b"), unit_type: "unit-archer", player: 1, x: 3, y: 0),
            ],
            orders: [Attack(attacker: "a", target: "b")],
        )
    "#;

    #[test]
    fn test_parse_scenario() {
        let data = ScenarioData::from_ron(SCENARIO, "tiny.ron").expect("valid scenario");
        assert_eq!(data.name, "tiny");
        assert_eq!(data.units.len(), 2);
        assert_eq!(data.missile_types[0].speed, 16);
        assert!(matches!(data.orders[0], OrderData::Attack { .. }));
    }

    #[test]
    fn test_duplicate_label_rejected() {
        let text = SCENARIO.replace("label: Some(\"b\")", "label: Some(\"a\")");
        assert!(matches!(
            ScenarioData::from_ron(&text, "dup.ron"),
            Err(GameError::DuplicateIdentifier { .. })
        ));
    }

    #[test]
    fn test_parse_error_names_origin() {
        match ScenarioData::from_ron("ScenarioData(", "broken.ron") {
            Err(GameError::DataParseError { path, .. }) => assert_eq!(path, "broken.ron"),
            other => panic!("expected parse error, got {other:?}"),
        }
    }
}
