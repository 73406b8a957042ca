//! Unit types and their registry.
//!
//! Unit types are content: they are deserialized from RON, registered once
//! at game start and then only read.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::DuplicatePolicy;
use crate::error::{GameError, Result};
use crate::math::{PixelPos, PIXEL_TILE_SIZE};
use crate::player::ResourceKind;

/// Index of a registered unit type.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct UnitTypeId(pub u32);

/// How a unit moves, which decides what can target it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MovementClass {
    /// Walks on open ground.
    #[default]
    Land,
    /// Flies; untouched by land mines and only hit by anti-air.
    Air,
}

/// Base combat statistics of a unit type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UnitStats {
    /// Maximum hit points.
    pub max_hp: i32,
    /// Armor.
    #[serde(default)]
    pub armor: i32,
    /// Damage reduced by armor.
    #[serde(default)]
    pub basic_damage: i32,
    /// Damage that ignores armor.
    #[serde(default)]
    pub piercing_damage: i32,
}

/// How a worker type harvests one resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceInfo {
    /// The resource harvested.
    pub resource: ResourceKind,
    /// Maximum load carried back to a depot.
    pub capacity: i32,
    /// Load gained per harvest step; zero gains the full capacity at once.
    #[serde(default)]
    pub step: i32,
    /// Ticks per harvest step at normal speed.
    #[serde(default)]
    pub wait_at_resource: i32,
    /// Ticks spent inside the depot when delivering.
    #[serde(default)]
    pub wait_at_depot: i32,
    /// Gather standing next to the site instead of entering it.
    #[serde(default)]
    pub harvest_from_outside: bool,
    /// The resource is map terrain rather than a unit.
    #[serde(default)]
    pub terrain_harvester: bool,
}

const fn one() -> i32 {
    1
}

/// Static description of a kind of unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitType {
    /// Registry index, assigned on registration.
    #[serde(default)]
    pub id: UnitTypeId,
    /// Unique identifier.
    pub ident: String,
    /// Footprint width in tiles.
    #[serde(default = "one")]
    pub tile_width: i32,
    /// Footprint height in tiles.
    #[serde(default = "one")]
    pub tile_height: i32,
    /// Combat statistics.
    pub stats: UnitStats,
    /// Movement class.
    #[serde(default)]
    pub movement: MovementClass,
    /// Buildings never move and can burn.
    #[serde(default)]
    pub building: bool,
    /// Can attack land units and buildings.
    #[serde(default = "default_true")]
    pub can_target_land: bool,
    /// Can attack flying units.
    #[serde(default)]
    pub can_target_air: bool,
    /// Ticks needed to cross one tile.
    #[serde(default = "one")]
    pub ticks_per_tile: i32,
    /// Identifier of the missile fired by this unit's weapon.
    #[serde(default)]
    pub missile: Option<String>,
    /// Resource kinds this unit can harvest.
    #[serde(default)]
    pub harvests: Vec<ResourceInfo>,
    /// Resource this unit holds and gives to harvesters.
    #[serde(default)]
    pub gives_resource: Option<ResourceKind>,
    /// Resource amount a freshly placed site holds.
    #[serde(default)]
    pub starting_resources: i32,
    /// Resource kinds accepted for delivery.
    #[serde(default)]
    pub can_store: Vec<ResourceKind>,
    /// Workers extracting at once; 0 for unlimited.
    #[serde(default)]
    pub max_on_board: u32,
    /// Workers allowed inside at once; 0 for unlimited.
    #[serde(default)]
    pub max_harvesters: u32,
}

const fn default_true() -> bool {
    true
}

impl UnitType {
    /// Minimal type with the given identifier and hit points.
    #[must_use]
    pub fn new(ident: impl Into<String>, max_hp: i32) -> Self {
        Self {
            id: UnitTypeId::default(),
            ident: ident.into(),
            tile_width: 1,
            tile_height: 1,
            stats: UnitStats {
                max_hp,
                ..UnitStats::default()
            },
            movement: MovementClass::Land,
            building: false,
            can_target_land: true,
            can_target_air: false,
            ticks_per_tile: 1,
            missile: None,
            harvests: Vec::new(),
            gives_resource: None,
            starting_resources: 0,
            can_store: Vec::new(),
            max_on_board: 0,
            max_harvesters: 0,
        }
    }

    /// How this type harvests a resource, if it can.
    #[must_use]
    pub fn resource_info(&self, kind: ResourceKind) -> Option<&ResourceInfo> {
        self.harvests.iter().find(|info| info.resource == kind)
    }

    /// True when this type accepts deliveries of a resource.
    #[must_use]
    pub fn can_store(&self, kind: ResourceKind) -> bool {
        self.can_store.contains(&kind)
    }

    /// True for flying units.
    #[must_use]
    pub const fn is_flying(&self) -> bool {
        matches!(self.movement, MovementClass::Air)
    }

    /// Footprint size in pixels.
    #[must_use]
    pub const fn pixel_size(&self) -> PixelPos {
        PixelPos::new(
            self.tile_width * PIXEL_TILE_SIZE,
            self.tile_height * PIXEL_TILE_SIZE,
        )
    }

    /// True when a unit of this type can attack a unit of `goal`.
    #[must_use]
    pub const fn can_target(&self, goal: &Self) -> bool {
        if goal.is_flying() {
            self.can_target_air
        } else {
            self.can_target_land
        }
    }
}

/// Registry of unit types, indexed by [`UnitTypeId`] and identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitTypeRegistry {
    types: Vec<UnitType>,
    by_ident: HashMap<String, UnitTypeId>,
    policy: DuplicatePolicy,
}

impl UnitTypeRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new(policy: DuplicatePolicy) -> Self {
        Self {
            types: Vec::new(),
            by_ident: HashMap::new(),
            policy,
        }
    }

    /// Register a type, assigning its id.
    pub fn register(&mut self, mut unit_type: UnitType) -> Result<UnitTypeId> {
        if self.by_ident.contains_key(&unit_type.ident) && self.policy == DuplicatePolicy::Error {
            return Err(GameError::DuplicateIdentifier {
                kind: "unit type",
                ident: unit_type.ident,
            });
        }
        if unit_type.tile_width <= 0 || unit_type.tile_height <= 0 {
            return Err(GameError::InvalidConfig(format!(
                "unit type '{}' has an empty footprint",
                unit_type.ident
            )));
        }
        let id = UnitTypeId(self.types.len() as u32);
        unit_type.id = id;
        self.by_ident.insert(unit_type.ident.clone(), id);
        self.types.push(unit_type);
        Ok(id)
    }

    /// Type by id.
    #[must_use]
    pub fn get(&self, id: UnitTypeId) -> Option<&UnitType> {
        self.types.get(id.0 as usize)
    }

    /// Type by identifier.
    #[must_use]
    pub fn lookup(&self, ident: &str) -> Option<&UnitType> {
        self.by_ident.get(ident).and_then(|id| self.get(*id))
    }

    /// Id by identifier.
    pub fn id_of(&self, ident: &str) -> Result<UnitTypeId> {
        self.by_ident
            .get(ident)
            .copied()
            .ok_or_else(|| GameError::UnknownUnitType(ident.to_string()))
    }

    /// Number of registered types, shadowed ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// True when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Iterate all registered types in id order.
    pub fn iter(&self) -> impl Iterator<Item = &UnitType> {
        self.types.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let mut registry = UnitTypeRegistry::new(DuplicatePolicy::Error);
        let peon = registry.register(UnitType::new("unit-peon", 30)).expect("register");
        let mine = registry.register(UnitType::new("unit-gold-mine", 25500)).expect("register");
        assert_ne!(peon, mine);
        assert_eq!(registry.lookup("unit-peon").map(|t| t.id), Some(peon));
        assert_eq!(registry.id_of("unit-gold-mine").expect("known"), mine);
        assert!(registry.id_of("unit-dragon").is_err());
    }

    #[test]
    fn test_duplicate_policy() {
        let mut strict = UnitTypeRegistry::new(DuplicatePolicy::Error);
        strict.register(UnitType::new("unit-peon", 30)).expect("register");
        assert!(matches!(
            strict.register(UnitType::new("unit-peon", 40)),
            Err(GameError::DuplicateIdentifier { .. })
        ));

        let mut shadow = UnitTypeRegistry::new(DuplicatePolicy::Shadow);
        let old = shadow.register(UnitType::new("unit-peon", 30)).expect("register");
        let new = shadow.register(UnitType::new("unit-peon", 40)).expect("register");
        assert_eq!(shadow.lookup("unit-peon").map(|t| t.stats.max_hp), Some(40));
        assert_eq!(shadow.get(old).map(|t| t.stats.max_hp), Some(30));
        assert_ne!(old, new);
    }

    #[test]
    fn test_can_target() {
        let archer = UnitType {
            can_target_air: true,
            ..UnitType::new("unit-archer", 40)
        };
        let footman = UnitType::new("unit-footman", 60);
        let dragon = UnitType {
            movement: MovementClass::Air,
            ..UnitType::new("unit-dragon", 100)
        };
        assert!(archer.can_target(&dragon));
        assert!(!footman.can_target(&dragon));
        assert!(footman.can_target(&archer));
    }

    #[test]
    fn test_resource_info_lookup() {
        let peon = UnitType {
            harvests: vec![ResourceInfo {
                resource: ResourceKind::Gold,
                capacity: 100,
                step: 0,
                wait_at_resource: 150,
                wait_at_depot: 150,
                harvest_from_outside: false,
                terrain_harvester: false,
            }],
            ..UnitType::new("unit-peon", 30)
        };
        assert_eq!(peon.resource_info(ResourceKind::Gold).map(|i| i.capacity), Some(100));
        assert!(peon.resource_info(ResourceKind::Wood).is_none());
    }

    #[test]
    fn test_deserialize_defaults() {
        let text = r#"(ident: "unit-farm", stats: (max_hp: 400), building: true, tile_width: 2, tile_height: 2)"#;
        let farm: UnitType = ron::from_str(text).expect("valid unit type");
        assert!(farm.building);
        assert!(farm.can_target_land);
        assert_eq!(farm.ticks_per_tile, 1);
        assert_eq!(farm.pixel_size(), PixelPos::new(64, 64));
    }
}
