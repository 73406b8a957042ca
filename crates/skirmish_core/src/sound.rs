//! Sound name table.
//!
//! Missile types name their impact sound; the table turns names into
//! compact ids once at load time.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Index of a registered sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SoundId(pub u32);

/// Registered sound names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoundTable {
    names: Vec<String>,
    by_name: HashMap<String, SoundId>,
}

impl SoundTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sound name, returning the existing id if already known.
    pub fn register(&mut self, name: &str) -> SoundId {
        if let Some(id) = self.by_name.get(name) {
            return *id;
        }
        let id = SoundId(self.names.len() as u32);
        self.names.push(name.to_string());
        self.by_name.insert(name.to_string(), id);
        id
    }

    /// Id of a sound name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<SoundId> {
        self.by_name.get(name).copied()
    }

    /// Name of a sound id.
    #[must_use]
    pub fn name(&self, id: SoundId) -> Option<&str> {
        self.names.get(id.0 as usize).map(String::as_str)
    }
}
