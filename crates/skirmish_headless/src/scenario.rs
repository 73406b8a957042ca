//! Scenario file loading.

use std::path::Path;

use skirmish_core::data::ScenarioData;

use crate::error::{HeadlessError, Result};

/// Read and parse a RON scenario file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not parse.
pub fn load_scenario(path: &Path) -> Result<ScenarioData> {
    let text = std::fs::read_to_string(path).map_err(|e| HeadlessError::io(path, e))?;
    let data = ScenarioData::from_ron(&text, &path.display().to_string())?;
    tracing::debug!(path = %path.display(), name = %data.name, "scenario file parsed");
    Ok(data)
}

/// Read a scenario file and replace its seed when one is given.
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not parse.
pub fn load_scenario_with_seed(path: &Path, seed: Option<u64>) -> Result<ScenarioData> {
    let mut data = load_scenario(path)?;
    if let Some(seed) = seed {
        data.config.seed = seed;
    }
    Ok(data)
}
