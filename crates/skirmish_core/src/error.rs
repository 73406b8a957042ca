//! Error types for the engine core.

use thiserror::Error;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for all engine core errors.
#[derive(Debug, Error)]
pub enum GameError {
    /// A type identifier was registered twice under the `Error` duplicate policy.
    #[error("Duplicate {kind} identifier: {ident}")]
    DuplicateIdentifier {
        /// Which registry rejected the identifier.
        kind: &'static str,
        /// The offending identifier.
        ident: String,
    },

    /// Lookup of an unknown missile type.
    #[error("Unknown missile type: {0}")]
    UnknownMissileType(String),

    /// Lookup of an unknown unit type.
    #[error("Unknown unit type: {0}")]
    UnknownUnitType(String),

    /// A unit handle does not resolve to a live unit.
    #[error("Unit not found: {0}")]
    UnitNotFound(String),

    /// A harvesting order was issued to a unit that cannot perform it.
    #[error("Unit {unit} cannot harvest: {reason}")]
    CannotHarvest {
        /// The worker that received the order.
        unit: String,
        /// Why the order was rejected.
        reason: String,
    },

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Data file parsing error.
    #[error("Failed to parse data file '{path}': {message}")]
    DataParseError {
        /// Path to the file that failed to parse.
        path: String,
        /// Error message.
        message: String,
    },

    /// Invalid game state.
    #[error("Invalid game state: {0}")]
    InvalidState(String),

    /// Desync detected between two simulations fed the same commands.
    #[error("Desync detected at tick {tick}: local hash {local_hash}, remote hash {remote_hash}")]
    DesyncDetected {
        /// Tick where desync occurred.
        tick: u64,
        /// Local simulation hash.
        local_hash: u64,
        /// Remote simulation hash.
        remote_hash: u64,
    },
}
