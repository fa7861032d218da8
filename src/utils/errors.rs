// src/utils/errors.rs
//! Engine error types
//!
//! Nothing in the simulation core is fatal. Most anomalies are logged and
//! recovered locally; these variants surface where a caller can act on them
//! (configuration loading, pool bookkeeping, explicit placement requests).

use crate::simulation::elf::ElfKind;
use thiserror::Error;

/// Errors produced by the engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid or unloadable configuration
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// No pool or config registered for an elf kind
    #[error("no pool or config registered for {0:?} elves")]
    UnknownElfKind(ElfKind),

    /// Bounded pool at capacity with nothing free
    #[error("pool exhausted")]
    PoolExhausted,

    /// Instance handed to a pool that did not construct it
    #[error("instance {0} does not belong to this pool")]
    ForeignInstance(String),

    /// No valid position found within the attempt budget
    #[error("no valid spawn position after {attempts} attempts")]
    PlacementFailed { attempts: u32 },

    /// Visual effect could not be queued
    #[error("effect playback failed: {0}")]
    EffectFailed(String),
}

impl From<::config::ConfigError> for EngineError {
    fn from(err: ::config::ConfigError) -> Self {
        EngineError::ConfigError(err.to_string())
    }
}

/// Engine result alias
pub type Result<T> = std::result::Result<T, EngineError>;
