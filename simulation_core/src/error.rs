//! Error types for the engine.
//!
//! Only initialization failures reach callers as hard errors. Storage errors stay
//! inside the state store, and navigation errors are ordinary rejections the UI
//! shows as warnings.

use std::path::PathBuf;
use thiserror::Error;

use scenario_rules::{PhaseId, ScenarioError};

/// Failures of a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O failed for key '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("stored state could not be (de)serialized: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
}

/// Engine configuration failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value for '{field}': {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}

/// Startup failures. Fatal to building a [`crate::Simulation`].
#[derive(Debug, Error)]
pub enum InitError {
    /// No scenario catalog was supplied.
    #[error("scenario catalog is required but was not provided")]
    MissingCatalog,

    #[error("invalid scenario: {0}")]
    Scenario(#[from] ScenarioError),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Rejected phase navigation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavigationError {
    #[error("unknown phase '{0}'")]
    UnknownPhase(PhaseId),

    /// Exit gating refused to leave `phase`.
    #[error("completion criteria for phase '{phase}' are not met")]
    CriteriaNotMet { phase: PhaseId },

    #[error("already at the last phase")]
    NoNextPhase,

    #[error("already at the first phase")]
    NoPreviousPhase,

    #[error("the simulation has not entered a phase yet")]
    NotStarted,
}
