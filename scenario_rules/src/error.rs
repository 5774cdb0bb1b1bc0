//! Errors raised while loading or validating scenario data.

use std::path::PathBuf;
use thiserror::Error;

/// Scenario loading and validation failures.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// The document is not valid JSON or does not match the scenario schema.
    #[error("failed to parse scenario: {0}")]
    Parse(#[from] serde_json::Error),

    /// The scenario file could not be read.
    #[error("failed to read scenario file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A required top-level section is absent or empty.
    #[error("scenario section '{0}' is missing or empty")]
    MissingSection(&'static str),

    /// One of the configured phase names has no definition.
    #[error("scenario does not define required phase '{0}'")]
    MissingPhase(String),

    /// A definition points at an id that does not exist.
    #[error("{owner} references unknown {kind} '{target}'")]
    UnknownReference {
        owner: String,
        kind: &'static str,
        target: String,
    },

    /// A resource delta string is neither a number nor a percentage.
    #[error("invalid resource delta '{0}', expected a number or a value like \"-15%\"")]
    InvalidResourceDelta(String),
}
