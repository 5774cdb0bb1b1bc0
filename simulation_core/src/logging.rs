//! Logging initialization.
//!
//! Structured logging via `tracing`, rendered either for humans or as
//! newline-delimited JSON. The `WORKSHOP_LOG` environment variable overrides the
//! configured filter.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::config::LoggingSettings;

/// Environment variable holding a tracing filter directive.
pub const LOG_ENV_VAR: &str = "WORKSHOP_LOG";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Human,
    /// Newline-delimited JSON for machine consumption.
    Json,
}

/// Install the global tracing subscriber.
///
/// Uses `try_init`, so calling this more than once (e.g. from tests) is harmless.
pub fn init_logging(settings: &LoggingSettings) {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    match settings.format {
        LogFormat::Human => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init();
        }
        LogFormat::Json => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .with_writer(std::io::stderr)
                .try_init();
        }
    }
}
