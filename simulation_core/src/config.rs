//! Engine configuration, read from TOML.
//!
//! Every field has a default, so an empty document is a complete configuration.
//!
//! ```toml
//! [simulation]
//! phases = ["briefing", "planning", "funding", "outcomes"]
//! storage_key = "workshop-simulation-state"
//!
//! [timing]
//! phase_entry_delay_ms = 1000
//! curveball_delay_ms = 5000
//!
//! [curveballs]
//! probability = 0.2
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use scenario_rules::{PhaseId, Resources};

use crate::error::ConfigError;
use crate::logging::LogFormat;
use crate::store::StateDefaults;

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub simulation: SimulationSettings,
    pub timing: TimingSettings,
    pub curveballs: CurveballSettings,
    pub resources: ResourceSettings,
    pub logging: LoggingSettings,
}

/// Phase sequence and persistence settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// Ordered phase ids. Each must be defined by the scenario.
    pub phases: Vec<String>,
    pub storage_key: String,
    pub state_version: String,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            phases: ["briefing", "planning", "funding", "outcomes"]
                .iter()
                .map(|p| p.to_string())
                .collect(),
            storage_key: "workshop-simulation-state".to_string(),
            state_version: "1.0.0".to_string(),
        }
    }
}

/// Pacing delays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSettings {
    /// Delay before phase-entry events activate.
    pub phase_entry_delay_ms: u64,
    /// Delay before a triggered curveball activates.
    pub curveball_delay_ms: u64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            phase_entry_delay_ms: 1000,
            curveball_delay_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurveballSettings {
    pub enabled: bool,
    /// Chance of a curveball on each phase entry, 0.0 to 1.0.
    pub probability: f64,
}

impl Default for CurveballSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            probability: 0.2,
        }
    }
}

/// Starting resources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceSettings {
    pub budget: f64,
    pub political_capital: f64,
    pub time_remaining: f64,
}

impl Default for ResourceSettings {
    fn default() -> Self {
        Self {
            budget: 1_000_000.0,
            political_capital: 75.0,
            time_remaining: 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Tracing filter directive, overridden by `WORKSHOP_LOG`.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Human,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let phases = &self.simulation.phases;
        if phases.is_empty() {
            return Err(ConfigError::Invalid {
                field: "simulation.phases",
                message: "at least one phase is required".to_string(),
            });
        }
        for (i, phase) in phases.iter().enumerate() {
            if phases[..i].contains(phase) {
                return Err(ConfigError::Invalid {
                    field: "simulation.phases",
                    message: format!("phase '{}' is listed twice", phase),
                });
            }
        }

        let probability = self.curveballs.probability;
        if !(0.0..=1.0).contains(&probability) {
            return Err(ConfigError::Invalid {
                field: "curveballs.probability",
                message: format!("{} is outside 0.0..=1.0", probability),
            });
        }

        let resources = &self.resources;
        if !resources.budget.is_finite() || resources.budget < 0.0 {
            return Err(ConfigError::Invalid {
                field: "resources.budget",
                message: format!("{} is not a finite amount >= 0", resources.budget),
            });
        }
        if !(0.0..=100.0).contains(&resources.political_capital) {
            return Err(ConfigError::Invalid {
                field: "resources.political_capital",
                message: format!("{} is outside 0.0..=100.0", resources.political_capital),
            });
        }
        if !resources.time_remaining.is_finite() {
            return Err(ConfigError::Invalid {
                field: "resources.time_remaining",
                message: format!("{} is not finite", resources.time_remaining),
            });
        }

        if self.simulation.storage_key.is_empty() {
            return Err(ConfigError::Invalid {
                field: "simulation.storage_key",
                message: "must not be empty".to_string(),
            });
        }

        Ok(())
    }

    pub fn phase_sequence(&self) -> Vec<PhaseId> {
        self.simulation
            .phases
            .iter()
            .map(|p| PhaseId::from(p.as_str()))
            .collect()
    }

    pub fn state_defaults(&self) -> StateDefaults {
        StateDefaults {
            version: self.simulation.state_version.clone(),
            resources: Resources::new(
                self.resources.budget,
                self.resources.political_capital,
                self.resources.time_remaining,
            ),
        }
    }

    pub fn phase_entry_delay(&self) -> Duration {
        Duration::from_millis(self.timing.phase_entry_delay_ms)
    }

    pub fn curveball_delay(&self) -> Duration {
        Duration::from_millis(self.timing.curveball_delay_ms)
    }
}
