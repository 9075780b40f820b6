//! TOML configuration loader with validation.
//!
//! One file carries the turret sections and an optional `[sim]` table for
//! the host plant. Without a file, built-in defaults are used.

use std::path::Path;

use tracing::{debug, info};

use turret_common::config::{ConfigError, ConfigLoader};
use turret_common::control_unit::config::TurretConfig;

use crate::sim::{SimConfig, SimFile};

// ─── Loaded Config Bundle ───────────────────────────────────────────

/// Complete validated configuration bundle, ready for runtime use.
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    pub turret: TurretConfig,
    pub sim: SimConfig,
}

impl LoadedConfig {
    /// Parse both documents from one TOML text and validate them.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let turret = TurretConfig::from_toml(content)?;
        let SimFile { sim } = SimFile::from_toml(content)?;
        let loaded = Self { turret, sim };
        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.turret.validate()?;
        self.sim.validate()
    }

    /// Effective configuration as one TOML document.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        let encode = |e: toml::ser::Error| ConfigError::ParseError(e.to_string());
        let mut document = toml::Table::try_from(&self.turret).map_err(encode)?;
        document.insert(
            "sim".to_string(),
            toml::Value::try_from(&self.sim).map_err(encode)?,
        );
        Ok(document.to_string())
    }
}

// ─── Loading Functions ──────────────────────────────────────────────

/// Load and validate the configuration at `path`, or the defaults.
pub fn load_config(path: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
    let loaded = match path {
        Some(path) => {
            let loaded = match std::fs::read_to_string(path) {
                Ok(content) => LoadedConfig::from_toml(&content)?,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(ConfigError::FileNotFound);
                }
                Err(e) => return Err(ConfigError::ParseError(e.to_string())),
            };
            info!("Loaded configuration from {}", path.display());
            loaded
        }
        None => {
            info!("No configuration file given, using built-in defaults");
            let loaded = LoadedConfig::default();
            loaded.validate()?;
            loaded
        }
    };

    let control = &loaded.turret.control;
    debug!(
        period_ms = control.period_ms,
        max_magnitude = control.max_magnitude,
        dead_zone_floor = control.dead_zone_floor,
        centering = ?loaded.turret.acquisition.centering,
        "Configuration validated"
    );
    Ok(loaded)
}
