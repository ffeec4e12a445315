//! Mode configuration file (TOML).
//!
//! ```toml
//! name = "Orbit"
//! replace_internal_mode = 4        # optional, built-in mode id
//! activate_even_while_disarmed = false
//! topic_namespace_prefix = "drone2"
//! shutdown_on_watchdog_timeout = true
//! watchdog_period_ms = 4000
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use skymode_kernel::registration::validate_name;
use skymode_middleware::MessageBus;
use skymode_types::ModeId;
use thiserror::Error;

use crate::mode::{Mode, ModeBase, ModeSettings};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("failed to render config schema: {0}")]
    Schema(#[from] serde_json::Error),
}

/// Settings of one mode process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ModeConfig {
    /// Registration name; unique per vehicle.
    pub name: String,

    /// Id of the built-in mode this mode replaces.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replace_internal_mode: Option<u8>,

    #[serde(default)]
    pub activate_even_while_disarmed: bool,

    /// Topic namespace for multi-vehicle setups; empty for the root.
    #[serde(default)]
    pub topic_namespace_prefix: String,

    /// Stop the mode when the authority stops sending arming checks.
    #[serde(default = "default_shutdown_on_watchdog_timeout")]
    pub shutdown_on_watchdog_timeout: bool,

    #[serde(default = "default_watchdog_period_ms")]
    pub watchdog_period_ms: u64,
}

fn default_shutdown_on_watchdog_timeout() -> bool {
    true
}

fn default_watchdog_period_ms() -> u64 {
    4000
}

impl ModeConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            replace_internal_mode: None,
            activate_even_while_disarmed: false,
            topic_namespace_prefix: String::new(),
            shutdown_on_watchdog_timeout: default_shutdown_on_watchdog_timeout(),
            watchdog_period_ms: default_watchdog_period_ms(),
        }
    }

    /// Load from `path` and apply `SKYMODE_*` environment overrides.
    ///
    /// # Errors
    ///
    /// I/O, parse and validation failures.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: ModeConfig = toml::from_str(&raw)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate without consulting the environment.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: ModeConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// | Variable | Field |
    /// |---|---|
    /// | `SKYMODE_TOPIC_NAMESPACE` | `topic_namespace_prefix` |
    pub fn apply_env_overrides(&mut self) {
        if let Ok(prefix) = std::env::var("SKYMODE_TOPIC_NAMESPACE") {
            self.topic_namespace_prefix = prefix;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_name(&self.name).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.watchdog_period_ms == 0 {
            return Err(ConfigError::Invalid(
                "watchdog_period_ms must be positive".to_string(),
            ));
        }
        if let Some(id) = self.replace_internal_mode.map(ModeId)
            && (id.is_external() || !id.is_valid())
        {
            return Err(ConfigError::Invalid(format!(
                "replace_internal_mode {id} is not a built-in mode"
            )));
        }
        Ok(())
    }

    pub fn settings(&self) -> ModeSettings {
        ModeSettings {
            name: self.name.clone(),
            replace_internal_mode: self.replace_internal_mode.map(ModeId),
            activate_even_while_disarmed: self.activate_even_while_disarmed,
        }
    }

    pub fn watchdog_period(&self) -> Duration {
        Duration::from_millis(self.watchdog_period_ms)
    }
}

/// JSON schema of [`ModeConfig`].
pub fn config_schema() -> Result<serde_json::Value, ConfigError> {
    Ok(serde_json::to_value(schema_for!(ModeConfig))?)
}

impl<M: Mode> ModeBase<M> {
    /// Build an unregistered mode from `config`.
    pub fn from_config(mode: M, config: &ModeConfig, bus: &MessageBus) -> Self {
        let mut base = ModeBase::new(mode, config.settings(), bus, &config.topic_namespace_prefix);
        base.set_shutdown_on_watchdog_timeout(config.shutdown_on_watchdog_timeout);
        base.set_watchdog_period(config.watchdog_period());
        base
    }
}
