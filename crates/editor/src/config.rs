use std::env;
use std::fmt;
use std::time::Duration;

use foundation::math::Crs;
use runtime::DEFAULT_EVENT_RETENTION;
use scene::DEFAULT_UI_EPSG;
use serde::{Deserialize, Serialize};

pub const ENV_DEBOUNCE_MS: &str = "ATLAS_DEBOUNCE_MS";
pub const ENV_TERRAIN_MAX_LEVEL: &str = "ATLAS_TERRAIN_MAX_LEVEL";
pub const ENV_HISTORY_LIMIT: &str = "ATLAS_HISTORY_LIMIT";
pub const ENV_UI_EPSG: &str = "ATLAS_UI_EPSG";
pub const ENV_EVENT_RETENTION: &str = "ATLAS_EVENT_RETENTION";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Quiet period before coalesced transform edits are committed.
    pub debounce_quiet_ms: u64,
    /// Finest fixed terrain level tried when detailed sampling fails.
    pub terrain_max_level: u32,
    /// Retained history entries; `None` keeps everything.
    pub history_limit: Option<usize>,
    /// Undrained store change events kept before the oldest are dropped.
    pub event_retention: usize,
    /// Display projection for new project objects.
    pub default_ui_epsg: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            debounce_quiet_ms: 350,
            terrain_max_level: 14,
            history_limit: None,
            event_retention: DEFAULT_EVENT_RETENTION,
            default_ui_epsg: DEFAULT_UI_EPSG.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    Parse(String),
    Invalid { field: &'static str, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Parse(msg) => write!(f, "config parse error: {msg}"),
            ConfigError::Invalid { field, reason } => write!(f, "invalid config field {field}: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl EditorConfig {
    /// Defaults overridden by `ATLAS_*` environment variables. Unparsable
    /// values fall back to the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());
        Self {
            debounce_quiet_ms: parsed(ENV_DEBOUNCE_MS).unwrap_or(defaults.debounce_quiet_ms),
            terrain_max_level: parsed(ENV_TERRAIN_MAX_LEVEL)
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(defaults.terrain_max_level),
            history_limit: parsed(ENV_HISTORY_LIMIT)
                .and_then(|v| usize::try_from(v).ok())
                .filter(|v| *v > 0)
                .or(defaults.history_limit),
            event_retention: parsed(ENV_EVENT_RETENTION)
                .and_then(|v| usize::try_from(v).ok())
                .filter(|v| *v > 0)
                .unwrap_or(defaults.event_retention),
            default_ui_epsg: lookup(ENV_UI_EPSG)
                .filter(|v| Crs::from_code(v).is_ok())
                .unwrap_or(defaults.default_ui_epsg),
        }
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.debounce_quiet_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "debounce_quiet_ms",
                reason: "must be positive".to_string(),
            });
        }
        if self.history_limit == Some(0) {
            return Err(ConfigError::Invalid {
                field: "history_limit",
                reason: "must keep at least one entry".to_string(),
            });
        }
        if self.event_retention == 0 {
            return Err(ConfigError::Invalid {
                field: "event_retention",
                reason: "must keep at least one event".to_string(),
            });
        }
        Crs::from_code(&self.default_ui_epsg).map_err(|e| ConfigError::Invalid {
            field: "default_ui_epsg",
            reason: e.to_string(),
        })?;
        Ok(())
    }

    pub fn debounce_quiet(&self) -> Duration {
        Duration::from_millis(self.debounce_quiet_ms)
    }
}
