//! TOML-based configuration.
//!
//! Stores the timing knobs of the engine:
//! - Session length and the prompt window before it expires
//! - Tick cadence shared by every watcher
//!
//! Configuration is stored at `~/.config/voteclock/config.toml`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::session::SessionConfig;

/// Session timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSettings {
    #[serde(default = "default_session_duration")]
    pub duration_secs: u64,
    #[serde(default = "default_prompt_window")]
    pub prompt_window_secs: u64,
}

/// Watcher cadence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerSettings {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/voteclock/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub ticker: TickerSettings,
}

// Default functions
fn default_session_duration() -> u64 {
    5 * 60
}
fn default_prompt_window() -> u64 {
    30
}
fn default_interval_ms() -> u64 {
    1000
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            duration_secs: default_session_duration(),
            prompt_window_secs: default_prompt_window(),
        }
    }
}

impl Default for TickerSettings {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
        }
    }
}

/// Returns `~/.config/voteclock[-dev]/` based on VOTECLOCK_ENV.
///
/// Set VOTECLOCK_ENV=dev to use the development directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("VOTECLOCK_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("voteclock-dev")
    } else {
        base_dir.join("voteclock")
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::NoDataDir(e.to_string()))?;
    Ok(dir)
}

impl Config {
    /// Keys accepted by [`Config::get`] and [`Config::set`].
    pub const KEYS: [&'static str; 3] = [
        "session.duration_secs",
        "session.prompt_window_secs",
        "ticker.interval_ms",
    ];

    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the default location, writing defaults if absent.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from `path`, writing defaults there if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, if
    /// the values are inconsistent, or if defaults cannot be written.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config =
                    toml::from_str(&content).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, message: &str| ConfigError::InvalidValue {
            key: key.to_string(),
            message: message.to_string(),
        };
        if self.session.duration_secs == 0 {
            return Err(invalid("session.duration_secs", "must be greater than zero"));
        }
        if self.session.prompt_window_secs >= self.session.duration_secs {
            return Err(invalid(
                "session.prompt_window_secs",
                "must be shorter than session.duration_secs",
            ));
        }
        if self.ticker.interval_ms == 0 {
            return Err(invalid("ticker.interval_ms", "must be greater than zero"));
        }
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let value = match key {
            "session.duration_secs" => self.session.duration_secs,
            "session.prompt_window_secs" => self.session.prompt_window_secs,
            "ticker.interval_ms" => self.ticker.interval_ms,
            _ => return None,
        };
        Some(value.to_string())
    }

    /// Change one value in memory, keeping the previous config if the result
    /// would be invalid.
    pub fn update(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let parsed: u64 = value.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("cannot parse '{value}' as a whole number"),
        })?;
        let mut next = self.clone();
        match key {
            "session.duration_secs" => next.session.duration_secs = parsed,
            "session.prompt_window_secs" => next.session.prompt_window_secs = parsed,
            "ticker.interval_ms" => next.ticker.interval_ms = parsed,
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        next.validate()?;
        *self = next;
        Ok(())
    }

    /// Set a config value by key and persist to the default location.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.update(key, value)?;
        self.save()
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.ticker.interval_ms)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::new(
            Duration::from_secs(self.session.duration_secs),
            Duration::from_secs(self.session.prompt_window_secs),
        )
        .with_tick(self.tick_interval())
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|err| {
            tracing::warn!(%err, "using default configuration");
            Self::default()
        })
    }
}
