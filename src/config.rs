//! Configuration management for cinetrack

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::player::PlayerTimings;
use crate::progress::ProgressPolicy;
use crate::types::ViewerId;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Database settings
    pub database: DatabaseConfig,

    /// Playback and progress-saving behavior
    pub playback: PlaybackConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Data directory (default: ~/.local/share/cinetrack)
    pub data_dir: Option<PathBuf>,

    /// Signed-in viewer used when no viewer is given on the command line
    pub viewer_id: Option<String>,
}

/// Database configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database path (file path for the local DuckDB file)
    pub path: Option<String>,
}

/// Playback and watch-progress settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Progress below this many seconds is never persisted
    pub min_save_seconds: f64,

    /// Progress this close to the end counts as finished and clears the record
    pub completion_window_seconds: f64,

    /// Quiet period of continuous playback before a progress save is pushed
    pub save_debounce_seconds: u64,

    /// Inactivity before the on-screen controls hide during playback
    pub controls_hide_seconds: u64,

    /// Step used by the skip back/forward controls
    pub skip_seconds: f64,

    /// Position update interval of the headless surface, in milliseconds
    pub headless_tick_ms: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            data_dir: None,
            viewer_id: None,
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            min_save_seconds: 5.0,
            completion_window_seconds: 10.0,
            save_debounce_seconds: 10,
            controls_hide_seconds: 5,
            skip_seconds: 10.0,
            headless_tick_ms: 250,
        }
    }
}

impl PlaybackConfig {
    /// Thresholds deciding whether a progress report is saved, cleared or ignored.
    #[must_use]
    pub fn policy(&self) -> ProgressPolicy {
        ProgressPolicy {
            min_progress_seconds: self.min_save_seconds,
            completion_window_seconds: self.completion_window_seconds,
        }
    }

    /// Timer intervals used by the playback controller.
    #[must_use]
    pub fn timings(&self) -> PlayerTimings {
        PlayerTimings {
            save_debounce: Duration::from_secs(self.save_debounce_seconds),
            controls_hide: Duration::from_secs(self.controls_hide_seconds),
            skip_seconds: self.skip_seconds,
        }
    }

    /// Tick interval for [`crate::player::HeadlessSurface`].
    #[must_use]
    pub fn headless_tick(&self) -> Duration {
        Duration::from_millis(self.headless_tick_ms)
    }
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)?;
            let config: Self = toml::from_str(&contents)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, contents)?;
        Ok(())
    }

    /// Get the default configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::config("Could not determine config directory"))?;
        Ok(config_dir.join("cinetrack").join("config.toml"))
    }

    /// Get the data directory
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.general.data_dir {
            Ok(dir.clone())
        } else {
            let data_dir = dirs::data_local_dir()
                .ok_or_else(|| Error::config("Could not determine data directory"))?;
            Ok(data_dir.join("cinetrack"))
        }
    }

    /// Get the database path
    pub fn database_path(&self) -> Result<PathBuf> {
        if let Some(ref path) = self.database.path {
            return Ok(PathBuf::from(path));
        }
        Ok(self.data_dir()?.join("cinetrack.duckdb"))
    }

    /// The signed-in viewer, if one is configured.
    ///
    /// An explicit override (usually a `--viewer` flag) wins over the config file.
    #[must_use]
    pub fn current_viewer(&self, explicit: Option<&str>) -> Option<ViewerId> {
        explicit
            .or(self.general.viewer_id.as_deref())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(ViewerId::from)
    }

    /// Validate configuration values.
    ///
    /// Call this after loading to ensure all values are within acceptable ranges.
    pub fn validate(&self) -> Result<()> {
        let playback = &self.playback;

        if !playback.min_save_seconds.is_finite()
            || !(0.0..=3600.0).contains(&playback.min_save_seconds)
        {
            return Err(Error::config(format!(
                "min_save_seconds must be between 0 and 3600, got {}",
                playback.min_save_seconds
            )));
        }

        if !playback.completion_window_seconds.is_finite()
            || playback.completion_window_seconds <= 0.0
        {
            return Err(Error::config(format!(
                "completion_window_seconds must be positive, got {}",
                playback.completion_window_seconds
            )));
        }

        if playback.save_debounce_seconds == 0 {
            return Err(Error::config("save_debounce_seconds must be at least 1"));
        }

        if playback.controls_hide_seconds == 0 {
            return Err(Error::config("controls_hide_seconds must be at least 1"));
        }

        if playback.headless_tick_ms == 0 {
            return Err(Error::config("headless_tick_ms must be at least 1"));
        }

        // Validate log_level is a known level
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.to_lowercase().as_str()) {
            return Err(Error::config(format!(
                "log_level must be one of {:?}, got '{}'",
                valid_levels, self.general.log_level
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!((config.playback.min_save_seconds - 5.0).abs() < f64::EPSILON);
        assert!((config.playback.completion_window_seconds - 10.0).abs() < f64::EPSILON);
        assert_eq!(config.playback.save_debounce_seconds, 10);
        assert_eq!(config.playback.controls_hide_seconds, 5);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [general]
            viewer_id = "viewer-1"

            [playback]
            save_debounce_seconds = 30
            "#,
        )
        .unwrap();

        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.playback.save_debounce_seconds, 30);
        assert_eq!(config.playback.controls_hide_seconds, 5);
        assert_eq!(
            config.current_viewer(None),
            Some(ViewerId::from("viewer-1"))
        );
    }

    #[test]
    fn test_current_viewer_prefers_explicit() {
        let mut config = Config::default();
        config.general.viewer_id = Some("from-config".to_string());

        assert_eq!(
            config.current_viewer(Some("from-flag")),
            Some(ViewerId::from("from-flag"))
        );
        assert_eq!(config.current_viewer(Some("  ")), None);

        config.general.viewer_id = None;
        assert_eq!(config.current_viewer(None), None);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.playback.completion_window_seconds = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.playback.save_debounce_seconds = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.general.log_level = "loud".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.playback.min_save_seconds = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_playback_conversions() {
        let playback = PlaybackConfig::default();
        let timings = playback.timings();
        assert_eq!(timings.save_debounce, Duration::from_secs(10));
        assert_eq!(timings.controls_hide, Duration::from_secs(5));

        let policy = playback.policy();
        assert!((policy.min_progress_seconds - 5.0).abs() < f64::EPSILON);
        assert_eq!(playback.headless_tick(), Duration::from_millis(250));
    }
}
