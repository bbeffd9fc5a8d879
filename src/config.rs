//! # Configuration
//!
//! Three layers of configuration:
//!
//! | Type | Source | Purpose |
//! |------|--------|---------|
//! | [`TrackerConfig`] | code / JSON | Tuning constants for the session state machine |
//! | [`AppConfig`] | environment | App name, environment, API key, store location |
//! | [`Preferences`] | JSON file | Last activity kind and goal chosen by the user |

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::metrics::ActivityRates;
use crate::{ActivityKind, Goal, GpsPoint, Result, TrackerError};

// ============================================================================
// Tracker Configuration
// ============================================================================

/// Tuning constants for [`ActivityTracker`](crate::ActivityTracker).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(default)]
pub struct TrackerConfig {
    /// Lead-in before a session becomes active (seconds). Default: 3
    pub countdown_secs: u32,
    /// Distance between splits (km). Default: 1.0
    pub split_distance_km: f64,
    /// Live snapshot cadence used by the runner (ms). Default: 1000
    pub tick_interval_ms: u64,
    /// Acceleration magnitude that counts as a step (m/s²). Default: 15.0
    pub step_threshold: f64,
    /// Time allowed for the first fix before reporting a timeout (ms). Default: 5000
    pub sensor_timeout_ms: u64,
    /// Location reported when the sensor fails. Default: San Francisco
    pub fallback_location: GpsPoint,
    /// Reject samples with reported accuracy worse than this (m). Default: None
    pub max_accuracy_m: Option<f64>,
    /// kcal per km for each activity kind
    pub calories_per_km: ActivityRates,
    /// Simulated steps per km for each activity kind
    pub steps_per_km: ActivityRates,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            countdown_secs: 3,
            split_distance_km: 1.0,
            tick_interval_ms: 1000,
            step_threshold: 15.0,
            sensor_timeout_ms: 5000,
            fallback_location: GpsPoint::new(37.7749, -122.4194),
            max_accuracy_m: None,
            calories_per_km: ActivityRates::default_calories(),
            steps_per_km: ActivityRates::default_steps(),
        }
    }
}

impl TrackerConfig {
    /// Longer lead-in used before a warmup.
    pub fn warmup() -> Self {
        Self {
            countdown_secs: 5,
            ..Self::default()
        }
    }

    /// Check the constants are usable.
    pub fn validate(&self) -> Result<()> {
        if !(self.split_distance_km.is_finite() && self.split_distance_km > 0.0) {
            return Err(TrackerError::Config {
                message: format!("split distance must be positive, got {}", self.split_distance_km),
            });
        }
        if self.tick_interval_ms == 0 {
            return Err(TrackerError::Config {
                message: "tick interval must be non-zero".to_string(),
            });
        }
        if let Some(limit) = self.max_accuracy_m {
            if !(limit.is_finite() && limit > 0.0) {
                return Err(TrackerError::Config {
                    message: format!("accuracy limit must be positive, got {}", limit),
                });
            }
        }
        if !self.fallback_location.is_valid() {
            return Err(TrackerError::Config {
                message: "fallback location is not a valid coordinate".to_string(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// App Configuration
// ============================================================================

/// Application settings read from the environment at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub app_name: String,
    pub environment: String,
    pub openweather_key: Option<String>,
    /// Directory for the local JSON session store
    pub session_store_path: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_name: "FitForge".to_string(),
            environment: "development".to_string(),
            openweather_key: None,
            session_store_path: PathBuf::from("sessions"),
        }
    }
}

impl AppConfig {
    /// Read `APP_NAME`, `ENV`, `OPENWEATHER_KEY` and `SESSION_STORE_PATH`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset or blank keys fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let config = Self {
            app_name: get("APP_NAME").unwrap_or(defaults.app_name),
            environment: get("ENV").unwrap_or(defaults.environment),
            openweather_key: get("OPENWEATHER_KEY"),
            session_store_path: get("SESSION_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.session_store_path),
        };

        if config.openweather_key.is_none() {
            warn!("[Config] OPENWEATHER_KEY not set, weather lookups disabled");
        }
        config
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

// ============================================================================
// User Preferences
// ============================================================================

/// Choices remembered between sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Preferences {
    pub last_activity_kind: ActivityKind,
    pub last_goal: Goal,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            last_activity_kind: ActivityKind::Running,
            last_goal: Goal::distance(5.0),
        }
    }
}

impl Preferences {
    /// Load preferences from a JSON file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(
                "[Config] No preferences at {}, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|e| TrackerError::Config {
            message: format!("reading {}: {}", path.display(), e),
        })?;
        let prefs: Preferences = serde_json::from_str(&contents)?;
        Ok(prefs)
    }

    /// Write preferences as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| TrackerError::Config {
            message: format!("writing {}: {}", path.display(), e),
        })?;
        info!(
            "[Config] Saved preferences to {} ({}, goal {})",
            path.display(),
            self.last_activity_kind,
            self.last_goal
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_tracker_defaults() {
        let config = TrackerConfig::default();
        assert_eq!(config.countdown_secs, 3);
        assert_eq!(config.sensor_timeout_ms, 5000);
        assert_eq!(config.max_accuracy_m, None);
        assert_eq!(TrackerConfig::warmup().countdown_secs, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_tracker_config_validation() {
        let bad = TrackerConfig {
            split_distance_km: 0.0,
            ..TrackerConfig::default()
        };
        assert!(matches!(bad.validate(), Err(TrackerError::Config { .. })));

        let bad = TrackerConfig {
            max_accuracy_m: Some(-1.0),
            ..TrackerConfig::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_tracker_config_partial_json() {
        let config: TrackerConfig = serde_json::from_str(r#"{"countdown_secs": 5}"#).unwrap();
        assert_eq!(config.countdown_secs, 5);
        assert_eq!(config.split_distance_km, 1.0);
    }

    #[test]
    fn test_app_config_from_lookup() {
        let mut env = HashMap::new();
        env.insert("ENV", "production".to_string());
        env.insert("OPENWEATHER_KEY", "abc123".to_string());
        env.insert("APP_NAME", "  ".to_string());

        let config = AppConfig::from_lookup(|k| env.get(k).cloned());
        assert_eq!(config.app_name, "FitForge");
        assert!(config.is_production());
        assert_eq!(config.openweather_key.as_deref(), Some("abc123"));
        assert_eq!(config.session_store_path, PathBuf::from("sessions"));
    }

    #[test]
    fn test_preferences_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = Preferences::load(&dir.path().join("prefs.json")).unwrap();
        assert_eq!(prefs, Preferences::default());
        assert_eq!(prefs.last_goal, Goal::distance(5.0));
    }

    #[test]
    fn test_preferences_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        let prefs = Preferences {
            last_activity_kind: ActivityKind::Hiking,
            last_goal: Goal::time(45.0),
        };
        prefs.save(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("lastActivityKind"));
        assert_eq!(Preferences::load(&path).unwrap(), prefs);
    }
}
