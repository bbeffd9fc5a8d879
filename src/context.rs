//! Application context.
//!
//! Created once at startup and passed explicitly to whatever needs it (the
//! session runner, the FFI layer, demos). Owns configuration, the session
//! store stack and the signed-in user.

use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;

use crate::store::{FallbackStore, JsonFileStore, MemoryStore, SessionStore, UserId};
use crate::{AppConfig, Preferences, Result, TrackerConfig};

#[cfg(feature = "http")]
use crate::weather::WeatherClient;

const PREFERENCES_FILE: &str = "preferences.json";

pub struct AppContext {
    pub app: AppConfig,
    pub tracker: TrackerConfig,
    user: UserId,
    store: Arc<FallbackStore>,
    #[cfg(feature = "http")]
    weather: Option<WeatherClient>,
}

impl AppContext {
    /// Build the default context for a user.
    ///
    /// Sessions go to a store under `app.session_store_path` (SQLite with the
    /// `persistence` feature, JSON files otherwise) with an in-memory local
    /// cache behind it.
    pub fn init(app: AppConfig, user: UserId) -> Result<Self> {
        std::fs::create_dir_all(&app.session_store_path).map_err(|e| {
            crate::TrackerError::Config {
                message: format!(
                    "cannot create {}: {}",
                    app.session_store_path.display(),
                    e
                ),
            }
        })?;

        #[cfg(feature = "persistence")]
        let primary: Box<dyn SessionStore> = {
            let db_path = app.session_store_path.join("sessions.db");
            Box::new(crate::store::SqliteStore::new(&db_path.to_string_lossy())?)
        };
        #[cfg(not(feature = "persistence"))]
        let primary: Box<dyn SessionStore> =
            Box::new(JsonFileStore::new(app.session_store_path.clone())?);

        Self::with_stores(
            app,
            TrackerConfig::default(),
            user,
            primary,
            Box::new(MemoryStore::new()),
        )
    }

    /// Build a context around caller-supplied stores.
    pub fn with_stores(
        app: AppConfig,
        tracker: TrackerConfig,
        user: UserId,
        primary: Box<dyn SessionStore>,
        local: Box<dyn SessionStore>,
    ) -> Result<Self> {
        tracker.validate()?;

        #[cfg(feature = "http")]
        let weather = match app.openweather_key.as_deref() {
            Some(key) => Some(WeatherClient::new(key)?),
            None => None,
        };

        info!(
            "[Context] {} ({}) ready for user {} via {}",
            app.app_name,
            app.environment,
            user,
            primary.name()
        );

        Ok(Self {
            app,
            tracker,
            user,
            store: Arc::new(FallbackStore::new(primary, local)),
            #[cfg(feature = "http")]
            weather,
        })
    }

    /// Use a JSON file store as the local cache instead of memory, so
    /// sessions survive a restart when the primary is unreachable.
    pub fn with_file_cache(
        app: AppConfig,
        tracker: TrackerConfig,
        user: UserId,
        primary: Box<dyn SessionStore>,
    ) -> Result<Self> {
        let cache = JsonFileStore::new(app.session_store_path.join("pending"))?;
        Self::with_stores(app, tracker, user, primary, Box::new(cache))
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }

    pub fn store(&self) -> Arc<FallbackStore> {
        Arc::clone(&self.store)
    }

    #[cfg(feature = "http")]
    pub fn weather(&self) -> Option<&WeatherClient> {
        self.weather.as_ref()
    }

    pub fn preferences_path(&self) -> PathBuf {
        self.app.session_store_path.join(PREFERENCES_FILE)
    }

    pub fn load_preferences(&self) -> Result<Preferences> {
        Preferences::load(&self.preferences_path())
    }

    pub fn save_preferences(&self, prefs: &Preferences) -> Result<()> {
        prefs.save(&self.preferences_path())
    }

    /// Release the context. Reports sessions that never reached the primary
    /// store.
    pub fn shutdown(self) -> usize {
        let pending = match self.store.pending_local(&self.user) {
            Ok(sessions) => sessions.len(),
            Err(e) => {
                warn!("[Context] could not read local cache on shutdown: {}", e);
                0
            }
        };
        if pending > 0 {
            warn!(
                "[Context] shutting down with {} session(s) only cached locally",
                pending
            );
        } else {
            info!("[Context] shutdown");
        }
        pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ActivityKind, Goal};

    fn app_in(dir: &std::path::Path) -> AppConfig {
        AppConfig {
            session_store_path: dir.join("data"),
            ..AppConfig::default()
        }
    }

    #[test]
    fn test_init_creates_store_directory() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = AppContext::init(app_in(dir.path()), UserId::new("u1")).unwrap();
        assert!(dir.path().join("data").is_dir());
        assert_eq!(ctx.user().as_str(), "u1");
        assert!(ctx.store().list(ctx.user()).unwrap().is_empty());
        assert_eq!(ctx.shutdown(), 0);
    }

    #[test]
    fn test_preferences_round_trip_through_context() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = AppContext::init(app_in(dir.path()), UserId::new("u1")).unwrap();
        assert_eq!(ctx.load_preferences().unwrap(), Preferences::default());

        let prefs = Preferences {
            last_activity_kind: ActivityKind::Cycling,
            last_goal: Goal::calories(400.0),
        };
        ctx.save_preferences(&prefs).unwrap();
        assert_eq!(ctx.load_preferences().unwrap(), prefs);
    }

    #[test]
    fn test_invalid_tracker_config_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = TrackerConfig {
            tick_interval_ms: 0,
            ..TrackerConfig::default()
        };
        let result = AppContext::with_stores(
            app_in(dir.path()),
            tracker,
            UserId::new("u1"),
            Box::new(MemoryStore::new()),
            Box::new(MemoryStore::new()),
        );
        assert!(result.is_err());
    }
}
