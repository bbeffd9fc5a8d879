//! FFI bindings for mobile hosts (iOS/Android).
//!
//! The host owns the clock and the platform location APIs; it drives an
//! [`FfiTracker`] with explicit timestamps and renders the returned
//! [`FfiNotice`]s. Finished sessions come back as JSON so the host can store
//! them wherever it likes.

use log::{debug, info};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::{
    init_logging, metrics, weather, ActivityKind, ActivityRecommendation, ActivityTracker, Goal,
    GoalKind, GpsPoint, LiveSnapshot, Sample, SignalQuality, Split, TrackerConfig, TrackerError,
    TrackerNotice, TrackerState,
};

/// Flattened [`TrackerNotice`] for foreign languages.
///
/// `kind` names the notice; only the fields relevant to it are set.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiNotice {
    /// countdown | started | split | goal | paused | resumed | sensor_lost | snapshot | cancelled | finished
    pub kind: String,
    pub remaining_secs: Option<u32>,
    pub split: Option<Split>,
    pub goal: Option<Goal>,
    pub snapshot: Option<LiveSnapshot>,
    pub message: Option<String>,
    pub fallback: Option<GpsPoint>,
    pub session_json: Option<String>,
}

impl FfiNotice {
    fn empty(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            remaining_secs: None,
            split: None,
            goal: None,
            snapshot: None,
            message: None,
            fallback: None,
            session_json: None,
        }
    }
}

impl From<TrackerNotice> for FfiNotice {
    fn from(notice: TrackerNotice) -> Self {
        match notice {
            TrackerNotice::CountdownTick { remaining_secs } => Self {
                remaining_secs: Some(remaining_secs),
                ..Self::empty("countdown")
            },
            TrackerNotice::SessionStarted { kind } => Self {
                message: Some(kind.to_string()),
                ..Self::empty("started")
            },
            TrackerNotice::SplitRecorded(split) => Self {
                split: Some(split),
                ..Self::empty("split")
            },
            TrackerNotice::GoalAchieved(goal) => Self {
                goal: Some(goal),
                message: Some(format!("Goal achieved! {} completed", goal)),
                ..Self::empty("goal")
            },
            TrackerNotice::Paused => Self::empty("paused"),
            TrackerNotice::Resumed => Self::empty("resumed"),
            TrackerNotice::SensorLost { error, fallback } => Self {
                message: Some(error.to_string()),
                fallback: Some(fallback),
                ..Self::empty("sensor_lost")
            },
            TrackerNotice::Snapshot(snapshot) => Self {
                snapshot: Some(snapshot),
                ..Self::empty("snapshot")
            },
            TrackerNotice::Cancelled => Self::empty("cancelled"),
            TrackerNotice::SessionFinished(session) => Self {
                session_json: serde_json::to_string(&session).ok(),
                ..Self::empty("finished")
            },
        }
    }
}

fn convert(notices: Vec<TrackerNotice>) -> Vec<FfiNotice> {
    notices.into_iter().map(FfiNotice::from).collect()
}

fn parse_goal(kind: Option<String>, value: f64) -> Result<Option<Goal>, TrackerError> {
    let Some(kind) = kind else {
        return Ok(None);
    };
    let kind = match kind.to_ascii_lowercase().as_str() {
        "distance" => GoalKind::Distance,
        "time" => GoalKind::Time,
        "calories" => GoalKind::Calories,
        other => {
            return Err(TrackerError::Config {
                message: format!("unknown goal kind '{}'", other),
            })
        }
    };
    Ok(Some(Goal {
        kind,
        target_value: value,
    }))
}

// ============================================================================
// Tracker Object
// ============================================================================

/// Session tracker handle for the host app.
#[derive(uniffi::Object)]
pub struct FfiTracker {
    inner: Mutex<ActivityTracker>,
}

impl FfiTracker {
    fn tracker(&self) -> MutexGuard<'_, ActivityTracker> {
        // A panic mid-update leaves plain data behind; keep serving it.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[uniffi::export]
impl FfiTracker {
    #[uniffi::constructor]
    pub fn new() -> Arc<Self> {
        init_logging();
        info!("[ActivityTrackerRust] tracker created with default config");
        Arc::new(Self {
            inner: Mutex::new(ActivityTracker::default()),
        })
    }

    /// Fails with a configuration error when `config` is unusable.
    #[uniffi::constructor]
    pub fn with_config(config: TrackerConfig) -> Result<Arc<Self>, TrackerError> {
        init_logging();
        config.validate()?;
        info!("[ActivityTrackerRust] tracker created (countdown {}s)", config.countdown_secs);
        Ok(Arc::new(Self {
            inner: Mutex::new(ActivityTracker::new(config)),
        }))
    }

    /// `activity_kind`: running | walking | hiking | cycling.
    /// `goal_kind`: distance | time | calories, or none.
    pub fn start(
        &self,
        activity_kind: String,
        goal_kind: Option<String>,
        goal_value: f64,
        now_ms: i64,
    ) -> Result<Vec<FfiNotice>, TrackerError> {
        let kind: ActivityKind = activity_kind.parse()?;
        let goal = parse_goal(goal_kind, goal_value)?;
        self.tracker().start(kind, goal, now_ms).map(convert)
    }

    pub fn cancel(&self) -> Result<Vec<FfiNotice>, TrackerError> {
        self.tracker().cancel().map(convert)
    }

    pub fn tick(&self, now_ms: i64) -> Vec<FfiNotice> {
        convert(self.tracker().tick(now_ms))
    }

    pub fn on_location(
        &self,
        latitude: f64,
        longitude: f64,
        accuracy_m: Option<f64>,
        timestamp_ms: i64,
    ) -> Vec<FfiNotice> {
        let sample = Sample {
            latitude,
            longitude,
            timestamp_ms,
            accuracy_m,
        };
        convert(self.tracker().on_sample(sample))
    }

    pub fn on_motion(&self, x: f64, y: f64, z: f64) {
        self.tracker().on_motion(x, y, z);
    }

    /// `reason`: permission_denied | timeout | anything else (unavailable).
    pub fn on_location_error(&self, reason: String, detail: String) -> Vec<FfiNotice> {
        let mut tracker = self.tracker();
        let error = match reason.as_str() {
            "permission_denied" => TrackerError::SensorPermissionDenied,
            "timeout" => TrackerError::SensorTimeout {
                timeout_ms: tracker.config().sensor_timeout_ms,
            },
            _ => TrackerError::SensorUnavailable { message: detail },
        };
        debug!("[ActivityTrackerRust] location error: {}", error);
        convert(tracker.on_sensor_error(error))
    }

    pub fn pause(&self, now_ms: i64) -> Result<Vec<FfiNotice>, TrackerError> {
        self.tracker().pause(now_ms).map(convert)
    }

    pub fn resume(&self, now_ms: i64) -> Result<Vec<FfiNotice>, TrackerError> {
        self.tracker().resume(now_ms).map(convert)
    }

    /// Finish the session and return it as JSON.
    pub fn stop(&self, now_ms: i64) -> Result<String, TrackerError> {
        let session = self.tracker().stop(now_ms)?;
        info!(
            "[ActivityTrackerRust] session finished: {:.2} km, {}",
            session.total_distance_km,
            session.duration_label()
        );
        Ok(serde_json::to_string(&session)?)
    }

    pub fn snapshot(&self, now_ms: i64) -> LiveSnapshot {
        self.tracker().snapshot(now_ms)
    }

    pub fn state(&self) -> TrackerState {
        self.tracker().state()
    }
}

// ============================================================================
// Free Functions
// ============================================================================

#[uniffi::export]
pub fn default_tracker_config() -> TrackerConfig {
    TrackerConfig::default()
}

#[uniffi::export]
pub fn ffi_format_pace(pace_secs_per_km: Option<f64>) -> String {
    metrics::format_pace(pace_secs_per_km)
}

#[uniffi::export]
pub fn ffi_format_duration(total_secs: f64) -> String {
    metrics::format_duration(total_secs)
}

#[uniffi::export]
pub fn ffi_signal_quality(accuracy_m: Option<f64>) -> SignalQuality {
    SignalQuality::from_accuracy(accuracy_m)
}

#[uniffi::export]
pub fn ffi_recommend_activities(
    temp_c: f64,
    condition: String,
    wind_kmh: f64,
    humidity_pct: f64,
) -> Vec<ActivityRecommendation> {
    weather::recommend_activities(temp_c, &condition, wind_kmh, humidity_pct)
}
