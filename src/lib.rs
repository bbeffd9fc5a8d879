//! # Activity Tracker
//!
//! GPS activity session tracking for running, walking, hiking and cycling.
//!
//! This library provides:
//! - A session state machine (`idle → countdown → active ⇄ paused → stopped`)
//! - Great-circle distance, live pace and whole-kilometre splits
//! - One-shot goal detection (distance, time, calories)
//! - Session persistence with a local fallback store
//! - Activity history statistics and personal bests
//! - Weather-based activity recommendations
//!
//! ## Features
//!
//! - **`runtime`** (default) - Async session runner and sensor subscription (tokio)
//! - **`http`** - Weather and geocoding client
//! - **`persistence`** - SQLite session store
//! - **`parallel`** - Parallel history summaries with rayon
//! - **`ffi`** - FFI bindings for mobile platforms (iOS/Android)
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use activity_tracker::{ActivityKind, ActivityTracker, Goal, Sample, TrackerConfig};
//!
//! let mut tracker = ActivityTracker::new(TrackerConfig::default());
//! let t0 = 1_700_000_000_000;
//!
//! tracker.start(ActivityKind::Running, Some(Goal::distance(5.0)), t0).unwrap();
//! tracker.tick(t0 + 3_000); // countdown elapses, session becomes active
//!
//! tracker.on_sample(Sample::new(0.0, 0.0, t0 + 4_000));
//! tracker.on_sample(Sample::new(0.0, 0.01, t0 + 400_000));
//!
//! let session = tracker.stop(t0 + 400_000).unwrap();
//! assert_eq!(session.splits.len(), 1);
//! println!("{:.2} km at {}", session.total_distance_km, session.average_pace_label());
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Unified error handling
pub mod error;
pub use error::{Result, TrackerError};

// Geographic utilities (distance, bounds, simplification)
pub mod geo_utils;

// Pace, calories, steps and signal quality
pub mod metrics;
pub use metrics::{format_duration, format_pace, parse_pace, SignalQuality, StepDetector};

// Goals and the one-shot achievement latch
pub mod goal;
pub use goal::{Goal, GoalKind, GoalProgress};

// Tracker configuration, app configuration and saved preferences
pub mod config;
pub use config::{AppConfig, Preferences, TrackerConfig};

// Session state machine
pub mod tracker;
pub use tracker::{ActivityTracker, LiveSnapshot, TrackerEvent, TrackerNotice};

// Session persistence
pub mod store;
pub use store::{
    FallbackStore, JsonFileStore, MemoryStore, SaveOutcome, SessionId, SessionStore,
    StoredSession, UserId,
};
#[cfg(feature = "persistence")]
pub use store::SqliteStore;

// Activity history filters, statistics and personal bests
pub mod history;
pub use history::{
    DateRange, DistanceBucket, HistoryFilter, HistoryStats, PersonalBests, SortOrder,
};

// Weather recommendations and (optionally) the HTTP client
pub mod weather;
pub use weather::{
    recommend_activities, ActivityRecommendation, CurrentConditions, Suitability, WeatherSummary,
};
#[cfg(feature = "http")]
pub use weather::WeatherClient;

// Location sensor subscription
#[cfg(feature = "runtime")]
pub mod sensor;
#[cfg(feature = "runtime")]
pub use sensor::{ChannelSensor, LocationSensor, ReplaySensor, SensorEvent, SensorFeed};

// Async session runner
#[cfg(feature = "runtime")]
pub mod runner;
#[cfg(feature = "runtime")]
pub use runner::{RunnerCommand, RunnerHandle, RunnerNotice, SessionRunner};

// Application context (config + store + user)
pub mod context;
pub use context::AppContext;

// FFI bindings for mobile platforms (iOS/Android)
#[cfg(feature = "ffi")]
pub mod ffi;

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "android"))]
pub(crate) fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("ActivityTrackerRust"),
    );
}

#[cfg(all(feature = "ffi", not(target_os = "android")))]
pub(crate) fn init_logging() {
    // No-op on non-Android platforms
}

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate with latitude and longitude.
///
/// # Example
/// ```
/// use activity_tracker::GpsPoint;
/// let point = GpsPoint::new(51.5074, -0.1278); // London
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// One raw geolocation reading from the location sensor.
///
/// Samples are appended to a session's route in delivery order and never
/// modified afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    pub latitude: f64,
    pub longitude: f64,
    /// Unix timestamp in milliseconds
    pub timestamp_ms: i64,
    /// Reported horizontal accuracy in meters, if the sensor provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy_m: Option<f64>,
}

impl Sample {
    /// Create a sample without an accuracy estimate.
    pub fn new(latitude: f64, longitude: f64, timestamp_ms: i64) -> Self {
        Self {
            latitude,
            longitude,
            timestamp_ms,
            accuracy_m: None,
        }
    }

    /// Attach a horizontal accuracy estimate (meters).
    pub fn with_accuracy(mut self, accuracy_m: f64) -> Self {
        self.accuracy_m = Some(accuracy_m);
        self
    }

    /// The coordinate part of this sample.
    pub fn point(&self) -> GpsPoint {
        GpsPoint::new(self.latitude, self.longitude)
    }
}

/// Bounding box for a route.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Create bounds from GPS points.
    pub fn from_points(points: &[GpsPoint]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        Some(geo_utils::compute_bounds(points))
    }

    /// Get the center point of the bounds.
    pub fn center(&self) -> GpsPoint {
        GpsPoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }
}

/// Kind of activity being tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    #[default]
    Running,
    Walking,
    Hiking,
    Cycling,
}

impl ActivityKind {
    /// All activity kinds, in display order.
    pub const ALL: [ActivityKind; 4] = [
        ActivityKind::Running,
        ActivityKind::Walking,
        ActivityKind::Hiking,
        ActivityKind::Cycling,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Running => "running",
            ActivityKind::Walking => "walking",
            ActivityKind::Hiking => "hiking",
            ActivityKind::Cycling => "cycling",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityKind {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "running" | "run" => Ok(ActivityKind::Running),
            "walking" | "walk" => Ok(ActivityKind::Walking),
            "hiking" | "hike" => Ok(ActivityKind::Hiking),
            "cycling" | "ride" | "bike" => Ok(ActivityKind::Cycling),
            other => Err(TrackerError::Config {
                message: format!("unknown activity kind '{}'", other),
            }),
        }
    }
}

/// Lifecycle state of the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum TrackerState {
    Idle,
    CountdownWarmup,
    Active,
    Paused,
    Stopped,
}

impl fmt::Display for TrackerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TrackerState::Idle => "idle",
            TrackerState::CountdownWarmup => "counting down",
            TrackerState::Active => "active",
            TrackerState::Paused => "paused",
            TrackerState::Stopped => "stopped",
        })
    }
}

/// A checkpoint recorded each time cumulative distance crosses a whole kilometre.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(rename_all = "camelCase")]
pub struct Split {
    /// Whole-kilometre marker (1, 2, 3, ...)
    pub marker_km: u32,
    /// Active (unpaused) seconds since the session started
    pub elapsed_secs: f64,
    /// Pace at the marker in seconds per kilometre
    pub pace_secs_per_km: f64,
    /// Active seconds since the previous split (or session start)
    pub split_secs: f64,
}

/// A finished activity session, as handed to the persistence sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub activity_kind: ActivityKind,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Wall-clock duration minus every paused interval
    pub total_duration_secs: f64,
    pub total_distance_km: f64,
    pub total_calories: u32,
    pub step_count: u64,
    /// Average pace in seconds per kilometre; `None` when no distance was covered
    pub average_pace_secs_per_km: Option<f64>,
    pub splits: Vec<Split>,
    pub route: Vec<Sample>,
    #[serde(default)]
    pub goal: Option<Goal>,
    #[serde(default)]
    pub goal_achieved: bool,
}

impl Session {
    /// Average pace formatted as `m:ss`, or `--:--` without distance.
    pub fn average_pace_label(&self) -> String {
        format_pace(self.average_pace_secs_per_km)
    }

    /// Duration formatted as `hh:mm:ss`.
    pub fn duration_label(&self) -> String {
        format_duration(self.total_duration_secs)
    }

    /// Simplified route for map previews (about 11 m tolerance).
    pub fn preview_route(&self) -> Vec<GpsPoint> {
        geo_utils::simplify_route(&self.route, 0.0001)
    }

    /// Bounding box of the recorded route.
    pub fn bounds(&self) -> Option<Bounds> {
        let points: Vec<GpsPoint> = self.route.iter().map(Sample::point).collect();
        Bounds::from_points(&points)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gps_point_validation() {
        assert!(GpsPoint::new(51.5074, -0.1278).is_valid());
        assert!(!GpsPoint::new(91.0, 0.0).is_valid());
        assert!(!GpsPoint::new(0.0, 181.0).is_valid());
        assert!(!GpsPoint::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_activity_kind_parse() {
        assert_eq!("Running".parse::<ActivityKind>().unwrap(), ActivityKind::Running);
        assert_eq!("hike".parse::<ActivityKind>().unwrap(), ActivityKind::Hiking);
        assert_eq!(ActivityKind::Cycling.to_string(), "cycling");
        assert!("swimming".parse::<ActivityKind>().is_err());
    }

    #[test]
    fn test_sample_serializes_camel_case() {
        let sample = Sample::new(1.5, 2.5, 1000).with_accuracy(8.0);
        let json = serde_json::to_value(sample).unwrap();
        assert_eq!(json["timestampMs"], 1000);
        assert_eq!(json["accuracyM"], 8.0);

        let bare = serde_json::to_value(Sample::new(1.5, 2.5, 1000)).unwrap();
        assert!(bare.get("accuracyM").is_none());
    }

    #[test]
    fn test_bounds_center() {
        let bounds = Bounds::from_points(&[
            GpsPoint::new(51.50, -0.10),
            GpsPoint::new(51.52, -0.12),
        ])
        .unwrap();
        let center = bounds.center();
        assert!((center.latitude - 51.51).abs() < 1e-9);
        assert!((center.longitude + 0.11).abs() < 1e-9);
        assert!(Bounds::from_points(&[]).is_none());
    }
}
