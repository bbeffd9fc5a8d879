//! # Activity Session Tracker
//!
//! A synchronous state machine that turns user commands, location samples and
//! clock ticks into live metrics and, on stop, a finished [`Session`].
//!
//! ```text
//! idle ──start──▶ countdown ──(lead-in elapsed)──▶ active ⇄ paused
//!                    │                               │        │
//!                  cancel                            └─stop───┴──▶ stopped
//!                    ▼
//!                  idle
//! ```
//!
//! Every operation takes the current time explicitly (`now_ms`, Unix
//! milliseconds) and returns the [`TrackerNotice`]s it produced. The tracker
//! never reads a clock, spawns a task or touches a sensor; the
//! [`SessionRunner`](crate::SessionRunner) owns those concerns and feeds this
//! reducer.
//!
//! ## Distance
//!
//! Total distance is recomputed from scratch over the whole route on every
//! accepted sample (see [`geo_utils::route_distance_km`]). It is never kept as
//! a running counter, so it always equals the ordered pairwise sum.
//!
//! ## Splits
//!
//! When the distance since the last split reaches the split distance, one
//! split is emitted at the marker `floor(distance / split_distance)`. A single
//! sample that jumps across several markers produces one split at the highest
//! marker crossed.
//!
//! ## Sample time
//!
//! [`ActivityTracker::on_sample`] times the splits and goals a sample reaches
//! with the sample's own timestamp; [`ActivityTracker::apply`] (the runner's
//! path) uses the caller's `now_ms`, the moment the fix was received, so a
//! stale fix the platform cached earlier is not back-dated. Either time is
//! clamped to the session start.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::geo_utils;
use crate::goal::GoalLatch;
use crate::metrics::{self, SignalQuality, StepDetector};
use crate::{
    ActivityKind, Goal, GoalProgress, GpsPoint, Result, Sample, Session, Split, TrackerConfig,
    TrackerError, TrackerState,
};

// ============================================================================
// Events and Notices
// ============================================================================

/// Everything that can happen to a tracker, as a value.
///
/// [`ActivityTracker::apply`] dispatches these to the individual operations;
/// the runner uses it to keep a single code path for all inputs.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    Start {
        kind: ActivityKind,
        goal: Option<Goal>,
    },
    Cancel,
    Tick,
    Sample(Sample),
    Motion {
        x: f64,
        y: f64,
        z: f64,
    },
    SensorError(TrackerError),
    Pause,
    Resume,
    Stop,
}

/// Output of the tracker for the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerNotice {
    /// Seconds left in the lead-in
    CountdownTick { remaining_secs: u32 },
    /// Lead-in finished; location updates should begin now
    SessionStarted { kind: ActivityKind },
    SplitRecorded(Split),
    GoalAchieved(Goal),
    Paused,
    Resumed,
    /// Location sensor failed; the fallback is suitable for centring a map
    SensorLost {
        error: TrackerError,
        fallback: GpsPoint,
    },
    Snapshot(LiveSnapshot),
    /// Lead-in aborted before the session became active
    Cancelled,
    SessionFinished(Box<Session>),
}

/// Live view-model of the current session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(rename_all = "camelCase")]
pub struct LiveSnapshot {
    pub state: TrackerState,
    pub activity_kind: ActivityKind,
    pub elapsed_secs: f64,
    pub distance_km: f64,
    pub pace_secs_per_km: Option<f64>,
    pub calories: u32,
    pub steps: u64,
    pub split_count: u32,
    pub sample_count: u32,
    pub signal: SignalQuality,
    pub last_point: Option<GpsPoint>,
    pub goal_progress: Option<GoalProgress>,
}

impl LiveSnapshot {
    pub fn pace_label(&self) -> String {
        metrics::format_pace(self.pace_secs_per_km)
    }

    pub fn elapsed_label(&self) -> String {
        metrics::format_duration(self.elapsed_secs)
    }
}

// ============================================================================
// Tracker
// ============================================================================

/// Session state machine. See the [module docs](self).
#[derive(Debug, Clone)]
pub struct ActivityTracker {
    config: TrackerConfig,
    state: TrackerState,
    kind: ActivityKind,
    goal: GoalLatch,

    countdown_started_ms: i64,
    countdown_remaining: u32,

    start_ms: i64,
    pause_started_ms: Option<i64>,
    total_paused_ms: i64,

    route: Vec<Sample>,
    distance_km: f64,
    last_split_distance_km: f64,
    splits: Vec<Split>,

    step_detector: StepDetector,
    motion_seen: bool,
    simulated_steps: u64,

    last_accuracy_m: Option<f64>,
}

impl Default for ActivityTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

impl ActivityTracker {
    pub fn new(config: TrackerConfig) -> Self {
        let step_detector = StepDetector::new(config.step_threshold);
        Self {
            config,
            state: TrackerState::Idle,
            kind: ActivityKind::default(),
            goal: GoalLatch::default(),
            countdown_started_ms: 0,
            countdown_remaining: 0,
            start_ms: 0,
            pause_started_ms: None,
            total_paused_ms: 0,
            route: Vec::new(),
            distance_km: 0.0,
            last_split_distance_km: 0.0,
            splits: Vec::new(),
            step_detector,
            motion_seen: false,
            simulated_steps: 0,
            last_accuracy_m: None,
        }
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn activity_kind(&self) -> ActivityKind {
        self.kind
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn goal(&self) -> Option<Goal> {
        self.goal.goal()
    }

    pub fn route(&self) -> &[Sample] {
        &self.route
    }

    pub fn splits(&self) -> &[Split] {
        &self.splits
    }

    pub fn distance_km(&self) -> f64 {
        self.distance_km
    }

    /// True while location updates are wanted (active or paused).
    pub fn is_recording(&self) -> bool {
        matches!(self.state, TrackerState::Active | TrackerState::Paused)
    }

    /// Active (unpaused) seconds since the session became active.
    ///
    /// While paused the value is frozen at the moment the pause began.
    pub fn active_secs(&self, now_ms: i64) -> f64 {
        if !self.is_recording() {
            return 0.0;
        }
        self.active_secs_at(now_ms)
    }

    /// Active seconds from the recorded start and pause totals, whatever the
    /// current state.
    fn active_secs_at(&self, now_ms: i64) -> f64 {
        let until = self.pause_started_ms.unwrap_or(now_ms);
        let active_ms = until - self.start_ms - self.total_paused_ms;
        (active_ms.max(0) as f64) / 1000.0
    }

    pub fn calories(&self) -> u32 {
        metrics::estimate_calories(
            self.distance_km,
            self.config.calories_per_km.rate_for(self.kind),
        )
    }

    pub fn steps(&self) -> u64 {
        if self.motion_seen {
            self.step_detector.steps()
        } else {
            self.simulated_steps
        }
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    /// Dispatch an event to the matching operation.
    pub fn apply(&mut self, event: TrackerEvent, now_ms: i64) -> Result<Vec<TrackerNotice>> {
        match event {
            TrackerEvent::Start { kind, goal } => self.start(kind, goal, now_ms),
            TrackerEvent::Cancel => self.cancel(),
            TrackerEvent::Tick => Ok(self.tick(now_ms)),
            TrackerEvent::Sample(sample) => Ok(self.on_sample_at(sample, now_ms)),
            TrackerEvent::Motion { x, y, z } => {
                self.on_motion(x, y, z);
                Ok(Vec::new())
            }
            TrackerEvent::SensorError(error) => Ok(self.on_sensor_error(error)),
            TrackerEvent::Pause => self.pause(now_ms),
            TrackerEvent::Resume => self.resume(now_ms),
            TrackerEvent::Stop => {
                let (goal, session) = self.finish(now_ms)?;
                let mut notices: Vec<TrackerNotice> =
                    goal.into_iter().map(TrackerNotice::GoalAchieved).collect();
                notices.push(TrackerNotice::SessionFinished(Box::new(session)));
                Ok(notices)
            }
        }
    }

    /// Begin the lead-in for a new session.
    ///
    /// Valid from `idle` or `stopped`, and only with a valid
    /// [`TrackerConfig`]. With a zero-second countdown the session becomes
    /// active immediately.
    pub fn start(
        &mut self,
        kind: ActivityKind,
        goal: Option<Goal>,
        now_ms: i64,
    ) -> Result<Vec<TrackerNotice>> {
        self.config.validate()?;
        match self.state {
            TrackerState::Idle => {}
            TrackerState::Stopped => self.reset(),
            state => {
                return Err(TrackerError::InvalidTransition {
                    state,
                    action: "start",
                })
            }
        }

        self.kind = kind;
        self.goal = GoalLatch::new(goal);
        self.countdown_started_ms = now_ms;
        self.countdown_remaining = self.config.countdown_secs;

        if self.config.countdown_secs == 0 {
            return Ok(vec![self.activate(now_ms)]);
        }

        self.state = TrackerState::CountdownWarmup;
        info!(
            "[Tracker] Countdown {}s for {} (goal: {:?})",
            self.config.countdown_secs, kind, goal
        );
        Ok(vec![TrackerNotice::CountdownTick {
            remaining_secs: self.countdown_remaining,
        }])
    }

    /// Abort the lead-in and return to idle.
    pub fn cancel(&mut self) -> Result<Vec<TrackerNotice>> {
        if self.state != TrackerState::CountdownWarmup {
            return Err(TrackerError::InvalidTransition {
                state: self.state,
                action: "cancel",
            });
        }
        info!("[Tracker] Countdown cancelled");
        self.reset();
        Ok(vec![TrackerNotice::Cancelled])
    }

    /// Advance the clock.
    ///
    /// Drives the countdown while counting down. While recording, checks
    /// time-based goals and emits a live snapshot.
    pub fn tick(&mut self, now_ms: i64) -> Vec<TrackerNotice> {
        match self.state {
            TrackerState::CountdownWarmup => {
                let lead_in_ms = self.config.countdown_secs as i64 * 1000;
                let elapsed_ms = (now_ms - self.countdown_started_ms).max(0);
                if elapsed_ms >= lead_in_ms {
                    return vec![self.activate(now_ms)];
                }
                let remaining = self.config.countdown_secs - (elapsed_ms / 1000) as u32;
                if remaining < self.countdown_remaining {
                    self.countdown_remaining = remaining;
                    return vec![TrackerNotice::CountdownTick {
                        remaining_secs: remaining,
                    }];
                }
                Vec::new()
            }
            TrackerState::Active | TrackerState::Paused => {
                let mut notices = Vec::new();
                if self.state == TrackerState::Active {
                    notices.extend(self.check_goal(now_ms));
                }
                notices.push(TrackerNotice::Snapshot(self.snapshot(now_ms)));
                notices
            }
            TrackerState::Idle | TrackerState::Stopped => Vec::new(),
        }
    }

    /// Fold one location sample into the session, timed by its own timestamp.
    ///
    /// Only accepted while active.
    pub fn on_sample(&mut self, sample: Sample) -> Vec<TrackerNotice> {
        self.on_sample_at(sample, sample.timestamp_ms)
    }

    /// Fold one location sample into the session, observed at `now_ms`.
    ///
    /// Splits and goals reached by this sample are timed at `now_ms`, clamped
    /// to the session start.
    pub fn on_sample_at(&mut self, sample: Sample, now_ms: i64) -> Vec<TrackerNotice> {
        if self.state != TrackerState::Active {
            debug!("[Tracker] Ignoring sample while {}", self.state);
            return Vec::new();
        }
        if !sample.point().is_valid() {
            warn!(
                "[Tracker] Dropping invalid coordinate ({}, {})",
                sample.latitude, sample.longitude
            );
            return Vec::new();
        }
        if let (Some(limit), Some(accuracy)) = (self.config.max_accuracy_m, sample.accuracy_m) {
            if accuracy > limit {
                debug!(
                    "[Tracker] Rejecting sample with accuracy {:.0}m (limit {:.0}m)",
                    accuracy, limit
                );
                return Vec::new();
            }
        }

        self.last_accuracy_m = sample.accuracy_m;
        self.route.push(sample);
        self.distance_km = geo_utils::route_distance_km(&self.route);

        let simulated = metrics::estimate_steps(
            self.distance_km,
            self.config.steps_per_km.rate_for(self.kind),
        );
        self.simulated_steps = self.simulated_steps.max(simulated);

        let now_ms = now_ms.max(self.start_ms);
        let mut notices = Vec::new();
        if let Some(split) = self.check_split(now_ms) {
            notices.push(TrackerNotice::SplitRecorded(split));
        }
        notices.extend(self.check_goal(now_ms));
        notices
    }

    /// Feed one accelerometer reading. Ignored unless active.
    pub fn on_motion(&mut self, x: f64, y: f64, z: f64) {
        if self.state != TrackerState::Active {
            return;
        }
        self.motion_seen = true;
        self.step_detector.feed(x, y, z);
    }

    /// Record a location sensor failure. The session keeps whatever route it
    /// already has.
    pub fn on_sensor_error(&mut self, error: TrackerError) -> Vec<TrackerNotice> {
        match self.state {
            TrackerState::Idle | TrackerState::Stopped => {
                debug!("[Tracker] Sensor error while {}: {}", self.state, error);
                Vec::new()
            }
            _ => {
                warn!(
                    "[Tracker] Location unavailable ({}), falling back to ({}, {})",
                    error, self.config.fallback_location.latitude, self.config.fallback_location.longitude
                );
                vec![TrackerNotice::SensorLost {
                    error,
                    fallback: self.config.fallback_location,
                }]
            }
        }
    }

    pub fn pause(&mut self, now_ms: i64) -> Result<Vec<TrackerNotice>> {
        if self.state != TrackerState::Active {
            return Err(TrackerError::InvalidTransition {
                state: self.state,
                action: "pause",
            });
        }
        self.pause_started_ms = Some(now_ms);
        self.state = TrackerState::Paused;
        info!("[Tracker] Paused at {:.1}s", self.active_secs(now_ms));
        Ok(vec![TrackerNotice::Paused])
    }

    pub fn resume(&mut self, now_ms: i64) -> Result<Vec<TrackerNotice>> {
        if self.state != TrackerState::Paused {
            return Err(TrackerError::InvalidTransition {
                state: self.state,
                action: "resume",
            });
        }
        self.close_pause(now_ms);
        self.state = TrackerState::Active;
        info!("[Tracker] Resumed");
        Ok(vec![TrackerNotice::Resumed])
    }

    /// Finalise the session. Valid from `active` or `paused`.
    pub fn stop(&mut self, now_ms: i64) -> Result<Session> {
        self.finish(now_ms).map(|(_, session)| session)
    }

    /// Current live metrics.
    pub fn snapshot(&self, now_ms: i64) -> LiveSnapshot {
        let elapsed = self.active_secs(now_ms);
        let calories = self.calories();
        LiveSnapshot {
            state: self.state,
            activity_kind: self.kind,
            elapsed_secs: elapsed,
            distance_km: self.distance_km,
            pace_secs_per_km: metrics::pace_secs_per_km(elapsed, self.distance_km),
            calories,
            steps: self.steps(),
            split_count: self.splits.len() as u32,
            sample_count: self.route.len() as u32,
            signal: SignalQuality::from_accuracy(self.last_accuracy_m),
            last_point: self.route.last().map(Sample::point),
            goal_progress: self.goal.progress(self.distance_km, elapsed, calories),
        }
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn activate(&mut self, now_ms: i64) -> TrackerNotice {
        let goal = self.goal.goal();
        self.reset_counters();
        self.goal = GoalLatch::new(goal);
        self.start_ms = now_ms;
        self.state = TrackerState::Active;
        info!("[Tracker] {} session active", self.kind);
        TrackerNotice::SessionStarted { kind: self.kind }
    }

    fn check_split(&mut self, now_ms: i64) -> Option<Split> {
        let split_km = self.config.split_distance_km;
        if self.distance_km - self.last_split_distance_km < split_km {
            return None;
        }

        let marker = (self.distance_km / split_km).floor();
        let elapsed = self.active_secs(now_ms);
        let previous = self.splits.last().map_or(0.0, |s| s.elapsed_secs);
        let split = Split {
            marker_km: marker as u32,
            elapsed_secs: elapsed,
            pace_secs_per_km: metrics::pace_secs_per_km(elapsed, self.distance_km).unwrap_or(0.0),
            split_secs: (elapsed - previous).max(0.0),
        };
        self.last_split_distance_km = marker * split_km;
        self.splits.push(split);
        info!(
            "[Tracker] Split {} at {} ({} /km)",
            split.marker_km,
            metrics::format_duration(split.elapsed_secs),
            metrics::format_pace(Some(split.pace_secs_per_km))
        );
        Some(split)
    }

    fn check_goal(&mut self, now_ms: i64) -> Option<TrackerNotice> {
        let goal = self
            .goal
            .check(self.distance_km, self.active_secs_at(now_ms), self.calories())?;
        info!("[Tracker] Goal achieved: {} {}", goal.target_value, goal.kind);
        Some(TrackerNotice::GoalAchieved(goal))
    }

    fn close_pause(&mut self, now_ms: i64) {
        if let Some(paused_at) = self.pause_started_ms.take() {
            self.total_paused_ms += (now_ms - paused_at).max(0);
        }
    }

    fn finish(&mut self, now_ms: i64) -> Result<(Option<Goal>, Session)> {
        if !self.is_recording() {
            return Err(TrackerError::InvalidTransition {
                state: self.state,
                action: "stop",
            });
        }
        self.close_pause(now_ms);

        let achieved_now = self.check_goal(now_ms).and_then(|n| match n {
            TrackerNotice::GoalAchieved(goal) => Some(goal),
            _ => None,
        });
        let duration = self.active_secs_at(now_ms);

        let session = Session {
            activity_kind: self.kind,
            start_time: to_datetime(self.start_ms),
            end_time: to_datetime(now_ms),
            total_duration_secs: duration,
            total_distance_km: self.distance_km,
            total_calories: self.calories(),
            step_count: self.steps(),
            average_pace_secs_per_km: metrics::pace_secs_per_km(duration, self.distance_km),
            splits: self.splits.clone(),
            route: self.route.clone(),
            goal: self.goal.goal(),
            goal_achieved: self.goal.has_fired(),
        };

        self.state = TrackerState::Stopped;
        info!(
            "[Tracker] Session finished: {:.2} km in {} ({} samples, {} splits)",
            session.total_distance_km,
            session.duration_label(),
            session.route.len(),
            session.splits.len()
        );
        Ok((achieved_now, session))
    }

    fn reset_counters(&mut self) {
        self.start_ms = 0;
        self.pause_started_ms = None;
        self.total_paused_ms = 0;
        self.route.clear();
        self.distance_km = 0.0;
        self.last_split_distance_km = 0.0;
        self.splits.clear();
        self.step_detector.reset();
        self.motion_seen = false;
        self.simulated_steps = 0;
        self.last_accuracy_m = None;
    }

    fn reset(&mut self) {
        self.reset_counters();
        self.goal = GoalLatch::default();
        self.countdown_remaining = 0;
        self.state = TrackerState::Idle;
    }
}

fn to_datetime(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const T0: i64 = 1_700_000_000_000;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    /// Tracker already active at T0.
    fn active_tracker(goal: Option<Goal>) -> ActivityTracker {
        let config = TrackerConfig {
            countdown_secs: 0,
            ..TrackerConfig::default()
        };
        let mut tracker = ActivityTracker::new(config);
        tracker.start(ActivityKind::Running, goal, T0).unwrap();
        assert_eq!(tracker.state(), TrackerState::Active);
        tracker
    }

    fn equator(i: i64, lng: f64) -> Sample {
        Sample::new(0.0, lng, T0 + i * 60_000)
    }

    #[test]
    fn test_countdown_ticks_then_active() {
        let mut tracker = ActivityTracker::default();
        let notices = tracker.start(ActivityKind::Walking, None, T0).unwrap();
        assert_eq!(notices, vec![TrackerNotice::CountdownTick { remaining_secs: 3 }]);
        assert_eq!(tracker.state(), TrackerState::CountdownWarmup);

        assert_eq!(
            tracker.tick(T0 + 1000),
            vec![TrackerNotice::CountdownTick { remaining_secs: 2 }]
        );
        assert!(tracker.tick(T0 + 1500).is_empty());
        assert_eq!(
            tracker.tick(T0 + 2000),
            vec![TrackerNotice::CountdownTick { remaining_secs: 1 }]
        );
        assert_eq!(
            tracker.tick(T0 + 3000),
            vec![TrackerNotice::SessionStarted {
                kind: ActivityKind::Walking
            }]
        );
        assert_eq!(tracker.state(), TrackerState::Active);
    }

    #[test]
    fn test_samples_ignored_during_countdown() {
        let mut tracker = ActivityTracker::default();
        tracker.start(ActivityKind::Running, None, T0).unwrap();
        assert!(tracker.on_sample(Sample::new(0.0, 0.0, T0 + 500)).is_empty());
        assert!(tracker.route().is_empty());
    }

    #[test]
    fn test_cancel_countdown() {
        let mut tracker = ActivityTracker::default();
        tracker.start(ActivityKind::Running, None, T0).unwrap();
        assert_eq!(tracker.cancel().unwrap(), vec![TrackerNotice::Cancelled]);
        assert_eq!(tracker.state(), TrackerState::Idle);
        assert!(tracker.cancel().is_err());
    }

    #[test]
    fn test_identical_points_add_no_distance() {
        let mut tracker = active_tracker(None);
        tracker.on_sample(Sample::new(10.0, 10.0, T0 + 1000));
        tracker.on_sample(Sample::new(10.0, 10.0, T0 + 2000));
        tracker.on_sample(Sample::new(10.0, 10.0, T0 + 3000));
        assert_eq!(tracker.distance_km(), 0.0);
        assert!(tracker.splits().is_empty());
    }

    #[test]
    fn test_hundredth_degree_gives_one_split() {
        let mut tracker = active_tracker(None);
        tracker.on_sample(Sample::new(0.0, 0.0, T0 + 1000));
        let notices = tracker.on_sample(Sample::new(0.0, 0.01, T0 + 301_000));

        assert!(approx_eq(tracker.distance_km(), 1.11, 0.01));
        assert_eq!(tracker.splits().len(), 1);
        let split = tracker.splits()[0];
        assert_eq!(split.marker_km, 1);
        assert!(approx_eq(split.elapsed_secs, 301.0, 1e-9));
        assert!(approx_eq(split.pace_secs_per_km, 301.0 / tracker.distance_km(), 1e-9));
        assert!(notices.contains(&TrackerNotice::SplitRecorded(split)));
    }

    #[test]
    fn test_distance_is_pairwise_sum_of_route() {
        let mut tracker = active_tracker(None);
        let lats = [0.0, 0.002, 0.0031, 0.0047, 0.009];
        for (i, lat) in lats.iter().enumerate() {
            tracker.on_sample(Sample::new(*lat, *lat * 0.5, T0 + i as i64 * 1000));
        }
        assert_eq!(
            tracker.distance_km(),
            geo_utils::route_distance_km(tracker.route())
        );
    }

    #[test]
    fn test_splits_strictly_increasing() {
        let mut tracker = active_tracker(None);
        for i in 0..8 {
            tracker.on_sample(equator(i, i as f64 * 0.01));
        }
        let markers: Vec<u32> = tracker.splits().iter().map(|s| s.marker_km).collect();
        assert_eq!(markers, vec![1, 2, 3, 4, 5, 6, 7]);
        for pair in tracker.splits().windows(2) {
            assert!(pair[1].elapsed_secs >= pair[0].elapsed_secs);
            assert!(approx_eq(pair[1].split_secs, 60.0, 1e-9));
        }
    }

    #[test]
    fn test_multi_km_jump_emits_single_split() {
        let mut tracker = active_tracker(None);
        tracker.on_sample(Sample::new(0.0, 0.0, T0));
        tracker.on_sample(Sample::new(0.0, 0.03, T0 + 60_000));
        assert_eq!(tracker.splits().len(), 1);
        assert_eq!(tracker.splits()[0].marker_km, 3);

        tracker.on_sample(Sample::new(0.0, 0.04, T0 + 120_000));
        assert_eq!(tracker.splits().len(), 2);
        assert_eq!(tracker.splits()[1].marker_km, 4);
    }

    #[test]
    fn test_pause_excluded_from_duration() {
        let mut tracker = ActivityTracker::default();
        tracker.start(ActivityKind::Running, None, T0).unwrap();
        tracker.tick(T0 + 3000);

        tracker.pause(T0 + 20_000).unwrap();
        tracker.resume(T0 + 30_000).unwrap();
        let session = tracker.stop(T0 + 63_000).unwrap();

        assert!(approx_eq(session.total_duration_secs, 50.0, 1e-9));
        assert_eq!(session.duration_label(), "00:00:50");
        assert_eq!(tracker.state(), TrackerState::Stopped);
    }

    #[test]
    fn test_stop_from_paused_closes_open_pause() {
        let mut tracker = active_tracker(None);
        tracker.on_sample(equator(0, 0.0));
        tracker.on_sample(equator(1, 0.01));
        tracker.pause(T0 + 100_000).unwrap();

        let session = tracker.stop(T0 + 400_000).unwrap();
        assert!(approx_eq(session.total_duration_secs, 100.0, 1e-9));
        assert_eq!(session.route.len(), 2);
        assert_eq!(session.splits.len(), 1);
        assert!(session.average_pace_secs_per_km.is_some());
    }

    #[test]
    fn test_time_goal_met_while_paused_fires_at_stop() {
        let mut tracker = active_tracker(Some(Goal::time(1.0)));
        tracker.pause(T0 + 90_000).unwrap();

        let notices = tracker.apply(TrackerEvent::Stop, T0 + 200_000).unwrap();
        assert_eq!(notices[0], TrackerNotice::GoalAchieved(Goal::time(1.0)));
        match &notices[1] {
            TrackerNotice::SessionFinished(session) => {
                assert!(approx_eq(session.total_duration_secs, 90.0, 1e-9));
                assert!(session.goal_achieved);
            }
            other => panic!("unexpected notice {:?}", other),
        }
        assert_eq!(tracker.state(), TrackerState::Stopped);
    }

    #[test]
    fn test_invalid_split_distance_rejected_at_start() {
        for split_distance_km in [0.0, -1.0, f64::NAN] {
            let mut tracker = ActivityTracker::new(TrackerConfig {
                countdown_secs: 0,
                split_distance_km,
                ..TrackerConfig::default()
            });
            let err = tracker.start(ActivityKind::Running, None, T0).unwrap_err();
            assert!(matches!(err, TrackerError::Config { .. }));
            assert_eq!(tracker.state(), TrackerState::Idle);

            assert!(tracker.on_sample(equator(0, 0.0)).is_empty());
            assert!(tracker.on_sample(equator(1, 0.01)).is_empty());
            assert!(tracker.splits().is_empty());
        }
    }

    #[test]
    fn test_stale_fix_timed_at_reception() {
        let mut tracker = active_tracker(None);
        tracker
            .apply(TrackerEvent::Sample(Sample::new(0.0, 0.0, T0 - 600_000)), T0 + 10_000)
            .unwrap();
        let notices = tracker
            .apply(TrackerEvent::Sample(Sample::new(0.0, 0.01, T0 - 300_000)), T0 + 300_000)
            .unwrap();

        match notices.as_slice() {
            [TrackerNotice::SplitRecorded(split)] => {
                assert!(approx_eq(split.elapsed_secs, 300.0, 1e-9));
                assert!(split.pace_secs_per_km > 0.0);
            }
            other => panic!("unexpected notices {:?}", other),
        }
    }

    #[test]
    fn test_sample_before_start_is_clamped() {
        let mut tracker = active_tracker(None);
        tracker.on_sample(Sample::new(0.0, 0.0, T0 - 60_000));
        let notices = tracker.on_sample(Sample::new(0.0, 0.01, T0 + 240_000));
        assert!(matches!(
            notices.as_slice(),
            [TrackerNotice::SplitRecorded(s)] if approx_eq(s.elapsed_secs, 240.0, 1e-9)
        ));
    }

    #[test]
    fn test_samples_ignored_while_paused() {
        let mut tracker = active_tracker(None);
        tracker.on_sample(equator(0, 0.0));
        tracker.pause(T0 + 30_000).unwrap();
        assert!(tracker.on_sample(equator(1, 0.01)).is_empty());
        assert_eq!(tracker.route().len(), 1);

        tracker.on_motion(0.0, 0.0, 30.0);
        assert_eq!(tracker.steps(), 0);

        let snap = tracker.snapshot(T0 + 90_000);
        assert_eq!(snap.state, TrackerState::Paused);
        assert!(approx_eq(snap.elapsed_secs, 30.0, 1e-9));
    }

    #[test]
    fn test_distance_goal_fires_once() {
        let mut tracker = active_tracker(Some(Goal::distance(5.0)));
        let mut fired = 0;
        for i in 0..9 {
            let notices = tracker.on_sample(equator(i, i as f64 * 0.01));
            fired += notices
                .iter()
                .filter(|n| matches!(n, TrackerNotice::GoalAchieved(_)))
                .count();
            fired += tracker
                .tick(T0 + i * 60_000 + 500)
                .iter()
                .filter(|n| matches!(n, TrackerNotice::GoalAchieved(_)))
                .count();
        }
        assert_eq!(fired, 1);
        let session = tracker.stop(T0 + 600_000).unwrap();
        assert!(session.goal_achieved);
        assert_eq!(session.goal, Some(Goal::distance(5.0)));
    }

    #[test]
    fn test_time_goal_fires_on_tick() {
        let mut tracker = active_tracker(Some(Goal::time(1.0)));
        let early = tracker.tick(T0 + 59_000);
        assert!(!early.iter().any(|n| matches!(n, TrackerNotice::GoalAchieved(_))));
        let late = tracker.tick(T0 + 60_000);
        assert_eq!(late[0], TrackerNotice::GoalAchieved(Goal::time(1.0)));
        assert!(matches!(late[1], TrackerNotice::Snapshot(_)));
    }

    #[test]
    fn test_invalid_transitions() {
        let mut tracker = ActivityTracker::default();
        assert_eq!(
            tracker.pause(T0),
            Err(TrackerError::InvalidTransition {
                state: TrackerState::Idle,
                action: "pause"
            })
        );
        assert!(tracker.resume(T0).is_err());
        assert!(tracker.stop(T0).is_err());

        tracker.start(ActivityKind::Running, None, T0).unwrap();
        assert!(tracker.start(ActivityKind::Running, None, T0).is_err());
        assert!(tracker.pause(T0).is_err());
        assert!(tracker.stop(T0).is_err());

        tracker.tick(T0 + 3000);
        assert!(tracker.resume(T0 + 4000).is_err());
        tracker.pause(T0 + 5000).unwrap();
        assert!(tracker.pause(T0 + 6000).is_err());
    }

    #[test]
    fn test_restart_after_stop_resets_counters() {
        let mut tracker = active_tracker(Some(Goal::distance(1.0)));
        tracker.on_sample(equator(0, 0.0));
        tracker.on_sample(equator(1, 0.02));
        tracker.stop(T0 + 200_000).unwrap();

        tracker
            .start(ActivityKind::Cycling, None, T0 + 300_000)
            .unwrap();
        assert_eq!(tracker.state(), TrackerState::Active);
        assert_eq!(tracker.activity_kind(), ActivityKind::Cycling);
        assert!(tracker.route().is_empty());
        assert!(tracker.splits().is_empty());
        assert_eq!(tracker.goal(), None);
        assert_eq!(tracker.distance_km(), 0.0);
    }

    #[test]
    fn test_accuracy_gate() {
        let config = TrackerConfig {
            countdown_secs: 0,
            max_accuracy_m: Some(25.0),
            ..TrackerConfig::default()
        };
        let mut tracker = ActivityTracker::new(config);
        tracker.start(ActivityKind::Running, None, T0).unwrap();

        tracker.on_sample(Sample::new(0.0, 0.0, T0).with_accuracy(5.0));
        tracker.on_sample(Sample::new(0.0, 0.05, T0 + 1000).with_accuracy(80.0));
        tracker.on_sample(Sample::new(0.0, 0.001, T0 + 2000));
        assert_eq!(tracker.route().len(), 2);
        assert!(tracker.distance_km() < 0.2);
    }

    #[test]
    fn test_no_gate_accepts_poor_accuracy() {
        let mut tracker = active_tracker(None);
        tracker.on_sample(Sample::new(0.0, 0.0, T0).with_accuracy(500.0));
        assert_eq!(tracker.route().len(), 1);
        assert_eq!(tracker.snapshot(T0).signal, SignalQuality::Weak);
    }

    #[test]
    fn test_calories_and_simulated_steps() {
        let mut tracker = active_tracker(None);
        tracker.on_sample(equator(0, 0.0));
        tracker.on_sample(equator(1, 0.02));
        // 2.2239 km running
        assert_eq!(tracker.calories(), 133);
        assert_eq!(tracker.steps(), 2891);
    }

    #[test]
    fn test_motion_steps_replace_simulation() {
        let mut tracker = active_tracker(None);
        tracker.on_sample(equator(0, 0.0));
        tracker.on_sample(equator(1, 0.01));
        for _ in 0..4 {
            tracker.on_motion(0.0, 0.0, 20.0);
            tracker.on_motion(0.0, 0.0, 9.8);
        }
        assert_eq!(tracker.steps(), 4);
    }

    #[test]
    fn test_sensor_error_reports_fallback() {
        let mut tracker = active_tracker(None);
        let notices = tracker.on_sensor_error(TrackerError::SensorPermissionDenied);
        assert_eq!(
            notices,
            vec![TrackerNotice::SensorLost {
                error: TrackerError::SensorPermissionDenied,
                fallback: GpsPoint::new(37.7749, -122.4194),
            }]
        );
        assert_eq!(tracker.state(), TrackerState::Active);

        let session = tracker.stop(T0 + 10_000).unwrap();
        assert_eq!(session.total_distance_km, 0.0);
        assert_eq!(session.average_pace_label(), "--:--");
    }

    #[test]
    fn test_apply_stop_emits_finished_session() {
        let mut tracker = active_tracker(None);
        tracker
            .apply(TrackerEvent::Sample(equator(0, 0.0)), T0)
            .unwrap();
        let notices = tracker.apply(TrackerEvent::Stop, T0 + 5000).unwrap();
        match notices.last() {
            Some(TrackerNotice::SessionFinished(session)) => {
                assert_eq!(session.route.len(), 1);
                assert_eq!(session.start_time.timestamp_millis(), T0);
                assert_eq!(session.end_time.timestamp_millis(), T0 + 5000);
            }
            other => panic!("expected SessionFinished, got {:?}", other),
        }
    }
}
