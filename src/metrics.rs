//! Pace, calorie and step calculations plus GPS signal quality.
//!
//! All functions are pure. Pace is expressed in seconds per kilometre and is
//! `None` whenever no distance has been covered, which formats as `--:--`.

use serde::{Deserialize, Serialize};

use crate::ActivityKind;

/// Placeholder shown when pace is undefined.
pub const NO_PACE: &str = "--:--";

// ============================================================================
// Pace
// ============================================================================

/// Pace in seconds per kilometre from active seconds and distance.
pub fn pace_secs_per_km(active_secs: f64, distance_km: f64) -> Option<f64> {
    if distance_km <= 0.0 || !distance_km.is_finite() || !active_secs.is_finite() {
        return None;
    }
    Some(active_secs.max(0.0) / distance_km)
}

/// Format a pace as `m:ss` (minutes are not wrapped into hours).
///
/// ```
/// use activity_tracker::format_pace;
/// assert_eq!(format_pace(Some(457.9)), "7:37");
/// assert_eq!(format_pace(None), "--:--");
/// ```
pub fn format_pace(pace_secs_per_km: Option<f64>) -> String {
    match pace_secs_per_km {
        Some(p) if p.is_finite() && p >= 0.0 => {
            let mins = (p / 60.0).floor() as u64;
            let secs = (p % 60.0).floor() as u64;
            format!("{}:{:02}", mins, secs)
        }
        _ => NO_PACE.to_string(),
    }
}

/// Parse an `m:ss` pace label back to seconds per kilometre.
///
/// `--:--` and malformed labels return `None`.
pub fn parse_pace(label: &str) -> Option<f64> {
    let (mins, secs) = label.trim().split_once(':')?;
    let mins: u32 = mins.parse().ok()?;
    let secs: u32 = secs.parse().ok()?;
    if secs >= 60 {
        return None;
    }
    Some((mins * 60 + secs) as f64)
}

/// Format seconds as `hh:mm:ss`.
pub fn format_duration(total_secs: f64) -> String {
    let total = if total_secs.is_finite() {
        total_secs.max(0.0).floor() as u64
    } else {
        0
    };
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

// ============================================================================
// Calories / Steps
// ============================================================================

/// Flat per-kilometre calorie estimate for an activity kind.
pub fn estimate_calories(distance_km: f64, kcal_per_km: f64) -> u32 {
    (distance_km.max(0.0) * kcal_per_km).round() as u32
}

/// Step estimate from distance when no motion sensor is reporting.
pub fn estimate_steps(distance_km: f64, steps_per_km: f64) -> u64 {
    (distance_km.max(0.0) * steps_per_km).round() as u64
}

/// Per-activity rate table (calories per km, steps per km).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct ActivityRates {
    pub running: f64,
    pub walking: f64,
    pub hiking: f64,
    pub cycling: f64,
}

impl ActivityRates {
    /// Calories burned per kilometre.
    pub fn default_calories() -> Self {
        Self {
            running: 60.0,
            walking: 40.0,
            hiking: 70.0,
            cycling: 25.0,
        }
    }

    /// Simulated steps per kilometre.
    pub fn default_steps() -> Self {
        Self {
            running: 1300.0,
            walking: 1400.0,
            hiking: 1200.0,
            cycling: 0.0,
        }
    }

    pub fn rate_for(&self, kind: ActivityKind) -> f64 {
        match kind {
            ActivityKind::Running => self.running,
            ActivityKind::Walking => self.walking,
            ActivityKind::Hiking => self.hiking,
            ActivityKind::Cycling => self.cycling,
        }
    }
}

/// Threshold step detector over accelerometer readings.
///
/// A step is counted on each rising edge of the acceleration magnitude
/// through the threshold, so a sustained spike counts once.
#[derive(Debug, Clone)]
pub struct StepDetector {
    threshold: f64,
    above: bool,
    steps: u64,
}

impl StepDetector {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            above: false,
            steps: 0,
        }
    }

    /// Feed one accelerometer reading (m/s², gravity included).
    /// Returns true if it completed a step.
    pub fn feed(&mut self, x: f64, y: f64, z: f64) -> bool {
        let magnitude = (x * x + y * y + z * z).sqrt();
        let is_above = magnitude > self.threshold;
        let stepped = is_above && !self.above;
        self.above = is_above;
        if stepped {
            self.steps += 1;
        }
        stepped
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn reset(&mut self) {
        self.above = false;
        self.steps = 0;
    }
}

// ============================================================================
// GPS Signal
// ============================================================================

/// GPS signal quality derived from reported horizontal accuracy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum SignalQuality {
    Strong,
    Moderate,
    Weak,
}

impl SignalQuality {
    /// < 10 m strong, < 25 m moderate, anything else (or no fix) weak.
    pub fn from_accuracy(accuracy_m: Option<f64>) -> Self {
        match accuracy_m {
            Some(a) if a < 10.0 => SignalQuality::Strong,
            Some(a) if a < 25.0 => SignalQuality::Moderate,
            _ => SignalQuality::Weak,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SignalQuality::Strong => "GPS Signal: Strong",
            SignalQuality::Moderate => "GPS Signal: Moderate",
            SignalQuality::Weak => "GPS Signal: Weak",
        }
    }
}
