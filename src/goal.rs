//! Session goals and the one-shot achievement latch.
//!
//! | Kind | Unit | Compared against |
//! |------|------|------------------|
//! | `Distance` | km | route distance |
//! | `Time` | minutes | active (unpaused) time |
//! | `Calories` | kcal | calorie estimate |
//!
//! A goal with a target of zero (or less) is treated as unset and never fires.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What a goal measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[serde(rename_all = "lowercase")]
pub enum GoalKind {
    #[default]
    Distance,
    Time,
    Calories,
}

impl GoalKind {
    pub fn unit(&self) -> &'static str {
        match self {
            GoalKind::Distance => "km",
            GoalKind::Time => "min",
            GoalKind::Calories => "cal",
        }
    }
}

impl fmt::Display for GoalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GoalKind::Distance => "distance",
            GoalKind::Time => "time",
            GoalKind::Calories => "calories",
        })
    }
}

/// A target chosen before the session starts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub kind: GoalKind,
    pub target_value: f64,
}

impl Default for Goal {
    fn default() -> Self {
        Goal::distance(5.0)
    }
}

impl Goal {
    pub fn distance(km: f64) -> Self {
        Self {
            kind: GoalKind::Distance,
            target_value: km,
        }
    }

    pub fn time(minutes: f64) -> Self {
        Self {
            kind: GoalKind::Time,
            target_value: minutes,
        }
    }

    pub fn calories(kcal: f64) -> Self {
        Self {
            kind: GoalKind::Calories,
            target_value: kcal,
        }
    }

    /// True when the target is a usable positive number.
    pub fn is_set(&self) -> bool {
        self.target_value.is_finite() && self.target_value > 0.0
    }

    /// The measured value this goal compares against, in the goal's unit.
    pub fn current_value(&self, distance_km: f64, active_secs: f64, calories: u32) -> f64 {
        match self.kind {
            GoalKind::Distance => distance_km,
            GoalKind::Time => active_secs / 60.0,
            GoalKind::Calories => calories as f64,
        }
    }

    pub fn progress(&self, distance_km: f64, active_secs: f64, calories: u32) -> GoalProgress {
        let current = self.current_value(distance_km, active_secs, calories);
        let fraction = if self.is_set() {
            (current / self.target_value).clamp(0.0, 1.0)
        } else {
            0.0
        };
        GoalProgress {
            kind: self.kind,
            target_value: self.target_value,
            current_value: current,
            fraction,
            achieved: self.is_set() && current >= self.target_value,
        }
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.target_value, self.kind.unit())
    }
}

/// Progress toward a goal at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(rename_all = "camelCase")]
pub struct GoalProgress {
    pub kind: GoalKind,
    pub target_value: f64,
    pub current_value: f64,
    /// 0.0 ..= 1.0
    pub fraction: f64,
    pub achieved: bool,
}

/// Fires once per session when the goal is first met.
#[derive(Debug, Clone, Default)]
pub struct GoalLatch {
    goal: Option<Goal>,
    fired: bool,
}

impl GoalLatch {
    pub fn new(goal: Option<Goal>) -> Self {
        Self { goal, fired: false }
    }

    pub fn goal(&self) -> Option<Goal> {
        self.goal
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }

    /// Returns the goal the first time it is met, `None` on every other call.
    pub fn check(&mut self, distance_km: f64, active_secs: f64, calories: u32) -> Option<Goal> {
        if self.fired {
            return None;
        }
        let goal = self.goal?;
        if goal.progress(distance_km, active_secs, calories).achieved {
            self.fired = true;
            Some(goal)
        } else {
            None
        }
    }

    pub fn progress(&self, distance_km: f64, active_secs: f64, calories: u32) -> Option<GoalProgress> {
        self.goal
            .map(|g| g.progress(distance_km, active_secs, calories))
    }
}
