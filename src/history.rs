//! # Activity History
//!
//! Filtering, sorting and summary statistics over finished sessions.
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`HistoryFilter::apply`] | Filter by kind, date range and distance bucket, then sort |
//! | [`summarize`] | Totals, this month's volume and mean pace |
//! | [`personal_bests`] | Fastest 5 km / 10 km average pace, longest distance |
//! | [`daily_distances`] | Distance per day for the last seven days |
//! | [`training_load`] | This month's distance against a monthly target |
//!
//! All functions take `now` explicitly so results are reproducible.

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::{ActivityKind, Session};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Monthly distance treated as a full training load (km).
pub const MONTHLY_LOAD_TARGET_KM: f64 = 50.0;

// ============================================================================
// Filters
// ============================================================================

/// Session date window relative to `now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DateRange {
    #[default]
    All,
    /// Last 7 days
    Week,
    /// Since the same day last month
    Month,
    /// Since the same day last year
    Year,
    /// Inclusive custom window
    Custom {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

impl DateRange {
    pub fn contains(&self, when: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let since = match self {
            DateRange::All => return true,
            DateRange::Custom { start, end } => return when >= *start && when <= *end,
            DateRange::Week => Some(now - Duration::days(7)),
            DateRange::Month => now.checked_sub_months(Months::new(1)),
            DateRange::Year => now.checked_sub_months(Months::new(12)),
        };
        since.map_or(true, |since| when >= since)
    }
}

/// Distance class of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceBucket {
    /// Under 5 km
    Short,
    /// 5 to 10 km inclusive
    Medium,
    /// Over 10 km
    Long,
}

impl DistanceBucket {
    pub fn contains(&self, distance_km: f64) -> bool {
        match self {
            DistanceBucket::Short => distance_km < 5.0,
            DistanceBucket::Medium => (5.0..=10.0).contains(&distance_km),
            DistanceBucket::Long => distance_km > 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortOrder {
    #[default]
    DateDesc,
    DateAsc,
    DistanceDesc,
    DistanceAsc,
    DurationDesc,
    /// Fastest average pace first; sessions without a pace last
    Pace,
}

impl SortOrder {
    fn compare(&self, a: &Session, b: &Session) -> Ordering {
        match self {
            SortOrder::DateDesc => b.start_time.cmp(&a.start_time),
            SortOrder::DateAsc => a.start_time.cmp(&b.start_time),
            SortOrder::DistanceDesc => b.total_distance_km.total_cmp(&a.total_distance_km),
            SortOrder::DistanceAsc => a.total_distance_km.total_cmp(&b.total_distance_km),
            SortOrder::DurationDesc => b.total_duration_secs.total_cmp(&a.total_duration_secs),
            SortOrder::Pace => match (a.average_pace_secs_per_km, b.average_pace_secs_per_km) {
                (Some(pa), Some(pb)) => pa.total_cmp(&pb),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
        }
    }
}

/// History view filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HistoryFilter {
    /// Kinds to include; empty includes every kind
    pub kinds: Vec<ActivityKind>,
    pub date_range: DateRange,
    /// Buckets to include; empty includes every distance
    pub distance_buckets: Vec<DistanceBucket>,
    pub sort: SortOrder,
}

impl Default for HistoryFilter {
    fn default() -> Self {
        Self {
            kinds: ActivityKind::ALL.to_vec(),
            date_range: DateRange::All,
            distance_buckets: Vec::new(),
            sort: SortOrder::DateDesc,
        }
    }
}

impl HistoryFilter {
    pub fn matches(&self, session: &Session, now: DateTime<Utc>) -> bool {
        (self.kinds.is_empty() || self.kinds.contains(&session.activity_kind))
            && self.date_range.contains(session.start_time, now)
            && (self.distance_buckets.is_empty()
                || self
                    .distance_buckets
                    .iter()
                    .any(|b| b.contains(session.total_distance_km)))
    }

    /// Matching sessions, sorted.
    pub fn apply<'a>(&self, sessions: &'a [Session], now: DateTime<Utc>) -> Vec<&'a Session> {
        let mut filtered: Vec<&Session> = sessions
            .iter()
            .filter(|s| self.matches(s, now))
            .collect();
        filtered.sort_by(|a, b| self.sort.compare(a, b));
        filtered
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Aggregate statistics over a set of sessions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStats {
    pub total_distance_km: f64,
    pub session_count: u32,
    pub total_duration_secs: f64,
    pub total_calories: u64,
    /// Distance in the calendar month containing `now`
    pub monthly_distance_km: f64,
    pub sessions_this_month: u32,
    /// Mean of the sessions' average paces
    pub average_pace_secs_per_km: Option<f64>,
    #[serde(skip)]
    pace_sum: f64,
    #[serde(skip)]
    pace_count: u32,
}

impl HistoryStats {
    fn add(mut self, session: &Session, now: DateTime<Utc>) -> Self {
        self.total_distance_km += session.total_distance_km;
        self.session_count += 1;
        self.total_duration_secs += session.total_duration_secs;
        self.total_calories += session.total_calories as u64;

        if session.start_time.year() == now.year() && session.start_time.month() == now.month() {
            self.monthly_distance_km += session.total_distance_km;
            self.sessions_this_month += 1;
        }
        if let Some(pace) = session.average_pace_secs_per_km {
            self.pace_sum += pace;
            self.pace_count += 1;
        }
        self
    }

    #[cfg_attr(not(feature = "parallel"), allow(dead_code))]
    fn merge(mut self, other: Self) -> Self {
        self.total_distance_km += other.total_distance_km;
        self.session_count += other.session_count;
        self.total_duration_secs += other.total_duration_secs;
        self.total_calories += other.total_calories;
        self.monthly_distance_km += other.monthly_distance_km;
        self.sessions_this_month += other.sessions_this_month;
        self.pace_sum += other.pace_sum;
        self.pace_count += other.pace_count;
        self
    }

    fn finish(mut self) -> Self {
        self.average_pace_secs_per_km = if self.pace_count > 0 {
            Some(self.pace_sum / self.pace_count as f64)
        } else {
            None
        };
        self
    }
}

/// Summarize sessions.
pub fn summarize<'a, I>(sessions: I, now: DateTime<Utc>) -> HistoryStats
where
    I: IntoIterator<Item = &'a Session>,
{
    sessions
        .into_iter()
        .fold(HistoryStats::default(), |acc, s| acc.add(s, now))
        .finish()
}

/// Summarize sessions in parallel.
#[cfg(feature = "parallel")]
pub fn summarize_parallel(sessions: &[Session], now: DateTime<Utc>) -> HistoryStats {
    sessions
        .par_iter()
        .fold(HistoryStats::default, |acc, s| acc.add(s, now))
        .reduce(HistoryStats::default, HistoryStats::merge)
        .finish()
}

/// Best efforts across a set of sessions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalBests {
    /// Fastest average pace among sessions of 5 km up to (not including) 10 km
    pub best_5k_pace_secs_per_km: Option<f64>,
    /// Fastest average pace among sessions of 10 km or more
    pub best_10k_pace_secs_per_km: Option<f64>,
    pub longest_distance_km: Option<f64>,
}

fn faster(current: Option<f64>, candidate: Option<f64>) -> Option<f64> {
    match (current, candidate) {
        (Some(c), Some(p)) => Some(c.min(p)),
        (None, p) => p,
        (c, None) => c,
    }
}

pub fn personal_bests<'a, I>(sessions: I) -> PersonalBests
where
    I: IntoIterator<Item = &'a Session>,
{
    sessions
        .into_iter()
        .fold(PersonalBests::default(), |mut pbs, s| {
            let d = s.total_distance_km;
            if (5.0..10.0).contains(&d) {
                pbs.best_5k_pace_secs_per_km =
                    faster(pbs.best_5k_pace_secs_per_km, s.average_pace_secs_per_km);
            }
            if d >= 10.0 {
                pbs.best_10k_pace_secs_per_km =
                    faster(pbs.best_10k_pace_secs_per_km, s.average_pace_secs_per_km);
            }
            if d > 0.0 {
                pbs.longest_distance_km = Some(pbs.longest_distance_km.map_or(d, |l| l.max(d)));
            }
            pbs
        })
}

/// Distance per UTC day for the seven days ending with `now`, oldest first.
pub fn daily_distances<'a, I>(sessions: I, now: DateTime<Utc>) -> Vec<(NaiveDate, f64)>
where
    I: IntoIterator<Item = &'a Session>,
{
    let today = now.date_naive();
    let mut days: Vec<(NaiveDate, f64)> = (0..7)
        .rev()
        .map(|i| (today - Duration::days(i), 0.0))
        .collect();

    for session in sessions {
        let day = session.start_time.date_naive();
        if let Some(slot) = days.iter_mut().find(|(d, _)| *d == day) {
            slot.1 += session.total_distance_km;
        }
    }
    days
}

/// Fraction (0..=1) of the monthly load target covered this month.
pub fn training_load(stats: &HistoryStats) -> f64 {
    (stats.monthly_distance_km / MONTHLY_LOAD_TARGET_KM).clamp(0.0, 1.0)
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    fn session(kind: ActivityKind, days_ago: i64, km: f64, pace: Option<f64>) -> Session {
        let start = now() - Duration::days(days_ago);
        let duration = pace.map_or(600.0, |p| p * km);
        Session {
            activity_kind: kind,
            start_time: start,
            end_time: start + Duration::seconds(duration as i64),
            total_duration_secs: duration,
            total_distance_km: km,
            total_calories: (km * 60.0).round() as u32,
            step_count: 0,
            average_pace_secs_per_km: pace,
            splits: Vec::new(),
            route: Vec::new(),
            goal: None,
            goal_achieved: false,
        }
    }

    fn sample_history() -> Vec<Session> {
        vec![
            session(ActivityKind::Running, 1, 5.2, Some(330.0)),
            session(ActivityKind::Running, 3, 10.0, Some(360.0)),
            session(ActivityKind::Walking, 10, 3.0, Some(600.0)),
            session(ActivityKind::Cycling, 40, 25.0, Some(150.0)),
            session(ActivityKind::Running, 400, 7.0, Some(300.0)),
            session(ActivityKind::Hiking, 2, 0.0, None),
        ]
    }

    #[test]
    fn test_distance_buckets() {
        assert!(DistanceBucket::Short.contains(4.99));
        assert!(DistanceBucket::Medium.contains(5.0));
        assert!(DistanceBucket::Medium.contains(10.0));
        assert!(!DistanceBucket::Long.contains(10.0));
        assert!(DistanceBucket::Long.contains(10.01));
    }

    #[test]
    fn test_date_ranges() {
        let n = now();
        assert!(DateRange::Week.contains(n - Duration::days(6), n));
        assert!(!DateRange::Week.contains(n - Duration::days(8), n));
        assert!(DateRange::Month.contains(n - Duration::days(29), n));
        assert!(!DateRange::Month.contains(n - Duration::days(32), n));
        assert!(DateRange::Year.contains(n - Duration::days(360), n));
        assert!(!DateRange::Year.contains(n - Duration::days(370), n));

        let custom = DateRange::Custom {
            start: n - Duration::days(3),
            end: n - Duration::days(1),
        };
        assert!(custom.contains(n - Duration::days(1), n));
        assert!(!custom.contains(n, n));
    }

    #[test]
    fn test_filter_kinds_and_buckets() {
        let history = sample_history();
        let filter = HistoryFilter {
            kinds: vec![ActivityKind::Running],
            distance_buckets: vec![DistanceBucket::Medium],
            ..HistoryFilter::default()
        };
        let result = filter.apply(&history, now());
        let distances: Vec<f64> = result.iter().map(|s| s.total_distance_km).collect();
        assert_eq!(distances, vec![5.2, 10.0, 7.0]);
    }

    #[test]
    fn test_sort_orders() {
        let history = sample_history();
        let by = |sort| {
            HistoryFilter {
                sort,
                ..HistoryFilter::default()
            }
            .apply(&history, now())
            .iter()
            .map(|s| s.total_distance_km)
            .collect::<Vec<_>>()
        };

        assert_eq!(by(SortOrder::DateDesc), vec![5.2, 0.0, 10.0, 3.0, 25.0, 7.0]);
        assert_eq!(by(SortOrder::DistanceDesc)[0], 25.0);
        assert_eq!(by(SortOrder::DistanceAsc)[0], 0.0);
        // fastest first, no-pace last
        assert_eq!(by(SortOrder::Pace), vec![25.0, 7.0, 5.2, 10.0, 3.0, 0.0]);
    }

    #[test]
    fn test_summarize() {
        let history = sample_history();
        let stats = summarize(&history, now());
        assert_eq!(stats.session_count, 6);
        assert!((stats.total_distance_km - 50.2).abs() < 1e-9);
        // June 2024: 5.2, 10.0, 3.0 (10 days ago), 0.0
        assert_eq!(stats.sessions_this_month, 4);
        assert!((stats.monthly_distance_km - 18.2).abs() < 1e-9);
        let mean = (330.0 + 360.0 + 600.0 + 150.0 + 300.0) / 5.0;
        assert_eq!(stats.average_pace_secs_per_km, Some(mean));

        let empty = summarize(&[], now());
        assert_eq!(empty.session_count, 0);
        assert_eq!(empty.average_pace_secs_per_km, None);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_summarize_parallel_matches_sequential() {
        let history = sample_history();
        let seq = summarize(&history, now());
        let par = summarize_parallel(&history, now());
        assert_eq!(par.session_count, seq.session_count);
        assert!((par.total_distance_km - seq.total_distance_km).abs() < 1e-9);
        assert_eq!(par.sessions_this_month, seq.sessions_this_month);
    }

    #[test]
    fn test_personal_bests() {
        let history = sample_history();
        let pbs = personal_bests(&history);
        assert_eq!(pbs.best_5k_pace_secs_per_km, Some(300.0));
        assert_eq!(pbs.best_10k_pace_secs_per_km, Some(150.0));
        assert_eq!(pbs.longest_distance_km, Some(25.0));

        assert_eq!(personal_bests(&[]), PersonalBests::default());
    }

    #[test]
    fn test_daily_distances_and_load() {
        let history = sample_history();
        let days = daily_distances(&history, now());
        assert_eq!(days.len(), 7);
        assert_eq!(days[6].0, now().date_naive());
        assert_eq!(days[5].1, 5.2);
        assert_eq!(days[3].1, 10.0);
        assert_eq!(days[0].1, 0.0);

        let stats = summarize(&history, now());
        assert!((training_load(&stats) - 18.2 / 50.0).abs() < 1e-9);
    }
}
