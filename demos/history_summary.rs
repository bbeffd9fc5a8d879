//! Summarize a week of synthetic sessions.
//!
//! Run with: cargo run --example history_summary

use activity_tracker::history::{daily_distances, personal_bests, summarize, training_load};
use activity_tracker::{
    format_duration, format_pace, ActivityKind, DateRange, HistoryFilter, Session, SortOrder,
};
use chrono::{Duration, TimeZone, Utc};

fn session(kind: ActivityKind, days_ago: i64, km: f64, pace: f64) -> Session {
    let now = Utc.with_ymd_and_hms(2024, 6, 20, 18, 0, 0).unwrap();
    let start = now - Duration::days(days_ago);
    let secs = km * pace;
    Session {
        activity_kind: kind,
        start_time: start,
        end_time: start + Duration::seconds(secs as i64),
        total_duration_secs: secs,
        total_distance_km: km,
        total_calories: (km * 60.0).round() as u32,
        step_count: (km * 1300.0) as u64,
        average_pace_secs_per_km: Some(pace),
        splits: Vec::new(),
        route: Vec::new(),
        goal: None,
        goal_achieved: false,
    }
}

fn main() {
    env_logger::init();

    let now = Utc.with_ymd_and_hms(2024, 6, 20, 18, 0, 0).unwrap();
    let sessions = vec![
        session(ActivityKind::Running, 0, 5.2, 330.0),
        session(ActivityKind::Walking, 1, 3.1, 610.0),
        session(ActivityKind::Running, 3, 10.4, 345.0),
        session(ActivityKind::Cycling, 4, 22.0, 150.0),
        session(ActivityKind::Running, 6, 7.5, 320.0),
        session(ActivityKind::Hiking, 40, 12.0, 720.0),
    ];

    let stats = summarize(&sessions, now);
    println!("All time: {} sessions, {:.1} km, {}", stats.session_count, stats.total_distance_km, format_duration(stats.total_duration_secs));
    println!("This month: {:.1} km over {} sessions", stats.monthly_distance_km, stats.sessions_this_month);
    println!("Average pace: {} /km", format_pace(stats.average_pace_secs_per_km));
    println!("Training load: {:.0}%\n", training_load(&stats) * 100.0);

    let pbs = personal_bests(&sessions);
    println!("Best 5k pace:  {}", format_pace(pbs.best_5k_pace_secs_per_km));
    println!("Best 10k pace: {}", format_pace(pbs.best_10k_pace_secs_per_km));
    println!("Longest:       {:.1} km\n", pbs.longest_distance_km.unwrap_or(0.0));

    println!("Last 7 days:");
    for (day, km) in daily_distances(&sessions, now) {
        println!("  {}  {:5.1} km", day, km);
    }

    let filter = HistoryFilter {
        kinds: vec![ActivityKind::Running],
        date_range: DateRange::Week,
        sort: SortOrder::Pace,
        ..HistoryFilter::default()
    };
    println!("\nRuns this week, fastest first:");
    for s in filter.apply(&sessions, now) {
        println!(
            "  {}  {:5.1} km  {} /km",
            s.start_time.format("%a %d %b"),
            s.total_distance_km,
            s.average_pace_label()
        );
    }
}
