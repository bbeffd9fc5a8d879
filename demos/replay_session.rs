//! Replay a recorded 2.5 km run through the session runner.
//!
//! Run with: cargo run --example replay_session

use std::sync::Arc;

use activity_tracker::{
    ActivityKind, FallbackStore, Goal, MemoryStore, ReplaySensor, RunnerNotice, Sample,
    SessionRunner, TrackerConfig, TrackerNotice, UserId,
};

/// One fix every 30 s heading east along the equator, about 100 m apart.
fn recorded_route(start_ms: i64) -> Vec<Sample> {
    (0..=25)
        .map(|i| {
            Sample::new(0.0, i as f64 * 0.0009, start_ms + i * 30_000).with_accuracy(6.0)
        })
        .collect()
}

// Paused clock: the replay's 30 s gaps elapse instantly.
#[tokio::main(flavor = "current_thread", start_paused = true)]
async fn main() {
    env_logger::init();

    let config = TrackerConfig {
        countdown_secs: 0,
        ..TrackerConfig::default()
    };
    let epoch_ms = 1_700_000_000_000;
    let store = Arc::new(FallbackStore::new(
        Box::new(MemoryStore::new()),
        Box::new(MemoryStore::new()),
    ));
    let user = UserId::new("demo-runner");

    let sensor = ReplaySensor::new(recorded_route(epoch_ms));
    let mut handle =
        SessionRunner::with_store(config, Box::new(sensor), Arc::clone(&store), user.clone())
            .with_epoch_ms(epoch_ms)
            .spawn();

    handle
        .start(ActivityKind::Running, Some(Goal::distance(2.0)))
        .await
        .expect("runner accepts start");

    println!("Replaying recorded run\n");
    while let Some(notice) = handle.next_notice().await {
        match notice {
            RunnerNotice::Tracker(TrackerNotice::SessionStarted { kind }) => {
                println!("Started {}", kind);
            }
            RunnerNotice::Tracker(TrackerNotice::SplitRecorded(split)) => {
                println!(
                    "  km {}: split {}  pace {} /km",
                    split.marker_km,
                    activity_tracker::format_duration(split.split_secs),
                    activity_tracker::format_pace(Some(split.pace_secs_per_km))
                );
                if split.marker_km == 2 {
                    handle.stop().await.expect("runner accepts stop");
                }
            }
            RunnerNotice::Tracker(TrackerNotice::GoalAchieved(goal)) => {
                println!("  Goal achieved! {}", goal);
            }
            RunnerNotice::Tracker(TrackerNotice::SessionFinished(session)) => {
                println!(
                    "\nFinished: {:.2} km in {} ({} /km), {} kcal, {} steps",
                    session.total_distance_km,
                    session.duration_label(),
                    session.average_pace_label(),
                    session.total_calories,
                    session.step_count
                );
            }
            RunnerNotice::Persisted(outcome) => {
                println!("Saved as {} (primary: {})", outcome.id(), outcome.is_saved());
                break;
            }
            RunnerNotice::PersistFailed(e) | RunnerNotice::Rejected(e) => {
                eprintln!("Error: {}", e);
                break;
            }
            _ => {}
        }
    }

    handle.shutdown().await.expect("runner exits cleanly");
    let saved = store.list(&user).expect("memory store lists");
    println!("{} session(s) stored for {}", saved.len(), user);
}
