//! # Session Runner
//!
//! Async event loop that owns an [`ActivityTracker`] and feeds it from three
//! sources:
//!
//! | Source | Effect |
//! |--------|--------|
//! | [`RunnerCommand`]s from the host | start / pause / resume / stop |
//! | [`SensorEvent`]s from the location sensor | samples, motion, sensor errors |
//! | A periodic tick (`tick_interval_ms`) | countdown, time goals, live snapshots |
//!
//! Everything the tracker reports is forwarded to the host as a
//! [`RunnerNotice`]. The sensor subscription opens when the lead-in ends and
//! closes when the session stops. Finished sessions are written through the
//! [`FallbackStore`] on the blocking pool; a write is never cancelled and
//! shutdown waits for outstanding writes.

use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant, MissedTickBehavior};

use crate::sensor::{LocationSensor, SensorEvent};
use crate::store::{FallbackStore, SaveOutcome, UserId};
use crate::{
    ActivityKind, ActivityTracker, AppContext, Goal, Result, Session, TrackerConfig,
    TrackerError, TrackerEvent, TrackerNotice,
};

const COMMAND_BUFFER: usize = 16;

/// Host commands.
#[derive(Debug, Clone, PartialEq)]
pub enum RunnerCommand {
    Start {
        kind: ActivityKind,
        goal: Option<Goal>,
    },
    Cancel,
    Pause,
    Resume,
    Stop,
    Shutdown,
}

/// Everything the runner reports to the host.
#[derive(Debug, Clone, PartialEq)]
pub enum RunnerNotice {
    Tracker(TrackerNotice),
    /// A command was not valid in the current state
    Rejected(TrackerError),
    /// Outcome of writing a finished session
    Persisted(SaveOutcome),
    /// Neither the primary store nor the local cache accepted the session
    PersistFailed(TrackerError),
}

/// Milliseconds since the Unix epoch, advanced by the tokio clock.
#[derive(Debug, Clone, Copy)]
struct RunnerClock {
    epoch_ms: i64,
    origin: Instant,
}

impl RunnerClock {
    fn now_ms(&self) -> i64 {
        self.epoch_ms + self.origin.elapsed().as_millis() as i64
    }
}

pub struct SessionRunner {
    tracker: ActivityTracker,
    sensor: Box<dyn LocationSensor>,
    store: Arc<FallbackStore>,
    user: UserId,
    clock: RunnerClock,
}

impl SessionRunner {
    /// Runner for the context's user, store and tracker configuration.
    pub fn new(ctx: &AppContext, sensor: Box<dyn LocationSensor>) -> Self {
        Self::with_store(ctx.tracker.clone(), sensor, ctx.store(), ctx.user().clone())
    }

    pub fn with_store(
        config: TrackerConfig,
        sensor: Box<dyn LocationSensor>,
        store: Arc<FallbackStore>,
        user: UserId,
    ) -> Self {
        Self {
            tracker: ActivityTracker::new(config),
            sensor,
            store,
            user,
            clock: RunnerClock {
                epoch_ms: chrono::Utc::now().timestamp_millis(),
                origin: Instant::now(),
            },
        }
    }

    /// Pin the wall-clock time that corresponds to "now" for this runner.
    pub fn with_epoch_ms(mut self, epoch_ms: i64) -> Self {
        self.clock = RunnerClock {
            epoch_ms,
            origin: Instant::now(),
        };
        self
    }

    /// Spawn the event loop on the current tokio runtime.
    pub fn spawn(self) -> RunnerHandle {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(self.run(cmd_rx, notice_tx));
        RunnerHandle {
            commands: cmd_tx,
            notices: notice_rx,
            task,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<RunnerCommand>,
        notices: mpsc::UnboundedSender<RunnerNotice>,
    ) {
        let mut loop_state = LoopState {
            notices,
            sensor_rx: None,
            awaiting_fix_since: None,
            writes: Vec::new(),
        };

        let tick_ms = self.tracker.config().tick_interval_ms.max(1);
        let mut ticker = time::interval(Duration::from_millis(tick_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("[Runner] started for {} (tick {}ms)", self.user, tick_ms);

        loop {
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(RunnerCommand::Shutdown) | None => break,
                    Some(cmd) => self.handle_command(cmd, &mut loop_state),
                },
                event = next_sensor_event(&mut loop_state.sensor_rx) => match event {
                    Some(event) => self.handle_sensor_event(event, &mut loop_state),
                    None => {
                        debug!("[Runner] sensor stream ended");
                        loop_state.sensor_rx = None;
                    }
                },
                _ = ticker.tick() => self.handle_tick(&mut loop_state),
            }
        }

        if self.tracker.is_recording() {
            info!("[Runner] shutdown while recording, finishing session");
            let now = self.clock.now_ms();
            self.dispatch(TrackerEvent::Stop, now, &mut loop_state);
        }
        self.sensor.unsubscribe();

        for write in loop_state.writes.drain(..) {
            if let Err(e) = write.await {
                warn!("[Runner] session write task failed: {}", e);
            }
        }
        info!("[Runner] stopped");
    }

    fn handle_command(&mut self, cmd: RunnerCommand, state: &mut LoopState) {
        let event = match cmd {
            RunnerCommand::Start { kind, goal } => TrackerEvent::Start { kind, goal },
            RunnerCommand::Cancel => TrackerEvent::Cancel,
            RunnerCommand::Pause => TrackerEvent::Pause,
            RunnerCommand::Resume => TrackerEvent::Resume,
            RunnerCommand::Stop => TrackerEvent::Stop,
            RunnerCommand::Shutdown => return,
        };
        let now = self.clock.now_ms();
        self.dispatch(event, now, state);
    }

    fn handle_sensor_event(&mut self, event: SensorEvent, state: &mut LoopState) {
        let now = self.clock.now_ms();
        let event = match event {
            SensorEvent::Fix(sample) => {
                state.awaiting_fix_since = None;
                TrackerEvent::Sample(sample)
            }
            SensorEvent::Motion { x, y, z } => TrackerEvent::Motion { x, y, z },
            SensorEvent::Error(error) => {
                state.awaiting_fix_since = None;
                TrackerEvent::SensorError(error)
            }
        };
        self.dispatch(event, now, state);
    }

    fn handle_tick(&mut self, state: &mut LoopState) {
        let now = self.clock.now_ms();
        if let Some(since) = state.awaiting_fix_since {
            let timeout_ms = self.tracker.config().sensor_timeout_ms;
            if now - since >= timeout_ms as i64 {
                state.awaiting_fix_since = None;
                self.dispatch(
                    TrackerEvent::SensorError(TrackerError::SensorTimeout { timeout_ms }),
                    now,
                    state,
                );
            }
        }
        self.dispatch(TrackerEvent::Tick, now, state);
    }

    fn dispatch(&mut self, event: TrackerEvent, now_ms: i64, state: &mut LoopState) {
        match self.tracker.apply(event, now_ms) {
            Ok(notices) => {
                for notice in notices {
                    self.react(&notice, now_ms, state);
                    state.emit(RunnerNotice::Tracker(notice));
                }
            }
            Err(error) => {
                warn!("[Runner] {}", error);
                state.emit(RunnerNotice::Rejected(error));
            }
        }
    }

    /// Side effects the loop owns: sensor subscription and persistence.
    fn react(&mut self, notice: &TrackerNotice, now_ms: i64, state: &mut LoopState) {
        match notice {
            TrackerNotice::SessionStarted { .. } => match self.sensor.subscribe() {
                Ok(rx) => {
                    state.sensor_rx = Some(rx);
                    state.awaiting_fix_since = Some(now_ms);
                }
                Err(error) => {
                    warn!("[Runner] sensor subscription failed: {}", error);
                    for lost in self.tracker.on_sensor_error(error) {
                        state.emit(RunnerNotice::Tracker(lost));
                    }
                }
            },
            TrackerNotice::SessionFinished(session) => {
                self.sensor.unsubscribe();
                state.sensor_rx = None;
                state.awaiting_fix_since = None;
                self.persist(session.as_ref().clone(), state);
            }
            _ => {}
        }
    }

    fn persist(&self, session: Session, state: &mut LoopState) {
        let store = Arc::clone(&self.store);
        let user = self.user.clone();
        let notices = state.notices.clone();

        state.writes.push(tokio::spawn(async move {
            let result =
                tokio::task::spawn_blocking(move || store.save(&user, &session)).await;
            let notice = match result {
                Ok(Ok(outcome)) => {
                    info!("[Runner] session stored ({:?})", outcome.id());
                    RunnerNotice::Persisted(outcome)
                }
                Ok(Err(error)) => {
                    warn!("[Runner] session could not be stored: {}", error);
                    RunnerNotice::PersistFailed(error)
                }
                Err(join_error) => RunnerNotice::PersistFailed(TrackerError::PersistenceWrite {
                    message: join_error.to_string(),
                }),
            };
            let _ = notices.send(notice);
        }));
    }
}

struct LoopState {
    notices: mpsc::UnboundedSender<RunnerNotice>,
    sensor_rx: Option<mpsc::Receiver<SensorEvent>>,
    /// Set when the subscription opens; cleared by the first fix or error
    awaiting_fix_since: Option<i64>,
    writes: Vec<JoinHandle<()>>,
}

impl LoopState {
    fn emit(&self, notice: RunnerNotice) {
        if self.notices.send(notice).is_err() {
            debug!("[Runner] host dropped the notice stream");
        }
    }
}

async fn next_sensor_event(rx: &mut Option<mpsc::Receiver<SensorEvent>>) -> Option<SensorEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

// ============================================================================
// Handle
// ============================================================================

/// Host side of a spawned [`SessionRunner`].
pub struct RunnerHandle {
    commands: mpsc::Sender<RunnerCommand>,
    notices: mpsc::UnboundedReceiver<RunnerNotice>,
    task: JoinHandle<()>,
}

impl RunnerHandle {
    pub async fn send(&self, cmd: RunnerCommand) -> Result<()> {
        self.commands
            .send(cmd)
            .await
            .map_err(|_| TrackerError::RunnerStopped)
    }

    pub async fn start(&self, kind: ActivityKind, goal: Option<Goal>) -> Result<()> {
        self.send(RunnerCommand::Start { kind, goal }).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.send(RunnerCommand::Pause).await
    }

    pub async fn resume(&self) -> Result<()> {
        self.send(RunnerCommand::Resume).await
    }

    pub async fn stop(&self) -> Result<()> {
        self.send(RunnerCommand::Stop).await
    }

    pub async fn cancel(&self) -> Result<()> {
        self.send(RunnerCommand::Cancel).await
    }

    /// Next notice, or `None` once the runner has exited and the stream is drained.
    pub async fn next_notice(&mut self) -> Option<RunnerNotice> {
        self.notices.recv().await
    }

    /// Ask the runner to exit and wait for it, including pending writes.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.commands.send(RunnerCommand::Shutdown).await;
        self.task.await.map_err(|_| TrackerError::RunnerStopped)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
