//! Location sensor subscription.
//!
//! A [`LocationSensor`] hands out a channel of [`SensorEvent`]s on
//! `subscribe` and stops producing on `unsubscribe`; stopping the
//! subscription is the only way to cancel it. Two implementations:
//!
//! - [`ChannelSensor`]: the host platform pushes fixes through a [`SensorFeed`].
//! - [`ReplaySensor`]: replays a canned route with its original timing.

use log::{debug, info};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

use crate::{Result, Sample, TrackerError};

/// Events buffered per subscription before the producer sees back-pressure.
pub const DEFAULT_BUFFER: usize = 64;

/// Output of a location sensor subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum SensorEvent {
    Fix(Sample),
    /// Accelerometer reading in m/s²
    Motion { x: f64, y: f64, z: f64 },
    Error(TrackerError),
}

pub trait LocationSensor: Send {
    /// Start producing events. Fails if a subscription is already open.
    fn subscribe(&mut self) -> Result<mpsc::Receiver<SensorEvent>>;

    /// Stop producing events. Idempotent.
    fn unsubscribe(&mut self);
}

// ============================================================================
// Channel Sensor
// ============================================================================

type SharedSender = Arc<Mutex<Option<mpsc::Sender<SensorEvent>>>>;

/// Sensor fed by the host platform.
pub struct ChannelSensor {
    current: SharedSender,
    buffer: usize,
}

/// Producer half of a [`ChannelSensor`].
#[derive(Clone)]
pub struct SensorFeed {
    current: SharedSender,
}

impl ChannelSensor {
    pub fn new() -> (Self, SensorFeed) {
        Self::with_buffer(DEFAULT_BUFFER)
    }

    pub fn with_buffer(buffer: usize) -> (Self, SensorFeed) {
        let current: SharedSender = Arc::new(Mutex::new(None));
        (
            Self {
                current: Arc::clone(&current),
                buffer: buffer.max(1),
            },
            SensorFeed { current },
        )
    }
}

impl LocationSensor for ChannelSensor {
    fn subscribe(&mut self) -> Result<mpsc::Receiver<SensorEvent>> {
        let mut current = self
            .current
            .lock()
            .map_err(|e| TrackerError::SensorUnavailable {
                message: e.to_string(),
            })?;
        if current.as_ref().is_some_and(|tx| !tx.is_closed()) {
            return Err(TrackerError::SensorUnavailable {
                message: "already subscribed".to_string(),
            });
        }
        let (tx, rx) = mpsc::channel(self.buffer);
        *current = Some(tx);
        debug!("[Sensor] channel subscription opened");
        Ok(rx)
    }

    fn unsubscribe(&mut self) {
        if let Ok(mut current) = self.current.lock() {
            if current.take().is_some() {
                debug!("[Sensor] channel subscription closed");
            }
        }
    }
}

impl SensorFeed {
    /// Deliver an event. Returns false when nobody is subscribed or the
    /// subscriber is not keeping up.
    pub fn push(&self, event: SensorEvent) -> bool {
        let Ok(current) = self.current.lock() else {
            return false;
        };
        match current.as_ref() {
            Some(tx) => tx.try_send(event).is_ok(),
            None => false,
        }
    }

    pub fn push_fix(&self, sample: Sample) -> bool {
        self.push(SensorEvent::Fix(sample))
    }

    pub fn push_error(&self, error: TrackerError) -> bool {
        self.push(SensorEvent::Error(error))
    }

    pub fn is_subscribed(&self) -> bool {
        self.current
            .lock()
            .map(|c| c.as_ref().is_some_and(|tx| !tx.is_closed()))
            .unwrap_or(false)
    }
}

// ============================================================================
// Replay Sensor
// ============================================================================

/// Replays recorded events, waiting the recorded gap between fixes.
pub struct ReplaySensor {
    events: Vec<SensorEvent>,
    start_delay: Duration,
    task: Option<JoinHandle<()>>,
}

impl ReplaySensor {
    pub fn new(samples: Vec<Sample>) -> Self {
        Self::from_events(samples.into_iter().map(SensorEvent::Fix).collect())
    }

    pub fn from_events(events: Vec<SensorEvent>) -> Self {
        Self {
            events,
            start_delay: Duration::ZERO,
            task: None,
        }
    }

    /// A sensor that reports one error and nothing else.
    pub fn failing(error: TrackerError) -> Self {
        Self::from_events(vec![SensorEvent::Error(error)])
    }

    /// Wait before the first event.
    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }
}

impl LocationSensor for ReplaySensor {
    fn subscribe(&mut self) -> Result<mpsc::Receiver<SensorEvent>> {
        if self.task.as_ref().is_some_and(|t| !t.is_finished()) {
            return Err(TrackerError::SensorUnavailable {
                message: "replay already running".to_string(),
            });
        }

        let (tx, rx) = mpsc::channel(DEFAULT_BUFFER);
        let events = self.events.clone();
        let start_delay = self.start_delay;
        info!("[Sensor] replaying {} events", events.len());

        self.task = Some(tokio::spawn(async move {
            if !start_delay.is_zero() {
                sleep(start_delay).await;
            }
            let mut last_ts: Option<i64> = None;
            for event in events {
                if let SensorEvent::Fix(sample) = &event {
                    if let Some(prev) = last_ts {
                        let gap = (sample.timestamp_ms - prev).max(0) as u64;
                        sleep(Duration::from_millis(gap)).await;
                    }
                    last_ts = Some(sample.timestamp_ms);
                }
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        }));
        Ok(rx)
    }

    fn unsubscribe(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("[Sensor] replay stopped");
        }
    }
}

impl Drop for ReplaySensor {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_sensor_delivers_only_while_subscribed() {
        let (mut sensor, feed) = ChannelSensor::new();
        assert!(!feed.push_fix(Sample::new(0.0, 0.0, 0)));

        let mut rx = sensor.subscribe().unwrap();
        assert!(feed.is_subscribed());
        assert!(sensor.subscribe().is_err());
        assert!(feed.push_fix(Sample::new(1.0, 1.0, 1000)));
        assert_eq!(
            rx.recv().await,
            Some(SensorEvent::Fix(Sample::new(1.0, 1.0, 1000)))
        );

        sensor.unsubscribe();
        assert!(!feed.push_error(TrackerError::SensorPermissionDenied));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_keeps_timing() {
        let samples = vec![
            Sample::new(0.0, 0.0, 0),
            Sample::new(0.0, 0.001, 5_000),
            Sample::new(0.0, 0.002, 6_000),
        ];
        let mut sensor = ReplaySensor::new(samples);
        let mut rx = sensor.subscribe().unwrap();

        let start = tokio::time::Instant::now();
        let mut arrivals = Vec::new();
        while let Some(SensorEvent::Fix(_)) = rx.recv().await {
            arrivals.push(start.elapsed().as_millis());
        }
        assert_eq!(arrivals, vec![0, 5_000, 6_000]);
    }

    #[tokio::test]
    async fn test_replay_failing_sensor() {
        let mut sensor = ReplaySensor::failing(TrackerError::SensorTimeout { timeout_ms: 5000 });
        let mut rx = sensor.subscribe().unwrap();
        assert_eq!(
            rx.recv().await,
            Some(SensorEvent::Error(TrackerError::SensorTimeout { timeout_ms: 5000 }))
        );
        assert_eq!(rx.recv().await, None);
    }
}
