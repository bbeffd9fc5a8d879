//! Unified error handling for the activity tracker.
//!
//! Every failure the tracker can see (illegal state transitions, location sensor
//! problems, persistence writes, network fetches) is reported through
//! [`TrackerError`]. Callers catch these at the call site, log them and turn them
//! into user-visible notices; nothing here retries.

use thiserror::Error;

use crate::TrackerState;

/// Unified error type for tracker operations.
#[derive(Debug, Clone, PartialEq, Error)]
#[cfg_attr(feature = "ffi", derive(uniffi::Error), uniffi(flat_error))]
pub enum TrackerError {
    /// Operation is not valid in the tracker's current state
    #[error("cannot {action} while {state}")]
    InvalidTransition {
        state: TrackerState,
        action: &'static str,
    },
    /// User or platform denied access to location
    #[error("location permission denied")]
    SensorPermissionDenied,
    /// No fix arrived within the sensor timeout
    #[error("location sensor timed out after {timeout_ms}ms")]
    SensorTimeout { timeout_ms: u64 },
    /// Platform has no location sensor, or it was already claimed
    #[error("location sensor unavailable: {message}")]
    SensorUnavailable { message: String },
    /// Session document could not be written
    #[error("failed to persist session: {message}")]
    PersistenceWrite { message: String },
    /// Session documents could not be read back
    #[error("failed to read sessions: {message}")]
    PersistenceRead { message: String },
    /// HTTP/API error
    #[error("network fetch failed{}: {message}", status_suffix(.status_code))]
    NetworkFetch {
        message: String,
        status_code: Option<u16>,
    },
    /// Configuration error
    #[error("configuration error: {message}")]
    Config { message: String },
    /// JSON encode/decode error
    #[error("serialization error: {message}")]
    Serialization { message: String },
    /// The session runner task is no longer accepting commands
    #[error("session runner has stopped")]
    RunnerStopped,
}

fn status_suffix(status_code: &Option<u16>) -> String {
    status_code.map_or_else(String::new, |code| format!(" ({})", code))
}

impl TrackerError {
    /// True for the errors a location sensor can report.
    pub fn is_sensor_error(&self) -> bool {
        matches!(
            self,
            TrackerError::SensorPermissionDenied
                | TrackerError::SensorTimeout { .. }
                | TrackerError::SensorUnavailable { .. }
        )
    }
}

impl From<serde_json::Error> for TrackerError {
    fn from(err: serde_json::Error) -> Self {
        TrackerError::Serialization {
            message: err.to_string(),
        }
    }
}

/// Result type alias for tracker operations.
pub type Result<T> = std::result::Result<T, TrackerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TrackerError::InvalidTransition {
            state: TrackerState::Idle,
            action: "pause",
        };
        assert_eq!(err.to_string(), "cannot pause while idle");

        let err = TrackerError::NetworkFetch {
            message: "bad key".to_string(),
            status_code: Some(401),
        };
        assert!(err.to_string().contains("401"));
        assert!(err.to_string().contains("bad key"));
    }

    #[test]
    fn test_sensor_error_classification() {
        assert!(TrackerError::SensorPermissionDenied.is_sensor_error());
        assert!(TrackerError::SensorTimeout { timeout_ms: 5000 }.is_sensor_error());
        assert!(!TrackerError::PersistenceWrite {
            message: "offline".to_string()
        }
        .is_sensor_error());
    }

    #[test]
    fn test_from_json_error() {
        let err: TrackerError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, TrackerError::Serialization { .. }));
    }
}
