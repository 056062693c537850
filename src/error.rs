//! Unified error handling for the run-history library.
//!
//! Caller errors (duplicate batch start, bad date window, unknown ids) are
//! reported through [`TrackError`] and never partially applied: when an
//! operation returns `Err`, the session state is exactly what it was before.

use chrono::NaiveDate;
use thiserror::Error;

use crate::catalog::TrackId;

/// Unified error type for run-history operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackError {
    /// A batch was started while another is still loading
    #[error("Batch already in progress: {completed}/{expected} tracks loaded")]
    BatchInProgress { expected: usize, completed: usize },
    /// A batch was started with nothing to load
    #[error("Batch must expect at least one track")]
    EmptyBatch,
    /// A completion arrived with no batch running
    #[error("No batch in progress")]
    NoActiveBatch,
    /// Date window with min after max
    #[error("Invalid date window: {min} is after {max}")]
    InvalidDateWindow { min: NaiveDate, max: NaiveDate },
    /// Activity type that has never been registered
    #[error("Unknown activity type '{activity_type}'")]
    UnknownActivityType { activity_type: String },
    /// Track id not present in the catalog
    #[error("Unknown track {track_id}")]
    UnknownTrack { track_id: TrackId },
    /// A mutation was requested while another one is still running
    #[error("Session is already being mutated")]
    ReentrantMutation,
    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError { message: String },
}

/// Result type alias for run-history operations.
pub type Result<T> = std::result::Result<T, TrackError>;

/// Extension trait for converting Option to TrackError.
pub trait OptionExt<T> {
    /// Convert Option to Result with unknown track error.
    fn ok_or_unknown_track(self, track_id: TrackId) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_unknown_track(self, track_id: TrackId) -> Result<T> {
        self.ok_or(TrackError::UnknownTrack { track_id })
    }
}
