//! # Load Coordinator
//!
//! Counts parse completions for an upload batch and reports the single
//! moment the batch is complete.
//!
//! Parses finish in any order, so only the count matters: the coordinator
//! never needs to know which file a completion belongs to. The batch is
//! complete on the completion that brings `completed` up to `expected`, and
//! only on that one. The counters then reset so the next batch starts clean.
//!
//! There is no timeout: a parse that never finishes keeps its batch open,
//! and a new batch cannot start until it does.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackError};

/// Progress of the batch in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBatch {
    pub expected: usize,
    pub completed: usize,
}

/// Outcome of recording one completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    /// More completions are still expected
    Pending { completed: usize, expected: usize },
    /// This completion finished the batch
    Complete { count: usize },
}

impl BatchStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, BatchStatus::Complete { .. })
    }
}

/// Tracks expected vs. completed parses for one batch at a time.
#[derive(Debug, Clone, Default)]
pub struct LoadCoordinator {
    batch: Option<LoadBatch>,
    completed_batches: u64,
}

impl LoadCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a batch expecting `expected` completions.
    ///
    /// Fails with `BatchInProgress` if a batch is still loading (the in-flight
    /// count is left untouched) and with `EmptyBatch` if `expected` is zero.
    pub fn begin_batch(&mut self, expected: usize) -> Result<()> {
        if let Some(batch) = self.batch {
            warn!(
                "[LoadCoordinator] Refusing new batch of {}: {}/{} still loading",
                expected, batch.completed, batch.expected
            );
            return Err(TrackError::BatchInProgress {
                expected: batch.expected,
                completed: batch.completed,
            });
        }
        if expected == 0 {
            return Err(TrackError::EmptyBatch);
        }

        info!("[LoadCoordinator] Batch started: expecting {} tracks", expected);
        self.batch = Some(LoadBatch {
            expected,
            completed: 0,
        });
        Ok(())
    }

    /// Record one finished parse.
    ///
    /// Returns `Complete` exactly once per batch, on the last expected
    /// completion, and resets for the next batch.
    pub fn record_completion(&mut self) -> Result<BatchStatus> {
        let batch = self.batch.as_mut().ok_or_else(|| {
            warn!("[LoadCoordinator] Completion recorded with no batch in progress");
            TrackError::NoActiveBatch
        })?;

        batch.completed += 1;

        if batch.completed < batch.expected {
            debug!(
                "[LoadCoordinator] {}/{} tracks loaded",
                batch.completed, batch.expected
            );
            return Ok(BatchStatus::Pending {
                completed: batch.completed,
                expected: batch.expected,
            });
        }

        let count = batch.expected;
        self.batch = None;
        self.completed_batches += 1;
        info!("[LoadCoordinator] Batch complete: {} tracks", count);
        Ok(BatchStatus::Complete { count })
    }

    /// The batch in flight, if any.
    pub fn current_batch(&self) -> Option<LoadBatch> {
        self.batch
    }

    pub fn is_loading(&self) -> bool {
        self.batch.is_some()
    }

    /// Number of batches completed over the coordinator's lifetime.
    pub fn completed_batches(&self) -> u64 {
        self.completed_batches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_fires_on_last_only() {
        let mut coordinator = LoadCoordinator::new();
        coordinator.begin_batch(3).unwrap();

        assert_eq!(
            coordinator.record_completion().unwrap(),
            BatchStatus::Pending {
                completed: 1,
                expected: 3
            }
        );
        assert!(!coordinator.record_completion().unwrap().is_complete());
        assert_eq!(
            coordinator.record_completion().unwrap(),
            BatchStatus::Complete { count: 3 }
        );
        assert!(!coordinator.is_loading());
        assert_eq!(coordinator.completed_batches(), 1);
    }

    #[test]
    fn test_duplicate_begin_is_rejected() {
        let mut coordinator = LoadCoordinator::new();
        coordinator.begin_batch(2).unwrap();
        coordinator.record_completion().unwrap();

        assert_eq!(
            coordinator.begin_batch(5),
            Err(TrackError::BatchInProgress {
                expected: 2,
                completed: 1
            })
        );
        // In-flight count survives the rejected call
        assert_eq!(
            coordinator.current_batch(),
            Some(LoadBatch {
                expected: 2,
                completed: 1
            })
        );
        assert!(coordinator.record_completion().unwrap().is_complete());
    }

    #[test]
    fn test_next_batch_starts_clean() {
        let mut coordinator = LoadCoordinator::new();
        coordinator.begin_batch(1).unwrap();
        assert!(coordinator.record_completion().unwrap().is_complete());

        coordinator.begin_batch(2).unwrap();
        assert_eq!(coordinator.current_batch().unwrap().completed, 0);
        assert!(!coordinator.record_completion().unwrap().is_complete());
        assert!(coordinator.record_completion().unwrap().is_complete());
        assert_eq!(coordinator.completed_batches(), 2);
    }

    #[test]
    fn test_completion_without_batch() {
        let mut coordinator = LoadCoordinator::new();
        assert_eq!(coordinator.record_completion(), Err(TrackError::NoActiveBatch));
    }

    #[test]
    fn test_empty_batch_rejected() {
        let mut coordinator = LoadCoordinator::new();
        assert_eq!(coordinator.begin_batch(0), Err(TrackError::EmptyBatch));
        assert!(!coordinator.is_loading());
    }
}
