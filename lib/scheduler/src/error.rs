//! Error types for the scheduler crate.

use copper_pigeon_workflow::StoreError;
use std::fmt;

/// Errors from a resumption sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// The execution store failed while listing due executions.
    Store(StoreError),
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store(e) => write!(f, "store error during sweep: {e}"),
        }
    }
}

impl std::error::Error for SchedulerError {}

impl From<StoreError> for SchedulerError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}
