use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced to callers of the engine.
///
/// Individual task failures are *not* errors: they are captured per invocation as
/// [`crate::task::Outcome::Failure`] and counted in the summary.
#[derive(Debug, Error)]
pub enum Error {
    /// The duration expression did not match `<number>[.<number>]<h|m|s>`.
    /// Raised before any task is scheduled.
    #[error("invalid duration format: {input:?}, use a form like '1h', '30m' or '45s'")]
    DurationFormat { input: String },

    #[error("scheduler failure: {0}")]
    Scheduler(#[from] SchedulerFailure),

    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Pool-level failures that stop a run before every task was submitted.
///
/// A run that hits one of these still yields a (partial) summary, marked as
/// [`crate::summary::RunStatus::Aborted`].
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerFailure {
    #[error("cannot create a worker pool with {workers} workers")]
    PoolCreation { workers: usize },

    #[error("task queue closed after {submitted} of {total} submissions")]
    QueueClosed { submitted: u64, total: u64 },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
