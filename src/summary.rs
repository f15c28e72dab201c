use std::{collections::BTreeMap, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    aggregate::Tally,
    error::{Error, Result, SchedulerFailure},
    executor::RunReport,
    task::TaskResult,
};

/// Whether a run submitted and drained every task it was asked to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    /// The run stopped early; the summary only covers what was collected.
    Aborted { reason: SchedulerFailure },
}

/// Final statistics of one run.
///
/// The invariants `total_requests == successful_requests + failed_requests` and
/// `0.0 <= success_rate <= 100.0` always hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSummary<T> {
    pub total_requests: usize,
    pub successful_requests: usize,
    pub failed_requests: usize,
    /// Observed wall-clock time of the whole run.
    pub total_duration: Duration,
    /// Mean duration over successful results only, zero when there are none.
    pub average_response_time: Duration,
    pub requests_per_second: f64,
    /// Percentage in `[0, 100]`.
    pub success_rate: f64,
    pub status: RunStatus,
    /// Failure count per error kind.
    pub errors: BTreeMap<String, usize>,
    /// Results in completion order.
    pub results: Vec<TaskResult<T>>,
}

impl<T> ExecutionSummary<T> {
    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// Turn an aborted run into an [`Error::Scheduler`], for callers that want `?`.
    pub fn completed(self) -> Result<Self> {
        match &self.status {
            RunStatus::Completed => Ok(self),
            RunStatus::Aborted { reason } => Err(Error::Scheduler(reason.clone())),
        }
    }

    /// Failure counts grouped by error kind.
    pub fn error_breakdown(&self) -> &BTreeMap<String, usize> {
        &self.errors
    }

    pub fn successes(&self) -> impl Iterator<Item = &TaskResult<T>> {
        self.results.iter().filter(|r| r.is_success())
    }

    pub fn failures(&self) -> impl Iterator<Item = &TaskResult<T>> {
        self.results.iter().filter(|r| !r.is_success())
    }
}

/// Reduce a finished result set into an [`ExecutionSummary`].
pub fn summarize<T>(results: Vec<TaskResult<T>>, observed: Duration) -> ExecutionSummary<T> {
    let mut tally = Tally::new();
    tally.aggregate(&results);

    let requests_per_second = if observed.is_zero() {
        0.0
    } else {
        tally.count as f64 / observed.as_secs_f64()
    };

    ExecutionSummary {
        total_requests: tally.count,
        successful_requests: tally.success_count,
        failed_requests: tally.failure_count(),
        total_duration: observed,
        average_response_time: tally.average_latency(),
        requests_per_second,
        success_rate: tally.success_rate(),
        status: RunStatus::Completed,
        errors: tally.errors,
        results,
    }
}

impl<T> From<RunReport<T>> for ExecutionSummary<T> {
    fn from(report: RunReport<T>) -> Self {
        let mut summary = summarize(report.results, report.elapsed);
        if let Some(reason) = report.abort {
            summary.status = RunStatus::Aborted { reason };
        }
        summary
    }
}
