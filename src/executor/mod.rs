//! Executors: how a [`Scenario`](crate::Scenario) is actually run.
//!
//! Two executors are provided:
//!
//! - [`PacedExecutor`] runs a scenario `total_count` times, spreading submissions over
//!   `target_duration` and bounding concurrency with a fixed worker pool. A target
//!   duration short enough that the gap between submissions falls under
//!   [`BURST_THRESHOLD`] is a *burst*: everything is submitted at once.
//! - [`StageExecutor`] runs a list of [`Stage`]s one after another through a
//!   `PacedExecutor`, pausing between stages, and returns one summary per stage.
//!
//! # Pacing
//!
//! ```text
//! pacing_interval  = target_duration / total_count
//! is_burst         = pacing_interval < 10ms
//! submission_delay = pacing_interval * 0.8     (zero in burst mode)
//! ```
//!
//! The controller sleeps `submission_delay` after every submission but the last.
//! The real gap also includes submission and wake-up overhead, so it lands close
//! to the interval.
//! Pacing only throttles *submission*; the pool throttles *execution*. When tasks
//! are slower than the offered rate, the queue grows and the run simply takes longer
//! than `target_duration`. Nothing is ever dropped for being late.
pub mod paced;
pub mod stage;

pub use paced::PacedExecutor;
pub use stage::{Stage, StageExecutor, StagePlan};

use std::time::Duration;

use typed_builder::TypedBuilder;

use crate::{error::SchedulerFailure, task::TaskResult};

/// Pacing intervals below this are treated as "no pacing at all".
pub const BURST_THRESHOLD: Duration = Duration::from_millis(10);
/// Fraction of the pacing interval actually slept between submissions.
pub const PACING_UNDERSHOOT: f64 = 0.8;
/// Emit a progress checkpoint every this many submissions/completions.
pub const DEFAULT_PROGRESS_EVERY: u64 = 100;
/// Upper bound of the default concurrency formula.
pub const MAX_DEFAULT_CONCURRENCY: usize = 20;

/// `clamp(total_count / 5, 1, 20)`
pub fn default_concurrency(total_count: u64) -> usize {
    let fifth = usize::try_from(total_count / 5).unwrap_or(usize::MAX);
    fifth.clamp(1, MAX_DEFAULT_CONCURRENCY)
}

/// What to run and how hard.
#[derive(Debug, Clone, PartialEq, TypedBuilder)]
pub struct ExecutionConfig {
    /// How many times the action is invoked.
    pub total_count: u64,
    /// Window over which submissions are spread. Zero means burst.
    #[builder(default)]
    pub target_duration: Duration,
    /// Worker pool size. `None` falls back to [`default_concurrency`].
    #[builder(default, setter(into))]
    pub concurrency_limit: Option<usize>,
    #[builder(default = DEFAULT_PROGRESS_EVERY)]
    pub progress_every: u64,
}

impl ExecutionConfig {
    pub fn plan(&self) -> ExecutionPlan {
        ExecutionPlan::new(
            self.total_count,
            self.target_duration,
            self.concurrency_limit
                .unwrap_or_else(|| default_concurrency(self.total_count)),
        )
    }
}

/// The schedule derived from an [`ExecutionConfig`]. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecutionPlan {
    pub total_count: u64,
    pub target_duration: Duration,
    pub concurrency_limit: usize,
    pub pacing_interval: Duration,
    pub is_burst: bool,
}

impl ExecutionPlan {
    pub fn new(total_count: u64, target_duration: Duration, concurrency_limit: usize) -> Self {
        let pacing_interval = if total_count == 0 {
            Duration::ZERO
        } else {
            target_duration.div_f64(total_count as f64)
        };
        Self {
            total_count,
            target_duration,
            concurrency_limit,
            pacing_interval,
            is_burst: pacing_interval < BURST_THRESHOLD,
        }
    }

    /// How long the controller sleeps between two submissions.
    pub fn submission_delay(&self) -> Duration {
        if self.is_burst {
            Duration::ZERO
        } else {
            self.pacing_interval.mul_f64(PACING_UNDERSHOOT)
        }
    }

    /// Submissions per second the plan aims for; infinite in burst mode.
    pub fn theoretical_rate(&self) -> f64 {
        if self.pacing_interval.is_zero() {
            f64::INFINITY
        } else {
            1.0 / self.pacing_interval.as_secs_f64()
        }
    }
}

/// Raw output of one scheduler run, before aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport<T> {
    /// Results in completion order.
    pub results: Vec<TaskResult<T>>,
    /// Observed wall-clock time from plan start to last completion.
    pub elapsed: Duration,
    /// Set when the run stopped before every task was submitted.
    pub abort: Option<SchedulerFailure>,
}
