//! Checkpoint callbacks fired by the executors.
//!
//! Executors never print. Progress lines, dashboards or test probes all hang off an
//! [`Observer`], which is called from the controlling task at well-defined points:
//! run start, every `progress_every` submissions/completions, run end, and around
//! stage boundaries.

use std::time::Duration;

use crate::{aggregate::Tally, executor::ExecutionPlan, executor::Stage};

/// A snapshot of how far a run has come.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    /// Submitted or completed so far, depending on the checkpoint.
    pub done: u64,
    pub total: u64,
    /// Successful completions so far; always zero for submission checkpoints.
    pub succeeded: u64,
    pub elapsed: Duration,
}

impl Progress {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.done as f64 / self.total as f64 * 100.0
    }

    pub fn success_percent(&self) -> f64 {
        if self.done == 0 {
            return 0.0;
        }
        self.succeeded as f64 / self.done as f64 * 100.0
    }

    pub fn rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 { self.done as f64 / secs } else { 0.0 }
    }
}

/// Every method has an empty default; implement only what you need.
pub trait Observer: Send + Sync {
    fn on_run_start(&self, _scenario: &str, _plan: &ExecutionPlan) {}

    fn on_submitted(&self, _progress: &Progress) {}

    fn on_completed(&self, _progress: &Progress) {}

    fn on_run_end(&self, _scenario: &str, _tally: &Tally, _elapsed: Duration) {}

    /// `index` is 1-based.
    fn on_stage_start(&self, _index: usize, _stages: usize, _stage: &Stage) {}

    fn on_stage_pause(&self, _pause: Duration) {}
}

/// Ignores every checkpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl Observer for NoopObserver {}

/// Emits each checkpoint as a `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn on_run_start(&self, scenario: &str, plan: &ExecutionPlan) {
        tracing::info!(
            scenario,
            total = plan.total_count,
            target_secs = plan.target_duration.as_secs_f64(),
            workers = plan.concurrency_limit,
            "Execution started"
        );
        if plan.is_burst {
            tracing::info!("Burst mode: submitting all tasks immediately");
        } else {
            tracing::info!(
                interval_secs = plan.pacing_interval.as_secs_f64(),
                theoretical_rate = plan.theoretical_rate(),
                "Paced mode"
            );
        }
    }

    fn on_submitted(&self, progress: &Progress) {
        tracing::info!(
            "Scheduled: {}/{} ({:.1}%) Schedule rate: {:.2} executions/sec",
            progress.done,
            progress.total,
            progress.percent(),
            progress.rate()
        );
    }

    fn on_completed(&self, progress: &Progress) {
        tracing::info!(
            "Completed: {}/{} Success: {} ({:.1}%) Elapsed time: {:.1}s",
            progress.done,
            progress.total,
            progress.succeeded,
            progress.success_percent(),
            progress.elapsed.as_secs_f64()
        );
    }

    fn on_run_end(&self, scenario: &str, tally: &Tally, elapsed: Duration) {
        tracing::info!(
            scenario,
            total = tally.count,
            succeeded = tally.success_count,
            failed = tally.failure_count(),
            elapsed_secs = elapsed.as_secs_f64(),
            "Execution finished"
        );
    }

    fn on_stage_start(&self, index: usize, stages: usize, stage: &Stage) {
        tracing::info!(
            "===== Stage {index}/{stages}: {} executions / {} =====",
            stage.count,
            stage.duration
        );
    }

    fn on_stage_pause(&self, pause: Duration) {
        tracing::info!("Waiting {:.1} seconds...", pause.as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_ratios() {
        let p = Progress {
            done: 50,
            total: 200,
            succeeded: 40,
            elapsed: Duration::from_secs(5),
        };
        assert_eq!(p.percent(), 25.0);
        assert_eq!(p.success_percent(), 80.0);
        assert_eq!(p.rate(), 10.0);
    }

    #[test]
    fn progress_handles_zeroes() {
        let p = Progress {
            done: 0,
            total: 0,
            succeeded: 0,
            elapsed: Duration::ZERO,
        };
        assert_eq!(p.percent(), 0.0);
        assert_eq!(p.success_percent(), 0.0);
        assert_eq!(p.rate(), 0.0);
    }
}
