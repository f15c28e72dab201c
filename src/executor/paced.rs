//! The `PacedExecutor`: submission pacing on top of a fixed-size worker pool.
//!
//! # High-level flow
//! 1. An [`ExecutionPlan`] is derived from the config (pacing interval, burst flag,
//!    pool size).
//! 2. A worker pool of `concurrency_limit` Tokio tasks is spawned. Workers share one
//!    queue of sequence ids and one completion channel.
//! 3. The controller pushes ids `1..=total_count` onto the queue in order, sleeping
//!    `submission_delay` between pushes in paced mode.
//! 4. The queue is closed; the controller drains the completion channel until every
//!    worker has exited, then joins the workers.
//! 5. Submitted ids that never produced a result (a worker died mid-task) are filled
//!    in with `WorkerLost` failures that keep their original sequence id.
//!
//! The controller is the only writer of submission order. Workers never share state
//! beyond the two channels, and each run owns its own pool.
use std::{fmt::Display, future::Future, sync::Arc};

use futures::future::join_all;
use tokio::time::Instant;
use typed_builder::TypedBuilder;

use super::{ExecutionConfig, ExecutionPlan, RunReport};
use crate::{
    aggregate::Tally,
    error::SchedulerFailure,
    observer::{Observer, Progress, TracingObserver},
    scenario::Scenario,
    task::TaskResult,
};
use internals::*;

/// Runs a scenario `total_count` times with paced submission and bounded concurrency.
///
/// ```no_run
/// # async fn demo() {
/// use std::time::Duration;
/// use volley::{ExecutionConfig, PacedExecutor, Scenario, summary::ExecutionSummary};
///
/// let scenario = Scenario::builder()
///     .args(())
///     .action(|_| async { Ok::<_, std::io::Error>(()) })
///     .build();
/// let executor = PacedExecutor::builder()
///     .config(
///         ExecutionConfig::builder()
///             .total_count(60)
///             .target_duration(Duration::from_secs(30))
///             .build(),
///     )
///     .build();
/// let summary = ExecutionSummary::from(executor.exec(&scenario).await);
/// # }
/// ```
#[derive(Clone, TypedBuilder)]
pub struct PacedExecutor {
    pub config: ExecutionConfig,
    #[builder(default = Arc::new(TracingObserver) as Arc<dyn Observer>)]
    pub observer: Arc<dyn Observer>,
}

impl PacedExecutor {
    /// Execute the scenario and return the raw results.
    ///
    /// Never fails: task failures are recorded per result, and pool-level failures
    /// end the run early with whatever was collected, flagged in
    /// [`RunReport::abort`].
    pub async fn exec<Args, F, Fut, T, E>(&self, scenario: &Scenario<Args, F>) -> RunReport<T>
    where
        Args: Clone + Send + 'static,
        F: Fn(Args) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Display + Send + 'static,
    {
        let plan = self.config.plan();
        let progress_every = self.config.progress_every;
        let start = Instant::now();
        self.observer.on_run_start(&scenario.name, &plan);

        if plan.concurrency_limit == 0 {
            let failure = SchedulerFailure::PoolCreation { workers: 0 };
            tracing::error!("Cannot run scenario {}: {failure}", scenario.name);
            return self.finish(&scenario.name, Vec::new(), start, Some(failure));
        }

        tracing::info!(
            "Spawning {} workers for scenario: {}",
            plan.concurrency_limit,
            scenario.name
        );
        let WorkerPool {
            queue,
            mut completions,
            workers,
        } = spawn_workers(
            plan.concurrency_limit,
            scenario.action.clone(),
            scenario.args.clone(),
        );

        let submission =
            submit_all(&queue, &plan, progress_every, self.observer.as_ref(), start).await;
        // Closing the queue lets workers exit once it is drained.
        drop(queue);
        tracing::info!("All executions scheduled. Waiting for completion...");

        let mut results = Vec::with_capacity(submission.submitted as usize);
        let mut succeeded = 0;
        while let Some(result) = completions.recv().await {
            if result.is_success() {
                succeeded += 1;
            }
            results.push(result);
            let done = results.len() as u64;
            if progress_every > 0 && done % progress_every == 0 {
                self.observer.on_completed(&Progress {
                    done,
                    total: plan.total_count,
                    succeeded,
                    elapsed: start.elapsed(),
                });
            }
        }

        let lost_workers = join_all(workers)
            .await
            .into_iter()
            .filter_map(Result::err)
            .inspect(|e| tracing::error!("Worker stopped abnormally: {e}"))
            .count();
        if lost_workers > 0 || (results.len() as u64) < submission.submitted {
            let missing = fill_lost(&mut results, submission.submitted);
            tracing::warn!("{lost_workers} workers lost, {missing} tasks recorded as lost");
        }

        self.finish(&scenario.name, results, start, submission.failure)
    }

    fn finish<T>(
        &self,
        scenario: &str,
        results: Vec<TaskResult<T>>,
        start: Instant,
        abort: Option<SchedulerFailure>,
    ) -> RunReport<T> {
        let elapsed = start.elapsed();
        let mut tally = Tally::new();
        tally.aggregate(&results);
        self.observer.on_run_end(scenario, &tally, elapsed);
        tracing::info!("Done running scenario: {scenario}!");

        RunReport {
            results,
            elapsed,
            abort,
        }
    }
}

#[cfg(feature = "internals")]
pub use internals::*;

/// Building blocks of the `PacedExecutor`.
/// Encapsulated in a module to allow conditional exposure via `#[cfg(feature = "internals")]`.
mod internals {
    use super::*;
    use std::collections::HashSet;
    use tokio::{
        sync::{
            Mutex,
            mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel},
        },
        task::JoinHandle,
    };

    use crate::task::execute;

    /// Handles to a running pool: the queue to feed it, the channel results come
    /// back on, and the worker tasks themselves.
    pub struct WorkerPool<T> {
        pub queue: UnboundedSender<u64>,
        pub completions: UnboundedReceiver<TaskResult<T>>,
        pub workers: Vec<JoinHandle<()>>,
    }

    /// Spawns `size` Tokio tasks, each pulling sequence ids off a shared queue and
    /// running the action once per id.
    ///
    /// Workers exit when the queue is closed and empty, or when nobody is listening
    /// for completions anymore.
    pub fn spawn_workers<Args, F, Fut, T, E>(size: usize, action: F, args: Args) -> WorkerPool<T>
    where
        Args: Clone + Send + 'static,
        F: Fn(Args) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Display + Send + 'static,
    {
        let (queue_tx, queue_rx) = unbounded_channel::<u64>();
        let (done_tx, done_rx) = unbounded_channel();
        let queue_rx = Arc::new(Mutex::new(queue_rx));

        let workers = (0..size)
            .map(|i| {
                let queue = queue_rx.clone();
                let done = done_tx.clone();
                let action = action.clone();
                let args = args.clone();
                tokio::spawn(async move {
                    tracing::debug!("Worker {i} spawned.");
                    loop {
                        // Only one idle worker waits on the queue at a time; the
                        // rest wait on the lock.
                        let next = queue.lock().await.recv().await;
                        let Some(sequence_id) = next else {
                            break;
                        };

                        let result = execute(sequence_id, &action, args.clone()).await;
                        if done.send(result).is_err() {
                            tracing::debug!("Worker {i} has no one to report to.");
                            break;
                        }
                    }
                    tracing::debug!("Worker {i} shutting down.");
                })
            })
            .collect();

        WorkerPool {
            queue: queue_tx,
            completions: done_rx,
            workers,
        }
    }

    /// How far submission got.
    #[derive(Debug, Clone, PartialEq)]
    pub struct Submission {
        pub submitted: u64,
        pub failure: Option<SchedulerFailure>,
    }

    /// Push `1..=plan.total_count` onto the queue in ascending order, pacing between
    /// pushes. Stops early only if the pool has gone away.
    pub async fn submit_all(
        queue: &UnboundedSender<u64>,
        plan: &ExecutionPlan,
        progress_every: u64,
        observer: &dyn Observer,
        start: Instant,
    ) -> Submission {
        let delay = plan.submission_delay();
        let total = plan.total_count;

        for sequence_id in 1..=total {
            if queue.send(sequence_id).is_err() {
                let failure = SchedulerFailure::QueueClosed {
                    submitted: sequence_id - 1,
                    total,
                };
                tracing::error!("Submission stopped: {failure}");
                return Submission {
                    submitted: sequence_id - 1,
                    failure: Some(failure),
                };
            }

            if is_milestone(sequence_id, total, progress_every) {
                observer.on_submitted(&Progress {
                    done: sequence_id,
                    total,
                    succeeded: 0,
                    elapsed: start.elapsed(),
                });
            }

            if !delay.is_zero() && sequence_id < total {
                tokio::time::sleep(delay).await;
            }
        }

        Submission {
            submitted: total,
            failure: None,
        }
    }

    fn is_milestone(n: u64, total: u64, every: u64) -> bool {
        n == total || (every > 0 && n % every == 0)
    }

    /// Append a `WorkerLost` failure for every id in `1..=submitted` that has no
    /// result yet. Returns how many were added.
    pub fn fill_lost<T>(results: &mut Vec<TaskResult<T>>, submitted: u64) -> usize {
        let seen: HashSet<u64> = results.iter().map(|r| r.sequence_id).collect();
        let before = results.len();
        results.extend(
            (1..=submitted)
                .filter(|id| !seen.contains(id))
                .map(|id| TaskResult::lost(id, "worker stopped before reporting a result")),
        );
        results.len() - before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        observer::NoopObserver,
        task::{Outcome, WORKER_LOST_KIND},
    };
    use std::{
        sync::{
            Mutex as StdMutex,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };

    #[derive(Debug)]
    struct Refused;

    impl Display for Refused {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("connection refused")
        }
    }

    fn executor(total: u64, window: Duration, workers: usize) -> PacedExecutor {
        PacedExecutor::builder()
            .config(
                ExecutionConfig::builder()
                    .total_count(total)
                    .target_duration(window)
                    .concurrency_limit(workers)
                    .build(),
            )
            .observer(Arc::new(NoopObserver))
            .build()
    }

    #[derive(Default)]
    struct Recorder {
        submitted: StdMutex<Vec<u64>>,
        completed: StdMutex<Vec<u64>>,
        ended: AtomicUsize,
    }

    impl Observer for Recorder {
        fn on_submitted(&self, progress: &Progress) {
            self.submitted.lock().unwrap().push(progress.done);
        }
        fn on_completed(&self, progress: &Progress) {
            self.completed.lock().unwrap().push(progress.done);
        }
        fn on_run_end(&self, _: &str, _: &Tally, _: Duration) {
            self.ended.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn spawn_expected_number_of_workers() {
        let action = |_: ()| async { Ok::<_, Refused>(()) };
        let pool: WorkerPool<()> = spawn_workers(10, action, ());

        assert_eq!(pool.workers.len(), 10);
    }

    #[tokio::test]
    async fn sequence_ids_are_unique_and_contiguous() {
        let scenario = Scenario::builder()
            .args(())
            .action(|_| async { Ok::<_, Refused>(()) })
            .build();
        let report = executor(25, Duration::ZERO, 4).exec(&scenario).await;

        let mut ids: Vec<u64> = report.results.iter().map(|r| r.sequence_id).collect();
        ids.sort_unstable();
        assert_eq!(ids, (1..=25).collect::<Vec<_>>());
        assert!(report.abort.is_none());
    }

    #[tokio::test]
    async fn single_worker_runs_in_submission_order() {
        let counter = Arc::new(AtomicUsize::new(0));
        let scenario = Scenario::builder()
            .args(counter)
            .action(|counter: Arc<AtomicUsize>| async move {
                Ok::<_, Refused>(counter.fetch_add(1, Ordering::SeqCst) as u64 + 1)
            })
            .build();

        let report = executor(50, Duration::ZERO, 1).exec(&scenario).await;

        assert_eq!(report.results.len(), 50);
        for (expected, result) in (1..=50).zip(&report.results) {
            assert_eq!(result.sequence_id, expected);
            assert_eq!(result.payload(), Some(&expected));
        }
    }

    /// Args whose `clone` panics once, on the `nth` call, taking a worker down with it.
    struct FragileArgs {
        clones: Arc<AtomicUsize>,
        nth: usize,
    }

    impl Clone for FragileArgs {
        fn clone(&self) -> Self {
            let n = self.clones.fetch_add(1, Ordering::SeqCst) + 1;
            if n == self.nth {
                panic!("clone #{n} failed");
            }
            Self {
                clones: self.clones.clone(),
                nth: self.nth,
            }
        }
    }

    #[tokio::test]
    async fn lost_worker_tasks_are_reconciled() {
        // One clone for the pool, one per worker, then one per task: the 7th
        // clone happens inside a worker, after it took an id off the queue.
        let scenario = Scenario::builder()
            .args(FragileArgs {
                clones: Arc::new(AtomicUsize::new(0)),
                nth: 7,
            })
            .action(|_: FragileArgs| async { Ok::<_, Refused>(()) })
            .build();

        let report = executor(10, Duration::ZERO, 2).exec(&scenario).await;

        assert!(report.abort.is_none());
        let mut ids: Vec<u64> = report.results.iter().map(|r| r.sequence_id).collect();
        ids.sort_unstable();
        assert_eq!(ids, (1..=10).collect::<Vec<_>>());

        let lost: Vec<_> = report
            .results
            .iter()
            .filter_map(|r| r.error())
            .collect();
        assert_eq!(lost.len(), 1);
        assert_eq!(lost[0].kind, WORKER_LOST_KIND);
        assert_eq!(report.results.iter().filter(|r| r.is_success()).count(), 9);
    }

    #[tokio::test]
    async fn concurrency_never_exceeds_pool_size() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let scenario = Scenario::builder()
            .args((running.clone(), peak.clone()))
            .action(|(running, peak): (Arc<AtomicUsize>, Arc<AtomicUsize>)| async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, Refused>(())
            })
            .build();

        let report = executor(12, Duration::ZERO, 3).exec(&scenario).await;

        assert_eq!(report.results.len(), 12);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn failures_do_not_stop_the_run() {
        let scenario = Scenario::builder()
            .args(())
            .action(|_| async { Err::<(), _>(Refused) })
            .build();
        let report = executor(3, Duration::ZERO, 2).exec(&scenario).await;

        assert_eq!(report.results.len(), 3);
        for result in &report.results {
            match &result.outcome {
                Outcome::Failure(err) => assert_eq!(err.kind, "Refused"),
                Outcome::Success(_) => panic!("expected a failure"),
            }
        }
    }

    #[tokio::test]
    async fn paced_run_spreads_submissions() {
        // 5 tasks over 500ms: 4 gaps of 80ms each.
        let scenario = Scenario::builder()
            .args(())
            .action(|_| async { Ok::<_, Refused>(()) })
            .build();
        let report = executor(5, Duration::from_millis(500), 5).exec(&scenario).await;

        assert_eq!(report.results.len(), 5);
        assert!(report.elapsed >= Duration::from_millis(320));
    }

    #[tokio::test]
    async fn zero_workers_aborts_with_pool_failure() {
        let scenario = Scenario::builder()
            .args(())
            .action(|_| async { Ok::<_, Refused>(()) })
            .build();
        let report = executor(5, Duration::ZERO, 0).exec(&scenario).await;

        assert!(report.results.is_empty());
        assert_eq!(
            report.abort,
            Some(SchedulerFailure::PoolCreation { workers: 0 })
        );
    }

    #[tokio::test]
    async fn zero_count_completes_immediately() {
        let scenario = Scenario::builder()
            .args(())
            .action(|_| async { Ok::<_, Refused>(()) })
            .build();
        let report = executor(0, Duration::from_secs(60), 2).exec(&scenario).await;

        assert!(report.results.is_empty());
        assert!(report.abort.is_none());
    }

    #[tokio::test]
    async fn observer_sees_milestones() {
        let recorder = Arc::new(Recorder::default());
        let executor = PacedExecutor::builder()
            .config(
                ExecutionConfig::builder()
                    .total_count(25)
                    .concurrency_limit(5usize)
                    .progress_every(10)
                    .build(),
            )
            .observer(recorder.clone())
            .build();
        let scenario = Scenario::builder()
            .args(())
            .action(|_| async { Ok::<_, Refused>(()) })
            .build();

        executor.exec(&scenario).await;

        assert_eq!(*recorder.submitted.lock().unwrap(), vec![10, 20, 25]);
        assert_eq!(*recorder.completed.lock().unwrap(), vec![10, 20]);
        assert_eq!(recorder.ended.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn submission_stops_when_pool_is_gone() {
        let (queue, rx) = tokio::sync::mpsc::unbounded_channel();
        drop(rx);
        let plan = ExecutionPlan::new(4, Duration::ZERO, 1);

        let submission = submit_all(&queue, &plan, 100, &NoopObserver, Instant::now()).await;

        assert_eq!(submission.submitted, 0);
        assert_eq!(
            submission.failure,
            Some(SchedulerFailure::QueueClosed {
                submitted: 0,
                total: 4
            })
        );
    }

    #[test]
    fn lost_tasks_keep_their_ids() {
        let mut results = vec![TaskResult::<()>::lost(2, "x")];
        results[0].outcome = Outcome::Success(());

        let added = fill_lost(&mut results, 4);

        assert_eq!(added, 3);
        let mut lost: Vec<u64> = results
            .iter()
            .filter(|r| r.error().is_some_and(|e| e.kind == WORKER_LOST_KIND))
            .map(|r| r.sequence_id)
            .collect();
        lost.sort_unstable();
        assert_eq!(lost, vec![1, 3, 4]);
    }
}
