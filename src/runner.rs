use std::{fmt::Display, future::Future, sync::Arc, time::Duration};

use crate::{
    duration,
    error::Result,
    executor::{ExecutionConfig, PacedExecutor, Stage, StageExecutor},
    observer::{NoopObserver, Observer, TracingObserver},
    scenario::Scenario,
    summary::ExecutionSummary,
};

/// Default pool size for [`Runner::burst`].
pub const DEFAULT_BURST_WORKERS: usize = 10;

/// Entry point bundling the three run shapes: distribute, burst and progressive.
///
/// A `Runner` only carries the observer; every call builds and tears down its own
/// executor, so one runner can be reused freely.
///
/// A panicking action is recorded as a `"panic"` failure, but the panic hook still
/// prints to stderr once per invocation. Swap it with [`std::panic::set_hook`]
/// before a run against an action known to panic.
#[derive(Clone)]
pub struct Runner {
    observer: Arc<dyn Observer>,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Runner {
    /// `verbose` selects between [`TracingObserver`] and [`NoopObserver`].
    pub fn new(verbose: bool) -> Self {
        let observer: Arc<dyn Observer> = if verbose {
            Arc::new(TracingObserver)
        } else {
            Arc::new(NoopObserver)
        };
        Self { observer }
    }

    pub fn with_observer(observer: Arc<dyn Observer>) -> Self {
        Self { observer }
    }

    /// Run `config.total_count` invocations as configured.
    pub async fn run<Args, F, Fut, T, E>(
        &self,
        config: ExecutionConfig,
        scenario: &Scenario<Args, F>,
    ) -> ExecutionSummary<T>
    where
        Args: Clone + Send + 'static,
        F: Fn(Args) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Display + Send + 'static,
    {
        let executor = PacedExecutor::builder()
            .config(config)
            .observer(self.observer.clone())
            .build();
        ExecutionSummary::from(executor.exec(scenario).await)
    }

    /// Spread `count` invocations over `duration` (`"1h"`, `"30m"`, `"45s"`).
    ///
    /// With `concurrency_limit = None` the pool size is `clamp(count / 5, 1, 20)`.
    pub async fn distribute<Args, F, Fut, T, E>(
        &self,
        duration: &str,
        count: u64,
        scenario: &Scenario<Args, F>,
        concurrency_limit: Option<usize>,
    ) -> Result<ExecutionSummary<T>>
    where
        Args: Clone + Send + 'static,
        F: Fn(Args) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Display + Send + 'static,
    {
        let target_duration = duration::parse(duration)?;
        let config = ExecutionConfig::builder()
            .total_count(count)
            .target_duration(target_duration)
            .concurrency_limit(concurrency_limit)
            .build();
        Ok(self.run(config, scenario).await)
    }

    /// Submit all `count` invocations at once; the pool (default
    /// [`DEFAULT_BURST_WORKERS`]) is the only throttle.
    pub async fn burst<Args, F, Fut, T, E>(
        &self,
        count: u64,
        scenario: &Scenario<Args, F>,
        concurrency_limit: Option<usize>,
    ) -> ExecutionSummary<T>
    where
        Args: Clone + Send + 'static,
        F: Fn(Args) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Display + Send + 'static,
    {
        let config = ExecutionConfig::builder()
            .total_count(count)
            .target_duration(Duration::ZERO)
            .concurrency_limit(concurrency_limit.unwrap_or(DEFAULT_BURST_WORKERS))
            .build();
        self.run(config, scenario).await
    }

    /// Run `stages` one after another with `stage_pause` in between.
    pub async fn progressive<Args, F, Fut, T, E>(
        &self,
        stages: Vec<Stage>,
        scenario: &Scenario<Args, F>,
        concurrency_limit: Option<usize>,
        stage_pause: Duration,
    ) -> Result<Vec<ExecutionSummary<T>>>
    where
        Args: Clone + Send + 'static,
        F: Fn(Args) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Display + Send + 'static,
    {
        StageExecutor::builder()
            .stages(stages)
            .concurrency_limit(concurrency_limit)
            .stage_pause(stage_pause)
            .observer(self.observer.clone())
            .build()
            .exec(scenario)
            .await
    }
}
