use std::{fmt::Display, future::Future, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use super::{DEFAULT_PROGRESS_EVERY, ExecutionConfig, PacedExecutor};
use crate::{
    duration::DurationExpr,
    error::Result,
    observer::{Observer, TracingObserver},
    scenario::Scenario,
    summary::ExecutionSummary,
};

/// Default pause between two consecutive stages.
pub const DEFAULT_STAGE_PAUSE: Duration = Duration::from_secs(3);

/// One phase of a staged run: `count` invocations spread over `duration`.
///
/// `duration` is kept as written (`"30s"`, `"2m"`) and only parsed when the run
/// starts. Use `Stage::new(50, "30s")` for 50 invocations over 30 seconds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub count: u64,
    pub duration: String,
}

impl Stage {
    pub fn new(count: u64, duration: impl Into<String>) -> Self {
        Self {
            count,
            duration: duration.into(),
        }
    }
}

impl From<(u64, &str)> for Stage {
    fn from((count, duration): (u64, &str)) -> Self {
        Self::new(count, duration)
    }
}

/// A staged run as it appears in a config file.
///
/// ```json
/// {
///   "stages": [{ "count": 20, "duration": "30s" }, { "count": 50, "duration": "30s" }],
///   "concurrency_limit": 8,
///   "stage_pause": "5s"
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StagePlan {
    pub stages: Vec<Stage>,
    #[serde(default)]
    pub concurrency_limit: Option<usize>,
    /// Pause between stages, `"0s"` disables it.
    #[serde(default)]
    pub stage_pause: Option<DurationExpr>,
}

impl StagePlan {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Runs [`Stage`]s one after another, each through its own [`PacedExecutor`].
///
/// Stages never overlap: stage `i + 1` starts submitting only after stage `i` has
/// drained and the pause has elapsed. Every stage expression is parsed before the
/// first stage starts, so a typo in the last stage costs nothing.
#[derive(Clone, TypedBuilder)]
pub struct StageExecutor {
    /// The ordered stages to run.
    pub stages: Vec<Stage>,
    /// Worker pool size for every stage. `None` derives it from each stage's count.
    #[builder(default, setter(into))]
    pub concurrency_limit: Option<usize>,
    /// Pause between stages; zero disables it.
    #[builder(default = DEFAULT_STAGE_PAUSE)]
    pub stage_pause: Duration,
    #[builder(default = DEFAULT_PROGRESS_EVERY)]
    pub progress_every: u64,
    #[builder(default = Arc::new(TracingObserver) as Arc<dyn Observer>)]
    pub observer: Arc<dyn Observer>,
}

impl StageExecutor {
    pub fn from_plan(plan: StagePlan) -> Self {
        Self::builder()
            .stages(plan.stages)
            .concurrency_limit(plan.concurrency_limit)
            .stage_pause(
                plan.stage_pause
                    .map_or(DEFAULT_STAGE_PAUSE, |pause| pause.as_duration()),
            )
            .build()
    }

    /// Run every stage in order and return one summary per stage, in the same order.
    ///
    /// Fails only if a stage's duration expression is malformed, and then before any
    /// task has run.
    pub async fn exec<Args, F, Fut, T, E>(
        &self,
        scenario: &Scenario<Args, F>,
    ) -> Result<Vec<ExecutionSummary<T>>>
    where
        Args: Clone + Send + 'static,
        F: Fn(Args) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Display + Send + 'static,
    {
        let windows = self
            .stages
            .iter()
            .map(|stage| stage.duration.parse::<DurationExpr>())
            .collect::<Result<Vec<_>>>()?;

        let j = self.stages.len();
        let mut summaries = Vec::with_capacity(j);
        for (i, (stage, window)) in self.stages.iter().zip(windows).enumerate() {
            tracing::info!("Starting stage: {}/{j}", i + 1);
            self.observer.on_stage_start(i + 1, j, stage);

            let executor = PacedExecutor::builder()
                .config(
                    ExecutionConfig::builder()
                        .total_count(stage.count)
                        .target_duration(window.as_duration())
                        .concurrency_limit(self.concurrency_limit)
                        .progress_every(self.progress_every)
                        .build(),
                )
                .observer(self.observer.clone())
                .build();
            let summary = ExecutionSummary::from(executor.exec(scenario).await);
            if !summary.is_completed() {
                tracing::warn!("Stage {}/{j} did not complete: {:?}", i + 1, summary.status);
            }
            summaries.push(summary);
            tracing::info!("Finishing stage: {}/{j}", i + 1);

            if i + 1 < j && !self.stage_pause.is_zero() {
                self.observer.on_stage_pause(self.stage_pause);
                tokio::time::sleep(self.stage_pause).await;
            }
        }

        Ok(summaries)
    }
}
