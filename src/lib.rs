//! Volley runs an async action many times, on a schedule, and measures how it went.
//!
//! You hand Volley a [`Scenario`] (an action plus the arguments it is called with)
//! and say how many times to call it and over how long. Volley paces the calls,
//! bounds how many run at once, records every outcome, and boils the lot down into
//! an [`ExecutionSummary`]: success rate, throughput, average latency and an error
//! breakdown.
//!
//! # Architecture
//!
//! - [`Scenario`]: the action and its arguments.
//! - [`duration`]: parses expressions like `"30s"`, `"5m"` or `"1.5h"`.
//! - [`task::execute`]: one invocation. Errors *and* panics become a
//!   [`task::Outcome::Failure`]; nothing escapes to the scheduler.
//! - [`PacedExecutor`]: the scheduler. Spreads `total_count` submissions over a
//!   window (or bursts them when the window is tiny) into a fixed pool of workers.
//! - [`StageExecutor`]: a sequence of paced runs with a pause in between, one summary
//!   per stage.
//! - [`Tally`] and [`summary::summarize`]: reduce raw results into statistics.
//! - [`Observer`]: progress checkpoints; [`Reporter`]: final output.
//! - [`Runner`]: the `distribute` / `burst` / `progressive` shortcuts.
//!
//! # Example
//!
//! ```rust,no_run
//! use volley::{Runner, Scenario, Stage};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> volley::Result<()> {
//!     volley::logging::init();
//!
//!     // Heavy things (clients, pools) go in the args, never inside the action.
//!     let scenario = Scenario::builder()
//!         .name("checkout")
//!         .args(String::from("cart-42"))
//!         .action(|cart: String| async move {
//!             tokio::time::sleep(Duration::from_millis(20)).await;
//!             Ok::<_, std::io::Error>(cart.len())
//!         })
//!         .build();
//!
//!     let runner = Runner::default();
//!     let summary = runner.distribute("30s", 300, &scenario, None).await?;
//!     println!("{:.1}% ok", summary.success_rate);
//!
//!     let stages = vec![Stage::new(20, "10s"), Stage::new(50, "10s")];
//!     let summaries = runner
//!         .progressive(stages, &scenario, Some(8), Duration::from_secs(3))
//!         .await?;
//!     assert_eq!(summaries.len(), 2);
//!     Ok(())
//! }
//! ```
//!
//! # Feature flags
//! - `internals`: expose the scheduler's worker pool and submission helpers
//!   (unstable API).

pub mod aggregate;
pub mod duration;
pub mod error;
/// Schedulers that decide when and how concurrently the action runs
pub mod executor;
pub mod logging;
/// Progress checkpoints
pub mod observer;
/// Final output of a run
pub mod report;
pub mod runner;
pub mod scenario;
pub mod summary;
/// A single invocation and its outcome
pub mod task;

pub use aggregate::Tally;
pub use duration::DurationExpr;
pub use error::{Error, Result, SchedulerFailure};
pub use executor::{
    ExecutionConfig, ExecutionPlan, PacedExecutor, RunReport, Stage, StageExecutor, StagePlan,
};
pub use observer::{NoopObserver, Observer, Progress, TracingObserver};
pub use report::{JsonReporter, Reporter, StdoutReporter};
pub use runner::Runner;
pub use scenario::Scenario;
pub use summary::{ExecutionSummary, RunStatus};
pub use task::{ErrorDescriptor, Outcome, TaskResult};
