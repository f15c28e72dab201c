//! A single invocation of the user's action and its recorded outcome.

use std::{
    any::Any,
    fmt::{self, Display},
    future::Future,
    panic::{self, AssertUnwindSafe},
    time::Duration,
};

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Kind recorded when the action panicked instead of returning an error.
pub const PANIC_KIND: &str = "panic";
/// Kind recorded for a submitted task whose worker went away before reporting.
pub const WORKER_LOST_KIND: &str = "WorkerLost";

/// Structured description of why one invocation failed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    /// Short type name of the error (`"ParseIntError"`, `"panic"`, ...).
    pub kind: String,
    pub message: String,
}

impl ErrorDescriptor {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Describe an error returned by the action, using the error's type name as kind.
    ///
    /// Types named plain `Error` keep their crate or module (`io::Error`,
    /// `reqwest::Error`), and `Box<E>` is reported as `E`.
    pub fn from_error<E: Display>(err: &E) -> Self {
        Self::new(short_type_name::<E>(), err.to_string())
    }

    fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::new(PANIC_KIND, message)
    }
}

impl Display for ErrorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// `Outcome::Success` carries the action's return value untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome<T> {
    Success(T),
    Failure(ErrorDescriptor),
}

/// The record of one invocation. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult<T> {
    /// 1-based, assigned at submission and unique within a run.
    pub sequence_id: u64,
    pub outcome: Outcome<T>,
    /// Wall-clock time spent inside the action.
    pub duration: Duration,
    pub completed_at: DateTime<Utc>,
}

impl<T> TaskResult<T> {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success(_))
    }

    pub fn payload(&self) -> Option<&T> {
        match &self.outcome {
            Outcome::Success(payload) => Some(payload),
            Outcome::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorDescriptor> {
        match &self.outcome {
            Outcome::Success(_) => None,
            Outcome::Failure(err) => Some(err),
        }
    }

    /// Placeholder for a task that was submitted but never reported back.
    pub(crate) fn lost(sequence_id: u64, reason: impl Into<String>) -> Self {
        Self {
            sequence_id,
            outcome: Outcome::Failure(ErrorDescriptor::new(WORKER_LOST_KIND, reason)),
            duration: Duration::ZERO,
            completed_at: Utc::now(),
        }
    }
}

/// Run `action(args)` once and record how it went.
///
/// Whatever the action does (return `Ok`, return `Err`, or panic while building or
/// polling its future) the caller gets a [`TaskResult`] back.
///
/// Caught panics still go through the process panic hook, which prints to stderr
/// (with a backtrace when `RUST_BACKTRACE` is set) once per panicking invocation.
/// Install a quieter hook with [`std::panic::set_hook`] before a large run if the
/// action is expected to panic.
pub async fn execute<Args, F, Fut, T, E>(sequence_id: u64, action: &F, args: Args) -> TaskResult<T>
where
    F: Fn(Args) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let start = Instant::now();
    let outcome = match panic::catch_unwind(AssertUnwindSafe(|| action(args))) {
        Ok(fut) => match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(Ok(payload)) => Outcome::Success(payload),
            Ok(Err(err)) => Outcome::Failure(ErrorDescriptor::from_error(&err)),
            Err(payload) => Outcome::Failure(ErrorDescriptor::from_panic(payload)),
        },
        Err(payload) => Outcome::Failure(ErrorDescriptor::from_panic(payload)),
    };

    TaskResult {
        sequence_id,
        outcome,
        duration: start.elapsed(),
        completed_at: Utc::now(),
    }
}

const WRAPPERS: [&str; 2] = ["Box", "Arc"];

fn short_type_name<E>() -> String {
    kind_of(std::any::type_name::<E>())
}

/// - `my_crate::errors::Boom<u8>` -> `Boom`
/// - `std::io::error::Error` -> `io::Error`
/// - `alloc::boxed::Box<dyn core::error::Error + Send>` -> `dyn Error`
fn kind_of(full: &str) -> String {
    let full = full.trim();
    if let Some(object) = full.strip_prefix("dyn ") {
        let principal = object.split(" + ").next().unwrap_or(object);
        return format!("dyn {}", last_segment(principal));
    }

    let (path, args) = match full.split_once('<') {
        Some((path, rest)) => (path, rest.strip_suffix('>')),
        None => (full, None),
    };
    match args {
        Some(inner) if WRAPPERS.contains(&last_segment(path)) => kind_of(inner),
        _ => qualified(path),
    }
}

fn last_segment(path: &str) -> &str {
    path.rsplit("::").next().unwrap_or(path)
}

/// Bare `Error` is qualified with the nearest module that is not itself named
/// `error`/`errors`.
fn qualified(path: &str) -> String {
    let mut segments = path.rsplit("::");
    let name = segments.next().unwrap_or(path);
    if name != "Error" {
        return name.to_string();
    }
    match segments.find(|s| !matches!(*s, "error" | "errors")) {
        Some(module) => format!("{module}::{name}"),
        None => name.to_string(),
    }
}
