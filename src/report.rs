use std::{
    fmt::Write as _,
    future::Future,
    io::{self, Write},
};

use serde::Serialize;

use crate::{error::Result, summary::ExecutionSummary};

/// A [`Reporter`] takes a finished [`ExecutionSummary`] and sends it somewhere:
/// stdout, a file, a metrics backend.
///
/// Reporters are the I/O boundary of the crate. Executors and summaries stay free of
/// side effects; presentation lives here.
///
/// # Example
/// ```rust
/// use volley::{Reporter, summary::ExecutionSummary};
///
/// struct CountReporter;
///
/// impl<T> Reporter<T> for CountReporter {
///     async fn report(&self, summary: &ExecutionSummary<T>) -> volley::Result<()> {
///         println!("{} requests", summary.total_requests);
///         Ok(())
///     }
/// }
/// ```
pub trait Reporter<T> {
    fn report(&self, summary: &ExecutionSummary<T>) -> impl Future<Output = Result<()>>;
}

/// Prints the human-readable summary block.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutReporter;

impl<T> Reporter<T> for StdoutReporter {
    async fn report(&self, summary: &ExecutionSummary<T>) -> Result<()> {
        let mut out = io::stdout().lock();
        out.write_all(render_text(summary).as_bytes())?;
        out.flush()?;
        Ok(())
    }
}

/// Prints the summary, payloads included, as one JSON document.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonReporter {
    pub pretty: bool,
}

impl<T: Serialize> Reporter<T> for JsonReporter {
    async fn report(&self, summary: &ExecutionSummary<T>) -> Result<()> {
        let json = if self.pretty {
            serde_json::to_string_pretty(summary)?
        } else {
            serde_json::to_string(summary)?
        };
        let mut out = io::stdout().lock();
        writeln!(out, "{json}")?;
        Ok(())
    }
}

/// Format a summary the way [`StdoutReporter`] prints it.
pub fn render_text<T>(summary: &ExecutionSummary<T>) -> String {
    let secs = summary.total_duration.as_secs_f64();
    let mut s = String::new();

    // Writing into a String cannot fail.
    let _ = writeln!(s, "===== Execution Results Summary =====");
    let _ = writeln!(s, "Total execution time: {secs:.2}s ({:.2}h)", secs / 3600.0);
    let _ = writeln!(s, "Total executions: {}", summary.total_requests);
    let _ = writeln!(
        s,
        "Successful executions: {} ({:.1}%)",
        summary.successful_requests, summary.success_rate
    );
    let _ = writeln!(s, "Failed executions: {}", summary.failed_requests);
    let _ = writeln!(
        s,
        "Average response time: {:.3}s",
        summary.average_response_time.as_secs_f64()
    );
    let _ = writeln!(
        s,
        "Average execution rate: {:.2} executions/sec",
        summary.requests_per_second
    );
    if let crate::summary::RunStatus::Aborted { reason } = &summary.status {
        let _ = writeln!(s, "Run aborted: {reason}");
    }

    let errors = summary.error_breakdown();
    if !errors.is_empty() {
        let _ = writeln!(s, "\n===== Error Details =====");
        for (kind, count) in errors {
            let _ = writeln!(s, "{kind}: {count} occurrences");
        }
    }
    s
}
