use std::error::Error as StdError;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use tracing::{error, info, warn};

use crate::error::IngestError;

use super::registry::SourceKind;

/// Severity classification used for observer callbacks and alerting thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IngestionSeverity {
    /// Informational event.
    Info,
    /// Warning-level event (non-fatal).
    Warning,
    /// Error-level event (the job failed).
    Error,
    /// Critical error (unreachable sources, I/O failures).
    Critical,
}

/// Context about one job attempt.
#[derive(Debug, Clone)]
pub struct IngestionContext {
    /// Resolved kind, when the job got far enough to resolve one.
    pub kind: Option<SourceKind>,
    /// Human-readable job identity (kind + path or dataset).
    pub source: String,
    /// Explicit dataset name, if declared.
    pub dataset: Option<String>,
}

/// Stats reported on a successful job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestionStats {
    /// Snapshots forwarded to the catalog.
    pub snapshots: usize,
    /// Fields across all emitted snapshots.
    pub fields: usize,
    /// Directory items that failed while the job as a whole succeeded.
    pub items_failed: usize,
}

/// Observer interface for job outcomes.
///
/// Implementors can record metrics, logs, or trigger alerts.
pub trait IngestionObserver: Send + Sync {
    /// Called when a job succeeds.
    fn on_success(&self, _ctx: &IngestionContext, _stats: IngestionStats) {}

    /// Called when a job fails.
    fn on_failure(&self, _ctx: &IngestionContext, _severity: IngestionSeverity, _error: &IngestError) {}

    /// Called when a failure meets the alert threshold.
    ///
    /// Default behavior forwards to [`Self::on_failure`].
    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestError) {
        self.on_failure(ctx, severity, error)
    }
}

/// Classify an error for observer callbacks.
///
/// Unreachable sources and I/O failures are `Critical`; bad job descriptions are `Warning`;
/// everything else is `Error`.
pub fn severity_for_error(e: &IngestError) -> IngestionSeverity {
    match e {
        IngestError::Io(_) | IngestError::SourceUnavailable { .. } => IngestionSeverity::Critical,
        IngestError::Parquet(err) => {
            if error_chain_contains_io(err) {
                IngestionSeverity::Critical
            } else {
                IngestionSeverity::Error
            }
        }
        IngestError::Csv(err) => match err.kind() {
            ::csv::ErrorKind::Io(_) => IngestionSeverity::Critical,
            _ => IngestionSeverity::Error,
        },
        IngestError::Config { .. } | IngestError::UnsupportedKind { .. } => {
            IngestionSeverity::Warning
        }
        IngestError::BatchFailed { last, .. } => severity_for_error(last),
        IngestError::Json(_)
        | IngestError::Avro { .. }
        | IngestError::Partition { .. }
        | IngestError::DocumentDb { .. }
        | IngestError::ObjectStore { .. }
        | IngestError::Catalog { .. } => IngestionSeverity::Error,
    }
}

fn error_chain_contains_io(e: &(dyn StdError + 'static)) -> bool {
    let mut cur: Option<&(dyn StdError + 'static)> = Some(e);
    while let Some(err) = cur {
        if err.is::<std::io::Error>() {
            return true;
        }
        cur = err.source();
    }
    false
}

/// An observer that fans out callbacks to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn IngestionObserver>>,
}

impl CompositeObserver {
    pub fn new(observers: Vec<Arc<dyn IngestionObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl IngestionObserver for CompositeObserver {
    fn on_success(&self, ctx: &IngestionContext, stats: IngestionStats) {
        for o in &self.observers {
            o.on_success(ctx, stats);
        }
    }

    fn on_failure(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestError) {
        for o in &self.observers {
            o.on_failure(ctx, severity, error);
        }
    }

    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestError) {
        for o in &self.observers {
            o.on_alert(ctx, severity, error);
        }
    }
}

/// Reports job outcomes as `tracing` events, one event per failed job.
///
/// Failures at or above `alert_at_or_above` are logged by `on_alert` at error level and
/// skipped by `on_failure`. Use the same threshold as the orchestrator.
#[derive(Debug)]
pub struct TracingObserver {
    alert_at_or_above: IngestionSeverity,
}

impl TracingObserver {
    pub fn new(alert_at_or_above: IngestionSeverity) -> Self {
        Self { alert_at_or_above }
    }
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self::new(IngestionSeverity::Critical)
    }
}

impl IngestionObserver for TracingObserver {
    fn on_success(&self, ctx: &IngestionContext, stats: IngestionStats) {
        info!(
            source = %ctx.source,
            dataset = ctx.dataset.as_deref(),
            snapshots = stats.snapshots,
            fields = stats.fields,
            items_failed = stats.items_failed,
            "job succeeded"
        );
    }

    fn on_failure(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestError) {
        if severity >= self.alert_at_or_above {
            return;
        }
        warn!(source = %ctx.source, ?severity, error = %error, "job failed");
    }

    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestError) {
        error!(source = %ctx.source, ?severity, error = %error, alert = true, "job failed");
    }
}

/// Appends job events to a local log file.
#[derive(Debug)]
pub struct FileObserver {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileObserver {
    /// Create a file observer that appends events to `path`.
    ///
    /// Writes are best-effort; failures to open/write the log file are ignored.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn append_line(&self, line: &str) {
        let _guard = self.lock.lock().ok();
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(f, "{line}");
        }
    }
}

impl IngestionObserver for FileObserver {
    fn on_success(&self, ctx: &IngestionContext, stats: IngestionStats) {
        self.append_line(&format!(
            "{} ok source={} snapshots={} fields={} items_failed={}",
            timestamp(),
            ctx.source,
            stats.snapshots,
            stats.fields,
            stats.items_failed
        ));
    }

    fn on_failure(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestError) {
        self.append_line(&format!(
            "{} fail severity={:?} source={} err={}",
            timestamp(),
            severity,
            ctx.source,
            error
        ));
    }

    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestError) {
        self.append_line(&format!(
            "{} ALERT severity={:?} source={} err={}",
            timestamp(),
            severity,
            ctx.source,
            error
        ));
    }
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
