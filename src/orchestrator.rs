//! Job orchestration: validate → normalize → resolve path → extract → build → submit.
//!
//! A batch runs its jobs strictly in order. A failing job (or a failing file inside a directory
//! job) is recorded and the loop moves on; the batch call itself only fails when every job
//! failed.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use glob::{MatchOptions, Pattern};
use tracing::{debug, info, info_span, warn};
use walkdir::WalkDir;

use crate::catalog::CatalogCache;
use crate::config::{SinkDescriptor, SourceDescriptor};
use crate::error::{IngestError, IngestResult};
use crate::ingestion::csv::delimiter_byte;
use crate::ingestion::document::DocumentTarget;
use crate::ingestion::observability::{
    severity_for_error, IngestionContext, IngestionObserver, IngestionSeverity, IngestionStats,
};
use crate::ingestion::registry::{resolve_kind, ExtractorRegistry, SourceKind};
use crate::ingestion::ObjectLocation;
use crate::partition::{self, ResolvedPartition};
use crate::types::{DatasetSnapshot, Extraction};

/// Where a job is in its lifecycle. `Failed` is reachable from every other state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Received,
    Validated,
    Normalized,
    PathResolved,
    Extracted,
    Built,
    Submitted,
    Done,
    Failed,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Received => "received",
            Self::Validated => "validated",
            Self::Normalized => "normalized",
            Self::PathResolved => "path-resolved",
            Self::Extracted => "extracted",
            Self::Built => "built",
            Self::Submitted => "submitted",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Run-wide settings.
#[derive(Clone)]
pub struct OrchestratorOptions {
    /// Timestamp partition templates are resolved against. `None` disables partitioning.
    pub run_timestamp: Option<DateTime<Utc>>,
    /// Optional observer for per-job outcomes.
    pub observer: Option<Arc<dyn IngestionObserver>>,
    /// Severity threshold at which `on_alert` is invoked.
    pub alert_at_or_above: IngestionSeverity,
}

impl fmt::Debug for OrchestratorOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrchestratorOptions")
            .field("run_timestamp", &self.run_timestamp)
            .field("observer_set", &self.observer.is_some())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            run_timestamp: None,
            observer: None,
            alert_at_or_above: IngestionSeverity::Critical,
        }
    }
}

/// What a job's path resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathTarget {
    /// A single local file.
    File,
    /// A local directory whose matching files are ingested one by one.
    Directory,
    /// A `scheme://bucket/prefix` location.
    ObjectStore,
    /// Document-db jobs have no path.
    Database,
}

/// Result of [`resolve_effective_path`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectivePath {
    pub target: PathTarget,
    /// `partition.path` is the effective path.
    pub partition: ResolvedPartition,
}

impl EffectivePath {
    pub fn path(&self) -> &str {
        &self.partition.path
    }
}

/// One file inside a directory job that failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub path: String,
    pub error: String,
}

/// What a successful job produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobOutcome {
    /// URNs of emitted snapshots, in emission order.
    pub snapshots: Vec<String>,
    /// Total fields across emitted snapshots.
    pub fields: usize,
    /// Files considered by a directory job (0 for other jobs).
    pub items_attempted: usize,
    pub item_failures: Vec<ItemFailure>,
}

impl JobOutcome {
    fn stats(&self) -> IngestionStats {
        IngestionStats {
            snapshots: self.snapshots.len(),
            fields: self.fields,
            items_failed: self.item_failures.len(),
        }
    }

    fn absorb(&mut self, other: JobOutcome) {
        self.snapshots.extend(other.snapshots);
        self.fields += other.fields;
    }
}

/// One job's entry in a [`BatchReport`].
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult {
    pub source: SourceDescriptor,
    pub success: bool,
    pub error: Option<String>,
    /// State the job was in when it failed.
    pub failed_at: Option<JobState>,
    pub snapshots_emitted: usize,
    pub items_attempted: usize,
    pub items_failed: usize,
}

/// Per-job results of a batch, in input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub results: Vec<BatchResult>,
}

impl BatchReport {
    pub fn attempted(&self) -> usize {
        self.results.len()
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failed(&self) -> usize {
        self.attempted() - self.succeeded()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &BatchResult> {
        self.results.iter().filter(|r| !r.success)
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "batch finished: {} attempted, {} succeeded, {} failed",
            self.attempted(),
            self.succeeded(),
            self.failed()
        )?;
        for r in &self.results {
            if r.success && r.items_failed > 0 {
                writeln!(
                    f,
                    "  partial: {} ({} of {} files failed)",
                    r.source.label(),
                    r.items_failed,
                    r.items_attempted
                )?;
            }
        }
        for r in self.failures() {
            let state = r.failed_at.map(|s| s.to_string()).unwrap_or_default();
            writeln!(
                f,
                "  failed [{state}]: {}: {}",
                r.source.label(),
                r.error.as_deref().unwrap_or("unknown error")
            )?;
        }
        Ok(())
    }
}

/// Check a job description before any I/O. Returns the resolved kind.
///
/// A `delimiter` on a non-delimited kind is ignored (logged at debug level).
pub fn validate(source: &SourceDescriptor) -> IngestResult<SourceKind> {
    let kind = resolve_kind(source)?;

    match (kind, source.delimiter.as_deref()) {
        (SourceKind::DelimitedFile, Some(d)) => {
            delimiter_byte(Some(d))?;
        }
        (other, Some(d)) => {
            debug!(kind = %other, delimiter = d, "delimiter ignored for this kind");
        }
        _ => {}
    }

    match kind {
        SourceKind::DelimitedFile | SourceKind::BinaryFile | SourceKind::ColumnarFile => {
            if source.source_location().is_none() {
                return Err(IngestError::config(
                    "path",
                    format!("{kind} jobs need a 'path' (or legacy 'source_path')"),
                ));
            }
        }
        SourceKind::ObjectStore => {
            let location = source.source_location().ok_or_else(|| {
                IngestError::config("path", "object-store jobs need a 'path' like s3://bucket/prefix")
            })?;
            ObjectLocation::parse(location)?;
        }
        SourceKind::DocumentDb => {
            DocumentTarget::from_descriptor(source)?;
        }
    }

    if let Some(template) = source.partitioning_format.as_deref() {
        partition::validate_template(template)?;
    }
    source.explicit_schema()?;
    Ok(kind)
}

/// Canonical form of a descriptor (legacy names folded in, both spellings kept). Idempotent.
pub fn normalize(source: &SourceDescriptor) -> SourceDescriptor {
    source.normalized()
}

/// Decide where a job reads from.
///
/// The partition template is applied to the declared path. When the result is an existing
/// directory the job iterates it; `file_name` narrows a directory down to one file.
pub fn resolve_effective_path(
    source: &SourceDescriptor,
    run_timestamp: Option<DateTime<Utc>>,
) -> IngestResult<EffectivePath> {
    let kind = resolve_kind(source)?;
    let template = source.partitioning_format.as_deref();

    if kind == SourceKind::DocumentDb {
        return Ok(EffectivePath {
            target: PathTarget::Database,
            partition: partition::resolve("", None, None)?,
        });
    }

    let base = source
        .source_location()
        .ok_or_else(|| IngestError::config("path", "missing required field 'path'"))?;
    let partition = partition::resolve(base, template, run_timestamp)?;

    if kind == SourceKind::ObjectStore {
        return Ok(EffectivePath {
            target: PathTarget::ObjectStore,
            partition,
        });
    }

    let resolved = Path::new(&partition.path);
    if !resolved.is_dir() {
        return Ok(EffectivePath {
            target: PathTarget::File,
            partition,
        });
    }

    match source.file_name.as_deref().filter(|f| !f.trim().is_empty()) {
        Some(file_name) => {
            let path = resolved.join(file_name.trim()).to_string_lossy().into_owned();
            Ok(EffectivePath {
                target: PathTarget::File,
                partition: ResolvedPartition { path, ..partition },
            })
        }
        None => Ok(EffectivePath {
            target: PathTarget::Directory,
            partition,
        }),
    }
}

/// Lazy, finite sequence of per-file job descriptors for one directory.
///
/// Lists regular files directly inside the directory (no recursion) whose extension matches
/// the job kind, case-insensitively, in file-name order. The listing happens on the first call
/// to `next`; [`DirectoryJobs::restart`] yields a fresh sequence.
#[derive(Debug, Clone)]
pub struct DirectoryJobs {
    template: SourceDescriptor,
    dir: PathBuf,
    patterns: Vec<Pattern>,
    pending: Option<std::vec::IntoIter<Result<PathBuf, String>>>,
}

impl DirectoryJobs {
    pub fn new(template: &SourceDescriptor, dir: impl AsRef<Path>, kind: SourceKind) -> IngestResult<Self> {
        let patterns = kind
            .file_extensions()
            .iter()
            .map(|ext| {
                Pattern::new(&format!("*.{ext}")).map_err(|e| {
                    IngestError::config("kind", format!("bad extension pattern for {kind}: {e}"))
                })
            })
            .collect::<IngestResult<Vec<_>>>()?;
        Ok(Self {
            template: template.clone(),
            dir: dir.as_ref().to_path_buf(),
            patterns,
            pending: None,
        })
    }

    /// A new sequence over the same directory, starting from the beginning.
    pub fn restart(&self) -> Self {
        Self {
            pending: None,
            ..self.clone()
        }
    }

    fn matches(&self, file_name: &str) -> bool {
        let opts = MatchOptions {
            case_sensitive: false,
            ..MatchOptions::new()
        };
        self.patterns.iter().any(|p| p.matches_with(file_name, opts))
    }

    fn list(&self) -> Vec<Result<PathBuf, String>> {
        WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => {
                    let keep = entry.file_type().is_file()
                        && self.matches(&entry.file_name().to_string_lossy());
                    keep.then(|| Ok(entry.into_path()))
                }
                Err(e) => Some(Err(e.to_string())),
            })
            .collect()
    }

    fn descriptor_for(&self, path: &Path) -> SourceDescriptor {
        let location = path.to_string_lossy().into_owned();
        let mut item = self.template.clone();
        item.path = Some(location.clone());
        item.source_path = Some(location);
        item.file_name = None;
        item.dataset_name = path.file_stem().map(|s| s.to_string_lossy().into_owned());
        item
    }
}

impl Iterator for DirectoryJobs {
    type Item = IngestResult<SourceDescriptor>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pending.is_none() {
            self.pending = Some(self.list().into_iter());
        }
        let next = self.pending.as_mut()?.next()?;
        Some(match next {
            Ok(path) => Ok(self.descriptor_for(&path)),
            Err(message) => Err(IngestError::unavailable(self.dir.display().to_string(), message)),
        })
    }
}

/// Runs jobs against a registry and a caller-owned catalog cache.
pub struct Orchestrator {
    registry: ExtractorRegistry,
    catalogs: CatalogCache,
    options: OrchestratorOptions,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("registry", &self.registry)
            .field("catalogs", &self.catalogs)
            .field("options", &self.options)
            .finish()
    }
}

impl Orchestrator {
    pub fn new(catalogs: CatalogCache) -> Self {
        Self {
            registry: ExtractorRegistry::default(),
            catalogs,
            options: OrchestratorOptions::default(),
        }
    }

    pub fn with_registry(mut self, registry: ExtractorRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_options(mut self, options: OrchestratorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    pub fn catalogs(&self) -> &CatalogCache {
        &self.catalogs
    }

    /// Ingest one resolved, non-directory source and submit its snapshot(s).
    ///
    /// `source.path` must already be the effective path. `partition` adds the partition
    /// properties when a template was applied.
    pub fn run_single(
        &self,
        source: &SourceDescriptor,
        sink: &SinkDescriptor,
        partition: Option<&ResolvedPartition>,
    ) -> IngestResult<JobOutcome> {
        let mut state = JobState::PathResolved;
        self.extract_and_submit(source, sink, partition, &mut state)
    }

    /// Ingest every matching file of `dir`, one at a time.
    ///
    /// A failing file is logged and skipped. Zero matching files is a warning, not an error.
    /// The job fails only when every matching file failed.
    pub fn run_directory(
        &self,
        source: &SourceDescriptor,
        sink: &SinkDescriptor,
        dir: &Path,
        partition: Option<&ResolvedPartition>,
    ) -> IngestResult<JobOutcome> {
        let kind = resolve_kind(source)?;
        let mut outcome = JobOutcome::default();
        let mut last_error = None;

        for item in DirectoryJobs::new(source, dir, kind)? {
            outcome.items_attempted += 1;
            let (file, result) = match item {
                Ok(item) => {
                    let file = item.source_location().unwrap_or_default().to_string();
                    let mut state = JobState::PathResolved;
                    (file, self.extract_and_submit(&item, sink, partition, &mut state))
                }
                Err(e) => (dir.display().to_string(), Err(e)),
            };
            match result {
                Ok(item_outcome) => outcome.absorb(item_outcome),
                Err(e) => {
                    warn!(file = %file, error = %e, "file failed; continuing with next file");
                    outcome.item_failures.push(ItemFailure {
                        path: file,
                        error: e.to_string(),
                    });
                    last_error = Some(e);
                }
            }
        }

        if outcome.items_attempted == 0 {
            warn!(
                dir = %dir.display(),
                kind = %kind,
                extensions = ?kind.file_extensions(),
                "no matching files in directory"
            );
            return Ok(outcome);
        }
        match last_error {
            Some(last) if outcome.item_failures.len() == outcome.items_attempted => {
                Err(IngestError::BatchFailed {
                    attempted: outcome.items_attempted,
                    last: Box::new(last),
                    report: None,
                })
            }
            _ => Ok(outcome),
        }
    }

    /// List an object-store location and submit one field-less snapshot for it.
    pub fn run_object_store(
        &self,
        source: &SourceDescriptor,
        sink: &SinkDescriptor,
        partition: Option<&ResolvedPartition>,
    ) -> IngestResult<JobOutcome> {
        let kind = resolve_kind(source)?;
        if kind != SourceKind::ObjectStore {
            return Err(IngestError::config(
                "kind",
                format!("run_object_store called for a {kind} job"),
            ));
        }
        let mut state = JobState::PathResolved;
        self.extract_and_submit(source, sink, partition, &mut state)
    }

    /// Run one job end to end.
    pub fn run_job(&self, source: &SourceDescriptor, sink: &SinkDescriptor) -> IngestResult<JobOutcome> {
        let mut state = JobState::Received;
        self.run_job_tracked(source, sink, &mut state)
    }

    /// Run every job in order, continuing past failures.
    ///
    /// Returns the per-job report when at least one job succeeded. An empty batch is a
    /// configuration error; a batch where every job failed returns
    /// [`IngestError::BatchFailed`] carrying the last failure and the full report.
    pub fn run_batch(&self, sources: &[SourceDescriptor], sink: &SinkDescriptor) -> IngestResult<BatchReport> {
        if sources.is_empty() {
            return Err(IngestError::config("jobs", "batch contains no jobs"));
        }

        let mut report = BatchReport::default();
        let mut last_error = None;

        for (index, source) in sources.iter().enumerate() {
            let _span = info_span!("job", index, source = %source.label()).entered();
            let mut state = JobState::Received;
            let result = self.run_job_tracked(source, sink, &mut state);
            self.notify(source, &result);

            match result {
                Ok(outcome) => {
                    info!(
                        snapshots = outcome.snapshots.len(),
                        items_failed = outcome.item_failures.len(),
                        "job done"
                    );
                    report.results.push(BatchResult {
                        source: source.clone(),
                        success: true,
                        error: None,
                        failed_at: None,
                        snapshots_emitted: outcome.snapshots.len(),
                        items_attempted: outcome.items_attempted,
                        items_failed: outcome.item_failures.len(),
                    });
                }
                Err(e) => {
                    if self.options.observer.is_none() {
                        warn!(state = %state, error = %e, "job failed");
                    }
                    let (items_attempted, items_failed) = match &e {
                        IngestError::BatchFailed { attempted, .. } => (*attempted, *attempted),
                        _ => (0, 0),
                    };
                    report.results.push(BatchResult {
                        source: source.clone(),
                        success: false,
                        error: Some(e.to_string()),
                        failed_at: Some(state),
                        snapshots_emitted: 0,
                        items_attempted,
                        items_failed,
                    });
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(last) if report.succeeded() == 0 => Err(IngestError::BatchFailed {
                attempted: report.attempted(),
                last: Box::new(last),
                report: Some(Box::new(report)),
            }),
            _ => Ok(report),
        }
    }

    fn run_job_tracked(
        &self,
        source: &SourceDescriptor,
        sink: &SinkDescriptor,
        state: &mut JobState,
    ) -> IngestResult<JobOutcome> {
        *state = JobState::Received;
        let kind = validate(source)?;
        *state = JobState::Validated;

        let source = normalize(source);
        *state = JobState::Normalized;

        let effective = resolve_effective_path(&source, self.options.run_timestamp)?;
        *state = JobState::PathResolved;
        debug!(kind = %kind, target = ?effective.target, path = effective.path(), "resolved path");

        let partition = effective.partition.is_partitioned().then_some(&effective.partition);
        let resolved = with_path(&source, &effective);

        let outcome = match effective.target {
            PathTarget::Directory => {
                self.run_directory(&resolved, sink, Path::new(effective.path()), partition)?
            }
            PathTarget::ObjectStore => self.run_object_store(&resolved, sink, partition)?,
            PathTarget::File | PathTarget::Database => {
                self.extract_and_submit(&resolved, sink, partition, state)?
            }
        };
        *state = JobState::Done;
        Ok(outcome)
    }

    fn extract_and_submit(
        &self,
        source: &SourceDescriptor,
        sink: &SinkDescriptor,
        partition: Option<&ResolvedPartition>,
        state: &mut JobState,
    ) -> IngestResult<JobOutcome> {
        let mut extractor = self.registry.get_handler(source)?;
        let kind = extractor.kind();
        let extractions = extractor.extract(source)?;
        *state = JobState::Extracted;

        let ingested_at = Utc::now();
        let snapshots: Vec<DatasetSnapshot> = extractions
            .into_iter()
            .map(|extraction| build_snapshot(kind, source, sink, extraction, partition, ingested_at))
            .collect();
        *state = JobState::Built;

        let emitter = self.catalogs.get(kind.as_str())?;
        let mut outcome = JobOutcome::default();
        for snapshot in &snapshots {
            emitter.emit_snapshot(snapshot)?;
            debug!(urn = %snapshot.urn(), fields = snapshot.fields.len(), "snapshot submitted");
            outcome.snapshots.push(snapshot.urn());
            outcome.fields += snapshot.fields.len();
        }
        *state = JobState::Submitted;
        Ok(outcome)
    }

    fn notify(&self, source: &SourceDescriptor, result: &IngestResult<JobOutcome>) {
        let Some(observer) = self.options.observer.as_ref() else {
            return;
        };
        let ctx = IngestionContext {
            kind: source.declared_kind().and_then(SourceKind::parse),
            source: source.label(),
            dataset: source.dataset_name.clone(),
        };
        match result {
            Ok(outcome) => observer.on_success(&ctx, outcome.stats()),
            Err(e) => {
                let severity = severity_for_error(e);
                observer.on_failure(&ctx, severity, e);
                if severity >= self.options.alert_at_or_above {
                    observer.on_alert(&ctx, severity, e);
                }
            }
        }
    }
}

fn with_path(source: &SourceDescriptor, effective: &EffectivePath) -> SourceDescriptor {
    let mut out = source.clone();
    if effective.target != PathTarget::Database {
        out.path = Some(effective.path().to_string());
        out.source_path = Some(effective.path().to_string());
    }
    out
}

/// Assemble the snapshot for one extraction.
///
/// Property precedence, lowest first: job `properties`, extractor properties, then the
/// pipeline's own keys (`source_kind`, `ingested_at`, `source_path`, partition keys).
fn build_snapshot(
    kind: SourceKind,
    source: &SourceDescriptor,
    sink: &SinkDescriptor,
    extraction: Extraction,
    partition: Option<&ResolvedPartition>,
    ingested_at: DateTime<Utc>,
) -> DatasetSnapshot {
    let Extraction {
        dataset_name,
        fields,
        properties: extracted,
        raw_schema,
    } = extraction;

    let name = dataset_name
        .or_else(|| source.dataset_name.clone())
        .or_else(|| {
            source
                .source_location()
                .and_then(|p| Path::new(p).file_stem())
                .map(|s| s.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| kind.as_str().to_string());

    let mut properties = source.properties.clone().unwrap_or_default();
    properties.extend(extracted);
    properties.insert("source_kind".to_string(), kind.as_str().to_string());
    properties.insert(
        "ingested_at".to_string(),
        ingested_at.to_rfc3339_opts(SecondsFormat::Secs, true),
    );
    if let Some(path) = source.source_location() {
        properties.insert("source_path".to_string(), path.to_string());
    }
    if let Some(partition) = partition {
        properties.insert("partition_path".to_string(), partition.path.clone());
        properties.insert("partition_values".to_string(), partition.values_json());
    }
    if let Some(cron) = source.partition_cron.as_deref() {
        properties.insert("partition_cron".to_string(), cron.to_string());
    }

    DatasetSnapshot {
        platform: kind.as_str().to_string(),
        name,
        environment: sink.env_for(source).to_string(),
        fields,
        properties,
        description: source.description.clone(),
        raw_schema,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_counts_and_lists_failures() {
        let ok = BatchResult {
            source: SourceDescriptor::new("delimited-file", "a.csv"),
            success: true,
            error: None,
            failed_at: None,
            snapshots_emitted: 1,
            items_attempted: 0,
            items_failed: 0,
        };
        let failed = BatchResult {
            source: SourceDescriptor::new("delimited-file", "missing.csv"),
            success: false,
            error: Some("source unavailable".to_string()),
            failed_at: Some(JobState::PathResolved),
            ..ok.clone()
        };
        let report = BatchReport {
            results: vec![ok, failed],
        };
        assert_eq!((report.attempted(), report.succeeded(), report.failed()), (2, 1, 1));
        let text = report.to_string();
        assert!(text.contains("1 failed"));
        assert!(text.contains("missing.csv"));
        assert!(text.contains("[path-resolved]"));
    }

    #[test]
    fn snapshot_name_falls_back_to_file_stem() {
        let source = SourceDescriptor::new("delimited-file", "/data/people.csv");
        let snapshot = build_snapshot(
            SourceKind::DelimitedFile,
            &source,
            &SinkDescriptor::default(),
            Extraction::default(),
            None,
            Utc::now(),
        );
        assert_eq!(snapshot.name, "people");
        assert_eq!(snapshot.environment, "PROD");
        assert_eq!(snapshot.properties["source_kind"], "delimited-file");
        assert!(snapshot.properties.contains_key("ingested_at"));
    }
}
