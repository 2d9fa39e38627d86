use thiserror::Error;

use crate::orchestrator::BatchReport;

/// Convenience result type for ingestion operations.
pub type IngestResult<T> = Result<T, IngestError>;

/// Error type returned by the ingestion pipeline.
///
/// This is a single error enum shared across extractors, the registry, the partition resolver
/// and the orchestrator.
#[derive(Debug, Error)]
pub enum IngestError {
    /// A job description is missing a required field or carries an invalid value.
    ///
    /// Always raised before any I/O is attempted for the job.
    #[error("configuration error in '{field}': {message}")]
    Config { field: String, message: String },

    /// The declared `kind` is not one the registry knows about.
    #[error("unsupported source kind '{kind}' (supported kinds: {supported})")]
    UnsupportedKind { kind: String, supported: String },

    /// A source could not be reached (missing file, connection timeout, endpoint down).
    #[error("source unavailable '{source_name}': {message}")]
    SourceUnavailable { source_name: String, message: String },

    /// Underlying I/O error (e.g. permission denied, truncated read).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Delimited-file read error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Parquet footer/schema read error.
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// JSON encode/decode error (job files, embedded schemas, catalog payloads).
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The Avro container header or its embedded schema is malformed.
    #[error("avro error: {message}")]
    Avro { message: String },

    /// A partition template contains a token that cannot be formatted.
    #[error("invalid partition template '{template}': {message}")]
    Partition { template: String, message: String },

    /// Document-database driver failure after the connection was established.
    #[error("document-db error: {message}")]
    DocumentDb { message: String },

    /// Object-store listing failure.
    #[error("object-store error: {message}")]
    ObjectStore { message: String },

    /// The catalog collaborator rejected or failed to accept a submission.
    #[error("catalog error: {message}")]
    Catalog { message: String },

    /// Every job in a batch (or every file in a directory job) failed. Carries the last
    /// failure and, for whole batches, the per-job report.
    #[error("all {attempted} job(s) in the batch failed; last error: {last}")]
    BatchFailed {
        attempted: usize,
        last: Box<IngestError>,
        report: Option<Box<BatchReport>>,
    },
}

impl IngestError {
    /// Shorthand for [`IngestError::Config`].
    pub fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Shorthand for [`IngestError::SourceUnavailable`].
    pub fn unavailable(source_name: impl Into<String>, message: impl ToString) -> Self {
        Self::SourceUnavailable {
            source_name: source_name.into(),
            message: message.to_string(),
        }
    }

    /// The per-job report of a batch where every job failed.
    pub fn batch_report(&self) -> Option<&BatchReport> {
        match self {
            Self::BatchFailed { report, .. } => report.as_deref(),
            _ => None,
        }
    }

    /// Returns `true` for errors raised before any I/O (bad job description or unknown kind).
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Config { .. } | Self::UnsupportedKind { .. })
    }
}
