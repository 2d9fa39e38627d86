//! Source extractors and the registry that picks one per job.
//!
//! Most callers go through [`crate::orchestrator::Orchestrator`], which validates a job, asks
//! the [`ExtractorRegistry`] for an [`Extractor`] and turns each [`Extraction`] into a
//! [`crate::types::DatasetSnapshot`].
//!
//! Kind-specific extractors live under:
//! - [`csv`] (`delimited-file`)
//! - [`avro`] (`binary-file`)
//! - [`parquet`] (`columnar-file`)
//! - [`document`] (`document-db`)
//! - [`object_store`] (`object-store`)

pub mod avro;
pub mod csv;
pub mod document;
pub mod object_store;
pub mod observability;
pub mod parquet;
pub mod registry;

use std::fs::File;

use crate::config::SourceDescriptor;
use crate::error::{IngestError, IngestResult};
use crate::types::{Extraction, LogicalType, SchemaField};

pub use self::avro::BinaryFileExtractor;
pub use self::csv::DelimitedFileExtractor;
pub use self::document::{DocumentConnector, DocumentDbExtractor, DocumentStore, DocumentValueType};
pub use self::object_store::{ObjectEntry, ObjectLister, ObjectLocation, ObjectStoreExtractor};
pub use self::parquet::ColumnarFileExtractor;
pub use observability::{
    CompositeObserver, FileObserver, IngestionContext, IngestionObserver, IngestionSeverity,
    IngestionStats, TracingObserver,
};
pub use registry::{get_handler, ExtractorRegistry, SourceKind};

/// Reads one source instance and describes its structure.
///
/// File and object-store extractors return exactly one [`Extraction`]; the document-db
/// extractor returns one per sampled collection. An extraction with no fields is valid.
pub trait Extractor {
    /// The kind this extractor handles.
    fn kind(&self) -> SourceKind;

    /// Read the source described by `source` (whose `path` is already resolved).
    fn extract(&mut self, source: &SourceDescriptor) -> IngestResult<Vec<Extraction>>;
}

/// Build fields from an explicit `(name, type)` schema, skipping inference.
pub(crate) fn explicit_fields(schema: &[(String, String)]) -> Vec<SchemaField> {
    schema
        .iter()
        .map(|(name, ty)| {
            SchemaField::new(name, ty, LogicalType::from_native(ty)).with_nullable(true)
        })
        .collect()
}

/// Open a local source file, reporting a missing/unreadable file as an unavailable source.
pub(crate) fn open_source_file(path: &str) -> IngestResult<File> {
    File::open(path).map_err(|e| IngestError::unavailable(path, e))
}

/// The job's `path`, required for file-based kinds.
pub(crate) fn required_path(source: &SourceDescriptor) -> IngestResult<&str> {
    source
        .source_location()
        .ok_or_else(|| IngestError::config("path", "missing required field 'path'"))
}
