//! Kind → extractor dispatch.
//!
//! The kind set is closed, so dispatch is a plain enum match. The registry only carries the
//! handles extractors need to reach external systems (document-db connector, object lister),
//! which lets tests substitute in-memory fakes.

use std::fmt;
use std::sync::Arc;

use crate::config::SourceDescriptor;
use crate::error::{IngestError, IngestResult};

use super::avro::BinaryFileExtractor;
use super::csv::DelimitedFileExtractor;
use super::document::{default_connector, DocumentConnector, DocumentDbExtractor};
use super::object_store::{default_lister, ObjectLister, ObjectLocation, ObjectStoreExtractor};
use super::parquet::ColumnarFileExtractor;
use super::Extractor;

/// Declared category of a data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SourceKind {
    /// Delimiter-separated text with a header row.
    DelimitedFile,
    /// Self-describing binary file (Avro object container).
    BinaryFile,
    /// Columnar file (Parquet).
    ColumnarFile,
    /// Document database (MongoDB).
    DocumentDb,
    /// Object-store listing under `scheme://bucket/prefix`.
    ObjectStore,
}

/// Every kind the registry can build an extractor for, in display order.
pub const SUPPORTED_KINDS: [SourceKind; 5] = [
    SourceKind::DelimitedFile,
    SourceKind::BinaryFile,
    SourceKind::ColumnarFile,
    SourceKind::DocumentDb,
    SourceKind::ObjectStore,
];

impl SourceKind {
    /// Parse a declared kind (case-insensitive). Legacy short names are accepted.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "delimited-file" | "delimited_file" | "csv" | "tsv" => Some(Self::DelimitedFile),
            "binary-file" | "binary_file" | "avro" => Some(Self::BinaryFile),
            "columnar-file" | "columnar_file" | "parquet" => Some(Self::ColumnarFile),
            "document-db" | "document_db" | "mongodb" | "mongo" => Some(Self::DocumentDb),
            "object-store" | "object_store" | "s3" => Some(Self::ObjectStore),
            _ => None,
        }
    }

    /// Canonical tag; also used as the catalog platform.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DelimitedFile => "delimited-file",
            Self::BinaryFile => "binary-file",
            Self::ColumnarFile => "columnar-file",
            Self::DocumentDb => "document-db",
            Self::ObjectStore => "object-store",
        }
    }

    /// File extensions (lowercase, no dot) scanned when a job points at a directory.
    pub fn file_extensions(&self) -> &'static [&'static str] {
        match self {
            Self::DelimitedFile => &["csv", "tsv"],
            Self::BinaryFile => &["avro"],
            Self::ColumnarFile => &["parquet", "pq"],
            Self::DocumentDb | Self::ObjectStore => &[],
        }
    }

    /// Kinds that read a local file (and may point at a directory of files).
    pub fn is_file_based(&self) -> bool {
        matches!(
            self,
            Self::DelimitedFile | Self::BinaryFile | Self::ColumnarFile
        )
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comma-separated list of supported kind tags.
pub fn supported_kinds() -> String {
    SUPPORTED_KINDS
        .iter()
        .map(SourceKind::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Resolve the kind declared by `source`.
///
/// Fails with a configuration error naming `kind` when absent, and with
/// [`IngestError::UnsupportedKind`] when present but unknown.
pub fn resolve_kind(source: &SourceDescriptor) -> IngestResult<SourceKind> {
    let raw = source
        .declared_kind()
        .ok_or_else(|| IngestError::config("kind", "missing required field 'kind'"))?;
    SourceKind::parse(raw).ok_or_else(|| IngestError::UnsupportedKind {
        kind: raw.trim().to_string(),
        supported: supported_kinds(),
    })
}

/// Builds extractors for job descriptors.
#[derive(Clone)]
pub struct ExtractorRegistry {
    document_connector: Arc<dyn DocumentConnector>,
    object_lister: Arc<dyn ObjectLister>,
}

impl fmt::Debug for ExtractorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractorRegistry")
            .field("supported_kinds", &supported_kinds())
            .finish()
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self {
            document_connector: default_connector(),
            object_lister: default_lister(),
        }
    }
}

impl ExtractorRegistry {
    /// Use a different document-db connector (e.g. an in-memory fake).
    pub fn with_document_connector(mut self, connector: Arc<dyn DocumentConnector>) -> Self {
        self.document_connector = connector;
        self
    }

    /// Use a different object lister (e.g. an in-memory fake).
    pub fn with_object_lister(mut self, lister: Arc<dyn ObjectLister>) -> Self {
        self.object_lister = lister;
        self
    }

    /// Build a fresh extractor for `source`.
    ///
    /// Object-store extractors validate the `scheme://bucket/prefix` location here, so a bad
    /// location fails before any listing is attempted.
    pub fn get_handler(&self, source: &SourceDescriptor) -> IngestResult<Box<dyn Extractor>> {
        let kind = resolve_kind(source)?;
        let extractor: Box<dyn Extractor> = match kind {
            SourceKind::DelimitedFile => Box::new(DelimitedFileExtractor::new()),
            SourceKind::BinaryFile => Box::new(BinaryFileExtractor::new()),
            SourceKind::ColumnarFile => Box::new(ColumnarFileExtractor::new()),
            SourceKind::DocumentDb => Box::new(DocumentDbExtractor::new(Arc::clone(
                &self.document_connector,
            ))),
            SourceKind::ObjectStore => {
                let location = source.source_location().ok_or_else(|| {
                    IngestError::config("path", "object-store jobs need a 'path'")
                })?;
                Box::new(ObjectStoreExtractor::new(
                    ObjectLocation::parse(location)?,
                    Arc::clone(&self.object_lister),
                ))
            }
        };
        Ok(extractor)
    }
}

/// Build an extractor using the default registry.
pub fn get_handler(source: &SourceDescriptor) -> IngestResult<Box<dyn Extractor>> {
    ExtractorRegistry::default().get_handler(source)
}
