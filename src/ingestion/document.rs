//! Document-database extractor.
//!
//! Each target collection is sampled with exactly one document; the field set and types come
//! from that single sample. Database access goes through [`DocumentConnector`] /
//! [`DocumentStore`] so the MongoDB driver (cargo feature `document_db`) can be swapped for a
//! fake in tests.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::SourceDescriptor;
use crate::error::{IngestError, IngestResult};
use crate::types::{Extraction, LogicalType, SchemaField};

use super::registry::SourceKind;
use super::Extractor;

/// Connection-establishment timeout applied to document-db jobs.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Value type of one top-level key in a sampled document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentValueType {
    ObjectId,
    String,
    Int32,
    Int64,
    Double,
    Decimal128,
    Boolean,
    DateTime,
    Timestamp,
    Null,
    Document,
    Array,
    Binary,
    /// Any other driver-specific type, by name.
    Other(String),
}

impl DocumentValueType {
    /// Type name as the database reports it.
    pub fn native_name(&self) -> &str {
        match self {
            Self::ObjectId => "objectId",
            Self::String => "string",
            Self::Int32 => "int",
            Self::Int64 => "long",
            Self::Double => "double",
            Self::Decimal128 => "decimal",
            Self::Boolean => "bool",
            Self::DateTime => "date",
            Self::Timestamp => "timestamp",
            Self::Null => "null",
            Self::Document => "object",
            Self::Array => "array",
            Self::Binary => "binData",
            Self::Other(name) => name,
        }
    }

    /// Identifier-like values are normalized to `string`.
    pub fn logical_type(&self) -> LogicalType {
        match self {
            Self::Int32 | Self::Int64 | Self::Double | Self::Decimal128 => LogicalType::Number,
            Self::Boolean => LogicalType::Boolean,
            Self::DateTime | Self::Timestamp => LogicalType::Time,
            _ => LogicalType::String,
        }
    }
}

/// Top-level `(key, value type)` pairs of one sampled document, in document order.
pub type SampledDocument = Vec<(String, DocumentValueType)>;

/// An open connection to one database.
pub trait DocumentStore {
    fn list_collection_names(&self) -> IngestResult<Vec<String>>;

    /// One document from `collection`, or `None` when the collection is empty.
    fn sample_document(&self, collection: &str) -> IngestResult<Option<SampledDocument>>;
}

/// Opens [`DocumentStore`]s. One connection is opened per extraction and dropped afterwards.
pub trait DocumentConnector: Send + Sync {
    fn connect(&self, target: &DocumentTarget) -> IngestResult<Box<dyn DocumentStore>>;
}

/// Where a document-db job reads from.
#[derive(Clone, PartialEq, Eq)]
pub struct DocumentTarget {
    pub uri: String,
    pub database: String,
}

impl fmt::Debug for DocumentTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentTarget")
            .field("uri", &redact_uri(&self.uri))
            .field("database", &self.database)
            .finish()
    }
}

impl DocumentTarget {
    /// Resolve the target from `connection_uri` + `database`, or from a combined
    /// `source_name` such as `mongodb://host:27017/shop`.
    pub fn from_descriptor(source: &SourceDescriptor) -> IngestResult<Self> {
        let uri = source.connection_uri.as_deref().filter(|s| !s.trim().is_empty());
        let database = source.database.as_deref().filter(|s| !s.trim().is_empty());
        if let (Some(uri), Some(database)) = (uri, database) {
            return Ok(Self {
                uri: uri.trim().to_string(),
                database: database.trim().to_string(),
            });
        }

        let combined = source
            .source_name
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                IngestError::config(
                    "source_name",
                    "document-db jobs need 'connection_uri' + 'database' or a combined 'source_name'",
                )
            })?;
        let parsed = url::Url::parse(combined.trim()).map_err(|e| {
            IngestError::config("source_name", format!("not a connection uri: {e}"))
        })?;
        let database = parsed
            .path_segments()
            .and_then(|mut segments| segments.next())
            .filter(|db| !db.is_empty())
            .or(database)
            .ok_or_else(|| {
                IngestError::config("source_name", "connection uri does not name a database")
            })?;
        Ok(Self {
            uri: combined.trim().to_string(),
            database: database.to_string(),
        })
    }
}

/// Samples collections of a document database.
pub struct DocumentDbExtractor {
    connector: Arc<dyn DocumentConnector>,
}

impl fmt::Debug for DocumentDbExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentDbExtractor").finish_non_exhaustive()
    }
}

impl DocumentDbExtractor {
    pub fn new(connector: Arc<dyn DocumentConnector>) -> Self {
        Self { connector }
    }
}

impl Extractor for DocumentDbExtractor {
    fn kind(&self) -> SourceKind {
        SourceKind::DocumentDb
    }

    fn extract(&mut self, source: &SourceDescriptor) -> IngestResult<Vec<Extraction>> {
        let target = DocumentTarget::from_descriptor(source)?;
        let store = self.connector.connect(&target)?;

        let collections = match source.collections.as_deref() {
            Some(list) if !list.is_empty() => list.to_vec(),
            _ => store.list_collection_names()?,
        };
        let single_collection = collections.len() == 1;

        let mut out = Vec::with_capacity(collections.len());
        for collection in &collections {
            let Some(sample) = store.sample_document(collection)? else {
                warn!(
                    database = %target.database,
                    collection = %collection,
                    "collection is empty; skipping"
                );
                continue;
            };
            debug!(collection = %collection, keys = sample.len(), "sampled document");

            let fields = sample
                .iter()
                .map(|(key, ty)| {
                    SchemaField::new(key, ty.native_name(), ty.logical_type())
                        .with_nullable(key != "_id")
                })
                .collect();
            let name = match source.dataset_name.as_deref() {
                Some(name) if single_collection => name.to_string(),
                _ => format!("{}.{}", target.database, collection),
            };
            out.push(
                Extraction {
                    dataset_name: Some(name),
                    ..Extraction::new(fields)
                }
                .with_property("database", &target.database)
                .with_property("collection", collection)
                .with_property("sampled_documents", 1),
            );
        }
        Ok(out)
    }
}

/// Hide credentials in a connection uri before it reaches logs or errors.
pub fn redact_uri(uri: &str) -> String {
    match url::Url::parse(uri) {
        Ok(mut parsed) if !parsed.username().is_empty() || parsed.password().is_some() => {
            let _ = parsed.set_username("***");
            let _ = parsed.set_password(None);
            parsed.to_string()
        }
        Ok(_) => uri.to_string(),
        Err(_) => "<unparseable uri>".to_string(),
    }
}

/// Connector used when no driver is compiled in.
#[cfg(not(feature = "document_db"))]
#[derive(Debug, Default)]
struct DisabledConnector;

#[cfg(not(feature = "document_db"))]
impl DocumentConnector for DisabledConnector {
    fn connect(&self, _target: &DocumentTarget) -> IngestResult<Box<dyn DocumentStore>> {
        Err(IngestError::config(
            "kind",
            "document-db ingestion not enabled (enable cargo feature 'document_db')",
        ))
    }
}

pub(crate) fn default_connector() -> Arc<dyn DocumentConnector> {
    #[cfg(feature = "document_db")]
    {
        Arc::new(mongo::MongoConnector)
    }

    #[cfg(not(feature = "document_db"))]
    {
        Arc::new(DisabledConnector)
    }
}

#[cfg(feature = "document_db")]
pub use mongo::MongoConnector;

#[cfg(feature = "document_db")]
mod mongo {
    use mongodb::bson::{Bson, Document};
    use mongodb::error::{Error as MongoError, ErrorKind};
    use mongodb::sync::{Client, Database};

    use super::{
        redact_uri, DocumentConnector, DocumentStore, DocumentTarget, DocumentValueType,
        SampledDocument, CONNECT_TIMEOUT,
    };
    use crate::error::{IngestError, IngestResult};

    /// MongoDB connector using the synchronous driver.
    #[derive(Debug, Default)]
    pub struct MongoConnector;

    impl DocumentConnector for MongoConnector {
        fn connect(&self, target: &DocumentTarget) -> IngestResult<Box<dyn DocumentStore>> {
            let uri = with_connect_timeout(&target.uri);
            let client = Client::with_uri_str(uri)
                .map_err(|e| IngestError::unavailable(redact_uri(&target.uri), e))?;
            Ok(Box::new(MongoStore {
                label: redact_uri(&target.uri),
                db: client.database(&target.database),
            }))
        }
    }

    struct MongoStore {
        label: String,
        db: Database,
    }

    impl MongoStore {
        fn map_err(&self, e: MongoError) -> IngestError {
            match e.kind.as_ref() {
                ErrorKind::ServerSelection { .. } | ErrorKind::Io(_) => {
                    IngestError::unavailable(&self.label, e)
                }
                _ => IngestError::DocumentDb {
                    message: e.to_string(),
                },
            }
        }
    }

    impl DocumentStore for MongoStore {
        fn list_collection_names(&self) -> IngestResult<Vec<String>> {
            self.db.list_collection_names(None).map_err(|e| self.map_err(e))
        }

        fn sample_document(&self, collection: &str) -> IngestResult<Option<SampledDocument>> {
            let doc = self
                .db
                .collection::<Document>(collection)
                .find_one(None, None)
                .map_err(|e| self.map_err(e))?;
            Ok(doc.map(|d| {
                d.iter()
                    .map(|(key, value)| (key.clone(), value_type(value)))
                    .collect()
            }))
        }
    }

    fn value_type(value: &Bson) -> DocumentValueType {
        match value {
            Bson::ObjectId(_) => DocumentValueType::ObjectId,
            Bson::String(_) | Bson::Symbol(_) => DocumentValueType::String,
            Bson::Int32(_) => DocumentValueType::Int32,
            Bson::Int64(_) => DocumentValueType::Int64,
            Bson::Double(_) => DocumentValueType::Double,
            Bson::Decimal128(_) => DocumentValueType::Decimal128,
            Bson::Boolean(_) => DocumentValueType::Boolean,
            Bson::DateTime(_) => DocumentValueType::DateTime,
            Bson::Timestamp(_) => DocumentValueType::Timestamp,
            Bson::Null | Bson::Undefined => DocumentValueType::Null,
            Bson::Document(_) => DocumentValueType::Document,
            Bson::Array(_) => DocumentValueType::Array,
            Bson::Binary(_) => DocumentValueType::Binary,
            other => DocumentValueType::Other(format!("{:?}", other.element_type())),
        }
    }

    /// Add server-selection/connect timeouts unless the uri already sets them.
    fn with_connect_timeout(uri: &str) -> String {
        let ms = CONNECT_TIMEOUT.as_millis();
        let mut out = uri.to_string();
        for option in ["serverSelectionTimeoutMS", "connectTimeoutMS"] {
            if out.contains(option) {
                continue;
            }
            let separator = if out.contains('?') {
                "&"
            } else if host_has_path(&out) {
                "?"
            } else {
                "/?"
            };
            out.push_str(&format!("{separator}{option}={ms}"));
        }
        out
    }

    fn host_has_path(uri: &str) -> bool {
        uri.split_once("://")
            .map(|(_, rest)| rest.contains('/'))
            .unwrap_or(false)
    }
}
