//! Object-store listing extractor.
//!
//! Object-store jobs do not read any file-level schema. The extractor lists every key under
//! `scheme://bucket/prefix` and reports counts as properties on a field-less snapshot.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::config::SourceDescriptor;
use crate::error::{IngestError, IngestResult};
use crate::types::Extraction;

use super::registry::SourceKind;
use super::Extractor;

/// A parsed `scheme://bucket/prefix` location. The prefix may be empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocation {
    pub scheme: String,
    pub bucket: String,
    pub prefix: String,
}

impl ObjectLocation {
    /// Split `scheme://bucket/prefix` as written. The prefix is kept verbatim (no percent
    /// encoding) since it is matched against object keys.
    pub fn parse(raw: &str) -> IngestResult<Self> {
        let trimmed = raw.trim();
        let (scheme, rest) = trimmed.split_once("://").ok_or_else(|| {
            IngestError::config("path", format!("'{raw}' is not a scheme://bucket/prefix uri"))
        })?;
        let valid_scheme = scheme.starts_with(|c: char| c.is_ascii_alphabetic())
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        if !valid_scheme {
            return Err(IngestError::config(
                "path",
                format!("'{raw}' has an invalid scheme '{scheme}'"),
            ));
        }
        let (bucket, prefix) = rest.split_once('/').unwrap_or((rest, ""));
        if bucket.is_empty() {
            return Err(IngestError::config("path", format!("'{raw}' does not name a bucket")));
        }
        Ok(Self {
            scheme: scheme.to_ascii_lowercase(),
            bucket: bucket.to_string(),
            prefix: prefix.trim_matches('/').to_string(),
        })
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.prefix.is_empty() {
            write!(f, "{}://{}", self.scheme, self.bucket)
        } else {
            write!(f, "{}://{}/{}", self.scheme, self.bucket, self.prefix)
        }
    }
}

/// One listed object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    pub key: String,
    pub size: u64,
}

/// Lists every object under a location, following pagination to the end.
pub trait ObjectLister: Send + Sync {
    fn list(&self, location: &ObjectLocation) -> IngestResult<Vec<ObjectEntry>>;
}

/// Emits one field-less extraction describing the listed objects.
pub struct ObjectStoreExtractor {
    location: ObjectLocation,
    lister: Arc<dyn ObjectLister>,
}

impl fmt::Debug for ObjectStoreExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStoreExtractor")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

impl ObjectStoreExtractor {
    pub fn new(location: ObjectLocation, lister: Arc<dyn ObjectLister>) -> Self {
        Self { location, lister }
    }

    pub fn location(&self) -> &ObjectLocation {
        &self.location
    }
}

impl Extractor for ObjectStoreExtractor {
    fn kind(&self) -> SourceKind {
        SourceKind::ObjectStore
    }

    /// Lists under the path carried by `source` when it differs from the construction-time
    /// location (a resolved partition), otherwise under the construction-time location.
    fn extract(&mut self, source: &SourceDescriptor) -> IngestResult<Vec<Extraction>> {
        let location = match source.source_location() {
            Some(raw) => ObjectLocation::parse(raw)?,
            None => self.location.clone(),
        };
        let entries = self.lister.list(&location)?;
        let total_size: u64 = entries.iter().map(|e| e.size).sum();
        debug!(location = %location, objects = entries.len(), "listed object store");

        let name = match source.dataset_name.as_deref() {
            Some(name) => name.to_string(),
            None if location.prefix.is_empty() => location.bucket.clone(),
            None => format!("{}/{}", location.bucket, location.prefix),
        };
        let extraction = Extraction {
            dataset_name: Some(name),
            ..Extraction::default()
        }
        .with_property("object_count", entries.len())
        .with_property("bucket", &location.bucket)
        .with_property("prefix", &location.prefix)
        .with_property("scheme", &location.scheme)
        .with_property("total_size_bytes", total_size);
        Ok(vec![extraction])
    }
}

#[cfg(not(feature = "object_store"))]
#[derive(Debug, Default)]
struct DisabledLister;

#[cfg(not(feature = "object_store"))]
impl ObjectLister for DisabledLister {
    fn list(&self, _location: &ObjectLocation) -> IngestResult<Vec<ObjectEntry>> {
        Err(IngestError::config(
            "kind",
            "object-store ingestion not enabled (enable cargo feature 'object_store')",
        ))
    }
}

pub(crate) fn default_lister() -> Arc<dyn ObjectLister> {
    #[cfg(feature = "object_store")]
    {
        Arc::new(remote::RemoteLister)
    }

    #[cfg(not(feature = "object_store"))]
    {
        Arc::new(DisabledLister)
    }
}

#[cfg(feature = "object_store")]
pub use remote::RemoteLister;

#[cfg(feature = "object_store")]
mod remote {
    use ::object_store::aws::AmazonS3Builder;
    use ::object_store::path::Path as StorePath;
    use ::object_store::ObjectStore;
    use futures::TryStreamExt;

    use super::{ObjectEntry, ObjectLister, ObjectLocation};
    use crate::error::{IngestError, IngestResult};

    /// Lists S3 buckets using credentials and region from the standard `AWS_*` environment.
    ///
    /// Each call builds its own current-thread runtime and drops it before returning.
    #[derive(Debug, Default)]
    pub struct RemoteLister;

    impl ObjectLister for RemoteLister {
        fn list(&self, location: &ObjectLocation) -> IngestResult<Vec<ObjectEntry>> {
            if !matches!(location.scheme.as_str(), "s3" | "s3a") {
                return Err(IngestError::config(
                    "path",
                    format!("unsupported object-store scheme '{}'", location.scheme),
                ));
            }
            let store = AmazonS3Builder::from_env()
                .with_bucket_name(&location.bucket)
                .build()
                .map_err(|e| IngestError::unavailable(location.to_string(), e))?;

            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            let prefix = (!location.prefix.is_empty()).then(|| StorePath::from(location.prefix.as_str()));
            let metas: Vec<_> = runtime
                .block_on(store.list(prefix.as_ref()).try_collect())
                .map_err(|e| match e {
                    ::object_store::Error::NotFound { .. } => {
                        IngestError::unavailable(location.to_string(), e)
                    }
                    other => IngestError::ObjectStore {
                        message: other.to_string(),
                    },
                })?;

            Ok(metas
                .into_iter()
                .map(|meta| ObjectEntry {
                    key: meta.location.to_string(),
                    size: meta.size,
                })
                .collect())
        }
    }
}
