//! `metadata-ingest` reads the structure of data sources (field names, types, nullability,
//! descriptive properties) and submits one normalized [`types::DatasetSnapshot`] per dataset to
//! a metadata catalog.
//!
//! ## Supported sources
//!
//! | kind | source | notes |
//! |---|---|---|
//! | `delimited-file` | CSV/TSV | header row required; numeric columns are inferred |
//! | `binary-file` | Avro object container | the embedded writer schema is authoritative |
//! | `columnar-file` | Parquet | footer schema only; no row groups are decoded |
//! | `document-db` | MongoDB | one sampled document per collection (cargo feature `document_db`) |
//! | `object-store` | `s3://bucket/prefix` | object listing only (cargo feature `object_store`) |
//!
//! File kinds accept a single file or a directory; directories are scanned (non-recursively) for
//! files with the kind's extensions. A `partitioning_format` such as `year=%Y/month=%m/day=%d`
//! selects a dated sub-path when a run timestamp is supplied.
//!
//! ## Quick example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use metadata_ingest::catalog::{CatalogCache, InMemoryCatalog};
//! use metadata_ingest::config::{SinkDescriptor, SourceDescriptor};
//! use metadata_ingest::orchestrator::Orchestrator;
//!
//! # fn main() -> Result<(), metadata_ingest::IngestError> {
//! let catalog = Arc::new(InMemoryCatalog::new());
//! let orchestrator = Orchestrator::new(CatalogCache::shared(catalog.clone()));
//!
//! let jobs = vec![SourceDescriptor::new("delimited-file", "data/people.csv")];
//! let report = orchestrator.run_batch(&jobs, &SinkDescriptor::default())?;
//! println!("{report}");
//!
//! for snapshot in catalog.snapshots() {
//!     println!("{} has {} fields", snapshot.urn(), snapshot.fields.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: job descriptions and job-file loading
//! - [`ingestion`]: per-kind extractors, the registry and observer hooks
//! - [`partition`]: partition path resolution
//! - [`orchestrator`]: validation, path resolution, directory scanning and batches
//! - [`catalog`]: the catalog collaborator interface and bundled emitters
//! - [`logging`]: subscriber setup for the binary

pub mod catalog;
pub mod config;
pub mod error;
pub mod ingestion;
pub mod logging;
pub mod orchestrator;
pub mod partition;
pub mod types;

pub use error::{IngestError, IngestResult};
