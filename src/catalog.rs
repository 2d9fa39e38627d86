//! Catalog collaborator interface.
//!
//! The ingestion core only ever calls [`CatalogEmitter::emit_snapshot`]. `emit_proposal` and
//! `get_aspect` exist for enrichment-style collaborators that patch single aspects of known
//! datasets.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use crate::error::{IngestError, IngestResult};
use crate::types::DatasetSnapshot;

/// One named aspect of an entity (e.g. `ownership`, `globalTags`) with an opaque JSON value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aspect {
    pub name: String,
    pub value: JsonValue,
}

impl Aspect {
    pub fn new(name: impl Into<String>, value: JsonValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Submission endpoint of the metadata catalog.
///
/// Every call is an independent submit; implementations must not rely on call ordering
/// beyond what a single job produces.
pub trait CatalogEmitter: Send + Sync {
    /// Submit a full snapshot for one dataset.
    fn emit_snapshot(&self, snapshot: &DatasetSnapshot) -> IngestResult<()>;

    /// Submit an incremental update to one aspect of an already-known entity.
    fn emit_proposal(&self, urn: &str, aspect: &Aspect) -> IngestResult<()>;

    /// Read back the latest value of an aspect. Catalogs without read access return `None`.
    fn get_aspect(&self, _urn: &str, _aspect_name: &str) -> IngestResult<Option<Aspect>> {
        Ok(None)
    }
}

#[derive(Debug, Default)]
struct Recorded {
    snapshots: Vec<DatasetSnapshot>,
    proposals: Vec<(String, Aspect)>,
}

/// Keeps every submission in memory. Proposals are readable through `get_aspect`.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    inner: Mutex<Recorded>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// All snapshots, in submission order.
    pub fn snapshots(&self) -> Vec<DatasetSnapshot> {
        self.lock().snapshots.clone()
    }

    pub fn proposals(&self) -> Vec<(String, Aspect)> {
        self.lock().proposals.clone()
    }

    /// The most recent snapshot for `urn`.
    pub fn snapshot(&self, urn: &str) -> Option<DatasetSnapshot> {
        self.lock()
            .snapshots
            .iter()
            .rev()
            .find(|s| s.urn() == urn)
            .cloned()
    }
}

impl CatalogEmitter for InMemoryCatalog {
    fn emit_snapshot(&self, snapshot: &DatasetSnapshot) -> IngestResult<()> {
        self.lock().snapshots.push(snapshot.clone());
        Ok(())
    }

    fn emit_proposal(&self, urn: &str, aspect: &Aspect) -> IngestResult<()> {
        self.lock().proposals.push((urn.to_string(), aspect.clone()));
        Ok(())
    }

    fn get_aspect(&self, urn: &str, aspect_name: &str) -> IngestResult<Option<Aspect>> {
        Ok(self
            .lock()
            .proposals
            .iter()
            .rev()
            .find(|(u, a)| u == urn && a.name == aspect_name)
            .map(|(_, a)| a.clone()))
    }
}

/// Writes each submission as one JSON line.
///
/// Snapshots are written as `{"type":"snapshot","urn":..,"snapshot":{..}}`, proposals as
/// `{"type":"proposal","urn":..,"aspect":{..}}`.
pub struct JsonLinesCatalog {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl fmt::Debug for JsonLinesCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonLinesCatalog").finish_non_exhaustive()
    }
}

impl JsonLinesCatalog {
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Append to `path`, creating it if needed.
    pub fn append_to(path: impl AsRef<Path>) -> IngestResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        Ok(Self::new(Box::new(io::BufWriter::new(file))))
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    fn write_line(&self, line: &JsonValue) -> IngestResult<()> {
        let mut writer = self.writer.lock().map_err(|_| IngestError::Catalog {
            message: "catalog writer lock poisoned".to_string(),
        })?;
        serde_json::to_writer(&mut *writer, line)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}

impl CatalogEmitter for JsonLinesCatalog {
    fn emit_snapshot(&self, snapshot: &DatasetSnapshot) -> IngestResult<()> {
        self.write_line(&json!({
            "type": "snapshot",
            "urn": snapshot.urn(),
            "snapshot": snapshot,
        }))
    }

    fn emit_proposal(&self, urn: &str, aspect: &Aspect) -> IngestResult<()> {
        self.write_line(&json!({
            "type": "proposal",
            "urn": urn,
            "aspect": aspect,
        }))
    }
}

type EmitterFactory = dyn Fn(&str) -> IngestResult<Arc<dyn CatalogEmitter>> + Send + Sync;

/// Caller-owned map from platform to emitter. Emitters are created on first use.
pub struct CatalogCache {
    factory: Box<EmitterFactory>,
    emitters: Mutex<BTreeMap<String, Arc<dyn CatalogEmitter>>>,
}

impl fmt::Debug for CatalogCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let platforms: Vec<String> = self
            .emitters
            .lock()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();
        f.debug_struct("CatalogCache")
            .field("platforms", &platforms)
            .finish_non_exhaustive()
    }
}

impl CatalogCache {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&str) -> IngestResult<Arc<dyn CatalogEmitter>> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            emitters: Mutex::new(BTreeMap::new()),
        }
    }

    /// One emitter shared by every platform.
    pub fn shared(emitter: Arc<dyn CatalogEmitter>) -> Self {
        Self::new(move |_| Ok(Arc::clone(&emitter)))
    }

    /// The emitter for `platform`, creating it through the factory on first use.
    pub fn get(&self, platform: &str) -> IngestResult<Arc<dyn CatalogEmitter>> {
        let mut emitters = self.emitters.lock().map_err(|_| IngestError::Catalog {
            message: "catalog cache lock poisoned".to_string(),
        })?;
        if let Some(existing) = emitters.get(platform) {
            return Ok(Arc::clone(existing));
        }
        let created = (self.factory)(platform)?;
        emitters.insert(platform.to_string(), Arc::clone(&created));
        Ok(created)
    }

    /// Number of emitters created so far.
    pub fn len(&self) -> usize {
        self.emitters.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
