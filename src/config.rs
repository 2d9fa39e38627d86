//! Job configuration: what to ingest ([`SourceDescriptor`]) and where it goes ([`SinkDescriptor`]).
//!
//! Job files are JSON and hold either a single job object or an array of job objects:
//!
//! ```json
//! [
//!   {"kind": "delimited-file", "path": "data/people.csv", "delimiter": ";"},
//!   {"kind": "object-store", "path": "s3://lake/events", "partitioning_format": "year=%Y/month=%m"}
//! ]
//! ```
//!
//! Older job files used `source_type` / `source_path`; [`SourceDescriptor::normalized`] folds
//! them into `kind` / `path` while keeping both spellings populated.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{IngestError, IngestResult};
use crate::ingestion::registry::SourceKind;

/// Default environment tag used when neither the sink nor the job sets one.
pub const DEFAULT_ENV: &str = "PROD";

/// One job's input description, as written in the job file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceDescriptor {
    /// Declared source kind (e.g. `delimited-file`, `csv`, `object-store`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Legacy spelling of `kind`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
    /// File, directory or `scheme://bucket/prefix` location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Legacy spelling of `path`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,
    /// Dataset name; derived from the file stem when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Single-character column delimiter for delimited files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<String>,
    /// strftime-like partition template, e.g. `year=%Y/month=%m/day=%d`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partitioning_format: Option<String>,
    /// Scheduling note. Copied onto snapshots, never parsed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_cron: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// Collections to sample; all collections when absent or empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collections: Option<Vec<String>>,
    /// Combined document-db identifier, e.g. `mongodb://host:27017/shop`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    /// Picks one file when `path` is a directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// Explicit field-name → type map. Replaces inference when present; order is kept.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<serde_json::Map<String, serde_json::Value>>,
    /// Custom properties copied onto every snapshot of this job.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, String>>,
    /// Per-job environment override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,
}

impl SourceDescriptor {
    /// Create a descriptor for `kind` at `path`.
    pub fn new(kind: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.into()),
            path: Some(path.into()),
            ..Default::default()
        }
    }

    /// The declared kind, reading the legacy `source_type` when `kind` is unset.
    pub fn declared_kind(&self) -> Option<&str> {
        non_blank(self.kind.as_deref()).or_else(|| non_blank(self.source_type.as_deref()))
    }

    /// The declared location, reading the legacy `source_path` when `path` is unset.
    pub fn source_location(&self) -> Option<&str> {
        non_blank(self.path.as_deref()).or_else(|| non_blank(self.source_path.as_deref()))
    }

    /// Canonical form of this descriptor.
    ///
    /// - `kind`/`source_type` both hold the canonical kind tag (or the trimmed declared value
    ///   when it is not a known kind, so validation can report it).
    /// - `path`/`source_path` both hold the declared location.
    /// - A `tsv` job without a delimiter gets a tab, since the kind tag alone no longer says so.
    ///
    /// Normalizing an already-normalized descriptor returns an equal descriptor.
    pub fn normalized(&self) -> Self {
        let mut out = self.clone();

        let kind = self.declared_kind().map(|k| match SourceKind::parse(k) {
            Some(parsed) => parsed.as_str().to_string(),
            None => k.trim().to_string(),
        });
        out.kind = kind.clone();
        out.source_type = kind;
        if out.delimiter.is_none()
            && self
                .declared_kind()
                .is_some_and(|k| k.trim().eq_ignore_ascii_case("tsv"))
        {
            out.delimiter = Some("\t".to_string());
        }

        let location = self.source_location().map(|p| p.trim().to_string());
        out.path = location.clone();
        out.source_path = location;

        out
    }

    /// The explicit schema override as ordered `(name, type)` pairs.
    pub fn explicit_schema(&self) -> IngestResult<Option<Vec<(String, String)>>> {
        let Some(map) = self.schema.as_ref() else {
            return Ok(None);
        };
        let mut out = Vec::with_capacity(map.len());
        for (name, ty) in map {
            if name.trim().is_empty() {
                return Err(IngestError::config("schema", "field names must not be empty"));
            }
            let ty = ty.as_str().ok_or_else(|| {
                IngestError::config(
                    "schema",
                    format!("type of field '{name}' must be a string, got {ty}"),
                )
            })?;
            out.push((name.clone(), ty.to_string()));
        }
        Ok(Some(out))
    }

    /// Short identification used in logs and batch reports.
    pub fn label(&self) -> String {
        let kind = self.declared_kind().unwrap_or("<no kind>");
        let location = self
            .source_location()
            .or(self.source_name.as_deref())
            .or(self.database.as_deref())
            .unwrap_or("<no path>");
        match self.dataset_name.as_deref() {
            Some(name) => format!("{kind} {location} (dataset '{name}')"),
            None => format!("{kind} {location}"),
        }
    }
}

/// Target environment plus opaque catalog connection parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkDescriptor {
    pub env: String,
    /// Passed through to catalog emitters untouched.
    #[serde(default)]
    pub catalog: BTreeMap<String, String>,
}

impl Default for SinkDescriptor {
    fn default() -> Self {
        Self {
            env: DEFAULT_ENV.to_string(),
            catalog: BTreeMap::new(),
        }
    }
}

impl SinkDescriptor {
    pub fn new(env: impl Into<String>) -> Self {
        Self {
            env: env.into(),
            ..Default::default()
        }
    }

    /// The environment a given job ingests into (the job's `env` wins).
    pub fn env_for<'a>(&'a self, source: &'a SourceDescriptor) -> &'a str {
        non_blank(source.env.as_deref()).unwrap_or(&self.env)
    }
}

/// Load a job file from disk.
pub fn load_jobs(path: impl AsRef<Path>) -> IngestResult<Vec<SourceDescriptor>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .map_err(|e| IngestError::unavailable(path.display().to_string(), e))?;
    parse_jobs(&text)
}

/// Parse job file contents: a single job object or a non-empty array of job objects.
pub fn parse_jobs(input: &str) -> IngestResult<Vec<SourceDescriptor>> {
    let value: serde_json::Value = serde_json::from_str(input)?;
    match value {
        serde_json::Value::Array(items) => {
            if items.is_empty() {
                return Err(IngestError::config("jobs", "job list is empty"));
            }
            items
                .into_iter()
                .enumerate()
                .map(|(idx, item)| {
                    serde_json::from_value(item).map_err(|e| {
                        IngestError::config(format!("jobs[{idx}]"), e.to_string())
                    })
                })
                .collect()
        }
        serde_json::Value::Object(map) => {
            if map.is_empty() {
                return Err(IngestError::config("jobs", "job object is empty"));
            }
            let job = serde_json::from_value(serde_json::Value::Object(map))
                .map_err(|e| IngestError::config("jobs[0]", e.to_string()))?;
            Ok(vec![job])
        }
        other => Err(IngestError::config(
            "jobs",
            format!("expected a job object or an array of jobs, got {other}"),
        )),
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_folds_legacy_names() {
        let legacy = SourceDescriptor {
            source_type: Some("CSV".to_string()),
            source_path: Some("data/people.csv".to_string()),
            ..Default::default()
        };
        let n = legacy.normalized();
        assert_eq!(n.kind.as_deref(), Some("delimited-file"));
        assert_eq!(n.source_type.as_deref(), Some("delimited-file"));
        assert_eq!(n.path.as_deref(), Some("data/people.csv"));
        assert_eq!(n.source_path.as_deref(), Some("data/people.csv"));
    }

    #[test]
    fn normalize_keeps_tab_for_tsv_alias() {
        let n = SourceDescriptor::new("tsv", "exports/a.txt").normalized();
        assert_eq!(n.kind.as_deref(), Some("delimited-file"));
        assert_eq!(n.delimiter.as_deref(), Some("\t"));
        assert_eq!(n.normalized(), n);
    }

    #[test]
    fn normalize_keeps_unknown_kind_for_validation() {
        let d = SourceDescriptor::new(" ftp ", "x");
        assert_eq!(d.normalized().kind.as_deref(), Some("ftp"));
    }

    #[test]
    fn sink_env_prefers_job_override() {
        let sink = SinkDescriptor::new("DEV");
        let mut job = SourceDescriptor::new("csv", "a.csv");
        assert_eq!(sink.env_for(&job), "DEV");
        job.env = Some("QA".to_string());
        assert_eq!(sink.env_for(&job), "QA");
    }
}
