//! Partition path resolution.
//!
//! A partition template such as `year=%Y/month=%m/day=%d` is formatted against the run
//! timestamp (UTC) and appended to the job's base path. `key=%token` segments also produce a
//! `key -> value` map that ends up on the snapshot as `partition_values`.
//!
//! Resolution is pure: no filesystem or network access happens here.

use std::collections::BTreeMap;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};

use crate::error::{IngestError, IngestResult};

/// Outcome of [`resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPartition {
    /// Base path, with the formatted segment appended when a partition was applied.
    pub path: String,
    /// The formatted relative segment, `None` on the fallback path.
    pub segment: Option<String>,
    /// `key -> formatted value` for each `key=%token` template segment.
    pub values: BTreeMap<String, String>,
}

impl ResolvedPartition {
    fn unchanged(base_path: &str) -> Self {
        Self {
            path: base_path.to_string(),
            segment: None,
            values: BTreeMap::new(),
        }
    }

    /// `true` when a template was actually applied.
    pub fn is_partitioned(&self) -> bool {
        self.segment.is_some()
    }

    /// `values` as a JSON object string.
    pub fn values_json(&self) -> String {
        let map: serde_json::Map<String, serde_json::Value> = self
            .values
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();
        serde_json::Value::Object(map).to_string()
    }
}

/// Resolve `base_path` against an optional template and run timestamp.
///
/// Without a template or without a timestamp the base path is returned unchanged with no
/// values; the unformatted template is never appended.
pub fn resolve(
    base_path: &str,
    partitioning_format: Option<&str>,
    run_timestamp: Option<DateTime<Utc>>,
) -> IngestResult<ResolvedPartition> {
    let (Some(template), Some(ts)) = (
        partitioning_format.filter(|t| !t.trim().is_empty()),
        run_timestamp,
    ) else {
        return Ok(ResolvedPartition::unchanged(base_path));
    };

    let template = template.trim().trim_matches('/');
    let segment = format_segment(template, ts)?;

    let mut values = BTreeMap::new();
    for part in template.split('/') {
        if let Some((key, token)) = part.split_once('=') {
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            values.insert(key.to_string(), format_segment(token, ts)?);
        }
    }

    let base = base_path.trim_end_matches('/');
    let path = if base.is_empty() {
        segment.clone()
    } else {
        format!("{base}/{segment}")
    };
    Ok(ResolvedPartition {
        path,
        segment: Some(segment),
        values,
    })
}

/// Check that every `%` token in `template` is one chrono can format.
pub fn validate_template(template: &str) -> IngestResult<()> {
    let items: Vec<Item<'_>> = StrftimeItems::new(template).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(IngestError::Partition {
            template: template.to_string(),
            message: "template contains an unrecognized or incomplete '%' token".to_string(),
        });
    }
    Ok(())
}

fn format_segment(template: &str, ts: DateTime<Utc>) -> IngestResult<String> {
    validate_template(template)?;
    Ok(ts.format_with_items(StrftimeItems::new(template)).to_string())
}
