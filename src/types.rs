//! Core data model types for metadata ingestion.
//!
//! Extractors produce [`SchemaField`]s plus descriptive properties; the orchestrator wraps them
//! into a [`DatasetSnapshot`] that is handed to the catalog and then discarded.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical field type used by the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalType {
    /// Text, identifiers, and anything nested or otherwise unclassified.
    String,
    /// Integers, floating point and decimals.
    Number,
    /// Boolean.
    Boolean,
    /// Dates, times and timestamps.
    Time,
}

impl LogicalType {
    /// Canonicalize a source-reported type name (case-insensitive).
    ///
    /// Unknown names map to [`LogicalType::String`].
    pub fn from_native(native: &str) -> Self {
        let lower = native.trim().to_ascii_lowercase();
        match lower.as_str() {
            "int" | "int8" | "int16" | "int32" | "int64" | "integer" | "long" | "short"
            | "byte" | "bigint" | "smallint" | "tinyint" | "uint8" | "uint16" | "uint32"
            | "uint64" | "float" | "float32" | "float64" | "double" | "decimal" | "number"
            | "numeric" | "real" => Self::Number,
            "bool" | "boolean" => Self::Boolean,
            "date" | "time" | "datetime" | "timestamp" | "timestamptz" => Self::Time,
            other if other.starts_with("decimal") => Self::Number,
            other if other.starts_with("timestamp") || other.starts_with("time_") => Self::Time,
            _ => Self::String,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Time => "time",
        }
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single named, typed field of a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaField {
    /// Field/column name. Never empty.
    pub name: String,
    /// Type string as reported by the source.
    pub native_type: String,
    /// Canonical type.
    pub logical_type: LogicalType,
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl SchemaField {
    /// Create a non-nullable field without description.
    pub fn new(
        name: impl Into<String>,
        native_type: impl Into<String>,
        logical_type: LogicalType,
    ) -> Self {
        Self {
            name: name.into(),
            native_type: native_type.into(),
            logical_type,
            nullable: false,
            description: None,
        }
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// String properties attached to a snapshot. Ordered for stable output.
pub type Properties = BTreeMap<String, String>;

/// What an extractor read from one source instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Dataset name chosen by the extractor (e.g. `db.collection`), overriding the job's name.
    pub dataset_name: Option<String>,
    /// Fields in source column/field order.
    pub fields: Vec<SchemaField>,
    pub properties: Properties,
    /// Opaque source schema, e.g. the literal Avro schema JSON.
    pub raw_schema: Option<String>,
}

impl Extraction {
    pub fn new(fields: Vec<SchemaField>) -> Self {
        Self {
            fields,
            ..Default::default()
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.properties.insert(key.into(), value.to_string());
        self
    }
}

/// The full metadata record for one dataset, submitted in a single catalog call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSnapshot {
    /// Catalog platform namespace (the source kind tag).
    pub platform: String,
    pub name: String,
    pub environment: String,
    pub fields: Vec<SchemaField>,
    pub properties: Properties,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_schema: Option<String>,
}

impl DatasetSnapshot {
    /// Catalog URN identifying this dataset.
    pub fn urn(&self) -> String {
        dataset_urn(&self.platform, &self.name, &self.environment)
    }

    /// Returns the field with the given name (last one wins on duplicates).
    pub fn field(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().rev().find(|f| f.name == name)
    }
}

/// Build a dataset URN the way the catalog names datasets.
pub fn dataset_urn(platform: &str, name: &str, env: &str) -> String {
    format!("urn:li:dataset:(urn:li:dataPlatform:{platform},{name},{env})")
}
