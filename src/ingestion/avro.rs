//! Binary self-describing file extractor (Avro object container files).
//!
//! Only the container header is read: magic bytes, the metadata map and the sync marker. The
//! writer schema stored under `avro.schema` is authoritative; data blocks are never decoded.

use std::collections::BTreeMap;
use std::io::{BufReader, ErrorKind, Read};
use std::path::PathBuf;

use serde_json::Value as JsonValue;
use tracing::debug;

use crate::config::SourceDescriptor;
use crate::error::{IngestError, IngestResult};
use crate::types::{Extraction, LogicalType, SchemaField};

use super::registry::SourceKind;
use super::{open_source_file, required_path, Extractor};

const MAGIC: [u8; 4] = [b'O', b'b', b'j', 1];
const SYNC_MARKER_LEN: usize = 16;
/// Upper bound on a single metadata value; real headers are a few KiB.
const MAX_METADATA_VALUE_LEN: i64 = 64 * 1024 * 1024;

/// Parsed container header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHeader {
    /// Raw metadata entries (`avro.schema`, `avro.codec`, user keys).
    pub metadata: BTreeMap<String, Vec<u8>>,
}

impl ContainerHeader {
    /// The writer schema JSON.
    pub fn schema_json(&self) -> IngestResult<&str> {
        let raw = self.metadata.get("avro.schema").ok_or_else(|| IngestError::Avro {
            message: "header has no 'avro.schema' entry".to_string(),
        })?;
        std::str::from_utf8(raw).map_err(|e| IngestError::Avro {
            message: format!("'avro.schema' is not utf-8: {e}"),
        })
    }

    pub fn codec(&self) -> Option<String> {
        self.metadata
            .get("avro.codec")
            .map(|v| String::from_utf8_lossy(v).into_owned())
    }
}

#[derive(Debug, Clone)]
struct CachedSchema {
    path: PathBuf,
    raw: String,
    codec: Option<String>,
}

/// Extracts fields from the schema embedded in an Avro container file.
///
/// The schema is read once per extractor instance and reused for repeated calls on the same
/// path.
#[derive(Debug, Default)]
pub struct BinaryFileExtractor {
    cached: Option<CachedSchema>,
}

impl BinaryFileExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    fn schema_for(&mut self, path: &str) -> IngestResult<&CachedSchema> {
        let wanted = PathBuf::from(path);
        let fresh = match &self.cached {
            Some(cached) => cached.path != wanted,
            None => true,
        };
        if fresh {
            let file = open_source_file(path)?;
            let header = read_container_header(&mut BufReader::new(file))?;
            debug!(path, "read avro container header");
            self.cached = Some(CachedSchema {
                path: wanted,
                raw: header.schema_json()?.to_string(),
                codec: header.codec(),
            });
        }
        self.cached.as_ref().ok_or_else(|| IngestError::Avro {
            message: "schema cache is empty".to_string(),
        })
    }
}

impl Extractor for BinaryFileExtractor {
    fn kind(&self) -> SourceKind {
        SourceKind::BinaryFile
    }

    fn extract(&mut self, source: &SourceDescriptor) -> IngestResult<Vec<Extraction>> {
        let path = required_path(source)?;
        let cached = self.schema_for(path)?.clone();

        let schema: JsonValue = serde_json::from_str(&cached.raw)?;
        let fields = fields_from_schema(&schema)?;

        let mut extraction = Extraction {
            raw_schema: Some(cached.raw),
            ..Extraction::new(fields)
        };
        if let Some(codec) = cached.codec {
            extraction = extraction.with_property("codec", codec);
        }
        if let Some(name) = schema.get("name").and_then(JsonValue::as_str) {
            extraction = extraction.with_property("record_name", name);
        }
        if let Some(ns) = schema.get("namespace").and_then(JsonValue::as_str) {
            extraction = extraction.with_property("namespace", ns);
        }
        Ok(vec![extraction])
    }
}

/// Read and validate an Avro object container header.
pub fn read_container_header<R: Read>(r: &mut R) -> IngestResult<ContainerHeader> {
    let mut magic = [0u8; 4];
    read_exact(r, &mut magic)?;
    if magic != MAGIC {
        return Err(IngestError::Avro {
            message: format!("not an avro container file (magic {magic:?})"),
        });
    }

    let mut metadata = BTreeMap::new();
    loop {
        let mut count = read_long(r)?;
        if count == 0 {
            break;
        }
        if count < 0 {
            // Negative block counts are followed by the block's byte size.
            let _block_size = read_long(r)?;
            count = count.checked_neg().ok_or_else(|| IngestError::Avro {
                message: "metadata block count overflow".to_string(),
            })?;
        }
        for _ in 0..count {
            let key = String::from_utf8(read_bytes(r)?).map_err(|e| IngestError::Avro {
                message: format!("metadata key is not utf-8: {e}"),
            })?;
            let value = read_bytes(r)?;
            metadata.insert(key, value);
        }
    }

    let mut sync = [0u8; SYNC_MARKER_LEN];
    read_exact(r, &mut sync)?;

    Ok(ContainerHeader { metadata })
}

/// Map a record schema's fields to [`SchemaField`]s.
pub fn fields_from_schema(schema: &JsonValue) -> IngestResult<Vec<SchemaField>> {
    let kind = schema.get("type").and_then(JsonValue::as_str);
    if kind != Some("record") {
        return Err(IngestError::Avro {
            message: "top-level schema must be a record".to_string(),
        });
    }
    let fields = schema
        .get("fields")
        .and_then(JsonValue::as_array)
        .ok_or_else(|| IngestError::Avro {
            message: "record schema has no 'fields' array".to_string(),
        })?;

    fields
        .iter()
        .enumerate()
        .map(|(idx, field)| {
            let name = field
                .get("name")
                .and_then(JsonValue::as_str)
                .filter(|n| !n.is_empty())
                .ok_or_else(|| IngestError::Avro {
                    message: format!("field #{idx} has no name"),
                })?;
            let ty = field.get("type").unwrap_or(&JsonValue::Null);
            let (native, logical, nullable) = classify(ty);
            let mut out = SchemaField::new(name, native, logical).with_nullable(nullable);
            if let Some(doc) = field.get("doc").and_then(JsonValue::as_str) {
                out = out.with_description(doc);
            }
            Ok(out)
        })
        .collect()
}

/// Returns `(native type, logical type, nullable)` for a declared field type.
fn classify(ty: &JsonValue) -> (String, LogicalType, bool) {
    match ty {
        JsonValue::String(name) => (name.clone(), primitive_type(name), name == "null"),
        JsonValue::Array(members) => {
            let non_null: Vec<&JsonValue> = members
                .iter()
                .filter(|m| m.as_str() != Some("null"))
                .collect();
            let nullable = non_null.len() != members.len();
            match non_null.as_slice() {
                [single] => {
                    let (native, logical, inner_nullable) = classify(single);
                    (native, logical, nullable || inner_nullable)
                }
                [] => ("null".to_string(), LogicalType::String, true),
                _ => ("union".to_string(), LogicalType::String, nullable),
            }
        }
        JsonValue::Object(map) => {
            if let Some(logical) = map.get("logicalType").and_then(JsonValue::as_str) {
                return (logical.to_string(), logical_type(logical), false);
            }
            match map.get("type") {
                Some(JsonValue::String(name)) => (name.clone(), primitive_type(name), false),
                Some(inner) => classify(inner),
                None => ("unknown".to_string(), LogicalType::String, false),
            }
        }
        _ => ("unknown".to_string(), LogicalType::String, false),
    }
}

fn primitive_type(name: &str) -> LogicalType {
    match name {
        "int" | "long" | "float" | "double" => LogicalType::Number,
        "boolean" => LogicalType::Boolean,
        // string, bytes, null, record, enum, array, map, fixed and named references
        _ => LogicalType::String,
    }
}

fn logical_type(name: &str) -> LogicalType {
    match name {
        "date" | "time-millis" | "time-micros" | "timestamp-millis" | "timestamp-micros"
        | "timestamp-nanos" | "local-timestamp-millis" | "local-timestamp-micros"
        | "local-timestamp-nanos" => LogicalType::Time,
        "decimal" | "big-decimal" => LogicalType::Number,
        _ => LogicalType::String,
    }
}

fn read_exact<R: Read>(r: &mut R, buf: &mut [u8]) -> IngestResult<()> {
    r.read_exact(buf).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => IngestError::Avro {
            message: "truncated container header".to_string(),
        },
        _ => IngestError::Io(e),
    })
}

/// Zig-zag encoded variable-length long.
fn read_long<R: Read>(r: &mut R) -> IngestResult<i64> {
    let mut value: u64 = 0;
    let mut shift = 0u32;
    loop {
        let mut byte = [0u8; 1];
        read_exact(r, &mut byte)?;
        value |= u64::from(byte[0] & 0x7f) << shift;
        if byte[0] & 0x80 == 0 {
            break;
        }
        shift += 7;
        if shift > 63 {
            return Err(IngestError::Avro {
                message: "variable-length integer is too long".to_string(),
            });
        }
    }
    Ok(((value >> 1) as i64) ^ -((value & 1) as i64))
}

fn read_bytes<R: Read>(r: &mut R) -> IngestResult<Vec<u8>> {
    let len = read_long(r)?;
    if !(0..=MAX_METADATA_VALUE_LEN).contains(&len) {
        return Err(IngestError::Avro {
            message: format!("invalid metadata length {len}"),
        });
    }
    let mut buf = vec![0u8; len as usize];
    read_exact(r, &mut buf)?;
    Ok(buf)
}
