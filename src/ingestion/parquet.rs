//! Columnar-file extractor (Parquet).

use parquet::basic::{ConvertedType, LogicalType as ParquetLogicalType, Repetition, Type as PhysicalType};
use parquet::file::reader::FileReader;
use parquet::file::serialized_reader::SerializedFileReader;
use parquet::schema::types::Type as SchemaType;
use tracing::debug;

use crate::config::SourceDescriptor;
use crate::error::IngestResult;
use crate::types::{Extraction, LogicalType, SchemaField};

use super::registry::SourceKind;
use super::{explicit_fields, open_source_file, required_path, Extractor};

/// Reads the Parquet footer and maps each top-level column to a field.
///
/// Notes:
/// - Only metadata is read; row groups are never decoded.
/// - `OPTIONAL` columns are nullable.
/// - Nested groups (lists, maps, structs) are reported as `string`.
/// - An explicit `schema` on the job replaces the footer schema.
#[derive(Debug, Default)]
pub struct ColumnarFileExtractor;

impl ColumnarFileExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for ColumnarFileExtractor {
    fn kind(&self) -> SourceKind {
        SourceKind::ColumnarFile
    }

    fn extract(&mut self, source: &SourceDescriptor) -> IngestResult<Vec<Extraction>> {
        let path = required_path(source)?;
        let file = open_source_file(path)?;
        let reader = SerializedFileReader::new(file)?;

        let metadata = reader.metadata();
        let file_metadata = metadata.file_metadata();

        let fields = match source.explicit_schema()? {
            Some(schema) => explicit_fields(&schema),
            None => file_metadata
                .schema()
                .get_fields()
                .iter()
                .map(|column| column_field(column))
                .collect(),
        };
        debug!(path, columns = fields.len(), "read parquet footer schema");

        let mut extraction = Extraction::new(fields)
            .with_property("num_rows", file_metadata.num_rows())
            .with_property("num_row_groups", metadata.num_row_groups());
        if let Some(created_by) = file_metadata.created_by() {
            extraction = extraction.with_property("created_by", created_by);
        }
        Ok(vec![extraction])
    }
}

fn column_field(column: &SchemaType) -> SchemaField {
    let info = column.get_basic_info();
    let nullable = info.has_repetition() && info.repetition() == Repetition::OPTIONAL;
    let converted = info.converted_type();

    let (native, logical) = if column.is_primitive() {
        let physical = column.get_physical_type();
        let native = match converted {
            ConvertedType::NONE => physical.to_string(),
            other => format!("{physical} ({other})"),
        };
        let logical = column_logical_type(physical, converted, info.logical_type().as_ref());
        (native, logical)
    } else {
        let native = match converted {
            ConvertedType::LIST => "LIST".to_string(),
            ConvertedType::MAP | ConvertedType::MAP_KEY_VALUE => "MAP".to_string(),
            _ => "GROUP".to_string(),
        };
        (native, LogicalType::String)
    };

    SchemaField::new(column.name(), native, logical).with_nullable(nullable)
}

/// Canonical type for a primitive column. Annotations win over the physical type.
pub fn column_logical_type(
    physical: PhysicalType,
    converted: ConvertedType,
    annotated: Option<&ParquetLogicalType>,
) -> LogicalType {
    match annotated {
        Some(ParquetLogicalType::Date)
        | Some(ParquetLogicalType::Time { .. })
        | Some(ParquetLogicalType::Timestamp { .. }) => return LogicalType::Time,
        Some(ParquetLogicalType::Decimal { .. }) | Some(ParquetLogicalType::Integer { .. }) => {
            return LogicalType::Number;
        }
        Some(ParquetLogicalType::String)
        | Some(ParquetLogicalType::Enum)
        | Some(ParquetLogicalType::Json)
        | Some(ParquetLogicalType::Bson)
        | Some(ParquetLogicalType::Uuid) => return LogicalType::String,
        _ => {}
    }

    match converted {
        ConvertedType::DATE
        | ConvertedType::TIME_MILLIS
        | ConvertedType::TIME_MICROS
        | ConvertedType::TIMESTAMP_MILLIS
        | ConvertedType::TIMESTAMP_MICROS => return LogicalType::Time,
        ConvertedType::DECIMAL
        | ConvertedType::INT_8
        | ConvertedType::INT_16
        | ConvertedType::INT_32
        | ConvertedType::INT_64
        | ConvertedType::UINT_8
        | ConvertedType::UINT_16
        | ConvertedType::UINT_32
        | ConvertedType::UINT_64 => return LogicalType::Number,
        ConvertedType::UTF8
        | ConvertedType::ENUM
        | ConvertedType::JSON
        | ConvertedType::BSON
        | ConvertedType::INTERVAL => return LogicalType::String,
        _ => {}
    }

    match physical {
        PhysicalType::BOOLEAN => LogicalType::Boolean,
        PhysicalType::INT32 | PhysicalType::INT64 | PhysicalType::FLOAT | PhysicalType::DOUBLE => {
            LogicalType::Number
        }
        // Legacy nanosecond timestamps.
        PhysicalType::INT96 => LogicalType::Time,
        PhysicalType::BYTE_ARRAY | PhysicalType::FIXED_LEN_BYTE_ARRAY => LogicalType::String,
    }
}
