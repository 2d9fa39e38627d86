//! Delimited-file extractor.

use std::io::Read;
use std::path::Path;

use tracing::debug;

use crate::config::SourceDescriptor;
use crate::error::{IngestError, IngestResult};
use crate::types::{Extraction, LogicalType, SchemaField};

use super::registry::SourceKind;
use super::{explicit_fields, open_source_file, required_path, Extractor};

/// Delimiter used when the job does not declare one.
pub const DEFAULT_DELIMITER: u8 = b',';

const TSV: &str = "tsv";

/// Reads a header row plus all records and infers one field per column.
///
/// Rules:
///
/// - The file must have a header row.
/// - A column is `number` when every non-empty cell parses as a number, otherwise `string`.
/// - A column with at least one empty cell is nullable.
/// - An explicit `schema` on the job replaces inference entirely.
#[derive(Debug, Default)]
pub struct DelimitedFileExtractor;

impl DelimitedFileExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for DelimitedFileExtractor {
    fn kind(&self) -> SourceKind {
        SourceKind::DelimitedFile
    }

    fn extract(&mut self, source: &SourceDescriptor) -> IngestResult<Vec<Extraction>> {
        let path = required_path(source)?;
        let delimiter = source_delimiter(source)?;
        let file = open_source_file(path)?;

        if let Some(schema) = source.explicit_schema()? {
            debug!(path, fields = schema.len(), "using explicit schema");
            let extraction = Extraction::new(explicit_fields(&schema))
                .with_property("delimiter", char::from(delimiter))
                .with_property("column_count", schema.len())
                .with_property("schema_source", "explicit");
            return Ok(vec![extraction]);
        }

        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .delimiter(delimiter)
            .flexible(true)
            .from_reader(file);
        let (fields, rows) = infer_fields_from_reader(&mut rdr)?;
        debug!(path, columns = fields.len(), rows, "inferred delimited schema");

        let column_count = fields.len();
        let extraction = Extraction::new(fields)
            .with_property("delimiter", char::from(delimiter))
            .with_property("column_count", column_count)
            .with_property("row_count", rows)
            .with_property("schema_source", "inferred");
        Ok(vec![extraction])
    }
}

/// Convert a declared delimiter into the byte the reader splits on.
///
/// `None` means the default comma. Anything other than exactly one ASCII character is a
/// configuration error.
pub fn delimiter_byte(declared: Option<&str>) -> IngestResult<u8> {
    let Some(raw) = declared else {
        return Ok(DEFAULT_DELIMITER);
    };
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii() => Ok(c as u8),
        (Some(_), None) => Err(IngestError::config(
            "delimiter",
            format!("delimiter '{raw}' must be an ASCII character"),
        )),
        _ => Err(IngestError::config(
            "delimiter",
            format!(
                "delimiter must be exactly one character, got '{raw}' ({} characters)",
                raw.chars().count()
            ),
        )),
    }
}

/// The delimiter a job reads with: the declared one, else a tab for `tsv` jobs or `.tsv`
/// files, else a comma.
pub fn source_delimiter(source: &SourceDescriptor) -> IngestResult<u8> {
    if source.delimiter.is_some() {
        return delimiter_byte(source.delimiter.as_deref());
    }
    let tsv_kind = source
        .declared_kind()
        .is_some_and(|k| k.trim().eq_ignore_ascii_case(TSV));
    let tsv_file = source
        .source_location()
        .and_then(|p| Path::new(p.trim()).extension())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(TSV));
    Ok(if tsv_kind || tsv_file { b'\t' } else { DEFAULT_DELIMITER })
}

/// Infer fields from an existing reader. Returns the fields and the number of data rows.
pub fn infer_fields_from_reader<R: Read>(
    rdr: &mut csv::Reader<R>,
) -> IngestResult<(Vec<SchemaField>, usize)> {
    let headers = rdr.headers()?.clone();
    let mut columns: Vec<ColumnStats> = vec![ColumnStats::default(); headers.len()];

    let mut rows = 0usize;
    for result in rdr.records() {
        let record = result?;
        rows += 1;
        for (idx, stats) in columns.iter_mut().enumerate() {
            stats.observe(record.get(idx).unwrap_or(""));
        }
    }

    let mut fields = Vec::with_capacity(headers.len());
    for (idx, (header, stats)) in headers.iter().zip(columns.iter()).enumerate() {
        let name = header.trim();
        let name = if name.is_empty() {
            format!("column_{}", idx + 1)
        } else {
            name.to_string()
        };
        let (native, logical) = stats.classify();
        fields.push(SchemaField::new(name, native, logical).with_nullable(stats.has_empty));
    }
    Ok((fields, rows))
}

#[derive(Debug, Clone, Copy)]
struct ColumnStats {
    all_int: bool,
    all_float: bool,
    has_value: bool,
    has_empty: bool,
}

impl Default for ColumnStats {
    fn default() -> Self {
        Self {
            all_int: true,
            all_float: true,
            has_value: false,
            has_empty: false,
        }
    }
}

impl ColumnStats {
    fn observe(&mut self, raw: &str) {
        let cell = raw.trim();
        if cell.is_empty() {
            self.has_empty = true;
            return;
        }
        self.has_value = true;
        if self.all_int && cell.parse::<i64>().is_err() {
            self.all_int = false;
        }
        if self.all_float && !cell.parse::<f64>().is_ok_and(f64::is_finite) {
            self.all_float = false;
        }
    }

    fn classify(&self) -> (&'static str, LogicalType) {
        if !self.has_value {
            ("utf8", LogicalType::String)
        } else if self.all_int {
            ("int64", LogicalType::Number)
        } else if self.all_float {
            ("float64", LogicalType::Number)
        } else {
            ("utf8", LogicalType::String)
        }
    }
}
