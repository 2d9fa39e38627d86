use std::io::Write;
use std::path::Path;

use metadata_ingest::config::SourceDescriptor;
use metadata_ingest::ingestion::avro::read_container_header;
use metadata_ingest::ingestion::{BinaryFileExtractor, Extractor};
use metadata_ingest::types::LogicalType;
use metadata_ingest::IngestError;

fn encode_long(out: &mut Vec<u8>, v: i64) {
    let mut n = ((v << 1) ^ (v >> 63)) as u64;
    loop {
        if n & !0x7f == 0 {
            out.push(n as u8);
            break;
        }
        out.push(((n & 0x7f) | 0x80) as u8);
        n >>= 7;
    }
}

fn encode_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    encode_long(out, bytes.len() as i64);
    out.extend_from_slice(bytes);
}

/// A container header (no data blocks) carrying `schema`.
fn container_bytes(schema: &str, codec: &str) -> Vec<u8> {
    let mut out = b"Obj\x01".to_vec();
    encode_long(&mut out, 2);
    encode_bytes(&mut out, b"avro.schema");
    encode_bytes(&mut out, schema.as_bytes());
    encode_bytes(&mut out, b"avro.codec");
    encode_bytes(&mut out, codec.as_bytes());
    encode_long(&mut out, 0);
    out.extend_from_slice(&[0xab; 16]);
    out
}

fn write_file(path: &Path, bytes: &[u8]) {
    let mut f = std::fs::File::create(path).unwrap();
    f.write_all(bytes).unwrap();
}

const USER_SCHEMA: &str = r#"{
  "type": "record",
  "name": "User",
  "namespace": "com.example",
  "fields": [
    {"name": "id", "type": "long", "doc": "primary key"},
    {"name": "email", "type": ["null", "string"]},
    {"name": "signup", "type": {"type": "long", "logicalType": "timestamp-millis"}},
    {"name": "active", "type": "boolean"},
    {"name": "tags", "type": {"type": "array", "items": "string"}},
    {"name": "address", "type": {"type": "record", "name": "Address", "fields": [{"name": "city", "type": "string"}]}},
    {"name": "either", "type": ["null", "int", "string"]}
  ]
}"#;

#[test]
fn extracts_fields_from_embedded_schema() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("users.avro");
    write_file(&path, &container_bytes(USER_SCHEMA, "deflate"));

    let source = SourceDescriptor::new("binary-file", path.to_string_lossy());
    let extraction = BinaryFileExtractor::new().extract(&source).unwrap();
    assert_eq!(extraction.len(), 1);
    let e = &extraction[0];

    let summary: Vec<(&str, LogicalType, bool)> = e
        .fields
        .iter()
        .map(|f| (f.name.as_str(), f.logical_type, f.nullable))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("id", LogicalType::Number, false),
            ("email", LogicalType::String, true),
            ("signup", LogicalType::Time, false),
            ("active", LogicalType::Boolean, false),
            ("tags", LogicalType::String, false),
            ("address", LogicalType::String, false),
            ("either", LogicalType::String, true),
        ]
    );
    assert_eq!(e.fields[0].description.as_deref(), Some("primary key"));
    assert_eq!(e.raw_schema.as_deref(), Some(USER_SCHEMA));
    assert_eq!(e.properties["codec"], "deflate");
    assert_eq!(e.properties["record_name"], "User");
    assert_eq!(e.properties["namespace"], "com.example");
}

#[test]
fn schema_is_cached_per_extractor_instance() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("users.avro");
    write_file(&path, &container_bytes(USER_SCHEMA, "null"));
    let source = SourceDescriptor::new("binary-file", path.to_string_lossy());

    let mut extractor = BinaryFileExtractor::new();
    let first = extractor.extract(&source).unwrap();

    // The second call must not need the file again.
    std::fs::remove_file(&path).unwrap();
    let second = extractor.extract(&source).unwrap();
    assert_eq!(first, second);

    // A fresh instance reads the file and fails.
    assert!(BinaryFileExtractor::new().extract(&source).is_err());
}

#[test]
fn rejects_non_container_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bogus.avro");
    write_file(&path, b"PAR1 definitely not avro");

    let source = SourceDescriptor::new("binary-file", path.to_string_lossy());
    let err = BinaryFileExtractor::new().extract(&source).unwrap_err();
    assert!(matches!(err, IngestError::Avro { .. }), "{err}");
}

#[test]
fn truncated_header_is_an_error() {
    let bytes = container_bytes(USER_SCHEMA, "null");
    let truncated = &bytes[..bytes.len() - 20];
    let err = read_container_header(&mut &truncated[..]).unwrap_err();
    assert!(err.to_string().contains("truncated"));
}

#[test]
fn header_with_negative_block_count_is_read() {
    let mut out = b"Obj\x01".to_vec();
    encode_long(&mut out, -1);
    let mut entry = Vec::new();
    encode_bytes(&mut entry, b"avro.schema");
    encode_bytes(&mut entry, br#"{"type":"record","name":"R","fields":[]}"#);
    encode_long(&mut out, entry.len() as i64);
    out.extend_from_slice(&entry);
    encode_long(&mut out, 0);
    out.extend_from_slice(&[0; 16]);

    let header = read_container_header(&mut &out[..]).unwrap();
    assert!(header.schema_json().unwrap().contains("\"R\""));
    assert_eq!(header.codec(), None);
}
