use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::{TimeZone, Utc};

use metadata_ingest::catalog::{CatalogCache, InMemoryCatalog};
use metadata_ingest::config::{SinkDescriptor, SourceDescriptor};
use metadata_ingest::ingestion::SourceKind;
use metadata_ingest::orchestrator::{
    normalize, resolve_effective_path, validate, DirectoryJobs, JobState, Orchestrator,
    OrchestratorOptions, PathTarget,
};
use metadata_ingest::IngestError;

const SAMPLE: &str = "id,name,value\n1,test,100\n2,foo,200\n";

fn write(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

fn csv_job(path: &Path) -> SourceDescriptor {
    SourceDescriptor::new("delimited-file", path.to_string_lossy())
}

fn orchestrator() -> (Orchestrator, Arc<InMemoryCatalog>) {
    let catalog = Arc::new(InMemoryCatalog::new());
    (Orchestrator::new(CatalogCache::shared(catalog.clone())), catalog)
}

#[test]
fn directory_job_only_reads_matching_extensions() {
    let dir = tempfile::tempdir().unwrap();
    write(&dir.path().join("a.csv"), SAMPLE);
    write(&dir.path().join("b.csv"), SAMPLE);
    write(&dir.path().join("c.txt"), SAMPLE);

    let (orchestrator, catalog) = orchestrator();
    let report = orchestrator
        .run_batch(&[csv_job(dir.path())], &SinkDescriptor::default())
        .unwrap();
    assert_eq!(report.results[0].items_attempted, 2);

    let mut names: Vec<String> = catalog.snapshots().into_iter().map(|s| s.name).collect();
    names.sort();
    assert_eq!(names, vec!["a", "b"]);
}

#[test]
fn directory_jobs_match_case_insensitively_and_restart() {
    let dir = tempfile::tempdir().unwrap();
    write(&dir.path().join("UPPER.CSV"), SAMPLE);
    write(&dir.path().join("lower.csv"), SAMPLE);
    write(&dir.path().join("nested/inner.csv"), SAMPLE);
    write(&dir.path().join("notes.md"), "x");

    let template = csv_job(dir.path());
    let jobs = DirectoryJobs::new(&template, dir.path(), SourceKind::DelimitedFile).unwrap();
    let restarted = jobs.restart();

    let names: Vec<String> = jobs
        .map(|job| job.unwrap().dataset_name.unwrap())
        .collect();
    assert_eq!(names, vec!["UPPER", "lower"]);
    assert_eq!(restarted.count(), 2);
}

#[test]
fn empty_directory_is_a_warning_not_a_failure() {
    let dir = tempfile::tempdir().unwrap();
    write(&dir.path().join("readme.txt"), "nothing here");

    let (orchestrator, catalog) = orchestrator();
    let report = orchestrator
        .run_batch(&[csv_job(dir.path())], &SinkDescriptor::default())
        .unwrap();
    assert!(report.results[0].success);
    assert_eq!(report.results[0].snapshots_emitted, 0);
    assert!(catalog.snapshots().is_empty());
}

#[test]
fn directory_job_continues_past_a_bad_file() {
    let dir = tempfile::tempdir().unwrap();
    write(&dir.path().join("a.parquet"), "not parquet at all");
    let good = dir.path().join("b.parquet");
    {
        use parquet::file::properties::WriterProperties;
        use parquet::file::writer::SerializedFileWriter;
        use parquet::schema::parser::parse_message_type;

        let schema = Arc::new(parse_message_type("message m { OPTIONAL INT32 x; }").unwrap());
        let file = fs::File::create(&good).unwrap();
        let writer =
            SerializedFileWriter::new(file, schema, Arc::new(WriterProperties::builder().build()))
                .unwrap();
        writer.close().unwrap();
    }

    let (orchestrator, catalog) = orchestrator();
    let job = SourceDescriptor::new("columnar-file", dir.path().to_string_lossy());
    let report = orchestrator.run_batch(&[job], &SinkDescriptor::default()).unwrap();

    let result = &report.results[0];
    assert!(result.success);
    assert_eq!(result.items_attempted, 2);
    assert_eq!(result.items_failed, 1);
    assert_eq!(catalog.snapshots()[0].name, "b");
    assert!(report.to_string().contains("1 of 2 files failed"));
}

#[test]
fn file_name_selects_one_file_in_a_directory() {
    let dir = tempfile::tempdir().unwrap();
    write(&dir.path().join("a.csv"), SAMPLE);
    write(&dir.path().join("b.csv"), SAMPLE);

    let mut job = csv_job(dir.path());
    job.file_name = Some("b.csv".to_string());
    let effective = resolve_effective_path(&job, None).unwrap();
    assert_eq!(effective.target, PathTarget::File);

    let (orchestrator, catalog) = orchestrator();
    orchestrator.run_batch(&[job], &SinkDescriptor::default()).unwrap();
    let snapshots = catalog.snapshots();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].name, "b");
}

#[test]
fn delimiter_must_be_a_single_character() {
    let mut job = SourceDescriptor::new("delimited-file", "data.csv");
    job.delimiter = Some("||".to_string());
    let err = validate(&job).unwrap_err();
    assert!(err.is_configuration());
    assert!(err.to_string().contains("delimiter"));

    job.delimiter = Some("|".to_string());
    assert_eq!(validate(&job).unwrap(), SourceKind::DelimitedFile);
}

#[test]
fn delimiter_on_other_kinds_is_ignored() {
    let mut job = SourceDescriptor::new("columnar-file", "data.parquet");
    job.delimiter = Some("||".to_string());
    assert_eq!(validate(&job).unwrap(), SourceKind::ColumnarFile);
}

#[test]
fn validation_reports_the_offending_field() {
    let missing_kind = SourceDescriptor {
        path: Some("x.csv".to_string()),
        ..Default::default()
    };
    match validate(&missing_kind).unwrap_err() {
        IngestError::Config { field, .. } => assert_eq!(field, "kind"),
        other => panic!("unexpected error: {other}"),
    }

    let missing_path = SourceDescriptor {
        kind: Some("binary-file".to_string()),
        ..Default::default()
    };
    match validate(&missing_path).unwrap_err() {
        IngestError::Config { field, .. } => assert_eq!(field, "path"),
        other => panic!("unexpected error: {other}"),
    }

    let legacy_path = SourceDescriptor {
        kind: Some("binary-file".to_string()),
        source_path: Some("x.avro".to_string()),
        ..Default::default()
    };
    assert!(validate(&legacy_path).is_ok());
}

#[test]
fn unsupported_kind_lists_supported_kinds() {
    let job = SourceDescriptor::new("spreadsheet", "x.xlsx");
    let err = validate(&job).unwrap_err();
    assert!(matches!(err, IngestError::UnsupportedKind { .. }));
    let msg = err.to_string();
    for kind in ["delimited-file", "binary-file", "columnar-file", "document-db", "object-store"] {
        assert!(msg.contains(kind), "{msg}");
    }
}

#[test]
fn normalize_is_idempotent() {
    let samples = vec![
        SourceDescriptor::default(),
        SourceDescriptor::new("CSV", " data/a.csv "),
        SourceDescriptor {
            source_type: Some("parquet".to_string()),
            source_path: Some("data/x.parquet".to_string()),
            ..Default::default()
        },
        SourceDescriptor {
            kind: Some("object-store".to_string()),
            source_type: Some("csv".to_string()),
            path: Some("s3://b/p".to_string()),
            source_path: Some("s3://other/q".to_string()),
            ..Default::default()
        },
        SourceDescriptor::new("unknown-kind", "x"),
    ];
    for x in samples {
        let once = normalize(&x);
        assert_eq!(normalize(&once), once, "{x:?}");
    }
}

#[test]
fn mixed_batch_records_each_job_independently() {
    let dir = tempfile::tempdir().unwrap();
    write(&dir.path().join("one.csv"), SAMPLE);
    write(&dir.path().join("three.csv"), SAMPLE);

    let jobs = vec![
        csv_job(&dir.path().join("one.csv")),
        csv_job(&dir.path().join("two.csv")),
        csv_job(&dir.path().join("three.csv")),
    ];
    let (orchestrator, catalog) = orchestrator();
    let report = orchestrator.run_batch(&jobs, &SinkDescriptor::default()).unwrap();

    assert_eq!(report.results.len(), 3);
    let outcomes: Vec<bool> = report.results.iter().map(|r| r.success).collect();
    assert_eq!(outcomes, vec![true, false, true]);
    assert_eq!(report.results[1].failed_at, Some(JobState::PathResolved));
    assert!(report.results[1].error.as_deref().unwrap().contains("two.csv"));
    assert_eq!((report.succeeded(), report.failed()), (2, 1));
    assert_eq!(catalog.snapshots().len(), 2);

    let summary = report.to_string();
    assert!(summary.contains("3 attempted, 2 succeeded, 1 failed"));
    assert!(summary.contains("delimited-file"));
}

#[test]
fn batch_where_every_job_fails_raises() {
    let dir = tempfile::tempdir().unwrap();
    let jobs: Vec<SourceDescriptor> = ["x.csv", "y.csv", "z.csv"]
        .iter()
        .map(|f| csv_job(&dir.path().join(f)))
        .collect();

    let (orchestrator, _) = orchestrator();
    let err = orchestrator
        .run_batch(&jobs, &SinkDescriptor::default())
        .unwrap_err();
    let report = err.batch_report().cloned().unwrap();
    assert_eq!((report.attempted(), report.failed()), (3, 3));
    let summary = report.to_string();
    for file in ["x.csv", "y.csv", "z.csv"] {
        assert!(summary.contains(file), "{summary}");
    }
    match err {
        IngestError::BatchFailed { attempted, last, .. } => {
            assert_eq!(attempted, 3);
            assert!(last.to_string().contains("z.csv"), "{last}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn empty_batch_is_a_configuration_error() {
    let (orchestrator, _) = orchestrator();
    let err = orchestrator.run_batch(&[], &SinkDescriptor::default()).unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn snapshot_carries_csv_example_fields_and_properties() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("metrics.csv");
    write(&path, SAMPLE);

    let mut job = csv_job(&path);
    job.dataset_name = Some("daily_metrics".to_string());
    job.description = Some("Daily metrics export".to_string());
    job.partition_cron = Some("not a cron expression".to_string());
    job.properties = Some([("team".to_string(), "data".to_string())].into_iter().collect());
    job.env = Some("QA".to_string());

    let (orchestrator, catalog) = orchestrator();
    orchestrator.run_batch(&[job], &SinkDescriptor::new("DEV")).unwrap();

    let snapshot = catalog
        .snapshot("urn:li:dataset:(urn:li:dataPlatform:delimited-file,daily_metrics,QA)")
        .unwrap();
    let fields: Vec<(&str, &str)> = snapshot
        .fields
        .iter()
        .map(|f| (f.name.as_str(), f.logical_type.as_str()))
        .collect();
    assert_eq!(
        fields,
        vec![("id", "number"), ("name", "string"), ("value", "number")]
    );
    assert_eq!(snapshot.description.as_deref(), Some("Daily metrics export"));
    assert_eq!(snapshot.properties["source_kind"], "delimited-file");
    assert_eq!(snapshot.properties["team"], "data");
    assert_eq!(snapshot.properties["partition_cron"], "not a cron expression");
    assert!(snapshot.properties.contains_key("ingested_at"));
    assert!(!snapshot.properties.contains_key("partition_path"));
}

#[test]
fn partitioned_directory_is_resolved_against_run_timestamp() {
    let dir = tempfile::tempdir().unwrap();
    write(&dir.path().join("year=2024/month=12/day=27/sales.csv"), SAMPLE);
    write(&dir.path().join("year=2024/month=12/day=26/old.csv"), SAMPLE);

    let mut job = csv_job(dir.path());
    job.partitioning_format = Some("year=%Y/month=%m/day=%d".to_string());

    let catalog = Arc::new(InMemoryCatalog::new());
    let options = OrchestratorOptions {
        run_timestamp: Some(Utc.with_ymd_and_hms(2024, 12, 27, 4, 0, 0).unwrap()),
        ..Default::default()
    };
    let orchestrator = Orchestrator::new(CatalogCache::shared(catalog.clone())).with_options(options);
    orchestrator.run_batch(&[job], &SinkDescriptor::default()).unwrap();

    let snapshots = catalog.snapshots();
    assert_eq!(snapshots.len(), 1);
    let s = &snapshots[0];
    assert_eq!(s.name, "sales");
    assert!(s.properties["partition_path"].ends_with("year=2024/month=12/day=27"));
    assert_eq!(
        s.properties["partition_values"],
        r#"{"day":"27","month":"12","year":"2024"}"#
    );
}

#[test]
fn each_platform_gets_its_own_emitter() {
    let dir = tempfile::tempdir().unwrap();
    write(&dir.path().join("a.csv"), SAMPLE);

    let shared = Arc::new(InMemoryCatalog::new());
    let for_factory = shared.clone();
    let cache = CatalogCache::new(move |_platform| {
        Ok(for_factory.clone() as Arc<dyn metadata_ingest::catalog::CatalogEmitter>)
    });
    let orchestrator = Orchestrator::new(cache);
    let jobs = vec![
        csv_job(&dir.path().join("a.csv")),
        csv_job(&dir.path().join("a.csv")),
    ];
    orchestrator.run_batch(&jobs, &SinkDescriptor::default()).unwrap();

    assert_eq!(orchestrator.catalogs().len(), 1);
    assert_eq!(shared.snapshots().len(), 2);
}
