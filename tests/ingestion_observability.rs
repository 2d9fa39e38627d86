use std::sync::{Arc, Mutex};

use metadata_ingest::catalog::{CatalogCache, InMemoryCatalog};
use metadata_ingest::config::{SinkDescriptor, SourceDescriptor};
use metadata_ingest::ingestion::{
    CompositeObserver, FileObserver, IngestionContext, IngestionObserver, IngestionSeverity,
    IngestionStats, SourceKind, TracingObserver,
};
use metadata_ingest::orchestrator::{Orchestrator, OrchestratorOptions};
use metadata_ingest::IngestError;

#[derive(Default)]
struct RecordingObserver {
    successes: Mutex<Vec<(Option<SourceKind>, IngestionStats)>>,
    failures: Mutex<Vec<IngestionSeverity>>,
    alerts: Mutex<Vec<IngestionSeverity>>,
}

impl IngestionObserver for RecordingObserver {
    fn on_success(&self, ctx: &IngestionContext, stats: IngestionStats) {
        self.successes.lock().unwrap().push((ctx.kind, stats));
    }

    fn on_failure(&self, _ctx: &IngestionContext, severity: IngestionSeverity, _error: &IngestError) {
        self.failures.lock().unwrap().push(severity);
    }

    fn on_alert(&self, _ctx: &IngestionContext, severity: IngestionSeverity, _error: &IngestError) {
        self.alerts.lock().unwrap().push(severity);
    }
}

fn observed(obs: Arc<dyn IngestionObserver>, threshold: IngestionSeverity) -> Orchestrator {
    let options = OrchestratorOptions {
        observer: Some(obs),
        alert_at_or_above: threshold,
        ..Default::default()
    };
    Orchestrator::new(CatalogCache::shared(Arc::new(InMemoryCatalog::new()))).with_options(options)
}

#[test]
fn observer_receives_failure_and_alert_on_missing_file() {
    let obs = Arc::new(RecordingObserver::default());
    let orchestrator = observed(obs.clone(), IngestionSeverity::Critical);

    // Missing file -> unavailable source -> Critical
    let jobs = vec![SourceDescriptor::new(
        "delimited-file",
        "tests/fixtures/does_not_exist.csv",
    )];
    let _ = orchestrator
        .run_batch(&jobs, &SinkDescriptor::default())
        .unwrap_err();

    let failures = obs.failures.lock().unwrap().clone();
    let alerts = obs.alerts.lock().unwrap().clone();
    assert_eq!(failures, vec![IngestionSeverity::Critical]);
    assert_eq!(alerts, vec![IngestionSeverity::Critical]);
}

#[test]
fn observer_receives_failure_without_alert_for_bad_job() {
    let obs = Arc::new(RecordingObserver::default());
    let orchestrator = observed(obs.clone(), IngestionSeverity::Critical);

    // Bad delimiter -> configuration error -> Warning, below the alert threshold
    let mut job = SourceDescriptor::new("delimited-file", "tests/fixtures/sample.csv");
    job.delimiter = Some(";;".to_string());
    let _ = orchestrator
        .run_batch(&[job], &SinkDescriptor::default())
        .unwrap_err();

    let failures = obs.failures.lock().unwrap().clone();
    assert_eq!(failures, vec![IngestionSeverity::Warning]);
    assert!(obs.alerts.lock().unwrap().is_empty());
}

#[test]
fn lower_threshold_alerts_on_errors_too() {
    let obs = Arc::new(RecordingObserver::default());
    let orchestrator = observed(obs.clone(), IngestionSeverity::Warning);

    let jobs = vec![
        SourceDescriptor::new("ftp", "x"),
        SourceDescriptor::new("delimited-file", "tests/fixtures/sample.csv"),
    ];
    orchestrator.run_batch(&jobs, &SinkDescriptor::default()).unwrap();

    assert_eq!(*obs.alerts.lock().unwrap(), vec![IngestionSeverity::Warning]);
    assert_eq!(obs.successes.lock().unwrap().len(), 1);
}

#[test]
fn observer_receives_success_stats() {
    let obs = Arc::new(RecordingObserver::default());
    let orchestrator = observed(obs.clone(), IngestionSeverity::Critical);

    let jobs = vec![SourceDescriptor::new(
        "csv",
        "tests/fixtures/sample.csv",
    )];
    orchestrator.run_batch(&jobs, &SinkDescriptor::default()).unwrap();

    let successes = obs.successes.lock().unwrap().clone();
    assert_eq!(successes.len(), 1);
    let (kind, stats) = successes[0];
    assert_eq!(kind, Some(SourceKind::DelimitedFile));
    assert_eq!(
        stats,
        IngestionStats {
            snapshots: 1,
            fields: 3,
            items_failed: 0,
        }
    );
    assert!(obs.failures.lock().unwrap().is_empty());
}

#[test]
fn composite_observer_fans_out_to_file_log() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("ingest.log");
    let recorder = Arc::new(RecordingObserver::default());
    let observers: Vec<Arc<dyn IngestionObserver>> =
        vec![recorder.clone(), Arc::new(FileObserver::new(&log))];
    let orchestrator = observed(
        Arc::new(CompositeObserver::new(observers)),
        IngestionSeverity::Critical,
    );

    let jobs = vec![
        SourceDescriptor::new("csv", "tests/fixtures/sample.csv"),
        SourceDescriptor::new("csv", "tests/fixtures/does_not_exist.csv"),
    ];
    orchestrator.run_batch(&jobs, &SinkDescriptor::default()).unwrap();

    assert_eq!(recorder.successes.lock().unwrap().len(), 1);
    assert_eq!(*recorder.alerts.lock().unwrap(), vec![IngestionSeverity::Critical]);

    let text = std::fs::read_to_string(&log).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains(" ok source=csv tests/fixtures/sample.csv"), "{text}");
    assert!(lines[0].contains("snapshots=1 fields=3"), "{text}");
    assert!(lines[1].contains("ALERT severity=Critical"), "{text}");
    assert!(lines[1].contains("does_not_exist.csv"), "{text}");
}

/// Collects formatted log output in memory.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn tracing_observer_logs_each_failed_job_once() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::INFO)
        .finish();

    let orchestrator = observed(
        Arc::new(TracingObserver::new(IngestionSeverity::Critical)),
        IngestionSeverity::Critical,
    );
    let mut bad_delimiter = SourceDescriptor::new("csv", "tests/fixtures/sample.csv");
    bad_delimiter.delimiter = Some(";;".to_string());
    let jobs = vec![
        SourceDescriptor::new("csv", "tests/fixtures/does_not_exist.csv"),
        bad_delimiter,
        SourceDescriptor::new("csv", "tests/fixtures/sample.csv"),
    ];
    tracing::subscriber::with_default(subscriber, || {
        orchestrator.run_batch(&jobs, &SinkDescriptor::default()).unwrap();
    });

    let text = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
    assert_eq!(text.matches("job failed").count(), 2, "{text}");
    let alerts: Vec<&str> = text.lines().filter(|l| l.contains("alert=true")).collect();
    assert_eq!(alerts.len(), 1, "{text}");
    assert!(alerts[0].contains("ERROR"), "{text}");
    assert!(alerts[0].contains("does_not_exist.csv"), "{text}");
    assert_eq!(text.matches("job succeeded").count(), 1, "{text}");
}
