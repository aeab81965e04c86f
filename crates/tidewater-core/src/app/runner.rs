//! ExtractionRunner - タスク実行ループ
//!
//! # フロー（タスクごと）
//! 1. SourceSet から task の source を取得
//! 2. QuerySource::execute() で ResultSet 取得
//! 3. Transform::normalize() で整形
//! 4. RecordSink::persist() で書き出し
//!
//! どのステップの失敗も Failed outcome に変換され、次のタスクへ進みます。
//! 1 つのタスクの失敗で run が止まることはありません。

use std::sync::Arc;
use std::time::Instant;

use tracing::Instrument;

use super::session::SourceSet;
use crate::domain::{ExtractionOutcome, RunSummary, TaskDefinition, TaskError, TaskReport};
use crate::observability::LogContext;
use crate::ports::{Clock, IdGenerator, RecordSink, SaveStatus, UlidGenerator};
use crate::registry::TaskRegistry;

pub struct ExtractionRunner {
    clock: Arc<dyn Clock>,
    ids: Box<dyn IdGenerator>,
    log: LogContext,
}

impl ExtractionRunner {
    pub fn new(clock: Arc<dyn Clock>, log: LogContext) -> Self {
        let ids = Box::new(UlidGenerator::new(Arc::clone(&clock)));
        Self { clock, ids, log }
    }

    pub fn with_id_generator(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Box::new(ids);
        self
    }

    /// registry のタスクを宣言順に実行。run 全体としては失敗しない
    pub async fn run(&self, registry: &TaskRegistry, sources: &SourceSet, sink: &dyn RecordSink) -> RunSummary {
        let run_id = self.ids.generate_run_id();
        let started_at = self.clock.now();
        let span = tracing::info_span!(parent: self.log.span(), "run", run_id = %run_id);
        tracing::info!(parent: &span, tasks = registry.len(), "extraction run started");

        let mut reports = Vec::with_capacity(registry.len());
        for task in registry {
            let task_span = tracing::info_span!(parent: &span, "task", task = %task.id());
            let report = self.run_task(task, sources, sink).instrument(task_span).await;
            reports.push(report);
        }

        let summary = RunSummary {
            run_id,
            started_at,
            finished_at: self.clock.now(),
            tasks: reports,
        };
        let counts = summary.counts();
        tracing::info!(
            parent: &span,
            succeeded = counts.succeeded,
            failed = counts.failed,
            skipped = counts.skipped,
            "extraction run finished"
        );
        summary
    }

    async fn run_task(&self, task: &TaskDefinition, sources: &SourceSet, sink: &dyn RecordSink) -> TaskReport {
        tracing::info!(output = %task.output(), "task started");
        let started = Instant::now();

        let (outcome, output) = match extract(task, sources, sink).await {
            Ok(SaveStatus::Written { path, records }) => {
                tracing::info!(records, path = %path.display(), "task succeeded");
                (ExtractionOutcome::succeeded(records), Some(path))
            }
            Ok(SaveStatus::SkippedEmpty) => {
                tracing::warn!("no rows, nothing written");
                (ExtractionOutcome::SkippedEmpty, None)
            }
            Err(e) => {
                tracing::error!(error = %e, kind = ?e.kind(), "task failed");
                (ExtractionOutcome::failed(e.to_string()), None)
            }
        };

        TaskReport {
            task: task.id().clone(),
            outcome,
            output,
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
    }
}

async fn extract(task: &TaskDefinition, sources: &SourceSet, sink: &dyn RecordSink) -> Result<SaveStatus, TaskError> {
    let source = sources
        .get(task.source())
        .ok_or(TaskError::NoSource(task.source()))?;

    let rows = source.execute(task.query()).await?;
    let fetched = rows.len();
    let rows = task.transform().normalize(rows);
    tracing::debug!(fetched, kept = rows.len(), "rows transformed");

    Ok(sink.persist(&rows.into_records(), task.output())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OutputFile, PersistError, Query, Record, ResultSet, SourceError, SourceKind, TaskId};
    use crate::impls::{JsonFilePersister, StaticSource};
    use crate::ports::FixedClock;
    use crate::transform::{TimestampFormat, Transform};
    use chrono::{TimeZone, Utc};
    use serde_json::{Value, json};

    fn rows(v: Value) -> Vec<Record> {
        serde_json::from_value(v).unwrap()
    }

    fn task(id: &str, statement: &str, file: &str) -> TaskDefinition {
        TaskDefinition::new(
            TaskId::new(id),
            Query::relational(statement),
            Transform::identity(),
            OutputFile::new(file).unwrap(),
        )
    }

    fn runner() -> ExtractionRunner {
        let at = Utc.with_ymd_and_hms(2025, 3, 8, 2, 0, 0).unwrap();
        ExtractionRunner::new(Arc::new(FixedClock::new(at)), LogContext::disabled())
    }

    fn sources(source: StaticSource) -> SourceSet {
        let mut set = SourceSet::new();
        set.insert(Arc::new(source));
        set
    }

    #[tokio::test]
    async fn writes_non_empty_results_and_skips_empty_ones() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonFilePersister::new(dir.path()).with_log(LogContext::disabled());
        let source = StaticSource::new(SourceKind::Relational).with_rows(
            "FROM t1",
            rows(json!([{"id": 1}, {"id": 2}, {"id": 3}])),
        );
        let registry = TaskRegistry::builder()
            .register(task("t1", "SELECT id FROM t1", "a.json"))
            .unwrap()
            .register(task("t2", "SELECT id FROM t2", "b.json"))
            .unwrap()
            .build();

        let summary = runner().run(&registry, &sources(source), &sink).await;

        let outcomes: Vec<_> = summary.outcomes().cloned().collect();
        assert_eq!(
            outcomes,
            vec![ExtractionOutcome::succeeded(3), ExtractionOutcome::SkippedEmpty]
        );

        let written: Value = serde_json::from_str(&std::fs::read_to_string(dir.path().join("a.json")).unwrap()).unwrap();
        assert_eq!(written.as_array().map(Vec::len), Some(3));
        assert!(!dir.path().join("b.json").exists());
        assert_eq!(summary.tasks[0].output, Some(dir.path().join("a.json")));
        assert_eq!(summary.tasks[1].output, None);
    }

    #[tokio::test]
    async fn failed_task_does_not_stop_the_next_one() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonFilePersister::new(dir.path()).with_log(LogContext::disabled());
        let source = StaticSource::new(SourceKind::Relational)
            .with_failure("FROM missing", SourceError::QueryFailed("relation \"missing\" does not exist".into()))
            .with_rows("FROM odoo_hr_employee", rows(json!([{"id": 1, "name": "Ana"}])));
        let registry = TaskRegistry::builder()
            .register(task("a", "SELECT * FROM missing", "a.json"))
            .unwrap()
            .register(task("employees", "SELECT id, name FROM odoo_hr_employee", "employees.json"))
            .unwrap()
            .build();

        let summary = runner().run(&registry, &sources(source), &sink).await;

        assert!(matches!(
            &summary.tasks[0].outcome,
            ExtractionOutcome::Failed { reason } if reason.contains("does not exist")
        ));
        assert_eq!(summary.tasks[1].outcome, ExtractionOutcome::succeeded(1));
        assert!(dir.path().join("employees.json").exists());
        assert!(summary.has_failures());
        assert_eq!(summary.counts().total(), 2);
    }

    #[tokio::test]
    async fn persisted_file_equals_transformed_rows() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonFilePersister::new(dir.path()).with_log(LogContext::disabled());
        let source_rows = rows(json!([
            {"message_sent_time": "2025-03-07 06:15:00.123+01", "vehicle_id": 123, "state": "Čakanje"},
            {"message_sent_time": "garbage", "vehicle_id": 47, "state": null},
        ]));
        let transform = Transform::identity().timestamp("message_sent_time", TimestampFormat::IsoSeconds);
        let expected = transform.normalize(ResultSet::new(source_rows.clone()).unwrap());

        let source = StaticSource::new(SourceKind::Relational).with_rows("FROM pm010_messages", source_rows);
        let registry = TaskRegistry::builder()
            .register(TaskDefinition::new(
                TaskId::new("control"),
                Query::relational("SELECT * FROM pm010_messages"),
                transform,
                OutputFile::new("control.json").unwrap(),
            ))
            .unwrap()
            .build();

        runner().run(&registry, &sources(source), &sink).await;

        let text = std::fs::read_to_string(dir.path().join("control.json")).unwrap();
        let parsed: Vec<Record> = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, expected.into_records());
        assert!(text.contains("Čakanje"));
    }

    #[tokio::test]
    async fn task_without_open_source_fails() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonFilePersister::new(dir.path()).with_log(LogContext::disabled());
        let registry = TaskRegistry::builder()
            .register(task("employees", "SELECT id, name FROM odoo_hr_employee", "employees.json"))
            .unwrap()
            .build();

        let summary = runner().run(&registry, &SourceSet::new(), &sink).await;

        assert!(summary.tasks[0].outcome.is_failure());
    }

    struct BrokenSink;

    impl RecordSink for BrokenSink {
        fn persist(&self, _records: &[Record], file: &OutputFile) -> Result<SaveStatus, PersistError> {
            Err(PersistError::Io {
                path: file.as_str().into(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only volume"),
            })
        }
    }

    #[tokio::test]
    async fn persist_failure_is_reported_per_task() {
        let source = StaticSource::new(SourceKind::Relational)
            .with_rows("FROM a", rows(json!([{"id": 1}])))
            .with_rows("FROM b", rows(json!([{"id": 2}])));
        let registry = TaskRegistry::builder()
            .register(task("a", "SELECT * FROM a", "a.json"))
            .unwrap()
            .register(task("b", "SELECT * FROM b", "b.json"))
            .unwrap()
            .build();

        let summary = runner().run(&registry, &sources(source), &BrokenSink).await;

        assert_eq!(summary.counts().failed, 2);
        assert!(summary.outcomes().all(|o| matches!(o, ExtractionOutcome::Failed { reason } if reason.contains("read-only"))));
    }

    #[derive(Clone, Default)]
    struct CapturedLog(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn empty_result_is_warned_once() {
        let captured = CapturedLog::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .without_time()
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let dir = tempfile::tempdir().unwrap();
        let sink = JsonFilePersister::new(dir.path()).with_log(LogContext::disabled());
        let registry = TaskRegistry::builder()
            .register(task("t2", "SELECT id FROM t2", "b.json"))
            .unwrap()
            .build();

        let summary = runner()
            .run(&registry, &sources(StaticSource::new(SourceKind::Relational)), &sink)
            .await;

        assert_eq!(summary.tasks[0].outcome, ExtractionOutcome::SkippedEmpty);
        let text = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        let warnings = text.lines().filter(|l| l.trim_start().starts_with("WARN")).count();
        assert_eq!(warnings, 1, "{text}");
        assert!(text.contains("no rows, nothing written"));
    }

    #[tokio::test]
    async fn summary_uses_the_clock() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonFilePersister::new(dir.path()).with_log(LogContext::disabled());

        let summary = runner().run(&TaskRegistry::default(), &SourceSet::new(), &sink).await;

        let at = Utc.with_ymd_and_hms(2025, 3, 8, 2, 0, 0).unwrap();
        assert_eq!(summary.started_at, at);
        assert_eq!(summary.finished_at, at);
        assert_eq!(summary.run_id.as_ulid().timestamp_ms(), at.timestamp_millis() as u64);
        assert!(summary.tasks.is_empty());
    }
}
