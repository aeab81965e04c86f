//! Session - run 単位の source のライフサイクル
//!
//! - run 開始時に必要な source だけを open
//! - 設定不足・接続失敗は Fail-fast（タスクは 1 つも実行されない）
//! - run 終了時に必ず close

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use super::runner::ExtractionRunner;
use crate::config::Config;
use crate::domain::{ConfigError, ExtractError, RunSummary, SourceKind};
use crate::impls::{LakeSettings, LakeSqlSource, PostgresSettings, PostgresSource};
use crate::observability::LogContext;
use crate::ports::{QuerySource, RecordSink, SystemClock};
use crate::registry::TaskRegistry;

/// run で open した source の集合（kind ごとに 1 つ）
#[derive(Default)]
pub struct SourceSet {
    sources: BTreeMap<SourceKind, Arc<dyn QuerySource>>,
}

impl fmt::Debug for SourceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceSet")
            .field("kinds", &self.kinds().collect::<Vec<_>>())
            .finish()
    }
}

impl SourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// source を自身の kind で登録（既存のものは置き換え）
    pub fn insert(&mut self, source: Arc<dyn QuerySource>) {
        self.sources.insert(source.kind(), source);
    }

    pub fn get(&self, kind: SourceKind) -> Option<&Arc<dyn QuerySource>> {
        self.sources.get(&kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = SourceKind> + '_ {
        self.sources.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// すべての source を close。失敗はログに出すだけで返さない
    pub async fn close(&self, log: &LogContext) {
        for (kind, source) in &self.sources {
            if let Err(e) = source.close().await {
                tracing::warn!(parent: log.span(), source = %kind, error = %e, "closing source failed");
            }
        }
    }
}

enum Settings {
    Relational(PostgresSettings),
    Lake(LakeSettings),
}

/// Open the sources named in `kinds`.
///
/// All settings are checked before the first connection attempt, so a missing
/// variable is reported without touching the network. If a connection fails,
/// the sources opened so far are closed again.
pub async fn open_sources(
    config: &Config,
    kinds: &BTreeSet<SourceKind>,
    log: &LogContext,
) -> Result<SourceSet, ExtractError> {
    let settings = kinds
        .iter()
        .map(|kind| match kind {
            SourceKind::Relational => config.relational.settings().map(Settings::Relational),
            SourceKind::Lake => config.lake.settings().map(Settings::Lake),
        })
        .collect::<Result<Vec<_>, ConfigError>>()?;

    let mut set = SourceSet::new();
    for settings in settings {
        let opened: Result<Arc<dyn QuerySource>, _> = match &settings {
            Settings::Relational(s) => PostgresSource::connect(s, log.child("relational"))
                .await
                .map(|src| Arc::new(src) as Arc<dyn QuerySource>)
                .map_err(|e| (SourceKind::Relational, e)),
            Settings::Lake(s) => LakeSqlSource::connect(s, log.child("lake"))
                .await
                .map(|src| Arc::new(src) as Arc<dyn QuerySource>)
                .map_err(|e| (SourceKind::Lake, e)),
        };
        match opened {
            Ok(source) => set.insert(source),
            Err((kind, source)) => {
                tracing::error!(parent: log.span(), source = %kind, error = %source, "could not open source");
                set.close(log).await;
                return Err(ExtractError::Connection { kind, source });
            }
        }
    }
    Ok(set)
}

/// registry に必要な source を open して実行し、最後に close
pub async fn run_extraction(
    config: &Config,
    registry: &TaskRegistry,
    sink: &dyn RecordSink,
    log: LogContext,
) -> Result<RunSummary, ExtractError> {
    let sources = open_sources(config, &registry.source_kinds(), &log).await?;
    let runner = ExtractionRunner::new(Arc::new(SystemClock), log.clone());
    let summary = runner.run(registry, &sources, sink).await;
    sources.close(&log).await;
    Ok(summary)
}
