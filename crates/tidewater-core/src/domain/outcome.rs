//! Outcome model: per-task results and the run summary built from them.
//!
//! Outcomes are not persisted alongside the data; they exist for run-level
//! reporting (logs, `--summary-json`, exit status).

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::ids::RunId;
use super::task::TaskId;
use crate::observability::RunCounts;

/// Result of one task.
///
/// Serialized with a `status` tag: SUCCEEDED / FAILED / SKIPPED_EMPTY.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExtractionOutcome {
    Succeeded { records: usize },
    Failed { reason: String },
    SkippedEmpty,
}

impl ExtractionOutcome {
    pub fn succeeded(records: usize) -> Self {
        ExtractionOutcome::Succeeded { records }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        ExtractionOutcome::Failed {
            reason: reason.into(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ExtractionOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskReport {
    pub task: TaskId,

    #[serde(flatten)]
    pub outcome: ExtractionOutcome,

    /// 書き出したファイル（SUCCEEDED のときのみ）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,

    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub tasks: Vec<TaskReport>,
}

impl RunSummary {
    pub fn outcomes(&self) -> impl Iterator<Item = &ExtractionOutcome> {
        self.tasks.iter().map(|t| &t.outcome)
    }

    pub fn counts(&self) -> RunCounts {
        let mut counts = RunCounts::default();
        for outcome in self.outcomes() {
            match outcome {
                ExtractionOutcome::Succeeded { .. } => counts.succeeded += 1,
                ExtractionOutcome::Failed { .. } => counts.failed += 1,
                ExtractionOutcome::SkippedEmpty => counts.skipped += 1,
            }
        }
        counts
    }

    pub fn has_failures(&self) -> bool {
        self.outcomes().any(ExtractionOutcome::is_failure)
    }

    pub fn report(&self, task: &TaskId) -> Option<&TaskReport> {
        self.tasks.iter().find(|t| &t.task == task)
    }
}
