use std::path::PathBuf;

use crate::domain::{OutputFile, PersistError, Record};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveStatus {
    Written { path: PathBuf, records: usize },
    /// Nothing to write; no file was created or touched.
    SkippedEmpty,
}

/// タスクの整形済みレコードの出力先
pub trait RecordSink: Send + Sync {
    fn persist(&self, records: &[Record], file: &OutputFile) -> Result<SaveStatus, PersistError>;
}
