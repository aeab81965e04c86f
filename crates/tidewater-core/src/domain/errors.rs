//! Errors - エラー型と分類
//!
//! 致命的なのは起動時の Config / Connection だけです。
//! タスク単位のエラーは Runner の境界で Outcome に変換されます。

use std::path::PathBuf;

use thiserror::Error;

use super::task::{SourceKind, TaskId};

/// ErrorKind は実行エラーの運用分類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Source could not be reached or refused the credentials.
    Connection,
    /// Source rejected or could not finish a statement.
    Query,
    /// Source rows did not fit the record model.
    Transform,
    /// Output file could not be written.
    Persist,
    /// Required configuration is missing or malformed.
    Config,
}

impl ErrorKind {
    /// 致命的な種類はタスク実行前に run を中断する
    pub fn is_fatal(self) -> bool {
        matches!(self, ErrorKind::Connection | ErrorKind::Config)
    }
}

/// QuerySource が返すエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("source unavailable: {0}")]
    Unavailable(String),

    #[error("query failed: {0}")]
    QueryFailed(String),
}

impl SourceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SourceError::Unavailable(_) => ErrorKind::Connection,
            SourceError::QueryFailed(_) => ErrorKind::Query,
        }
    }
}

/// Records in one result set disagree on their fields.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("row {row} has fields {found:?}, expected {expected:?}")]
pub struct SchemaMismatch {
    pub row: usize,
    pub expected: Vec<String>,
    pub found: Vec<String>,
}

impl From<SchemaMismatch> for SourceError {
    fn from(e: SchemaMismatch) -> Self {
        SourceError::QueryFailed(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("could not write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not encode records for {}: {source}", .path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("task '{0}' is already registered")]
    DuplicateTask(TaskId),

    #[error("output file '{0}' is already claimed by another task")]
    DuplicateOutputFile(String),

    #[error("'{0}' is not a valid output file name")]
    InvalidOutputFile(String),

    #[error("unknown tasks: {0:?}")]
    UnknownTasks(Vec<String>),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },

    #[error("could not read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// 最初のタスクより前に run を止めるエラー
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("could not open {kind} source: {source}")]
    Connection {
        kind: SourceKind,
        #[source]
        source: SourceError,
    },
}

impl ExtractError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExtractError::Config(_) => ErrorKind::Config,
            ExtractError::Connection { .. } => ErrorKind::Connection,
        }
    }
}

/// タスク単位のエラー（runner が捕捉して outcome に変換）
#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error("no {0} source is open for this run")]
    NoSource(SourceKind),
}

impl TaskError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TaskError::Source(e) => e.kind(),
            TaskError::Persist(_) => ErrorKind::Persist,
            TaskError::NoSource(_) => ErrorKind::Config,
        }
    }
}
