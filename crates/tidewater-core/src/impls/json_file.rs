//! JsonFilePersister - 1 タスク 1 ファイルの JSON 出力
//!
//! - 出力ディレクトリは必要になった時点で作成
//! - 同じディレクトリの一時ファイルに書いてから rename（途中で失敗しても既存ファイルは壊れない）
//! - 4 スペースインデント、UTF-8（非 ASCII もそのまま）
//! - パーミッションは通常の作成と同じ（新規は 0o666 から umask を引いた値、既存ファイルはそのまま）

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use tempfile::{Builder, NamedTempFile};

use crate::domain::{OutputFile, PersistError, Record};
use crate::observability::LogContext;
use crate::ports::{RecordSink, SaveStatus};

pub struct JsonFilePersister {
    output_dir: PathBuf,
    log: LogContext,
}

impl JsonFilePersister {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            log: LogContext::new("json_persister"),
        }
    }

    pub fn with_log(mut self, log: LogContext) -> Self {
        self.log = log;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn path_for(&self, file: &OutputFile) -> PathBuf {
        self.output_dir.join(file.as_str())
    }

    /// 保存して結果はログにのみ出力
    ///
    /// ファイルを書いた場合は true。空の入力と I/O 失敗はどちらも false。
    pub fn save(&self, records: &[Record], file: &OutputFile) -> bool {
        match self.persist(records, file) {
            Ok(SaveStatus::Written { .. }) => true,
            Ok(SaveStatus::SkippedEmpty) => false,
            Err(e) => {
                tracing::error!(parent: self.log.span(), error = %e, file = %file, "persist failed");
                false
            }
        }
    }

    fn write(&self, records: &[Record], path: &Path) -> Result<(), PersistError> {
        let io_err = |source| PersistError::Io {
            path: path.to_path_buf(),
            source,
        };

        fs::create_dir_all(&self.output_dir).map_err(io_err)?;
        let mut tmp = temp_file_in(&self.output_dir).map_err(io_err)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            let mut ser = Serializer::with_formatter(&mut writer, PrettyFormatter::with_indent(b"    "));
            records.serialize(&mut ser).map_err(|source| PersistError::Encode {
                path: path.to_path_buf(),
                source,
            })?;
            writer.write_all(b"\n").map_err(io_err)?;
            writer.flush().map_err(io_err)?;
        }
        if let Ok(existing) = fs::metadata(path) {
            fs::set_permissions(tmp.path(), existing.permissions()).map_err(io_err)?;
        }
        tmp.persist(path).map_err(|e| io_err(e.error))?;
        Ok(())
    }
}

/// 一時ファイルは既定で 0600 なので、通常の create と同じモードで作る
#[cfg(unix)]
fn temp_file_in(dir: &Path) -> std::io::Result<NamedTempFile> {
    use std::os::unix::fs::PermissionsExt;

    Builder::new()
        .prefix(".tidewater-")
        .permissions(fs::Permissions::from_mode(0o666))
        .tempfile_in(dir)
}

#[cfg(not(unix))]
fn temp_file_in(dir: &Path) -> std::io::Result<NamedTempFile> {
    Builder::new().prefix(".tidewater-").tempfile_in(dir)
}

impl RecordSink for JsonFilePersister {
    fn persist(&self, records: &[Record], file: &OutputFile) -> Result<SaveStatus, PersistError> {
        if records.is_empty() {
            tracing::debug!(parent: self.log.span(), file = %file, "no records, skipping save");
            return Ok(SaveStatus::SkippedEmpty);
        }

        let path = self.path_for(file);
        self.write(records, &path)?;
        tracing::debug!(
            parent: self.log.span(),
            records = records.len(),
            path = %path.display(),
            "wrote output file"
        );
        Ok(SaveStatus::Written {
            path,
            records: records.len(),
        })
    }
}
