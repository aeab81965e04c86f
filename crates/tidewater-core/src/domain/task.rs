use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::RegistryError;
use super::query::Query;
use crate::transform::Transform;

/// Unique name of one registered task (e.g. `vessels`, `gga:123:2025-03-07`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// クエリの対象となるデータソースの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Time-series relational database.
    Relational,
    /// SQL gateway over the partitioned message lake.
    Lake,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Relational => f.write_str("relational"),
            SourceKind::Lake => f.write_str("lake"),
        }
    }
}

/// 出力ディレクトリ内のファイル名（パス区切りなし）
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputFile(String);

impl OutputFile {
    pub fn new(name: impl Into<String>) -> Result<Self, RegistryError> {
        let name = name.into();
        let invalid = name.is_empty()
            || name == "."
            || name == ".."
            || name.contains('/')
            || name.contains('\\');
        if invalid {
            return Err(RegistryError::InvalidOutputFile(name));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OutputFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Query + transform + output file for one unit of extraction.
///
/// Immutable once built; the registry hands out shared references only.
#[derive(Debug, Clone)]
pub struct TaskDefinition {
    id: TaskId,
    group: String,
    query: Query,
    transform: Transform,
    output: OutputFile,
}

impl TaskDefinition {
    /// The group defaults to the id. Per-vehicle tasks share a group so they
    /// can be selected together.
    pub fn new(id: TaskId, query: Query, transform: Transform, output: OutputFile) -> Self {
        Self {
            group: id.as_str().to_string(),
            id,
            query,
            transform,
            output,
        }
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    pub fn id(&self) -> &TaskId {
        &self.id
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn output(&self) -> &OutputFile {
        &self.output
    }

    pub fn source(&self) -> SourceKind {
        self.query.source()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("")]
    #[case(".")]
    #[case("..")]
    #[case("../vessels.json")]
    #[case("data/vessels.json")]
    #[case("data\\vessels.json")]
    fn output_file_rejects_paths(#[case] name: &str) {
        assert!(matches!(
            OutputFile::new(name),
            Err(RegistryError::InvalidOutputFile(_))
        ));
    }

    #[test]
    fn output_file_accepts_plain_names() {
        let f = OutputFile::new("gga_data_123_2025-03-07.json").unwrap();
        assert_eq!(f.as_str(), "gga_data_123_2025-03-07.json");
    }

    #[test]
    fn group_defaults_to_id() {
        let task = TaskDefinition::new(
            TaskId::new("employees"),
            Query::relational("SELECT id, name FROM odoo_hr_employee"),
            Transform::identity(),
            OutputFile::new("employees.json").unwrap(),
        );
        assert_eq!(task.group(), "employees");
        assert_eq!(task.source(), SourceKind::Relational);
    }
}
