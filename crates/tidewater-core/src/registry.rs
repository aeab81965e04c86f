//! TaskRegistry - タスク定義の登録と管理
//!
//! # 設計
//! - 起動時に builder で構築（mutable）
//! - 実行中は読み取り専用（immutable）
//! - 宣言順を保持（Runner はこの順に実行する）
//! - 構築時に task id と出力ファイルの一意性をチェック（Fail-fast）
//!
//! # 使用例
//! ```ignore
//! let registry = TaskRegistry::builder()
//!     .register(vessels_task)?
//!     .register(incidents_task)?
//!     .build();
//! ```

use std::collections::{BTreeSet, HashSet};

use crate::domain::{OutputFile, RegistryError, SourceKind, TaskDefinition, TaskId};

#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    tasks: Vec<TaskDefinition>,
}

#[derive(Debug, Default)]
pub struct RegistryBuilder {
    tasks: Vec<TaskDefinition>,
    ids: HashSet<TaskId>,
    outputs: HashSet<OutputFile>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, task: TaskDefinition) -> Result<Self, RegistryError> {
        if self.ids.contains(task.id()) {
            return Err(RegistryError::DuplicateTask(task.id().clone()));
        }
        if self.outputs.contains(task.output()) {
            return Err(RegistryError::DuplicateOutputFile(task.output().to_string()));
        }
        self.ids.insert(task.id().clone());
        self.outputs.insert(task.output().clone());
        self.tasks.push(task);
        Ok(self)
    }

    pub fn register_all(
        self,
        tasks: impl IntoIterator<Item = TaskDefinition>,
    ) -> Result<Self, RegistryError> {
        tasks.into_iter().try_fold(self, |builder, task| builder.register(task))
    }

    pub fn build(self) -> TaskRegistry {
        TaskRegistry { tasks: self.tasks }
    }
}

impl TaskRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TaskDefinition> {
        self.tasks.iter()
    }

    pub fn get(&self, id: &TaskId) -> Option<&TaskDefinition> {
        self.tasks.iter().find(|t| t.id() == id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &TaskId> {
        self.tasks.iter().map(TaskDefinition::id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// 登録タスクが必要とする source の種類（これだけを open する）
    pub fn source_kinds(&self) -> BTreeSet<SourceKind> {
        self.tasks.iter().map(TaskDefinition::source).collect()
    }

    /// Keep the tasks whose id or group is in `names`, in registry order.
    ///
    /// An empty `names` keeps everything. Names matching no task are an error
    /// so a typo on the command line does not silently run nothing.
    pub fn select(&self, names: &[String]) -> Result<TaskRegistry, RegistryError> {
        if names.is_empty() {
            return Ok(self.clone());
        }
        let matches = |task: &TaskDefinition, name: &str| task.id().as_str() == name || task.group() == name;

        let unknown: Vec<String> = names
            .iter()
            .filter(|name| !self.tasks.iter().any(|t| matches(t, name)))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(RegistryError::UnknownTasks(unknown));
        }

        let tasks = self
            .tasks
            .iter()
            .filter(|t| names.iter().any(|name| matches(t, name)))
            .cloned()
            .collect();
        Ok(TaskRegistry { tasks })
    }
}

impl<'a> IntoIterator for &'a TaskRegistry {
    type Item = &'a TaskDefinition;
    type IntoIter = std::slice::Iter<'a, TaskDefinition>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
