//! Record and ResultSet: the row model shared by sources, transforms and sinks.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::errors::SchemaMismatch;

/// An ordered mapping from field name to value.
///
/// Field order is the order the source returned the columns in and survives
/// renames, so persisted objects read the same way as the query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Insert or overwrite a field. A new field is appended at the end.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    /// フィールドを削除（他のフィールドの順序は維持）
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        let removed = self.0.get(field).cloned()?;
        self.0 = std::mem::take(&mut self.0)
            .into_iter()
            .filter(|(k, _)| k != field)
            .collect();
        Some(removed)
    }

    /// Re-key `from` as `to` in place. Returns false when `from` is absent.
    ///
    /// An existing `to` field is replaced.
    pub fn rename(&mut self, from: &str, to: &str) -> bool {
        if !self.0.contains_key(from) {
            return false;
        }
        if from == to {
            return true;
        }
        self.0 = std::mem::take(&mut self.0)
            .into_iter()
            .filter(|(k, _)| k != to)
            .map(|(k, v)| if k == from { (to.to_string(), v) } else { (k, v) })
            .collect();
        true
    }

    /// `fields` だけをこの順序で持つ新しいレコード（存在しないものは null）
    pub fn project(&self, fields: &[String]) -> Record {
        fields
            .iter()
            .map(|f| (f.clone(), self.0.get(f).cloned().unwrap_or(Value::Null)))
            .collect()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// An ordered sequence of records sharing one field schema.
///
/// An empty set is valid and means "no data for this run".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    records: Vec<Record>,
}

impl ResultSet {
    /// 全レコードが先頭レコードと同じフィールド名を持つかを検査して作成
    ///
    /// キーの順序だけが違うレコードは先頭レコードの順序に並べ直します。
    pub fn new(records: Vec<Record>) -> Result<Self, SchemaMismatch> {
        let expected: Vec<String> = match records.first() {
            Some(first) => first.field_names().map(str::to_string).collect(),
            None => return Ok(Self::default()),
        };

        let mut uniform = Vec::with_capacity(records.len());
        for (row, record) in records.into_iter().enumerate() {
            if record.field_names().eq(expected.iter().map(String::as_str)) {
                uniform.push(record);
            } else if record.len() == expected.len() && expected.iter().all(|f| record.get(f).is_some()) {
                uniform.push(record.project(&expected));
            } else {
                return Err(SchemaMismatch {
                    row,
                    expected,
                    found: record.field_names().map(str::to_string).collect(),
                });
            }
        }
        Ok(Self { records: uniform })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Transforms apply the same field operations to each row, so their
    /// output keeps the input's uniformity without re-checking.
    pub(crate) fn from_uniform(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl IntoIterator for ResultSet {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}
