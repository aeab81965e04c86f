//! Query - 構造化されたクエリ（statement + bound parameters）
//!
//! 日付や vehicle id を文字列補間で埋め込まず、parameter として渡します。
//! - Relational: `$1..$n`（bind 順）
//! - Lake: `@name`（名前で参照）

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;

use super::partition::PartitionScope;
use super::task::SourceKind;

/// バインドするパラメータ値
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Text(String),
    Int(i64),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl ParamValue {
    /// JSON form sent to HTTP gateways. Dates and timestamps use ISO 8601.
    pub fn to_json(&self) -> Value {
        match self {
            ParamValue::Text(s) => Value::String(s.clone()),
            ParamValue::Int(i) => Value::from(*i),
            ParamValue::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
            ParamValue::Timestamp(t) => Value::String(t.format("%Y-%m-%dT%H:%M:%S").to_string()),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Text(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::Text(s)
    }
}

impl From<i64> for ParamValue {
    fn from(i: i64) -> Self {
        ParamValue::Int(i)
    }
}

impl From<NaiveDate> for ParamValue {
    fn from(d: NaiveDate) -> Self {
        ParamValue::Date(d)
    }
}

impl From<NaiveDateTime> for ParamValue {
    fn from(t: NaiveDateTime) -> Self {
        ParamValue::Timestamp(t)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryParam {
    pub name: String,
    pub value: ParamValue,
}

/// Statement text plus everything a source needs to run it.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    source: SourceKind,
    statement: String,
    params: Vec<QueryParam>,
    scope: Option<PartitionScope>,
}

impl Query {
    pub fn relational(statement: impl Into<String>) -> Self {
        Self {
            source: SourceKind::Relational,
            statement: statement.into(),
            params: Vec::new(),
            scope: None,
        }
    }

    /// A lake query scanning the partitions of one vehicle on one date.
    pub fn lake(statement: impl Into<String>, scope: PartitionScope) -> Self {
        Self {
            source: SourceKind::Lake,
            statement: statement.into(),
            params: Vec::new(),
            scope: Some(scope),
        }
    }

    /// パラメータを追加。位置指定の source はこの順序でバインドする
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.push(QueryParam {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn source(&self) -> SourceKind {
        self.source
    }

    pub fn statement(&self) -> &str {
        &self.statement
    }

    pub fn params(&self) -> &[QueryParam] {
        &self.params
    }

    pub fn scope(&self) -> Option<&PartitionScope> {
        self.scope.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bind_keeps_order() {
        let q = Query::relational("SELECT * FROM t WHERE a = $1 AND b >= $2")
            .bind("a", 5_i64)
            .bind("b", NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        let names: Vec<&str> = q.params().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(q.source(), SourceKind::Relational);
        assert!(q.scope().is_none());
    }

    #[test]
    fn params_render_as_json() {
        let ts = NaiveDate::from_ymd_opt(2025, 3, 7)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(ParamValue::from(ts).to_json(), json!("2025-03-07T00:00:00"));
        assert_eq!(ParamValue::from(7_i64).to_json(), json!(7));
        assert_eq!(ParamValue::from("$--GGA").to_json(), json!("$--GGA"));
    }
}
