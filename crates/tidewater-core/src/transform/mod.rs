//! Transform - per-task record normalization
//!
//! A `Transform` is an ordered list of field operations. It is pure and
//! total: the only way a row leaves the batch is a failed critical
//! identifier (`FieldOp::VehicleId`). Auxiliary fields that fail to parse are
//! blanked or nulled and the row is kept.

mod timestamp;
mod vehicle;

pub use self::timestamp::{TimestampFormat, canonicalize, parse_timestamp};
pub use self::vehicle::parse_vehicle_id;

use serde_json::{Number, Value};

use crate::domain::{Record, ResultSet};
use self::vehicle::vehicle_id_from_value;

#[derive(Debug, Clone, PartialEq)]
pub enum FieldOp {
    /// Parse a vessel code from `from` into the decimal string `to`.
    /// Rows without a valid code are dropped.
    VehicleId { from: String, to: String },

    Rename { from: String, to: String },

    /// Reformat a timestamp; unparseable values become `""`.
    Timestamp { field: String, format: TimestampFormat },

    /// 文字列を数値に変換（変換できなければ null）
    Number { field: String },

    /// 指定したフィールドだけをこの順序で残す
    Select(Vec<String>),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transform {
    ops: Vec<FieldOp>,
}

impl Transform {
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn vehicle_id(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.ops.push(FieldOp::VehicleId {
            from: from.into(),
            to: to.into(),
        });
        self
    }

    pub fn rename(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.ops.push(FieldOp::Rename {
            from: from.into(),
            to: to.into(),
        });
        self
    }

    pub fn timestamp(mut self, field: impl Into<String>, format: TimestampFormat) -> Self {
        self.ops.push(FieldOp::Timestamp {
            field: field.into(),
            format,
        });
        self
    }

    pub fn number(mut self, field: impl Into<String>) -> Self {
        self.ops.push(FieldOp::Number {
            field: field.into(),
        });
        self
    }

    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ops
            .push(FieldOp::Select(fields.into_iter().map(Into::into).collect()));
        self
    }

    pub fn ops(&self) -> &[FieldOp] {
        &self.ops
    }

    pub fn is_identity(&self) -> bool {
        self.ops.is_empty()
    }

    /// 1 レコードに全操作を適用。`None` は行の除外を意味する
    pub fn apply(&self, mut record: Record) -> Option<Record> {
        for op in &self.ops {
            match op {
                FieldOp::VehicleId { from, to } => {
                    let id = record.get(from).and_then(vehicle_id_from_value)?;
                    record.insert(to.clone(), id.to_string());
                }
                FieldOp::Rename { from, to } => {
                    record.rename(from, to);
                }
                FieldOp::Timestamp { field, format } => {
                    if let Some(value) = record.get(field) {
                        let canonical = canonicalize(value, *format);
                        record.insert(field.clone(), canonical);
                    }
                }
                FieldOp::Number { field } => {
                    if let Some(value) = record.get(field) {
                        let number = coerce_number(value);
                        record.insert(field.clone(), number);
                    }
                }
                FieldOp::Select(fields) => {
                    record = record.project(fields);
                }
            }
        }
        Some(record)
    }

    pub fn normalize(&self, rows: ResultSet) -> ResultSet {
        if self.is_identity() {
            return rows;
        }
        ResultSet::from_uniform(rows.into_iter().filter_map(|r| self.apply(r)).collect())
    }
}

fn coerce_number(value: &Value) -> Value {
    match value {
        Value::Number(_) => value.clone(),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                Value::from(i)
            } else {
                s.parse::<f64>()
                    .ok()
                    .and_then(Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
        }
        _ => Value::Null,
    }
}
