//! PostgresSource - relational / time-series database adapter
//!
//! 1 run につき 1 接続。connection future は別タスクで駆動し、
//! `close()` または drop で必ず停止します。

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::{Client, NoTls, Row};
use tracing::Instrument;

use crate::domain::{ParamValue, Query, Record, ResultSet, SourceError, SourceKind};
use crate::observability::LogContext;
use crate::ports::QuerySource;

#[derive(Debug, Clone)]
pub struct PostgresSettings {
    /// Key-value (`host=... dbname=...`) or URI (`postgres://...`) form.
    pub url: String,
    pub connect_timeout: Duration,
    pub query_timeout: Duration,
}

pub struct PostgresSource {
    client: Client,
    connection: JoinHandle<()>,
    query_timeout: Duration,
    log: LogContext,
}

impl PostgresSource {
    pub async fn connect(settings: &PostgresSettings, log: LogContext) -> Result<Self, SourceError> {
        let mut config: tokio_postgres::Config = settings
            .url
            .parse()
            .map_err(|e| SourceError::Unavailable(format!("invalid connection string: {e}")))?;
        config.connect_timeout(settings.connect_timeout);

        tracing::info!(parent: log.span(), "connecting to database");
        let (client, connection) = tokio::time::timeout(settings.connect_timeout, config.connect(NoTls))
            .await
            .map_err(|_| {
                SourceError::Unavailable(format!(
                    "connect timed out after {}s",
                    settings.connect_timeout.as_secs()
                ))
            })?
            .map_err(|e| SourceError::Unavailable(format!("connect failed: {e}")))?;

        let connection = tokio::spawn(
            async move {
                if let Err(e) = connection.await {
                    tracing::error!(error = %e, "database connection error");
                }
            }
            .instrument(log.span().clone()),
        );
        tracing::info!(parent: log.span(), "connected to database");

        Ok(Self {
            client,
            connection,
            query_timeout: settings.query_timeout,
            log,
        })
    }
}

impl Drop for PostgresSource {
    fn drop(&mut self) {
        self.connection.abort();
    }
}

#[async_trait]
impl QuerySource for PostgresSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Relational
    }

    async fn execute(&self, query: &Query) -> Result<ResultSet, SourceError> {
        if query.source() != SourceKind::Relational {
            return Err(SourceError::QueryFailed(format!(
                "{} query sent to the relational source",
                query.source()
            )));
        }

        let params: Vec<&(dyn ToSql + Sync)> = query.params().iter().map(|p| bind(&p.value)).collect();
        let rows = tokio::time::timeout(self.query_timeout, self.client.query(query.statement(), &params))
            .await
            .map_err(|_| {
                SourceError::QueryFailed(format!(
                    "query timed out after {}s",
                    self.query_timeout.as_secs()
                ))
            })?
            .map_err(classify)?;

        tracing::debug!(parent: self.log.span(), rows = rows.len(), "query finished");
        let records = rows.iter().map(row_to_record).collect::<Result<Vec<_>, _>>()?;
        Ok(ResultSet::new(records)?)
    }

    async fn close(&self) -> Result<(), SourceError> {
        self.connection.abort();
        tracing::info!(parent: self.log.span(), "database connection closed");
        Ok(())
    }
}

fn bind(value: &ParamValue) -> &(dyn ToSql + Sync) {
    match value {
        ParamValue::Text(s) => s,
        ParamValue::Int(i) => i,
        ParamValue::Date(d) => d,
        ParamValue::Timestamp(t) => t,
    }
}

fn classify(e: tokio_postgres::Error) -> SourceError {
    if e.is_closed() {
        return SourceError::Unavailable(format!("connection closed: {e}"));
    }
    match e.as_db_error() {
        Some(db) => SourceError::QueryFailed(format!("{} ({})", db.message(), db.code().code())),
        None => SourceError::QueryFailed(e.to_string()),
    }
}

fn row_to_record(row: &Row) -> Result<Record, SourceError> {
    let mut record = Record::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let value = column_value(row, idx, column.type_()).map_err(|reason| {
            SourceError::QueryFailed(format!("column `{}`: {reason}", column.name()))
        })?;
        record.insert(column.name(), value);
    }
    Ok(record)
}

fn get<'a, T>(row: &'a Row, idx: usize) -> Result<Option<T>, String>
where
    T: tokio_postgres::types::FromSql<'a>,
{
    row.try_get::<_, Option<T>>(idx).map_err(|e| e.to_string())
}

fn column_value(row: &Row, idx: usize, ty: &Type) -> Result<Value, String> {
    let value = match *ty {
        Type::BOOL => get::<bool>(row, idx)?.map(Value::Bool),
        Type::CHAR => get::<i8>(row, idx)?.map(Value::from),
        Type::INT2 => get::<i16>(row, idx)?.map(Value::from),
        Type::INT4 => get::<i32>(row, idx)?.map(Value::from),
        Type::INT8 => get::<i64>(row, idx)?.map(Value::from),
        Type::OID => get::<u32>(row, idx)?.map(Value::from),
        Type::FLOAT4 => get::<f32>(row, idx)?.map(|f| Value::from(f64::from(f))),
        Type::FLOAT8 => get::<f64>(row, idx)?.map(Value::from),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
            get::<String>(row, idx)?.map(Value::String)
        }
        Type::TIMESTAMP => get::<NaiveDateTime>(row, idx)?
            .map(|t| Value::String(t.format("%Y-%m-%dT%H:%M:%S%.f").to_string())),
        Type::TIMESTAMPTZ => get::<DateTime<Utc>>(row, idx)?
            .map(|t| Value::String(t.to_rfc3339_opts(SecondsFormat::AutoSi, true))),
        Type::DATE => get::<NaiveDate>(row, idx)?.map(|d| Value::String(d.format("%Y-%m-%d").to_string())),
        Type::TIME => get::<NaiveTime>(row, idx)?.map(|t| Value::String(t.format("%H:%M:%S%.f").to_string())),
        Type::JSON | Type::JSONB => get::<Value>(row, idx)?,
        _ => return Err(format!("unsupported type `{ty}`, cast it in the query")),
    };
    Ok(value.unwrap_or(Value::Null))
}
