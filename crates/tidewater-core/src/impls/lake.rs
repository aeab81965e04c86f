//! LakeSqlSource - SQL-over-HTTP gateway to the message lake
//!
//! Request:  `POST {endpoint}` `{"query": "...", "parameters": {"since": "..."}}`
//! Response: `{"rows": [{...}, ...]}`
//!
//! Statements may contain `{partition_glob}`, which is replaced with the blob
//! glob of the query's partition scope. The glob is derived from a typed
//! vehicle id and date only, so no caller text reaches the statement.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::{PartitionLayout, Query, Record, ResultSet, SourceError, SourceKind};
use crate::observability::LogContext;
use crate::ports::QuerySource;

pub const PARTITION_PLACEHOLDER: &str = "{partition_glob}";

#[derive(Debug, Clone)]
pub struct LakeSettings {
    pub endpoint: String,
    pub token: Option<String>,
    pub layout: PartitionLayout,
    pub connect_timeout: Duration,
    pub query_timeout: Duration,
}

#[derive(Debug, Serialize)]
struct LakeRequest<'a> {
    query: &'a str,
    parameters: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct LakeResponse {
    rows: Vec<Record>,
}

pub struct LakeSqlSource {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
    layout: PartitionLayout,
    log: LogContext,
}

impl LakeSqlSource {
    /// ネットワークに触れずにクライアントを作成
    pub fn new(settings: &LakeSettings, log: LogContext) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.query_timeout)
            .build()
            .map_err(|e| SourceError::Unavailable(format!("http client: {e}")))?;
        Ok(Self {
            client,
            endpoint: settings.endpoint.clone(),
            token: settings.token.clone(),
            layout: settings.layout.clone(),
            log,
        })
    }

    /// クライアントを作成し、gateway が `SELECT 1` に応答するか確認
    pub async fn connect(settings: &LakeSettings, log: LogContext) -> Result<Self, SourceError> {
        let source = Self::new(settings, log)?;
        tracing::info!(parent: source.log.span(), endpoint = %source.endpoint, "probing lake gateway");
        source.post("SELECT 1", Map::new()).await.map_err(|e| match e {
            SourceError::QueryFailed(reason) => SourceError::Unavailable(reason),
            other => other,
        })?;
        Ok(source)
    }

    /// Statement text with the partition placeholder filled in.
    pub fn render(&self, query: &Query) -> Result<String, SourceError> {
        let statement = query.statement();
        if !statement.contains(PARTITION_PLACEHOLDER) {
            return Ok(statement.to_string());
        }
        let scope = query.scope().ok_or_else(|| {
            SourceError::QueryFailed("statement scans partitions but the query has no scope".into())
        })?;
        Ok(statement.replace(PARTITION_PLACEHOLDER, &self.layout.glob(scope)))
    }

    async fn post(&self, statement: &str, parameters: Map<String, Value>) -> Result<Vec<Record>, SourceError> {
        let body = LakeRequest {
            query: statement,
            parameters,
        };
        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(status_error(status, detail.trim()));
        }

        let payload: LakeResponse = response
            .json()
            .await
            .map_err(|e| SourceError::QueryFailed(format!("malformed gateway response: {e}")))?;
        Ok(payload.rows)
    }
}

#[async_trait]
impl QuerySource for LakeSqlSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Lake
    }

    async fn execute(&self, query: &Query) -> Result<ResultSet, SourceError> {
        if query.source() != SourceKind::Lake {
            return Err(SourceError::QueryFailed(format!(
                "{} query sent to the lake source",
                query.source()
            )));
        }
        let statement = self.render(query)?;
        let parameters = query
            .params()
            .iter()
            .map(|p| (p.name.clone(), p.value.to_json()))
            .collect();

        let rows = self.post(&statement, parameters).await?;
        tracing::debug!(parent: self.log.span(), rows = rows.len(), "lake query finished");
        Ok(ResultSet::new(rows)?)
    }
}

fn transport_error(e: reqwest::Error) -> SourceError {
    if e.is_timeout() {
        SourceError::QueryFailed(format!("request timed out: {e}"))
    } else {
        SourceError::Unavailable(format!("request failed: {e}"))
    }
}

fn status_error(status: StatusCode, detail: &str) -> SourceError {
    let message = if detail.is_empty() {
        status.to_string()
    } else {
        format!("{status}: {detail}")
    };
    match status {
        StatusCode::UNAUTHORIZED
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => SourceError::Unavailable(message),
        _ => SourceError::QueryFailed(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DEFAULT_STREAM, PartitionScope, VehicleId};
    use chrono::NaiveDate;
    use mockito::Matcher;
    use serde_json::json;

    fn settings(endpoint: String) -> LakeSettings {
        LakeSettings {
            endpoint,
            token: Some("secret".into()),
            layout: PartitionLayout::new("https://lake.example.net/raw", DEFAULT_STREAM),
            connect_timeout: Duration::from_secs(2),
            query_timeout: Duration::from_secs(5),
        }
    }

    fn scoped_query() -> Query {
        let scope = PartitionScope::new(VehicleId::new(7), NaiveDate::from_ymd_opt(2025, 3, 7).unwrap());
        Query::lake("SELECT * FROM OPENROWSET(BULK '{partition_glob}') AS r WHERE t >= @since", scope)
            .bind("since", "2025-03-07T00:00:00")
    }

    #[test]
    fn render_fills_partition_glob() {
        let source = LakeSqlSource::new(&settings("http://unused".into()), LogContext::disabled()).unwrap();
        let sql = source.render(&scoped_query()).unwrap();
        assert!(sql.contains(
            "BULK 'https://lake.example.net/raw/v000007-messages/Renoir/Prod/25/03/07/*/*.json.gz'"
        ));
        assert!(!sql.contains(PARTITION_PLACEHOLDER));
    }

    #[tokio::test]
    async fn execute_posts_statement_and_parameters() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/query")
            .match_header("authorization", "Bearer secret")
            .match_body(Matcher::PartialJson(json!({"parameters": {"since": "2025-03-07T00:00:00"}})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"rows": [{"MessageType": "$--GGA", "Latitude": "51.2"}, {"MessageType": "$--GGA", "Latitude": "51.3"}]}"#)
            .create_async()
            .await;

        let source = LakeSqlSource::new(&settings(format!("{}/query", server.url())), LogContext::disabled()).unwrap();
        let rows = source.execute(&scoped_query()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows.records()[1].get("Latitude"), Some(&json!("51.3")));
    }

    #[tokio::test]
    async fn unauthorized_is_unavailable_and_forbidden_is_query_failure() {
        let mut server = mockito::Server::new_async().await;
        let _m401 = server.mock("POST", "/auth").with_status(401).create_async().await;
        let _m403 = server
            .mock("POST", "/deny")
            .with_status(403)
            .with_body("no access to container")
            .create_async()
            .await;

        let source = LakeSqlSource::new(&settings(format!("{}/auth", server.url())), LogContext::disabled()).unwrap();
        let err = source.execute(&scoped_query()).await.unwrap_err();
        assert!(matches!(err, SourceError::Unavailable(_)));

        let source = LakeSqlSource::new(&settings(format!("{}/deny", server.url())), LogContext::disabled()).unwrap();
        let err = source.execute(&scoped_query()).await.unwrap_err();
        assert!(matches!(err, SourceError::QueryFailed(ref m) if m.contains("no access")));
    }

    #[tokio::test]
    async fn malformed_body_is_query_failure() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/query")
            .with_status(200)
            .with_body("<html>oops</html>")
            .create_async()
            .await;

        let source = LakeSqlSource::new(&settings(format!("{}/query", server.url())), LogContext::disabled()).unwrap();
        let err = source.execute(&scoped_query()).await.unwrap_err();
        assert!(matches!(err, SourceError::QueryFailed(_)));
    }

    #[tokio::test]
    async fn connect_probe_failure_is_unavailable() {
        let mut server = mockito::Server::new_async().await;
        let _m = server.mock("POST", "/query").with_status(400).create_async().await;

        let result = LakeSqlSource::connect(&settings(format!("{}/query", server.url())), LogContext::disabled()).await;
        assert!(matches!(result, Err(SourceError::Unavailable(_))));
    }

    #[tokio::test]
    async fn relational_query_is_rejected() {
        let source = LakeSqlSource::new(&settings("http://unused".into()), LogContext::disabled()).unwrap();
        let err = source.execute(&Query::relational("SELECT 1")).await.unwrap_err();
        assert!(matches!(err, SourceError::QueryFailed(_)));
    }
}
