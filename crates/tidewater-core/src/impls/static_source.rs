//! StaticSource - 開発・テスト用のスクリプト化された QuerySource
//!
//! statement に含まれる断片で応答を選びます。どの rule にも一致しなければ空の結果。

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{Query, Record, ResultSet, SourceError, SourceKind};
use crate::ports::QuerySource;

enum Reply {
    Rows(Vec<Record>),
    Fail(SourceError),
}

struct Rule {
    fragment: String,
    reply: Reply,
}

pub struct StaticSource {
    kind: SourceKind,
    rules: Vec<Rule>,
    executed: Mutex<Vec<Query>>,
    closed: Mutex<bool>,
}

impl StaticSource {
    pub fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            rules: Vec::new(),
            executed: Mutex::new(Vec::new()),
            closed: Mutex::new(false),
        }
    }

    /// Answer statements containing `fragment` with `rows`.
    pub fn with_rows(mut self, fragment: impl Into<String>, rows: Vec<Record>) -> Self {
        self.rules.push(Rule {
            fragment: fragment.into(),
            reply: Reply::Rows(rows),
        });
        self
    }

    /// Fail statements containing `fragment` with `error`.
    pub fn with_failure(mut self, fragment: impl Into<String>, error: SourceError) -> Self {
        self.rules.push(Rule {
            fragment: fragment.into(),
            reply: Reply::Fail(error),
        });
        self
    }

    /// これまでに受け取ったクエリ（実行順）
    pub async fn executed(&self) -> Vec<Query> {
        self.executed.lock().await.clone()
    }

    pub async fn is_closed(&self) -> bool {
        *self.closed.lock().await
    }
}

#[async_trait]
impl QuerySource for StaticSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn execute(&self, query: &Query) -> Result<ResultSet, SourceError> {
        self.executed.lock().await.push(query.clone());
        if *self.closed.lock().await {
            return Err(SourceError::Unavailable("source is closed".into()));
        }

        let rule = self
            .rules
            .iter()
            .find(|r| query.statement().contains(&r.fragment));
        match rule.map(|r| &r.reply) {
            Some(Reply::Rows(rows)) => Ok(ResultSet::new(rows.clone())?),
            Some(Reply::Fail(e)) => Err(e.clone()),
            None => Ok(ResultSet::empty()),
        }
    }

    async fn close(&self) -> Result<(), SourceError> {
        *self.closed.lock().await = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn replies_by_fragment_and_records_queries() {
        let rows: Vec<Record> = serde_json::from_value(json!([{"id": 1}])).unwrap();
        let source = StaticSource::new(SourceKind::Relational)
            .with_rows("FROM odoo_hr_employee", rows)
            .with_failure("FROM missing", SourceError::QueryFailed("relation does not exist".into()));

        let ok = source
            .execute(&Query::relational("SELECT id FROM odoo_hr_employee"))
            .await
            .unwrap();
        assert_eq!(ok.len(), 1);

        let err = source
            .execute(&Query::relational("SELECT * FROM missing"))
            .await
            .unwrap_err();
        assert_eq!(err, SourceError::QueryFailed("relation does not exist".into()));

        let none = source.execute(&Query::relational("SELECT 1")).await.unwrap();
        assert!(none.is_empty());

        assert_eq!(source.executed().await.len(), 3);
    }

    #[tokio::test]
    async fn closed_source_is_unavailable() {
        let source = StaticSource::new(SourceKind::Lake);
        source.close().await.unwrap();
        assert!(source.is_closed().await);
        let err = source.execute(&Query::relational("SELECT 1")).await.unwrap_err();
        assert!(matches!(err, SourceError::Unavailable(_)));
    }
}
