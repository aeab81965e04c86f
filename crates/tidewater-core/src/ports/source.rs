//! QuerySource port - backing data sources
//!
//! Relational DB と lake gateway は同じ契約を持ちます。
//! 呼び出し側はどちらの実装かを意識しません。

use async_trait::async_trait;

use crate::domain::{Query, ResultSet, SourceError, SourceKind};

/// Executes fully-formed queries against one backing data source.
///
/// Failures are always returned to the caller:
/// - `SourceError::Unavailable`: connection or authentication failure
/// - `SourceError::QueryFailed`: malformed query, timeout, permission denial
///
/// Implementations never write to the source.
#[async_trait]
pub trait QuerySource: Send + Sync {
    fn kind(&self) -> SourceKind;

    async fn execute(&self, query: &Query) -> Result<ResultSet, SourceError>;

    /// 接続を解放。run の最後に 1 回だけ呼ばれる
    async fn close(&self) -> Result<(), SourceError> {
        Ok(())
    }
}
