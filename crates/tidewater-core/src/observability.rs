//! Observability - logging context and run counters
//!
//! ライブラリは subscriber を設定しません（CLI 側の責務）。
//! 各コンポーネントは構築時に `LogContext` を受け取り、その span の下でログを出します。

use serde::{Deserialize, Serialize};
use tracing::Span;

/// 構築時にコンポーネントへ渡すログのハンドル
#[derive(Debug, Clone)]
pub struct LogContext {
    span: Span,
}

impl LogContext {
    pub fn new(component: &'static str) -> Self {
        Self {
            span: tracing::info_span!("tidewater", component),
        }
    }

    /// Context for a sub-component, nested under this one.
    pub fn child(&self, component: &'static str) -> Self {
        Self {
            span: tracing::info_span!(parent: &self.span, "tidewater", component),
        }
    }

    /// Use an existing span, e.g. one created by the embedding application.
    pub fn from_span(span: Span) -> Self {
        Self { span }
    }

    /// 何も記録しない LogContext
    pub fn disabled() -> Self {
        Self { span: Span::none() }
    }

    pub fn span(&self) -> &Span {
        &self.span
    }
}

impl Default for LogContext {
    fn default() -> Self {
        Self::new("tidewater")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl RunCounts {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.skipped
    }
}
