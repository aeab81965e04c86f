//! App - アプリケーション層
//!
//! ports を組み合わせて 1 回の抽出 run を実装します。
//!
//! # 主要コンポーネント
//! - **ExtractionRunner**: タスク実行ループ（query → transform → persist）
//! - **SourceSet**: run 中に open している source
//! - **open_sources / run_extraction**: source のライフサイクル（open → run → close）

pub mod runner;
pub mod session;

pub use self::runner::ExtractionRunner;
pub use self::session::{SourceSet, open_sources, run_extraction};
