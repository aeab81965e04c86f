//! tidewater-core
//!
//! Core building blocks for the Tidewater extraction runner.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, record, query, partition, task, outcome, errors）
//! - **transform**: レコード整形（vehicle id, rename, timestamp, number, select）
//! - **ports**: 抽象化レイヤー（QuerySource, RecordSink, Clock, IdGenerator）
//! - **impls**: 実装（PostgresSource, LakeSqlSource, JsonFilePersister, StaticSource）
//! - **registry**: TaskRegistry（宣言順・一意性チェック）
//! - **catalog**: 組み込みタスク（relational テーブル, lake の gga / pm061）
//! - **app**: ExtractionRunner と source のライフサイクル
//! - **config**: 環境変数 + TOML ファイル
//! - **observability**: LogContext と run の集計

pub mod app;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod registry;
pub mod transform;

pub use app::{ExtractionRunner, SourceSet, open_sources, run_extraction};
pub use config::Config;
pub use registry::{RegistryBuilder, TaskRegistry};
