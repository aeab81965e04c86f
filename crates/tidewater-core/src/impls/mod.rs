//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **PostgresSource**: time-series relational database（tokio-postgres）
//! - **LakeSqlSource**: message lake の SQL gateway（reqwest）
//! - **JsonFilePersister**: 出力ディレクトリへの JSON 書き出し
//! - **StaticSource**: 開発・テスト用のスクリプト化された source

pub mod json_file;
pub mod lake;
pub mod postgres;
pub mod static_source;

pub use self::json_file::JsonFilePersister;
pub use self::lake::{LakeSettings, LakeSqlSource};
pub use self::postgres::{PostgresSettings, PostgresSource};
pub use self::static_source::StaticSource;
