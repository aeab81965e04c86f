//! Catalog - 組み込みタスク定義
//!
//! - **relational**: 固定名のテーブル抽出（vessels.json など）
//! - **lake**: 車両 × 日付の message 抽出（gga / pm061）
//!
//! lake タスクは車両が設定されている場合のみ登録されます。

pub mod lake;
pub mod relational;

use chrono::NaiveDate;

use crate::config::Config;
use crate::domain::RegistryError;
use crate::registry::TaskRegistry;

pub use self::relational::RelationalParams;

/// 組み込みタスクすべて（relational が先）
pub fn default_registry(config: &Config, lake_date: NaiveDate) -> Result<TaskRegistry, RegistryError> {
    let params = RelationalParams {
        since: config.relational.since,
        navigation_vessel_id: config.relational.navigation_vessel_id,
    };
    Ok(TaskRegistry::builder()
        .register_all(relational::tasks(params)?)?
        .register_all(lake::tasks(&config.lake.vehicles, lake_date)?)?
        .build())
}
