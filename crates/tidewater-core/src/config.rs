//! Config - 実行設定
//!
//! 優先順位: 環境変数 > TOML ファイル > デフォルト値
//!
//! # Example TOML
//!
//! ```toml
//! output_dir = "./data"
//!
//! [relational]
//! url = "postgres://reader@timescale.internal/ops"
//! since = "2025-01-01"
//! navigation_vessel_id = 5
//!
//! [lake]
//! endpoint = "https://lake-gateway.internal/sql"
//! partition_base = "https://lake.blob.core.windows.net/raw"
//! vehicles = [123, "V000047"]
//! query_timeout_secs = 600
//! ```
//!
//! 接続情報の変数が空文字列の場合は未設定として扱います。

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::domain::{ConfigError, DEFAULT_STREAM, PartitionLayout, VehicleId};
use crate::impls::{LakeSettings, PostgresSettings};

pub const TIMESCALE_SERVICE_URL: &str = "TIMESCALE_SERVICE_URL";
pub const SYNAPSE_SQL_ENDPOINT: &str = "SYNAPSE_SQL_ENDPOINT";
pub const SYNAPSE_SQL_TOKEN: &str = "SYNAPSE_SQL_TOKEN";
pub const SYNAPSE_PARTITION_BASE: &str = "SYNAPSE_PARTITION_BASE";
pub const TIDEWATER_OUTPUT_DIR: &str = "TIDEWATER_OUTPUT_DIR";
pub const TIDEWATER_VEHICLES: &str = "TIDEWATER_VEHICLES";

const DEFAULT_OUTPUT_DIR: &str = "./data";
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(300);
const DEFAULT_NAVIGATION_VESSEL: i64 = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub output_dir: PathBuf,
    pub relational: RelationalConfig,
    pub lake: LakeConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationalConfig {
    pub url: Option<String>,
    pub connect_timeout: Duration,
    pub query_timeout: Duration,
    pub since: NaiveDate,
    pub navigation_vessel_id: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LakeConfig {
    pub endpoint: Option<String>,
    pub token: Option<String>,
    pub partition_base: Option<String>,
    pub stream: String,
    pub vehicles: Vec<VehicleId>,
    pub connect_timeout: Duration,
    pub query_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            relational: RelationalConfig::default(),
            lake: LakeConfig::default(),
        }
    }
}

impl Default for RelationalConfig {
    fn default() -> Self {
        Self {
            url: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            since: default_since(),
            navigation_vessel_id: DEFAULT_NAVIGATION_VESSEL,
        }
    }
}

impl Default for LakeConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            token: None,
            partition_base: None,
            stream: DEFAULT_STREAM.to_string(),
            vehicles: Vec::new(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }
}

fn default_since() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or(NaiveDate::MIN)
}

impl Config {
    /// Read `file` (if given) and apply overrides from `env`.
    ///
    /// `env` is a lookup function so tests do not touch the process environment.
    pub fn load(file: Option<&Path>, env: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = match file {
            Some(path) => FileConfig::read(path)?.into_config()?,
            None => Config::default(),
        };
        config.apply_env(env)?;
        Ok(config)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None, |key| std::env::var(key).ok())
    }

    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        let lookup = |key: &str| env(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(url) = lookup(TIMESCALE_SERVICE_URL) {
            self.relational.url = Some(url);
        }
        if let Some(endpoint) = lookup(SYNAPSE_SQL_ENDPOINT) {
            self.lake.endpoint = Some(endpoint);
        }
        if let Some(token) = lookup(SYNAPSE_SQL_TOKEN) {
            self.lake.token = Some(token);
        }
        if let Some(base) = lookup(SYNAPSE_PARTITION_BASE) {
            self.lake.partition_base = Some(base);
        }
        if let Some(dir) = lookup(TIDEWATER_OUTPUT_DIR) {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(list) = lookup(TIDEWATER_VEHICLES) {
            self.lake.vehicles = parse_vehicle_list(TIDEWATER_VEHICLES, &list)?;
        }
        Ok(())
    }
}

impl RelationalConfig {
    pub fn settings(&self) -> Result<PostgresSettings, ConfigError> {
        let url = self.url.clone().ok_or(ConfigError::Missing(TIMESCALE_SERVICE_URL))?;
        Ok(PostgresSettings {
            url,
            connect_timeout: self.connect_timeout,
            query_timeout: self.query_timeout,
        })
    }
}

impl LakeConfig {
    pub fn settings(&self) -> Result<LakeSettings, ConfigError> {
        let endpoint = self.endpoint.clone().ok_or(ConfigError::Missing(SYNAPSE_SQL_ENDPOINT))?;
        let base = self
            .partition_base
            .as_deref()
            .ok_or(ConfigError::Missing(SYNAPSE_PARTITION_BASE))?;
        Ok(LakeSettings {
            endpoint,
            token: self.token.clone(),
            layout: PartitionLayout::new(base, self.stream.as_str()),
            connect_timeout: self.connect_timeout,
            query_timeout: self.query_timeout,
        })
    }
}

/// カンマ区切りのリスト（例: `"V000123, 47"`）
pub fn parse_vehicle_list(key: &str, raw: &str) -> Result<Vec<VehicleId>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<VehicleId>().map_err(|e| ConfigError::Invalid {
                key: key.to_string(),
                reason: e.to_string(),
            })
        })
        .collect()
}

// ========================================
// TOML file
// ========================================

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    output_dir: Option<PathBuf>,
    relational: RelationalSection,
    lake: LakeSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RelationalSection {
    url: Option<String>,
    connect_timeout_secs: Option<u64>,
    query_timeout_secs: Option<u64>,
    since: Option<NaiveDate>,
    navigation_vessel_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct LakeSection {
    endpoint: Option<String>,
    token: Option<String>,
    partition_base: Option<String>,
    stream: Option<String>,
    vehicles: Vec<VehicleEntry>,
    connect_timeout_secs: Option<u64>,
    query_timeout_secs: Option<u64>,
}

/// 車両は整数でも `"V000123"` 形式の文字列でも書ける
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum VehicleEntry {
    Number(u64),
    Text(String),
}

impl FileConfig {
    fn read(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn into_config(self) -> Result<Config, ConfigError> {
        let defaults = Config::default();
        let secs = |v: Option<u64>, default: Duration| v.map(Duration::from_secs).unwrap_or(default);

        let vehicles = self
            .lake
            .vehicles
            .into_iter()
            .map(|entry| match entry {
                VehicleEntry::Number(n) => Ok(VehicleId::new(n)),
                VehicleEntry::Text(s) => s.parse::<VehicleId>().map_err(|e| ConfigError::Invalid {
                    key: "lake.vehicles".to_string(),
                    reason: e.to_string(),
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Config {
            output_dir: self.output_dir.unwrap_or(defaults.output_dir),
            relational: RelationalConfig {
                url: self.relational.url,
                connect_timeout: secs(self.relational.connect_timeout_secs, defaults.relational.connect_timeout),
                query_timeout: secs(self.relational.query_timeout_secs, defaults.relational.query_timeout),
                since: self.relational.since.unwrap_or(defaults.relational.since),
                navigation_vessel_id: self
                    .relational
                    .navigation_vessel_id
                    .unwrap_or(defaults.relational.navigation_vessel_id),
            },
            lake: LakeConfig {
                endpoint: self.lake.endpoint,
                token: self.lake.token,
                partition_base: self.lake.partition_base,
                stream: self.lake.stream.unwrap_or(defaults.lake.stream),
                vehicles,
                connect_timeout: secs(self.lake.connect_timeout_secs, defaults.lake.connect_timeout),
                query_timeout: secs(self.lake.query_timeout_secs, defaults.lake.query_timeout),
            },
        })
    }
}
