//! Partition layout of the message lake.
//!
//! Messages are stored as gzip-compressed JSON envelopes under
//! `{base}/v{vehicle:06}-messages/{stream}/{yy}/{mm}/{dd}/*/*.json.gz`.
//! Everything here is pure formatting; nothing queries the lake.

use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::transform::parse_vehicle_id;

/// Default stream segment between the vehicle folder and the date folders.
pub const DEFAULT_STREAM: &str = "Renoir/Prod";

/// 数値の車両 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VehicleId(u64);

impl VehicleId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    /// Six-digit zero-filled form used in folder names. Longer ids are kept as is.
    pub fn padded(self) -> String {
        format!("{:06}", self.0)
    }
}

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{0}' is not a vehicle id")]
pub struct ParseVehicleIdError(String);

impl FromStr for VehicleId {
    type Err = ParseVehicleIdError;

    /// Accepts both `123` and the prefixed form `V000123`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_vehicle_id(s)
            .map(VehicleId)
            .ok_or_else(|| ParseVehicleIdError(s.to_string()))
    }
}

/// `2025-03-07` -> `25/03/07`.
pub fn date_partition(date: NaiveDate) -> String {
    date.format("%y/%m/%d").to_string()
}

/// 車両 1 台・1 日分のメッセージ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PartitionScope {
    pub vehicle: VehicleId,
    pub date: NaiveDate,
}

impl PartitionScope {
    pub fn new(vehicle: VehicleId, date: NaiveDate) -> Self {
        Self { vehicle, date }
    }
}

/// lake 上のメッセージ blob の配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionLayout {
    base: String,
    stream: String,
}

impl PartitionLayout {
    pub fn new(base: impl Into<String>, stream: impl Into<String>) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
            stream: stream.into().trim_matches('/').to_string(),
        }
    }

    /// `scope` の全 blob にマッチする glob
    pub fn glob(&self, scope: &PartitionScope) -> String {
        format!(
            "{}/v{}-messages/{}/{}/*/*.json.gz",
            self.base,
            scope.vehicle.padded(),
            self.stream,
            date_partition(scope.date),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn date_partition_uses_two_digit_year() {
        assert_eq!(date_partition(date(2025, 3, 7)), "25/03/07");
        assert_eq!(date_partition(date(2009, 12, 31)), "09/12/31");
    }

    #[test]
    fn vehicle_id_pads_to_six_digits() {
        assert_eq!(VehicleId::new(123).padded(), "000123");
        assert_eq!(VehicleId::new(1234567).padded(), "1234567");
    }

    #[test]
    fn vehicle_id_parses_prefixed_and_bare() {
        assert_eq!("V000123".parse::<VehicleId>().unwrap(), VehicleId::new(123));
        assert_eq!("17".parse::<VehicleId>().unwrap(), VehicleId::new(17));
        assert!("boat".parse::<VehicleId>().is_err());
    }

    #[test]
    fn layout_renders_blob_glob() {
        let layout = PartitionLayout::new("https://lake.example.net/messages/", DEFAULT_STREAM);
        let scope = PartitionScope::new(VehicleId::new(42), date(2025, 3, 7));
        assert_eq!(
            layout.glob(&scope),
            "https://lake.example.net/messages/v000042-messages/Renoir/Prod/25/03/07/*/*.json.gz"
        );
    }
}
