//! Lake catalog - 車両ごと・日付ごとの message 抽出
//!
//! message は gzip 圧縮された JSON envelope で、`0x0b` を区切り文字にした CSV として
//! 1 行ずつ読み込み、`OPENJSON` で展開します。

use chrono::{NaiveDate, NaiveTime};

use crate::domain::{OutputFile, PartitionScope, Query, RegistryError, TaskDefinition, TaskId, VehicleId};
use crate::transform::Transform;

pub const GGA: &str = "gga";
pub const PM061: &str = "pm061";

const GGA_SQL: &str = "\
SELECT
    CONVERT(VARCHAR, [NestedArray].[MessageSentDateTimeUtc] AT TIME ZONE 'UTC' AT TIME ZONE 'Central Europe Standard Time', 127) AS MessageSentDateTimeString,
    [NestedArray].[MessageType] AS MessageType,
    [NestedArray].[MessageSenderType] AS MessageSenderType,
    [NestedArray].[MessageSenderId] AS MessageSenderId,
    [NestedArray].[MessageSenderGatewayHostId] AS MessageSenderGatewayHostId,
    [NestedArray].[IsMessageSentDelivered] AS IsMessageSentDelivered,
    [NestedArray].[MessageBodyLoaded] AS MessageBodyLoaded,
    [NestedArray].[Latitude] AS Latitude,
    [NestedArray].[Longitude] AS Longitude,
    [NestedArray].[MessageSentDateTimeUtc] AS MessageSentDateTimeUtc
FROM
    OPENROWSET(
        BULK '{partition_glob}',
        FORMAT = 'CSV',
        FIELDQUOTE = '0x0b',
        FIELDTERMINATOR = '0x0b',
        ROWTERMINATOR = '0x0b',
        PARSER_VERSION = '1.0',
        DATA_COMPRESSION = 'GZIP'
    )
    WITH (jsonContent varchar(MAX)) AS [result]
CROSS APPLY OPENJSON(JSON_QUERY([jsonContent], '$'))
WITH (
    [MessageType] varchar(255) '$.MessageType',
    [MessageSentDateTimeUtc] DATETIME2 '$.MessageSentDateTimeUtc',
    [MessageSenderType] varchar(255) '$.MessageSenderType',
    [MessageSenderId] varchar(255) '$.MessageSenderId',
    [MessageSenderGatewayHostId] varchar(255) '$.MessageSenderGatewayHostId',
    [IsMessageSentDelivered] Bit '$.IsMessageSentDelivered',
    [MessageBodyLoaded] varchar(255) '$.Message.MessageBodyLoaded',
    [Latitude] varchar(255) '$.Message.Latitude',
    [Longitude] varchar(255) '$.Message.Longitude'
) AS [NestedArray]
WHERE [NestedArray].[MessageType] = '$--GGA'
  AND [NestedArray].[MessageSentDateTimeUtc] >= @since
ORDER BY MessageSentDateTimeUtc";

const PM061_SQL: &str = "\
SELECT
    CONVERT(VARCHAR, [NestedArray].[MessageSentDateTimeUtc] AT TIME ZONE 'UTC' AT TIME ZONE 'Central Europe Standard Time', 127) AS MessageSentDateTimeString,
    [NestedArray].[MessageType] AS MessageType,
    [NestedArray].[MessageSentDateTimeUtc] AS MessageSentDateTimeUtc,
    [NestedArray].[MessageSenderType] AS MessageSenderType,
    [NestedArray].[MessageSenderId] AS MessageSenderId,
    [NestedArray].[MessageSenderGatewayHostId] AS MessageSenderGatewayHostId,
    [NestedArray].[MessageBodyLoaded] AS MessageBodyLoaded,
    [NestedArray].[EntityId] AS EntityId,
    [NestedArray].[ValueTypeId] AS ValueTypeId,
    [NestedArray].[Value] AS Value,
    [NestedArray].[ValueUnitId] AS ValueUnitId,
    [NestedArray].[TimeIntervalId] AS TimeIntervalId,
    [NestedArray].[TimeIntervalAggregationTypeId] AS TimeIntervalAggregationTypeId
FROM
    OPENROWSET(
        BULK '{partition_glob}',
        FORMAT = 'CSV',
        FIELDQUOTE = '0x0b',
        FIELDTERMINATOR = '0x0b',
        ROWTERMINATOR = '0x0b',
        PARSER_VERSION = '1.0',
        DATA_COMPRESSION = 'GZIP'
    )
    WITH (jsonContent varchar(MAX)) AS [result]
CROSS APPLY OPENJSON(JSON_QUERY([jsonContent], '$'))
WITH (
    [MessageType] varchar(255) '$.MessageType',
    [MessageSentDateTimeUtc] DATETIME2 '$.MessageSentDateTimeUtc',
    [MessageSenderType] varchar(255) '$.MessageSenderType',
    [MessageSenderId] varchar(255) '$.MessageSenderId',
    [MessageSenderGatewayHostId] varchar(255) '$.MessageSenderGatewayHostId',
    [MessageBodyLoaded] varchar(255) '$.Message.MessageBodyLoaded',
    [EntityId] varchar(50) '$.Message.EntityId',
    [ValueTypeId] int '$.Message.ValueTypeId',
    [Value] float '$.Message.Value.Value',
    [ValueUnitId] varchar(50) '$.Message.ValueUnitId',
    [TimeIntervalId] INT '$.Message.TimeIntervalId',
    [TimeIntervalAggregationTypeId] INT '$.Message.TimeIntervalAggregationTypeId'
) AS [NestedArray]
WHERE [NestedArray].[MessageType] = '$PM061'
ORDER BY MessageSentDateTimeUtc";

/// 車両 1 台分の位置メッセージ（`date` の 0 時以降）
pub fn gga_task(vehicle: VehicleId, date: NaiveDate) -> Result<TaskDefinition, RegistryError> {
    let scope = PartitionScope::new(vehicle, date);
    let query = Query::lake(GGA_SQL, scope).bind("since", date.and_time(NaiveTime::MIN));
    let transform = Transform::identity().number("Latitude").number("Longitude");
    Ok(TaskDefinition::new(
        task_id(GGA, vehicle, date),
        query,
        transform,
        OutputFile::new(format!("gga_data_{vehicle}_{date}.json"))?,
    )
    .with_group(GGA))
}

/// 車両 1 台・1 日分のパーティションの燃料消費レポート
pub fn pm061_task(vehicle: VehicleId, date: NaiveDate) -> Result<TaskDefinition, RegistryError> {
    let query = Query::lake(PM061_SQL, PartitionScope::new(vehicle, date));
    Ok(TaskDefinition::new(
        task_id(PM061, vehicle, date),
        query,
        Transform::identity(),
        OutputFile::new(format!("pm061_data_{vehicle}_{date}.json"))?,
    )
    .with_group(PM061))
}

/// 全車両の lake タスク（車両ごとに gga, pm061 の順）
pub fn tasks(vehicles: &[VehicleId], date: NaiveDate) -> Result<Vec<TaskDefinition>, RegistryError> {
    let mut tasks = Vec::with_capacity(vehicles.len() * 2);
    for &vehicle in vehicles {
        tasks.push(gga_task(vehicle, date)?);
        tasks.push(pm061_task(vehicle, date)?);
    }
    Ok(tasks)
}

fn task_id(group: &str, vehicle: VehicleId, date: NaiveDate) -> TaskId {
    TaskId::new(format!("{group}:{vehicle}:{date}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ParamValue, SourceKind};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 7).unwrap()
    }

    #[test]
    fn gga_task_is_scoped_and_bound() {
        let task = gga_task(VehicleId::new(123), date()).unwrap();

        assert_eq!(task.id().as_str(), "gga:123:2025-03-07");
        assert_eq!(task.group(), GGA);
        assert_eq!(task.output().as_str(), "gga_data_123_2025-03-07.json");
        assert_eq!(task.source(), SourceKind::Lake);

        let query = task.query();
        assert!(query.statement().contains("BULK '{partition_glob}'"));
        assert!(query.statement().contains("@since"));
        assert_eq!(query.scope(), Some(&PartitionScope::new(VehicleId::new(123), date())));
        assert_eq!(
            query.params()[0].value,
            ParamValue::Timestamp(date().and_hms_opt(0, 0, 0).unwrap())
        );
    }

    #[test]
    fn pm061_task_has_no_time_filter() {
        let task = pm061_task(VehicleId::new(7), date()).unwrap();
        assert_eq!(task.output().as_str(), "pm061_data_7_2025-03-07.json");
        assert!(task.query().params().is_empty());
        assert!(task.query().statement().contains("'$PM061'"));
    }

    #[test]
    fn tasks_are_grouped_per_vehicle() {
        let ids: Vec<String> = tasks(&[VehicleId::new(1), VehicleId::new(2)], date())
            .unwrap()
            .iter()
            .map(|t| t.id().to_string())
            .collect();
        assert_eq!(
            ids,
            vec![
                "gga:1:2025-03-07",
                "pm061:1:2025-03-07",
                "gga:2:2025-03-07",
                "pm061:2:2025-03-07",
            ]
        );
    }
}
