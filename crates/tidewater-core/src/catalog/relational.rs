//! Relational catalog - time-series database のテーブル抽出
//!
//! 出力ファイル名は下流の consumer が参照するので固定です。

use chrono::NaiveDate;

use crate::domain::{OutputFile, Query, RegistryError, TaskDefinition, TaskId};
use crate::transform::{TimestampFormat, Transform};

pub const VESSELS: &str = "vessels";
pub const INCIDENTS: &str = "incidents";
pub const CONTROL: &str = "control";
pub const LOCATION: &str = "location";
pub const NAVIGATIONAL_REPORTS: &str = "navigational_reports";
pub const EMPLOYEES: &str = "employees";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationalParams {
    /// Lower bound for the message tables (`control`, `location`).
    pub since: NaiveDate,
    /// Vessel whose navigation reports are exported.
    pub navigation_vessel_id: i64,
}

const VESSELS_SQL: &str = "\
SELECT x_studio_vessel_id, x_name
FROM odoo_x_vessel
WHERE x_studio_vessel_id IS NOT NULL AND x_studio_vessel_id != ''";

const INCIDENTS_SQL: &str = "\
SELECT x_name, x_studio_vessels, x_studio_date, x_studio_priority, x_studio_human_error,
       x_studio_authorities, x_studio_type, x_studio_html_field_QMBdm, x_studio_technical_error_1
FROM odoo_x_incident_reporting";

const CONTROL_SQL: &str = "\
SELECT message_sent_time, system_running_state_id, vehicle_id
FROM pm010_messages
WHERE message_sent_time >= $1::date
ORDER BY message_sent_time";

const LOCATION_SQL: &str = "\
SELECT message_sent_time, location::text AS location, vehicle_id,
       latitude::float8 AS latitude, longitude::float8 AS longitude
FROM gga_messages
WHERE message_sent_time >= $1::date
ORDER BY message_sent_time";

const NAVIGATIONAL_REPORTS_SQL: &str = "\
SELECT id, vessel_id, remote_operator_id, boat_master, departure_place,
       departure_date_time, arrival_place, arrival_date_time, traffic_intensity,
       loaded_condition, sailing_had_problems, main_problem_cause, specify_other_cause,
       why_control_was_handed_over, was_e_stop_pushed, ship_connectivity,
       seafar_equipment_needed_improvement, which_equipment_notes, track_pilot_was_used,
       how_track_pilot_was_used, sailing_assessment_remarks
FROM odoo_navigation_report
WHERE vessel_id = $1::int8
ORDER BY departure_date_time";

const EMPLOYEES_SQL: &str = "\
SELECT id, name
FROM odoo_hr_employee";

pub fn tasks(params: RelationalParams) -> Result<Vec<TaskDefinition>, RegistryError> {
    Ok(vec![
        task(
            VESSELS,
            Query::relational(VESSELS_SQL),
            Transform::identity()
                .vehicle_id("x_studio_vessel_id", "vehicle_id")
                .rename("x_name", "vessel_name")
                .select(["vehicle_id", "vessel_name"]),
            "vessels.json",
        )?,
        task(
            INCIDENTS,
            Query::relational(INCIDENTS_SQL),
            Transform::identity().timestamp("x_studio_date", TimestampFormat::DayMonthYear),
            "incidents.json",
        )?,
        task(
            CONTROL,
            Query::relational(CONTROL_SQL).bind("since", params.since),
            Transform::identity().timestamp("message_sent_time", TimestampFormat::IsoSeconds),
            "control.json",
        )?,
        task(
            LOCATION,
            Query::relational(LOCATION_SQL).bind("since", params.since),
            Transform::identity().timestamp("message_sent_time", TimestampFormat::IsoSeconds),
            "location.json",
        )?,
        task(
            NAVIGATIONAL_REPORTS,
            Query::relational(NAVIGATIONAL_REPORTS_SQL).bind("vessel_id", params.navigation_vessel_id),
            Transform::identity()
                .timestamp("departure_date_time", TimestampFormat::IsoSeconds)
                .timestamp("arrival_date_time", TimestampFormat::IsoSeconds),
            "navigation_reports.json",
        )?,
        task(
            EMPLOYEES,
            Query::relational(EMPLOYEES_SQL),
            Transform::identity(),
            "employees.json",
        )?,
    ])
}

fn task(id: &str, query: Query, transform: Transform, file: &str) -> Result<TaskDefinition, RegistryError> {
    Ok(TaskDefinition::new(TaskId::new(id), query, transform, OutputFile::new(file)?))
}
