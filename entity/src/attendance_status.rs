use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Status column of the `attendances` table.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, EnumIter, Deserialize, Serialize, DeriveActiveEnum)]
#[serde(rename_all = "snake_case")]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum AttendanceStatus {
    #[sea_orm(string_value = "on_time")]
    OnTime,
    #[sea_orm(string_value = "late")]
    Late,
    #[sea_orm(string_value = "very_late")]
    VeryLate,
    #[sea_orm(string_value = "absent")]
    Absent,
    #[sea_orm(string_value = "sick")]
    Sick,
    #[sea_orm(string_value = "excused")]
    Excused,
}

impl std::fmt::Display for AttendanceStatus {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttendanceStatus::OnTime => write!(fmt, "on_time"),
            AttendanceStatus::Late => write!(fmt, "late"),
            AttendanceStatus::VeryLate => write!(fmt, "very_late"),
            AttendanceStatus::Absent => write!(fmt, "absent"),
            AttendanceStatus::Sick => write!(fmt, "sick"),
            AttendanceStatus::Excused => write!(fmt, "excused"),
        }
    }
}
