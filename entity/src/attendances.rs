//! SeaORM Entity for the attendances table.
//! One row per student per school day; written by the recording path.

use crate::attendance_status::AttendanceStatus;
use crate::Id;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "attendances")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: Id,
    pub student_id: Id,
    /// School-local calendar day the row belongs to
    pub date: Date,
    pub check_in_time: Option<DateTimeWithTimeZone>,
    pub check_out_time: Option<DateTimeWithTimeZone>,
    pub status: Option<AttendanceStatus>,
    /// How the scan was captured (rfid, manual)
    pub method: String,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::students::Entity",
        from = "Column::StudentId",
        to = "super::students::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Students,
}

impl Related<super::students::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Students.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
