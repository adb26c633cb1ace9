//! Read-only attendance queries backing live stats, leaderboards and feeds.

use super::error::Error;
use chrono::NaiveDate;
use entity::attendance_status::AttendanceStatus;
use entity::{attendances, classes, students, Id};
use log::*;
use sea_orm::{
    entity::prelude::*, DatabaseConnection, FromQueryResult, JoinType, PaginatorTrait,
    QueryOrder, QuerySelect,
};

/// Number of today's attendance rows with a given status.
#[derive(Debug, Clone, PartialEq, FromQueryResult)]
pub struct StatusCount {
    pub status: Option<AttendanceStatus>,
    pub count: i64,
}

/// An on-time check-in, joined with the names shown on a leaderboard.
#[derive(Debug, Clone, PartialEq, FromQueryResult)]
pub struct Arrival {
    pub student_name: String,
    pub class_name: Option<String>,
    pub check_in_time: DateTimeWithTimeZone,
}

/// A scan of the day, joined with the student and class it belongs to.
#[derive(Debug, Clone, PartialEq, FromQueryResult)]
pub struct Scan {
    pub school_id: Id,
    pub student_id: Id,
    pub student_name: String,
    pub nisn: String,
    pub class_id: Option<Id>,
    pub class_name: Option<String>,
    pub check_in_time: Option<DateTimeWithTimeZone>,
    pub check_out_time: Option<DateTimeWithTimeZone>,
    pub status: Option<AttendanceStatus>,
}

/// Counts the active students of a school, or of one of its classes.
pub async fn count_active_students(
    db: &DatabaseConnection,
    school_id: Id,
    class_id: Option<Id>,
) -> Result<u64, Error> {
    let mut query = students::Entity::find()
        .filter(students::Column::SchoolId.eq(school_id))
        .filter(students::Column::IsActive.eq(true));

    if let Some(class_id) = class_id {
        query = query.filter(students::Column::ClassId.eq(class_id));
    }

    Ok(query.count(db).await?)
}

/// Groups the attendance rows of `date` by status.
pub async fn count_by_status(
    db: &DatabaseConnection,
    school_id: Id,
    class_id: Option<Id>,
    date: NaiveDate,
) -> Result<Vec<StatusCount>, Error> {
    debug!("Counting attendance by status for school {school_id} class {class_id:?} on {date}");

    let mut query = attendances::Entity::find()
        .select_only()
        .column(attendances::Column::Status)
        .column_as(attendances::Column::Id.count(), "count")
        .join(JoinType::InnerJoin, attendances::Relation::Students.def())
        .filter(students::Column::SchoolId.eq(school_id))
        .filter(students::Column::IsActive.eq(true))
        .filter(attendances::Column::Date.eq(date));

    if let Some(class_id) = class_id {
        query = query.filter(students::Column::ClassId.eq(class_id));
    }

    Ok(query
        .group_by(attendances::Column::Status)
        .into_model::<StatusCount>()
        .all(db)
        .await?)
}

/// Earliest on-time check-ins of `date`, at most `limit`.
pub async fn find_earliest_arrivals(
    db: &DatabaseConnection,
    school_id: Id,
    date: NaiveDate,
    limit: u64,
) -> Result<Vec<Arrival>, Error> {
    Ok(attendances::Entity::find()
        .select_only()
        .column_as(students::Column::Name, "student_name")
        .column_as(classes::Column::Name, "class_name")
        .column(attendances::Column::CheckInTime)
        .join(JoinType::InnerJoin, attendances::Relation::Students.def())
        .join(JoinType::LeftJoin, students::Relation::Classes.def())
        .filter(students::Column::SchoolId.eq(school_id))
        .filter(attendances::Column::Date.eq(date))
        .filter(attendances::Column::CheckInTime.is_not_null())
        .filter(attendances::Column::Status.eq(AttendanceStatus::OnTime))
        .order_by_asc(attendances::Column::CheckInTime)
        .limit(limit)
        .into_model::<Arrival>()
        .all(db)
        .await?)
}

/// Most recently touched scans of `date`, newest first.
pub async fn find_recent_scans(
    db: &DatabaseConnection,
    school_id: Id,
    class_id: Option<Id>,
    date: NaiveDate,
    limit: u64,
) -> Result<Vec<Scan>, Error> {
    let mut query = attendances::Entity::find()
        .select_only()
        .column(students::Column::SchoolId)
        .column(attendances::Column::StudentId)
        .column_as(students::Column::Name, "student_name")
        .column(students::Column::Nisn)
        .column(students::Column::ClassId)
        .column_as(classes::Column::Name, "class_name")
        .column(attendances::Column::CheckInTime)
        .column(attendances::Column::CheckOutTime)
        .column(attendances::Column::Status)
        .join(JoinType::InnerJoin, attendances::Relation::Students.def())
        .join(JoinType::LeftJoin, students::Relation::Classes.def())
        .filter(students::Column::SchoolId.eq(school_id))
        .filter(attendances::Column::Date.eq(date))
        .filter(attendances::Column::CheckInTime.is_not_null());

    if let Some(class_id) = class_id {
        query = query.filter(students::Column::ClassId.eq(class_id));
    }

    Ok(query
        .order_by_desc(attendances::Column::UpdatedAt)
        .limit(limit)
        .into_model::<Scan>()
        .all(db)
        .await?)
}
