//! Attendance read model backed by the school database.

use crate::error::Error;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use entity::attendance_status::AttendanceStatus as StoredStatus;
use entity_api::attendance;
use events::{AttendanceEvent, AttendanceStatus, EventKind, Id};
use log::*;
use realtime::message::{LeaderboardEntry, Stats};
use realtime::read_model::{AttendanceReadModel, ReadModelError};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// Answers stats, leaderboard and live-feed queries for the current school day.
///
/// "Today" is the calendar day in the configured school time zone, so a scan at
/// 00:30 UTC already belongs to the next day in Asia/Jakarta.
pub struct PgAttendanceReadModel {
    db: Arc<DatabaseConnection>,
    timezone: Tz,
}

impl PgAttendanceReadModel {
    pub fn new(db: Arc<DatabaseConnection>, timezone: Tz) -> Self {
        Self { db, timezone }
    }

    fn today(&self) -> NaiveDate {
        school_day(Utc::now(), self.timezone)
    }
}

#[async_trait]
impl AttendanceReadModel for PgAttendanceReadModel {
    async fn stats(&self, tenant_id: Id, class_id: Option<Id>) -> Result<Stats, ReadModelError> {
        let today = self.today();

        let total = attendance::count_active_students(&self.db, tenant_id, class_id)
            .await
            .map_err(|e| read_error("Failed to count students", e))?;
        let counts = attendance::count_by_status(&self.db, tenant_id, class_id, today)
            .await
            .map_err(|e| read_error("Failed to count attendance", e))?;

        Ok(Stats::from_counts(
            total,
            counts.into_iter().filter_map(|row| {
                row.status
                    .map(|status| (status_from_stored(status), row.count.max(0) as u64))
            }),
        )
        .scoped_to(class_id))
    }

    async fn leaderboard(
        &self,
        tenant_id: Id,
        limit: u64,
    ) -> Result<Vec<LeaderboardEntry>, ReadModelError> {
        let arrivals = attendance::find_earliest_arrivals(&self.db, tenant_id, self.today(), limit)
            .await
            .map_err(|e| read_error("Failed to load leaderboard", e))?;

        Ok(arrivals
            .into_iter()
            .enumerate()
            .map(|(index, arrival)| LeaderboardEntry {
                rank: index as u32 + 1,
                student_name: arrival.student_name,
                class_name: arrival.class_name.unwrap_or_default(),
                arrival_time: arrival.check_in_time.with_timezone(&Utc),
            })
            .collect())
    }

    async fn live_feed(
        &self,
        tenant_id: Id,
        class_id: Option<Id>,
        limit: u64,
    ) -> Result<Vec<AttendanceEvent>, ReadModelError> {
        let scans = attendance::find_recent_scans(&self.db, tenant_id, class_id, self.today(), limit)
            .await
            .map_err(|e| read_error("Failed to load live feed", e))?;

        Ok(scans.into_iter().filter_map(scan_to_event).collect())
    }
}

/// The calendar day `now` falls on in `timezone`.
pub fn school_day(now: DateTime<Utc>, timezone: Tz) -> NaiveDate {
    now.with_timezone(&timezone).date_naive()
}

pub fn status_from_stored(status: StoredStatus) -> AttendanceStatus {
    match status {
        StoredStatus::OnTime => AttendanceStatus::OnTime,
        StoredStatus::Late => AttendanceStatus::Late,
        StoredStatus::VeryLate => AttendanceStatus::VeryLate,
        StoredStatus::Absent => AttendanceStatus::Absent,
        StoredStatus::Sick => AttendanceStatus::Sick,
        StoredStatus::Excused => AttendanceStatus::Excused,
    }
}

// A scan with a check-out is reported as the check-out, the latest thing that happened.
fn scan_to_event(scan: attendance::Scan) -> Option<AttendanceEvent> {
    let (kind, at) = match (scan.check_out_time, scan.check_in_time) {
        (Some(out), _) => (EventKind::CheckOut, out),
        (None, Some(check_in)) => (EventKind::CheckIn, check_in),
        (None, None) => return None,
    };

    Some(AttendanceEvent {
        tenant_id: scan.school_id,
        student_id: scan.student_id,
        student_name: scan.student_name,
        national_student_id: Some(scan.nisn),
        class_id: scan.class_id,
        class_name: scan.class_name,
        timestamp: at.with_timezone(&Utc),
        status: scan
            .status
            .map(status_from_stored)
            .unwrap_or(AttendanceStatus::OnTime),
        kind,
    })
}

fn read_error(message: &str, err: entity_api::error::Error) -> ReadModelError {
    warn!("{message}: {err}");
    ReadModelError::with_source(message, Error::from(err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn scan() -> attendance::Scan {
        attendance::Scan {
            school_id: 1,
            student_id: 501,
            student_name: "Dewi".to_string(),
            nisn: "0055566677".to_string(),
            class_id: Some(7),
            class_name: Some("7A".to_string()),
            check_in_time: Some(Utc.with_ymd_and_hms(2024, 7, 16, 0, 20, 0).unwrap().into()),
            check_out_time: None,
            status: Some(StoredStatus::Late),
        }
    }

    #[test]
    fn school_day_follows_the_school_time_zone() {
        let just_after_midnight_utc = Utc.with_ymd_and_hms(2024, 7, 15, 23, 30, 0).unwrap();

        assert_eq!(
            school_day(just_after_midnight_utc, chrono_tz::Asia::Jakarta),
            NaiveDate::from_ymd_opt(2024, 7, 16).unwrap()
        );
        assert_eq!(
            school_day(just_after_midnight_utc, chrono_tz::UTC),
            NaiveDate::from_ymd_opt(2024, 7, 15).unwrap()
        );
    }

    #[test]
    fn check_in_scan_becomes_check_in_event() {
        let event = scan_to_event(scan()).unwrap();

        assert_eq!(event.kind, EventKind::CheckIn);
        assert_eq!(event.status, AttendanceStatus::Late);
        assert_eq!(event.class_name.as_deref(), Some("7A"));
    }

    #[test]
    fn scan_with_check_out_reports_the_check_out() {
        let mut scan = scan();
        let out = Utc.with_ymd_and_hms(2024, 7, 16, 7, 0, 0).unwrap();
        scan.check_out_time = Some(out.into());

        let event = scan_to_event(scan).unwrap();

        assert_eq!(event.kind, EventKind::CheckOut);
        assert_eq!(event.timestamp, out);
    }

    #[test]
    fn scan_without_times_is_skipped() {
        let mut scan = scan();
        scan.check_in_time = None;

        assert!(scan_to_event(scan).is_none());
    }
}

#[cfg(test)]
#[cfg(feature = "mock")]
mod mock_tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, Value};
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn stats_combine_student_total_and_status_counts() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![BTreeMap::from([(
                "num_items",
                Value::BigInt(Some(40)),
            )])]])
            .append_query_results(vec![vec![
                BTreeMap::from([
                    ("status", Value::String(Some(Box::new("on_time".to_string())))),
                    ("count", Value::BigInt(Some(30))),
                ]),
                BTreeMap::from([
                    ("status", Value::String(Some(Box::new("sick".to_string())))),
                    ("count", Value::BigInt(Some(2))),
                ]),
            ]])
            .into_connection();

        let read_model = PgAttendanceReadModel::new(Arc::new(db), chrono_tz::Asia::Jakarta);
        let stats = read_model.stats(1, None).await.unwrap();

        assert_eq!(stats.total_students, 40);
        assert_eq!(stats.present, 30);
        assert_eq!(stats.sick, 2);
        assert_eq!(stats.absent, 8);
        assert_eq!(stats.percentage, 75.0);
    }
}
