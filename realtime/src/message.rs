use crate::redaction::AudienceView;
use chrono::{DateTime, Utc};
use events::{AttendanceStatus, Id};
use serde::{Deserialize, Serialize};

/// Outbound message pushed to live consumers.
///
/// Derived fresh per audience for every event; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BroadcastMessage {
    NewAttendance {
        school_id: Id,
        attendance: AudienceView,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stats: Option<Stats>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        leaderboard: Option<Vec<LeaderboardEntry>>,
    },
    StatsUpdate {
        school_id: Id,
        stats: Stats,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        leaderboard: Option<Vec<LeaderboardEntry>>,
    },
}

impl BroadcastMessage {
    pub fn school_id(&self) -> Id {
        match self {
            BroadcastMessage::NewAttendance { school_id, .. }
            | BroadcastMessage::StatsUpdate { school_id, .. } => *school_id,
        }
    }
}

/// Aggregate attendance counters for today, either for one class or the
/// whole school.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    /// Class the counters cover; absent for school-wide counters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_id: Option<Id>,
    pub total_students: u64,
    /// Checked in on time.
    pub present: u64,
    pub late: u64,
    pub very_late: u64,
    pub absent: u64,
    pub sick: u64,
    pub excused: u64,
    /// Share of students physically present (on time, late or very late).
    pub percentage: f64,
}

impl Stats {
    /// Builds the counters from the number of active students and today's
    /// per-status record counts. Students without any record count as absent.
    pub fn from_counts<I>(total_students: u64, counts: I) -> Self
    where
        I: IntoIterator<Item = (AttendanceStatus, u64)>,
    {
        let mut stats = Stats {
            total_students,
            ..Default::default()
        };

        for (status, count) in counts {
            match status {
                AttendanceStatus::OnTime => stats.present += count,
                AttendanceStatus::Late => stats.late += count,
                AttendanceStatus::VeryLate => stats.very_late += count,
                AttendanceStatus::Sick => stats.sick += count,
                AttendanceStatus::Excused => stats.excused += count,
                // Derived below from the students without a record.
                AttendanceStatus::Absent => {}
            }
        }

        let attended = stats.attended();
        stats.absent = total_students.saturating_sub(attended + stats.sick + stats.excused);
        if total_students > 0 {
            stats.percentage = attended as f64 / total_students as f64 * 100.0;
        }

        stats
    }

    pub fn scoped_to(mut self, class_id: Option<Id>) -> Self {
        self.class_id = class_id;
        self
    }

    pub fn attended(&self) -> u64 {
        self.present + self.late + self.very_late
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub student_name: String,
    pub class_name: String,
    pub arrival_time: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn stats_derive_absent_and_percentage() {
        let stats = Stats::from_counts(
            40,
            [
                (AttendanceStatus::OnTime, 20),
                (AttendanceStatus::Late, 5),
                (AttendanceStatus::VeryLate, 1),
                (AttendanceStatus::Sick, 2),
                (AttendanceStatus::Excused, 1),
                (AttendanceStatus::Absent, 3),
            ],
        );

        assert_eq!(stats.present, 20);
        assert_eq!(stats.attended(), 26);
        assert_eq!(stats.absent, 11);
        assert_eq!(stats.percentage, 65.0);
    }

    #[test]
    fn stats_never_underflow() {
        let stats = Stats::from_counts(2, [(AttendanceStatus::OnTime, 3)]);
        assert_eq!(stats.absent, 0);

        let empty = Stats::from_counts(0, []);
        assert_eq!(empty.percentage, 0.0);
    }

    #[test]
    fn new_attendance_wire_shape() {
        let message = BroadcastMessage::NewAttendance {
            school_id: 9,
            attendance: AudienceView {
                student_name: "Budi".into(),
                class_name: "7A".into(),
                time: Utc.with_ymd_and_hms(2024, 7, 15, 0, 5, 0).unwrap(),
                status: AttendanceStatus::Late,
            },
            stats: None,
            leaderboard: Some(vec![]),
        };

        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "new_attendance");
        assert_eq!(json["school_id"], 9);
        assert_eq!(json["attendance"]["status"], "late");
        assert!(json.get("stats").is_none());
        assert!(json["leaderboard"].as_array().unwrap().is_empty());
    }
}
