//! Audience-dependent projections of an attendance event.
//!
//! Views are assembled field by field from the canonical event; nothing is
//! copied wholesale and then stripped, so a field added to
//! [`AttendanceEvent`] never leaks to a consumer until it is added here.

use crate::connection::Audience;
use chrono::{DateTime, Utc};
use events::{AttendanceEvent, AttendanceStatus};
use serde::{Deserialize, Serialize};

/// The only attendance fields a live consumer ever receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudienceView {
    pub student_name: String,
    pub class_name: String,
    pub time: DateTime<Utc>,
    pub status: AttendanceStatus,
}

/// Derives the view of `event` that `audience` is allowed to see. Pure and total.
pub fn derive_view(event: &AttendanceEvent, audience: Audience) -> AudienceView {
    match audience {
        Audience::Dashboard => AudienceView {
            student_name: event.student_name.clone(),
            class_name: class_label(event),
            time: event.timestamp,
            status: event.status,
        },
        // Name and class only: the national student identifier, internal ids
        // and the tenant never reach an unauthenticated terminal.
        Audience::PublicDisplay => AudienceView {
            student_name: event.student_name.clone(),
            class_name: class_label(event),
            time: event.timestamp,
            status: event.status,
        },
    }
}

fn class_label(event: &AttendanceEvent) -> String {
    event.class_name.clone().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use events::EventKind;

    const STATUSES: [AttendanceStatus; 6] = [
        AttendanceStatus::OnTime,
        AttendanceStatus::Late,
        AttendanceStatus::VeryLate,
        AttendanceStatus::Absent,
        AttendanceStatus::Sick,
        AttendanceStatus::Excused,
    ];

    fn event(status: AttendanceStatus, kind: EventKind, class: Option<&str>) -> AttendanceEvent {
        AttendanceEvent {
            tenant_id: 31,
            student_id: 4077,
            student_name: "Siti Rahma".to_string(),
            national_student_id: Some("0098765432".to_string()),
            class_id: class.map(|_| 12),
            class_name: class.map(str::to_string),
            timestamp: Utc.with_ymd_and_hms(2024, 7, 15, 23, 59, 0).unwrap(),
            status,
            kind,
        }
    }

    #[test]
    fn public_view_exposes_only_whitelisted_fields() {
        for status in STATUSES {
            for kind in [EventKind::CheckIn, EventKind::CheckOut] {
                for class in [Some("7B"), None] {
                    let view = derive_view(&event(status, kind, class), Audience::PublicDisplay);
                    let json = serde_json::to_value(&view).unwrap();
                    let object = json.as_object().unwrap();

                    let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
                    keys.sort_unstable();
                    assert_eq!(keys, ["class_name", "status", "student_name", "time"]);

                    let rendered = json.to_string();
                    assert!(!rendered.contains("0098765432"));
                    assert!(!rendered.contains("4077"));
                }
            }
        }
    }

    #[test]
    fn dashboard_view_carries_name_class_time_and_status() {
        let source = event(AttendanceStatus::Late, EventKind::CheckIn, Some("7A"));
        let view = derive_view(&source, Audience::Dashboard);

        assert_eq!(view.student_name, "Siti Rahma");
        assert_eq!(view.class_name, "7A");
        assert_eq!(view.time, source.timestamp);
        assert_eq!(view.status, AttendanceStatus::Late);
    }

    #[test]
    fn missing_class_renders_empty_label() {
        let view = derive_view(
            &event(AttendanceStatus::OnTime, EventKind::CheckIn, None),
            Audience::PublicDisplay,
        );
        assert_eq!(view.class_name, "");
    }
}
