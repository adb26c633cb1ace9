use crate::error::Error;
use crate::job::NotificationJob;
use crate::queue::JobQueue;
use async_trait::async_trait;
use chrono::Utc;
use chrono_tz::Tz;
use events::{AttendanceEvent, AttendanceStatus, DomainEvent, EventHandler, EventKind, Id};
use log::*;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A push-capable device belonging to one of a student's guardians.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardianDevice {
    pub user_id: Id,
    pub target_ref: String,
}

/// Lookup of guardian devices, backed by the school's records.
#[async_trait]
pub trait GuardianDirectory: Send + Sync {
    /// Active devices of every guardian linked to `student_id`.
    async fn guardian_devices(&self, student_id: Id) -> Result<Vec<GuardianDevice>, Error>;

    /// Stops using a device reference the gateway reported as invalid.
    async fn deactivate_target(&self, target_ref: &str) -> Result<(), Error>;
}

/// Converts attendance events into delivery jobs on the durable queue.
#[derive(Clone)]
pub struct Enqueuer {
    queue: Arc<dyn JobQueue>,
    directory: Arc<dyn GuardianDirectory>,
    timezone: Tz,
}

impl Enqueuer {
    pub fn new(queue: Arc<dyn JobQueue>, directory: Arc<dyn GuardianDirectory>, timezone: Tz) -> Self {
        Self {
            queue,
            directory,
            timezone,
        }
    }

    /// Appends `job` to the tail of the queue. Returns once the append is
    /// confirmed by the queue.
    pub async fn enqueue(&self, job: NotificationJob) -> Result<(), Error> {
        self.queue.push(&job, Utc::now()).await?;
        debug!(
            "Queued notification {} for user {}",
            job.id, job.recipient_user_id
        );
        Ok(())
    }

    /// Queues one job per guardian device of the event's student and returns
    /// how many were queued.
    pub async fn on_attendance_event(&self, event: &AttendanceEvent) -> Result<usize, Error> {
        let devices = self.directory.guardian_devices(event.student_id).await?;
        if devices.is_empty() {
            debug!(
                "Student {} has no guardian devices; nothing to notify",
                event.student_id
            );
            return Ok(0);
        }

        for device in &devices {
            self.enqueue(self.job_for(event, device)).await?;
        }

        info!(
            "Queued {} guardian notification(s) for student {}",
            devices.len(),
            event.student_id
        );
        Ok(devices.len())
    }

    fn job_for(&self, event: &AttendanceEvent, device: &GuardianDevice) -> NotificationJob {
        let local_time = event.timestamp.with_timezone(&self.timezone).format("%H:%M");
        let name = &event.student_name;

        let (notification_type, title, body) = match event.kind {
            EventKind::CheckIn => (
                "attendance_in",
                format!("Check-in: {name}"),
                format!(
                    "{name} checked in at {local_time} ({})",
                    status_label(event.status)
                ),
            ),
            EventKind::CheckOut => (
                "attendance_out",
                format!("Check-out: {name}"),
                format!("{name} checked out at {local_time}"),
            ),
        };

        let mut data = BTreeMap::new();
        data.insert("type".to_string(), notification_type.to_string());
        data.insert("student_id".to_string(), event.student_id.to_string());
        data.insert("status".to_string(), event.status.to_string());
        data.insert("time".to_string(), event.timestamp.to_rfc3339());

        NotificationJob::new(device.user_id, device.target_ref.clone(), title, body, data)
    }
}

fn status_label(status: AttendanceStatus) -> &'static str {
    match status {
        AttendanceStatus::OnTime => "on time",
        AttendanceStatus::Late => "late",
        AttendanceStatus::VeryLate => "very late",
        AttendanceStatus::Absent => "absent",
        AttendanceStatus::Sick => "sick",
        AttendanceStatus::Excused => "excused",
    }
}

#[async_trait]
impl EventHandler for Enqueuer {
    async fn handle(&self, event: &DomainEvent) {
        if let DomainEvent::AttendanceRecorded(attendance) = event {
            if let Err(e) = self.on_attendance_event(attendance).await {
                error!(
                    "Failed to queue guardian notification for student {}: {e}",
                    attendance.student_id
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NotificationErrorKind;
    use crate::queue::InMemoryJobQueue;
    use chrono::TimeZone;
    use std::time::Duration;

    struct StaticDirectory {
        devices: Vec<GuardianDevice>,
        fail: bool,
    }

    #[async_trait]
    impl GuardianDirectory for StaticDirectory {
        async fn guardian_devices(&self, _student_id: Id) -> Result<Vec<GuardianDevice>, Error> {
            if self.fail {
                return Err(Error {
                    source: None,
                    error_kind: NotificationErrorKind::Directory,
                });
            }
            Ok(self.devices.clone())
        }

        async fn deactivate_target(&self, _target_ref: &str) -> Result<(), Error> {
            Ok(())
        }
    }

    fn event(kind: EventKind) -> AttendanceEvent {
        AttendanceEvent {
            tenant_id: 1,
            student_id: 88,
            student_name: "Rina".into(),
            national_student_id: None,
            class_id: Some(3),
            class_name: Some("8C".into()),
            timestamp: Utc.with_ymd_and_hms(2024, 7, 15, 0, 5, 0).unwrap(),
            status: AttendanceStatus::Late,
            kind,
        }
    }

    fn enqueuer(queue: Arc<InMemoryJobQueue>, devices: Vec<GuardianDevice>, fail: bool) -> Enqueuer {
        Enqueuer::new(
            queue,
            Arc::new(StaticDirectory { devices, fail }),
            chrono_tz::Asia::Jakarta,
        )
    }

    #[tokio::test]
    async fn queues_one_job_per_guardian_device() {
        let queue = Arc::new(InMemoryJobQueue::new());
        let devices = vec![
            GuardianDevice {
                user_id: 10,
                target_ref: "phone-a".into(),
            },
            GuardianDevice {
                user_id: 11,
                target_ref: "phone-b".into(),
            },
        ];

        let queued = enqueuer(queue.clone(), devices, false)
            .on_attendance_event(&event(EventKind::CheckIn))
            .await
            .unwrap();
        assert_eq!(queued, 2);

        let first = queue.pop(Duration::ZERO).await.unwrap().unwrap();
        assert_eq!(first.recipient_user_id, 10);
        assert_eq!(first.target_ref, "phone-a");
        assert_eq!(first.attempt, 0);
        assert_eq!(first.title, "Check-in: Rina");
        assert_eq!(first.body, "Rina checked in at 07:05 (late)");
        assert_eq!(first.data["type"], "attendance_in");
        assert_eq!(first.data["student_id"], "88");
        assert_eq!(first.data["status"], "late");

        let second = queue.pop(Duration::ZERO).await.unwrap().unwrap();
        assert_eq!(second.target_ref, "phone-b");
    }

    #[tokio::test]
    async fn check_out_uses_attendance_out_type() {
        let queue = Arc::new(InMemoryJobQueue::new());
        let devices = vec![GuardianDevice {
            user_id: 10,
            target_ref: "phone-a".into(),
        }];

        enqueuer(queue.clone(), devices, false)
            .on_attendance_event(&event(EventKind::CheckOut))
            .await
            .unwrap();

        let job = queue.pop(Duration::ZERO).await.unwrap().unwrap();
        assert_eq!(job.data["type"], "attendance_out");
        assert_eq!(job.body, "Rina checked out at 07:05");
    }

    #[tokio::test]
    async fn directory_failure_is_returned_and_nothing_is_queued() {
        let queue = Arc::new(InMemoryJobQueue::new());

        let result = enqueuer(queue.clone(), Vec::new(), true)
            .on_attendance_event(&event(EventKind::CheckIn))
            .await;

        assert_eq!(
            result.unwrap_err().error_kind,
            NotificationErrorKind::Directory
        );
        assert_eq!(queue.len().await.unwrap(), 0);
    }
}
