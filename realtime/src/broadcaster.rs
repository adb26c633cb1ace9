use crate::connection::{Audience, BroadcastFilter, Principal};
use crate::hub::Hub;
use crate::message::{BroadcastMessage, LeaderboardEntry, Stats};
use crate::read_model::AttendanceReadModel;
use crate::redaction::derive_view;
use async_trait::async_trait;
use events::{AttendanceEvent, DomainEvent, EventHandler, Id};
use log::*;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Maximum number of entries shown on a public-display leaderboard.
pub const LEADERBOARD_LIMIT: u64 = 10;

/// Turns domain events into redacted live messages and hands them to the [`Hub`].
///
/// Every entry point returns immediately: the stats queries and the hub
/// submissions run on a spawned task so the recording path is never held up.
/// Failures are logged here and never reach the caller.
#[derive(Clone)]
pub struct Broadcaster {
    hub: Hub,
    read_model: Arc<dyn AttendanceReadModel>,
    latency_target: Duration,
}

impl Broadcaster {
    pub fn new(hub: Hub, read_model: Arc<dyn AttendanceReadModel>, latency_target: Duration) -> Self {
        Self {
            hub,
            read_model,
            latency_target,
        }
    }

    pub fn on_attendance_event(&self, event: AttendanceEvent) -> JoinHandle<()> {
        let this = self.clone();
        let started = Instant::now();
        tokio::spawn(async move {
            this.broadcast_attendance(&event).await;
            this.check_latency(started, event.tenant_id);
        })
    }

    /// Pushes fresh counters after an attendance row was deleted or corrected.
    pub fn on_attendance_removed(&self, tenant_id: Id, class_id: Option<Id>) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            this.broadcast_stats(tenant_id, class_id).await;
        })
    }

    pub async fn on_display_token_revoked(&self, tenant_id: Id, display_token_id: Id) -> usize {
        self.hub
            .disconnect_principal(tenant_id, Principal::DisplayToken(display_token_id))
            .await
    }

    async fn broadcast_attendance(&self, event: &AttendanceEvent) {
        let tenant_id = event.tenant_id;

        let (class_stats, school_stats, leaderboard) = tokio::join!(
            self.class_stats_or_none(tenant_id, event.class_id),
            self.stats_or_none(tenant_id, None),
            self.leaderboard_or_none(tenant_id)
        );

        // Class-less events have no class dashboard to reach.
        if let Some(class_id) = event.class_id {
            self.hub.broadcast(
                BroadcastFilter::subscribed(tenant_id, Some(class_id)),
                &BroadcastMessage::NewAttendance {
                    school_id: tenant_id,
                    attendance: derive_view(event, Audience::Dashboard),
                    stats: class_stats,
                    leaderboard: None,
                },
            );
        }

        self.hub.broadcast(
            BroadcastFilter::subscribed(tenant_id, None),
            &BroadcastMessage::NewAttendance {
                school_id: tenant_id,
                attendance: derive_view(event, Audience::Dashboard),
                stats: school_stats.clone(),
                leaderboard: None,
            },
        );

        self.hub.broadcast(
            BroadcastFilter::public_displays(tenant_id),
            &BroadcastMessage::NewAttendance {
                school_id: tenant_id,
                attendance: derive_view(event, Audience::PublicDisplay),
                stats: school_stats,
                leaderboard,
            },
        );
    }

    async fn broadcast_stats(&self, tenant_id: Id, class_id: Option<Id>) {
        let (class_stats, school_stats, leaderboard) = tokio::join!(
            self.class_stats_or_none(tenant_id, class_id),
            self.stats_or_none(tenant_id, None),
            self.leaderboard_or_none(tenant_id)
        );

        if let (Some(class_id), Some(stats)) = (class_id, class_stats) {
            self.hub.broadcast(
                BroadcastFilter::subscribed(tenant_id, Some(class_id)),
                &BroadcastMessage::StatsUpdate {
                    school_id: tenant_id,
                    stats,
                    leaderboard: None,
                },
            );
        }

        let Some(stats) = school_stats else {
            return;
        };

        // Without a class every dashboard may be affected, so all of them
        // get the school counters.
        let dashboards = match class_id {
            Some(_) => BroadcastFilter::subscribed(tenant_id, None),
            None => BroadcastFilter::dashboards(tenant_id, None),
        };
        self.hub.broadcast(
            dashboards,
            &BroadcastMessage::StatsUpdate {
                school_id: tenant_id,
                stats: stats.clone(),
                leaderboard: None,
            },
        );

        self.hub.broadcast(
            BroadcastFilter::public_displays(tenant_id),
            &BroadcastMessage::StatsUpdate {
                school_id: tenant_id,
                stats,
                leaderboard,
            },
        );
    }

    async fn class_stats_or_none(&self, tenant_id: Id, class_id: Option<Id>) -> Option<Stats> {
        match class_id {
            Some(class_id) => self.stats_or_none(tenant_id, Some(class_id)).await,
            None => None,
        }
    }

    async fn stats_or_none(&self, tenant_id: Id, class_id: Option<Id>) -> Option<Stats> {
        match self.read_model.stats(tenant_id, class_id).await {
            Ok(stats) => Some(stats.scoped_to(class_id)),
            Err(e) => {
                warn!("Failed to load stats for school {tenant_id} class {class_id:?}: {e}");
                None
            }
        }
    }

    async fn leaderboard_or_none(&self, tenant_id: Id) -> Option<Vec<LeaderboardEntry>> {
        match self.read_model.leaderboard(tenant_id, LEADERBOARD_LIMIT).await {
            Ok(entries) => Some(entries),
            Err(e) => {
                warn!("Failed to load leaderboard for school {tenant_id}: {e}");
                None
            }
        }
    }

    fn check_latency(&self, started: Instant, tenant_id: Id) {
        let elapsed = started.elapsed();
        if elapsed > self.latency_target {
            warn!(
                "Broadcast for school {tenant_id} took {}ms (target {}ms)",
                elapsed.as_millis(),
                self.latency_target.as_millis()
            );
        } else {
            trace!("Broadcast for school {tenant_id} took {}ms", elapsed.as_millis());
        }
    }
}

#[async_trait]
impl EventHandler for Broadcaster {
    async fn handle(&self, event: &DomainEvent) {
        match event {
            DomainEvent::AttendanceRecorded(attendance) => {
                debug!(
                    "Broadcasting attendance of student {} for school {}",
                    attendance.student_id, attendance.tenant_id
                );
                self.on_attendance_event(attendance.clone());
            }
            DomainEvent::AttendanceRemoved {
                tenant_id,
                class_id,
            } => {
                self.on_attendance_removed(*tenant_id, *class_id);
            }
            DomainEvent::DisplayTokenRevoked {
                tenant_id,
                display_token_id,
            } => {
                self.on_display_token_revoked(*tenant_id, *display_token_id)
                    .await;
            }
        }
    }
}
