//! Durable notification queue stored in the `notification_jobs` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use entity::delivery_outcomes;
use entity::delivery_result::DeliveryResult as StoredResult;
use entity::notification_jobs;
use entity_api::{delivery_outcome, notification_job};
use log::*;
use notification::error::{Error, NotificationErrorKind};
use notification::job::NotificationJob;
use notification::queue::{JobQueue, DEFAULT_LEASE};
use sea_orm::DatabaseConnection;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Postgres-backed [`JobQueue`]. Jobs survive restarts; concurrent workers
/// never lease the same row at the same time.
pub struct PgJobQueue {
    db: Arc<DatabaseConnection>,
    poll_interval: Duration,
    lease: Duration,
}

impl PgJobQueue {
    pub fn new(db: Arc<DatabaseConnection>, poll_interval: Duration) -> Self {
        Self {
            db,
            poll_interval,
            lease: DEFAULT_LEASE,
        }
    }

    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    fn lease_until(&self) -> DateTime<Utc> {
        Utc::now() + chrono::Duration::from_std(self.lease).unwrap_or_else(|_| chrono::Duration::zero())
    }

    async fn try_claim(&self) -> Result<Option<NotificationJob>, Error> {
        loop {
            let claimed = notification_job::claim_next_ready(&self.db, self.lease_until().into())
                .await
                .map_err(queue_error)?;

            let Some(row) = claimed else {
                return Ok(None);
            };

            match serde_json::from_value::<NotificationJob>(row.payload.clone()) {
                Ok(job) => return Ok(Some(job)),
                Err(e) => self.discard_undecodable(row, e).await?,
            }
        }
    }

    // An undecodable row can never be delivered: record it as failed and drop it.
    async fn discard_undecodable(
        &self,
        row: notification_jobs::Model,
        cause: serde_json::Error,
    ) -> Result<(), Error> {
        error!("Notification job {} has an undecodable payload: {cause}", row.id);

        let payload = &row.payload;
        let outcome = delivery_outcomes::Model {
            id: Uuid::new_v4(),
            job_id: row.id,
            recipient_user_id: payload
                .get("recipient_user_id")
                .and_then(Value::as_i64)
                .unwrap_or_default(),
            target_ref: payload
                .get("target_ref")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            result: StoredResult::FailedPermanent,
            attempt: payload
                .get("attempt")
                .and_then(Value::as_i64)
                .map_or(1, |attempt| attempt.saturating_add(1))
                .clamp(1, i32::MAX as i64) as i32,
            detail: Some(format!("undecodable payload: {cause}")),
            recorded_at: Utc::now().into(),
        };

        delivery_outcome::create(&self.db, outcome)
            .await
            .map_err(|e| Error::new(NotificationErrorKind::History, crate::error::Error::from(e)))?;
        notification_job::complete(&self.db, row.id)
            .await
            .map_err(queue_error)
    }
}

#[async_trait]
impl JobQueue for PgJobQueue {
    async fn push(&self, job: &NotificationJob, not_before: DateTime<Utc>) -> Result<(), Error> {
        let payload = serde_json::to_value(job)?;
        notification_job::create(&self.db, job.id, payload, not_before.into())
            .await
            .map_err(queue_error)?;
        Ok(())
    }

    async fn pop(&self, wait: Duration) -> Result<Option<NotificationJob>, Error> {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            if let Some(job) = self.try_claim().await? {
                return Ok(Some(job));
            }
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    async fn reschedule(
        &self,
        job: &NotificationJob,
        not_before: DateTime<Utc>,
    ) -> Result<(), Error> {
        let payload = serde_json::to_value(job)?;
        notification_job::reschedule(&self.db, job.id, payload, not_before.into())
            .await
            .map_err(queue_error)
    }

    async fn complete(&self, job_id: Uuid) -> Result<(), Error> {
        notification_job::complete(&self.db, job_id)
            .await
            .map_err(queue_error)
    }

    async fn len(&self) -> Result<u64, Error> {
        notification_job::count(&self.db).await.map_err(queue_error)
    }
}

fn queue_error(err: entity_api::error::Error) -> Error {
    Error::new(NotificationErrorKind::Queue, crate::error::Error::from(err))
}
