use async_trait::async_trait;
use entity::delivery_outcomes;
use entity::delivery_result::DeliveryResult as StoredResult;
use entity_api::delivery_outcome;
use notification::error::{Error, NotificationErrorKind};
use notification::history::DeliveryHistory;
use notification::job::{DeliveryOutcome, DeliveryResult};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use uuid::Uuid;

/// Persists every delivery attempt to `delivery_outcomes`.
pub struct PgDeliveryHistory {
    db: Arc<DatabaseConnection>,
}

impl PgDeliveryHistory {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DeliveryHistory for PgDeliveryHistory {
    async fn record(&self, outcome: &DeliveryOutcome) -> Result<(), Error> {
        let model = delivery_outcomes::Model {
            id: Uuid::new_v4(),
            job_id: outcome.job_id,
            recipient_user_id: outcome.recipient_user_id,
            target_ref: outcome.target_ref.clone(),
            result: to_stored(outcome.result),
            attempt: outcome.attempt as i32,
            detail: outcome.detail.clone(),
            recorded_at: outcome.recorded_at.into(),
        };

        delivery_outcome::create(&self.db, model)
            .await
            .map_err(history_error)?;
        Ok(())
    }

    async fn outcomes_for(&self, job_id: Uuid) -> Result<Vec<DeliveryOutcome>, Error> {
        let rows = delivery_outcome::find_by_job_id(&self.db, job_id)
            .await
            .map_err(history_error)?;

        Ok(rows
            .into_iter()
            .map(|row| DeliveryOutcome {
                job_id: row.job_id,
                recipient_user_id: row.recipient_user_id,
                target_ref: row.target_ref,
                recorded_at: row.recorded_at.into(),
                result: from_stored(row.result),
                attempt: row.attempt.max(0) as u32,
                detail: row.detail,
            })
            .collect())
    }
}

fn to_stored(result: DeliveryResult) -> StoredResult {
    match result {
        DeliveryResult::Delivered => StoredResult::Delivered,
        DeliveryResult::RetryScheduled => StoredResult::RetryScheduled,
        DeliveryResult::FailedPermanent => StoredResult::FailedPermanent,
    }
}

fn from_stored(result: StoredResult) -> DeliveryResult {
    match result {
        StoredResult::Delivered => DeliveryResult::Delivered,
        StoredResult::RetryScheduled => DeliveryResult::RetryScheduled,
        StoredResult::FailedPermanent => DeliveryResult::FailedPermanent,
    }
}

fn history_error(err: entity_api::error::Error) -> Error {
    Error::new(NotificationErrorKind::History, crate::error::Error::from(err))
}
