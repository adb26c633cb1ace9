//! Append-only delivery history.

use super::error::Error;
use entity::delivery_outcomes::{ActiveModel, Column, Entity, Model};
use log::*;
use sea_orm::{entity::prelude::*, ActiveValue::Set, DatabaseConnection, QueryOrder};

pub async fn create(db: &DatabaseConnection, outcome: Model) -> Result<Model, Error> {
    debug!(
        "Recording {:?} for job {} (attempt {})",
        outcome.result, outcome.job_id, outcome.attempt
    );

    let active_model = ActiveModel {
        id: Set(outcome.id),
        job_id: Set(outcome.job_id),
        recipient_user_id: Set(outcome.recipient_user_id),
        target_ref: Set(outcome.target_ref),
        result: Set(outcome.result),
        attempt: Set(outcome.attempt),
        detail: Set(outcome.detail),
        recorded_at: Set(outcome.recorded_at),
    };

    Ok(active_model.insert(db).await?)
}

/// Every recorded attempt of one job, oldest first.
pub async fn find_by_job_id(db: &DatabaseConnection, job_id: Uuid) -> Result<Vec<Model>, Error> {
    Ok(Entity::find()
        .filter(Column::JobId.eq(job_id))
        .order_by_asc(Column::RecordedAt)
        .order_by_asc(Column::Attempt)
        .all(db)
        .await?)
}

#[cfg(test)]
#[cfg(feature = "mock")]
mod tests {
    use super::*;
    use entity::delivery_result::DeliveryResult;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn find_by_job_id_returns_attempts_in_order() -> Result<(), Error> {
        let job_id = Uuid::new_v4();
        let attempt = |n: i32, result: DeliveryResult| Model {
            id: Uuid::new_v4(),
            job_id,
            recipient_user_id: 40,
            target_ref: "device-registration".to_string(),
            result,
            attempt: n,
            detail: None,
            recorded_at: chrono::Utc::now().into(),
        };
        let rows = vec![
            attempt(1, DeliveryResult::RetryScheduled),
            attempt(2, DeliveryResult::Delivered),
        ];

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![rows.clone()])
            .into_connection();

        assert_eq!(find_by_job_id(&db, job_id).await?, rows);

        Ok(())
    }
}
