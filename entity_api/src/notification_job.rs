//! The durable notification queue.
//!
//! Jobs are claimed with `FOR UPDATE SKIP LOCKED` and leased by pushing their
//! `available_at` past the lease expiry in the same transaction, so concurrent
//! workers never hand out the same row twice. A row is deleted only once its
//! job reached a terminal outcome.

use super::error::{EntityApiErrorKind, Error};
use entity::notification_jobs::{ActiveModel, Column, Entity, Model};
use log::*;
use sea_orm::{
    entity::prelude::*,
    sea_query::{Expr, LockBehavior, LockType},
    ActiveValue::Set,
    DatabaseConnection, PaginatorTrait, QueryOrder, QuerySelect, TransactionTrait,
};

pub async fn create(
    db: &DatabaseConnection,
    id: Uuid,
    payload: Json,
    available_at: DateTimeWithTimeZone,
) -> Result<Model, Error> {
    debug!("Queueing notification job {id} available at {available_at}");

    let active_model = ActiveModel {
        id: Set(id),
        payload: Set(payload),
        available_at: Set(available_at),
        created_at: Set(chrono::Utc::now().into()),
    };

    Ok(active_model.insert(db).await?)
}

/// Leases the oldest job whose `available_at` has passed until `lease_until`
/// and returns it. The row stays in the table.
pub async fn claim_next_ready(
    db: &DatabaseConnection,
    lease_until: DateTimeWithTimeZone,
) -> Result<Option<Model>, Error> {
    let now: DateTimeWithTimeZone = chrono::Utc::now().into();
    let txn = db.begin().await?;

    let job = Entity::find()
        .filter(Column::AvailableAt.lte(now))
        .order_by_asc(Column::AvailableAt)
        .order_by_asc(Column::CreatedAt)
        .lock_with_behavior(LockType::Update, LockBehavior::SkipLocked)
        .one(&txn)
        .await?;

    let job = match job {
        Some(mut job) => {
            Entity::update_many()
                .col_expr(Column::AvailableAt, Expr::value(lease_until))
                .filter(Column::Id.eq(job.id))
                .exec(&txn)
                .await?;
            trace!("Leased notification job {} until {lease_until}", job.id);
            job.available_at = lease_until;
            Some(job)
        }
        None => None,
    };

    txn.commit().await?;
    Ok(job)
}

/// Stores the new payload of a leased job and releases it at `available_at`.
pub async fn reschedule(
    db: &DatabaseConnection,
    id: Uuid,
    payload: Json,
    available_at: DateTimeWithTimeZone,
) -> Result<(), Error> {
    let result = Entity::update_many()
        .col_expr(Column::Payload, Expr::value(payload))
        .col_expr(Column::AvailableAt, Expr::value(available_at))
        .filter(Column::Id.eq(id))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        warn!("Notification job {id} vanished before it could be rescheduled");
        return Err(Error {
            source: None,
            error_kind: EntityApiErrorKind::RecordNotFound,
        });
    }

    debug!("Rescheduled notification job {id} for {available_at}");
    Ok(())
}

/// Deletes a job that reached a terminal outcome.
pub async fn complete(db: &DatabaseConnection, id: Uuid) -> Result<(), Error> {
    Entity::delete_by_id(id).exec(db).await?;
    trace!("Completed notification job {id}");
    Ok(())
}

/// Number of queued jobs, including those not yet available.
pub async fn count(db: &DatabaseConnection) -> Result<u64, Error> {
    Ok(Entity::find().count(db).await?)
}

#[cfg(test)]
#[cfg(feature = "mock")]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Value};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn job() -> Model {
        let now = chrono::Utc::now();
        Model {
            id: Uuid::new_v4(),
            payload: json!({"title": "Check-in: Dewi"}),
            available_at: now.into(),
            created_at: now.into(),
        }
    }

    #[tokio::test]
    async fn claim_leases_the_row_instead_of_deleting_it() -> Result<(), Error> {
        let queued = job();
        let lease_until: DateTimeWithTimeZone =
            (chrono::Utc::now() + chrono::Duration::seconds(60)).into();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![queued.clone()]])
            .append_exec_results(vec![MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();

        let claimed = claim_next_ready(&db, lease_until).await?.unwrap();
        assert_eq!(claimed.id, queued.id);
        assert_eq!(claimed.available_at, lease_until);

        let statements = format!("{:?}", db.into_transaction_log());
        assert!(statements.contains("SKIP LOCKED"));
        assert!(statements.contains("UPDATE"));
        assert!(!statements.contains("DELETE FROM"));

        Ok(())
    }

    #[tokio::test]
    async fn complete_deletes_the_row() -> Result<(), Error> {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results(vec![MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();

        complete(&db, Uuid::new_v4()).await?;

        let statements = format!("{:?}", db.into_transaction_log());
        assert!(statements.contains("DELETE FROM"));

        Ok(())
    }

    #[tokio::test]
    async fn reschedule_of_a_missing_row_is_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results(vec![MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .into_connection();

        let result = reschedule(
            &db,
            Uuid::new_v4(),
            json!({"attempt": 1}),
            chrono::Utc::now().into(),
        )
        .await;

        assert_eq!(
            result.unwrap_err().error_kind,
            EntityApiErrorKind::RecordNotFound
        );
    }

    #[tokio::test]
    async fn claim_on_empty_queue_returns_none() -> Result<(), Error> {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![Vec::<Model>::new()])
            .into_connection();

        assert_eq!(claim_next_ready(&db, chrono::Utc::now().into()).await?, None);

        Ok(())
    }

    #[tokio::test]
    async fn count_returns_queue_length() -> Result<(), Error> {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![BTreeMap::from([(
                "num_items",
                Value::BigInt(Some(4)),
            )])]])
            .into_connection();

        assert_eq!(count(&db).await?, 4);

        Ok(())
    }
}
