//! Guardian and device-token queries for notification routing.

use super::error::Error;
use entity::{fcm_tokens, parents, student_parents, Id};
use log::*;
use sea_orm::{entity::prelude::*, sea_query::Expr, DatabaseConnection, JoinType, QuerySelect};

/// Active device registrations of every guardian linked to `student_id`.
pub async fn find_active_devices_for_student(
    db: &DatabaseConnection,
    student_id: Id,
) -> Result<Vec<fcm_tokens::Model>, Error> {
    let guardian_user_ids: Vec<Id> = parents::Entity::find()
        .join(JoinType::InnerJoin, parents::Relation::StudentParents.def())
        .filter(student_parents::Column::StudentId.eq(student_id))
        .all(db)
        .await?
        .into_iter()
        .map(|parent| parent.user_id)
        .collect();

    if guardian_user_ids.is_empty() {
        debug!("Student {student_id} has no linked guardians");
        return Ok(Vec::new());
    }

    Ok(fcm_tokens::Entity::find()
        .filter(fcm_tokens::Column::UserId.is_in(guardian_user_ids))
        .filter(fcm_tokens::Column::IsActive.eq(true))
        .all(db)
        .await?)
}

/// Marks every registration with this token value inactive. Returns the
/// number of rows changed.
pub async fn deactivate_device_token(db: &DatabaseConnection, token: &str) -> Result<u64, Error> {
    let result = fcm_tokens::Entity::update_many()
        .col_expr(fcm_tokens::Column::IsActive, Expr::value(false))
        .col_expr(
            fcm_tokens::Column::UpdatedAt,
            Expr::value(chrono::Utc::now().fixed_offset()),
        )
        .filter(fcm_tokens::Column::Token.eq(token))
        .exec(db)
        .await?;

    info!("Deactivated {} device token row(s)", result.rows_affected);
    Ok(result.rows_affected)
}

#[cfg(test)]
#[cfg(feature = "mock")]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    #[tokio::test]
    async fn student_without_guardians_skips_token_query() -> Result<(), Error> {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![Vec::<parents::Model>::new()])
            .into_connection();

        assert!(find_active_devices_for_student(&db, 9).await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn returns_tokens_of_linked_guardians() -> Result<(), Error> {
        let now = chrono::Utc::now();
        let parent = parents::Model {
            id: 2,
            school_id: 1,
            user_id: 40,
            name: "Ibu Sari".to_string(),
            phone: None,
            created_at: now.into(),
            updated_at: now.into(),
        };
        let token = fcm_tokens::Model {
            id: 5,
            user_id: 40,
            token: "device-registration".to_string(),
            platform: "android".to_string(),
            is_active: true,
            created_at: now.into(),
            updated_at: now.into(),
        };

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![parent]])
            .append_query_results(vec![vec![token.clone()]])
            .into_connection();

        assert_eq!(find_active_devices_for_student(&db, 9).await?, vec![token]);

        Ok(())
    }

    #[tokio::test]
    async fn deactivate_reports_rows_affected() -> Result<(), Error> {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results(vec![MockExecResult {
                last_insert_id: 0,
                rows_affected: 2,
            }])
            .into_connection();

        assert_eq!(deactivate_device_token(&db, "device-registration").await?, 2);

        Ok(())
    }
}
