//! Lookups for public-display tokens.

use super::error::Error;
use entity::display_tokens::{ActiveModel, Entity, Model};
use log::*;
use sea_orm::{entity::prelude::*, ActiveValue::Set, DatabaseConnection};

/// Finds a display token by its secret value.
pub async fn find_by_token(db: &DatabaseConnection, token: &str) -> Result<Option<Model>, Error> {
    Ok(Entity::find()
        .filter(entity::display_tokens::Column::Token.eq(token))
        .one(db)
        .await?)
}

/// Records that a terminal just used `display_token`.
pub async fn touch_last_accessed(db: &DatabaseConnection, display_token: Model) -> Result<Model, Error> {
    debug!("Updating last access of display token {}", display_token.id);

    let now = chrono::Utc::now();
    let mut active_model: ActiveModel = display_token.into();
    active_model.last_accessed_at = Set(Some(now.into()));
    active_model.updated_at = Set(now.into());

    Ok(active_model.update(db).await?)
}

#[cfg(test)]
#[cfg(feature = "mock")]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn display_token() -> Model {
        let now = chrono::Utc::now();
        Model {
            id: 3,
            school_id: 1,
            token: "ab".repeat(32),
            name: Some("Lobby".to_string()),
            is_active: true,
            last_accessed_at: None,
            expires_at: None,
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

    #[tokio::test]
    async fn find_by_token_returns_matching_token() -> Result<(), Error> {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![display_token()]])
            .into_connection();

        let found = find_by_token(&db, &"ab".repeat(32)).await?;

        assert_eq!(found.map(|t| t.id), Some(3));

        Ok(())
    }

    #[tokio::test]
    async fn touch_last_accessed_sets_timestamp() -> Result<(), Error> {
        let mut touched = display_token();
        touched.last_accessed_at = Some(chrono::Utc::now().into());

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![touched.clone()]])
            .into_connection();

        let updated = touch_last_accessed(&db, display_token()).await?;

        assert!(updated.last_accessed_at.is_some());

        Ok(())
    }
}
