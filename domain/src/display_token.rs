//! Public-display token validation.

use crate::error::{AuthErrorKind, Error};
use chrono::Utc;
use entity_api::display_token;
use events::Id;
use log::*;
use sea_orm::DatabaseConnection;

/// Display tokens are 32 random bytes, hex encoded.
pub const DISPLAY_TOKEN_LENGTH: usize = 64;

/// A display terminal admitted by its token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplaySession {
    pub school_id: Id,
    pub display_token_id: Id,
}

/// Checks a display token and records the access.
///
/// Malformed, unknown, revoked and expired tokens are all refused with the
/// same [`AuthErrorKind::InvalidDisplayToken`] so a caller cannot tell them apart.
pub async fn validate(db: &DatabaseConnection, token: &str) -> Result<DisplaySession, Error> {
    if !is_well_formed(token) {
        debug!("Refusing malformed display token");
        return Err(Error::auth(AuthErrorKind::InvalidDisplayToken));
    }

    let record = display_token::find_by_token(db, token)
        .await?
        .ok_or_else(|| Error::auth(AuthErrorKind::InvalidDisplayToken))?;

    if !record.is_active {
        info!("Refusing revoked display token {}", record.id);
        return Err(Error::auth(AuthErrorKind::InvalidDisplayToken));
    }

    if let Some(expires_at) = record.expires_at {
        if expires_at <= Utc::now() {
            info!("Refusing expired display token {}", record.id);
            return Err(Error::auth(AuthErrorKind::InvalidDisplayToken));
        }
    }

    let session = DisplaySession {
        school_id: record.school_id,
        display_token_id: record.id,
    };

    if let Err(e) = display_token::touch_last_accessed(db, record).await {
        // Access bookkeeping never blocks a terminal.
        warn!("Failed to record display token access: {e}");
    }

    Ok(session)
}

pub fn is_well_formed(token: &str) -> bool {
    token.len() == DISPLAY_TOKEN_LENGTH && token.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_64_hex_characters_are_well_formed() {
        assert!(is_well_formed(&"a1".repeat(32)));
        assert!(!is_well_formed(&"a1".repeat(31)));
        assert!(!is_well_formed(&"zz".repeat(32)));
        assert!(!is_well_formed(""));
    }
}

#[cfg(test)]
#[cfg(feature = "mock")]
mod mock_tests {
    use super::*;
    use crate::error::DomainErrorKind;
    use entity::display_tokens::Model;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn display_token(is_active: bool, expires_in_hours: Option<i64>) -> Model {
        let now = Utc::now();
        Model {
            id: 3,
            school_id: 1,
            token: "ab".repeat(32),
            name: Some("Lobby".to_string()),
            is_active,
            last_accessed_at: None,
            expires_at: expires_in_hours.map(|h| (now + chrono::Duration::hours(h)).into()),
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

    #[tokio::test]
    async fn active_token_admits_the_terminal() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![display_token(true, Some(1))]])
            .append_query_results(vec![vec![display_token(true, Some(1))]])
            .into_connection();

        let session = validate(&db, &"ab".repeat(32)).await.unwrap();

        assert_eq!(
            session,
            DisplaySession {
                school_id: 1,
                display_token_id: 3
            }
        );
    }

    #[tokio::test]
    async fn revoked_token_is_refused() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![display_token(false, None)]])
            .into_connection();

        let err = validate(&db, &"ab".repeat(32)).await.unwrap_err();

        assert_eq!(
            err.error_kind,
            DomainErrorKind::Auth(AuthErrorKind::InvalidDisplayToken)
        );
    }

    #[tokio::test]
    async fn expired_token_is_refused() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![display_token(true, Some(-1))]])
            .into_connection();

        assert!(validate(&db, &"ab".repeat(32)).await.is_err());
    }
}
