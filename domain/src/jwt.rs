//! Verification of dashboard bearer tokens.
//!
//! Tokens are issued by the attendance application and signed with the shared
//! HS256 secret from [`Config::jwt_secret`].

use crate::error::{AuthErrorKind, Error};
use events::Id;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use log::*;
use serde::{Deserialize, Serialize};
use service::config::Config;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardClaims {
    pub user_id: Id,
    /// Unset for platform administrators, who are not bound to one school.
    #[serde(default)]
    pub school_id: Option<Id>,
    #[serde(default)]
    pub role: Option<String>,
    pub exp: usize,
}

/// An authenticated dashboard user bound to one school.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DashboardPrincipal {
    pub user_id: Id,
    pub school_id: Id,
}

/// Verifies `token` and returns the school it grants access to.
pub fn authorize_dashboard(config: &Config, token: &str) -> Result<DashboardPrincipal, Error> {
    let secret = config.jwt_secret().ok_or_else(|| {
        warn!("Failed to get JWT secret from config");
        Error::config()
    })?;

    let claims = decode::<DashboardClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|e| {
        debug!("Refusing dashboard token: {e}");
        Error::from(e)
    })?
    .claims;

    let school_id = claims
        .school_id
        .ok_or_else(|| Error::auth(AuthErrorKind::TenantRequired))?;

    Ok(DashboardPrincipal {
        user_id: claims.user_id,
        school_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DomainErrorKind;
    use clap::Parser;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn config() -> Config {
        Config::parse_from(["attendance_relay"]).set_jwt_secret("dashboard-secret")
    }

    fn token(school_id: Option<Id>, exp_offset: i64, secret: &str) -> String {
        let claims = DashboardClaims {
            user_id: 12,
            school_id,
            role: Some("teacher".to_string()),
            exp: (chrono::Utc::now().timestamp() + exp_offset) as usize,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn valid_token_yields_the_school() {
        let principal =
            authorize_dashboard(&config(), &token(Some(1), 3600, "dashboard-secret")).unwrap();

        assert_eq!(
            principal,
            DashboardPrincipal {
                user_id: 12,
                school_id: 1
            }
        );
    }

    #[test]
    fn token_without_school_is_refused() {
        let err =
            authorize_dashboard(&config(), &token(None, 3600, "dashboard-secret")).unwrap_err();

        assert_eq!(err.error_kind, DomainErrorKind::Auth(AuthErrorKind::TenantRequired));
    }

    #[test]
    fn wrongly_signed_or_expired_tokens_are_invalid() {
        for bad in [
            token(Some(1), 3600, "another-secret"),
            token(Some(1), -3600, "dashboard-secret"),
            "not-a-jwt".to_string(),
        ] {
            let err = authorize_dashboard(&config(), &bad).unwrap_err();
            assert_eq!(err.error_kind, DomainErrorKind::Auth(AuthErrorKind::InvalidToken));
        }
    }
}
