//! Shared-secret check for service-to-service endpoints.

use crate::error::{AuthErrorKind, Error};
use log::*;
use service::config::Config;

/// Accepts the request only when `provided` equals the configured internal
/// API secret. Fails with a configuration error while no secret is set.
pub fn verify(config: &Config, provided: Option<&str>) -> Result<(), Error> {
    let expected = config.internal_api_secret().ok_or_else(|| {
        warn!("Failed to get internal API secret from config");
        Error::config()
    })?;

    match provided {
        Some(provided) if constant_time_eq(provided.as_bytes(), expected.as_bytes()) => Ok(()),
        Some(_) => {
            debug!("Internal request carried a mismatching secret");
            Err(Error::auth(AuthErrorKind::InvalidSecret))
        }
        None => Err(Error::auth(AuthErrorKind::InvalidSecret)),
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DomainErrorKind, InternalErrorKind};
    use clap::Parser;

    fn config() -> Config {
        Config::parse_from(["attendance_relay"]).set_internal_api_secret("s3cret")
    }

    #[test]
    fn matching_secret_is_accepted() {
        assert!(verify(&config(), Some("s3cret")).is_ok());
    }

    #[test]
    fn wrong_or_missing_secret_is_rejected() {
        for provided in [Some("s3cre"), Some("S3CRET"), None] {
            let err = verify(&config(), provided).unwrap_err();
            assert_eq!(
                err.error_kind,
                DomainErrorKind::Auth(AuthErrorKind::InvalidSecret)
            );
        }
    }

    #[test]
    fn unset_secret_is_a_configuration_error() {
        let config = Config::parse_from(["attendance_relay"]);
        let err = verify(&config, Some("anything")).unwrap_err();
        assert_eq!(
            err.error_kind,
            DomainErrorKind::Internal(InternalErrorKind::Config)
        );
    }
}
