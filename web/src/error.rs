use std::error::Error as StdError;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use domain::error::{
    AuthErrorKind, DomainErrorKind, EntityErrorKind, Error as DomainError, ExternalErrorKind,
    InternalErrorKind,
};

extern crate log;
use log::*;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub struct Error(DomainError);

impl StdError for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> core::result::Result<(), std::fmt::Error> {
        write!(fmt, "{self:?}")
    }
}

// List of possible StatusCode variants https://docs.rs/http/latest/http/status/struct.StatusCode.html#associatedconstant.UNPROCESSABLE_ENTITY
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self.0.error_kind {
            DomainErrorKind::Internal(internal_error_kind) => match internal_error_kind {
                InternalErrorKind::Entity(entity_error_kind) => match entity_error_kind {
                    EntityErrorKind::NotFound => {
                        (StatusCode::NOT_FOUND, "NOT FOUND").into_response()
                    }
                    EntityErrorKind::Invalid => {
                        (StatusCode::UNPROCESSABLE_ENTITY, "UNPROCESSABLE ENTITY").into_response()
                    }
                    EntityErrorKind::DbTransaction | EntityErrorKind::Other(_) => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL SERVER ERROR").into_response()
                    }
                },
                InternalErrorKind::Config => {
                    error!("Request refused because of missing configuration");
                    (StatusCode::SERVICE_UNAVAILABLE, "SERVICE UNAVAILABLE").into_response()
                }
                InternalErrorKind::Other(message) => {
                    warn!("Internal error: {message}");
                    (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL SERVER ERROR").into_response()
                }
            },
            DomainErrorKind::External(external_error_kind) => match external_error_kind {
                ExternalErrorKind::Network => {
                    (StatusCode::BAD_GATEWAY, "BAD GATEWAY").into_response()
                }
                ExternalErrorKind::Other(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL SERVER ERROR").into_response()
                }
            },
            DomainErrorKind::Auth(auth_error_kind) => match auth_error_kind {
                AuthErrorKind::TenantRequired => {
                    (StatusCode::FORBIDDEN, "FORBIDDEN").into_response()
                }
                AuthErrorKind::InvalidToken
                | AuthErrorKind::InvalidDisplayToken
                | AuthErrorKind::InvalidSecret => {
                    (StatusCode::UNAUTHORIZED, "UNAUTHORIZED").into_response()
                }
            },
        }
    }
}

impl<E> From<E> for Error
where
    E: Into<DomainError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(error_kind: DomainErrorKind) -> StatusCode {
        Error(DomainError {
            source: None,
            error_kind,
        })
        .into_response()
        .status()
    }

    #[test]
    fn auth_errors_map_to_401_and_403() {
        assert_eq!(
            status_of(DomainErrorKind::Auth(AuthErrorKind::InvalidDisplayToken)),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(DomainErrorKind::Auth(AuthErrorKind::TenantRequired)),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn database_failures_are_500() {
        assert_eq!(
            status_of(DomainErrorKind::Internal(InternalErrorKind::Entity(
                EntityErrorKind::DbTransaction
            ))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
