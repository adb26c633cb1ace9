use crate::extractors::RejectionType;
use crate::AppState;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, StatusCode},
};
use domain::error::{AuthErrorKind, DomainErrorKind};
use domain::jwt::{self as JwtApi, DashboardPrincipal};
use log::*;

/// An authenticated dashboard user, admitted by a bearer token bound to a school.
pub(crate) struct DashboardUser(pub DashboardPrincipal);

impl FromRequestParts<AppState> for DashboardUser {
    type Rejection = RejectionType;

    // Reads the bearer token from the Authorization header, or from the `token`
    // query parameter for clients that cannot set headers.
    async fn from_request_parts(
        parts: &mut Parts,
        app_state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .or_else(|| query_token(parts.uri.query()))
            .ok_or_else(|| (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()))?;

        match JwtApi::authorize_dashboard(&app_state.config, &token) {
            Ok(principal) => Ok(DashboardUser(principal)),
            Err(e) => {
                debug!("Dashboard request refused: {e}");
                Err(match e.error_kind {
                    DomainErrorKind::Auth(AuthErrorKind::TenantRequired) => {
                        (StatusCode::FORBIDDEN, "Forbidden".to_string())
                    }
                    DomainErrorKind::Auth(_) => {
                        (StatusCode::UNAUTHORIZED, "Unauthorized".to_string())
                    }
                    _ => (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "Service Unavailable".to_string(),
                    ),
                })
            }
        }
    }
}

/// The token of an `Authorization: Bearer <token>` header, if any.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(strip_bearer)
        .filter(|token| !token.is_empty())
}

/// The `token` query parameter, with an optional `Bearer ` prefix removed.
pub(crate) fn query_token(query: Option<&str>) -> Option<String> {
    query?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "token")
        .map(|(_, value)| strip_bearer(&value.replace("%20", " ")))
        .filter(|token| !token.is_empty())
}

fn strip_bearer(value: &str) -> String {
    let value = value.trim();
    value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .unwrap_or(value)
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn header_token_strips_the_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));

        assert_eq!(bearer_token(&headers).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn query_token_is_found_among_other_parameters() {
        assert_eq!(
            query_token(Some("class_id=7&token=abc.def.ghi")).as_deref(),
            Some("abc.def.ghi")
        );
        assert_eq!(
            query_token(Some("token=Bearer%20abc.def.ghi")).as_deref(),
            Some("abc.def.ghi")
        );
        assert_eq!(query_token(Some("class_id=7")), None);
        assert_eq!(query_token(None), None);
    }
}
