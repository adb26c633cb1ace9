pub(crate) mod dashboard_user;

use axum::http::StatusCode;

type RejectionType = (StatusCode, String);
