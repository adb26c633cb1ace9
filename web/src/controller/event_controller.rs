use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;

use crate::controller::ApiResponse;
use crate::{AppState, Error};
use domain::internal_secret as InternalSecretApi;
use events::DomainEvent;
use log::*;

pub(crate) const INTERNAL_SECRET_HEADER: &str = "x-internal-secret";

/// POST a domain event from the attendance recording path.
///
/// Handlers run before the response is sent, so a 202 means the live
/// broadcast was submitted and the guardian notifications were queued.
pub async fn publish(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Json(event): Json<DomainEvent>,
) -> Result<impl IntoResponse, Error> {
    let provided = headers
        .get(INTERNAL_SECRET_HEADER)
        .and_then(|value| value.to_str().ok());
    InternalSecretApi::verify(&app_state.config, provided)?;

    info!(
        "Publishing {} for school {}",
        event_name(&event),
        event.tenant_id()
    );
    app_state.event_publisher.publish(event).await;

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::<()>::no_content(StatusCode::ACCEPTED.into())),
    ))
}

fn event_name(event: &DomainEvent) -> &'static str {
    match event {
        DomainEvent::AttendanceRecorded(_) => "attendance_recorded",
        DomainEvent::AttendanceRemoved { .. } => "attendance_removed",
        DomainEvent::DisplayTokenRevoked { .. } => "display_token_revoked",
    }
}
