use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::controller::ApiResponse;
use crate::extractors::dashboard_user::DashboardUser;
use crate::{AppState, Error};
use domain::Id;
use log::*;
use realtime::broadcaster::LEADERBOARD_LIMIT;
use realtime::connection::Audience;
use realtime::redaction::{derive_view, AudienceView};

pub(crate) const DEFAULT_FEED_LIMIT: u64 = 50;
pub(crate) const MAX_FEED_LIMIT: u64 = 100;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct StatsParams {
    #[serde(default)]
    pub(crate) class_id: Option<Id>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct FeedParams {
    #[serde(default)]
    pub(crate) class_id: Option<Id>,
    #[serde(default)]
    pub(crate) limit: Option<u64>,
}

impl FeedParams {
    fn effective_limit(&self) -> u64 {
        self.limit
            .unwrap_or(DEFAULT_FEED_LIMIT)
            .clamp(1, MAX_FEED_LIMIT)
    }
}

/// GET today's attendance counters for the caller's school, optionally
/// narrowed to one class.
pub async fn stats(
    DashboardUser(principal): DashboardUser,
    State(app_state): State<AppState>,
    Query(params): Query<StatsParams>,
) -> Result<impl IntoResponse, Error> {
    debug!(
        "GET stats for school {} (class: {:?})",
        principal.school_id, params.class_id
    );

    let stats = app_state
        .read_model
        .stats(principal.school_id, params.class_id)
        .await?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), stats)))
}

/// GET the earliest on-time arrivals of today.
pub async fn leaderboard(
    DashboardUser(principal): DashboardUser,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, Error> {
    debug!("GET leaderboard for school {}", principal.school_id);

    let leaderboard = app_state
        .read_model
        .leaderboard(principal.school_id, LEADERBOARD_LIMIT)
        .await?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), leaderboard)))
}

/// GET the most recent scans of today, newest first.
pub async fn live_feed(
    DashboardUser(principal): DashboardUser,
    State(app_state): State<AppState>,
    Query(params): Query<FeedParams>,
) -> Result<impl IntoResponse, Error> {
    let limit = params.effective_limit();
    debug!(
        "GET live feed for school {} (class: {:?}, limit: {limit})",
        principal.school_id, params.class_id
    );

    let feed: Vec<AudienceView> = app_state
        .read_model
        .live_feed(principal.school_id, params.class_id, limit)
        .await?
        .iter()
        .map(|event| derive_view(event, Audience::Dashboard))
        .collect();

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), feed)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_limit_defaults_and_is_capped() {
        assert_eq!(FeedParams::default().effective_limit(), DEFAULT_FEED_LIMIT);

        let params = FeedParams {
            class_id: None,
            limit: Some(5_000),
        };
        assert_eq!(params.effective_limit(), MAX_FEED_LIMIT);

        let params = FeedParams {
            class_id: None,
            limit: Some(0),
        };
        assert_eq!(params.effective_limit(), 1);
    }
}
