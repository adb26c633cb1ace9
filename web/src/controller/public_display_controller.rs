use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::controller::ApiResponse;
use crate::controller::realtime_controller::DEFAULT_FEED_LIMIT;
use crate::{AppState, Error};
use domain::display_token as DisplayTokenApi;
use domain::Id;
use log::*;
use realtime::broadcaster::LEADERBOARD_LIMIT;
use realtime::connection::Audience;
use realtime::message::{LeaderboardEntry, Stats};
use realtime::redaction::{derive_view, AudienceView};

/// Everything a public display renders when it (re)connects.
#[derive(Debug, Serialize)]
pub(crate) struct DisplaySnapshot {
    school_id: Id,
    stats: Stats,
    leaderboard: Vec<LeaderboardEntry>,
    live_feed: Vec<AudienceView>,
}

/// GET the current snapshot for the display identified by `token`.
///
/// The feed carries the public-display view only.
pub async fn snapshot(
    State(app_state): State<AppState>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, Error> {
    let session = DisplayTokenApi::validate(app_state.db_conn_ref(), &token).await?;
    debug!("GET display snapshot for school {}", session.school_id);

    let read_model = &app_state.read_model;
    let stats = read_model.stats(session.school_id, None).await?;
    let leaderboard = read_model
        .leaderboard(session.school_id, LEADERBOARD_LIMIT)
        .await?;
    let live_feed = read_model
        .live_feed(session.school_id, None, DEFAULT_FEED_LIMIT)
        .await?
        .iter()
        .map(|event| derive_view(event, Audience::PublicDisplay))
        .collect();

    Ok(Json(ApiResponse::new(
        StatusCode::OK.into(),
        DisplaySnapshot {
            school_id: session.school_id,
            stats,
            leaderboard,
            live_feed,
        },
    )))
}
