use crate::controller::{
    event_controller, health_check_controller, public_display_controller, realtime_controller,
};
use crate::ws::handler as ws_handler;
use crate::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn define_routes(app_state: AppState) -> Router {
    Router::new()
        .merge(health_routes())
        .merge(realtime_routes(app_state.clone()))
        .merge(public_display_routes(app_state.clone()))
        .merge(event_routes(app_state.clone()))
        .merge(websocket_routes(app_state))
}

fn health_routes() -> Router {
    Router::new().route("/health", get(health_check_controller::health_check))
}

fn realtime_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/realtime/stats", get(realtime_controller::stats))
        .route("/realtime/leaderboard", get(realtime_controller::leaderboard))
        .route("/realtime/live-feed", get(realtime_controller::live_feed))
        .with_state(app_state)
}

fn public_display_routes(app_state: AppState) -> Router {
    Router::new()
        .route(
            "/public/display/{token}",
            get(public_display_controller::snapshot),
        )
        .with_state(app_state)
}

fn event_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/internal/events", post(event_controller::publish))
        .with_state(app_state)
}

fn websocket_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/ws/attendance", get(ws_handler::dashboard_socket))
        .route("/ws/display/{token}", get(ws_handler::display_socket))
        .with_state(app_state)
}
