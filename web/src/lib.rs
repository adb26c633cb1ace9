use axum::http::{
    header::{AUTHORIZATION, CONTENT_TYPE},
    HeaderName, HeaderValue, Method,
};
use log::*;
use std::future::Future;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

pub use self::error::{Error, Result};
pub use service::AppState;

mod controller;
mod error;
mod extractors;
pub(crate) mod router;
mod ws;

/// Serves the HTTP and WebSocket routes until `shutdown` resolves.
pub async fn init_server<F>(app_state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let host = app_state
        .config
        .interface
        .clone()
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let server_url = format!("{host}:{}", app_state.config.port);
    let listener = TcpListener::bind(&server_url).await?;

    info!(
        "Server starting... listening for connections on http://{server_url} ({} environment)",
        app_state.config.runtime_env()
    );

    let allowed_origins = parse_allowed_origins(&app_state.config.allowed_origins);
    let cors_layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_credentials(true)
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            HeaderName::from_static("x-internal-secret"),
        ])
        .allow_origin(allowed_origins);

    axum::serve(
        listener,
        router::define_routes(app_state).layer(cors_layer),
    )
    .with_graceful_shutdown(shutdown)
    .await
}

fn parse_allowed_origins(origins: &[String]) -> Vec<HeaderValue> {
    origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring invalid CORS origin {origin:?}: {e}");
                None
            }
        })
        .collect()
}
