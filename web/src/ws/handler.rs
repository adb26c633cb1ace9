use crate::extractors::dashboard_user::{bearer_token, query_token};
use crate::ws::frame::{ClientFrame, ErrorCode, ServerFrame};
use crate::AppState;
use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, Uri};
use axum::response::IntoResponse;
use domain::display_token as DisplayTokenApi;
use domain::jwt as JwtApi;
use events::Id;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use log::*;
use realtime::connection::{Audience, Connection, ConnectionId, Principal};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct DashboardSocketParams {
    #[serde(default)]
    pub(crate) class_id: Option<Id>,
}

/// Who a socket was admitted as and what it initially follows.
#[derive(Debug, Clone, Copy)]
struct Admission {
    school_id: Id,
    class_filter: Option<Id>,
    audience: Audience,
    principal: Principal,
}

/// GET /ws/attendance
///
/// Dashboard socket. The bearer token comes from the Authorization header or
/// the `token` query parameter. Refused sockets receive one error frame and
/// are closed.
pub(crate) async fn dashboard_socket(
    ws: WebSocketUpgrade,
    State(app_state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    Query(params): Query<DashboardSocketParams>,
) -> impl IntoResponse {
    let admission = match bearer_token(&headers).or_else(|| query_token(uri.query())) {
        None => Err(ErrorCode::AuthTokenMissing),
        Some(token) => JwtApi::authorize_dashboard(&app_state.config, &token)
            .map(|principal| Admission {
                school_id: principal.school_id,
                class_filter: params.class_id,
                audience: Audience::Dashboard,
                principal: Principal::User(principal.user_id),
            })
            .map_err(|e| {
                debug!("Refusing dashboard socket: {e}");
                ErrorCode::for_error(&e)
            }),
    };

    ws.on_upgrade(move |socket| async move {
        match admission {
            Ok(admission) => serve(socket, app_state, admission).await,
            Err(code) => refuse(socket, code).await,
        }
    })
}

/// GET /ws/display/{token}
///
/// Public-display socket, admitted by a display token in the path.
pub(crate) async fn display_socket(
    ws: WebSocketUpgrade,
    State(app_state): State<AppState>,
    Path(token): Path<String>,
) -> impl IntoResponse {
    let admission = DisplayTokenApi::validate(app_state.db_conn_ref(), &token)
        .await
        .map(|session| Admission {
            school_id: session.school_id,
            class_filter: None,
            audience: Audience::PublicDisplay,
            principal: Principal::DisplayToken(session.display_token_id),
        })
        .map_err(|e| {
            debug!("Refusing display socket: {e}");
            ErrorCode::for_error(&e)
        });

    ws.on_upgrade(move |socket| async move {
        match admission {
            Ok(admission) => serve(socket, app_state, admission).await,
            Err(code) => refuse(socket, code).await,
        }
    })
}

async fn refuse(mut socket: WebSocket, code: ErrorCode) {
    let frame = ServerFrame::error(code).to_json();
    if socket.send(Message::Text(frame.into())).await.is_ok() {
        let _ = socket.send(Message::Close(None)).await;
    }
}

// Bridges one socket to its hub connection until either side goes away.
async fn serve(socket: WebSocket, app_state: AppState, admission: Admission) {
    let (connection, mut outbound) = Connection::new(
        admission.school_id,
        admission.class_filter,
        admission.audience,
        admission.principal,
        app_state.config.connection_buffer_size,
    );
    let connection_id = app_state.hub.register(connection).await;
    info!(
        "{} connection {connection_id} opened for school {}",
        admission.audience, admission.school_id
    );

    let (mut sink, mut stream) = socket.split();

    let connected = ServerFrame::Connected {
        school_id: admission.school_id,
        audience: admission.audience.to_string(),
        class_id: admission.class_filter,
    };
    if send_frame(&mut sink, &connected).await.is_err() {
        app_state.hub.unregister(connection_id).await;
        return;
    }

    let mut ping = tokio::time::interval(app_state.config.ws_ping_interval());
    // The first tick completes immediately.
    ping.tick().await;

    loop {
        tokio::select! {
            frame = outbound.recv() => match frame {
                Some(frame) => {
                    if sink.send(Message::Text(frame.as_ref().into())).await.is_err() {
                        break;
                    }
                }
                // Evicted as a slow consumer, revoked, or the hub shut down.
                None => {
                    debug!("Connection {connection_id} dropped by the hub");
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if let Some(reply) = handle_client_frame(&app_state, connection_id, admission, text.as_str()).await {
                        if send_frame(&mut sink, &reply).await.is_err() {
                            break;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!("Connection {connection_id} receive error: {e}");
                    break;
                }
            },
            _ = ping.tick() => {
                if sink.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    app_state.hub.unregister(connection_id).await;
    info!("{} connection {connection_id} closed", admission.audience);
}

async fn handle_client_frame(
    app_state: &AppState,
    connection_id: ConnectionId,
    admission: Admission,
    text: &str,
) -> Option<ServerFrame> {
    match serde_json::from_str::<ClientFrame>(text) {
        Ok(ClientFrame::Ping) => Some(ServerFrame::Pong),
        Ok(ClientFrame::Subscribe { payload }) => match admission.audience {
            Audience::Dashboard => {
                app_state
                    .hub
                    .set_class_filter(connection_id, payload.class_id)
                    .await;
                Some(ServerFrame::Subscribed {
                    class_id: payload.class_id,
                })
            }
            Audience::PublicDisplay => Some(ServerFrame::error(ErrorCode::UnsupportedMessage)),
        },
        Err(e) => {
            trace!("Ignoring unrecognized frame on {connection_id}: {e}");
            None
        }
    }
}

async fn send_frame(
    sink: &mut SplitSink<WebSocket, Message>,
    frame: &ServerFrame,
) -> Result<(), axum::Error> {
    sink.send(Message::Text(frame.to_json().into())).await
}
