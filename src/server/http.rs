//! HTTP+SSE routes for a [`ToolServer`].

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use futures::Stream;
use serde::Deserialize;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use super::sessions::SessionTable;
use super::ToolServer;
use crate::error::HostError;
use crate::mcp::protocol::JsonRpcMessage;

pub const SSE_PATH: &str = "/sse";
pub const MESSAGES_PATH: &str = "/messages";

#[derive(Debug, Clone)]
pub struct SseSettings {
    /// Interval between keep-alive comments on idle streams.
    pub keep_alive: Duration,
}

impl Default for SseSettings {
    fn default() -> Self {
        Self {
            keep_alive: Duration::from_secs(15),
        }
    }
}

#[derive(Clone)]
struct ServerState {
    server: Arc<ToolServer>,
    sessions: SessionTable,
    settings: SseSettings,
}

#[derive(Debug, Deserialize)]
struct MessageQuery {
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

/// Build the `/sse` + `/messages` router over a shared session table.
pub fn router(server: Arc<ToolServer>, sessions: SessionTable, settings: SseSettings) -> Router {
    Router::new()
        .route(SSE_PATH, get(open_stream))
        .route(MESSAGES_PATH, post(post_message))
        .with_state(ServerState {
            server,
            sessions,
            settings,
        })
}

/// Serve `server` on an already-bound listener until the task is cancelled.
pub async fn serve(
    listener: TcpListener,
    server: Arc<ToolServer>,
    sessions: SessionTable,
    settings: SseSettings,
) -> Result<(), HostError> {
    let addr: SocketAddr = listener.local_addr()?;
    let app = router(Arc::clone(&server), sessions, settings)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    info!(server = %server.name(), "MCP tool server listening on http://{addr}{SSE_PATH}");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn open_stream(
    State(state): State<ServerState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (guard, mut outbound) = state.sessions.open();
    let endpoint = format!("{MESSAGES_PATH}?sessionId={}", guard.id());
    info!(server = %state.server.name(), session_id = %guard.id(), "SSE session opened");

    let stream = async_stream::stream! {
        // Dropped with the stream when the client disconnects.
        let _guard = guard;
        yield Ok(Event::default().event("endpoint").data(endpoint));
        while let Some(payload) = outbound.recv().await {
            yield Ok(Event::default().event("message").data(payload));
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(state.settings.keep_alive))
}

async fn post_message(
    State(state): State<ServerState>,
    Query(query): Query<MessageQuery>,
    body: String,
) -> Response {
    let Some(session_id) = query.session_id else {
        return (StatusCode::BAD_REQUEST, "No transport found for sessionId").into_response();
    };
    let Some(outbound) = state.sessions.sender(&session_id) else {
        warn!(%session_id, "message for unknown session");
        return (StatusCode::BAD_REQUEST, "No transport found for sessionId").into_response();
    };
    let message: JsonRpcMessage = match serde_json::from_str(&body) {
        Ok(message) => message,
        Err(err) => {
            return (StatusCode::BAD_REQUEST, format!("Invalid JSON-RPC message: {err}"))
                .into_response()
        }
    };

    let server = Arc::clone(&state.server);
    tokio::spawn(async move {
        let Some(reply) = server.handle_message(message).await else {
            return;
        };
        match serde_json::to_string(&reply) {
            Ok(payload) => {
                if outbound.send(payload).await.is_err() {
                    debug!(%session_id, "session closed before reply was delivered");
                }
            }
            Err(err) => warn!(%session_id, error = %err, "failed to encode reply"),
        }
    });

    (StatusCode::ACCEPTED, "Accepted").into_response()
}
