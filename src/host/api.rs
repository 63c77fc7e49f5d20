//! JSON control surface of the host.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use super::HostState;
use crate::agent_loop::CycleReport;
use crate::conversation::{ConversationId, OutcomePayload, Turn};
use crate::error::{ErrorCategory, HostError};
use crate::mcp::{CatalogEntry, ServerStatus};

/// Create the host API router.
pub fn create_router(state: HostState) -> Router {
    Router::new()
        .route("/api/tools", get(list_tools))
        .route("/api/tools/refresh", post(refresh_tools))
        .route("/api/servers", get(list_servers))
        .route("/api/chat", post(chat))
        .route("/api/conversations/:id", get(get_conversation))
        .route("/api/tool", post(call_tool))
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct ToolsResponse {
    pub tools: Vec<CatalogEntry>,
}

#[derive(Debug, Serialize)]
pub struct ServersResponse {
    pub servers: Vec<ServerStatus>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub conversation_id: Option<ConversationId>,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationResponse {
    pub id: ConversationId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub turns: Vec<Turn>,
}

#[derive(Debug, Deserialize)]
pub struct ToolCallRequest {
    pub name: String,
    #[serde(default)]
    pub input: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ToolCallResponse {
    pub name: String,
    pub outcome: OutcomePayload,
}

/// GET /api/tools
async fn list_tools(State(state): State<HostState>) -> Json<ToolsResponse> {
    Json(ToolsResponse {
        tools: state.registry.catalog().entries().to_vec(),
    })
}

/// POST /api/tools/refresh
async fn refresh_tools(State(state): State<HostState>) -> Result<Json<ToolsResponse>, ApiError> {
    let catalog = state.registry.refresh_catalog().await?;
    Ok(Json(ToolsResponse {
        tools: catalog.entries().to_vec(),
    }))
}

/// GET /api/servers
async fn list_servers(State(state): State<HostState>) -> Json<ServersResponse> {
    Json(ServersResponse {
        servers: state.registry.server_states(),
    })
}

/// POST /api/chat
async fn chat(
    State(state): State<HostState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<CycleReport>, ApiError> {
    if request.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message must not be empty".into()));
    }

    let (id, handle) = match request.conversation_id {
        Some(id) => {
            let handle = state
                .conversations
                .get(&id)
                .ok_or_else(|| ApiError::NotFound(format!("conversation {id} not found")))?;
            (id, handle)
        }
        None => state.conversations.create(),
    };

    let mut conversation = handle.lock().await;
    match state.orchestrator.submit(&mut conversation, request.message).await {
        Ok(report) => Ok(Json(report)),
        Err(err) => {
            warn!(conversation_id = %id, error = %err, "chat cycle failed");
            Err(ApiError::from_cycle(id, err))
        }
    }
}

/// GET /api/conversations/:id
async fn get_conversation(
    State(state): State<HostState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ConversationResponse>, ApiError> {
    let handle = state
        .conversations
        .get(&id)
        .ok_or_else(|| ApiError::NotFound(format!("conversation {id} not found")))?;
    let conversation = handle.lock().await;
    Ok(Json(ConversationResponse {
        id: conversation.id,
        created_at: conversation.created_at,
        updated_at: conversation.updated_at,
        turns: conversation.snapshot(),
    }))
}

/// POST /api/tool
async fn call_tool(
    State(state): State<HostState>,
    Json(request): Json<ToolCallRequest>,
) -> Json<ToolCallResponse> {
    let outcome = state
        .orchestrator
        .dispatcher()
        .dispatch(&request.name, request.input)
        .await;
    Json(ToolCallResponse {
        name: request.name,
        outcome,
    })
}

/// API error type
#[derive(Debug)]
pub enum ApiError {
    Model {
        message: String,
        conversation_id: Option<ConversationId>,
    },
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl ApiError {
    fn from_cycle(conversation_id: ConversationId, err: HostError) -> Self {
        match err.category() {
            ErrorCategory::Model => ApiError::Model {
                message: err.to_string(),
                conversation_id: Some(conversation_id),
            },
            _ => ApiError::from(err),
        }
    }
}

impl From<HostError> for ApiError {
    fn from(err: HostError) -> Self {
        match err.category() {
            ErrorCategory::Model => ApiError::Model {
                message: err.to_string(),
                conversation_id: None,
            },
            ErrorCategory::InvalidInput => ApiError::BadRequest(err.to_string()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, conversation_id) = match self {
            ApiError::Model {
                message,
                conversation_id,
            } => (StatusCode::BAD_GATEWAY, message, conversation_id),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg, None),
        };

        let mut body = serde_json::json!({
            "error": {
                "message": message,
                "type": "api_error",
            }
        });
        if let (Some(id), Some(obj)) = (conversation_id, body.as_object_mut()) {
            obj.insert("conversation_id".into(), id.to_string().into());
        }

        (status, Json(body)).into_response()
    }
}
