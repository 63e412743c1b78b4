//! HTTP route handlers for the scout agent API.

use std::path::Path;
use std::sync::Arc;

use axum::extract::{Path as UrlPath, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::services::ServeDir;

use crate::conversation::core::errors::{ConversationError, PersistenceError};
use crate::conversation::core::evaluation::Evaluation;
use crate::conversation::core::ids::SessionId;
use crate::conversation::prompts::{AgentMode, signals_completion};
use crate::conversation::session::{
    ConversationSession, EndResult, SessionSnapshot, SessionStatus,
};
use crate::conversation::storage::ConversationRecord;

use super::state::AppState;

/// Records returned by the listing endpoint when no limit is given.
const DEFAULT_LIST_LIMIT: usize = 20;
const MAX_LIST_LIMIT: usize = 100;

/// Create the API router with all routes; unmatched paths are served from `static_dir`.
pub fn create_router(state: Arc<AppState>, static_dir: &Path) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/sessions", post(start_session))
        .route("/api/sessions/{id}", get(get_session).delete(delete_session))
        .route("/api/sessions/{id}/turns", post(submit_turn))
        .route("/api/sessions/{id}/end", post(end_session))
        .route("/api/sessions/{id}/end/retry", post(retry_end))
        .route("/api/conversations", get(list_conversations))
        .route("/api/conversations/{id}", get(get_conversation))
        .fallback_service(ServeDir::new(static_dir))
        .with_state(state)
}

/// Error body returned by every endpoint.
pub struct ApiError {
    error: ConversationError,
    unsaved: Option<UnsavedResult>,
}

/// End artifacts that were generated but not stored.
#[derive(Debug, Serialize)]
struct UnsavedResult {
    summary: Option<String>,
    evaluation: Option<Evaluation>,
}

impl ApiError {
    /// Attach whatever `end` managed to generate before failing.
    fn after_end(error: ConversationError, session: &ConversationSession) -> Self {
        let unsaved = (session.summary().is_some() || session.evaluation().is_some()).then(|| {
            UnsavedResult {
                summary: session.summary().map(str::to_string),
                evaluation: session.evaluation().cloned(),
            }
        });
        Self { error, unsaved }
    }

    const fn status(&self) -> StatusCode {
        match &self.error {
            ConversationError::InvalidState(_) => StatusCode::CONFLICT,
            ConversationError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ConversationError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            ConversationError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ConversationError::Persistence(_) | ConversationError::SessionLimit(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ConversationError::InvalidConfig(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ConversationError> for ApiError {
    fn from(error: ConversationError) -> Self {
        Self {
            error,
            unsaved: None,
        }
    }
}

impl From<PersistenceError> for ApiError {
    fn from(err: PersistenceError) -> Self {
        ConversationError::from(err).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!("Request failed: {}", self.error);
        }
        let mut body = serde_json::json!({ "error": self.error.to_string() });
        if let Some(unsaved) = self.unsaved {
            body["summary"] = serde_json::json!(unsaved.summary);
            body["evaluation"] = serde_json::json!(unsaved.evaluation);
        }
        (status, Json(body)).into_response()
    }
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "scout-agent",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// New session response.
#[derive(Debug, Serialize)]
pub struct StartResponse {
    /// Id to use in later requests.
    pub session_id: SessionId,
    /// Always `active`.
    pub status: SessionStatus,
    /// Interview mode.
    pub mode: AgentMode,
    /// Persona title.
    pub title: String,
    /// Persona tagline.
    pub description: String,
}

async fn start_session(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<StartResponse>), ApiError> {
    let (session_id, _) = state.registry.start()?;
    Ok((
        StatusCode::CREATED,
        Json(StartResponse {
            session_id,
            status: SessionStatus::Active,
            mode: state.agent.mode,
            title: state.agent.title.clone(),
            description: state.agent.description.clone(),
        }),
    ))
}

async fn get_session(
    State(state): State<Arc<AppState>>,
    UrlPath(id): UrlPath<SessionId>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let handle = state.registry.get(id)?;
    let snapshot = handle.lock().await.snapshot();
    Ok(Json(snapshot))
}

async fn delete_session(
    State(state): State<Arc<AppState>>,
    UrlPath(id): UrlPath<SessionId>,
) -> Result<StatusCode, ApiError> {
    if state.registry.remove(id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ConversationError::SessionNotFound(id).into())
    }
}

/// User message.
#[derive(Debug, Deserialize)]
pub struct TurnRequest {
    /// Text typed by the user.
    pub message: String,
}

/// Agent reply.
#[derive(Debug, Serialize)]
pub struct TurnResponse {
    /// Agent text.
    pub reply: String,
    /// Whether the agent closed the interview.
    pub interview_complete: bool,
    /// Turns in the transcript after this exchange.
    pub turn_count: usize,
}

async fn submit_turn(
    State(state): State<Arc<AppState>>,
    UrlPath(id): UrlPath<SessionId>,
    Json(request): Json<TurnRequest>,
) -> Result<Json<TurnResponse>, ApiError> {
    let handle = state.registry.get(id)?;
    let mut session = handle.lock().await;
    let reply = session.submit_turn(&request.message).await?;

    Ok(Json(TurnResponse {
        interview_complete: signals_completion(&reply),
        turn_count: session.turns().len(),
        reply,
    }))
}

async fn end_session(
    State(state): State<Arc<AppState>>,
    UrlPath(id): UrlPath<SessionId>,
) -> Result<Json<EndResult>, ApiError> {
    let handle = state.registry.get(id)?;
    let mut session = handle.lock().await;
    match session.end().await {
        Ok(result) => Ok(Json(result)),
        Err(err) => Err(ApiError::after_end(err, &session)),
    }
}

async fn retry_end(
    State(state): State<Arc<AppState>>,
    UrlPath(id): UrlPath<SessionId>,
) -> Result<Json<EndResult>, ApiError> {
    let handle = state.registry.get(id)?;
    let mut session = handle.lock().await;
    match session.retry_end().await {
        Ok(result) => Ok(Json(result)),
        Err(err) => Err(ApiError::after_end(err, &session)),
    }
}

/// Listing parameters.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Maximum records to return.
    pub limit: Option<usize>,
}

async fn list_conversations(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ConversationRecord>>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);
    let records = state.store.list_recent(limit).await?;
    Ok(Json(records))
}

async fn get_conversation(
    State(state): State<Arc<AppState>>,
    UrlPath(id): UrlPath<SessionId>,
) -> Result<Json<ConversationRecord>, ApiError> {
    state
        .store
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| ConversationError::SessionNotFound(id).into())
}
