//! HTTP route handlers for the chatbot API.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{Instrument, info_span};
use uuid::Uuid;

use crate::conversation::session::SessionKey;
use crate::conversation::turn::Turn;
use crate::users::model::{NewUser, User};

use super::error::ApiError;
use super::state::AppState;

/// Create the API router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/chat", post(chat))
        .route("/reset_conversation", post(reset_conversation))
        .route("/conversation", get(conversation))
        .route("/users", get(list_users))
        .route("/users/{email}", get(get_user))
        .route("/user", post(create_user))
        .with_state(state)
}

async fn root() -> impl IntoResponse {
    Json(json!({ "message": "Chatbot API server is running!" }))
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "chatbot-api",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Chat request.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// The user's message.
    pub message: String,
    /// Conversation to continue; the default session when absent.
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Chat response.
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    /// The assistant's final text.
    pub message: String,
    /// Full turn sequence of the session.
    #[serde(rename = "messageHistory")]
    pub message_history: Vec<Turn>,
}

/// Session selector for query-string routes.
#[derive(Debug, Default, Deserialize)]
pub struct SessionQuery {
    /// Conversation to act on; the default session when absent.
    pub session_id: Option<String>,
}

/// Conversation snapshot response.
#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    /// Resolved session key.
    pub session_id: SessionKey,
    /// Turns in order.
    #[serde(rename = "messageHistory")]
    pub message_history: Vec<Turn>,
}

fn resolve_session(session_id: Option<&str>) -> Result<SessionKey, ApiError> {
    SessionKey::resolve(session_id).map_err(ApiError::unprocessable)
}

/// Run one tool-augmented exchange.
async fn chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) = payload?;
    let session = resolve_session(request.session_id.as_deref())?;
    let span = info_span!("chat", request_id = %Uuid::new_v4(), session = %session);

    let outcome = state
        .driver
        .send(&session, &request.message, &state.profile)
        .instrument(span)
        .await?;

    Ok(Json(ChatResponse {
        message: outcome.reply,
        message_history: outcome.history,
    }))
}

async fn reset_conversation(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SessionQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let session = resolve_session(query.session_id.as_deref())?;
    state.driver.store().reset(&session).await;
    Ok(Json(json!({ "message": "Conversation reset successfully" })))
}

async fn conversation(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SessionQuery>,
) -> Result<Json<ConversationResponse>, ApiError> {
    let session = resolve_session(query.session_id.as_deref())?;
    let message_history = state.driver.store().get_or_create(&session).await;
    Ok(Json(ConversationResponse {
        session_id: session,
        message_history,
    }))
}

/// Envelope for user payloads.
#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    /// Payload.
    pub data: T,
}

async fn list_users(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DataResponse<Vec<User>>>, ApiError> {
    let data = state.users.list().await?;
    Ok(Json(DataResponse { data }))
}

async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(email): Path<String>,
) -> Result<Json<DataResponse<User>>, ApiError> {
    let data = state.users.get_by_email(&email).await?;
    Ok(Json(DataResponse { data }))
}

async fn create_user(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewUser>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(new_user) = payload?;
    let user = state.users.create(new_user).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "User created successfully", "data": user })),
    ))
}
