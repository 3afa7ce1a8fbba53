use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::host::IncomingMessage;
use crate::state::AppState;

/// Messaging host inbound boundary. The reply is returned as the response
/// body; the host renders the content, citations, and AI-generated marker.
pub async fn post_message(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<IncomingMessage>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.conversation_id.is_empty() || payload.participant_id.is_empty() {
        return Err(ApiError::BadRequest(
            "conversationId and participantId are required".to_string(),
        ));
    }

    let outgoing = state.orchestrator.handle_message(&payload).await;
    Ok(Json(outgoing))
}

pub async fn health(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let messages = state.history.message_count().await?;
    Ok(Json(json!({
        "status": "healthy",
        "stats": { "total_messages": messages }
    })))
}
