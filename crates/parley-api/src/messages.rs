use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, response::IntoResponse};
use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use parley_db::models::MessageRow;
use parley_types::api::{MessageResponse, SendMessageRequest};

use crate::auth::AppState;
use crate::error::{ApiError, blocking};
use crate::middleware::AuthUser;

pub async fn send_message(
    State(state): State<AppState>,
    Path(recipient_id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let body = req.text.trim().to_string();
    if body.is_empty() {
        return Err(ApiError::Validation("empty_body"));
    }
    if recipient_id == user.id && !state.allow_self_send {
        return Err(ApiError::Validation("self_send"));
    }

    let message_id = Uuid::new_v4();
    let sent_at = Utc::now();

    let db = state.clone();
    let sender = user.id.to_string();
    let recipient = recipient_id.to_string();
    let stored_body = body.clone();
    blocking(move || {
        if db.db.get_user_by_id(&recipient)?.is_none() {
            return Ok(false);
        }
        db.db.insert_message(
            &message_id.to_string(),
            &sender,
            &recipient,
            &stored_body,
            &parley_db::timestamp(sent_at),
        )?;
        Ok(true)
    })
    .await?
    .then_some(())
    .ok_or(ApiError::NotFound)?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            id: message_id,
            sender_id: user.id,
            recipient_id,
            body,
            sent_at,
        }),
    ))
}

/// Full thread between the caller and the user in the path, both directions,
/// oldest first.
pub async fn get_thread(
    State(state): State<AppState>,
    Path(other_id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let self_id = user.id.to_string();
    let other = other_id.to_string();

    let rows = blocking(move || {
        if db.db.get_user_by_id(&other)?.is_none() {
            return Ok(None);
        }
        db.db.list_thread(&self_id, &other).map(Some)
    })
    .await?
    .ok_or(ApiError::NotFound)?;

    let messages: Vec<MessageResponse> = rows.into_iter().filter_map(to_response).collect();
    Ok(Json(messages))
}

fn to_response(row: MessageRow) -> Option<MessageResponse> {
    let parse_id = |field: &str, value: &str| match value.parse::<Uuid>() {
        Ok(id) => Some(id),
        Err(e) => {
            warn!("Corrupt {} '{}' on message '{}': {}", field, value, row.id, e);
            None
        }
    };

    let sent_at = match DateTime::parse_from_rfc3339(&row.sent_at) {
        Ok(t) => t.with_timezone(&Utc),
        Err(e) => {
            warn!("Corrupt sent_at '{}' on message '{}': {}", row.sent_at, row.id, e);
            return None;
        }
    };

    Some(MessageResponse {
        id: parse_id("id", &row.id)?,
        sender_id: parse_id("sender_id", &row.sender_id)?,
        recipient_id: parse_id("recipient_id", &row.recipient_id)?,
        body: row.body,
        sent_at,
    })
}
