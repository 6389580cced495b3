use axum::Json;
use axum::extract::{Path, State};
use axum::{Extension, response::IntoResponse};
use tracing::warn;
use uuid::Uuid;

use parley_types::api::UserResponse;

use crate::auth::AppState;
use crate::error::{ApiError, blocking};
use crate::middleware::AuthUser;

/// The directory: every known user except the caller, in registration order.
pub async fn list_users(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let caller_id = user.id.to_string();

    let rows = blocking(move || {
        // Caller deleted mid-session is a 404, not an empty directory
        if db.db.get_user_by_id(&caller_id)?.is_none() {
            return Ok(None);
        }
        db.db.list_users_except(&caller_id).map(Some)
    })
    .await?
    .ok_or(ApiError::NotFound)?;

    let users: Vec<UserResponse> = rows
        .into_iter()
        .filter_map(|row| match row.id.parse::<Uuid>() {
            Ok(id) => Some(UserResponse {
                id,
                display_name: row.display_name,
            }),
            Err(e) => {
                warn!("Corrupt user id '{}': {}", row.id, e);
                None
            }
        })
        .collect();

    Ok(Json(users))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(_user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let uid = id.to_string();

    let row = blocking(move || db.db.get_user_by_id(&uid))
        .await?
        .ok_or(ApiError::NotFound)?;

    Ok(Json(UserResponse {
        id,
        display_name: row.display_name,
    }))
}
