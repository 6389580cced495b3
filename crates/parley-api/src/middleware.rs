use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::CookieJar;
use uuid::Uuid;

use crate::auth::AppState;
use crate::error::{ApiError, blocking};

/// Name of the session cookie issued at login.
pub const SESSION_COOKIE: &str = "parley_session";

/// Identity resolved by the session guard, available to protected handlers
/// as a request extension.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
}

/// Resolve the session cookie to a user identity or reject with 401.
/// Missing cookie, unknown token, expired session, and vanished user all
/// produce the same response.
pub async fn require_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = jar
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or(ApiError::Unauthenticated)?;

    let db = state.clone();
    let now = chrono::Utc::now();
    let user = blocking(move || {
        let Some(session) = db.db.get_session(&token, now)? else {
            return Ok(None);
        };
        db.db.get_user_by_id(&session.user_id)
    })
    .await?
    .ok_or(ApiError::Unauthenticated)?;

    let id = Uuid::parse_str(&user.id).map_err(|_| ApiError::Unauthenticated)?;

    req.extensions_mut().insert(AuthUser {
        id,
        username: user.username,
        display_name: user.display_name,
    });
    Ok(next.run(req).await)
}
