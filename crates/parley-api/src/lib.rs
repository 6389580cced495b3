pub mod auth;
pub mod error;
pub mod messages;
pub mod middleware;
pub mod users;

pub use auth::{AppState, AppStateInner};

use axum::Router;
use axum::routing::{get, post};

/// Full application router. Auth routes are public; everything else sits
/// behind the session guard. `/users` wins over `/{id}` because literal
/// segments take precedence.
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .with_state(state.clone());

    let protected = Router::new()
        .route("/users", get(users::list_users))
        .route("/users/{id}", get(users::get_user))
        .route("/{id}", get(messages::get_thread))
        .route("/send/{id}", post(messages::send_message))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_session,
        ))
        .with_state(state);

    Router::new().merge(public).merge(protected)
}
