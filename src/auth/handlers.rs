use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use tracing::{debug, instrument};

use crate::{
    auth::{
        dto::{LoginRequest, ProtectedResponse, SignupRequest, TokenResponse},
        error::AuthError,
        extractors::{AuthUser, Submission},
    },
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
}

pub fn protected_routes() -> Router<AppState> {
    Router::new().route("/protected", get(protected))
}

#[instrument(skip(state, submission), fields(from_form = submission.from_form))]
pub async fn signup(
    State(state): State<AppState>,
    submission: Submission<SignupRequest>,
) -> Result<Response, AuthError> {
    let token = state.auth.signup(submission.body).await?;
    Ok(token_response(&state, token, submission.from_form))
}

#[instrument(skip(state, submission), fields(from_form = submission.from_form))]
pub async fn login(
    State(state): State<AppState>,
    submission: Submission<LoginRequest>,
) -> Result<Response, AuthError> {
    let token = state.auth.login(submission.body).await?;
    Ok(token_response(&state, token, submission.from_form))
}

#[instrument(skip_all, fields(user_id = %claims.id))]
pub async fn protected(AuthUser(claims): AuthUser) -> Json<ProtectedResponse> {
    Json(ProtectedResponse {
        message: "Access granted",
        user: claims,
    })
}

/// Browser form posts are redirected with the token in the query string;
/// API callers get it as JSON.
fn token_response(state: &AppState, token: String, from_form: bool) -> Response {
    if !from_form {
        return Json(TokenResponse { token }).into_response();
    }
    let base = state.config.frontend_url.as_deref().unwrap_or("/");
    let url = with_token(base, &token);
    debug!(target_url = %base, "redirecting with token");
    Redirect::to(&url).into_response()
}

fn with_token(base: &str, token: &str) -> String {
    let sep = if base.contains('?') { '&' } else { '?' };
    format!("{base}{sep}token={token}")
}
