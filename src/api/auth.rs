//! Sign-up, login and logout endpoints.

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Extension,
};

use super::{Json, OK};
use crate::auth::AccessToken;
use crate::errors::AuthFailure;
use crate::models::{LoginRequest, SignUpRequest, TokenLogoutRequest};
use crate::AppState;

/// Token handed out in the `Authorization` response header.
fn token_response(token: &str) -> Response {
    (
        [(header::AUTHORIZATION, format!("Bearer {}", token))],
        Json(OK),
    )
        .into_response()
}

/// POST /api/v1/auth/signup
pub async fn sign_up(
    State(state): State<AppState>,
    Json(request): Json<SignUpRequest>,
) -> Result<Response, AuthFailure> {
    let token = state.auth.sign_up(&request).await?;
    Ok(token_response(&token))
}

/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Response, AuthFailure> {
    let token = state.auth.login(&request).await?;
    Ok(token_response(&token))
}

/// POST /api/v1/auth/logout - Answer with an already expired token.
pub async fn logout(
    State(state): State<AppState>,
    Extension(AccessToken(token)): Extension<AccessToken>,
) -> Result<Response, AuthFailure> {
    let expired = state.auth.logout(&token).await?;
    Ok(token_response(&expired))
}

/// POST /api/v1/auth/logout/token - Same as logout, token in the body.
pub async fn logout_token(
    State(state): State<AppState>,
    Json(request): Json<TokenLogoutRequest>,
) -> Result<Response, AuthFailure> {
    let expired = state.auth.logout(&request.token).await?;
    Ok(token_response(&expired))
}
