//! Account endpoints of the signed-in user.

use axum::{
    extract::{Path, State},
    Extension,
};
use serde::Deserialize;
use uuid::Uuid;

use super::{ApiResult, Json, Query, OK};
use crate::errors::{AppError, AuthFailure};
use crate::models::{UpdateUserRequest, User};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ActivationQuery {
    #[serde(default)]
    pub code: String,
}

/// GET /api/v1/user/me
pub async fn get_me(Extension(user): Extension<User>) -> Json<User> {
    Json(user)
}

/// PUT /api/v1/user - Change the password.
pub async fn update_user(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<User>, AuthFailure> {
    let updated = state.auth.update_user(user.id, &request).await?;
    Ok(Json(updated))
}

/// POST /api/v1/user/activation?code=
pub async fn activate_user(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<ActivationQuery>,
) -> Result<Json<&'static str>, AuthFailure> {
    state.auth.activate_user(&user, &query.code).await?;
    Ok(Json(OK))
}

/// GET /api/v1/user/{id}
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<User>> {
    let id = Uuid::parse_str(&id)
        .map_err(|_| AppError::BadRequest(format!("Invalid user id {}", id)))?;
    Ok(Json(state.auth.get_user(id).await?))
}
