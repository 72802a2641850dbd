//! User account model and auth request bodies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    /// Salted argon2 PHC string; never leaves the server.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub activated: bool,
    pub created_at: DateTime<Utc>,
}

/// Request body for `POST /auth/signup`.
#[derive(Debug, Clone, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
}

/// Request body for `POST /auth/login`.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request body for `PUT /user`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub old_password: String,
    #[serde(default)]
    pub new_password: String,
}

/// Request body for the legacy token logout.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenLogoutRequest {
    pub token: String,
}
