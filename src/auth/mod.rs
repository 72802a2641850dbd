//! Account management and request authentication.
//!
//! Two guards protect the API: bearer access tokens resolved to a stored
//! user, and the Telegram bot token for the mirror routes. Token comparison
//! is constant-time to mitigate timing attacks.

mod password;
mod token;
mod usecase;

pub use password::{hash_password, verify_password};
pub use token::TokenIssuer;
pub use usecase::AuthUsecase;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::Request,
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::User;

/// Header carrying the Telegram user id on mirror routes.
pub const TELEGRAM_ID_HEADER: &str = "x-telegram-id";

/// User accounts keyed by id, unique by email.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `AlreadyExists` when the email is taken.
    async fn create_user(&self, user: &User) -> Result<(), AppError>;
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, AppError>;
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    async fn update_user(&self, user: &User) -> Result<(), AppError>;
}

/// Short-lived activation codes.
#[async_trait]
pub trait ActivationCodeStore: Send + Sync {
    async fn put_code(&self, user_id: Uuid, code: &str, ttl: Duration) -> Result<(), AppError>;
    /// `None` once the code expired or was consumed.
    async fn get_code(&self, user_id: Uuid) -> Result<Option<String>, AppError>;
    async fn delete_code(&self, user_id: Uuid) -> Result<(), AppError>;
}

/// Built-in mail templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MailTemplate {
    Welcome { code: String },
}

impl MailTemplate {
    pub fn subject(&self) -> &'static str {
        match self {
            MailTemplate::Welcome { .. } => "Welcome to Favs",
        }
    }

    pub fn body(&self) -> String {
        match self {
            MailTemplate::Welcome { code } => format!(
                "Welcome to Favs!\n\nYour activation code is {code}. It is valid for 3 hours.\n"
            ),
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, template: &MailTemplate) -> Result<(), AppError>;
}

/// Raw bearer token of the current request.
#[derive(Debug, Clone)]
pub struct AccessToken(pub String);

/// Telegram user id taken from [`TELEGRAM_ID_HEADER`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramUser(pub String);

impl TelegramUser {
    /// Key under which this user's purchases are recorded.
    pub fn purchase_key(&self) -> String {
        format!("telegram:{}", self.0)
    }
}

/// Bearer authentication layer resolving the token to a stored user.
///
/// On success the [`User`] and its [`AccessToken`] are added to the request
/// extensions.
pub async fn bearer_auth_layer(auth: Arc<AuthUsecase>, mut request: Request, next: Next) -> Response {
    let Some(token) = bearer_token(request.headers()) else {
        return AppError::Unauthorized("Missing bearer token".to_string()).into_response();
    };

    match auth.check_user(&token).await {
        Ok(user) => {
            request.extensions_mut().insert(user);
            request.extensions_mut().insert(AccessToken(token));
            next.run(request).await
        }
        Err(e) => {
            tracing::debug!("Rejected bearer token: {}", e);
            AppError::Unauthorized("Invalid or expired token".to_string()).into_response()
        }
    }
}

/// Telegram authentication layer that takes the expected bot token as a parameter.
pub async fn telegram_auth_layer(
    expected_token: Option<String>,
    mut request: Request,
    next: Next,
) -> Response {
    // Without a bot token the mirror is closed
    let Some(expected) = expected_token else {
        return AppError::Unauthorized("Telegram access is not configured".to_string())
            .into_response();
    };

    let authorized = bearer_token(request.headers())
        .is_some_and(|provided| constant_time_compare(&provided, &expected));
    if !authorized {
        return AppError::Unauthorized("Invalid bot token".to_string()).into_response();
    }

    let telegram_id = request
        .headers()
        .get(TELEGRAM_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string);

    match telegram_id {
        Some(id) => {
            request.extensions_mut().insert(TelegramUser(id));
            next.run(request).await
        }
        None => AppError::Unauthorized("Missing X-Telegram-ID header".to_string()).into_response(),
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Perform constant-time string comparison.
pub(crate) fn constant_time_compare(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_constant_time_compare_equal() {
        assert!(constant_time_compare("bot-token-123", "bot-token-123"));
    }

    #[test]
    fn test_constant_time_compare_not_equal() {
        assert!(!constant_time_compare("bot-token-123", "bot-token-124"));
        assert!(!constant_time_compare("short", "much-longer-token"));
        assert!(!constant_time_compare("", "not-empty"));
    }

    #[test]
    fn test_bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_none());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(bearer_token(&headers).is_none());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(bearer_token(&headers).is_none());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers).as_deref(), Some("abc.def"));
    }

    #[test]
    fn test_welcome_mail_carries_code() {
        let mail = MailTemplate::Welcome {
            code: "Ab12Cd34Ef56".to_string(),
        };
        assert!(mail.body().contains("Ab12Cd34Ef56"));
        assert_eq!(mail.subject(), "Welcome to Favs");
    }

    #[test]
    fn test_telegram_purchase_key() {
        assert_eq!(TelegramUser("42".to_string()).purchase_key(), "telegram:42");
    }
}
