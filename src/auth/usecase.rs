//! Account usecases: sign-up, login, logout, password change, activation.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use uuid::Uuid;

use super::{
    constant_time_compare, hash_password, verify_password, ActivationCodeStore, MailTemplate,
    Mailer, TokenIssuer, UserRepository,
};
use crate::errors::AppError;
use crate::models::{LoginRequest, SignUpRequest, UpdateUserRequest, User};

const ACTIVATION_CODE_LENGTH: usize = 12;
const ACTIVATION_CODE_TTL: Duration = Duration::from_secs(3 * 60 * 60);

pub struct AuthUsecase {
    users: Arc<dyn UserRepository>,
    codes: Arc<dyn ActivationCodeStore>,
    mailer: Arc<dyn Mailer>,
    tokens: TokenIssuer,
}

impl AuthUsecase {
    pub fn new(
        users: Arc<dyn UserRepository>,
        codes: Arc<dyn ActivationCodeStore>,
        mailer: Arc<dyn Mailer>,
        tokens: TokenIssuer,
    ) -> Self {
        Self {
            users,
            codes,
            mailer,
            tokens,
        }
    }

    /// Register an account and mail its activation code. Returns an access token.
    pub async fn sign_up(&self, request: &SignUpRequest) -> Result<String, AppError> {
        let email = request.email.trim();
        if !email.contains('@') {
            return Err(AppError::BadRequest("A valid email is required".to_string()));
        }
        if request.password.is_empty() {
            return Err(AppError::BadRequest("Password is required".to_string()));
        }

        if self.users.get_user_by_email(email).await?.is_some() {
            return Err(AppError::AlreadyExists("Email already registered".to_string()));
        }

        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: hash_password(&request.password).await?,
            activated: false,
            created_at: Utc::now(),
        };
        self.users.create_user(&user).await?;
        tracing::info!(user_id = %user.id, "User registered");

        let token = self.tokens.issue(user.id)?;

        let code = activation_code();
        self.codes
            .put_code(user.id, &code, ACTIVATION_CODE_TTL)
            .await?;

        // The account exists at this point; a mail failure must not hide the token
        if let Err(e) = self
            .mailer
            .send(&user.email, &MailTemplate::Welcome { code })
            .await
        {
            tracing::error!(user_id = %user.id, "Failed to send welcome mail: {}", e);
        }

        Ok(token)
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<String, AppError> {
        let invalid = || AppError::InvalidCredentials("Invalid credentials".to_string());

        let user = self
            .users
            .get_user_by_email(request.email.trim())
            .await?
            .ok_or_else(invalid)?;

        if !verify_password(&request.password, &user.password_hash).await? {
            return Err(invalid());
        }

        self.tokens.issue(user.id)
    }

    /// Replace a valid token with an expired one.
    pub async fn logout(&self, token: &str) -> Result<String, AppError> {
        let user_id = self.tokens.verify(token)?;
        self.tokens.issue_expired(user_id)
    }

    /// Resolve a bearer token to its stored user.
    pub async fn check_user(&self, token: &str) -> Result<User, AppError> {
        let user_id = self.tokens.verify(token)?;
        self.users
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Unknown user".to_string()))
    }

    /// Change the password; the old one must match.
    pub async fn update_user(
        &self,
        user_id: Uuid,
        request: &UpdateUserRequest,
    ) -> Result<User, AppError> {
        if request.new_password.is_empty() {
            return Err(AppError::BadRequest("New password is required".to_string()));
        }

        let mut user = self.get_user(user_id).await?;
        if !verify_password(&request.old_password, &user.password_hash).await? {
            return Err(AppError::InvalidCredentials("Invalid credentials".to_string()));
        }

        user.password_hash = hash_password(&request.new_password).await?;
        self.users.update_user(&user).await?;
        Ok(user)
    }

    /// Mark the user activated when `code` matches the stored one.
    pub async fn activate_user(&self, user: &User, code: &str) -> Result<(), AppError> {
        let stored = self
            .codes
            .get_code(user.id)
            .await?
            .ok_or_else(|| AppError::InvalidToken("Activation code expired".to_string()))?;

        if !constant_time_compare(code.trim(), &stored) {
            return Err(AppError::InvalidToken("Invalid activation code".to_string()));
        }

        let activated = User {
            activated: true,
            ..user.clone()
        };
        self.users.update_user(&activated).await?;
        self.codes.delete_code(user.id).await?;
        tracing::info!(user_id = %user.id, "User activated");
        Ok(())
    }

    pub async fn get_user(&self, id: Uuid) -> Result<User, AppError> {
        self.users
            .get_user(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))
    }
}

fn activation_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ACTIVATION_CODE_LENGTH)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MemoryCodes, MemoryUsers, RecordingMailer};

    struct Harness {
        auth: AuthUsecase,
        users: Arc<MemoryUsers>,
        codes: Arc<MemoryCodes>,
        mailer: Arc<RecordingMailer>,
    }

    fn harness() -> Harness {
        let users = Arc::new(MemoryUsers::default());
        let codes = Arc::new(MemoryCodes::default());
        let mailer = Arc::new(RecordingMailer::default());
        let auth = AuthUsecase::new(
            users.clone(),
            codes.clone(),
            mailer.clone(),
            TokenIssuer::new("secret", Duration::from_secs(3600)),
        );
        Harness {
            auth,
            users,
            codes,
            mailer,
        }
    }

    fn sign_up_request() -> SignUpRequest {
        SignUpRequest {
            email: "ann@example.com".to_string(),
            password: "hunter2".to_string(),
        }
    }

    #[test]
    fn test_activation_code_shape() {
        let code = activation_code();
        assert_eq!(code.len(), ACTIVATION_CODE_LENGTH);
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[tokio::test]
    async fn test_sign_up_issues_token_and_mails_code() {
        let h = harness();
        let token = h.auth.sign_up(&sign_up_request()).await.unwrap();

        let user = h.auth.check_user(&token).await.unwrap();
        assert_eq!(user.email, "ann@example.com");
        assert!(!user.activated);

        let code = h.codes.code_for(user.id).unwrap();
        let sent = h.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "ann@example.com");
        assert_eq!(sent[0].1, MailTemplate::Welcome { code });
    }

    #[tokio::test]
    async fn test_sign_up_twice_is_already_exists() {
        let h = harness();
        h.auth.sign_up(&sign_up_request()).await.unwrap();

        let err = h.auth.sign_up(&sign_up_request()).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyExists(_)));
        assert_eq!(h.users.len(), 1);
    }

    #[tokio::test]
    async fn test_login_checks_password() {
        let h = harness();
        h.auth.sign_up(&sign_up_request()).await.unwrap();

        let wrong = LoginRequest {
            email: "ann@example.com".to_string(),
            password: "wrong".to_string(),
        };
        assert!(matches!(
            h.auth.login(&wrong).await,
            Err(AppError::InvalidCredentials(_))
        ));

        let right = LoginRequest {
            email: "ann@example.com".to_string(),
            password: "hunter2".to_string(),
        };
        assert!(!h.auth.login(&right).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_logout_token_is_rejected() {
        let h = harness();
        let token = h.auth.sign_up(&sign_up_request()).await.unwrap();

        let expired = h.auth.logout(&token).await.unwrap();
        assert!(matches!(
            h.auth.check_user(&expired).await,
            Err(AppError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_activation_mismatch_then_match() {
        let h = harness();
        let token = h.auth.sign_up(&sign_up_request()).await.unwrap();
        let user = h.auth.check_user(&token).await.unwrap();

        let err = h.auth.activate_user(&user, "nope").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidToken(_)));
        assert!(!h.auth.get_user(user.id).await.unwrap().activated);

        let code = h.codes.code_for(user.id).unwrap();
        h.auth.activate_user(&user, &code).await.unwrap();
        assert!(h.auth.get_user(user.id).await.unwrap().activated);
        assert!(h.codes.code_for(user.id).is_none());
    }

    #[tokio::test]
    async fn test_update_user_requires_old_password() {
        let h = harness();
        let token = h.auth.sign_up(&sign_up_request()).await.unwrap();
        let user = h.auth.check_user(&token).await.unwrap();

        let wrong = UpdateUserRequest {
            old_password: "wrong".to_string(),
            new_password: "new-secret".to_string(),
        };
        assert!(matches!(
            h.auth.update_user(user.id, &wrong).await,
            Err(AppError::InvalidCredentials(_))
        ));

        let right = UpdateUserRequest {
            old_password: "hunter2".to_string(),
            new_password: "new-secret".to_string(),
        };
        h.auth.update_user(user.id, &right).await.unwrap();

        let login = LoginRequest {
            email: "ann@example.com".to_string(),
            password: "new-secret".to_string(),
        };
        assert!(h.auth.login(&login).await.is_ok());
    }
}
