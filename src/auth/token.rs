//! HS256 access tokens.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
}

/// Issues and verifies access tokens with a symmetric key.
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(signing_key: &str, ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(signing_key.as_bytes()),
            decoding_key: DecodingKey::from_secret(signing_key.as_bytes()),
            ttl,
        }
    }

    /// Token for `user_id` valid for the configured lifetime.
    pub fn issue(&self, user_id: Uuid) -> Result<String, AppError> {
        let now = Utc::now().timestamp();
        self.sign(user_id, now, now + self.ttl.as_secs() as i64)
    }

    /// Token that is already expired; replaces the client's token on logout.
    pub fn issue_expired(&self, user_id: Uuid) -> Result<String, AppError> {
        let now = Utc::now().timestamp();
        self.sign(user_id, now - 1, now - 1)
    }

    /// Verify signature and expiry and return the subject.
    pub fn verify(&self, token: &str) -> Result<Uuid, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let data = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))?;

        Uuid::parse_str(&data.claims.sub)
            .map_err(|_| AppError::Unauthorized("Invalid token subject".to_string()))
    }

    fn sign(&self, user_id: Uuid, iat: i64, exp: i64) -> Result<String, AppError> {
        let claims = Claims {
            sub: user_id.to_string(),
            iat,
            exp,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_verify() {
        let issuer = TokenIssuer::new("secret", Duration::from_secs(60));
        let id = Uuid::new_v4();

        let token = issuer.issue(id).unwrap();
        assert!(!token.is_empty());
        assert_eq!(issuer.verify(&token).unwrap(), id);
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let issuer = TokenIssuer::new("secret", Duration::from_secs(60));
        let token = issuer.issue_expired(Uuid::new_v4()).unwrap();

        assert!(matches!(
            issuer.verify(&token),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_foreign_key_is_rejected() {
        let ours = TokenIssuer::new("secret", Duration::from_secs(60));
        let theirs = TokenIssuer::new("other", Duration::from_secs(60));
        let token = theirs.issue(Uuid::new_v4()).unwrap();

        assert!(ours.verify(&token).is_err());
        assert!(ours.verify("not-a-token").is_err());
    }
}
