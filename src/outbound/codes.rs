//! Activation codes in Redis, expiring through `SET EX`.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Config, Pool, Runtime};
use redis::AsyncCommands;
use uuid::Uuid;

use crate::auth::ActivationCodeStore;
use crate::errors::AppError;

const KEY_PREFIX: &str = "activation:";

fn code_key(user_id: Uuid) -> String {
    format!("{KEY_PREFIX}{user_id}")
}

pub struct RedisActivationCodes {
    pool: Pool,
}

impl RedisActivationCodes {
    pub fn new(url: &str) -> Result<Self, AppError> {
        let pool = Config::from_url(url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| AppError::Internal(format!("Failed to create Redis pool: {}", e)))?;
        Ok(Self { pool })
    }

    /// Fail fast when the server is unreachable.
    pub async fn ping(&self) -> Result<(), AppError> {
        let mut conn = self.pool.get().await?;
        let _: String = redis::cmd("PING").query_async(&mut *conn).await?;
        Ok(())
    }
}

#[async_trait]
impl ActivationCodeStore for RedisActivationCodes {
    async fn put_code(&self, user_id: Uuid, code: &str, ttl: Duration) -> Result<(), AppError> {
        let mut conn = self.pool.get().await?;
        conn.set_ex::<_, _, ()>(code_key(user_id), code, ttl.as_secs().max(1))
            .await?;
        Ok(())
    }

    async fn get_code(&self, user_id: Uuid) -> Result<Option<String>, AppError> {
        let mut conn = self.pool.get().await?;
        Ok(conn.get(code_key(user_id)).await?)
    }

    async fn delete_code(&self, user_id: Uuid) -> Result<(), AppError> {
        let mut conn = self.pool.get().await?;
        conn.del::<_, ()>(code_key(user_id)).await?;
        Ok(())
    }
}
