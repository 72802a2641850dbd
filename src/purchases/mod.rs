//! Purchase records and payment links.

mod signature;
mod usecase;

pub use signature::{sign_callback, verify_callback};
pub use usecase::PurchasesUsecase;

use async_trait::async_trait;

use crate::errors::AppError;
use crate::models::UserPurchases;

/// Purchase records keyed by buyer.
#[async_trait]
pub trait PurchaseRepository: Send + Sync {
    async fn get_purchases(&self, user_email: &str) -> Result<Option<UserPurchases>, AppError>;
    async fn save_purchases(&self, purchases: &UserPurchases) -> Result<(), AppError>;
}

/// A priced product of the payment provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: String,
    pub price_id: String,
    /// Smallest currency unit.
    pub unit_amount: i64,
}

#[async_trait]
pub trait PaymentConnector: Send + Sync {
    /// Product with its current default price.
    async fn product(&self, id: &str) -> Result<Product, AppError>;
    /// One-item payment link redirecting to `redirect_url` on completion.
    async fn create_payment_link(&self, price_id: &str, redirect_url: &str)
        -> Result<String, AppError>;
}
