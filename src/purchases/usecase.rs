use std::sync::Arc;

use super::{sign_callback, verify_callback, PaymentConnector, PurchaseRepository};
use crate::errors::AppError;
use crate::models::{PurchaseCallback, PurchaseObject, UserPurchases};

/// Path the payment provider redirects to after checkout.
pub const CONFIRM_PATH: &str = "/api/v1/purchases/confirm";

pub struct PurchasesUsecase {
    repo: Arc<dyn PurchaseRepository>,
    payments: Arc<dyn PaymentConnector>,
    signing_key: String,
    public_base_url: String,
}

impl PurchasesUsecase {
    pub fn new(
        repo: Arc<dyn PurchaseRepository>,
        payments: Arc<dyn PaymentConnector>,
        signing_key: String,
        public_base_url: String,
    ) -> Self {
        Self {
            repo,
            payments,
            signing_key,
            public_base_url,
        }
    }

    /// Whether the buyer's record contains `product_id`.
    pub async fn has_purchase(&self, buyer: &str, product_id: &str) -> Result<bool, AppError> {
        Ok(self
            .repo
            .get_purchases(buyer)
            .await?
            .is_some_and(|purchases| purchases.has_purchase(product_id)))
    }

    /// Payment link for `product_id` whose completion confirms the purchase for `buyer`.
    pub async fn payment_link(&self, product_id: &str, buyer: &str) -> Result<String, AppError> {
        let product = self.payments.product(product_id).await?;
        let sig = sign_callback(&self.signing_key, &product.id, buyer, product.unit_amount)?;

        let mut redirect = url::Url::parse(&format!("{}{}", self.public_base_url, CONFIRM_PATH))
            .map_err(|e| AppError::Internal(format!("Invalid public base URL: {}", e)))?;
        redirect
            .query_pairs_mut()
            .append_pair("id", &product.id)
            .append_pair("email", buyer)
            .append_pair("amount", &product.unit_amount.to_string())
            .append_pair("sig", &sig);

        self.payments
            .create_payment_link(&product.price_id, redirect.as_str())
            .await
    }

    /// Record a completed checkout. Repeated callbacks for one product are no-ops.
    ///
    /// Returns whether the purchase was new.
    pub async fn record_purchase(&self, callback: &PurchaseCallback) -> Result<bool, AppError> {
        if !verify_callback(
            &self.signing_key,
            &callback.id,
            &callback.email,
            callback.amount,
            &callback.sig,
        ) {
            tracing::warn!(product_id = %callback.id, "Rejected unsigned purchase callback");
            return Err(AppError::Forbidden("Invalid purchase signature".to_string()));
        }

        let mut purchases = self
            .repo
            .get_purchases(&callback.email)
            .await?
            .unwrap_or_else(|| UserPurchases {
                user_email: callback.email.clone(),
                objects: Vec::new(),
            });

        let added = purchases.add(PurchaseObject {
            id: callback.id.clone(),
            price: callback.amount,
        });
        if added {
            self.repo.save_purchases(&purchases).await?;
            tracing::info!(product_id = %callback.id, "Purchase recorded");
        } else {
            tracing::debug!(product_id = %callback.id, "Purchase already recorded");
        }
        Ok(added)
    }
}
