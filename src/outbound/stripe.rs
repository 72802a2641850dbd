//! Stripe REST client for products and payment links.

use async_trait::async_trait;
use serde::Deserialize;

use crate::errors::AppError;
use crate::purchases::{PaymentConnector, Product};

const STRIPE_API_URL: &str = "https://api.stripe.com";

pub struct StripeConnector {
    client: reqwest::Client,
    secret_key: String,
    base_url: String,
}

impl StripeConnector {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            secret_key: secret_key.into(),
            base_url: STRIPE_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Debug, Deserialize)]
struct StripeProduct {
    id: String,
    default_price: Option<StripePrice>,
}

#[derive(Debug, Deserialize)]
struct StripePrice {
    id: String,
    #[serde(default)]
    unit_amount: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct StripePaymentLink {
    url: String,
}

#[async_trait]
impl PaymentConnector for StripeConnector {
    async fn product(&self, id: &str) -> Result<Product, AppError> {
        let response = self
            .client
            .get(format!("{}/v1/products/{}", self.base_url, id))
            .bearer_auth(&self.secret_key)
            .query(&[("expand[]", "default_price")])
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!("Product {} not found", id)));
        }
        let product: StripeProduct = response.error_for_status()?.json().await?;

        let price = product.default_price.ok_or_else(|| {
            AppError::Internal(format!("Product {} has no default price", product.id))
        })?;
        Ok(Product {
            id: product.id,
            price_id: price.id,
            unit_amount: price.unit_amount.unwrap_or_default(),
        })
    }

    async fn create_payment_link(
        &self,
        price_id: &str,
        redirect_url: &str,
    ) -> Result<String, AppError> {
        let link: StripePaymentLink = self
            .client
            .post(format!("{}/v1/payment_links", self.base_url))
            .bearer_auth(&self.secret_key)
            .form(&[
                ("line_items[0][price]", price_id),
                ("line_items[0][quantity]", "1"),
                ("after_completion[type]", "redirect"),
                ("after_completion[redirect][url]", redirect_url),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        tracing::info!(price_id = %price_id, "Payment link created");
        Ok(link.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::Path,
        http::{HeaderMap, StatusCode},
        routing::{get, post},
        Form, Json, Router,
    };
    use serde_json::json;
    use std::collections::HashMap;

    async fn mock_stripe() -> String {
        let app = Router::new()
            .route(
                "/v1/products/{id}",
                get(|Path(id): Path<String>, headers: HeaderMap| async move {
                    assert_eq!(headers["authorization"], "Bearer sk_test");
                    if id != "prod_1" {
                        return Err(StatusCode::NOT_FOUND);
                    }
                    Ok(Json(json!({
                        "id": "prod_1",
                        "default_price": { "id": "price_1", "unit_amount": 900 }
                    })))
                }),
            )
            .route(
                "/v1/payment_links",
                post(|Form(form): Form<HashMap<String, String>>| async move {
                    assert_eq!(form["line_items[0][quantity]"], "1");
                    assert_eq!(form["after_completion[type]"], "redirect");
                    Json(json!({
                        "url": format!(
                            "https://buy.stripe.test/{}?back={}",
                            form["line_items[0][price]"],
                            form["after_completion[redirect][url]"]
                        )
                    }))
                }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_product_and_link() {
        let stripe = StripeConnector::new("sk_test").with_base_url(mock_stripe().await);

        let product = stripe.product("prod_1").await.unwrap();
        assert_eq!(
            product,
            Product {
                id: "prod_1".to_string(),
                price_id: "price_1".to_string(),
                unit_amount: 900,
            }
        );

        let link = stripe
            .create_payment_link("price_1", "https://favs.test/confirm")
            .await
            .unwrap();
        assert_eq!(
            link,
            "https://buy.stripe.test/price_1?back=https://favs.test/confirm"
        );
    }

    #[tokio::test]
    async fn test_unknown_product_is_not_found() {
        let stripe = StripeConnector::new("sk_test").with_base_url(mock_stripe().await);
        assert!(matches!(
            stripe.product("prod_x").await,
            Err(AppError::NotFound(_))
        ));
    }
}
