//! Purchase records and the payment callback payload.

use serde::{Deserialize, Serialize};

/// One purchased product.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PurchaseObject {
    pub id: String,
    pub price: i64,
}

/// Purchases of one user, keyed by email. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct UserPurchases {
    pub user_email: String,
    #[serde(default)]
    pub objects: Vec<PurchaseObject>,
}

impl UserPurchases {
    pub fn has_purchase(&self, id: &str) -> bool {
        self.objects.iter().any(|obj| obj.id == id)
    }

    /// Append a purchase unless that product is already recorded.
    pub fn add(&mut self, object: PurchaseObject) -> bool {
        if self.has_purchase(&object.id) {
            return false;
        }
        self.objects.push(object);
        true
    }
}

/// Query string the payment provider redirects to on completion.
#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseCallback {
    pub id: String,
    pub email: String,
    pub amount: i64,
    #[serde(default)]
    pub sig: String,
}

/// Request body for `POST /purchases/link`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentLinkRequest {
    pub product_id: String,
}

/// Response body carrying a payment link.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentLinkResponse {
    pub url: String,
}
