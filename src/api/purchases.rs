//! Payment links and the checkout confirmation.

use axum::{extract::State, Extension};

use super::{ApiResult, Json, Query, OK};
use crate::models::{PaymentLinkRequest, PaymentLinkResponse, PurchaseCallback, User};
use crate::AppState;

/// GET /api/v1/purchases/confirm - Redirect target of a completed checkout.
pub async fn confirm_purchase(
    State(state): State<AppState>,
    Query(callback): Query<PurchaseCallback>,
) -> ApiResult<Json<&'static str>> {
    state.purchases.record_purchase(&callback).await?;
    Ok(Json(OK))
}

/// POST /api/v1/purchases/link
pub async fn payment_link(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(request): Json<PaymentLinkRequest>,
) -> ApiResult<Json<PaymentLinkResponse>> {
    let url = state
        .purchases
        .payment_link(&request.product_id, &user.email)
        .await?;
    Ok(Json(PaymentLinkResponse { url }))
}
