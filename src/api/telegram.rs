//! Read-only mirror of the places endpoints for the Telegram bot.

use axum::{
    extract::{Path, State},
    Extension,
};

use super::{ApiResult, Json, Query};
use crate::auth::TelegramUser;
use crate::models::{City, Place, PlacesQuery};
use crate::AppState;

/// GET /api/v1/tg/places - At most five entries.
pub async fn tg_list_places(
    State(state): State<AppState>,
    Extension(user): Extension<TelegramUser>,
    Query(query): Query<PlacesQuery>,
) -> ApiResult<Json<Vec<Place>>> {
    let request = query.into_request()?;
    let places = state
        .places
        .telegram_get_places(&request, &user.purchase_key())
        .await?;
    Ok(Json(places))
}

/// GET /api/v1/tg/places/{id}
pub async fn tg_get_place(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Place>> {
    Ok(Json(state.places.get_place(&id).await?))
}

/// GET /api/v1/tg/cities
pub async fn tg_list_cities(State(state): State<AppState>) -> ApiResult<Json<Vec<City>>> {
    Ok(Json(state.places.list_cities().await?))
}
