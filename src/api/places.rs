//! Places, reports and cities endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension,
};

use super::{ApiResult, Json, Query};
use crate::models::{
    City, CreatePlaceRequest, CreateReportRequest, Place, PlacesQuery, Report, UpdatePlaceRequest,
    User,
};
use crate::AppState;

/// POST /api/v1/places
pub async fn create_place(
    State(state): State<AppState>,
    Json(request): Json<CreatePlaceRequest>,
) -> ApiResult<(StatusCode, Json<Place>)> {
    let place = state.places.create_place(&request).await?;
    Ok((StatusCode::CREATED, Json(place)))
}

/// GET /api/v1/places - By `city`, or by `latitude`, `longitude`,
/// `latitudeDelta` and `longitudeDelta`; `labels` and `category` filter.
pub async fn list_places(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<PlacesQuery>,
) -> ApiResult<Json<Vec<Place>>> {
    let request = query.into_request()?;
    let places = state.places.get_places(&request, &user.email).await?;
    Ok(Json(places))
}

/// GET /api/v1/places/{id}
pub async fn get_place(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Place>> {
    Ok(Json(state.places.get_place(&id).await?))
}

/// PUT /api/v1/places
pub async fn update_place(
    State(state): State<AppState>,
    Json(request): Json<UpdatePlaceRequest>,
) -> ApiResult<Json<Place>> {
    Ok(Json(state.places.update_place(&request).await?))
}

/// DELETE /api/v1/places/{id}
pub async fn delete_place(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.places.delete_place(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/places/{id}/photos
pub async fn place_photos(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(state.places.photo_urls(&id).await?))
}

/// POST /api/v1/places/{id}/reports
pub async fn create_report(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
    Json(request): Json<CreateReportRequest>,
) -> ApiResult<(StatusCode, Json<Report>)> {
    let report = state
        .places
        .create_report(&id, &user.email, &request.description)
        .await?;
    Ok((StatusCode::CREATED, Json(report)))
}

/// GET /api/v1/places/{id}/reports
pub async fn list_reports(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Report>>> {
    Ok(Json(state.places.get_reports(&id).await?))
}

/// GET /api/v1/cities
pub async fn list_cities(State(state): State<AppState>) -> ApiResult<Json<Vec<City>>> {
    Ok(Json(state.places.list_cities().await?))
}
