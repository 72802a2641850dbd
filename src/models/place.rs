//! Place model and the request bodies of the places resource.

use serde::{Deserialize, Serialize};

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Listing data pulled from the maps provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct MapInfo {
    #[serde(default)]
    pub place_id: String,
    #[serde(default)]
    pub rating: f32,
    #[serde(default)]
    pub reservable: bool,
    #[serde(default)]
    pub delivery: bool,
    #[serde(default)]
    pub formatted_address: String,
    #[serde(default)]
    pub location_url: String,
    #[serde(default)]
    pub website: String,
    /// Storage object keys of the place photos, all under `places/<id>/`.
    /// Responses carry signed URLs here instead.
    #[serde(default)]
    pub photo_refs: Vec<String>,
    /// Provider photo tokens (`photo_reference`). Not storage objects, never signed.
    #[serde(default)]
    pub provider_photos: Vec<String>,
    /// Provider weekday text, e.g. `Monday: 9:00 AM – 5:00 PM`.
    #[serde(default)]
    pub opening_info: Vec<String>,
}

/// A place of the directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Place {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location_url: String,
    pub coordinates: Coordinates,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub instagram: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub address: String,
    /// Derived from `coordinates`; see [`crate::geo::encode`].
    #[serde(default)]
    pub geohash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_info: Option<MapInfo>,
    /// Signed URL of the first photo; filled per response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_image_url: Option<String>,
    /// Filled per response from the opening hours text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_open: Option<bool>,
}

impl Place {
    pub fn photo_refs(&self) -> &[String] {
        self.map_info.as_ref().map_or(&[], |info| info.photo_refs.as_slice())
    }

    /// Drop the fields that are only computed for a response.
    pub fn without_transient(mut self) -> Self {
        self.preview_image_url = None;
        self.is_open = None;
        self
    }
}

/// A row read from the import spreadsheet.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SheetPlace {
    pub name: String,
    pub labels: Vec<String>,
    pub location_url: String,
    pub description: String,
    pub instagram: String,
    pub website: String,
    pub category: String,
}

/// Request body for `POST /places`.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CreatePlaceRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "location")]
    pub location_url: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub instagram: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub labels: Vec<String>,
}

/// Request body for `PUT /places`. Empty fields leave the stored value.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePlaceRequest {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "location")]
    pub location_url: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub instagram: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub labels: Vec<String>,
}

/// Listing request: a city name or a bounding box, plus optional filters.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GetPlacesRequest {
    pub city: String,
    pub center: Coordinates,
    pub latitude_delta: f64,
    pub longitude_delta: f64,
    pub labels: Vec<String>,
    pub category: String,
}

/// Query string of `GET /places`.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PlacesQuery {
    #[serde(default)]
    pub city: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub latitude_delta: Option<f64>,
    pub longitude_delta: Option<f64>,
    /// Comma-separated label filter.
    #[serde(default)]
    pub labels: String,
    #[serde(default)]
    pub category: String,
}

impl PlacesQuery {
    /// Validate the query into a listing request.
    pub fn into_request(self) -> Result<GetPlacesRequest, crate::errors::AppError> {
        let labels = self
            .labels
            .split(',')
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();

        if !self.city.trim().is_empty() {
            return Ok(GetPlacesRequest {
                city: self.city,
                labels,
                category: self.category,
                ..GetPlacesRequest::default()
            });
        }

        match (
            self.latitude,
            self.longitude,
            self.latitude_delta,
            self.longitude_delta,
        ) {
            (Some(latitude), Some(longitude), Some(latitude_delta), Some(longitude_delta)) => {
                Ok(GetPlacesRequest {
                    city: String::new(),
                    center: Coordinates {
                        latitude,
                        longitude,
                    },
                    latitude_delta,
                    longitude_delta,
                    labels,
                    category: self.category,
                })
            }
            _ => Err(crate::errors::AppError::BadRequest(
                "either city or latitude, longitude, latitudeDelta and longitudeDelta are required"
                    .to_string(),
            )),
        }
    }
}
