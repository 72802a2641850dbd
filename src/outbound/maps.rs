//! Google Maps adapter: map links, place listings and city centers.

use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::{City, Coordinates, MapInfo, Place};
use crate::places::LocationResolver;

const MAPS_API_URL: &str = "https://maps.googleapis.com/maps/api";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// Search radius around the link coordinates, in meters.
const SEARCH_RADIUS: &str = "2";

static COORDINATES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@(-?\d+\.\d+),(-?\d+\.\d+)").expect("valid regex"));
static SHORT_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https://maps\.app\.goo\.gl/[A-Za-z0-9]+").expect("valid regex"));

/// Extract the first `@lat,lon` pair of a link.
pub fn coordinates_from_link(link: &str) -> Result<Coordinates, AppError> {
    let not_found = || AppError::BadRequest(format!("link {} does not contain coordinates", link));
    let captures = COORDINATES.captures(link).ok_or_else(not_found)?;

    let latitude = captures[1].parse().map_err(|_| not_found())?;
    let longitude = captures[2].parse().map_err(|_| not_found())?;
    Ok(Coordinates {
        latitude,
        longitude,
    })
}

/// Whether the link is a short link that has to be expanded first.
pub fn is_short_link(link: &str) -> bool {
    SHORT_LINK.is_match(link)
}

/// [`LocationResolver`] backed by the Google Maps web services.
pub struct GoogleMapsResolver {
    client: reqwest::Client,
    /// Does not follow redirects, for short links.
    expander: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GoogleMapsResolver {
    pub fn new(api_key: impl Into<String>) -> Result<Self, AppError> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            expander: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .redirect(reqwest::redirect::Policy::none())
                .build()?,
            api_key: api_key.into(),
            base_url: MAPS_API_URL.to_string(),
        })
    }

    /// Point the client at another API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn expand(&self, link: &str) -> Result<String, AppError> {
        let response = self.expander.get(link).send().await?;
        response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| AppError::BadRequest(format!("short link {} did not redirect", link)))
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<ApiResponse<T>, AppError> {
        let response: ApiResponse<T> = self
            .client
            .get(format!("{}/{}", self.base_url, endpoint))
            .query(params)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        match response.status.as_str() {
            "OK" | "ZERO_RESULTS" => Ok(response),
            status => Err(AppError::Internal(format!(
                "Maps {} failed with {}: {}",
                endpoint,
                status,
                response.error_message.as_deref().unwrap_or_default()
            ))),
        }
    }
}

#[async_trait]
impl LocationResolver for GoogleMapsResolver {
    async fn resolve_link(&self, link: &str) -> Result<Coordinates, AppError> {
        if is_short_link(link) {
            let expanded = self.expand(link).await?;
            tracing::debug!(link = %link, expanded = %expanded, "Expanded short link");
            return coordinates_from_link(&expanded);
        }
        coordinates_from_link(link)
    }

    async fn place_info(&self, link: &str, name: &str) -> Result<Place, AppError> {
        let coordinates = self.resolve_link(link).await?;
        let location = format!("{},{}", coordinates.latitude, coordinates.longitude);

        let search: ApiResponse<SearchHit> = self
            .call(
                "place/textsearch/json",
                &[
                    ("query", name),
                    ("location", location.as_str()),
                    ("radius", SEARCH_RADIUS),
                ],
            )
            .await?;
        let hit = search.results.into_iter().next().ok_or_else(|| {
            AppError::NotFound(format!("No maps listing for {} near {}", name, location))
        })?;

        let details: ApiResponse<PlaceDetails> = self
            .call(
                "place/details/json",
                &[
                    ("place_id", hit.place_id.as_str()),
                    (
                        "fields",
                        "name,formatted_address,url,website,rating,reservable,delivery,geometry,photos,current_opening_hours",
                    ),
                ],
            )
            .await?;
        let details = details.result.ok_or_else(|| {
            AppError::NotFound(format!("No maps details for {}", hit.place_id))
        })?;

        Ok(details.into_place(hit.place_id))
    }

    async fn city_info(&self, name: &str) -> Result<City, AppError> {
        let geocode: ApiResponse<GeocodeHit> =
            self.call("geocode/json", &[("address", name)]).await?;
        let hit = geocode
            .results
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(format!("City {} not found", name)))?;

        Ok(City {
            name: name.to_lowercase(),
            center: hit.geometry.location.into(),
            ..City::default()
        })
    }
}

// ==================== WIRE TYPES ====================

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default = "Vec::new")]
    results: Vec<T>,
    #[serde(default = "Option::default")]
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    place_id: String,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

impl From<LatLng> for Coordinates {
    fn from(value: LatLng) -> Self {
        Coordinates {
            latitude: value.lat,
            longitude: value.lng,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct GeocodeHit {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Photo {
    photo_reference: String,
}

#[derive(Debug, Default, Deserialize)]
struct OpeningHours {
    #[serde(default)]
    weekday_text: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct PlaceDetails {
    #[serde(default)]
    name: String,
    #[serde(default)]
    formatted_address: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    website: String,
    #[serde(default)]
    rating: f32,
    #[serde(default)]
    reservable: bool,
    #[serde(default)]
    delivery: bool,
    geometry: Geometry,
    #[serde(default)]
    photos: Vec<Photo>,
    #[serde(default)]
    current_opening_hours: Option<OpeningHours>,
}

impl PlaceDetails {
    fn into_place(self, place_id: String) -> Place {
        let info = MapInfo {
            place_id,
            rating: self.rating,
            reservable: self.reservable,
            delivery: self.delivery,
            formatted_address: self.formatted_address.clone(),
            location_url: self.url.clone(),
            website: self.website.clone(),
            photo_refs: Vec::new(),
            provider_photos: self.photos.into_iter().map(|p| p.photo_reference).collect(),
            opening_info: self.current_opening_hours.unwrap_or_default().weekday_text,
        };

        Place {
            name: self.name,
            description: self.formatted_address.clone(),
            location_url: self.url,
            coordinates: self.geometry.location.into(),
            website: self.website,
            address: self.formatted_address,
            map_info: Some(info),
            ..Place::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::mock_maps_server;

    #[test]
    fn test_coordinates_anywhere_in_link() {
        let c = coordinates_from_link(
            "https://www.google.com/maps/place/Cafe/@34.6841,33.0379,17z/data=!3m1",
        )
        .unwrap();
        assert_eq!(c.latitude, 34.6841);
        assert_eq!(c.longitude, 33.0379);

        let c = coordinates_from_link("@-33.8688,-151.2093").unwrap();
        assert_eq!(c.latitude, -33.8688);
        assert_eq!(c.longitude, -151.2093);
    }

    #[test]
    fn test_link_without_coordinates() {
        for link in [
            "https://www.google.com/maps/place/Cafe",
            "@34,33",
            "https://example.com/?q=34.1,33.2",
        ] {
            assert!(
                matches!(coordinates_from_link(link), Err(AppError::BadRequest(_))),
                "{link}"
            );
        }
    }

    #[test]
    fn test_short_link_detection() {
        assert!(is_short_link("https://maps.app.goo.gl/AbC123xyz"));
        assert!(!is_short_link("https://www.google.com/maps/@1.0,2.0,17z"));
        assert!(!is_short_link("http://maps.app.goo.gl/AbC123xyz"));
    }

    #[tokio::test]
    async fn test_place_info_maps_details() {
        let resolver = GoogleMapsResolver::new("test-key")
            .unwrap()
            .with_base_url(mock_maps_server().await);

        let place = resolver
            .place_info("https://www.google.com/maps/@40.01,-73.01,17z", "Cafe")
            .await
            .unwrap();

        assert_eq!(place.name, "Cafe");
        assert_eq!(place.address, "1 Main St");
        assert_eq!(place.coordinates.latitude, 40.011);
        let info = place.map_info.unwrap();
        assert_eq!(info.place_id, "id-Cafe");
        assert!(info.reservable);
        assert!(!info.delivery);
        assert_eq!(info.provider_photos, vec!["id-Cafe-photo"]);
        assert!(info.photo_refs.is_empty());
        assert_eq!(info.opening_info, vec!["Monday: Closed"]);
    }

    #[tokio::test]
    async fn test_city_info_geocodes_center() {
        let resolver = GoogleMapsResolver::new("test-key")
            .unwrap()
            .with_base_url(mock_maps_server().await);

        let city = resolver.city_info("Limassol").await.unwrap();
        assert_eq!(city.name, "limassol");
        assert_eq!(city.center.latitude, 34.68);
    }
}
