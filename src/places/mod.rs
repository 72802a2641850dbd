//! Places directory: lookups, purchase gating, photo signing and sheet import.
//!
//! The usecases only see the traits below; SQLite and the HTTP providers are
//! plugged in at startup.

mod hours;
mod importer;
mod usecase;

pub use hours::is_open_at;
pub use importer::{spawn_import_scheduler, Importer};
pub use usecase::PlacesUsecase;

use async_trait::async_trait;

use crate::errors::AppError;
use crate::models::{City, Coordinates, Place, Report, SheetPlace};

/// Where to look for places.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaceArea {
    /// Exact match on the lower-cased city name.
    City(String),
    /// Inclusive geohash range, ordered by geohash.
    Geohash { low: String, high: String },
}

/// Filters of a place listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceQuery {
    pub area: PlaceArea,
    pub category: Option<String>,
    /// Any-of match; empty means no label filter.
    pub labels: Vec<String>,
}

/// Place, city and report collections.
#[async_trait]
pub trait PlaceRepository: Send + Sync {
    /// Insert or replace a place by id.
    async fn save_place(&self, place: &Place) -> Result<(), AppError>;
    async fn get_place(&self, id: &str) -> Result<Option<Place>, AppError>;
    async fn get_place_by_name(&self, name: &str) -> Result<Option<Place>, AppError>;
    /// Fails with `NotFound` when no place has that id.
    async fn delete_place(&self, id: &str) -> Result<(), AppError>;
    async fn query_places(&self, query: &PlaceQuery) -> Result<Vec<Place>, AppError>;

    async fn save_city(&self, city: &City) -> Result<(), AppError>;
    async fn get_city(&self, name: &str) -> Result<Option<City>, AppError>;
    async fn list_cities(&self) -> Result<Vec<City>, AppError>;

    async fn save_report(&self, report: &Report) -> Result<(), AppError>;
    async fn list_reports(&self, place_id: &str) -> Result<Vec<Report>, AppError>;
}

/// Maps provider: coordinates from links, listing details, city centers.
#[async_trait]
pub trait LocationResolver: Send + Sync {
    /// Extract `@lat,lon` from a map link, following short links first.
    async fn resolve_link(&self, link: &str) -> Result<Coordinates, AppError>;
    /// Provider listing of the place called `name` at the link's coordinates.
    async fn place_info(&self, link: &str, name: &str) -> Result<Place, AppError>;
    async fn city_info(&self, name: &str) -> Result<City, AppError>;
}

/// Spreadsheet rows as place drafts.
#[async_trait]
pub trait SheetParser: Send + Sync {
    async fn places(&self, range: &str) -> Result<Vec<SheetPlace>, AppError>;
}

/// Private object storage holding place photos.
#[async_trait]
pub trait PhotoStorage: Send + Sync {
    /// Time-limited GET URL for one object.
    async fn sign_url(&self, object: &str) -> Result<String, AppError>;
    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>, AppError>;
}
