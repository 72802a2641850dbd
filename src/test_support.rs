//! In-memory implementations of the storage and provider traits for tests.

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::{extract::Query, routing::get, Json, Router};
use uuid::Uuid;

use crate::auth::{ActivationCodeStore, MailTemplate, Mailer, UserRepository};
use crate::errors::AppError;
use crate::models::{City, Coordinates, Place, Report, SheetPlace, User, UserPurchases};
use crate::outbound::coordinates_from_link;
use crate::places::{
    LocationResolver, PhotoStorage, PlaceArea, PlaceQuery, PlaceRepository, SheetParser,
};
use crate::purchases::{PaymentConnector, Product, PurchaseRepository};

// ==================== STORAGE ====================

#[derive(Default)]
pub struct MemoryPlaces {
    places: Mutex<HashMap<String, Place>>,
    cities: Mutex<HashMap<String, City>>,
    reports: Mutex<Vec<Report>>,
}

#[async_trait]
impl PlaceRepository for MemoryPlaces {
    async fn save_place(&self, place: &Place) -> Result<(), AppError> {
        let mut stored = place.clone().without_transient();
        stored.city = stored.city.to_lowercase();
        self.places.lock().unwrap().insert(place.id.clone(), stored);
        Ok(())
    }

    async fn get_place(&self, id: &str) -> Result<Option<Place>, AppError> {
        Ok(self.places.lock().unwrap().get(id).cloned())
    }

    async fn get_place_by_name(&self, name: &str) -> Result<Option<Place>, AppError> {
        Ok(self
            .places
            .lock()
            .unwrap()
            .values()
            .find(|p| p.name == name)
            .cloned())
    }

    async fn delete_place(&self, id: &str) -> Result<(), AppError> {
        self.places
            .lock()
            .unwrap()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("Place {} not found", id)))
    }

    async fn query_places(&self, query: &PlaceQuery) -> Result<Vec<Place>, AppError> {
        let mut found: Vec<Place> = self
            .places
            .lock()
            .unwrap()
            .values()
            .filter(|p| match &query.area {
                PlaceArea::City(city) => p.city == city.to_lowercase(),
                PlaceArea::Geohash { low, high } => {
                    p.geohash.as_str() >= low.as_str() && p.geohash.as_str() <= high.as_str()
                }
            })
            .filter(|p| query.category.as_ref().map_or(true, |c| &p.category == c))
            .filter(|p| query.labels.is_empty() || p.labels.iter().any(|l| query.labels.contains(l)))
            .cloned()
            .collect();

        match query.area {
            PlaceArea::City(_) => found.sort_by(|a, b| a.name.cmp(&b.name)),
            PlaceArea::Geohash { .. } => found.sort_by(|a, b| a.geohash.cmp(&b.geohash)),
        }
        Ok(found)
    }

    async fn save_city(&self, city: &City) -> Result<(), AppError> {
        self.cities
            .lock()
            .unwrap()
            .insert(city.name.to_lowercase(), city.clone());
        Ok(())
    }

    async fn get_city(&self, name: &str) -> Result<Option<City>, AppError> {
        Ok(self.cities.lock().unwrap().get(&name.to_lowercase()).cloned())
    }

    async fn list_cities(&self) -> Result<Vec<City>, AppError> {
        let mut cities: Vec<City> = self.cities.lock().unwrap().values().cloned().collect();
        cities.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(cities)
    }

    async fn save_report(&self, report: &Report) -> Result<(), AppError> {
        let mut reports = self.reports.lock().unwrap();
        reports.retain(|r| r.id != report.id);
        reports.push(report.clone());
        Ok(())
    }

    async fn list_reports(&self, place_id: &str) -> Result<Vec<Report>, AppError> {
        Ok(self
            .reports
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.place_id == place_id)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryPurchases {
    records: Mutex<HashMap<String, UserPurchases>>,
}

#[async_trait]
impl PurchaseRepository for MemoryPurchases {
    async fn get_purchases(&self, user_email: &str) -> Result<Option<UserPurchases>, AppError> {
        Ok(self.records.lock().unwrap().get(user_email).cloned())
    }

    async fn save_purchases(&self, purchases: &UserPurchases) -> Result<(), AppError> {
        self.records
            .lock()
            .unwrap()
            .insert(purchases.user_email.clone(), purchases.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryUsers {
    users: Mutex<HashMap<Uuid, User>>,
}

impl MemoryUsers {
    pub fn len(&self) -> usize {
        self.users.lock().unwrap().len()
    }
}

#[async_trait]
impl UserRepository for MemoryUsers {
    async fn create_user(&self, user: &User) -> Result<(), AppError> {
        let mut users = self.users.lock().unwrap();
        if users.values().any(|u| u.email == user.email) {
            return Err(AppError::AlreadyExists(format!(
                "User {} already exists",
                user.email
            )));
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.users.lock().unwrap().get(&id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn update_user(&self, user: &User) -> Result<(), AppError> {
        self.users.lock().unwrap().insert(user.id, user.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryCodes {
    codes: Mutex<HashMap<Uuid, (String, Instant)>>,
}

impl MemoryCodes {
    /// The live code of a user, ignoring expiry.
    pub fn code_for(&self, user_id: Uuid) -> Option<String> {
        self.codes
            .lock()
            .unwrap()
            .get(&user_id)
            .map(|(code, _)| code.clone())
    }
}

#[async_trait]
impl ActivationCodeStore for MemoryCodes {
    async fn put_code(&self, user_id: Uuid, code: &str, ttl: Duration) -> Result<(), AppError> {
        self.codes
            .lock()
            .unwrap()
            .insert(user_id, (code.to_string(), Instant::now() + ttl));
        Ok(())
    }

    async fn get_code(&self, user_id: Uuid) -> Result<Option<String>, AppError> {
        Ok(self
            .codes
            .lock()
            .unwrap()
            .get(&user_id)
            .filter(|(_, expires)| *expires > Instant::now())
            .map(|(code, _)| code.clone()))
    }

    async fn delete_code(&self, user_id: Uuid) -> Result<(), AppError> {
        self.codes.lock().unwrap().remove(&user_id);
        Ok(())
    }
}

// ==================== PROVIDERS ====================

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<(String, MailTemplate)>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<(String, MailTemplate)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, to: &str, template: &MailTemplate) -> Result<(), AppError> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), template.clone()));
        Ok(())
    }
}

/// Resolves coordinates from the link text only; no provider listing data.
#[derive(Default)]
pub struct FakeResolver;

#[async_trait]
impl LocationResolver for FakeResolver {
    async fn resolve_link(&self, link: &str) -> Result<Coordinates, AppError> {
        coordinates_from_link(link)
    }

    async fn place_info(&self, link: &str, name: &str) -> Result<Place, AppError> {
        Ok(Place {
            name: name.to_string(),
            location_url: link.to_string(),
            coordinates: coordinates_from_link(link)?,
            ..Place::default()
        })
    }

    async fn city_info(&self, name: &str) -> Result<City, AppError> {
        Ok(City {
            name: name.to_lowercase(),
            center: Coordinates {
                latitude: 40.0,
                longitude: -73.0,
            },
            ..City::default()
        })
    }
}

/// Google Maps web service stand-in. Text search answers `id-<query>`,
/// details carry one `<place_id>-photo` token.
pub async fn mock_maps_server() -> String {
    let app = Router::new()
        .route(
            "/place/textsearch/json",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                assert_eq!(q["radius"], "2");
                assert_eq!(q["key"], "test-key");
                Json(serde_json::json!({
                    "status": "OK",
                    "results": [{ "place_id": format!("id-{}", q["query"]) }]
                }))
            }),
        )
        .route(
            "/place/details/json",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                Json(serde_json::json!({
                    "status": "OK",
                    "result": {
                        "name": "Cafe",
                        "formatted_address": "1 Main St",
                        "url": "https://maps.google.com/?cid=1",
                        "rating": 4.5,
                        "reservable": true,
                        "geometry": { "location": { "lat": 40.011, "lng": -73.012 } },
                        "photos": [{ "photo_reference": format!("{}-photo", q["place_id"]) }],
                        "current_opening_hours": { "weekday_text": ["Monday: Closed"] }
                    }
                }))
            }),
        )
        .route(
            "/geocode/json",
            get(|| async {
                Json(serde_json::json!({
                    "status": "OK",
                    "results": [{ "geometry": { "location": { "lat": 34.68, "lng": 33.04 } } }]
                }))
            }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    format!("http://{}", addr)
}

pub struct FakeSheets {
    rows: Vec<SheetPlace>,
}

impl FakeSheets {
    pub fn new(rows: Vec<SheetPlace>) -> Self {
        Self { rows }
    }
}

#[async_trait]
impl SheetParser for FakeSheets {
    async fn places(&self, _range: &str) -> Result<Vec<SheetPlace>, AppError> {
        Ok(self.rows.clone())
    }
}

/// Signs every object as `https://signed.test/<object>` unless told to fail.
#[derive(Default)]
pub struct FakeStorage {
    objects: Mutex<BTreeSet<String>>,
    failing: Mutex<BTreeSet<String>>,
}

impl FakeStorage {
    pub fn put(&self, object: &str) {
        self.objects.lock().unwrap().insert(object.to_string());
    }

    pub fn fail_on(&self, object: &str) {
        self.failing.lock().unwrap().insert(object.to_string());
    }
}

#[async_trait]
impl PhotoStorage for FakeStorage {
    async fn sign_url(&self, object: &str) -> Result<String, AppError> {
        if self.failing.lock().unwrap().contains(object) {
            return Err(AppError::Internal(format!("cannot sign {}", object)));
        }
        Ok(format!("https://signed.test/{}", object))
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>, AppError> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|o| o.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct FakePayments {
    products: HashMap<String, Product>,
    links: Mutex<Vec<(String, String)>>,
}

impl FakePayments {
    pub fn with_product(id: &str, price_id: &str, unit_amount: i64) -> Self {
        let product = Product {
            id: id.to_string(),
            price_id: price_id.to_string(),
            unit_amount,
        };
        Self {
            products: HashMap::from([(id.to_string(), product)]),
            links: Mutex::default(),
        }
    }

    /// `(price_id, redirect_url)` of the most recent link.
    pub fn last_link(&self) -> Option<(String, String)> {
        self.links.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl PaymentConnector for FakePayments {
    async fn product(&self, id: &str) -> Result<Product, AppError> {
        self.products
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Product {} not found", id)))
    }

    async fn create_payment_link(
        &self,
        price_id: &str,
        redirect_url: &str,
    ) -> Result<String, AppError> {
        self.links
            .lock()
            .unwrap()
            .push((price_id.to_string(), redirect_url.to_string()));
        Ok(format!("https://pay.test/{}", price_id))
    }
}
