use std::sync::Arc;

use chrono::{Local, Utc};
use futures::stream::{self, StreamExt};

use super::{is_open_at, LocationResolver, PhotoStorage, PlaceArea, PlaceQuery, PlaceRepository};
use crate::errors::AppError;
use crate::geo::{self, BoundingBox};
use crate::models::{
    City, Coordinates, CreatePlaceRequest, GetPlacesRequest, Place, Report, UpdatePlaceRequest,
};
use crate::purchases::PurchasesUsecase;

/// Entries returned to the Telegram client per listing.
pub const TELEGRAM_PAGE_SIZE: usize = 5;

pub struct PlacesUsecase {
    repo: Arc<dyn PlaceRepository>,
    resolver: Arc<dyn LocationResolver>,
    storage: Arc<dyn PhotoStorage>,
    purchases: Arc<PurchasesUsecase>,
    signing_concurrency: usize,
}

impl PlacesUsecase {
    pub fn new(
        repo: Arc<dyn PlaceRepository>,
        resolver: Arc<dyn LocationResolver>,
        storage: Arc<dyn PhotoStorage>,
        purchases: Arc<PurchasesUsecase>,
        signing_concurrency: usize,
    ) -> Self {
        Self {
            repo,
            resolver,
            storage,
            purchases,
            signing_concurrency: signing_concurrency.max(1),
        }
    }

    // ==================== PLACE OPERATIONS ====================

    pub async fn create_place(&self, request: &CreatePlaceRequest) -> Result<Place, AppError> {
        if request.name.trim().is_empty() {
            return Err(AppError::BadRequest("Name is required".to_string()));
        }

        let coordinates = self.resolve_coordinates(&request.location_url).await?;
        let place = Place {
            id: uuid::Uuid::new_v4().to_string(),
            name: request.name.trim().to_string(),
            description: request.description.clone(),
            location_url: request.location_url.clone(),
            coordinates,
            city: request.city.trim().to_lowercase(),
            category: request.category.clone(),
            website: request.website.clone(),
            instagram: request.instagram.clone(),
            labels: request.labels.clone(),
            address: request.address.clone(),
            geohash: geo::encode(coordinates)?,
            ..Place::default()
        };

        self.repo.save_place(&place).await?;
        tracing::info!(place_id = %place.id, "Place created");
        Ok(place)
    }

    /// Load a place with signed photo URLs and its open-now flag.
    pub async fn get_place(&self, id: &str) -> Result<Place, AppError> {
        let place = self.find_place(id).await?;
        let mut places = vec![place];
        self.decorate(&mut places).await;
        Ok(places.remove(0))
    }

    /// List places by city or bounding box, behind the category purchase gate.
    ///
    /// `buyer` is the key of the caller's purchase record.
    pub async fn get_places(
        &self,
        request: &GetPlacesRequest,
        buyer: &str,
    ) -> Result<Vec<Place>, AppError> {
        let area = if request.city.trim().is_empty() {
            let (low, high) = BoundingBox::around(
                request.center,
                request.latitude_delta,
                request.longitude_delta,
            )
            .geohash_range()?;
            PlaceArea::Geohash { low, high }
        } else {
            PlaceArea::City(request.city.trim().to_lowercase())
        };

        let query = PlaceQuery {
            area,
            category: Some(request.category.clone()).filter(|c| !c.is_empty()),
            labels: request.labels.clone(),
        };

        let mut places = self.repo.query_places(&query).await?;
        if places.is_empty() {
            return Err(AppError::NotFound("Places not found".to_string()));
        }

        self.check_purchase(request, &places, buyer).await?;
        self.decorate(&mut places).await;
        Ok(places)
    }

    /// [`Self::get_places`] capped to [`TELEGRAM_PAGE_SIZE`] entries.
    pub async fn telegram_get_places(
        &self,
        request: &GetPlacesRequest,
        buyer: &str,
    ) -> Result<Vec<Place>, AppError> {
        let mut places = self.get_places(request, buyer).await?;
        places.truncate(TELEGRAM_PAGE_SIZE);
        Ok(places)
    }

    /// Apply the non-empty fields of `request`. A new location is resolved again.
    pub async fn update_place(&self, request: &UpdatePlaceRequest) -> Result<Place, AppError> {
        let mut place = self.find_place(&request.id).await?;

        let location = request.location_url.trim();
        if !location.is_empty() && location != place.location_url {
            place.coordinates = self.resolve_coordinates(location).await?;
            place.location_url = location.to_string();
        }

        override_non_empty(&mut place.name, &request.name);
        override_non_empty(&mut place.description, &request.description);
        override_non_empty(&mut place.city, &request.city.to_lowercase());
        override_non_empty(&mut place.category, &request.category);
        override_non_empty(&mut place.website, &request.website);
        override_non_empty(&mut place.instagram, &request.instagram);
        override_non_empty(&mut place.address, &request.address);
        if !request.labels.is_empty() {
            place.labels = request.labels.clone();
        }
        place.geohash = geo::encode(place.coordinates)?;

        self.repo.save_place(&place).await?;
        Ok(place)
    }

    pub async fn delete_place(&self, id: &str) -> Result<(), AppError> {
        self.repo.delete_place(id).await?;
        tracing::info!(place_id = %id, "Place deleted");
        Ok(())
    }

    /// Signed URLs of every object stored under `places/<id>/`.
    ///
    /// An object that fails to sign yields an empty entry.
    pub async fn photo_urls(&self, id: &str) -> Result<Vec<String>, AppError> {
        self.find_place(id).await?;

        let objects = self.storage.list_objects(&format!("places/{}/", id)).await?;
        let storage = &self.storage;
        Ok(stream::iter(objects)
            .map(|object| async move {
                storage.sign_url(&object).await.unwrap_or_else(|e| {
                    tracing::warn!(place_id = %id, object = %object, "Failed to sign photo: {}", e);
                    String::new()
                })
            })
            .buffered(self.signing_concurrency)
            .collect()
            .await)
    }

    // ==================== REPORT OPERATIONS ====================

    pub async fn create_report(
        &self,
        place_id: &str,
        reporter: &str,
        description: &str,
    ) -> Result<Report, AppError> {
        if description.trim().is_empty() {
            return Err(AppError::BadRequest("Description is required".to_string()));
        }
        self.find_place(place_id).await?;

        let report = Report::new(place_id, reporter, description.trim(), Utc::now().timestamp());
        self.repo.save_report(&report).await?;
        Ok(report)
    }

    pub async fn get_reports(&self, place_id: &str) -> Result<Vec<Report>, AppError> {
        self.find_place(place_id).await?;
        self.repo.list_reports(place_id).await
    }

    // ==================== CITY OPERATIONS ====================

    pub async fn list_cities(&self) -> Result<Vec<City>, AppError> {
        self.repo.list_cities().await
    }

    // ==================== HELPERS ====================

    async fn find_place(&self, id: &str) -> Result<Place, AppError> {
        self.repo
            .get_place(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Place {} not found", id)))
    }

    async fn resolve_coordinates(&self, link: &str) -> Result<Coordinates, AppError> {
        if link.trim().is_empty() {
            return Err(AppError::BadRequest("Location is required".to_string()));
        }
        self.resolver.resolve_link(link.trim()).await.map_err(|e| {
            AppError::BadRequest(format!("Failed to resolve coordinates: {}", e.message()))
        })
    }

    /// Forbid the listing when its category needs a purchase the buyer lacks.
    async fn check_purchase(
        &self,
        request: &GetPlacesRequest,
        places: &[Place],
        buyer: &str,
    ) -> Result<(), AppError> {
        if request.category.is_empty() {
            return Ok(());
        }

        // A box query has no city of its own; use the one of its first hit
        let city_name = match request.city.trim() {
            "" => match places.first() {
                Some(place) => place.city.clone(),
                None => return Ok(()),
            },
            city => city.to_lowercase(),
        };

        let Some(city) = self.repo.get_city(&city_name).await? else {
            return Ok(());
        };
        let Some(category) = city.category(&request.category) else {
            return Ok(());
        };
        if !category.needs_purchase {
            return Ok(());
        }

        let product_id = category.product_id.as_deref().ok_or_else(|| {
            AppError::Internal(format!(
                "Category {} of {} needs a purchase but has no product",
                category.name, city.name
            ))
        })?;

        if self.purchases.has_purchase(buyer, product_id).await? {
            return Ok(());
        }

        let link = self.purchases.payment_link(product_id, buyer).await?;
        Err(AppError::Forbidden(format!(
            "Category {} requires a purchase: {}",
            category.name, link
        )))
    }

    /// Sign photo references and compute open-now flags in place.
    ///
    /// Signatures run as one bounded stream inside the caller's future, so a
    /// dropped request stops issuing them. A failed signature leaves that
    /// reference unsigned.
    async fn decorate(&self, places: &mut [Place]) {
        let jobs: Vec<(usize, usize, String)> = places
            .iter()
            .enumerate()
            .flat_map(|(p, place)| {
                place
                    .photo_refs()
                    .iter()
                    .enumerate()
                    .map(move |(i, reference)| (p, i, reference.clone()))
            })
            .collect();

        let storage = &self.storage;
        let signed: Vec<_> = stream::iter(jobs)
            .map(|(p, i, reference)| async move {
                let result = storage.sign_url(&reference).await;
                (p, i, reference, result)
            })
            .buffered(self.signing_concurrency)
            .collect()
            .await;

        for (p, i, reference, result) in signed {
            let place = &mut places[p];
            match result {
                Ok(url) => {
                    if place.preview_image_url.is_none() {
                        place.preview_image_url = Some(url.clone());
                    }
                    if let Some(info) = place.map_info.as_mut() {
                        info.photo_refs[i] = url;
                    }
                }
                Err(e) => {
                    tracing::warn!(place_id = %place.id, reference = %reference, "Failed to sign photo: {}", e);
                }
            }
        }

        let now = Local::now().naive_local();
        for place in places.iter_mut() {
            place.is_open = place
                .map_info
                .as_ref()
                .and_then(|info| is_open_at(&info.opening_info, now));
        }
    }
}

fn override_non_empty(target: &mut String, value: &str) {
    let value = value.trim();
    if !value.is_empty() {
        *target = value.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, MapInfo, PurchaseCallback};
    use crate::purchases::sign_callback;
    use crate::test_support::{
        FakePayments, FakeResolver, FakeStorage, MemoryPlaces, MemoryPurchases,
    };

    struct Harness {
        usecase: PlacesUsecase,
        repo: Arc<MemoryPlaces>,
        purchases: Arc<PurchasesUsecase>,
        storage: Arc<FakeStorage>,
    }

    fn harness() -> Harness {
        let repo = Arc::new(MemoryPlaces::default());
        let storage = Arc::new(FakeStorage::default());
        let purchases = Arc::new(PurchasesUsecase::new(
            Arc::new(MemoryPurchases::default()),
            Arc::new(FakePayments::with_product("prod_food", "price_food", 900)),
            "key".to_string(),
            "https://favs.example.com".to_string(),
        ));
        let usecase = PlacesUsecase::new(
            repo.clone(),
            Arc::new(FakeResolver::default()),
            storage.clone(),
            purchases.clone(),
            2,
        );
        Harness {
            usecase,
            repo,
            purchases,
            storage,
        }
    }

    fn place(id: &str, latitude: f64, longitude: f64, labels: &[&str]) -> Place {
        let coordinates = Coordinates {
            latitude,
            longitude,
        };
        Place {
            id: id.to_string(),
            name: id.to_string(),
            coordinates,
            city: "new york".to_string(),
            category: "food".to_string(),
            labels: labels.iter().map(|l| l.to_string()).collect(),
            geohash: geo::encode(coordinates).unwrap(),
            ..Place::default()
        }
    }

    fn box_request(labels: &[&str]) -> GetPlacesRequest {
        GetPlacesRequest {
            center: Coordinates {
                latitude: 40.0,
                longitude: -73.0,
            },
            latitude_delta: 0.1,
            longitude_delta: 0.1,
            labels: labels.iter().map(|l| l.to_string()).collect(),
            ..GetPlacesRequest::default()
        }
    }

    async fn gated_city(repo: &MemoryPlaces) {
        repo.save_city(&City {
            name: "new york".to_string(),
            categories: vec![Category {
                name: "food".to_string(),
                labels: vec!["coffee".to_string()],
                needs_purchase: true,
                product_id: Some("prod_food".to_string()),
            }],
            ..City::default()
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_bounding_box_with_labels() {
        let h = harness();
        h.repo.save_place(&place("near", 40.01, -73.01, &["coffee", "wifi"])).await.unwrap();
        h.repo.save_place(&place("far", 41.0, -73.0, &["coffee"])).await.unwrap();

        let found = h.usecase.get_places(&box_request(&["coffee"]), "a@b.c").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "near");
    }

    #[tokio::test]
    async fn test_empty_result_is_not_found() {
        let h = harness();
        h.repo.save_place(&place("near", 40.01, -73.01, &["coffee"])).await.unwrap();

        let err = h.usecase.get_places(&box_request(&["tea"]), "a@b.c").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_purchase_gate() {
        let h = harness();
        gated_city(&h.repo).await;
        h.repo.save_place(&place("near", 40.01, -73.01, &["coffee"])).await.unwrap();

        let request = GetPlacesRequest {
            city: "New York".to_string(),
            category: "food".to_string(),
            ..GetPlacesRequest::default()
        };

        match h.usecase.get_places(&request, "a@b.c").await {
            Err(AppError::Forbidden(message)) => assert!(message.contains("https://")),
            other => panic!("expected Forbidden, got {other:?}"),
        }

        h.purchases
            .record_purchase(&PurchaseCallback {
                id: "prod_food".to_string(),
                email: "a@b.c".to_string(),
                amount: 900,
                sig: sign_callback("key", "prod_food", "a@b.c", 900).unwrap(),
            })
            .await
            .unwrap();

        let found = h.usecase.get_places(&request, "a@b.c").await.unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_box_gate_uses_city_of_first_result() {
        let h = harness();
        gated_city(&h.repo).await;
        h.repo.save_place(&place("near", 40.01, -73.01, &["coffee"])).await.unwrap();

        let mut request = box_request(&[]);
        request.category = "food".to_string();
        assert!(matches!(
            h.usecase.get_places(&request, "a@b.c").await,
            Err(AppError::Forbidden(_))
        ));

        // Without a category the gate does not apply
        assert!(h.usecase.get_places(&box_request(&[]), "a@b.c").await.is_ok());
    }

    #[tokio::test]
    async fn test_telegram_listing_is_capped() {
        let h = harness();
        for i in 0..8 {
            let p = place(&format!("p{i}"), 40.0 + i as f64 * 0.001, -73.0, &["coffee"]);
            h.repo.save_place(&p).await.unwrap();
        }

        let found = h
            .usecase
            .telegram_get_places(&box_request(&["coffee"]), "telegram:1")
            .await
            .unwrap();
        assert_eq!(found.len(), TELEGRAM_PAGE_SIZE);
    }

    #[tokio::test]
    async fn test_photo_signing_is_best_effort() {
        let h = harness();
        h.storage.fail_on("places/near/broken.jpg");
        let mut p = place("near", 40.01, -73.01, &[]);
        p.map_info = Some(MapInfo {
            photo_refs: vec![
                "places/near/broken.jpg".to_string(),
                "places/near/front.jpg".to_string(),
            ],
            ..MapInfo::default()
        });
        h.repo.save_place(&p).await.unwrap();

        let loaded = h.usecase.get_place("near").await.unwrap();
        let refs = loaded.photo_refs();
        assert_eq!(refs[0], "places/near/broken.jpg");
        assert_eq!(refs[1], "https://signed.test/places/near/front.jpg");
        assert_eq!(
            loaded.preview_image_url.as_deref(),
            Some("https://signed.test/places/near/front.jpg")
        );
        assert!(loaded.is_open.is_none());
    }

    #[tokio::test]
    async fn test_create_place_derives_geohash() {
        let h = harness();
        let created = h
            .usecase
            .create_place(&CreatePlaceRequest {
                name: "Cafe".to_string(),
                location_url: "https://www.google.com/maps/place/Cafe/@40.01,-73.01,17z".to_string(),
                city: "New York".to_string(),
                ..CreatePlaceRequest::default()
            })
            .await
            .unwrap();

        assert_eq!(created.city, "new york");
        assert_eq!(created.geohash, geo::encode(created.coordinates).unwrap());
        assert_eq!(created.geohash, "drh5deeepsw4");

        let err = h
            .usecase
            .create_place(&CreatePlaceRequest {
                name: "Nowhere".to_string(),
                location_url: "https://example.com/no-coordinates".to_string(),
                ..CreatePlaceRequest::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_update_place_moves_geohash() {
        let h = harness();
        h.repo.save_place(&place("near", 40.01, -73.01, &[])).await.unwrap();

        let updated = h
            .usecase
            .update_place(&UpdatePlaceRequest {
                id: "near".to_string(),
                description: "moved".to_string(),
                location_url: "https://www.google.com/maps/@41.0,-73.0,17z".to_string(),
                ..UpdatePlaceRequest::default()
            })
            .await
            .unwrap();

        assert_eq!(updated.name, "near");
        assert_eq!(updated.description, "moved");
        assert_eq!(updated.geohash, "drk14zg429yy");
    }

    #[tokio::test]
    async fn test_reports_need_existing_place() {
        let h = harness();
        assert!(matches!(
            h.usecase.create_report("missing", "a@b.c", "closed").await,
            Err(AppError::NotFound(_))
        ));

        h.repo.save_place(&place("near", 40.01, -73.01, &[])).await.unwrap();
        let report = h.usecase.create_report("near", "a@b.c", "closed").await.unwrap();
        assert!(report.id.starts_with("a@b.c-ts-"));
        assert_eq!(h.usecase.get_reports("near").await.unwrap(), vec![report]);
    }

    #[tokio::test]
    async fn test_photo_urls_lists_place_prefix() {
        let h = harness();
        h.repo.save_place(&place("near", 40.01, -73.01, &[])).await.unwrap();
        h.storage.put("places/near/1.jpg");
        h.storage.put("places/near/2.jpg");
        h.storage.put("places/far/1.jpg");

        let urls = h.usecase.photo_urls("near").await.unwrap();
        assert_eq!(
            urls,
            vec![
                "https://signed.test/places/near/1.jpg",
                "https://signed.test/places/near/2.jpg",
            ]
        );
    }
}
