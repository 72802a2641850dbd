//! Spreadsheet import of cities and places.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::{LocationResolver, PhotoStorage, PlaceRepository, SheetParser};
use crate::config::ImportJob;
use crate::errors::AppError;
use crate::geo;
use crate::models::{City, MapInfo, Place, SheetPlace};

/// Outcome of one place import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub saved: usize,
    pub skipped: usize,
}

pub struct Importer {
    repo: Arc<dyn PlaceRepository>,
    resolver: Arc<dyn LocationResolver>,
    parser: Arc<dyn SheetParser>,
    storage: Arc<dyn PhotoStorage>,
}

impl Importer {
    pub fn new(
        repo: Arc<dyn PlaceRepository>,
        resolver: Arc<dyn LocationResolver>,
        parser: Arc<dyn SheetParser>,
        storage: Arc<dyn PhotoStorage>,
    ) -> Self {
        Self {
            repo,
            resolver,
            parser,
            storage,
        }
    }

    /// Build the category labels of `city` from the rows of `range`.
    ///
    /// An existing city keeps its center and purchase settings.
    pub async fn import_cities_from_sheet(&self, range: &str, city: &str) -> Result<City, AppError> {
        let name = city.trim().to_lowercase();
        let rows = self.parser.places(range).await?;

        let mut record = match self.repo.get_city(&name).await? {
            Some(existing) => existing,
            None => {
                let mut geocoded = self.resolver.city_info(&name).await?;
                geocoded.name = name.clone();
                geocoded
            }
        };

        for row in rows.iter().filter(|r| !r.category.is_empty()) {
            record.merge_category(&row.category, row.labels.iter().cloned());
        }
        record.image_url = format!("places/{}/city.jpg", name);

        self.repo.save_city(&record).await?;
        tracing::info!(city = %name, categories = record.categories.len(), "City imported");
        Ok(record)
    }

    /// Import the rows of `range` as places of `city`.
    ///
    /// Without `force`, a row whose name is already stored is skipped. With
    /// it, the stored place is overwritten under its existing id.
    pub async fn import_places_from_sheet(
        &self,
        range: &str,
        city: &str,
        force: bool,
    ) -> Result<ImportSummary, AppError> {
        let city = city.trim().to_lowercase();
        let rows = self.parser.places(range).await?;
        let mut summary = ImportSummary::default();

        for row in rows {
            if row.name.is_empty() {
                summary.skipped += 1;
                continue;
            }

            let existing = self.repo.get_place_by_name(&row.name).await?;
            if existing.is_some() && !force {
                tracing::debug!(name = %row.name, "Place already imported, skipping");
                summary.skipped += 1;
                continue;
            }

            let Some(mut place) = self.provider_place(&row).await else {
                summary.skipped += 1;
                continue;
            };
            apply_sheet_overrides(&mut place, &row);
            place.id = existing
                .map(|p| p.id)
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            place.city = city.clone();
            place.geohash = geo::encode(place.coordinates)?;
            self.attach_stored_photos(&mut place).await;

            self.repo.save_place(&place).await?;
            tracing::debug!(place_id = %place.id, name = %place.name, "Place imported");
            summary.saved += 1;
        }

        tracing::info!(
            city = %city,
            saved = summary.saved,
            skipped = summary.skipped,
            "Places imported"
        );
        Ok(summary)
    }

    /// Cities first, then places, never forcing.
    pub async fn run_job(&self, job: &ImportJob) -> Result<ImportSummary, AppError> {
        self.import_cities_from_sheet(&job.range, &job.city).await?;
        self.import_places_from_sheet(&job.range, &job.city, false)
            .await
    }

    /// Point `photo_refs` at the objects uploaded under `places/<id>/`.
    ///
    /// Provider photo tokens stay in `provider_photos`. A failed listing
    /// leaves the place without photos.
    async fn attach_stored_photos(&self, place: &mut Place) {
        let prefix = format!("places/{}/", place.id);
        let keys = match self.storage.list_objects(&prefix).await {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!(place_id = %place.id, "Failed to list place photos: {}", e);
                Vec::new()
            }
        };

        match place.map_info.as_mut() {
            Some(info) => info.photo_refs = keys,
            None if !keys.is_empty() => {
                place.map_info = Some(MapInfo {
                    photo_refs: keys,
                    ..MapInfo::default()
                })
            }
            None => {}
        }
    }

    /// Provider listing for the row, or a bare place at the link coordinates.
    async fn provider_place(&self, row: &SheetPlace) -> Option<Place> {
        match self.resolver.place_info(&row.location_url, &row.name).await {
            Ok(place) => Some(place),
            Err(e) => {
                tracing::warn!(name = %row.name, "Maps lookup failed, using link coordinates: {}", e);
                match self.resolver.resolve_link(&row.location_url).await {
                    Ok(coordinates) => Some(Place {
                        coordinates,
                        ..Place::default()
                    }),
                    Err(e) => {
                        tracing::error!(name = %row.name, "Skipping row without coordinates: {}", e);
                        None
                    }
                }
            }
        }
    }
}

fn apply_sheet_overrides(place: &mut Place, row: &SheetPlace) {
    let fields = [
        (&mut place.name, &row.name),
        (&mut place.location_url, &row.location_url),
        (&mut place.description, &row.description),
        (&mut place.instagram, &row.instagram),
        (&mut place.website, &row.website),
        (&mut place.category, &row.category),
    ];
    for (target, value) in fields {
        if !value.is_empty() {
            target.clone_from(value);
        }
    }
    if !row.labels.is_empty() {
        place.labels = row.labels.clone();
    }
}

/// Run every job on `interval`, starting immediately.
///
/// Each pass is its own task so that a panic ends only that pass.
pub fn spawn_import_scheduler(
    importer: Arc<Importer>,
    jobs: Vec<ImportJob>,
    interval: Duration,
) -> JoinHandle<()> {
    let jobs = Arc::new(jobs);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            let importer = importer.clone();
            let jobs = jobs.clone();
            let pass = tokio::spawn(async move {
                for job in jobs.iter() {
                    if let Err(e) = importer.run_job(job).await {
                        tracing::error!(city = %job.city, range = %job.range, "Import failed: {}", e);
                    }
                }
            });

            if let Err(e) = pass.await {
                if e.is_panic() {
                    tracing::error!("Import pass panicked: {}", e);
                } else {
                    tracing::warn!("Import pass cancelled: {}", e);
                }
            }
        }
    })
}
