//! Database repository for the document collections.
//!
//! Entities round-trip through their JSON `document`; projection columns are
//! written alongside on every save so the indexes stay in step.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::auth::{ActivationCodeStore, UserRepository};
use crate::errors::AppError;
use crate::models::{City, Place, Report, User, UserPurchases};
use crate::places::{PlaceArea, PlaceQuery, PlaceRepository};
use crate::purchases::PurchaseRepository;

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

// ==================== PLACE OPERATIONS ====================

#[async_trait]
impl PlaceRepository for Repository {
    async fn save_place(&self, place: &Place) -> Result<(), AppError> {
        let document = serde_json::to_string(&place.clone().without_transient())?;

        sqlx::query(
            r#"INSERT INTO places (id, name, city, category, geohash, document)
               VALUES (?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                   name = excluded.name,
                   city = excluded.city,
                   category = excluded.category,
                   geohash = excluded.geohash,
                   document = excluded.document"#,
        )
        .bind(&place.id)
        .bind(&place.name)
        .bind(place.city.to_lowercase())
        .bind(&place.category)
        .bind(&place.geohash)
        .bind(&document)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_place(&self, id: &str) -> Result<Option<Place>, AppError> {
        let row = sqlx::query("SELECT document FROM places WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(document_from_row).transpose()
    }

    async fn get_place_by_name(&self, name: &str) -> Result<Option<Place>, AppError> {
        let row = sqlx::query("SELECT document FROM places WHERE name = ? LIMIT 1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(document_from_row).transpose()
    }

    async fn delete_place(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM places WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Place {} not found", id)));
        }
        Ok(())
    }

    async fn query_places(&self, query: &PlaceQuery) -> Result<Vec<Place>, AppError> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT document FROM places WHERE ");

        match &query.area {
            PlaceArea::City(city) => {
                builder.push("city = ").push_bind(city.to_lowercase());
            }
            PlaceArea::Geohash { low, high } => {
                builder
                    .push("geohash >= ")
                    .push_bind(low.clone())
                    .push(" AND geohash <= ")
                    .push_bind(high.clone());
            }
        }

        if let Some(category) = &query.category {
            builder.push(" AND category = ").push_bind(category.clone());
        }

        if !query.labels.is_empty() {
            builder.push(
                " AND EXISTS (SELECT 1 FROM json_each(places.document, '$.labels') WHERE json_each.value IN (",
            );
            let mut values = builder.separated(", ");
            for label in &query.labels {
                values.push_bind(label.clone());
            }
            values.push_unseparated("))");
        }

        builder.push(match query.area {
            PlaceArea::City(_) => " ORDER BY name",
            PlaceArea::Geohash { .. } => " ORDER BY geohash",
        });

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(document_from_row).collect()
    }

    // ==================== CITY OPERATIONS ====================

    async fn save_city(&self, city: &City) -> Result<(), AppError> {
        let document = serde_json::to_string(city)?;

        sqlx::query(
            "INSERT INTO cities (name, document) VALUES (?, ?) ON CONFLICT(name) DO UPDATE SET document = excluded.document",
        )
        .bind(city.name.to_lowercase())
        .bind(&document)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_city(&self, name: &str) -> Result<Option<City>, AppError> {
        let row = sqlx::query("SELECT document FROM cities WHERE name = ?")
            .bind(name.to_lowercase())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(document_from_row).transpose()
    }

    async fn list_cities(&self) -> Result<Vec<City>, AppError> {
        let rows = sqlx::query("SELECT document FROM cities ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(document_from_row).collect()
    }

    // ==================== REPORT OPERATIONS ====================

    async fn save_report(&self, report: &Report) -> Result<(), AppError> {
        let document = serde_json::to_string(report)?;

        sqlx::query(
            "INSERT OR REPLACE INTO reports (id, place_id, reported_at, document) VALUES (?, ?, ?, ?)",
        )
        .bind(&report.id)
        .bind(&report.place_id)
        .bind(report.reported_at)
        .bind(&document)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_reports(&self, place_id: &str) -> Result<Vec<Report>, AppError> {
        let rows =
            sqlx::query("SELECT document FROM reports WHERE place_id = ? ORDER BY reported_at")
                .bind(place_id)
                .fetch_all(&self.pool)
                .await?;

        rows.iter().map(document_from_row).collect()
    }
}

// ==================== PURCHASE OPERATIONS ====================

#[async_trait]
impl PurchaseRepository for Repository {
    async fn get_purchases(&self, user_email: &str) -> Result<Option<UserPurchases>, AppError> {
        let row = sqlx::query("SELECT document FROM purchases WHERE user_email = ?")
            .bind(user_email)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(document_from_row).transpose()
    }

    async fn save_purchases(&self, purchases: &UserPurchases) -> Result<(), AppError> {
        let document = serde_json::to_string(purchases)?;

        sqlx::query(
            "INSERT INTO purchases (user_email, document) VALUES (?, ?) ON CONFLICT(user_email) DO UPDATE SET document = excluded.document",
        )
        .bind(&purchases.user_email)
        .bind(&document)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// ==================== USER OPERATIONS ====================

#[async_trait]
impl UserRepository for Repository {
    async fn create_user(&self, user: &User) -> Result<(), AppError> {
        let result = sqlx::query(
            "INSERT INTO users (id, email, password_hash, activated, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(user.id.to_string())
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.activated)
        .bind(user.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(
                AppError::AlreadyExists(format!("User {} already exists", user.email)),
            ),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let row = sqlx::query(
            "SELECT id, email, password_hash, activated, created_at FROM users WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query(
            "SELECT id, email, password_hash, activated, created_at FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn update_user(&self, user: &User) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE users SET password_hash = ?, activated = ? WHERE id = ?")
            .bind(&user.password_hash)
            .bind(user.activated)
            .bind(user.id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User {} not found", user.id)));
        }
        Ok(())
    }
}

// ==================== ACTIVATION CODE OPERATIONS ====================

#[async_trait]
impl ActivationCodeStore for Repository {
    async fn put_code(&self, user_id: Uuid, code: &str, ttl: Duration) -> Result<(), AppError> {
        let expires_at = Utc::now().timestamp() + ttl.as_secs() as i64;

        sqlx::query(
            "INSERT OR REPLACE INTO activation_codes (user_id, code, expires_at) VALUES (?, ?, ?)",
        )
        .bind(user_id.to_string())
        .bind(code)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_code(&self, user_id: Uuid) -> Result<Option<String>, AppError> {
        let row =
            sqlx::query("SELECT code FROM activation_codes WHERE user_id = ? AND expires_at > ?")
                .bind(user_id.to_string())
                .bind(Utc::now().timestamp())
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|row| row.get("code")))
    }

    async fn delete_code(&self, user_id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM activation_codes WHERE user_id = ?")
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// ==================== HELPER FUNCTIONS ====================

fn document_from_row<T: serde::de::DeserializeOwned>(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<T, AppError> {
    let document: String = row.try_get("document")?;
    Ok(serde_json::from_str(&document)?)
}

fn user_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<User, AppError> {
    let id: String = row.try_get("id")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;

    Ok(User {
        id: Uuid::parse_str(&id)
            .map_err(|e| AppError::Internal(format!("Corrupt user id {}: {}", id, e)))?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        activated: row.try_get("activated")?,
        created_at,
    })
}
