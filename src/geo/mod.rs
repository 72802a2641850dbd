//! Geohash helpers for bounding-box lookups.
//!
//! A box is queried as the lexicographic range between the geohashes of its
//! south-west and north-east corners. Nearby cells do not always share a
//! prefix, so the range can both include points outside the box and miss
//! points inside it near cell boundaries.

use crate::errors::AppError;
use crate::models::Coordinates;

/// Length of every stored geohash.
pub const GEOHASH_PRECISION: usize = 12;

/// Encode coordinates to a fixed-precision geohash.
pub fn encode(coordinates: Coordinates) -> Result<String, AppError> {
    geohash::encode(
        geohash::Coord {
            x: coordinates.longitude,
            y: coordinates.latitude,
        },
        GEOHASH_PRECISION,
    )
    .map_err(|e| AppError::BadRequest(format!("invalid coordinates: {}", e)))
}

/// A rectangle built from a center and per-axis deltas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub min_longitude: f64,
    pub max_longitude: f64,
}

impl BoundingBox {
    pub fn around(center: Coordinates, latitude_delta: f64, longitude_delta: f64) -> Self {
        let latitude_delta = latitude_delta.abs();
        let longitude_delta = longitude_delta.abs();
        Self {
            min_latitude: (center.latitude - latitude_delta).max(-90.0),
            max_latitude: (center.latitude + latitude_delta).min(90.0),
            min_longitude: (center.longitude - longitude_delta).max(-180.0),
            max_longitude: (center.longitude + longitude_delta).min(180.0),
        }
    }

    /// Inclusive `(low, high)` geohash range covering the box.
    pub fn geohash_range(&self) -> Result<(String, String), AppError> {
        let low = encode(Coordinates {
            latitude: self.min_latitude,
            longitude: self.min_longitude,
        })?;
        let high = encode(Coordinates {
            latitude: self.max_latitude,
            longitude: self.max_longitude,
        })?;
        Ok((low, high))
    }
}
