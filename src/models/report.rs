//! User reports about a place.

use serde::{Deserialize, Serialize};

/// A report filed against a place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// `<reporter>-ts-<unixSeconds>`
    pub id: String,
    pub place_id: String,
    pub reported_by: String,
    pub reported_at: i64,
    pub description: String,
}

impl Report {
    pub fn new(place_id: &str, reporter: &str, description: &str, reported_at: i64) -> Self {
        Self {
            id: format!("{reporter}-ts-{reported_at}"),
            place_id: place_id.to_string(),
            reported_by: reporter.to_string(),
            reported_at,
            description: description.to_string(),
        }
    }
}

/// Request body for `POST /places/{id}/reports`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateReportRequest {
    pub description: String,
}
