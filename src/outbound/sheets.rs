//! Google Sheets reader for the place import.

use async_trait::async_trait;
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::SheetPlace;
use crate::places::SheetParser;

const SHEETS_API_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";

pub struct GoogleSheetsParser {
    client: reqwest::Client,
    sheet_id: String,
    api_key: String,
    base_url: String,
}

impl GoogleSheetsParser {
    pub fn new(sheet_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            sheet_id: sheet_id.into(),
            api_key: api_key.into(),
            base_url: SHEETS_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

#[async_trait]
impl SheetParser for GoogleSheetsParser {
    async fn places(&self, range: &str) -> Result<Vec<SheetPlace>, AppError> {
        let mut url = url::Url::parse(&self.base_url)
            .map_err(|e| AppError::Internal(format!("Invalid sheets URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| AppError::Internal("Invalid sheets URL".to_string()))?
            .extend([self.sheet_id.as_str(), "values", range]);

        let response: ValueRange = self
            .client
            .get(url)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        tracing::debug!(range = %range, rows = response.values.len(), "Read sheet range");
        Ok(response.values.iter().map(|row| parse_row(row)).collect())
    }
}

/// Columns: name, labels (`/`-separated), location URL, description,
/// instagram, website, category.
fn parse_row(row: &[serde_json::Value]) -> SheetPlace {
    let cell = |i: usize| -> String {
        match row.get(i) {
            Some(serde_json::Value::String(s)) => s.trim().to_string(),
            Some(serde_json::Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    };

    let labels = cell(1)
        .split('/')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();

    SheetPlace {
        name: cell(0),
        labels,
        location_url: cell(2),
        description: cell(3),
        instagram: cell(4),
        website: cell(5),
        category: cell(6),
    }
}
