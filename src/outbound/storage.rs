//! Cloud Storage adapter using HMAC keys and V4 query signing.
//!
//! Every request, listings included, is a presigned `GET`; no OAuth flow is
//! involved.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::config::StorageConfig;
use crate::errors::AppError;
use crate::places::PhotoStorage;

const STORAGE_ENDPOINT: &str = "https://storage.googleapis.com";
const ALGORITHM: &str = "GOOG4-HMAC-SHA256";
/// Longest lifetime the service accepts for a V4 signature.
const MAX_EXPIRY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// RFC 3986 unreserved characters stay literal, everything else is `%XX`.
const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');
/// Object names keep their `/` separators.
const OBJECT_NAME: &AsciiSet = &UNRESERVED.remove(b'/');

type HmacSha256 = Hmac<Sha256>;

/// One page of an XML bucket listing.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListBucketResult {
    #[serde(default)]
    is_truncated: bool,
    next_marker: Option<String>,
    #[serde(default)]
    contents: Vec<ListedObject>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListedObject {
    key: String,
}

pub struct GcsStorage {
    client: reqwest::Client,
    bucket: String,
    access_id: String,
    secret: String,
    ttl: Duration,
    endpoint: url::Url,
}

impl GcsStorage {
    pub fn new(config: &StorageConfig) -> Result<Self, AppError> {
        Ok(Self {
            client: reqwest::Client::new(),
            bucket: config.bucket.clone(),
            access_id: config.access_id.clone(),
            secret: config.secret.clone(),
            ttl: config.signed_url_ttl.min(MAX_EXPIRY),
            endpoint: parse_endpoint(STORAGE_ENDPOINT)?,
        })
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Result<Self, AppError> {
        self.endpoint = parse_endpoint(endpoint)?;
        Ok(self)
    }

    /// Presigned `GET` of `path` (already `/bucket[/object]`) at `now`.
    fn presign(
        &self,
        path: &str,
        extra_query: &[(&str, &str)],
        now: DateTime<Utc>,
    ) -> Result<String, AppError> {
        let datestamp = now.format("%Y%m%d").to_string();
        let timestamp = now.format("%Y%m%dT%H%M%SZ").to_string();
        let scope = format!("{}/auto/storage/goog4_request", datestamp);
        let credential = format!("{}/{}", self.access_id, scope);
        let expires = self.ttl.as_secs().to_string();

        let mut query: Vec<(&str, &str)> = vec![
            ("X-Goog-Algorithm", ALGORITHM),
            ("X-Goog-Credential", credential.as_str()),
            ("X-Goog-Date", timestamp.as_str()),
            ("X-Goog-Expires", expires.as_str()),
            ("X-Goog-SignedHeaders", "host"),
        ];
        query.extend_from_slice(extra_query);
        query.sort();
        let canonical_query = query
            .iter()
            .map(|(k, v)| format!("{}={}", encode(k, UNRESERVED), encode(v, UNRESERVED)))
            .collect::<Vec<_>>()
            .join("&");

        let host = host_header(&self.endpoint);
        let canonical_request = format!(
            "GET\n{}\n{}\nhost:{}\n\nhost\nUNSIGNED-PAYLOAD",
            path, canonical_query, host
        );
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            ALGORITHM,
            timestamp,
            scope,
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let mut key = hmac(format!("GOOG4{}", self.secret).as_bytes(), datestamp.as_bytes())?;
        for part in ["auto", "storage", "goog4_request"] {
            key = hmac(&key, part.as_bytes())?;
        }
        let signature = hex::encode(hmac(&key, string_to_sign.as_bytes())?);

        let origin = self.endpoint.as_str().trim_end_matches('/');
        Ok(format!(
            "{}{}?{}&X-Goog-Signature={}",
            origin, path, canonical_query, signature
        ))
    }

    fn object_path(&self, object: &str) -> String {
        format!(
            "/{}/{}",
            encode(&self.bucket, UNRESERVED),
            encode(object, OBJECT_NAME)
        )
    }
}

#[async_trait]
impl PhotoStorage for GcsStorage {
    async fn sign_url(&self, object: &str) -> Result<String, AppError> {
        self.presign(&self.object_path(object), &[], Utc::now())
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>, AppError> {
        let path = format!("/{}", encode(&self.bucket, UNRESERVED));
        let mut keys = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let mut query = vec![("prefix", prefix)];
            if let Some(marker) = marker.as_deref() {
                query.push(("marker", marker));
            }
            let url = self.presign(&path, &query, Utc::now())?;

            let body = self
                .client
                .get(url)
                .send()
                .await?
                .error_for_status()?
                .text()
                .await?;

            let page: ListBucketResult = quick_xml::de::from_str(&body)
                .map_err(|e| AppError::Internal(format!("Malformed bucket listing: {}", e)))?;
            keys.extend(page.contents.into_iter().map(|object| object.key));

            match page.next_marker {
                Some(next) if page.is_truncated => marker = Some(next),
                _ => break,
            }
        }

        Ok(keys)
    }
}

fn parse_endpoint(endpoint: &str) -> Result<url::Url, AppError> {
    url::Url::parse(endpoint)
        .map_err(|e| AppError::Internal(format!("Invalid storage endpoint {}: {}", endpoint, e)))
}

fn host_header(endpoint: &url::Url) -> String {
    let host = endpoint.host_str().unwrap_or_default();
    match endpoint.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

fn hmac(key: &[u8], data: &[u8]) -> Result<Vec<u8>, AppError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| AppError::Internal(format!("Invalid HMAC key: {}", e)))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn encode(value: &str, set: &'static AsciiSet) -> String {
    utf8_percent_encode(value, set).to_string()
}
