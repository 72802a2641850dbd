//! Configuration module for the favs backend.
//!
//! All configuration is read once from environment variables at startup and
//! shared read-only afterwards.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_TOKEN_TTL_SECS: u64 = 30 * 24 * 60 * 60;
const DEFAULT_SIGNED_URL_TTL_SECS: u64 = 60 * 60;
const DEFAULT_SIGNING_CONCURRENCY: usize = 8;
const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Startup configuration failure.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
    #[error("SMTP_HOST, SMTP_PORT, SMTP_USER, SMTP_PASSWORD and SMTP_SENDER must be set together")]
    PartialSmtp,
}

/// SMTP credentials.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub sender: String,
}

/// Object storage bucket and HMAC credentials.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub bucket: String,
    pub access_id: String,
    pub secret: String,
    pub signed_url_ttl: Duration,
}

/// Spreadsheet source for the importer.
#[derive(Debug, Clone)]
pub struct SheetsConfig {
    pub sheet_id: String,
    pub api_key: String,
}

/// One periodic import: a city and the sheet range holding its places.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportJob {
    pub city: String,
    pub range: String,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Path to the SQLite document store
    pub db_path: PathBuf,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit JSON log lines
    pub log_json: bool,
    /// HS256 key for access tokens and payment callbacks
    pub signing_key: String,
    pub token_ttl: Duration,
    /// Externally reachable base URL, used for payment redirects
    pub public_base_url: String,
    pub smtp: Option<SmtpConfig>,
    pub redis_url: Option<String>,
    pub maps_api_key: String,
    pub sheets: Option<SheetsConfig>,
    pub import_jobs: Vec<ImportJob>,
    pub import_interval: Option<Duration>,
    pub storage: StorageConfig,
    pub signing_concurrency: usize,
    pub stripe_secret_key: String,
    pub telegram_bot_token: Option<String>,
    pub shutdown_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let require = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let port = parse_or(get("PORT"), "PORT", DEFAULT_PORT)?;
        let bind_addr = SocketAddr::from(([0, 0, 0, 0], port));

        let db_path = get("FAVS_DB_PATH")
            .unwrap_or_else(|| "./data/favs.sqlite".to_string())
            .into();

        let log_level = get("LOG_LEVEL").unwrap_or_else(|| "info".to_string());
        let log_json = get("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json"));

        let smtp_vars = [
            get("SMTP_HOST"),
            get("SMTP_PORT"),
            get("SMTP_USER"),
            get("SMTP_PASSWORD"),
            get("SMTP_SENDER"),
        ];
        let smtp = match smtp_vars {
            [Some(host), Some(port), Some(user), Some(password), Some(sender)] => {
                Some(SmtpConfig {
                    host,
                    port: parse_value(&port, "SMTP_PORT")?,
                    user,
                    password,
                    sender,
                })
            }
            [None, None, None, None, None] => None,
            _ => return Err(ConfigError::PartialSmtp),
        };

        let sheets = match (get("SHEET_ID"), get("SHEETS_API_KEY")) {
            (Some(sheet_id), Some(api_key)) => Some(SheetsConfig { sheet_id, api_key }),
            _ => None,
        };

        let import_jobs = get("IMPORT_JOBS")
            .map(|raw| parse_import_jobs(&raw))
            .transpose()?
            .unwrap_or_default();
        let import_interval = match parse_or(get("IMPORT_INTERVAL_SECS"), "IMPORT_INTERVAL_SECS", 0u64)? {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        let storage = StorageConfig {
            bucket: require("STORAGE_BUCKET")?,
            access_id: require("STORAGE_ACCESS_ID")?,
            secret: require("STORAGE_SECRET")?,
            signed_url_ttl: Duration::from_secs(parse_or(
                get("SIGNED_URL_TTL_SECS"),
                "SIGNED_URL_TTL_SECS",
                DEFAULT_SIGNED_URL_TTL_SECS,
            )?),
        };

        let signing_concurrency = parse_or(
            get("SIGNING_CONCURRENCY"),
            "SIGNING_CONCURRENCY",
            DEFAULT_SIGNING_CONCURRENCY,
        )?
        .max(1);

        Ok(Self {
            bind_addr,
            db_path,
            log_level,
            log_json,
            signing_key: require("SIGNING_KEY")?,
            token_ttl: Duration::from_secs(parse_or(
                get("TOKEN_TTL_SECS"),
                "TOKEN_TTL_SECS",
                DEFAULT_TOKEN_TTL_SECS,
            )?),
            public_base_url: require("PUBLIC_BASE_URL")?.trim_end_matches('/').to_string(),
            smtp,
            redis_url: get("REDIS_URL"),
            maps_api_key: require("MAPS_API_KEY")?,
            sheets,
            import_jobs,
            import_interval,
            storage,
            signing_concurrency,
            stripe_secret_key: require("STRIPE_SECRET_KEY")?,
            telegram_bot_token: get("TELEGRAM_BOT_TOKEN"),
            shutdown_timeout: Duration::from_secs(parse_or(
                get("SHUTDOWN_TIMEOUT_SECS"),
                "SHUTDOWN_TIMEOUT_SECS",
                DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            )?),
        })
    }
}

fn parse_value<T>(raw: &str, name: &'static str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })
}

fn parse_or<T>(raw: Option<String>, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.map_or(Ok(default), |v| parse_value(&v, name))
}

/// Parse `city=range;city=range`.
fn parse_import_jobs(raw: &str) -> Result<Vec<ImportJob>, ConfigError> {
    raw.split(';')
        .map(str::trim)
        .filter(|job| !job.is_empty())
        .map(|job| {
            let (city, range) = job.split_once('=').ok_or_else(|| ConfigError::Invalid {
                name: "IMPORT_JOBS",
                reason: format!("expected city=range, got {job:?}"),
            })?;
            Ok(ImportJob {
                city: city.trim().to_lowercase(),
                range: range.trim().to_string(),
            })
        })
        .collect()
}
