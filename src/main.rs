//! Favs Backend
//!
//! REST backend for a places directory: accounts, geohash listings,
//! purchase-gated categories, signed photo URLs and a spreadsheet import.

mod api;
mod auth;
mod config;
mod db;
mod errors;
mod geo;
mod models;
mod outbound;
mod places;
mod purchases;

use std::future::IntoFuture;
use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use auth::{ActivationCodeStore, AuthUsecase, Mailer, TokenIssuer};
use config::Config;
use db::Repository;
use outbound::{
    GcsStorage, GoogleMapsResolver, GoogleSheetsParser, LogMailer, RedisActivationCodes,
    SmtpMailer, StripeConnector,
};
use places::{Importer, LocationResolver, PlacesUsecase};
use purchases::PurchasesUsecase;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub places: Arc<PlacesUsecase>,
    pub auth: Arc<AuthUsecase>,
    pub purchases: Arc<PurchasesUsecase>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(&config);

    tracing::info!("Starting Favs Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);

    // Document store
    let pool = db::init_database(&config.db_path).await?;
    let repo = Arc::new(Repository::new(pool));

    // Outbound adapters
    let mailer: Arc<dyn Mailer> = match &config.smtp {
        Some(smtp) => Arc::new(SmtpMailer::new(smtp)?),
        None => {
            tracing::warn!("SMTP is not configured. Mails are only logged!");
            Arc::new(LogMailer)
        }
    };

    let codes: Arc<dyn ActivationCodeStore> = match &config.redis_url {
        Some(url) => {
            let store = RedisActivationCodes::new(url)?;
            store.ping().await?;
            tracing::info!("Activation codes stored in Redis");
            Arc::new(store)
        }
        None => repo.clone(),
    };

    let resolver: Arc<dyn LocationResolver> =
        Arc::new(GoogleMapsResolver::new(config.maps_api_key.clone())?);
    let storage = Arc::new(GcsStorage::new(&config.storage)?);
    let payments = Arc::new(StripeConnector::new(config.stripe_secret_key.clone()));

    if config.telegram_bot_token.is_none() {
        tracing::warn!("No TELEGRAM_BOT_TOKEN configured. Telegram routes reject every call!");
    }

    // Usecases
    let purchases = Arc::new(PurchasesUsecase::new(
        repo.clone(),
        payments,
        config.signing_key.clone(),
        config.public_base_url.clone(),
    ));
    let places = Arc::new(PlacesUsecase::new(
        repo.clone(),
        resolver.clone(),
        storage.clone(),
        purchases.clone(),
        config.signing_concurrency,
    ));
    let auth = Arc::new(AuthUsecase::new(
        repo.clone(),
        codes,
        mailer,
        TokenIssuer::new(&config.signing_key, config.token_ttl),
    ));

    // Periodic import
    let importer = match (&config.sheets, config.import_interval) {
        (Some(sheets), Some(interval)) if !config.import_jobs.is_empty() => {
            let parser = Arc::new(GoogleSheetsParser::new(
                sheets.sheet_id.clone(),
                sheets.api_key.clone(),
            ));
            let importer = Arc::new(Importer::new(repo.clone(), resolver, parser, storage));
            tracing::info!(
                jobs = config.import_jobs.len(),
                "Import scheduled every {:?}",
                interval
            );
            Some(places::spawn_import_scheduler(
                importer,
                config.import_jobs.clone(),
                interval,
            ))
        }
        (None, _) if !config.import_jobs.is_empty() => {
            tracing::warn!("IMPORT_JOBS set without SHEET_ID/SHEETS_API_KEY. Import disabled!");
            None
        }
        _ => None,
    };

    // Create application state
    let state = AppState {
        places,
        auth,
        purchases,
        config: Arc::new(config.clone()),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let server = tokio::spawn(
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.changed().await;
            })
            .into_future(),
    );

    wait_for_shutdown_signal().await;
    tracing::info!("Shutdown signal received, draining connections");
    if let Some(importer) = importer {
        importer.abort();
    }
    let _ = shutdown_tx.send(true);

    match tokio::time::timeout(config.shutdown_timeout, server).await {
        Ok(Ok(Ok(()))) => tracing::info!("Server stopped"),
        Ok(Ok(Err(e))) => tracing::error!("Server failed: {}", e),
        Ok(Err(e)) => tracing::error!("Server task failed: {}", e),
        Err(_) => tracing::warn!(
            "Connections still open after {:?}, exiting",
            config.shutdown_timeout
        ),
    }

    Ok(())
}

fn init_tracing(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    if config.log_json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = tokio::signal::ctrl_c() => {}
                }
            }
            Err(e) => {
                tracing::warn!("Failed to register SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any);

    let auth_usecase = state.auth.clone();
    let bot_token = state.config.telegram_bot_token.clone();

    // Reachable without a session
    let public_routes = Router::new()
        .route("/auth/signup", post(api::sign_up))
        .route("/auth/login", post(api::login))
        .route("/auth/logout/token", post(api::logout_token))
        .route("/purchases/confirm", get(api::confirm_purchase))
        .route("/health", get(health_check));

    let user_routes = Router::new()
        .route("/auth/logout", post(api::logout))
        // Users
        .route("/user", put(api::update_user))
        .route("/user/me", get(api::get_me))
        .route("/user/activation", post(api::activate_user))
        .route("/user/{id}", get(api::get_user))
        // Places
        .route("/places", get(api::list_places))
        .route("/places", post(api::create_place))
        .route("/places", put(api::update_place))
        .route("/places/{id}", get(api::get_place))
        .route("/places/{id}", delete(api::delete_place))
        .route("/places/{id}/photos", get(api::place_photos))
        .route("/places/{id}/reports", get(api::list_reports))
        .route("/places/{id}/reports", post(api::create_report))
        // Cities
        .route("/cities", get(api::list_cities))
        // Purchases
        .route("/purchases/link", post(api::payment_link))
        .layer(middleware::from_fn(move |req, next| {
            auth::bearer_auth_layer(auth_usecase.clone(), req, next)
        }));

    let telegram_routes = Router::new()
        .route("/tg/places", get(api::tg_list_places))
        .route("/tg/places/{id}", get(api::tg_get_place))
        .route("/tg/cities", get(api::tg_list_cities))
        .layer(middleware::from_fn(move |req, next| {
            auth::telegram_auth_layer(bot_token.clone(), req, next)
        }));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest(
            "/api/v1",
            public_routes.merge(user_routes).merge(telegram_routes),
        )
        .merge(health_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod test_support;
