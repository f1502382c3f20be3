#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for parcel, zoning, and proposal lookups.
//!
//! Each endpoint mirrors one user action: property lookup, zoning lookup,
//! and proposal generation. Discovery results are cached per session (see
//! [`sessions`]); a client opens a session with `POST /api/sessions` and
//! passes its ID to the zoning and discovery endpoints.

mod error;
mod handlers;
pub mod sessions;

use std::path::PathBuf;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, error::InternalError, middleware, web};
use site_lookup_arcgis::{ClientConfig, GisClient, HttpGisClient};
use site_lookup_parcel::registry;
use site_lookup_parcel_models::config::KeywordConfig;
use site_lookup_proposal::catalog;
use site_lookup_proposal_models::Branding;

use crate::sessions::SessionStore;

/// Shared application state.
pub struct AppState {
    /// Outbound GIS client.
    pub client: Arc<dyn GisClient>,
    /// Discovery keyword table.
    pub keywords: KeywordConfig,
    /// Letterhead for generated proposals.
    pub branding: Branding,
    /// Open sessions and their discovery caches.
    pub sessions: SessionStore,
}

impl AppState {
    #[must_use]
    pub fn new(client: Arc<dyn GisClient>, keywords: KeywordConfig, branding: Branding) -> Self {
        Self {
            client,
            keywords,
            branding,
            sessions: SessionStore::new(),
        }
    }

    /// Builds state from the environment: HTTP client timeout, keyword
    /// file, branding file, and session TTL.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or a configured
    /// keyword or branding file cannot be loaded.
    pub fn from_env() -> std::io::Result<Self> {
        let client = HttpGisClient::new(ClientConfig::from_env()).map_err(std::io::Error::other)?;
        let keywords_path = std::env::var_os(registry::KEYWORDS_ENV).map(PathBuf::from);
        let keywords =
            registry::resolve_keywords(keywords_path.as_deref()).map_err(std::io::Error::other)?;
        let branding_path = std::env::var_os(catalog::BRANDING_ENV).map(PathBuf::from);
        let branding =
            catalog::resolve_branding(branding_path.as_deref()).map_err(std::io::Error::other)?;
        Ok(Self {
            sessions: SessionStore::from_env(),
            ..Self::new(Arc::new(client), keywords, branding)
        })
    }
}

/// Registers the `/api` routes and JSON error handlers for malformed
/// query strings and bodies.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::QueryConfig::default().error_handler(|err, _req| {
        let response = error::invalid_input(err.to_string());
        InternalError::from_response(err, response).into()
    }))
    .app_data(web::JsonConfig::default().error_handler(|err, _req| {
        let response = error::invalid_input(err.to_string());
        InternalError::from_response(err, response).into()
    }))
    .service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/counties", web::get().to(handlers::counties))
            .route("/sessions", web::post().to(handlers::create_session))
            .route("/sessions/{id}", web::delete().to(handlers::delete_session))
            .route("/property", web::get().to(handlers::property))
            .route("/land-area", web::get().to(handlers::land_area))
            .route("/zoning", web::get().to(handlers::zoning))
            .route("/discover", web::get().to(handlers::discover))
            .route("/tasks", web::get().to(handlers::tasks))
            .route("/proposal", web::post().to(handlers::proposal)),
    );
}

/// Starts the site lookup API server.
///
/// Reads `BIND_ADDR` (default `127.0.0.1`) and `PORT` (default `8080`).
/// This is a regular async function; the caller provides the runtime and
/// initializes logging.
///
/// # Errors
///
/// Returns an `std::io::Result` error if state cannot be built from the
/// environment, or the HTTP server fails to bind or encounters a runtime
/// error.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    let state = AppState::from_env()?;

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    serve(state, &bind_addr, port).await
}

/// Serves `state` on `bind_addr:port` until shutdown.
///
/// # Errors
///
/// Returns an `std::io::Result` error if the HTTP server fails to bind or
/// encounters a runtime error.
#[allow(clippy::future_not_send)]
pub async fn serve(state: AppState, bind_addr: &str, port: u16) -> std::io::Result<()> {
    let state = web::Data::new(state);

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((bind_addr, port))?
    .run()
    .await
}
