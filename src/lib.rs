//! Roomservice API library
//!
//! Guest carts, food orders and service requests for hotel rooms, and the live board staff use
//! to work them.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod context;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod tracing;
pub mod views;

use axum::{
    extract::State,
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Extension, Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::{sync::Arc, time::Duration};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
};
use utoipa::ToSchema;

use crate::auth::{AuthConfig, AuthService};
use crate::config::AppConfig;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: AppConfig,
    pub auth: Arc<AuthService>,
    pub services: handlers::AppServices,
}

impl AppState {
    /// Wires every service on top of an established connection.
    pub fn new(db: DatabaseConnection, config: AppConfig) -> anyhow::Result<Self> {
        let db = Arc::new(db);
        let auth = Arc::new(AuthService::new(AuthConfig::from(&config)));
        let services = handlers::AppServices::new(db.clone(), &config)?;

        Ok(Self {
            db,
            config,
            auth,
            services,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "healthy")]
    pub status: String,
    pub database: String,
    pub timestamp: String,
}

/// Database connectivity check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service and database are reachable", body = HealthResponse),
        (status = 503, description = "Database is unreachable", body = HealthResponse)
    ),
    tag = "Health"
)]
pub async fn health(State(state): State<Arc<AppState>>) -> Response {
    let (status, database) = match db::check_connection(&state.db).await {
        Ok(()) => (StatusCode::OK, "healthy"),
        Err(err) => {
            ::tracing::warn!(error = %err, "health check could not reach the database");
            (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
        }
    };

    let body = HealthResponse {
        status: if status.is_success() { "healthy" } else { "unhealthy" }.to_string(),
        database: database.to_string(),
        timestamp: Utc::now().to_rfc3339(),
    };
    (status, Json(body)).into_response()
}

/// CORS policy from configuration: explicit origins, or permissive where allowed.
pub fn cors_layer(cfg: &AppConfig) -> anyhow::Result<CorsLayer> {
    let configured_origins: Option<Vec<HeaderValue>> = cfg
        .cors_allowed_origins
        .as_ref()
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .filter_map(|origin| HeaderValue::from_str(origin).ok())
                .collect::<Vec<_>>()
        })
        .filter(|origins| !origins.is_empty());

    if let Some(origins) = configured_origins {
        Ok(CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
            .expose_headers([http::HeaderName::from_static(
                handlers::common::CART_COUNT_HEADER,
            )]))
    } else if cfg.should_allow_permissive_cors() {
        ::tracing::info!(
            "Using permissive CORS because explicit origins were not configured ({})",
            if cfg.is_development() {
                "development environment"
            } else {
                "explicit override enabled"
            }
        );
        Ok(CorsLayer::permissive())
    } else {
        anyhow::bail!(
            "Missing CORS configuration: set APP__CORS_ALLOWED_ORIGINS or APP__CORS_ALLOW_ANY_ORIGIN=true"
        )
    }
}

/// Full application router: guest and portal routes, health, Swagger UI and the HTTP layers.
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let cors = cors_layer(&state.config)?;
    let timeout = Duration::from_secs(state.config.request_timeout_secs);
    let auth = state.auth.clone();

    let app = Router::new()
        .route("/health", get(health))
        .merge(handlers::guest::guest_routes())
        .merge(handlers::live_board::portal_routes())
        .with_state(Arc::new(state))
        .merge(openapi::swagger_ui())
        // HTTP tracing layer for consistent request/response telemetry
        .layer(tracing::configure_http_tracing())
        .layer(TimeoutLayer::new(timeout))
        .layer(CompressionLayer::new())
        .layer(cors)
        // Auth middleware reads the service from request extensions
        .layer(Extension(auth))
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ));

    Ok(app)
}

pub mod prelude {
    pub use crate::context::{GuestContext, OperatorContext, TenantScope};
    pub use crate::errors::*;
    pub use crate::services::*;
    pub use crate::{build_router, AppState};
}
