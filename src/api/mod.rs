use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware,
    routing::{get, patch, post, put},
};
use std::net::IpAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::services::{AuthService, ContactService, ContentService, UploadService};
use crate::state::SharedState;

pub mod auth;
mod contact;
mod content;
mod error;
mod extract;
mod observability;
mod system;
mod types;
mod upload;
mod validation;

pub use contact::ClientIp;
pub use error::ApiError;
pub use extract::ApiJson;
pub use types::*;

use metrics_exporter_prometheus::PrometheusHandle;

/// Multipart framing on top of the file itself.
const UPLOAD_OVERHEAD_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    /// Peers allowed to set `X-Forwarded-For` / `X-Real-IP`.
    pub trusted_proxies: Vec<IpAddr>,

    pub start_time: std::time::Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Arc<Config> {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &crate::db::Store {
        &self.shared.store
    }

    #[must_use]
    pub fn auth_service(&self) -> &Arc<dyn AuthService> {
        &self.shared.auth_service
    }

    #[must_use]
    pub fn content_service(&self) -> &Arc<dyn ContentService> {
        &self.shared.content_service
    }

    #[must_use]
    pub fn upload_service(&self) -> &Arc<UploadService> {
        &self.shared.upload_service
    }

    #[must_use]
    pub fn contact_service(&self) -> &Arc<ContactService> {
        &self.shared.contact_service
    }
}

#[must_use]
pub fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    let trusted_proxies = shared
        .config
        .server
        .trusted_proxy_ips
        .iter()
        .filter_map(|ip| match ip.parse() {
            Ok(ip) => Some(ip),
            Err(_) => {
                tracing::warn!(value = %ip, "Ignoring unparseable trusted proxy IP");
                None
            }
        })
        .collect();

    Arc::new(AppState {
        shared,
        trusted_proxies,
        start_time: std::time::Instant::now(),
        prometheus_handle,
    })
}

pub fn router(state: Arc<AppState>) -> Router {
    let config = state.config().clone();
    error::set_expose_details(config.server.expose_error_details);

    let upload_limit = state.upload_service().max_request_bytes() + UPLOAD_OVERHEAD_BYTES;

    let public_routes = Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/content", get(content::get_content))
        .route("/content/sections", get(content::list_sections))
        .route("/contact", post(contact::send_message))
        .route("/health/live", get(system::health_live))
        .route("/health/ready", get(system::health_ready));

    let admin_routes = Router::new()
        .route("/content", put(content::update_content))
        .route("/content/section/{name}", patch(content::update_section))
        .route("/content/backups", get(content::list_backups))
        .route("/content/backups/{id}", get(content::get_backup))
        .route("/content/restore/{backup_id}", post(content::restore_backup))
        .route("/metrics", get(observability::get_metrics))
        .route_layer(middleware::from_fn(auth::require_admin));

    let authenticated_routes = Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/auth/change-password", post(auth::change_password))
        .route(
            "/upload",
            post(upload::upload_file).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .merge(admin_routes)
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ));

    let api_router = Router::new()
        .merge(public_routes)
        .merge(authenticated_routes)
        .route_layer(middleware::from_fn(observability::metrics_middleware))
        .with_state(state);

    let cors_origins = &config.server.cors_allowed_origins;
    let cors_layer = if cors_origins.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .nest("/api", api_router)
        .nest_service(
            &config.uploads.public_prefix,
            tower_http::services::ServeDir::new(&config.uploads.directory),
        )
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(middleware::from_fn(observability::security_headers_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::logging_middleware))
}
