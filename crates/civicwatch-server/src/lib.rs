//! CivicWatch HTTP server.
//!
//! Citizens file geotagged, photo-documented civic issue reports;
//! administrators triage and resolve them. Handlers live in [`http`],
//! authorization decisions in [`access`], credential handling in
//! [`auth`], and image intake in [`uploads`].

#![forbid(unsafe_code)]

use axum::extract::DefaultBodyLimit;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post, put};
use axum::Router;
use civicwatch_store::Store;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;

pub mod access;
pub mod auth;
pub mod config;
pub mod http;
pub mod uploads;

pub use config::{validate_startup_config, AdminSeed, ServerConfig};

pub const CRATE_NAME: &str = "civicwatch-server";

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub images: Arc<uploads::ImageStore>,
    pub config: Arc<ServerConfig>,
    pub keys: Arc<auth::TokenKeys>,
    pub(crate) request_id_seed: Arc<AtomicU64>,
}

impl AppState {
    #[must_use]
    pub fn new(store: Arc<Store>, images: Arc<uploads::ImageStore>, config: ServerConfig) -> Self {
        let keys = Arc::new(auth::TokenKeys::new(config.jwt_secret.as_bytes()));
        Self {
            store,
            images,
            config: Arc::new(config),
            keys,
            request_id_seed: Arc::new(AtomicU64::new(1)),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let uploads_dir = state.images.root().to_path_buf();
    // Leave headroom for the multipart framing around the image itself.
    let body_limit = state.config.max_upload_bytes + 64 * 1024;
    Router::new()
        .route("/", get(http::handlers::root_handler))
        .route("/healthz", get(http::handlers::healthz_handler))
        .route("/api/auth/register", post(http::auth_endpoints::register_handler))
        .route("/api/auth/login", post(http::auth_endpoints::login_handler))
        .route("/api/auth/me", get(http::auth_endpoints::me_handler))
        .route(
            "/api/issues",
            get(http::issue_endpoints::list_issues_handler)
                .post(http::issue_endpoints::create_issue_handler),
        )
        .route(
            "/api/issues/nearby/:longitude/:latitude/:distance",
            get(http::issue_endpoints::nearby_issues_handler),
        )
        .route(
            "/api/issues/admin/stats",
            get(http::issue_endpoints::issue_stats_handler),
        )
        .route(
            "/api/issues/:id/status",
            put(http::issue_endpoints::update_status_handler),
        )
        .route(
            "/api/issues/:id",
            get(http::issue_endpoints::get_issue_handler)
                .delete(http::issue_endpoints::delete_issue_handler),
        )
        .nest_service("/uploads", ServeDir::new(uploads_dir))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors_layer(&state.config.cors_allowed_origins))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION]);
    if origins.is_empty() {
        layer.allow_origin(tower_http::cors::Any)
    } else {
        let list: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        layer.allow_origin(AllowOrigin::list(list))
    }
}
