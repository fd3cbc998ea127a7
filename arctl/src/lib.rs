//! # arctl: broadcast archive API
//!
//! `arctl` serves a broadcast archive and its account administration over HTTP, backed by
//! PostgreSQL. Every request reaches the database through one process-wide connection pool,
//! owned by a [`PoolManager`] and shared with handlers through [`AppState`].
//!
//! ## Architecture
//!
//! - [`db::pools`]: the pool manager. The pool is created lazily on first use, reused by every
//!   caller afterwards, and closed once on shutdown.
//! - [`db`]: repositories over a borrowed `PgConnection`, one per entity.
//! - [`auth`]: session cookie verification and permission checks. Permissions are a map of
//!   resource name to allowed actions; an action is allowed only if it is listed.
//! - [`api`]: axum handlers and their request/response models.
//! - [`config`]: YAML + environment configuration via figment.
//!
//! ## Routes
//!
//! | Route | Notes |
//! |---|---|
//! | `GET /healthz` | liveness, never touches the database |
//! | `GET /readyz` | pings the database |
//! | `GET /api/v1/session` | the caller's session |
//! | `GET /api/v1/accounts` | needs `account:read` |
//! | `GET /api/v1/broadcasts[/{id}]` | anonymous allowed |
//! | `PATCH /api/v1/broadcasts/{id}` | needs `broadcast:update_partially` |
//! | `GET /api-docs/openapi.json`, `/docs` | API reference |
//! | `GET /internal/metrics` | when `enable_metrics` is set |
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use arctl::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = arctl::config::Args::parse();
//!     let config = Config::load(&args)?;
//!     arctl::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! }
//! ```
pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
mod metrics;
mod openapi;
pub mod telemetry;
pub mod types;

#[cfg(test)]
pub mod test_utils;

use crate::{
    api::handlers::{accounts, broadcasts, health, session},
    config::CorsOrigin,
    db::pools::{PoolManager, PoolMetricsConfig, run_pool_metrics_sampler},
    openapi::ApiDoc,
};
use axum::{Json, Router, http, routing::get};
use bon::Builder;
pub use config::Config;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::{CancellationToken, DropGuard};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, error, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use db::pools::ShutdownError;
pub use types::{AccountId, BroadcastId};

/// Application state shared across all request handlers.
#[derive(Clone, Builder)]
pub struct AppState {
    pub pools: Arc<PoolManager>,
    pub config: Config,
}

/// Embedded migrations from `migrations/`.
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Build the CORS layer from `auth.security.cors`.
///
/// A wildcard entry allows any origin. [`Config::validate`] rejects a wildcard combined with
/// `allow_credentials`.
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let cors_config = &config.auth.security.cors;

    let allow_origin = if cors_config.allowed_origins.contains(&CorsOrigin::Wildcard) {
        AllowOrigin::any()
    } else {
        let mut origins = Vec::with_capacity(cors_config.allowed_origins.len());
        for origin in &cors_config.allowed_origins {
            if let CorsOrigin::Url(url) = origin {
                // Origins never carry a path; Url always renders one
                origins.push(url.as_str().trim_end_matches('/').parse::<http::HeaderValue>()?);
            }
        }
        AllowOrigin::list(origins)
    };

    let mut cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([http::Method::GET, http::Method::PATCH])
        .allow_headers([http::header::CONTENT_TYPE])
        .allow_credentials(cors_config.allow_credentials);

    if let Some(max_age) = cors_config.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the router: health probes, the `/api/v1` surface, API docs, optional Prometheus
/// metrics, CORS and request tracing.
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    let api_routes = Router::new()
        .route("/session", get(session::get_session))
        .route("/accounts", get(accounts::list_accounts))
        .route("/broadcasts", get(broadcasts::list_broadcasts))
        .route(
            "/broadcasts/{id}",
            get(broadcasts::get_broadcast).patch(broadcasts::update_broadcast),
        );

    let router = Router::new()
        .route("/healthz", get(health::liveness))
        .route("/readyz", get(health::readiness))
        .nest("/api/v1", api_routes)
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .with_state(state.clone());

    let mut router = router.layer(create_cors_layer(&state.config)?);

    if state.config.enable_metrics {
        let (prometheus_layer, metric_handle) = metrics::prometheus_layer_and_handle();
        router = router
            .route("/internal/metrics", get(move || async move { metric_handle.render() }))
            .layer(prometheus_layer);
    }

    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// Background tasks running alongside the HTTP server.
///
/// Dropping this without calling [`shutdown`](BackgroundServices::shutdown) still cancels the
/// tasks through the drop guard.
pub struct BackgroundServices {
    background_tasks: Vec<tokio::task::JoinHandle<()>>,
    shutdown_token: CancellationToken,
    // Pub so that we can disarm it if we want to
    pub drop_guard: Option<DropGuard>,
}

impl BackgroundServices {
    /// Cancel all background tasks and wait for them to finish.
    pub async fn shutdown(self) {
        self.shutdown_token.cancel();
        for handle in self.background_tasks {
            let _ = handle.await;
        }
    }

    pub fn task_count(&self) -> usize {
        self.background_tasks.len()
    }
}

fn setup_background_services(pools: Arc<PoolManager>, config: &Config) -> BackgroundServices {
    let shutdown_token = CancellationToken::new();
    let drop_guard = shutdown_token.clone().drop_guard();
    let mut background_tasks = Vec::new();

    if config.enable_metrics {
        let sampler_config = PoolMetricsConfig {
            sample_interval: config.metrics_sample_interval,
        };
        let token = shutdown_token.clone();
        background_tasks.push(tokio::spawn(async move {
            info!("Starting database pool metrics sampler");
            if let Err(e) = run_pool_metrics_sampler(pools, sampler_config, token).await {
                error!("Pool metrics sampler error: {}", e);
            }
        }));
    }

    BackgroundServices {
        background_tasks,
        shutdown_token,
        drop_guard: Some(drop_guard),
    }
}

/// The assembled service: router, shared state, and background tasks.
pub struct Application {
    router: Router,
    app_state: AppState,
    bg_services: BackgroundServices,
}

impl Application {
    /// Create the application. The pool manager starts `Uninitialized`; migrations, when
    /// enabled, are the first thing to open a connection.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting arctl with configuration: {:#?}", config);

        let pools = Arc::new(PoolManager::new(config.database.clone()));
        if config.database.run_migrations {
            let pool = pools.acquire().await;
            info!("Running database migrations...");
            migrator().run(pool.pool()).await?;
        }

        Self::from_manager(config, pools)
    }

    /// Create the application around an already-connected pool (used by `#[sqlx::test]`).
    pub async fn new_with_pool(config: Config, pool: PgPool) -> anyhow::Result<Self> {
        let pools = Arc::new(PoolManager::with_pool(config.database.clone(), pool));
        Self::from_manager(config, pools)
    }

    fn from_manager(config: Config, pools: Arc<PoolManager>) -> anyhow::Result<Self> {
        let bg_services = setup_background_services(pools.clone(), &config);
        let app_state = AppState::builder().pools(pools).config(config).build();
        let router = build_router(&app_state)?;

        Ok(Self {
            router,
            app_state,
            bg_services,
        })
    }

    pub fn state(&self) -> &AppState {
        &self.app_state
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> (axum_test::TestServer, BackgroundServices) {
        let server = axum_test::TestServer::new(self.router.into_make_service()).expect("Failed to create test server");
        (server, self.bg_services)
    }

    /// Serve until `shutdown` resolves, then stop background tasks, close the pool and flush
    /// telemetry, in that order.
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.app_state.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("arctl listening on http://{}", bind_addr);

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        self.bg_services.shutdown().await;

        info!("Closing database connections...");
        let pool_shutdown = self.app_state.pools.shutdown().await;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        pool_shutdown?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::models::{accounts::AccountList, broadcasts::BroadcastResponse, pagination::PaginatedResponse},
        db::{
            handlers::{Accounts, Broadcasts, Repository},
            models::{accounts::AccountCreateDBRequest, broadcasts::BroadcastCreateDBRequest},
        },
        errors::ErrorBody,
        test_utils::*,
        types::{Operation, PermissionSet, Resource},
    };
    use axum::http::{HeaderValue, StatusCode, header};
    use chrono::NaiveDate;

    #[tokio::test]
    async fn test_healthz_does_not_touch_database() {
        let config = create_test_config();
        let (server, _bg) = create_test_app(config.clone()).await;

        let response = server.get("/healthz").await;

        response.assert_status_ok();
        response.assert_text("OK");
    }

    #[tokio::test]
    async fn test_readyz_unreachable_database_is_503() {
        let (server, _bg) = create_test_app(create_test_config()).await;

        let response = server.get("/readyz").await;

        response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
        let body: ErrorBody = response.json();
        assert_eq!(body.status, 503);
        assert_eq!(body.message, "Database unavailable");
    }

    #[tokio::test]
    async fn test_accounts_without_session_is_401_with_challenge() {
        let (server, _bg) = create_test_app(create_test_config()).await;

        let response = server.get("/api/v1/accounts").await;

        response.assert_status_unauthorized();
        assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));
    }

    #[tokio::test]
    async fn test_accounts_without_read_permission_is_403() {
        let config = create_test_config();
        let user = create_test_user(&[(Resource::Broadcasts, Operation::Read)]);
        let cookie = session_cookie(&user, &config);
        let (server, _bg) = create_test_app(config).await;

        let response = server
            .get("/api/v1/accounts")
            .add_header(header::COOKIE, HeaderValue::from_str(&cookie).unwrap())
            .await;

        response.assert_status_forbidden();
    }

    #[tokio::test]
    async fn test_session_reports_caller() {
        let config = create_test_config();
        let user = create_test_user(&[(Resource::Accounts, Operation::Read)]);
        let cookie = session_cookie(&user, &config);
        let (server, _bg) = create_test_app(config).await;

        let response = server
            .get("/api/v1/session")
            .add_header(header::COOKIE, HeaderValue::from_str(&cookie).unwrap())
            .await;

        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["username"], user.username);
        assert_eq!(body["permissions"]["account"], serde_json::json!(["read"]));
    }

    #[tokio::test]
    async fn test_broadcast_edit_without_permission_is_403() {
        let config = create_test_config();
        let user = create_test_user(&[(Resource::Broadcasts, Operation::Read), (Resource::Broadcasts, Operation::Update)]);
        let cookie = session_cookie(&user, &config);
        let (server, _bg) = create_test_app(config).await;

        let response = server
            .patch(&format!("/api/v1/broadcasts/{}", uuid::Uuid::new_v4()))
            .add_header(header::COOKIE, HeaderValue::from_str(&cookie).unwrap())
            .json(&serde_json::json!({ "title": "New title" }))
            .await;

        response.assert_status_forbidden();
    }

    #[tokio::test]
    async fn test_broadcast_edit_blank_title_is_400_before_database() {
        let config = create_test_config();
        let user = create_test_user(&[(Resource::Broadcasts, Operation::UpdatePartially)]);
        let cookie = session_cookie(&user, &config);
        let (server, _bg) = create_test_app(config).await;

        let response = server
            .patch(&format!("/api/v1/broadcasts/{}", uuid::Uuid::new_v4()))
            .add_header(header::COOKIE, HeaderValue::from_str(&cookie).unwrap())
            .json(&serde_json::json!({ "title": "   " }))
            .await;

        response.assert_status_bad_request();
        let body: ErrorBody = response.json();
        assert_eq!(body.status, 400);
    }

    #[tokio::test]
    async fn test_openapi_document_is_served() {
        let (server, _bg) = create_test_app(create_test_config()).await;

        let response = server.get("/api-docs/openapi.json").await;

        response.assert_status_ok();
        let doc: serde_json::Value = response.json();
        assert!(doc["paths"]["/accounts"].is_object());
        assert!(doc["components"]["securitySchemes"]["cookieAuth"].is_object());
    }

    #[tokio::test]
    async fn test_metrics_route_only_when_enabled() {
        let (server, _bg) = create_test_app(create_test_config()).await;
        server.get("/internal/metrics").await.assert_status_not_found();

        let mut config = create_test_config();
        config.enable_metrics = true;
        let (server, bg) = create_test_app(config).await;
        assert_eq!(bg.task_count(), 1);

        server.get("/healthz").await.assert_status_ok();
        let response = server.get("/internal/metrics").await;
        response.assert_status_ok();
        assert!(response.text().contains("axum_http_requests_total"));
        bg.shutdown().await;
    }

    #[test]
    fn test_cors_layer_accepts_wildcard_and_urls() {
        let mut config = create_test_config();
        config.auth.security.cors.allowed_origins = vec![CorsOrigin::Wildcard];
        assert!(create_cors_layer(&config).is_ok());

        config.auth.security.cors.allowed_origins =
            vec![CorsOrigin::Url(url::Url::parse("https://radio.example.com").unwrap())];
        config.auth.security.cors.allow_credentials = true;
        config.auth.security.cors.max_age = Some(600);
        assert!(create_cors_layer(&config).is_ok());
    }

    #[tokio::test]
    async fn test_cors_preflight_allows_configured_origin() {
        use tower::ServiceExt;

        let mut config = create_test_config();
        config.auth.security.cors.allowed_origins =
            vec![CorsOrigin::Url(url::Url::parse("https://radio.example.com").unwrap())];
        let state = AppState::builder()
            .pools(Arc::new(PoolManager::new(config.database.clone())))
            .config(config)
            .build();
        let router = build_router(&state).unwrap();

        let request = http::Request::builder()
            .method(http::Method::OPTIONS)
            .uri("/api/v1/broadcasts")
            .header(header::ORIGIN, "https://radio.example.com")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "PATCH")
            .body(axum::body::Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();

        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "https://radio.example.com"
        );
        assert_eq!(state.pools.pools_created(), 0);
    }

    #[tokio::test]
    async fn test_serve_closes_pool_on_shutdown() {
        let mut config = create_test_config();
        config.port = 0;
        let app = Application::new(config).await.unwrap();
        let pools = app.state().pools.clone();
        pools.acquire().await;
        assert_eq!(pools.state(), db::pools::PoolState::Active);

        app.serve(async {}).await.unwrap();

        assert_eq!(pools.state(), db::pools::PoolState::Uninitialized);
    }

    #[sqlx::test]
    #[test_log::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_serve_reports_undrained_pool(pool: PgPool) {
        let mut config = create_test_config();
        config.database.shutdown_timeout = std::time::Duration::from_millis(50);
        let app = Application::new_with_pool(config, pool).await.unwrap();
        let pools = app.state().pools.clone();
        let managed = pools.acquire().await;
        let held = managed.acquire().await.unwrap();

        let err = app.serve(async {}).await.expect_err("held connection should block draining");

        assert!(matches!(
            err.downcast_ref::<db::pools::ShutdownError>(),
            Some(db::pools::ShutdownError::DrainTimeout { .. })
        ));
        assert_eq!(pools.state(), db::pools::PoolState::Uninitialized);
        assert!(managed.is_closed());
        drop(held);
    }

    #[sqlx::test]
    #[test_log::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_accounts_listed_for_authorized_caller(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let permissions: PermissionSet = [("account", vec!["read"])].into_iter().collect();
        Accounts::new(&mut conn)
            .create(&AccountCreateDBRequest {
                username: "presenter".to_string(),
                email: "presenter@example.com".to_string(),
                display_name: Some("Presenter".to_string()),
                permissions,
            })
            .await
            .unwrap();
        drop(conn);

        let config = create_test_config();
        let user = create_test_user(&[(Resource::Accounts, Operation::Read)]);
        let cookie = session_cookie(&user, &config);
        let (server, _bg) = create_test_app_with_pool(pool).await;

        let response = server
            .get("/api/v1/accounts")
            .add_header(header::COOKIE, HeaderValue::from_str(&cookie).unwrap())
            .await;

        response.assert_status_ok();
        let list: AccountList = response.json();
        assert_eq!(list.results.len(), 1);
        assert_eq!(list.results[0].username, "presenter");
    }

    #[sqlx::test]
    #[test_log::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_broadcast_editable_flag_follows_caller(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let created = Broadcasts::new(&mut conn)
            .create(&BroadcastCreateDBRequest {
                title: "Morning show".to_string(),
                aired_on: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
                like_count: 3,
                listener_peak_count: 120,
                archive_url: None,
            })
            .await
            .unwrap();
        drop(conn);

        let config = create_test_config();
        let editor = create_test_user(&[(Resource::Broadcasts, Operation::UpdatePartially)]);
        let cookie = session_cookie(&editor, &config);
        let (server, _bg) = create_test_app_with_pool(pool).await;

        let anonymous: PaginatedResponse<BroadcastResponse> = server.get("/api/v1/broadcasts").await.json();
        assert_eq!(anonymous.total_count, 1);
        assert!(!anonymous.data[0].editable);

        let single: BroadcastResponse = server
            .get(&format!("/api/v1/broadcasts/{}", created.id))
            .add_header(header::COOKIE, HeaderValue::from_str(&cookie).unwrap())
            .await
            .json();
        assert!(single.editable);

        server
            .get(&format!("/api/v1/broadcasts/{}", uuid::Uuid::new_v4()))
            .await
            .assert_status_not_found();
    }

    #[sqlx::test]
    #[test_log::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_broadcast_title_edit_is_trimmed_and_saved(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let created = Broadcasts::new(&mut conn)
            .create(&BroadcastCreateDBRequest {
                title: "Old".to_string(),
                aired_on: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
                like_count: 0,
                listener_peak_count: 0,
                archive_url: None,
            })
            .await
            .unwrap();
        drop(conn);

        let config = create_test_config();
        let editor = create_test_user(&[(Resource::Broadcasts, Operation::UpdatePartially)]);
        let cookie = session_cookie(&editor, &config);
        let (server, _bg) = create_test_app_with_pool(pool).await;

        let response = server
            .patch(&format!("/api/v1/broadcasts/{}", created.id))
            .add_header(header::COOKIE, HeaderValue::from_str(&cookie).unwrap())
            .json(&serde_json::json!({ "title": "  Evening news  " }))
            .await;

        response.assert_status_ok();
        let updated: BroadcastResponse = response.json();
        assert_eq!(updated.title, "Evening news");
        assert!(updated.editable);
        assert_eq!(updated.like_count, 0);
    }
}
