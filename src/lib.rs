//! Portfolio Server - library for app logic and testing

pub mod auth;
pub mod config;
pub mod content;
pub mod db;
pub mod error;
pub mod logging;
pub mod routes;
pub mod state;
pub mod uploads;

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer,
    services::ServeDir,
    set_header::{SetResponseHeader, SetResponseHeaderLayer},
    trace::TraceLayer,
};

use crate::{
    config::Config,
    state::AppState,
    uploads::{UploadStrategy, MAX_FILES_PER_BATCH, MAX_FILE_SIZE},
};

/// Cap for JSON bodies.
const JSON_BODY_LIMIT: usize = 1024 * 1024;
/// Room for multipart framing around the file bytes.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Configure CORS from the configured origin list. Credentials are allowed
/// so the session cookie travels with cross-origin admin requests.
pub fn configure_cors(origins: &[String]) -> CorsLayer {
    let allowed_origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
}

fn security_headers(router: Router, production: bool) -> Router {
    let headers: [(HeaderName, &'static str); 5] = [
        (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        (header::X_FRAME_OPTIONS, "DENY"),
        (header::X_XSS_PROTECTION, "1; mode=block"),
        (header::REFERRER_POLICY, "strict-origin-when-cross-origin"),
        (
            HeaderName::from_static("permissions-policy"),
            "camera=(), microphone=(), geolocation=()",
        ),
    ];

    let mut router = router;
    for (name, value) in headers {
        router = router.layer(SetResponseHeaderLayer::if_not_present(
            name,
            HeaderValue::from_static(value),
        ));
    }
    if production {
        router = router.layer(SetResponseHeaderLayer::if_not_present(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        ));
    }
    router
}

/// Create and configure the application router.
pub fn create_app(state: AppState) -> Router {
    let config = state.config.clone();

    let api = Router::new()
        .route("/api/content", get(routes::content::list_sections))
        .route(
            "/api/content/{section}",
            get(routes::content::get_section).post(routes::content::update_section),
        )
        .route("/api/admin/login", post(routes::auth::login))
        .route("/api/admin/logout", post(routes::auth::logout))
        .route("/api/admin/status", get(routes::auth::status))
        .route("/api/uploads/{reference}", get(routes::upload::serve_upload))
        .route("/api/debug/uploads", get(routes::upload::list_uploads))
        .route("/api/contact", post(routes::site::contact))
        .route("/api/download-resume", get(routes::site::download_resume))
        .route("/health", get(routes::health::health_ping))
        .route("/health/ready", get(routes::health::health_ready))
        .route("/health/detailed", get(routes::health::health_detailed))
        .layer(RequestBodyLimitLayer::new(JSON_BODY_LIMIT));

    let uploads = Router::new()
        .route(
            "/api/upload",
            post(routes::upload::upload_image)
                .layer(DefaultBodyLimit::max(MAX_FILE_SIZE + MULTIPART_OVERHEAD)),
        )
        .route(
            "/api/upload/multiple",
            post(routes::upload::upload_images).layer(DefaultBodyLimit::max(
                MAX_FILES_PER_BATCH * MAX_FILE_SIZE + MULTIPART_OVERHEAD,
            )),
        );

    let mut app = api.merge(uploads);

    if state.assets.strategy() == UploadStrategy::Disk {
        let files = SetResponseHeader::overriding(
            ServeDir::new(&config.uploads.dir),
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static(routes::upload::UPLOAD_CSP),
        );
        app = app.nest_service("/uploads", files);
    }

    let app = app
        .with_state(state)
        .layer(logging::middleware::propagate_request_id_layer())
        .layer(middleware::from_fn(logging::middleware::log_request))
        .layer(logging::middleware::request_id_layer())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new());

    security_headers(app, config.environment.is_production())
        .layer(configure_cors(&config.allowed_origins))
}

/// Run the server (used by main).
pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Dropping the guards stops the background log writers.
    let _log_guards = logging::init(&logging::LogConfig::from_env());

    let config = Config::from_env().context("invalid configuration")?;
    let addr: SocketAddr = config.bind_addr;
    tracing::info!(environment = config.environment.as_str(), "starting portfolio server");

    let state = AppState::bootstrap(config).await?;
    let _maintenance = state.spawn_maintenance();

    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    tracing::info!(%addr, "listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
