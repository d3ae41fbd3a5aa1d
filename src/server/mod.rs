// HTTP API (axum)
//
// Store work runs on tokio's blocking threads with a pooled connection,
// so a busy database never stalls the async workers.

use crate::auth::purge_expired_sessions;
use crate::config::Settings;
use crate::db::{open_pool, setup_database, Pool};
use crate::error::StoreError;
use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{delete, get, post},
    Router,
};
use rusqlite::Connection;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

pub mod error;
pub mod extract;
pub mod handlers;

pub use error::ApiError;
pub use extract::AdminContext;

/// The shared application state that all handlers can access.
#[derive(Clone)]
pub struct AppState {
    pub pool: Pool,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(pool: Pool, settings: Settings) -> Self {
        AppState {
            pool,
            settings: Arc::new(settings),
        }
    }

    /// Run `work` on a pooled connection off the async runtime.
    pub async fn with_conn<T, F>(&self, work: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Connection) -> Result<T, ApiError> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get().map_err(StoreError::from)?;
            work(&conn)
        })
        .await?
    }
}

/// CORS for the configured frontend origins, with cookies allowed.
pub fn cors_layer(settings: &Settings) -> CorsLayer {
    let origins: Vec<HeaderValue> = settings
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true)
}

pub fn build_router(state: AppState) -> Router {
    let settings = Arc::clone(&state.settings);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/login", post(handlers::login))
        .route("/logout", post(handlers::logout))
        .route("/auth/status", get(handlers::auth_status))
        .route("/import_csv", post(handlers::import_csv))
        .route("/companies", get(handlers::list_companies))
        .route("/company/:company_id", get(handlers::company_detail))
        .route(
            "/portfolio",
            get(handlers::list_portfolio).post(handlers::add_to_portfolio),
        )
        .route("/portfolio/:portfolio_id", delete(handlers::remove_from_portfolio))
        .route("/admin/stats", get(handlers::admin_stats))
        .route("/admin/companies", delete(handlers::admin_delete_company))
        .with_state(state)
        .layer(DefaultBodyLimit::max(settings.max_upload_bytes))
        .layer(cors_layer(&settings))
        .layer(TraceLayer::new_for_http())
}

/// Open the store, prepare the schema and build the application state.
pub async fn prepare_state(settings: Settings) -> anyhow::Result<AppState> {
    let path = settings.database_path.clone();
    let pool_size = settings.pool_size;
    let admin_username = settings.admin_username.clone();
    let admin_password = settings.admin_password.clone();

    let pool = tokio::task::spawn_blocking(move || -> anyhow::Result<Pool> {
        let pool = open_pool(&path, pool_size)
            .with_context(|| format!("Failed to open database {:?}", path))?;

        let conn = pool.get().context("Failed to get a database connection")?;
        setup_database(&conn, &admin_username, &admin_password)
            .context("Failed to initialize database schema")?;
        let purged = purge_expired_sessions(&conn)?;
        if purged > 0 {
            tracing::info!(purged, "Removed expired sessions");
        }

        Ok(pool)
    })
    .await??;

    tracing::info!(
        path = ?settings.database_path,
        pool_size = pool.max_size(),
        "Database ready"
    );
    Ok(AppState::new(pool, settings))
}

/// Run the API server until Ctrl+C.
pub async fn run_server(settings: Settings) -> anyhow::Result<()> {
    settings.warn_on_insecure_defaults();

    let addr = settings.bind_address();
    let state = prepare_state(settings).await?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;
    tracing::info!("Web server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Web server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
