mod documents;
mod openapi;

#[cfg(test)]
mod test_app;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::ServiceExt;
use axum::extract::DefaultBodyLimit;
use axum::extract::FromRef;
use axum::extract::Json;
use axum::extract::State;
use axum::http::HeaderValue;
use axum::http::Method;
use axum::http::StatusCode;
use axum::http::header;
use axum::routing::get;
use axum_tracing_opentelemetry::middleware::OtelAxumLayer;
use common::Version;
use thiserror::Error;
use tokio::time::timeout;
use tower::Layer as _;
use tower_http::cors::Any;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::normalize_path::NormalizePath;
use tower_http::normalize_path::NormalizePathLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use openapi::OpenApiRoot;

use crate::error::DocstoreError;
use crate::error::Result;

// # Ordering
//
// - toplevel routes first, nested routers second
// - paths ordered by number of segments
// - static segments before captures, so that `/download/{id}` wins over `/{id}`
fn service_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
        .nest(
            "/documents",
            Router::new()
                .route("/", get(documents::list).post(documents::create))
                .route("/download/{id}", get(documents::download))
                .route(
                    "/{id}",
                    get(documents::get)
                        .put(documents::update)
                        .delete(documents::delete),
                ),
        )
}

#[derive(Debug, Error)]
pub enum AppHealthError {
    #[error("Timeout error")]
    Timeout,
    #[error(transparent)]
    Storage(#[from] storage::Error),
}

impl DocstoreError for AppHealthError {
    fn get_status(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    fn get_type(&self) -> &str {
        match self {
            AppHealthError::Timeout => "docstore:app_health:Timeout",
            AppHealthError::Storage(_) => "docstore:app_health:Storage",
        }
    }
}

#[utoipa::path(
    get, path = "/health",
    responses(
        (status = 200, description = "Check if Docstore is running correctly", body = String)
    )
)]
async fn health(
    State(AppState {
        storage,
        health_check_timeout,
        ..
    }): State<AppState>,
) -> Result<&'static str> {
    timeout(health_check_timeout, check_health(&storage))
        .await
        .map_err(|_| AppHealthError::Timeout)??;
    Ok("ok")
}

pub async fn check_health(storage: &storage::Client) -> Result<(), AppHealthError> {
    storage.ping().await?;
    Ok(())
}

#[utoipa::path(
    get, path = "/version",
    responses(
        (status = 200, description = "Return the service version", body = Version),
    ),
)]
pub(in crate::views) async fn version(
    State(AppState { config, .. }): State<AppState>,
) -> Json<Version> {
    Json(Version {
        git_describe: config.app_version.clone(),
    })
}

pub struct ServerConfig {
    pub port: u16,
    pub address: String,
    pub health_check_timeout: Duration,
    pub storage_config: storage::Config,
    /// Origin allowed to send credentialed requests, any origin is accepted when unset
    pub allowed_origin: Option<HeaderValue>,
    pub max_body_size: usize,
    pub app_version: Option<String>,
}

pub struct Server {
    app_state: AppState,
    router: NormalizePath<Router>,
}

/// The state of the whole Docstore service, available to all handlers
///
/// If only the storage is needed, use `State<Arc<storage::Client>>`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub storage: Arc<storage::Client>,
    pub health_check_timeout: Duration,
}

impl FromRef<AppState> for Arc<storage::Client> {
    fn from_ref(input: &AppState) -> Self {
        input.storage.clone()
    }
}

impl AppState {
    #[tracing::instrument(skip_all, level = "info", err, name = "AppState initialization")]
    async fn init(config: ServerConfig) -> anyhow::Result<Self> {
        let storage = storage::Client::try_initialize(config.storage_config.clone()).await?;
        Ok(Self {
            storage: Arc::new(storage),
            health_check_timeout: config.health_check_timeout,
            config: Arc::new(config),
        })
    }
}

fn cors_layer(allowed_origin: Option<HeaderValue>) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::ORIGIN, header::CONTENT_TYPE, header::AUTHORIZATION])
        .expose_headers([header::CONTENT_LENGTH]);
    match allowed_origin {
        // credentials can't be combined with a wildcard origin
        Some(origin) => cors.allow_origin(origin).allow_credentials(true),
        None => cors.allow_origin(Any),
    }
}

impl Server {
    #[tracing::instrument(skip_all, err, level = "info", name = "server initialization")]
    pub async fn new(config: ServerConfig) -> anyhow::Result<Self> {
        info!("Building server...");
        let app_state = AppState::init(config).await?;
        let router = tracing::debug_span!("router initialization").in_scope(service_router);

        let request_payload_limit = RequestBodyLimitLayer::new(app_state.config.max_body_size);
        let cors = cors_layer(app_state.config.allowed_origin.clone());

        // Configure the axum router
        let router: Router<()> = router
            .layer(OtelAxumLayer::default())
            .layer(DefaultBodyLimit::disable())
            .layer(request_payload_limit)
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .with_state(app_state.clone());
        let normalizing_router = NormalizePathLayer::trim_trailing_slash().layer(router);

        Ok(Self {
            app_state,
            router: normalizing_router,
        })
    }

    pub async fn start(self) -> std::io::Result<()> {
        let Self { app_state, router } = self;
        let ServerConfig { address, port, .. } = app_state.config.as_ref();

        info!(
            %address,
            port = *port,
            backend = app_state.storage.backend(),
            "Running server..."
        );
        let service = ServiceExt::<axum::extract::Request>::into_make_service(router);
        let listener = tokio::net::TcpListener::bind((address.as_str(), *port)).await?;
        axum::serve(listener, service).await
    }
}
