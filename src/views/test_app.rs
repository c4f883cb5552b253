//! Exposes [TestApp] and [TestAppBuilder] to ease the setup of the
//! test axum server and of its blob storage.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum_test::TestRequest;
use axum_test::TestServer;
use axum_tracing_opentelemetry::middleware::OtelAxumLayer;
use common::tracing::NoopSpanExporter;
use common::tracing::SpanUploading;
use common::tracing::Stream;
use common::tracing::Telemetry;
use common::tracing::TracingConfig;
use common::tracing::create_tracing_subscriber;
use serde::de::DeserializeOwned;
use tower_http::trace::TraceLayer;
use url::Url;

use super::AppState;
use super::ServerConfig;
use super::service_router;

/// A builder interface for [TestApp]
///
/// Use [TestAppBuilder::default_app] to get an app backed by an empty in-memory storage.
pub(crate) struct TestAppBuilder {
    storage: Option<storage::Client>,
    enable_telemetry: bool,
    app_version: Option<String>,
}

impl TestAppBuilder {
    pub fn new() -> Self {
        Self {
            storage: None,
            enable_telemetry: true,
            app_version: None,
        }
    }

    pub fn storage(mut self, storage: storage::Client) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn app_version(mut self, app_version: impl Into<String>) -> Self {
        self.app_version = Some(app_version.into());
        self
    }

    pub fn default_app() -> TestApp {
        TestAppBuilder::new().build()
    }

    pub fn build(self) -> TestApp {
        // Generate test server config
        let config = ServerConfig {
            app_version: self.app_version,
            port: 0,
            address: String::default(),
            health_check_timeout: Duration::from_millis(500),
            storage_config: storage::Config::InMemory,
            allowed_origin: None,
            max_body_size: 250 * 1024 * 1024,
        };

        // Setup tracing
        let telemetry = if self.enable_telemetry {
            Some(Telemetry {
                service_name: "docstore".into(),
                endpoint: Url::parse("http://localhost:4317").unwrap(),
            })
        } else {
            None
        };
        let tracing_config = TracingConfig {
            stream: Stream::Stdout,
            telemetry,
            directives: vec![],
            span_uploading: SpanUploading::BackgroundBatched,
        };
        let sub = create_tracing_subscriber(
            tracing_config,
            tracing_subscriber::filter::LevelFilter::TRACE,
            NoopSpanExporter,
        );
        let tracing_guard = tracing::subscriber::set_default(sub);

        let storage = Arc::new(self.storage.unwrap_or_else(storage::Client::for_tests));

        let app_state = AppState {
            storage,
            health_check_timeout: config.health_check_timeout,
            config: Arc::new(config),
        };

        // Configure the axum router
        let router: Router<()> = service_router()
            .layer(OtelAxumLayer::default())
            .layer(TraceLayer::new_for_http())
            .with_state(app_state.clone());

        // Run server
        let server = TestServer::new(router).expect("test server should build properly");

        TestApp {
            server,
            app_state,
            tracing_guard,
        }
    }
}

/// Wraps an underlying, fully configured, axum service
///
/// The storage behind the service is reachable through [TestApp::storage].
pub(crate) struct TestApp {
    server: TestServer,
    app_state: AppState,
    #[expect(unused)] // included here to extend its lifetime, not meant to be used in any way
    tracing_guard: tracing::subscriber::DefaultGuard,
}

impl TestApp {
    pub fn storage(&self) -> Arc<storage::Client> {
        self.app_state.storage.clone()
    }

    pub async fn fetch(&self, req: TestRequest) -> TestResponse {
        tracing::trace!(request = ?req);
        let response = req.await;
        TestResponse::new(response)
    }

    pub fn get(&self, path: &str) -> TestRequest {
        self.server.get(&trim_path(path))
    }

    pub fn post(&self, path: &str) -> TestRequest {
        self.server.post(&trim_path(path))
    }

    pub fn put(&self, path: &str) -> TestRequest {
        self.server.put(&trim_path(path))
    }

    pub fn delete(&self, path: &str) -> TestRequest {
        self.server.delete(&trim_path(path))
    }
}

// The normalizing layer wraps the router from the outside, which the test server can't
// reproduce. Test paths are under our control, so trailing slashes are trimmed here.
fn trim_path(path: &str) -> String {
    if let Some(path) = path.strip_suffix('/') {
        path.to_owned()
    } else if path.contains("/?") {
        path.replace("/?", "?")
    } else {
        path.to_owned()
    }
}

pub struct TestResponse {
    inner: axum_test::TestResponse,
}

impl TestResponse {
    #[tracing::instrument(name = "Response", level = "debug", skip(inner), fields(status = ?inner.status_code()))]
    fn new(inner: axum_test::TestResponse) -> Self {
        tracing::trace!(response = ?inner);
        Self { inner }
    }

    #[track_caller]
    fn render_response_lossy(self) -> String {
        let bytes = self.inner.into_bytes();
        serde_json::from_slice::<serde_json::Value>(&bytes)
            .ok()
            .and_then(|json| serde_json::to_string_pretty(&json).ok())
            .unwrap_or_else(|| String::from_utf8_lossy(&bytes).into_owned())
    }

    #[track_caller]
    pub fn assert_status(self, expected_status: axum::http::StatusCode) -> Self {
        let actual_status = self.inner.status_code();
        if actual_status != expected_status {
            let body = self.render_response_lossy();
            pretty_assertions::assert_eq!(
                actual_status,
                expected_status,
                "unexpected status code body={body}"
            );
            unreachable!("should have already panicked")
        } else {
            self
        }
    }

    pub fn bytes(self) -> Vec<u8> {
        self.inner.into_bytes().into()
    }

    #[track_caller]
    pub fn content_type(&self) -> String {
        self.inner
            .header("Content-Type")
            .to_str()
            .expect("Content-Type header should be valid UTF-8")
            .to_string()
    }

    #[tracing::instrument(
        name = "Deserialization",
        level = "debug",
        skip(self),
        fields(response_status = ?self.inner.status_code())
    )]
    #[track_caller]
    pub fn json_into<T: DeserializeOwned>(self) -> T {
        let body = self.bytes();
        serde_json::from_slice(body.as_ref()).unwrap_or_else(|err| {
            tracing::error!(error = ?err, "Error deserializing test response into the desired type");
            let actual: serde_json::Value =
                serde_json::from_slice(body.as_ref()).unwrap_or_else(|err| {
                    tracing::error!(
                        error = ?err,
                        ?body,
                        "Failed to deserialize test response body into JSON"
                    );
                    panic!("could not deserialize test response into JSON");
                });
            let pretty = serde_json::to_string_pretty(&actual).unwrap();
            tracing::error!(body = %pretty, "Actual JSON value");
            panic!("could not deserialize test request");
        })
    }
}
