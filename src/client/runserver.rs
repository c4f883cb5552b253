use std::time::Duration;

use anyhow::Context as _;
use axum::http::HeaderValue;
use clap::Args;

use crate::views;

#[derive(Args, Debug)]
#[command(about, long_about = "Launch the server")]
pub struct RunserverArgs {
    #[arg(long, env = "DOCSTORE_PORT", default_value_t = 8080)]
    port: u16,
    #[arg(long, env = "DOCSTORE_ADDRESS", default_value_t = String::from("0.0.0.0"))]
    address: String,
    /// Origin allowed to send credentialed cross-origin requests. When unset, any origin
    /// is allowed but without credentials.
    #[arg(long, env = "DOCSTORE_ALLOWED_ORIGIN")]
    allowed_origin: Option<String>,
    /// Maximum size of a request body, in MiB
    #[arg(long, env = "DOCSTORE_MAX_BODY_SIZE_MIB", default_value_t = 250)]
    max_body_size_mib: usize,
    /// The timeout to use when performing the healthcheck, in milliseconds
    #[clap(long, env = "DOCSTORE_HEALTH_CHECK_TIMEOUT_MS", default_value_t = 1000)]
    health_check_timeout_ms: u64,
}

/// Create and run the server
pub async fn runserver(
    RunserverArgs {
        port,
        address,
        allowed_origin,
        max_body_size_mib,
        health_check_timeout_ms,
    }: RunserverArgs,
    storage_config: storage::Config,
    app_version: Option<String>,
) -> anyhow::Result<()> {
    let allowed_origin = allowed_origin
        .map(|origin| origin.parse::<HeaderValue>())
        .transpose()
        .context("invalid allowed origin")?;
    let config = views::ServerConfig {
        port,
        address,
        health_check_timeout: Duration::from_millis(health_check_timeout_ms),
        storage_config,
        allowed_origin,
        max_body_size: max_body_size_mib * 1024 * 1024,
        app_version,
    };

    let server = views::Server::new(config).await?;
    Ok(server.start().await?)
}
