mod client;
mod error;
mod views;

use std::process::exit;

use clap::Parser;
use client::Client;
use client::Color;
use client::Commands;
use client::ConfigurationError;
use client::TelemetryConfig;
use client::TelemetryKind;
use client::documents_commands::documents_commands;
use client::healthcheck::healthcheck_cmd;
use client::print_openapi;
use client::runserver::runserver;
use common::tracing::NoopSpanExporter;
use common::tracing::SpanUploading;
use common::tracing::Stream;
use common::tracing::TracingConfig;
use common::tracing::create_tracing_subscriber;
use opentelemetry_otlp::WithExportConfig;
use tracing::error;
use tracing_subscriber::util::SubscriberInitExt;

/// Process exit code when the service configuration is invalid
const CONFIGURATION_EXIT_CODE: i32 = 2;

#[tokio::main]
async fn main() {
    match run().await {
        Ok(_) => (),
        Err(e) => {
            if let Some(configuration_error) = e.downcast_ref::<ConfigurationError>() {
                eprintln!("{configuration_error}");
                exit(CONFIGURATION_EXIT_CODE);
            }
            error!("{e:?}");
            exit(1);
        }
    }
}

fn init_tracing(telemetry_config: TelemetryConfig) -> anyhow::Result<()> {
    let tracing_config = |telemetry| TracingConfig {
        stream: Stream::Stderr,
        telemetry,
        directives: vec![],
        span_uploading: SpanUploading::BackgroundBatched,
    };
    let log_level = tracing_subscriber::filter::LevelFilter::INFO;
    match telemetry_config.telemetry_kind {
        TelemetryKind::None => {
            create_tracing_subscriber(tracing_config(None), log_level, NoopSpanExporter).try_init()?
        }
        TelemetryKind::Opentelemetry => {
            let exporter = opentelemetry_otlp::SpanExporter::builder()
                .with_tonic()
                .with_endpoint(telemetry_config.telemetry_endpoint.as_str())
                .build()?;
            create_tracing_subscriber(
                tracing_config(Some(telemetry_config.into())),
                log_level,
                exporter,
            )
            .try_init()?
        }
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    let client = Client::parse();
    init_tracing(client.telemetry_config)?;

    match client.color {
        Color::Never => colored::control::set_override(false),
        Color::Always => colored::control::set_override(true),
        Color::Auto => colored::control::unset_override(),
    }

    let storage_config = client.storage_config;
    match client.command {
        Commands::Runserver(args) => {
            runserver(
                *args,
                storage_config.into_storage_config()?,
                client.app_version,
            )
            .await
        }
        Commands::Openapi => print_openapi(),
        Commands::Healthcheck => healthcheck_cmd(storage_config.into_storage_config()?).await,
        Commands::Documents(command) => {
            documents_commands(command, storage_config.into_storage_config()?).await
        }
    }
}
