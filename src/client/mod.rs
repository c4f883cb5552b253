pub mod documents_commands;
pub mod healthcheck;
pub mod runserver;
mod storage_config;
mod telemetry_config;

use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use documents_commands::DocumentsCommands;
use runserver::RunserverArgs;
pub use storage_config::ConfigurationError;
pub use storage_config::StorageConfig;
pub use telemetry_config::TelemetryConfig;
pub use telemetry_config::TelemetryKind;

use crate::views::OpenApiRoot;

#[derive(Parser, Debug)]
#[command(author, version)]
pub struct Client {
    #[command(flatten)]
    pub storage_config: StorageConfig,
    #[command(flatten)]
    pub telemetry_config: TelemetryConfig,
    #[arg(long, env, value_enum, default_value_t = Color::Auto)]
    pub color: Color,
    /// Docstore version, reported by the `/version` endpoint
    #[clap(long, env = "DOCSTORE_GIT_DESCRIBE")]
    pub app_version: Option<String>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(ValueEnum, Debug, Default, Clone)]
pub enum Color {
    Never,
    Always,
    #[default]
    Auto,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Runserver(Box<RunserverArgs>), // suppresses clippy lint about variant size
    #[command(about, long_about = "Prints the OpenApi of the service")]
    Openapi,
    #[command(about, long_about = "Checks that the configured storage answers")]
    Healthcheck,
    #[command(subcommand, about, long_about = "Documents related commands")]
    Documents(DocumentsCommands),
}

/// Prints the OpenApi to stdout
pub fn print_openapi() -> anyhow::Result<()> {
    let openapi = OpenApiRoot::build_openapi();
    print!("{}", serde_yaml::to_string(&openapi)?);
    Ok(())
}
