use clap::Args;
use clap::ValueEnum;
use url::Url;

#[derive(Args, Debug, Clone)]
pub struct TelemetryConfig {
    #[clap(long, env, default_value_t)]
    pub telemetry_kind: TelemetryKind,
    #[clap(long, env, default_value = "docstore")]
    pub service_name: String,
    #[arg(long, env, default_value = "http://localhost:4317")]
    pub telemetry_endpoint: Url,
}

impl From<TelemetryConfig> for common::tracing::Telemetry {
    fn from(telemetry_config: TelemetryConfig) -> Self {
        Self {
            service_name: telemetry_config.service_name,
            endpoint: telemetry_config.telemetry_endpoint,
        }
    }
}

#[derive(Default, ValueEnum, Debug, Clone, PartialEq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum TelemetryKind {
    #[default]
    None,
    Opentelemetry,
}
