use std::path::PathBuf;

use clap::Args;
use clap::ValueEnum;
use educe::Educe;

#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("{0} must be set to use the azure storage backend")]
    MissingAzureSetting(&'static str),
}

#[derive(Default, ValueEnum, Debug, Clone, Copy, PartialEq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Azure,
    Local,
    /// Volatile storage. This should not be used in production.
    Memory,
}

#[derive(Args, Debug, Educe, Clone)]
#[educe(Default)]
pub struct StorageConfig {
    #[educe(Default = StorageBackend::Azure)]
    #[clap(long, env = "DOCSTORE_STORAGE_BACKEND", default_value_t)]
    pub storage_backend: StorageBackend,
    #[arg(long, env = "AZURE_STORAGE_ACCOUNT")]
    pub azure_storage_account: Option<String>,
    #[arg(long, env = "AZURE_STORAGE_KEY", hide_env_values = true)]
    pub azure_storage_key: Option<String>,
    #[arg(long, env = "AZURE_STORAGE_CONTAINER")]
    pub azure_storage_container: Option<String>,
    /// Target a local Azurite emulator
    #[clap(long, env = "AZURE_STORAGE_USE_EMULATOR", default_value_t = false)]
    pub azure_use_emulator: bool,
    #[educe(Default = PathBuf::from("./documents"))]
    #[arg(long, env = "DOCSTORE_LOCAL_STORAGE_PATH", default_value = "./documents")]
    /// Directory holding the documents of the local backend
    pub local_storage_path: PathBuf,
}

impl StorageConfig {
    pub fn into_storage_config(self) -> Result<storage::Config, ConfigurationError> {
        fn required(
            value: Option<String>,
            variable: &'static str,
        ) -> Result<String, ConfigurationError> {
            value
                .filter(|value| !value.is_empty())
                .ok_or(ConfigurationError::MissingAzureSetting(variable))
        }

        match self.storage_backend {
            StorageBackend::Memory => Ok(storage::Config::InMemory),
            StorageBackend::Local => Ok(storage::Config::Local {
                root: self.local_storage_path,
            }),
            StorageBackend::Azure => Ok(storage::Config::Azure {
                account: required(self.azure_storage_account, "AZURE_STORAGE_ACCOUNT")?,
                access_key: required(self.azure_storage_key, "AZURE_STORAGE_KEY")?,
                container: required(self.azure_storage_container, "AZURE_STORAGE_CONTAINER")?,
                use_emulator: self.azure_use_emulator,
            }),
        }
    }
}
