use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use colored::Colorize;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use std::backtrace::Backtrace;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::Display;
use std::fmt::Formatter;
use std::result::Result as StdResult;
use tracing::error;
use utoipa::ToSchema;

pub type Result<T, E = InternalError> = StdResult<T, E>;

/// Trait for all errors that can be returned by docstore
pub trait DocstoreError: Error + Send + Sync {
    fn get_status(&self) -> StatusCode;

    fn get_type(&self) -> &str;

    fn context(&self) -> HashMap<String, Value> {
        Default::default()
    }
}

#[derive(Serialize, Deserialize)]
#[serde(remote = "StatusCode")]
pub(crate) struct StatusCodeRemoteDef(#[serde(getter = "StatusCode::as_u16")] u16);

impl From<StatusCodeRemoteDef> for StatusCode {
    fn from(def: StatusCodeRemoteDef) -> Self {
        StatusCode::from_u16(def.0).unwrap_or_else(|_| default_status_code())
    }
}

pub(crate) fn default_status_code() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct InternalError {
    #[serde(with = "StatusCodeRemoteDef", default = "default_status_code")]
    #[schema(value_type = u16, minimum = 100, maximum = 599)]
    pub status: StatusCode,
    #[serde(rename = "type")]
    pub error_type: String,
    pub context: HashMap<String, Value>,
    pub message: String,
}

impl InternalError {
    pub fn get_type(&self) -> &str {
        &self.error_type
    }

    pub fn get_status(&self) -> StatusCode {
        self.status
    }
}

impl Error for InternalError {}

impl Display for InternalError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl<T: DocstoreError> From<T> for InternalError {
    fn from(err: T) -> Self {
        InternalError {
            status: err.get_status(),
            error_type: err.get_type().to_owned(),
            context: err.context(),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for InternalError {
    fn into_response(self) -> Response {
        error!(
            "[{}] {}: {}",
            self.error_type.bold(),
            self.message,
            Backtrace::capture() // won't log unless RUST_BACKTRACE=1
        );
        (self.status, Json(self)).into_response()
    }
}

pub(crate) const NOT_FOUND_ERROR: &str = "docstore:NotFoundError";
pub(crate) const VALIDATION_ERROR: &str = "docstore:ValidationError";
pub(crate) const CLIENT_INIT_ERROR: &str = "docstore:ClientInitError";
pub(crate) const STORAGE_IO_ERROR: &str = "docstore:StorageIOError";

/// Handle all blob storage errors
impl DocstoreError for storage::Error {
    fn get_status(&self) -> StatusCode {
        match self {
            storage::Error::NotFound { .. } => StatusCode::NOT_FOUND,
            storage::Error::InvalidKey { .. } => StatusCode::BAD_REQUEST,
            storage::Error::ClientInit { .. }
            | storage::Error::List(_)
            | storage::Error::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn get_type(&self) -> &str {
        match self {
            storage::Error::NotFound { .. } => NOT_FOUND_ERROR,
            storage::Error::InvalidKey { .. } => VALIDATION_ERROR,
            storage::Error::ClientInit { .. } => CLIENT_INIT_ERROR,
            storage::Error::List(_) | storage::Error::Io { .. } => STORAGE_IO_ERROR,
        }
    }

    fn context(&self) -> HashMap<String, Value> {
        match self {
            storage::Error::NotFound { key } | storage::Error::InvalidKey { key } => {
                [("key".to_string(), json!(key))].into()
            }
            storage::Error::ClientInit { backend, .. } => {
                [("backend".to_string(), json!(backend))].into()
            }
            storage::Error::Io { operation, key, .. } => [
                ("operation".to_string(), json!(operation.to_string())),
                ("key".to_string(), json!(key)),
            ]
            .into(),
            storage::Error::List(_) => Default::default(),
        }
    }
}

impl DocstoreError for docstore_models::Error {
    fn get_status(&self) -> StatusCode {
        match self {
            docstore_models::Error::NotFound { .. } => StatusCode::NOT_FOUND,
            docstore_models::Error::InvalidId { .. }
            | docstore_models::Error::UndecodableKey { .. } => StatusCode::BAD_REQUEST,
            docstore_models::Error::Storage(error) => error.get_status(),
        }
    }

    fn get_type(&self) -> &str {
        match self {
            docstore_models::Error::NotFound { .. } => NOT_FOUND_ERROR,
            docstore_models::Error::InvalidId { .. }
            | docstore_models::Error::UndecodableKey { .. } => VALIDATION_ERROR,
            docstore_models::Error::Storage(error) => error.get_type(),
        }
    }

    fn context(&self) -> HashMap<String, Value> {
        match self {
            docstore_models::Error::NotFound { key }
            | docstore_models::Error::UndecodableKey { key } => {
                [("key".to_string(), json!(key))].into()
            }
            docstore_models::Error::InvalidId { id, .. } => [("id".to_string(), json!(id))].into(),
            docstore_models::Error::Storage(error) => error.context(),
        }
    }
}
