//! Flat key/value access to the blob container holding documents
//!
//! Keys are opaque strings. Each key is stored as a single object path segment,
//! so characters like `/` never introduce a hierarchy.

mod client;

pub use client::Client;
pub use client::Config;

#[derive(Debug, Clone, Copy, PartialEq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Operation {
    Put,
    Get,
    Head,
    Delete,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("could not initialize the '{backend}' storage backend: {source}")]
    ClientInit {
        backend: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("key '{key}' not found")]
    NotFound { key: String },
    #[error("invalid storage key '{key}'")]
    InvalidKey { key: String },
    #[error("could not list the storage keys: {0}")]
    List(#[source] object_store::Error),
    #[error("storage {operation} failed for '{key}': {source}")]
    Io {
        operation: Operation,
        key: String,
        #[source]
        source: object_store::Error,
    },
}

impl Error {
    fn from_store(operation: Operation, key: &str, source: object_store::Error) -> Self {
        match source {
            object_store::Error::NotFound { .. } => Error::NotFound {
                key: key.to_owned(),
            },
            source => Error::Io {
                operation,
                key: key.to_owned(),
                source,
            },
        }
    }
}
