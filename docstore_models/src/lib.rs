pub mod blob_key;
pub mod document;

pub use blob_key::BlobKey;
pub use blob_key::DocumentId;
pub use document::Attachment;
pub use document::Document;
pub use document::OrphanedAttachment;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("document '{key}' not found")]
    NotFound { key: String },
    #[error("invalid document id '{id}': {reason}")]
    InvalidId { id: String, reason: &'static str },
    #[error("key '{key}' doesn't follow the document naming convention")]
    UndecodableKey { key: String },
    #[error(transparent)]
    Storage(storage::Error),
}

impl From<storage::Error> for Error {
    fn from(error: storage::Error) -> Self {
        match error {
            storage::Error::NotFound { key } => Error::NotFound { key },
            error => Error::Storage(error),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
