//! Naming convention of the blobs in the document container
//!
//! A key either is a document id, in which case it holds the document content,
//! or has the form `<document id>_<file name>` and holds a file attached to that document.
//! Document ids never contain `_`, so the first `_` of a key always ends the owner id.
//! File names may contain `_`.

use std::fmt::Display;
use std::fmt::Formatter;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::Error;
use crate::Result;

pub const SEPARATOR: char = '_';

/// Identifier of a document, also the key of its content blob
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "String", into = "String")]
#[schema(value_type = String, example = "0b4fce60-8a5e-4c4b-9f8e-5a9c3bb1f6d2")]
pub struct DocumentId(String);

impl DocumentId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for DocumentId {
    type Err = Error;

    fn from_str(id: &str) -> Result<Self> {
        let reason = if id.is_empty() {
            Some("it is empty")
        } else if id.contains(SEPARATOR) {
            Some("it contains '_'")
        } else if id.contains('/') {
            Some("it contains '/'")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(Error::InvalidId {
                id: id.to_owned(),
                reason,
            }),
            None => Ok(Self(id.to_owned())),
        }
    }
}

impl TryFrom<String> for DocumentId {
    type Error = Error;

    fn try_from(id: String) -> Result<Self> {
        id.parse()
    }
}

impl From<DocumentId> for String {
    fn from(id: DocumentId) -> Self {
        id.0
    }
}

impl AsRef<str> for DocumentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for DocumentId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobKey {
    Content(DocumentId),
    Attachment {
        owner: DocumentId,
        file_name: String,
    },
}

impl BlobKey {
    pub fn attachment(owner: DocumentId, file_name: impl Into<String>) -> Self {
        Self::Attachment {
            owner,
            file_name: file_name.into(),
        }
    }

    /// Prefix shared by the keys of every file attached to `owner`
    pub fn attachment_prefix(owner: &DocumentId) -> String {
        format!("{owner}{SEPARATOR}")
    }
}

impl FromStr for BlobKey {
    type Err = Error;

    fn from_str(key: &str) -> Result<Self> {
        let undecodable = || Error::UndecodableKey {
            key: key.to_owned(),
        };
        match key.split_once(SEPARATOR) {
            None => key.parse().map(Self::Content).map_err(|_| undecodable()),
            Some((_, file_name)) if file_name.is_empty() || file_name.contains('/') => {
                Err(undecodable())
            }
            Some((owner, file_name)) => Ok(Self::Attachment {
                owner: owner.parse().map_err(|_| undecodable())?,
                file_name: file_name.to_owned(),
            }),
        }
    }
}

impl Display for BlobKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Content(id) => write!(f, "{id}"),
            Self::Attachment { owner, file_name } => write!(f, "{owner}{SEPARATOR}{file_name}"),
        }
    }
}
