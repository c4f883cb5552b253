//! Documents stored in the blob container
//!
//! A document is a text content, optionally accompanied by one attached file.
//! See [crate::blob_key] for how both are laid out in the container.

use std::collections::HashSet;

use bytes::Bytes;
use futures::StreamExt as _;
use futures::TryStreamExt as _;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::info;
use tracing::warn;
use utoipa::ToSchema;

use crate::BlobKey;
use crate::DocumentId;
use crate::Result;

/// Number of characters of the content kept in listing descriptions
const DESCRIPTION_LENGTH: usize = 30;
/// Maximum number of content blobs read concurrently while listing
const LIST_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Document {
    /// Key of the document, or the id of the owning document for listed attachments
    pub id: String,
    /// Truncated content, only set in listings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether this listing entry describes an attached file
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_file: bool,
    /// The text content, or the file name for listed attachments
    pub content: String,
    /// Key of the attached file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
}

/// Listing preview of a content: its first characters, followed by `...` if it was truncated
pub fn describe(content: &str) -> String {
    match content.char_indices().nth(DESCRIPTION_LENGTH) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_owned(),
    }
}

/// A file uploaded alongside a document
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    file_name: String,
    data: Bytes,
}

impl Attachment {
    /// Only the last component of `file_name` is kept
    ///
    /// Returns `None` when no file name is left, meaning no file was actually submitted.
    pub fn new(file_name: &str, data: Bytes) -> Option<Self> {
        let file_name = file_name.rsplit(['/', '\\']).next().unwrap_or_default();
        if file_name.is_empty() {
            return None;
        }
        Some(Self {
            file_name: file_name.to_owned(),
            data,
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }
}

/// Blobs to write for a document
#[derive(Debug, Default)]
pub struct DocumentChangeset {
    content: String,
    attachment: Option<Attachment>,
}

impl DocumentChangeset {
    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn attachment(self, attachment: Attachment) -> Self {
        self.flat_attachment(Some(attachment))
    }

    pub fn flat_attachment(mut self, attachment: Option<Attachment>) -> Self {
        self.attachment = attachment;
        self
    }

    /// Stores a new document under a freshly generated id
    pub async fn create(self, storage: &storage::Client) -> Result<Document> {
        self.write(storage, DocumentId::generate()).await
    }

    /// Stores the document under `id`, replacing whatever content was there
    ///
    /// The document doesn't need to exist beforehand. Files attached by previous
    /// writes are left untouched.
    pub async fn overwrite(self, storage: &storage::Client, id: DocumentId) -> Result<Document> {
        self.write(storage, id).await
    }

    /// Writes the attachment before the content, a document being visible as soon as
    /// its content blob exists
    #[tracing::instrument(skip_all, fields(%id), err)]
    async fn write(self, storage: &storage::Client, id: DocumentId) -> Result<Document> {
        let Self {
            content,
            attachment,
        } = self;

        let file_id = match attachment {
            Some(Attachment { file_name, data }) => {
                let key = BlobKey::attachment(id.clone(), file_name).to_string();
                storage.put(&key, data).await?;
                Some(key)
            }
            None => None,
        };

        if let Err(error) = storage.put(id.as_str(), Bytes::from(content.clone())).await {
            if let Some(file_id) = &file_id {
                match storage.delete(file_id).await {
                    Ok(()) => info!(key = %file_id, "removed the attachment of a failed write"),
                    Err(cleanup_error) => warn!(
                        key = %file_id,
                        error = %cleanup_error,
                        "could not remove the attachment of a failed write"
                    ),
                }
            }
            return Err(error.into());
        }

        info!(has_attachment = file_id.is_some(), "document stored");
        Ok(Document {
            id: id.to_string(),
            description: None,
            is_file: false,
            content,
            file_id,
        })
    }
}

/// An attached file whose document no longer exists
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrphanedAttachment {
    pub key: String,
    pub owner: DocumentId,
}

impl Document {
    pub fn changeset() -> DocumentChangeset {
        DocumentChangeset::default()
    }

    /// Reads any key of the container, content or attachment, as text
    ///
    /// Invalid UTF-8 sequences are replaced.
    pub async fn retrieve(storage: &storage::Client, key: &str) -> Result<Self> {
        let data = storage.get(key).await?;
        Ok(Self {
            id: key.to_owned(),
            description: None,
            is_file: false,
            content: String::from_utf8_lossy(&data).into_owned(),
            file_id: None,
        })
    }

    pub async fn download(storage: &storage::Client, key: &str) -> Result<Bytes> {
        Ok(storage.get(key).await?)
    }

    /// Deletes a key, and all attached files when it is the key of a document content
    ///
    /// Failing to remove an attached file doesn't fail the deletion.
    #[tracing::instrument(skip(storage), err)]
    pub async fn delete(storage: &storage::Client, key: &str) -> Result<()> {
        storage.delete(key).await?;

        let Ok(BlobKey::Content(id)) = key.parse::<BlobKey>() else {
            return Ok(());
        };
        let attachments = match storage
            .list_starting_with(&BlobKey::attachment_prefix(&id))
            .await
        {
            Ok(attachments) => attachments,
            Err(error) => {
                warn!(%error, "could not list the attachments of the deleted document");
                return Ok(());
            }
        };
        for attachment in attachments {
            match storage.delete(&attachment).await {
                Ok(()) => info!(key = %attachment, "attachment deleted"),
                Err(error) => warn!(key = %attachment, %error, "could not delete attachment"),
            }
        }
        Ok(())
    }

    /// Lists every key of the container in the storage enumeration order
    ///
    /// Document contents are read to build their description. Attached files are
    /// reported as separate entries, flagged with `is_file`, whose content is the file name.
    /// Keys outside the naming convention are skipped.
    #[tracing::instrument(skip_all, err)]
    pub async fn list(storage: &storage::Client) -> Result<Vec<Self>> {
        let keys = storage.list().await?;
        debug!(count = keys.len(), "listed keys");
        let documents: Vec<Option<Self>> = futures::stream::iter(keys)
            .map(|key| Self::from_listed_key(storage, key))
            .buffered(LIST_CONCURRENCY)
            .try_collect()
            .await?;
        Ok(documents.into_iter().flatten().collect())
    }

    async fn from_listed_key(storage: &storage::Client, key: String) -> Result<Option<Self>> {
        let blob_key = match key.parse::<BlobKey>() {
            Ok(blob_key) => blob_key,
            Err(error) => {
                warn!(%key, %error, "skipping key");
                return Ok(None);
            }
        };
        match blob_key {
            BlobKey::Attachment { owner, file_name } => Ok(Some(Self {
                id: owner.to_string(),
                description: Some(describe(&file_name)),
                is_file: true,
                content: file_name,
                file_id: Some(key),
            })),
            BlobKey::Content(id) => match storage.get(id.as_str()).await {
                Ok(data) => {
                    let content = String::from_utf8_lossy(&data).into_owned();
                    Ok(Some(Self {
                        id: id.to_string(),
                        description: Some(describe(&content)),
                        is_file: false,
                        content,
                        file_id: None,
                    }))
                }
                Err(storage::Error::NotFound { .. }) => {
                    debug!(%key, "document deleted while listing");
                    Ok(None)
                }
                Err(error) => Err(error.into()),
            },
        }
    }

    /// Attached files of documents that no longer exist
    pub async fn orphaned_attachments(
        storage: &storage::Client,
    ) -> Result<Vec<OrphanedAttachment>> {
        let keys: Vec<(String, BlobKey)> = storage
            .list()
            .await?
            .into_iter()
            .filter_map(|key| key.parse().ok().map(|blob_key| (key, blob_key)))
            .collect();
        let documents: HashSet<&DocumentId> = keys
            .iter()
            .filter_map(|(_, blob_key)| match blob_key {
                BlobKey::Content(id) => Some(id),
                BlobKey::Attachment { .. } => None,
            })
            .collect();
        Ok(keys
            .iter()
            .filter_map(|(key, blob_key)| match blob_key {
                BlobKey::Attachment { owner, .. } if !documents.contains(owner) => {
                    Some(OrphanedAttachment {
                        key: key.clone(),
                        owner: owner.clone(),
                    })
                }
                _ => None,
            })
            .collect())
    }
}
