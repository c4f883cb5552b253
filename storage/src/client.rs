use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use futures::TryStreamExt as _;
use object_store::ObjectStore;
use object_store::PutPayload;
use object_store::azure::MicrosoftAzureBuilder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::Error;
use crate::Operation;

#[derive(Clone)]
pub enum Config {
    /// Keeps every blob in the process memory. This should not be used in production.
    InMemory,
    /// Stores blobs as files under `root`, which is created if missing
    Local { root: PathBuf },
    Azure {
        account: String,
        access_key: String,
        container: String,
        /// Targets a local Azurite emulator instead of the Azure endpoint
        use_emulator: bool,
    },
}

impl Config {
    pub fn backend(&self) -> &'static str {
        match self {
            Config::InMemory => "memory",
            Config::Local { .. } => "local",
            Config::Azure { .. } => "azure",
        }
    }
}

pub struct Client {
    store: Arc<dyn ObjectStore>,
    backend: &'static str,
    #[cfg(any(test, feature = "testing"))]
    rejected_write_suffixes: Vec<String>,
}

fn init_error(
    backend: &'static str,
    source: impl std::error::Error + Send + Sync + 'static,
) -> Error {
    Error::ClientInit {
        backend,
        source: Box::new(source),
    }
}

/// Maps a key onto a single path segment, percent-encoding what object paths don't allow
fn key_path(key: &str) -> Result<Path, Error> {
    if key.is_empty() {
        return Err(Error::InvalidKey {
            key: key.to_owned(),
        });
    }
    Ok(Path::from_iter([key]))
}

fn path_key(location: &Path) -> Option<String> {
    match urlencoding::decode(location.as_ref()) {
        Ok(key) => Some(key.into_owned()),
        Err(error) => {
            warn!(%location, %error, "skipping a key that is not valid UTF-8");
            None
        }
    }
}

impl Client {
    #[tracing::instrument(skip_all, err, level = "info", name = "storage client initialization")]
    pub async fn try_initialize(config: Config) -> Result<Self, Error> {
        let backend = config.backend();
        let store: Arc<dyn ObjectStore> = match config {
            Config::InMemory => Arc::new(InMemory::new()),
            Config::Local { root } => {
                tokio::fs::create_dir_all(&root)
                    .await
                    .map_err(|err| init_error(backend, err))?;
                let store = LocalFileSystem::new_with_prefix(&root)
                    .map_err(|err| init_error(backend, err))?;
                info!(root = %root.display(), "using local storage");
                Arc::new(store)
            }
            Config::Azure {
                account,
                access_key,
                container,
                use_emulator,
            } => {
                info!(%account, %container, use_emulator, "using azure blob storage");
                let store = MicrosoftAzureBuilder::new()
                    .with_account(account)
                    .with_access_key(access_key)
                    .with_container_name(container)
                    .with_use_emulator(use_emulator)
                    .build()
                    .map_err(|err| init_error(backend, err))?;
                Arc::new(store)
            }
        };
        Ok(Self {
            store,
            backend,
            #[cfg(any(test, feature = "testing"))]
            rejected_write_suffixes: Vec::new(),
        })
    }

    /// An empty in-memory storage
    #[cfg(any(test, feature = "testing"))]
    pub fn for_tests() -> Self {
        Self {
            store: Arc::new(InMemory::new()),
            backend: "memory",
            rejected_write_suffixes: Vec::new(),
        }
    }

    /// Makes every write to a key ending with `suffix` fail with an I/O error
    #[cfg(any(test, feature = "testing"))]
    pub fn reject_writes_ending_with(mut self, suffix: impl Into<String>) -> Self {
        self.rejected_write_suffixes.push(suffix.into());
        self
    }

    pub fn backend(&self) -> &'static str {
        self.backend
    }

    #[tracing::instrument(skip(self, data), fields(size = data.len()), err, level = "debug")]
    pub async fn put(&self, key: &str, data: Bytes) -> Result<(), Error> {
        let path = key_path(key)?;
        #[cfg(any(test, feature = "testing"))]
        if let Some(suffix) = self
            .rejected_write_suffixes
            .iter()
            .find(|suffix| key.ends_with(suffix.as_str()))
        {
            return Err(Error::Io {
                operation: Operation::Put,
                key: key.to_owned(),
                source: object_store::Error::Generic {
                    store: "testing",
                    source: format!("writes to keys ending with '{suffix}' are rejected").into(),
                },
            });
        }
        self.store
            .put(&path, PutPayload::from(data))
            .await
            .map_err(|err| Error::from_store(Operation::Put, key, err))?;
        Ok(())
    }

    #[tracing::instrument(skip(self), err, level = "debug")]
    pub async fn get(&self, key: &str) -> Result<Bytes, Error> {
        let path = key_path(key)?;
        let data = self
            .store
            .get(&path)
            .await
            .map_err(|err| Error::from_store(Operation::Get, key, err))?
            .bytes()
            .await
            .map_err(|err| Error::from_store(Operation::Get, key, err))?;
        debug!(size = data.len(), "blob read");
        Ok(data)
    }

    pub async fn exists(&self, key: &str) -> Result<bool, Error> {
        let path = key_path(key)?;
        match self.store.head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(err) => Err(Error::from_store(Operation::Head, key, err)),
        }
    }

    /// Deletes a key, failing with [Error::NotFound] if it doesn't exist
    ///
    /// Some backends treat the deletion of a missing object as a success, hence the lookup.
    #[tracing::instrument(skip(self), err, level = "debug")]
    pub async fn delete(&self, key: &str) -> Result<(), Error> {
        let path = key_path(key)?;
        self.store
            .head(&path)
            .await
            .map_err(|err| Error::from_store(Operation::Head, key, err))?;
        self.store
            .delete(&path)
            .await
            .map_err(|err| Error::from_store(Operation::Delete, key, err))?;
        Ok(())
    }

    /// Every key of the container, in the backend enumeration order
    pub async fn list(&self) -> Result<Vec<String>, Error> {
        let objects: Vec<_> = self
            .store
            .list(None)
            .try_collect()
            .await
            .map_err(Error::List)?;
        Ok(objects
            .iter()
            .filter_map(|object| path_key(&object.location))
            .collect())
    }

    /// Keys starting with `prefix`
    ///
    /// This is a plain string match: object store prefixes only match whole path segments.
    pub async fn list_starting_with(&self, prefix: &str) -> Result<Vec<String>, Error> {
        let mut keys = self.list().await?;
        keys.retain(|key| key.starts_with(prefix));
        Ok(keys)
    }

    /// Checks that the backend answers a listing request
    pub async fn ping(&self) -> Result<(), Error> {
        let mut objects = self.store.list(None);
        objects.try_next().await.map_err(Error::List)?;
        debug!(backend = self.backend, "storage ping successful");
        Ok(())
    }
}
