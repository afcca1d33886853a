//! Flat-file paste storage with a shared, byte-bounded read cache.
//!
//! Layout is `base_path/_<namespace>/<key>`, one file per paste, no sharding.
//! Writes land in a temporary file first and are renamed into place so a
//! reader never observes a half-written paste.

use super::{PasteStore, StorageError, StorageResult};
use crate::models::{namespace::Namespace, paste::is_safe_key};
use async_trait::async_trait;
use bytes::Bytes;
use moka::future::Cache;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

type ContentCache = Cache<PathBuf, Bytes>;

/// Root of the disk backend. Cheap to clone; clones share the cache.
#[derive(Clone)]
pub struct DiskStore {
    base_path: PathBuf,
    cache: ContentCache,
}

impl DiskStore {
    /// Create a store rooted at `base_path` whose cache holds at most
    /// `cache_bytes` bytes of paste content.
    pub fn new(base_path: impl Into<PathBuf>, cache_bytes: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(cache_bytes)
            .weigher(|_path: &PathBuf, content: &Bytes| -> u32 {
                u32::try_from(content.len()).unwrap_or(u32::MAX)
            })
            .build();

        Self {
            base_path: base_path.into(),
            cache,
        }
    }

    /// A view of the store limited to one namespace directory.
    ///
    /// The directory is created on the first write, not here.
    pub fn scoped(&self, namespace: &Namespace) -> DiskNamespace {
        DiskNamespace {
            root: self.base_path.join(namespace.dir_name()),
            cache: self.cache.clone(),
        }
    }
}

/// One namespace directory of a [`DiskStore`].
#[derive(Clone)]
pub struct DiskNamespace {
    root: PathBuf,
    cache: ContentCache,
}

impl DiskNamespace {
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a key to its file path.
    ///
    /// Unsafe keys are reported as missing so they can never escape the
    /// namespace directory.
    fn paste_path(&self, key: &str) -> StorageResult<PathBuf> {
        if !is_safe_key(key) {
            return Err(StorageError::NotFound(key.to_string()));
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl PasteStore for DiskNamespace {
    async fn has(&self, key: &str) -> StorageResult<bool> {
        let path = match self.paste_path(key) {
            Ok(path) => path,
            Err(_) => return Ok(false),
        };
        if self.cache.contains_key(&path) {
            return Ok(true);
        }
        Ok(fs::try_exists(&path).await?)
    }

    async fn read(&self, key: &str) -> StorageResult<Bytes> {
        let path = self.paste_path(key)?;
        if let Some(content) = self.cache.get(&path).await {
            return Ok(content);
        }

        let content = match fs::read(&path).await {
            Ok(bytes) => Bytes::from(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(key.to_string()));
            }
            Err(err) => return Err(StorageError::Io(err)),
        };
        self.cache.insert(path, content.clone()).await;
        Ok(content)
    }

    async fn write(&self, key: &str, data: Bytes) -> StorageResult<()> {
        let path = self.paste_path(key)?;
        fs::create_dir_all(&self.root).await?;

        let tmp_path = self.root.join(format!(".tmp-{}", Uuid::new_v4()));
        if let Err(err) = write_synced(&tmp_path, &data).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }

        if let Err(err) = fs::rename(&tmp_path, &path).await {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(&path).await?;
                fs::rename(&tmp_path, &path).await?;
            } else {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StorageError::Io(err));
            }
        }

        self.cache.insert(path, data).await;
        Ok(())
    }

    async fn erase(&self, key: &str) -> StorageResult<()> {
        let path = self.paste_path(key)?;
        self.cache.invalidate(&path).await;
        match fs::remove_file(&path).await {
            Ok(_) => debug!("removed paste file {}", path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("paste file {} already missing", path.display());
            }
            Err(err) => return Err(StorageError::Io(err)),
        }
        Ok(())
    }
}

async fn write_synced(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut file = File::create(path).await?;
    file.write_all(data).await?;
    file.flush().await?;
    file.sync_all().await
}
