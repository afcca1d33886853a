//! PasteService: write, read and delete orchestration over either backend.
//!
//! Size bounds are checked before any storage I/O. On the disk backend a key
//! is allocated by generating ids until the namespace reports one absent;
//! that check and the following write are not atomic, so two concurrent
//! writers drawing the same id in the same namespace can overwrite each
//! other. On the IPFS backend the content hash is the key.

use crate::{
    config::{AppConfig, BackendKind, MIN_PASTE_SIZE},
    models::{
        namespace::Namespace,
        paste::{StoredPaste, is_safe_segment},
    },
    services::id_generator::IdGenerator,
    storage::{
        PasteStore, StorageError,
        disk::DiskStore,
        ipfs::{IpfsCli, IpfsClient, IpfsStore},
    },
};
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Upper bound on id draws before a namespace is considered full.
const MAX_KEY_ATTEMPTS: usize = 1024;

#[derive(Debug, Error)]
pub enum PasteError {
    #[error("paste too large (maximum size {max} bytes)")]
    TooLarge { max: usize },
    #[error("paste too small (minimum size {min} bytes)")]
    TooSmall { min: usize },
    #[error("paste `{0}` not found")]
    NotFound(String),
    #[error("invalid filename `{0}`")]
    InvalidFilename(String),
    #[error(transparent)]
    InvalidNamespace(#[from] crate::models::namespace::InvalidNamespace),
    #[error("no free key left in namespace `{0}`")]
    KeySpaceExhausted(Namespace),
    #[error("{0} is not supported by the {1} backend")]
    Unsupported(&'static str, BackendKind),
    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for PasteError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => PasteError::NotFound(key),
            other => PasteError::Storage(other),
        }
    }
}

pub type PasteResult<T> = Result<T, PasteError>;

/// Inclusive size bounds for paste content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeLimits {
    pub min: usize,
    pub max: usize,
}

impl SizeLimits {
    pub fn new(max: usize) -> Self {
        Self {
            min: MIN_PASTE_SIZE,
            max,
        }
    }

    pub fn check(&self, len: usize) -> PasteResult<()> {
        if len > self.max {
            Err(PasteError::TooLarge { max: self.max })
        } else if len < self.min {
            Err(PasteError::TooSmall { min: self.min })
        } else {
            Ok(())
        }
    }
}

/// Storage selected at startup.
#[derive(Clone)]
pub enum Backend {
    Disk(DiskStore),
    Ipfs(IpfsStore),
}

impl Backend {
    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::Disk(_) => BackendKind::Disk,
            Backend::Ipfs(_) => BackendKind::Ipfs,
        }
    }
}

#[derive(Clone)]
pub struct PasteService {
    backend: Backend,
    ids: IdGenerator,
    limits: SizeLimits,
    temp_namespace: String,
}

impl PasteService {
    pub fn new(
        backend: Backend,
        ids: IdGenerator,
        limits: SizeLimits,
        temp_namespace: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            ids,
            limits,
            temp_namespace: temp_namespace.into(),
        }
    }

    /// Build the service for the configured backend, talking to IPFS through
    /// the configured client binary.
    pub fn from_config(cfg: &AppConfig, ids: IdGenerator) -> Self {
        let client: Arc<dyn IpfsClient> = Arc::new(IpfsCli::new(cfg.ipfs_bin.clone()));
        Self::with_ipfs_client(cfg, ids, client)
    }

    /// Like [`PasteService::from_config`] with an explicit IPFS client.
    pub fn with_ipfs_client(cfg: &AppConfig, ids: IdGenerator, client: Arc<dyn IpfsClient>) -> Self {
        let backend = match cfg.backend {
            BackendKind::Disk => Backend::Disk(DiskStore::new(&cfg.storage_dir, cfg.cache_size)),
            BackendKind::Ipfs => {
                Backend::Ipfs(IpfsStore::new(client, &cfg.storage_dir, ids.clone()))
            }
        };
        Self::new(
            backend,
            ids,
            SizeLimits::new(cfg.max_paste_size),
            cfg.temp_namespace.clone(),
        )
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// Whether pastes in `namespace` are erased after their first read.
    pub fn is_single_use(&self, namespace: &Namespace) -> bool {
        matches!(self.backend, Backend::Disk(_)) && namespace.is(&self.temp_namespace)
    }

    /// Store `data` and return where it can be read back.
    ///
    /// `filename` contributes its extension to disk keys and is preserved
    /// verbatim as `hash/filename` on IPFS.
    pub async fn write_paste(
        &self,
        namespace: &Namespace,
        filename: Option<&str>,
        data: Bytes,
    ) -> PasteResult<StoredPaste> {
        self.limits.check(data.len())?;
        let filename = filename.filter(|name| !name.is_empty());

        match &self.backend {
            Backend::Disk(disk) => {
                let store = disk.scoped(namespace);
                let key = self.allocate_key(&store, namespace, filename).await?;
                store.write(&key, data).await?;
                Ok(StoredPaste {
                    namespace: namespace.clone(),
                    key,
                })
            }
            Backend::Ipfs(ipfs) => {
                if let Some(name) = filename {
                    if !is_safe_segment(name) {
                        return Err(PasteError::InvalidFilename(name.to_string()));
                    }
                }
                let key = ipfs.add(filename, &data).await?;
                Ok(StoredPaste {
                    namespace: Namespace::root(),
                    key,
                })
            }
        }
    }

    /// Generate ids until one is absent from `store`.
    async fn allocate_key<S: PasteStore>(
        &self,
        store: &S,
        namespace: &Namespace,
        filename: Option<&str>,
    ) -> PasteResult<String> {
        for _ in 0..MAX_KEY_ATTEMPTS {
            let candidate = self.ids.new_key(filename);
            if !store.has(&candidate).await? {
                return Ok(candidate);
            }
            debug!(namespace = %namespace, key = %candidate, "key collision, regenerating");
        }
        Err(PasteError::KeySpaceExhausted(namespace.clone()))
    }

    /// Fetch the bytes stored under `key`.
    pub async fn read_paste(&self, namespace: &Namespace, key: &str) -> PasteResult<Bytes> {
        let content = match &self.backend {
            Backend::Disk(disk) => disk.scoped(namespace).read(key).await?,
            Backend::Ipfs(ipfs) => ipfs.cat(key).await?,
        };
        Ok(content)
    }

    /// Erase a paste after confirming it exists.
    pub async fn delete_paste(&self, namespace: &Namespace, key: &str) -> PasteResult<()> {
        match &self.backend {
            Backend::Disk(disk) => {
                let store = disk.scoped(namespace);
                store.read(key).await?;
                store.erase(key).await?;
                Ok(())
            }
            Backend::Ipfs(_) => Err(PasteError::Unsupported("delete", BackendKind::Ipfs)),
        }
    }

    /// Mark a paste as delivered. Single-use pastes are erased; a paste
    /// consumed concurrently by another reader reports `NotFound`.
    pub async fn consume_paste(&self, namespace: &Namespace, key: &str) -> PasteResult<()> {
        if self.is_single_use(namespace) {
            self.delete_paste(namespace, key).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn disk_service(dir: &TempDir, max: usize) -> PasteService {
        PasteService::new(
            Backend::Disk(DiskStore::new(dir.path(), 1024 * 1024)),
            IdGenerator::with_seed(4, 11),
            SizeLimits::new(max),
            "temp",
        )
    }

    fn dir_is_empty(dir: &TempDir) -> bool {
        std::fs::read_dir(dir.path()).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn written_paste_reads_back_identically() {
        let dir = TempDir::new().unwrap();
        let service = disk_service(&dir, 1024);
        let ns = Namespace::root();
        let payload = Bytes::from_static(b"\x00\x01 binary-safe paste \xff\xfe");

        let stored = service.write_paste(&ns, None, payload.clone()).await.unwrap();

        assert_eq!(stored.key.len(), 4);
        assert_eq!(service.read_paste(&ns, &stored.key).await.unwrap(), payload);
    }

    #[tokio::test]
    async fn size_bounds_are_inclusive_and_checked_before_io() {
        let dir = TempDir::new().unwrap();
        let service = disk_service(&dir, 32);
        let ns = Namespace::named("bounds").unwrap();

        let small = service
            .write_paste(&ns, None, Bytes::from(vec![b'a'; 15]))
            .await;
        assert!(matches!(small, Err(PasteError::TooSmall { min: 16 })));

        let large = service
            .write_paste(&ns, None, Bytes::from(vec![b'a'; 33]))
            .await;
        assert!(matches!(large, Err(PasteError::TooLarge { max: 32 })));
        assert!(dir_is_empty(&dir), "rejected writes must not touch storage");

        for len in [16, 32] {
            service
                .write_paste(&ns, None, Bytes::from(vec![b'a'; len]))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn keys_are_unique_within_a_namespace() {
        let dir = TempDir::new().unwrap();
        // One-character ids collide quickly.
        let service = PasteService::new(
            Backend::Disk(DiskStore::new(dir.path(), 1024 * 1024)),
            IdGenerator::with_seed(1, 3),
            SizeLimits::new(1024),
            "temp",
        );
        let ns = Namespace::root();

        let mut keys = HashSet::new();
        for i in 0..40 {
            let body = format!("distinct payload number {}", i);
            let stored = service.write_paste(&ns, None, Bytes::from(body)).await.unwrap();
            assert!(keys.insert(stored.key), "duplicate key issued");
        }
        assert_eq!(keys.len(), 40);
    }

    #[tokio::test]
    async fn full_namespace_reports_exhaustion() {
        let dir = TempDir::new().unwrap();
        let service = PasteService::new(
            Backend::Disk(DiskStore::new(dir.path(), 1024 * 1024)),
            IdGenerator::with_seed(1, 3),
            SizeLimits::new(1024),
            "temp",
        );
        let ns = Namespace::root();
        for _ in 0..62 {
            service
                .write_paste(&ns, None, Bytes::from_static(b"filling the key space"))
                .await
                .unwrap();
        }
        let result = service
            .write_paste(&ns, None, Bytes::from_static(b"one paste too many"))
            .await;
        assert!(matches!(result, Err(PasteError::KeySpaceExhausted(_))));
    }

    #[tokio::test]
    async fn unknown_key_is_not_found() {
        let dir = TempDir::new().unwrap();
        let service = disk_service(&dir, 1024);
        for key in ["none", "../../etc/passwd", ""] {
            let result = service.read_paste(&Namespace::root(), key).await;
            assert!(matches!(result, Err(PasteError::NotFound(_))), "key: {:?}", key);
        }
    }

    #[tokio::test]
    async fn temp_pastes_are_read_exactly_once() {
        let dir = TempDir::new().unwrap();
        let service = disk_service(&dir, 1024);
        let temp = Namespace::named("temp").unwrap();

        let stored = service
            .write_paste(&temp, Some("secret.txt"), Bytes::from_static(b"single use secret!"))
            .await
            .unwrap();
        assert!(stored.key.ends_with(".txt"));

        let first = service.read_paste(&temp, &stored.key).await.unwrap();
        assert_eq!(first, "single use secret!");
        let again = service.read_paste(&temp, &stored.key).await.unwrap();
        assert_eq!(again, first, "reading alone must not erase");

        service.consume_paste(&temp, &stored.key).await.unwrap();
        let second = service.read_paste(&temp, &stored.key).await;
        assert!(matches!(second, Err(PasteError::NotFound(_))));
        let twice = service.consume_paste(&temp, &stored.key).await;
        assert!(matches!(twice, Err(PasteError::NotFound(_))));
    }

    #[tokio::test]
    async fn regular_pastes_survive_reads() {
        let dir = TempDir::new().unwrap();
        let service = disk_service(&dir, 1024);
        let ns = Namespace::named("keep").unwrap();

        let stored = service
            .write_paste(&ns, None, Bytes::from_static(b"read me many times"))
            .await
            .unwrap();
        for _ in 0..3 {
            service.read_paste(&ns, &stored.key).await.unwrap();
            service.consume_paste(&ns, &stored.key).await.unwrap();
        }
    }

    #[tokio::test]
    async fn delete_requires_existing_paste() {
        let dir = TempDir::new().unwrap();
        let service = disk_service(&dir, 1024);
        let result = service.delete_paste(&Namespace::root(), "gone").await;
        assert!(matches!(result, Err(PasteError::NotFound(_))));
    }

    #[tokio::test]
    async fn namespaces_are_separate_directories() {
        let dir = TempDir::new().unwrap();
        let service = disk_service(&dir, 1024);
        let a = Namespace::named("alpha").unwrap();
        let b = Namespace::named("beta").unwrap();

        let stored = service
            .write_paste(&a, None, Bytes::from_static(b"only lives in alpha"))
            .await
            .unwrap();

        assert!(dir.path().join("_alpha").join(&stored.key).is_file());
        assert!(matches!(
            service.read_paste(&b, &stored.key).await,
            Err(PasteError::NotFound(_))
        ));
    }
}
