//! Storage backends for paste bytes.
//!
//! Two backends exist: [`disk::DiskStore`] keeps one file per paste under a
//! namespace directory with an in-memory cache on top, and
//! [`ipfs::IpfsStore`] hands content to an IPFS node through its command
//! line client. Only the disk backend has a meaningful existence probe and
//! erase, so only it implements [`PasteStore`].

pub mod disk;
pub mod ipfs;

use async_trait::async_trait;
use bytes::Bytes;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("key `{0}` not found")]
    NotFound(String),
    #[error("`{program}` exited with {status}: {stderr}")]
    Subprocess {
        program: String,
        status: String,
        stderr: String,
    },
    #[error("unexpected output from `{program}`: {output}")]
    MalformedOutput { program: String, output: String },
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Key to bytes mapping scoped to a single namespace.
#[async_trait]
pub trait PasteStore: Send + Sync {
    /// Whether `key` currently resolves to stored bytes.
    async fn has(&self, key: &str) -> StorageResult<bool>;

    /// Read the bytes stored under `key`, or [`StorageError::NotFound`].
    async fn read(&self, key: &str) -> StorageResult<Bytes>;

    /// Store `data` under `key`, replacing anything already there.
    async fn write(&self, key: &str, data: Bytes) -> StorageResult<()>;

    /// Remove `key` from the store.
    async fn erase(&self, key: &str) -> StorageResult<()>;
}
