//! IPFS-backed paste storage.
//!
//! Content is staged to a local directory, added to the node with the
//! `ipfs` client and then addressed by the returned hash. Named uploads are
//! added recursively from a directory so the filename survives as
//! `hash/filename`.

use super::{StorageError, StorageResult};
use crate::{models::paste::is_safe_ipfs_key, services::id_generator::IdGenerator};
use async_trait::async_trait;
use bytes::Bytes;
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{fs, process::Command};
use tracing::{debug, warn};

const STAGING_ATTEMPTS: usize = 32;
const UNNAMED_STAGE_FILE: &str = "paste";

/// The subset of the IPFS client the store relies on.
#[async_trait]
pub trait IpfsClient: Send + Sync {
    /// Add a file (or a directory when `recursive`) and return the root hash.
    async fn add(&self, path: &Path, recursive: bool) -> StorageResult<String>;

    /// Fetch the content addressed by `key`.
    async fn cat(&self, key: &str) -> StorageResult<Bytes>;
}

/// [`IpfsClient`] backed by the `ipfs` command line binary.
#[derive(Debug, Clone)]
pub struct IpfsCli {
    program: String,
}

impl IpfsCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl IpfsClient for IpfsCli {
    async fn add(&self, path: &Path, recursive: bool) -> StorageResult<String> {
        let mut cmd = Command::new(&self.program);
        cmd.arg("add");
        if recursive {
            cmd.arg("-r");
        }
        let output = cmd.arg(path).output().await?;

        if !output.status.success() {
            return Err(StorageError::Subprocess {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_add_output(&stdout).ok_or_else(|| StorageError::MalformedOutput {
            program: self.program.clone(),
            output: stdout.trim().to_string(),
        })
    }

    async fn cat(&self, key: &str) -> StorageResult<Bytes> {
        let output = Command::new(&self.program)
            .arg("cat")
            .arg(key)
            .output()
            .await?;

        if !output.status.success() {
            debug!(
                "`{} cat {}` exited with {}: {}",
                self.program,
                key,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return Err(StorageError::NotFound(key.to_string()));
        }

        Ok(Bytes::from(output.stdout))
    }
}

/// Extract the root hash from `ipfs add` output.
///
/// Each added entry prints `added <hash> <name>`; for a recursive add the
/// wrapping directory comes last, so the last non-empty line names the root.
pub fn parse_add_output(output: &str) -> Option<String> {
    let line = output.lines().rev().find(|line| !line.trim().is_empty())?;
    line.split_whitespace().nth(1).map(str::to_string)
}

/// Paste storage on top of an [`IpfsClient`].
#[derive(Clone)]
pub struct IpfsStore {
    client: Arc<dyn IpfsClient>,
    staging_root: PathBuf,
    ids: IdGenerator,
}

impl IpfsStore {
    pub fn new(client: Arc<dyn IpfsClient>, staging_root: impl Into<PathBuf>, ids: IdGenerator) -> Self {
        Self {
            client,
            staging_root: staging_root.into(),
            ids,
        }
    }

    /// Stage `data`, add it to IPFS and return its key.
    ///
    /// The key is `hash/filename` when a filename is given, `hash` otherwise.
    /// Staging artifacts are removed afterwards; a failed removal is logged
    /// since the content is already stored by then.
    pub async fn add(&self, filename: Option<&str>, data: &[u8]) -> StorageResult<String> {
        let staging = self.create_staging_dir().await?;
        let result = self.add_staged(&staging, filename, data).await;

        if let Err(err) = fs::remove_dir_all(&staging).await {
            warn!(
                "failed to remove staging directory {}: {}",
                staging.display(),
                err
            );
        }

        result
    }

    async fn add_staged(
        &self,
        staging: &Path,
        filename: Option<&str>,
        data: &[u8],
    ) -> StorageResult<String> {
        match filename {
            Some(name) => {
                fs::write(staging.join(name), data).await?;
                let hash = self.client.add(staging, true).await?;
                Ok(format!("{}/{}", hash, name))
            }
            None => {
                let file = staging.join(UNNAMED_STAGE_FILE);
                fs::write(&file, data).await?;
                self.client.add(&file, false).await
            }
        }
    }

    /// Read the content behind `hash` or `hash/filename`.
    ///
    /// Every failure of the node, including a missing object, is reported as
    /// [`StorageError::NotFound`].
    pub async fn cat(&self, key: &str) -> StorageResult<Bytes> {
        if !is_safe_ipfs_key(key) {
            return Err(StorageError::NotFound(key.to_string()));
        }
        self.client.cat(key).await
    }

    async fn create_staging_dir(&self) -> StorageResult<PathBuf> {
        fs::create_dir_all(&self.staging_root).await?;
        for _ in 0..STAGING_ATTEMPTS {
            let candidate = self
                .staging_root
                .join(format!(".stage-{}", self.ids.new_id()));
            match fs::create_dir(&candidate).await {
                Ok(()) => return Ok(candidate),
                Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
                Err(err) => return Err(StorageError::Io(err)),
            }
        }
        Err(StorageError::Io(std::io::Error::new(
            ErrorKind::AlreadyExists,
            "could not allocate a staging directory",
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingClient {
        adds: Mutex<Vec<(PathBuf, bool, Vec<String>)>>,
    }

    #[async_trait]
    impl IpfsClient for RecordingClient {
        async fn add(&self, path: &Path, recursive: bool) -> StorageResult<String> {
            let listing = if recursive {
                std::fs::read_dir(path)
                    .unwrap()
                    .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                    .collect()
            } else {
                vec![std::fs::read_to_string(path).unwrap()]
            };
            self.adds
                .lock()
                .unwrap()
                .push((path.to_path_buf(), recursive, listing));
            Ok("QmTestHash".into())
        }

        async fn cat(&self, key: &str) -> StorageResult<Bytes> {
            Err(StorageError::NotFound(key.to_string()))
        }
    }

    #[test]
    fn parses_single_and_recursive_add_output() {
        assert_eq!(
            parse_add_output("added QmFile paste\n").as_deref(),
            Some("QmFile")
        );
        let recursive = "added QmInner abcd/notes.md\nadded QmRoot abcd\n";
        assert_eq!(parse_add_output(recursive).as_deref(), Some("QmRoot"));
        assert_eq!(parse_add_output(""), None);
        assert_eq!(parse_add_output("garbage\n"), None);
    }

    #[tokio::test]
    async fn named_add_is_recursive_and_keeps_filename() {
        let dir = TempDir::new().unwrap();
        let client = Arc::new(RecordingClient::default());
        let store = IpfsStore::new(client.clone(), dir.path(), IdGenerator::with_seed(4, 7));

        let key = store
            .add(Some("notes.md"), b"# some markdown content")
            .await
            .unwrap();

        assert_eq!(key, "QmTestHash/notes.md");
        let adds = client.adds.lock().unwrap();
        assert_eq!(adds.len(), 1);
        assert!(adds[0].1);
        assert_eq!(adds[0].2, vec!["notes.md".to_string()]);
        assert!(!adds[0].0.exists(), "staging dir must be cleaned up");
    }

    #[tokio::test]
    async fn unnamed_add_uses_plain_hash() {
        let dir = TempDir::new().unwrap();
        let client = Arc::new(RecordingClient::default());
        let store = IpfsStore::new(client.clone(), dir.path(), IdGenerator::with_seed(4, 7));

        let key = store.add(None, b"plain paste content").await.unwrap();

        assert_eq!(key, "QmTestHash");
        let adds = client.adds.lock().unwrap();
        assert!(!adds[0].1);
        assert_eq!(adds[0].2, vec!["plain paste content".to_string()]);
    }

    #[cfg(unix)]
    fn stub_binary(dir: &TempDir, script: &str) -> String {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.path().join("ipfs-stub");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", script)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_str().unwrap().to_string()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn cli_failures_map_to_storage_errors() {
        let cli = IpfsCli::new("false");
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("paste");
        std::fs::write(&file, b"never added anywhere").unwrap();

        assert!(matches!(
            cli.cat("QmMissing").await,
            Err(StorageError::NotFound(key)) if key == "QmMissing"
        ));
        assert!(matches!(
            cli.add(&file, false).await,
            Err(StorageError::Subprocess { program, .. }) if program == "false"
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn cli_round_trip_through_stub_binary() {
        let bin = TempDir::new().unwrap();
        let program = stub_binary(
            &bin,
            r#"case "$1" in
  add) [ "$2" = "-r" ] || exit 3; echo "added QmLeaf stage/notes.md"; echo "added QmRoot stage" ;;
  cat) printf 'content of %s' "$2" ;;
  *) exit 2 ;;
esac"#,
        );
        let staging = TempDir::new().unwrap();
        let store = IpfsStore::new(
            Arc::new(IpfsCli::new(program)),
            staging.path(),
            IdGenerator::with_seed(4, 7),
        );

        let key = store
            .add(Some("notes.md"), b"# notes for the stub node")
            .await
            .unwrap();
        assert_eq!(key, "QmRoot/notes.md");
        assert_eq!(
            store.cat(&key).await.unwrap(),
            "content of QmRoot/notes.md"
        );
        assert_eq!(std::fs::read_dir(staging.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unparseable_add_output_is_malformed() {
        let bin = TempDir::new().unwrap();
        let cli = IpfsCli::new(stub_binary(&bin, "echo nothing-useful"));
        let file = bin.path().join("paste");
        std::fs::write(&file, b"content nobody will hash").unwrap();

        assert!(matches!(
            cli.add(&file, false).await,
            Err(StorageError::MalformedOutput { output, .. }) if output == "nothing-useful"
        ));
    }

    #[tokio::test]
    async fn unsafe_cat_keys_never_reach_the_client() {
        let dir = TempDir::new().unwrap();
        let store = IpfsStore::new(
            Arc::new(RecordingClient::default()),
            dir.path(),
            IdGenerator::with_seed(4, 7),
        );
        assert!(matches!(
            store.cat("--help").await,
            Err(StorageError::NotFound(_))
        ));
    }
}
