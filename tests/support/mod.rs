//! Shared integration-test server bootstrap helpers and in-memory fakes.

#![allow(dead_code)]

use async_trait::async_trait;
use axum_test::TestServer;
use bytes::Bytes;
use std::{
    collections::HashMap,
    path::Path,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};
use tempfile::TempDir;
use upldis::{
    AppState,
    config::{AppConfig, BackendKind},
    create_app,
    services::{
        highlighter::{HighlightError, Highlighter},
        id_generator::IdGenerator,
        paste_service::PasteService,
        render_service::RenderPipeline,
    },
    storage::{StorageError, StorageResult, ipfs::IpfsClient},
};

pub const MAX_PASTE_SIZE: usize = 1024;

/// Knows only the `rust` lexer; wraps content in a recognisable page.
#[derive(Default)]
pub struct FakeHighlighter {
    pub calls: AtomicUsize,
}

#[async_trait]
impl Highlighter for FakeHighlighter {
    async fn highlight(
        &self,
        content: Bytes,
        lexer: &str,
        title: &str,
    ) -> Result<String, HighlightError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if lexer != "rust" {
            return Err(HighlightError::Failed {
                status: "exit status: 1".into(),
                stderr: format!("no lexer for alias '{}' found", lexer),
            });
        }
        Ok(format!(
            "<html><head><title>{}</title></head><body><pre class=\"rust\">{}</pre></body></html>",
            title,
            String::from_utf8_lossy(&content)
        ))
    }
}

/// Content-addressed map standing in for an IPFS node.
#[derive(Default)]
pub struct FakeIpfs {
    objects: Mutex<HashMap<String, Bytes>>,
}

impl FakeIpfs {
    fn hash(data: &[u8]) -> String {
        format!("Qm{:x}", md5::compute(data))
    }
}

#[async_trait]
impl IpfsClient for FakeIpfs {
    async fn add(&self, path: &Path, recursive: bool) -> StorageResult<String> {
        let mut objects = self.objects.lock().unwrap();
        if recursive {
            let mut listing = Vec::new();
            for entry in std::fs::read_dir(path)? {
                let entry = entry?;
                let name = entry.file_name().to_string_lossy().into_owned();
                listing.push((name, Bytes::from(std::fs::read(entry.path())?)));
            }
            let mut digest_input = Vec::new();
            for (name, data) in &listing {
                digest_input.extend_from_slice(name.as_bytes());
                digest_input.extend_from_slice(data);
            }
            let root = Self::hash(&digest_input);
            for (name, data) in listing {
                objects.insert(format!("{}/{}", root, name), data);
            }
            Ok(root)
        } else {
            let data = Bytes::from(std::fs::read(path)?);
            let hash = Self::hash(&data);
            objects.insert(hash.clone(), data);
            Ok(hash)
        }
    }

    async fn cat(&self, key: &str) -> StorageResult<Bytes> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }
}

pub struct TestApp {
    pub server: TestServer,
    pub highlighter: Arc<FakeHighlighter>,
    pub dir: TempDir,
}

pub fn test_config(dir: &TempDir, backend: BackendKind) -> AppConfig {
    AppConfig {
        storage_dir: dir.path().to_str().expect("utf-8 temp path").to_string(),
        backend,
        max_paste_size: MAX_PASTE_SIZE,
        cache_size: 64 * 1024,
        ..AppConfig::default()
    }
}

pub fn setup_with_config(dir: TempDir, config: AppConfig) -> TestApp {
    let highlighter = Arc::new(FakeHighlighter::default());
    let pastes = PasteService::with_ipfs_client(
        &config,
        IdGenerator::with_seed(config.id_length, 2024),
        Arc::new(FakeIpfs::default()),
    );
    let renderer = RenderPipeline::new(
        highlighter.clone(),
        config.markdown_namespace.clone(),
        config.strict_lexer,
    );
    let app = create_app(AppState::new(config, pastes, renderer));
    let server = TestServer::new(app).expect("server");
    TestApp {
        server,
        highlighter,
        dir,
    }
}

pub fn setup(backend: BackendKind) -> TestApp {
    let dir = TempDir::new().expect("temp dir");
    let config = test_config(&dir, backend);
    setup_with_config(dir, config)
}

/// Path part (with leading slash) of a URL returned by an upload.
pub fn path_of(url: &str) -> String {
    let url = url.trim_end();
    let without_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    match without_scheme.find('/') {
        Some(idx) => without_scheme[idx..].to_string(),
        None => "/".to_string(),
    }
}
