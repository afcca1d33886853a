use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::{env, fmt, str::FromStr};

/// Smallest paste accepted by the repository.
pub const MIN_PASTE_SIZE: usize = 16;

/// Which storage backend serves pastes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    /// Flat files under `storage_dir/_<namespace>/` with an in-memory cache.
    Disk,
    /// Content-addressed storage through the `ipfs` command line client.
    Ipfs,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "disk" => Ok(Self::Disk),
            "ipfs" => Ok(Self::Ipfs),
            other => Err(format!("unknown backend `{}` (expected disk or ipfs)", other)),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disk => f.write_str("disk"),
            Self::Ipfs => f.write_str("ipfs"),
        }
    }
}

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub backend: BackendKind,
    pub max_paste_size: usize,
    pub cache_size: u64,
    pub id_length: usize,
    pub ipfs_bin: String,
    pub highlighter_bin: String,
    pub highlight_style: String,
    pub temp_namespace: String,
    pub markdown_namespace: String,
    pub static_dir: String,
    pub well_known_dir: String,
    pub strict_lexer: bool,
    pub hsts: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            storage_dir: "pastes".into(),
            backend: BackendKind::Disk,
            max_paste_size: 1024 * 1024 * 1024,
            cache_size: 128 * 1024 * 1024,
            id_length: 4,
            ipfs_bin: "ipfs".into(),
            highlighter_bin: "pygmentize".into(),
            highlight_style: "native".into(),
            temp_namespace: "temp".into(),
            markdown_namespace: "md".into(),
            static_dir: "static".into(),
            well_known_dir: ".well-known".into(),
            strict_lexer: false,
            hsts: false,
        }
    }
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Command line pastebin over HTTP")]
pub struct Args {
    /// Host to bind to (overrides UPLDIS_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides UPLDIS_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Base directory for pastes and IPFS staging (overrides UPLDIS_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Storage backend (overrides UPLDIS_BACKEND)
    #[arg(long, value_enum)]
    pub backend: Option<BackendKind>,

    /// Largest accepted paste in bytes (overrides UPLDIS_MAX_PASTE_SIZE)
    #[arg(long)]
    pub max_paste_size: Option<usize>,

    /// Byte capacity of the disk backend's read cache (overrides UPLDIS_CACHE_SIZE)
    #[arg(long)]
    pub cache_size: Option<u64>,

    /// Length of generated paste ids (overrides UPLDIS_ID_LENGTH)
    #[arg(long)]
    pub id_length: Option<usize>,

    /// IPFS client binary (overrides UPLDIS_IPFS_BIN)
    #[arg(long)]
    pub ipfs_bin: Option<String>,

    /// Syntax highlighter binary (overrides UPLDIS_HIGHLIGHTER_BIN)
    #[arg(long)]
    pub highlighter_bin: Option<String>,

    /// Highlighter colour style (overrides UPLDIS_HIGHLIGHT_STYLE)
    #[arg(long)]
    pub highlight_style: Option<String>,

    /// Namespace whose pastes are erased after one read (overrides UPLDIS_TEMP_NAMESPACE)
    #[arg(long)]
    pub temp_namespace: Option<String>,

    /// Namespace whose pastes are rendered as Markdown (overrides UPLDIS_MARKDOWN_NAMESPACE)
    #[arg(long)]
    pub markdown_namespace: Option<String>,

    /// Directory served under /static (overrides UPLDIS_STATIC_DIR)
    #[arg(long)]
    pub static_dir: Option<String>,

    /// Directory served under /.well-known (overrides UPLDIS_WELL_KNOWN_DIR)
    #[arg(long)]
    pub well_known_dir: Option<String>,

    /// Reject unknown lexers with 400 instead of serving plain text
    #[arg(long)]
    pub strict_lexer: bool,

    /// Send Strict-Transport-Security on reads
    #[arg(long)]
    pub hsts: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        let args = Args::parse();
        Self::merge(args)
    }

    /// Layer parsed CLI args over environment values and defaults.
    pub fn merge(args: Args) -> Result<Self> {
        let defaults = Self::default();

        let cfg = Self {
            host: args.host.unwrap_or(env_string("UPLDIS_HOST", defaults.host)),
            port: match args.port {
                Some(port) => port,
                None => env_parse("UPLDIS_PORT", defaults.port)?,
            },
            storage_dir: args
                .storage_dir
                .unwrap_or(env_string("UPLDIS_STORAGE_DIR", defaults.storage_dir)),
            backend: match args.backend {
                Some(backend) => backend,
                None => env_parse("UPLDIS_BACKEND", defaults.backend)?,
            },
            max_paste_size: match args.max_paste_size {
                Some(size) => size,
                None => env_parse("UPLDIS_MAX_PASTE_SIZE", defaults.max_paste_size)?,
            },
            cache_size: match args.cache_size {
                Some(size) => size,
                None => env_parse("UPLDIS_CACHE_SIZE", defaults.cache_size)?,
            },
            id_length: match args.id_length {
                Some(len) => len,
                None => env_parse("UPLDIS_ID_LENGTH", defaults.id_length)?,
            },
            ipfs_bin: args
                .ipfs_bin
                .unwrap_or(env_string("UPLDIS_IPFS_BIN", defaults.ipfs_bin)),
            highlighter_bin: args.highlighter_bin.unwrap_or(env_string(
                "UPLDIS_HIGHLIGHTER_BIN",
                defaults.highlighter_bin,
            )),
            highlight_style: args.highlight_style.unwrap_or(env_string(
                "UPLDIS_HIGHLIGHT_STYLE",
                defaults.highlight_style,
            )),
            temp_namespace: args
                .temp_namespace
                .unwrap_or(env_string("UPLDIS_TEMP_NAMESPACE", defaults.temp_namespace)),
            markdown_namespace: args.markdown_namespace.unwrap_or(env_string(
                "UPLDIS_MARKDOWN_NAMESPACE",
                defaults.markdown_namespace,
            )),
            static_dir: args
                .static_dir
                .unwrap_or(env_string("UPLDIS_STATIC_DIR", defaults.static_dir)),
            well_known_dir: args
                .well_known_dir
                .unwrap_or(env_string("UPLDIS_WELL_KNOWN_DIR", defaults.well_known_dir)),
            strict_lexer: args.strict_lexer || env_flag("UPLDIS_STRICT_LEXER"),
            hsts: args.hsts || env_flag("UPLDIS_HSTS"),
        };

        if cfg.id_length == 0 {
            anyhow::bail!("id length must be at least 1");
        }

        Ok(cfg)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_string(name: &str, default: String) -> String {
    env::var(name).unwrap_or(default)
}

fn env_parse<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map_err(|err| anyhow::anyhow!("{}", err))
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|value| {
            matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
        .unwrap_or(false)
}
