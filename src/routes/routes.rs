//! Route table for the pastebin.
//!
//! ## Structure
//! - **Service endpoints**
//!   - `GET /healthz`, `GET /readyz`
//!   - `/static/*`, `/.well-known/*`: files served from disk
//!
//! - **Usage**
//!   - `GET /` and `GET /{namespace}/`: manual page and upload form
//!
//! - **Writes** (answer with the paste URL)
//!   - `POST /`, `POST /{namespace}`: form field `p`, optional `file`
//!   - `PUT /`, `PUT /{filename}`, `PUT /{namespace}/`, `PUT /{namespace}/{filename}`
//!
//! - **Reads**
//!   - `GET /{key}`: default namespace (or an IPFS hash)
//!   - `GET /{namespace}/{key}`: namespaced key (or `hash/filename` on IPFS)
//!
//! The first path segment is a key, filename or namespace depending on the
//! method, so the routes share one parameter name per position.

use crate::{
    AppState,
    config::AppConfig,
    handlers::{
        health_handlers::{healthz, readyz},
        paste_handlers::{
            get_nested_paste, get_root_paste, post_namespace, post_root, put_filename,
            put_namespace, put_namespaced_file, put_root,
        },
        usage_handlers::{usage_namespace, usage_root},
    },
};
use axum::{Router, routing::get};
use tower_http::services::ServeDir;

/// Build the router for every pastebin route.
///
/// Static directories come from `cfg`; paste handlers read everything else
/// from the shared `AppState`.
pub fn routes(cfg: &AppConfig) -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .nest_service("/static", ServeDir::new(&cfg.static_dir))
        .nest_service("/.well-known", ServeDir::new(&cfg.well_known_dir))
        .route("/", get(usage_root).post(post_root).put(put_root))
        .route(
            "/{head}",
            get(get_root_paste).post(post_namespace).put(put_filename),
        )
        .route("/{head}/", get(usage_namespace).put(put_namespace))
        .route(
            "/{head}/{tail}",
            get(get_nested_paste).put(put_namespaced_file),
        )
}
