//! A command line pastebin over HTTP.
//!
//! Clients `PUT` or `POST` content and get back a short URL; `GET` on that
//! URL returns the content, optionally rendered as Markdown or highlighted.
//! Pastes live either on local disk (flat files per namespace, cached in
//! memory) or on IPFS through its command line client.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod storage;

use axum::{Router, extract::DefaultBodyLimit};
use config::AppConfig;
use services::{
    id_generator::IdGenerator, paste_service::PasteService, render_service::RenderPipeline,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Extra request body allowance for form encoding around a paste.
const FORM_OVERHEAD: usize = 64 * 1024;

/// Shared state passed to HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub pastes: PasteService,
    pub renderer: RenderPipeline,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(config: AppConfig, pastes: PasteService, renderer: RenderPipeline) -> Self {
        Self {
            pastes,
            renderer,
            config: Arc::new(config),
        }
    }

    /// Wire the configured backend, the `pygmentize` highlighter and a
    /// time-seeded id generator.
    pub fn from_config(config: AppConfig) -> Self {
        let ids = IdGenerator::new(config.id_length);
        let pastes = PasteService::from_config(&config, ids);
        let renderer = RenderPipeline::from_config(&config);
        Self::new(config, pastes, renderer)
    }
}

/// Create the application router with all routes and middleware.
pub fn create_app(state: AppState) -> Router {
    let body_limit = state.config.max_paste_size.saturating_add(FORM_OVERHEAD);
    routes::routes::routes(&state.config)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
