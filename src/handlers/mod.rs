//! HTTP handlers.

pub mod health_handlers;
pub mod paste_handlers;
pub mod usage_handlers;

use axum::http::{HeaderMap, header};

/// Scheme and host the client used to reach us, for building absolute URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOrigin {
    pub scheme: &'static str,
    pub host: String,
}

impl RequestOrigin {
    /// Honours `X-Forwarded-Proto` from a TLS-terminating proxy and falls back
    /// to `localhost` when no `Host` header is present.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let scheme = headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().eq_ignore_ascii_case("https"))
            .map(|https| if https { "https" } else { "http" })
            .unwrap_or("http");
        let host = headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .unwrap_or("localhost")
            .to_string();

        Self { scheme, host }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}://{}/{}", self.scheme, self.host, path)
    }
}
