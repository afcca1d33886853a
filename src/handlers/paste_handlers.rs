//! HTTP handlers for writing and reading pastes.
//!
//! Writes take either a raw `PUT` body or the `p` field of a `POST` form and
//! answer with the paste's absolute URL. Reads resolve the key, apply the
//! render pipeline and, for the single-use namespace, erase the paste.

use crate::{
    AppState,
    config::BackendKind,
    errors::AppError,
    handlers::RequestOrigin,
    models::namespace::Namespace,
    services::paste_service::PasteError,
};
use axum::{
    Form,
    body::{Body, Bytes},
    extract::{FromRequest, Multipart, Path, RawQuery, Request, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    response::Response,
};
use serde::Deserialize;
use tracing::{error, info};

/// Form field carrying the paste content.
pub const FORM_FIELD: &str = "p";
/// Optional form field carrying a filename.
pub const FILENAME_FIELD: &str = "file";

const HSTS_VALUE: &str = "max-age=63072000; includeSubDomains";

#[derive(Debug, Deserialize)]
struct UrlEncodedPaste {
    #[serde(default)]
    p: String,
    #[serde(default)]
    file: Option<String>,
}

/// `PUT /`: raw body, no filename.
pub async fn put_root(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<String, AppError> {
    store_paste(&state, &headers, Namespace::root(), None, body).await
}

/// `PUT /{filename}`: raw body into the default namespace.
pub async fn put_filename(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<String, AppError> {
    store_paste(&state, &headers, Namespace::root(), Some(filename), body).await
}

/// `PUT /{namespace}/`: raw body into a namespace, no filename.
pub async fn put_namespace(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<String, AppError> {
    let namespace = parse_write_namespace(&namespace)?;
    store_paste(&state, &headers, namespace, None, body).await
}

/// `PUT /{namespace}/{filename}`: what `curl -T file host/namespace/` sends.
pub async fn put_namespaced_file(
    State(state): State<AppState>,
    Path((namespace, filename)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<String, AppError> {
    let namespace = parse_write_namespace(&namespace)?;
    store_paste(&state, &headers, namespace, Some(filename), body).await
}

/// `POST /`: form upload into the default namespace.
pub async fn post_root(
    State(state): State<AppState>,
    request: Request,
) -> Result<String, AppError> {
    let headers = request.headers().clone();
    let (content, filename) = read_form(request).await?;
    store_paste(&state, &headers, Namespace::root(), filename, content).await
}

/// `POST /{namespace}`: form upload into a namespace.
pub async fn post_namespace(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
    request: Request,
) -> Result<String, AppError> {
    let namespace = parse_write_namespace(&namespace)?;
    let headers = request.headers().clone();
    let (content, filename) = read_form(request).await?;
    store_paste(&state, &headers, namespace, filename, content).await
}

/// `GET /{key}`
pub async fn get_root_paste(
    State(state): State<AppState>,
    method: Method,
    Path(key): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Response, AppError> {
    serve_paste(&state, &method, Namespace::root(), key, query).await
}

/// `GET /{namespace}/{key}` on disk, `GET /{hash}/{filename}` on IPFS.
pub async fn get_nested_paste(
    State(state): State<AppState>,
    method: Method,
    Path((first, second)): Path<(String, String)>,
    RawQuery(query): RawQuery,
) -> Result<Response, AppError> {
    match state.pastes.backend().kind() {
        BackendKind::Ipfs => {
            let key = format!("{}/{}", first, second);
            serve_paste(&state, &method, Namespace::root(), key, query).await
        }
        BackendKind::Disk => {
            let namespace = Namespace::named(&first).map_err(|err| {
                error!(namespace = %first, key = %second, "read failed: {}", err);
                AppError::not_found("not found")
            })?;
            serve_paste(&state, &method, namespace, second, query).await
        }
    }
}

async fn store_paste(
    state: &AppState,
    headers: &HeaderMap,
    namespace: Namespace,
    filename: Option<String>,
    content: Bytes,
) -> Result<String, AppError> {
    let stored = state
        .pastes
        .write_paste(&namespace, filename.as_deref(), content)
        .await
        .map_err(|err| {
            error!(
                namespace = %namespace,
                filename = filename.as_deref().unwrap_or(""),
                "write failed: {}",
                err
            );
            AppError::from(err)
        })?;

    info!(namespace = %stored.namespace, key = %stored.key, "wrote paste");
    let origin = RequestOrigin::from_headers(headers);
    Ok(format!("{}\n", origin.url(&stored.url_path())))
}

/// Render a paste and, for a `GET` whose render succeeded, mark it consumed.
/// `HEAD` shares this handler but never consumes a single-use paste.
async fn serve_paste(
    state: &AppState,
    method: &Method,
    namespace: Namespace,
    key: String,
    query: Option<String>,
) -> Result<Response, AppError> {
    let content = state
        .pastes
        .read_paste(&namespace, &key)
        .await
        .map_err(|err| {
            error!(namespace = %namespace, key = %key, "read failed: {}", err);
            AppError::from(err)
        })?;
    info!(namespace = %namespace, key = %key, "read paste");

    let etag = format!("\"{:x}\"", md5::compute(&content));
    let rendered = state
        .renderer
        .render(&namespace, &key, query.as_deref(), content)
        .await
        .map_err(|err| {
            error!(namespace = %namespace, key = %key, "render failed: {}", err);
            AppError::from(err)
        })?;

    if *method != Method::HEAD {
        state
            .pastes
            .consume_paste(&namespace, &key)
            .await
            .map_err(|err| {
                error!(namespace = %namespace, key = %key, "consume failed: {}", err);
                AppError::from(err)
            })?;
    }

    let content_type = rendered.content_type();
    let mut response = Response::new(Body::from(rendered.into_bytes()));
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    if let Ok(value) = HeaderValue::from_str(&etag) {
        headers.insert(header::ETAG, value);
    }
    if state.config.hsts {
        headers.insert(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static(HSTS_VALUE),
        );
    }

    Ok(response)
}

fn parse_write_namespace(name: &str) -> Result<Namespace, AppError> {
    Namespace::named(name).map_err(|err| {
        error!(namespace = %name, "write failed: {}", err);
        AppError::from(PasteError::from(err))
    })
}

/// Pull the paste content and optional filename out of a urlencoded or
/// multipart form. A missing content field reads as an empty paste.
async fn read_form(request: Request) -> Result<(Bytes, Option<String>), AppError> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"));

    if !is_multipart {
        let Form(form) = Form::<UrlEncodedPaste>::from_request(request, &())
            .await
            .map_err(|rejection| AppError::bad_request(rejection.body_text()))?;
        return Ok((Bytes::from(form.p), form.file));
    }

    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|rejection| AppError::bad_request(rejection.body_text()))?;

    let mut content = Bytes::new();
    let mut filename = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::bad_request(err.body_text()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(FORM_FIELD) => {
                content = field
                    .bytes()
                    .await
                    .map_err(|err| AppError::bad_request(err.body_text()))?;
            }
            Some(FILENAME_FIELD) => {
                filename = Some(
                    field
                        .text()
                        .await
                        .map_err(|err| AppError::bad_request(err.body_text()))?,
                );
            }
            _ => {}
        }
    }

    Ok((content, filename))
}
