//! The manual page served at `/` and `/{namespace}/`.
//!
//! `curl` gets the text as-is; browsers get it wrapped in a page with an
//! upload form that posts to the same namespace.

use crate::{
    AppState,
    config::BackendKind,
    errors::AppError,
    handlers::{
        RequestOrigin,
        paste_handlers::{FILENAME_FIELD, FORM_FIELD},
    },
    models::namespace::Namespace,
};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, header},
    response::{IntoResponse, Response},
};

const USAGE: &str = "\
{host}(1)                         UPLDIS                         {host}(1)

NAME
    {host} - command line pastebin

SYNOPSIS
    # upload a file
    curl -T <file> {url}/

    # upload command output
    <command> | curl -T - {url}

    # upload from a form field
    <command> | curl -F '{field}=<-' {url}

    # this page
    curl {host}{subdir}/

DESCRIPTION
    Pastes are created with HTTP PUT or POST and answered with the URL of
    the new paste. Uploaded filenames keep their extension.

{backend}
VIEWING
    Append '?md' to a paste URL to render Markdown as HTML, or '?<lexer>'
    (for example '?rust' or '?py') for line numbers and syntax highlighting.
    Lexer names are listed at https://pygments.org/docs/lexers/
";

const DISK_NOTES: &str = "\
NAMESPACES
    Any path segment before the paste key is a namespace, created on first
    upload. Two are special:

    {url_root}/{temp}/    pastes are deleted after they are read once
    {url_root}/{md}/      pastes are always rendered as Markdown
";

const IPFS_NOTES: &str = "\
STORAGE
    Pastes are stored on IPFS. The returned URL ends in the content hash,
    followed by the filename when one was given, so the same paste can be
    fetched from any IPFS gateway.
";

const HTML_HEAD: &str = r#"<!doctype html>
<html>
<head>
  <meta charset="utf-8">
  <title>{title} - command line pastebin</title>
  <style>
    body, textarea, button, input { background-color: #000; color: #fff; margin: 0; padding: 0; border-width: 0; width: 100%; }
    form div { margin: 4px 0 5px; }
    textarea { background-color: #212121; height: 95vh; }
    input { background-color: #484848; width: 75%; height: 3vh; display: inline-block; }
    button { background-color: #484848; width: 25%; height: 3vh; display: inline-block; }
  </style>
</head>
<body>
  <form action="{action}" method="POST" accept-charset="UTF-8" spellcheck="false">
    <div><input name="{file_field}" placeholder="(optional filename)"/><button type="submit">paste</button></div>
    <textarea name="{field}">
"#;

const HTML_TAIL: &str = "</textarea>\n  </form>\n</body>\n</html>\n";

/// `GET /`
pub async fn usage_root(State(state): State<AppState>, headers: HeaderMap) -> Response {
    usage_page(&state, &headers, &Namespace::root())
}

/// `GET /{namespace}/`
pub async fn usage_namespace(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let namespace = Namespace::named(&namespace).map_err(|_| AppError::not_found("not found"))?;
    Ok(usage_page(&state, &headers, &namespace))
}

fn usage_page(state: &AppState, headers: &HeaderMap, namespace: &Namespace) -> Response {
    let origin = RequestOrigin::from_headers(headers);
    let text = usage_text(state, &origin, namespace);

    if is_curl(headers) {
        return (
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            text,
        )
            .into_response();
    }

    let subdir = namespace.name().unwrap_or("");
    let page = format!(
        "{}{}{}",
        HTML_HEAD
            .replace("{title}", &html_escape(&format!("{}/{}", origin.host, subdir)))
            .replace("{action}", &html_escape(&origin.url(subdir)))
            .replace("{file_field}", FILENAME_FIELD)
            .replace("{field}", FORM_FIELD),
        html_escape(&text),
        HTML_TAIL
    );
    ([(header::CONTENT_TYPE, "text/html; charset=utf-8")], page).into_response()
}

fn usage_text(state: &AppState, origin: &RequestOrigin, namespace: &Namespace) -> String {
    let subdir = namespace
        .name()
        .map(|name| format!("/{}", name))
        .unwrap_or_default();
    let url_root = format!("{}://{}", origin.scheme, origin.host);

    let backend = match state.pastes.backend().kind() {
        BackendKind::Disk => DISK_NOTES
            .replace("{temp}", &state.config.temp_namespace)
            .replace("{md}", &state.config.markdown_namespace),
        BackendKind::Ipfs => IPFS_NOTES.to_string(),
    };

    USAGE
        .replace("{backend}", &backend)
        .replace("{url_root}", &url_root)
        .replace("{url}", &format!("{}{}", url_root, subdir))
        .replace("{subdir}", &subdir)
        .replace("{host}", &origin.host)
        .replace("{field}", FORM_FIELD)
}

fn is_curl(headers: &HeaderMap) -> bool {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|agent| agent.starts_with("curl"))
}

fn html_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
