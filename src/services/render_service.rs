//! Read-side rendering of stored pastes.
//!
//! Selection, first match wins:
//! 1. the Markdown namespace, or the `md` query, renders Markdown to HTML;
//! 2. any other non-empty query is a lexer name for the highlighter;
//! 3. otherwise the raw bytes are served as plain text.
//!
//! A failed highlight falls back to plain text unless strict lexer mode is
//! on, in which case it surfaces as [`RenderError::UnknownLexer`].

use crate::{
    config::AppConfig,
    models::namespace::Namespace,
    services::highlighter::{Highlighter, Pygmentize},
};
use bytes::Bytes;
use pulldown_cmark::{Options, Parser, html as md_html};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Query string that forces Markdown rendering outside the Markdown namespace.
pub const MARKDOWN_QUERY: &str = "md";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("unknown lexer `{0}`; available lexers are listed at https://pygments.org/docs/lexers/")]
    UnknownLexer(String),
}

/// A response body and how to label it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    Html(String),
    Plain(Bytes),
}

impl Rendered {
    pub fn content_type(&self) -> &'static str {
        match self {
            Rendered::Html(_) => "text/html; charset=utf-8",
            Rendered::Plain(_) => "text/plain; charset=utf-8",
        }
    }

    pub fn into_bytes(self) -> Bytes {
        match self {
            Rendered::Html(html) => Bytes::from(html),
            Rendered::Plain(raw) => raw,
        }
    }
}

#[derive(Clone)]
pub struct RenderPipeline {
    highlighter: Arc<dyn Highlighter>,
    markdown_namespace: String,
    strict_lexer: bool,
}

impl RenderPipeline {
    pub fn new(
        highlighter: Arc<dyn Highlighter>,
        markdown_namespace: impl Into<String>,
        strict_lexer: bool,
    ) -> Self {
        Self {
            highlighter,
            markdown_namespace: markdown_namespace.into(),
            strict_lexer,
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        let highlighter = Arc::new(Pygmentize::new(
            cfg.highlighter_bin.clone(),
            cfg.highlight_style.clone(),
        ));
        Self::new(highlighter, cfg.markdown_namespace.clone(), cfg.strict_lexer)
    }

    pub async fn render(
        &self,
        namespace: &Namespace,
        key: &str,
        query: Option<&str>,
        content: Bytes,
    ) -> Result<Rendered, RenderError> {
        let query = query.map(str::trim).filter(|q| !q.is_empty());

        if namespace.is(&self.markdown_namespace) || query == Some(MARKDOWN_QUERY) {
            return Ok(Rendered::Html(render_markdown(&String::from_utf8_lossy(
                &content,
            ))));
        }

        let Some(lexer) = query else {
            return Ok(Rendered::Plain(content));
        };

        match self.highlighter.highlight(content.clone(), lexer, key).await {
            Ok(html) => Ok(Rendered::Html(html)),
            Err(err) => {
                warn!(namespace = %namespace, key = %key, lexer = %lexer, "highlight failed: {}", err);
                if self.strict_lexer {
                    Err(RenderError::UnknownLexer(lexer.to_string()))
                } else {
                    Ok(Rendered::Plain(content))
                }
            }
        }
    }
}

/// Convert GitHub-style Markdown to an HTML fragment.
pub fn render_markdown(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let parser = Parser::new_ext(markdown, options);
    let mut html_output = String::with_capacity(markdown.len() * 2);
    md_html::push_html(&mut html_output, parser);
    html_output
}
