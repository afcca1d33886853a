//! External syntax highlighter.

use async_trait::async_trait;
use bytes::Bytes;
use std::{io, process::Stdio};
use thiserror::Error;
use tokio::{io::AsyncWriteExt, process::Command};

const MAX_LEXER_LEN: usize = 64;

#[derive(Debug, Error)]
pub enum HighlightError {
    #[error("invalid lexer name `{0}`")]
    InvalidLexer(String),
    #[error("highlighter exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Turns source text into a self-contained HTML page.
#[async_trait]
pub trait Highlighter: Send + Sync {
    /// Highlight `content` with the lexer named `lexer`; `title` is shown as
    /// the page title.
    async fn highlight(
        &self,
        content: Bytes,
        lexer: &str,
        title: &str,
    ) -> Result<String, HighlightError>;
}

/// Lexer names are short identifiers such as `rust`, `c++` or `html+jinja`.
pub fn is_valid_lexer(lexer: &str) -> bool {
    !lexer.is_empty()
        && lexer.len() <= MAX_LEXER_LEN
        && !lexer.starts_with('-')
        && lexer
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'+' | b'#' | b'.'))
}

/// [`Highlighter`] running `pygmentize` with the HTML formatter.
#[derive(Debug, Clone)]
pub struct Pygmentize {
    program: String,
    style: String,
}

impl Pygmentize {
    pub fn new(program: impl Into<String>, style: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            style: style.into(),
        }
    }

    fn formatter_options(&self, title: &str) -> String {
        // Option values are comma separated; keep the title from splitting them.
        let title: String = title
            .chars()
            .map(|c| if c == ',' || c.is_control() { '_' } else { c })
            .collect();
        format!(
            "encoding=utf-8,full,style={},linenos=table,title={}",
            self.style, title
        )
    }
}

#[async_trait]
impl Highlighter for Pygmentize {
    async fn highlight(
        &self,
        content: Bytes,
        lexer: &str,
        title: &str,
    ) -> Result<String, HighlightError> {
        if !is_valid_lexer(lexer) {
            return Err(HighlightError::InvalidLexer(lexer.to_string()));
        }

        let mut child = Command::new(&self.program)
            .arg(format!("-l{}", lexer))
            .arg("-fhtml")
            .arg("-O")
            .arg(self.formatter_options(title))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::other("highlighter stdin unavailable"))?;
        // stdin is written while stdout drains.
        let feed = async move {
            let res = stdin.write_all(&content).await;
            drop(stdin);
            res
        };
        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        let output = output?;

        if !output.status.success() {
            return Err(HighlightError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        fed?;

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
