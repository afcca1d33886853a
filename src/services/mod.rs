//! Paste repository, id generation and read-side rendering.

pub mod highlighter;
pub mod id_generator;
pub mod paste_service;
pub mod render_service;
