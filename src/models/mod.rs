//! Core data models for the pastebin.
//!
//! Pastes themselves are raw bytes; the models here describe where a paste
//! lives (its namespace) and how it is addressed once stored.

pub mod namespace;
pub mod paste;
