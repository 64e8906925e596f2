//! LSP Protocol Implementation
//!
//! Diagnostics, semantic tokens, hover, outline and the spindle speed command
//! on top of the parser and speed pass.

pub mod backend;
pub mod document;
pub mod handlers;
pub mod server;

pub use backend::{Backend, SPINDLE_SPEEDS_COMMAND};
pub use server::{serve, serve_with};
