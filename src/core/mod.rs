//! Core Document Model
//!
//! Shared document text and position conversion.

pub mod document;

pub use document::{LineIndex, Location, Snapshot};
