//! Validation
//!
//! Located diagnostics for parse failures and spindle speeds.

pub mod engine;

pub use engine::{Diagnostic, Severity, ValidationResult, validate_document};
