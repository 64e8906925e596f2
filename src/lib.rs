//! grace
//!
//! G-code tooling built around one parser:
//! - lexer, recursive-descent parser and read-only tree traversal
//! - spindle speed recommendations per material and tool
//! - syntax highlighting and located diagnostics
//! - a language server and a command-line front end

pub mod config;
pub mod core;
pub mod highlight;
pub mod lsp;
pub mod parser;
pub mod speeds;
pub mod validation;

pub use config::Config;
pub use parser::{Error, Program, parse, tokenize};
pub use speeds::{CuttingData, MaterialRegistry, SpeedRecord, SpeedVisitor};
pub use validation::{Diagnostic, validate_document};
