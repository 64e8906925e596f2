//! Validation Engine
//!
//! Turns parse failures and off-range spindle speeds into located
//! diagnostics, independent of the LSP layer.

use serde::Serialize;

use crate::core::LineIndex;
use crate::parser::{self, Program};
use crate::speeds::{CuttingData, SpeedRecord, SpeedStatus, SpeedVisitor};

/// Severity of a diagnostic message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// A located diagnostic. `line` and `column` are 1-based, the column counted
/// in characters; `offset` and `length` are bytes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
    pub length: usize,
    pub message: String,
    pub severity: Severity,
}

/// Result of validating a document
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub program: Option<Program>,
    pub speeds: Vec<SpeedRecord>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        !self
            .diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> + '_ {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
    }
}

/// Parse `content` and, given cutting data, check every S word against its
/// recommended range.
pub fn validate_document(content: &str, cutting: Option<&CuttingData>) -> ValidationResult {
    let mut result = ValidationResult::new();
    let index = LineIndex::new(content);

    let program = match parser::parse(content) {
        Ok(program) => program,
        Err(e) => {
            log::debug!("Parse failed at byte {}: {}", e.offset(), e);
            let location = index.location(content, e.offset());
            result.diagnostics.push(Diagnostic {
                line: location.line,
                column: location.column,
                offset: e.offset(),
                length: e.length(),
                message: e.to_string(),
                severity: Severity::Error,
            });
            return result;
        }
    };

    if let Some(data) = cutting {
        result.speeds = SpeedVisitor::new(*data).records(&program);
        for record in &result.speeds {
            if let Some(diagnostic) = speed_warning(content, &index, record) {
                result.diagnostics.push(diagnostic);
            }
        }
    }

    result.program = Some(program);
    result
}

fn speed_warning(content: &str, index: &LineIndex, record: &SpeedRecord) -> Option<Diagnostic> {
    let relation = match record.status() {
        SpeedStatus::Within => return None,
        SpeedStatus::Low => "below",
        SpeedStatus::High => "above",
    };

    let line = record.line as usize;
    let start = index.line_start(line - 1)?;
    let length = index.line_text(content, line - 1).map_or(0, str::len);

    Some(Diagnostic {
        line,
        column: 1,
        offset: start,
        length,
        message: format!(
            "spindle speed S{} is {} the recommended range {}",
            record.requested_value,
            relation,
            record.range_label()
        ),
        severity: Severity::Warning,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const STEEL: CuttingData = CuttingData {
        cutting_speed_low: 15.0,
        cutting_speed_high: 18.0,
        tool_diameter: 1.5,
    };

    #[test]
    fn test_validation_result() {
        let mut result = ValidationResult::new();
        assert!(result.is_valid());

        result.diagnostics.push(Diagnostic {
            line: 1,
            column: 1,
            offset: 0,
            length: 0,
            message: "slow".to_string(),
            severity: Severity::Warning,
        });
        assert!(result.is_valid());

        result.diagnostics.push(Diagnostic {
            line: 2,
            column: 1,
            offset: 0,
            length: 0,
            message: "broken".to_string(),
            severity: Severity::Error,
        });
        assert!(!result.is_valid());
        assert_eq!(result.errors().count(), 1);
    }

    #[test]
    fn test_parse_error_is_located() {
        let result = validate_document("%\nG1 G1\n", None);
        assert_eq!(result.diagnostics.len(), 1);
        let d = &result.diagnostics[0];
        assert_eq!((d.line, d.column), (2, 4));
        assert_eq!((d.offset, d.length), (5, 2));
        assert_eq!(d.message, "illegal duplicate G1 within block");
        assert!(result.program.is_none());
    }

    #[test]
    fn test_speed_warnings() {
        let result = validate_document("%\nS100\nS3500\nS9000\n", Some(&STEEL));
        assert!(result.is_valid());
        assert_eq!(result.speeds.len(), 3);

        let lines: Vec<usize> = result.diagnostics.iter().map(|d| d.line).collect();
        assert_eq!(lines, vec![2, 4]);
        assert_eq!(
            result.diagnostics[0].message,
            "spindle speed S100 is below the recommended range 3183–3820"
        );
        assert_eq!(result.diagnostics[0].offset, 2);
        assert_eq!(result.diagnostics[0].length, 4);
        assert!(result.diagnostics[1].message.contains("above"));
    }

    #[test]
    fn test_no_cutting_data_no_speed_pass() {
        let result = validate_document("%\nS100\n", None);
        assert!(result.diagnostics.is_empty());
        assert!(result.speeds.is_empty());
        assert!(result.program.is_some());
    }
}
