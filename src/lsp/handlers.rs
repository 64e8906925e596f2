use std::ops::Range as ByteRange;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tower_lsp::jsonrpc::{Error as LspError, Result as LspResult};
use tower_lsp::lsp_types::*;

use crate::core::Snapshot;
use crate::highlight::{Style, highlight};
use crate::lsp::backend::{Backend, SPINDLE_SPEEDS_COMMAND};
use crate::lsp::document::Analysis;
use crate::parser::{Block, Header, Identifier, Lexer, Token, TokenKind, Visitor};
use crate::speeds::{SpeedRecord, SpeedStatus};
use crate::validation;

/// Trait for handling hover requests
#[tower_lsp::async_trait]
pub trait HandleHover {
    async fn handle_hover(&self, params: HoverParams) -> LspResult<Option<Hover>>;
}

/// Trait for handling document symbols
#[tower_lsp::async_trait]
pub trait HandleDocumentSymbol {
    async fn handle_document_symbol(
        &self,
        params: DocumentSymbolParams,
    ) -> LspResult<Option<DocumentSymbolResponse>>;
}

/// Trait for handling semantic token requests
#[tower_lsp::async_trait]
pub trait HandleSemanticTokens {
    async fn handle_semantic_tokens_full(
        &self,
        params: SemanticTokensParams,
    ) -> LspResult<Option<SemanticTokensResult>>;
}

/// Trait for handling workspace commands
#[tower_lsp::async_trait]
pub trait HandleExecuteCommand {
    async fn handle_execute_command(&self, params: ExecuteCommandParams) -> LspResult<Option<Value>>;
}

/// Trait for handling diagnostics
#[tower_lsp::async_trait]
pub trait HandleDiagnostics {
    async fn analyze(&self, uri: Url, generation: u64);
    async fn publish_diagnostics(&self, uri: Url, analysis: &Analysis);
    fn create_lsp_diagnostic(
        &self,
        snapshot: &Snapshot,
        diagnostic: &validation::Diagnostic,
    ) -> tower_lsp::lsp_types::Diagnostic;
}

#[tower_lsp::async_trait]
impl HandleHover for Backend {
    async fn handle_hover(&self, params: HoverParams) -> LspResult<Option<Hover>> {
        let tdpp = params.text_document_position_params;
        let Some(analysis) = self.current_analysis(&tdpp.text_document.uri).await else {
            return Ok(None);
        };

        let snapshot = &analysis.snapshot;
        let Some(offset) = snapshot.offset(tdpp.position.line, tdpp.position.character) else {
            return Ok(None);
        };
        let Some((value, span)) = hover_text(&analysis, offset) else {
            return Ok(None);
        };

        Ok(Some(Hover {
            contents: HoverContents::Markup(MarkupContent {
                kind: MarkupKind::Markdown,
                value,
            }),
            range: Some(lsp_range(snapshot, span)),
        }))
    }
}

#[tower_lsp::async_trait]
impl HandleDocumentSymbol for Backend {
    async fn handle_document_symbol(
        &self,
        params: DocumentSymbolParams,
    ) -> LspResult<Option<DocumentSymbolResponse>> {
        let Some(analysis) = self.current_analysis(&params.text_document.uri).await else {
            return Ok(None);
        };
        let Some(program) = &analysis.result.program else {
            return Ok(None);
        };

        let mut collector = SymbolCollector::new(&analysis.snapshot);
        program.accept(&mut collector);
        Ok(Some(DocumentSymbolResponse::Nested(collector.symbols)))
    }
}

#[tower_lsp::async_trait]
impl HandleSemanticTokens for Backend {
    async fn handle_semantic_tokens_full(
        &self,
        params: SemanticTokensParams,
    ) -> LspResult<Option<SemanticTokensResult>> {
        let snapshot = {
            let docs = self.documents.lock().await;
            match docs.get(&params.text_document.uri) {
                Some(state) => state.snapshot.clone(),
                None => return Ok(None),
            }
        };

        Ok(Some(SemanticTokensResult::Tokens(SemanticTokens {
            result_id: None,
            data: semantic_tokens(&snapshot),
        })))
    }
}

#[tower_lsp::async_trait]
impl HandleExecuteCommand for Backend {
    async fn handle_execute_command(&self, params: ExecuteCommandParams) -> LspResult<Option<Value>> {
        if params.command != SPINDLE_SPEEDS_COMMAND {
            return Err(LspError::invalid_params(format!(
                "unknown command '{}'",
                params.command
            )));
        }

        let uri = params
            .arguments
            .first()
            .and_then(Value::as_str)
            .and_then(|s| Url::parse(s).ok())
            .ok_or_else(|| LspError::invalid_params("expected a document URI argument"))?;

        let Some(analysis) = self.current_analysis(&uri).await else {
            return Err(LspError::invalid_params(format!("document not open: {}", uri)));
        };

        let report: Vec<SpeedReport> = analysis
            .result
            .speeds
            .iter()
            .map(SpeedReport::from)
            .collect();
        serde_json::to_value(report)
            .map(Some)
            .map_err(|_| LspError::internal_error())
    }
}

#[tower_lsp::async_trait]
impl HandleDiagnostics for Backend {
    async fn analyze(&self, uri: Url, generation: u64) {
        let snapshot = {
            let docs = self.documents.lock().await;
            match docs.get(&uri) {
                Some(state) if state.generation == generation => state.snapshot.clone(),
                Some(_) => {
                    log::debug!("Skipping superseded analysis of {}", uri);
                    return;
                }
                None => return,
            }
        };

        let cutting = self.cutting_for(snapshot.text()).await;
        let analysis = Arc::new(Analysis::run(snapshot, cutting));

        let stored = match self.documents.lock().await.get_mut(&uri) {
            Some(state) => state.store(generation, Arc::clone(&analysis)),
            None => false,
        };
        if !stored {
            log::debug!(
                "Discarding stale analysis of {} (generation {})",
                uri,
                generation
            );
            return;
        }

        self.publish_diagnostics(uri, &analysis).await;
    }

    async fn publish_diagnostics(&self, uri: Url, analysis: &Analysis) {
        let diagnostics = analysis
            .result
            .diagnostics
            .iter()
            .map(|d| self.create_lsp_diagnostic(&analysis.snapshot, d))
            .collect();

        self.client
            .publish_diagnostics(uri, diagnostics, Some(analysis.snapshot.version))
            .await;
    }

    fn create_lsp_diagnostic(
        &self,
        snapshot: &Snapshot,
        diagnostic: &validation::Diagnostic,
    ) -> tower_lsp::lsp_types::Diagnostic {
        to_lsp_diagnostic(snapshot, diagnostic)
    }
}

fn to_lsp_diagnostic(
    snapshot: &Snapshot,
    diagnostic: &validation::Diagnostic,
) -> tower_lsp::lsp_types::Diagnostic {
    let severity = match diagnostic.severity {
        validation::Severity::Error => DiagnosticSeverity::ERROR,
        validation::Severity::Warning => DiagnosticSeverity::WARNING,
        validation::Severity::Info => DiagnosticSeverity::INFORMATION,
    };

    tower_lsp::lsp_types::Diagnostic {
        range: lsp_range(
            snapshot,
            diagnostic.offset..diagnostic.offset + diagnostic.length,
        ),
        severity: Some(severity),
        source: Some("grace".to_string()),
        message: diagnostic.message.clone(),
        ..Default::default()
    }
}

fn lsp_range(snapshot: &Snapshot, span: ByteRange<usize>) -> Range {
    let (start_line, start_char) = snapshot.position(span.start);
    let (end_line, end_char) = snapshot.position(span.end);
    Range::new(
        Position::new(start_line, start_char),
        Position::new(end_line, end_char),
    )
}

/// Legend shared by `initialize` and [`semantic_tokens`], in [`Style::ALL`] order
pub fn semantic_tokens_legend() -> SemanticTokensLegend {
    let token_types = Style::ALL
        .iter()
        .map(|style| match style {
            Style::Command => SemanticTokenType::KEYWORD,
            Style::Axis => SemanticTokenType::VARIABLE,
            Style::Parameter => SemanticTokenType::PARAMETER,
            Style::Rate => SemanticTokenType::NUMBER,
            Style::Numbering => SemanticTokenType::MACRO,
            Style::Arc => SemanticTokenType::PROPERTY,
            Style::Comment => SemanticTokenType::COMMENT,
            Style::Delimiter => SemanticTokenType::OPERATOR,
        })
        .collect();

    SemanticTokensLegend {
        token_types,
        token_modifiers: vec![],
    }
}

/// Delta-encoded tokens, one per styled span and line
fn semantic_tokens(snapshot: &Snapshot) -> Vec<SemanticToken> {
    let text = snapshot.text();
    let lines = snapshot.lines();
    let mut tokens = Vec::new();
    let (mut prev_line, mut prev_start) = (0, 0);

    for span in highlight(text) {
        let mut start = span.offset;
        while start < span.end() {
            let (line, column) = snapshot.position(start);
            let line_end = lines
                .line_start(line as usize + 1)
                .map_or(text.len(), |next| next - 1);
            let end = span.end().min(line_end);

            if end > start {
                let length: usize = text[start..end].chars().map(char::len_utf16).sum();
                let delta_line = line - prev_line;
                tokens.push(SemanticToken {
                    delta_line,
                    delta_start: if delta_line == 0 {
                        column - prev_start
                    } else {
                        column
                    },
                    length: length as u32,
                    token_type: span.style.index(),
                    token_modifiers_bitset: 0,
                });
                prev_line = line;
                prev_start = column;
            }
            start = end + 1;
        }
    }

    tokens
}

/// Index of the letter token of the word covering `offset`
fn word_at(tokens: &[Token], offset: usize) -> Option<usize> {
    tokens
        .iter()
        .enumerate()
        .filter(|(_, t)| t.offset <= offset && offset <= t.end())
        .find_map(|(i, t)| match t.kind {
            k if k.is_word() => Some(i),
            TokenKind::Number if i > 0 => {
                let letter = &tokens[i - 1];
                (letter.kind.is_word() && letter.end() == t.offset).then_some(i - 1)
            }
            _ => None,
        })
}

/// Markdown for the word under `offset` and the span it covers
fn hover_text(analysis: &Analysis, offset: usize) -> Option<(String, ByteRange<usize>)> {
    let text = analysis.snapshot.text();
    let tokens: Vec<Token> = Lexer::new(text).map_while(Result::ok).collect();
    let index = word_at(&tokens, offset)?;

    let letter = tokens[index];
    let end = tokens
        .get(index + 1)
        .filter(|t| t.kind == TokenKind::Number && t.offset == letter.end())
        .map_or(letter.end(), Token::end);

    let mut value = format!("**{}** {}", &text[letter.offset..end], letter.kind.describe());

    if letter.kind == TokenKind::S {
        let nth = tokens[..index]
            .iter()
            .filter(|t| t.kind == TokenKind::S)
            .count();
        if let Some(record) = analysis.result.speeds.get(nth) {
            value.push_str(&format!(
                "\n\nRecommended: {} ({})",
                record.range_label(),
                record.status()
            ));
        }
        if let Some(data) = analysis.cutting {
            value.push_str(&format!(
                "\n\nTool Ø {} mm, cutting speed {}–{} m/min",
                data.tool_diameter, data.cutting_speed_low, data.cutting_speed_high
            ));
        }
    }

    Some((value, letter.offset..end))
}

/// Header and numbered blocks as outline entries
struct SymbolCollector<'a> {
    snapshot: &'a Snapshot,
    symbols: Vec<DocumentSymbol>,
}

impl<'a> SymbolCollector<'a> {
    fn new(snapshot: &'a Snapshot) -> Self {
        Self {
            snapshot,
            symbols: Vec::new(),
        }
    }

    fn push(&mut self, line: usize, name: String, detail: Option<String>, kind: SymbolKind) {
        let lines = self.snapshot.lines();
        let (Some(start), Some(text)) = (
            lines.line_start(line),
            lines.line_text(self.snapshot.text(), line),
        ) else {
            return;
        };

        let range = lsp_range(self.snapshot, start..start + text.len());
        let selection_range = lsp_range(self.snapshot, start..start + text.len().min(name.len()));

        self.symbols.push(DocumentSymbol {
            name,
            detail,
            kind,
            tags: None,
            #[allow(deprecated)]
            deprecated: Some(false),
            range,
            selection_range,
            children: None,
        });
    }
}

impl Visitor for SymbolCollector<'_> {
    fn visit_header(&mut self, header: &Header) {
        let detail = match &header.identifier {
            Some(Identifier::Number(n)) => Some(format!("program {}", n)),
            Some(Identifier::Comment(c)) => Some(c.clone()),
            None => None,
        };
        self.push(0, "%".to_string(), detail, SymbolKind::MODULE);
    }

    fn visit_block(&mut self, block: &Block) {
        if let Some(number) = block.number {
            let words: Vec<String> = block.words.iter().map(|w| w.to_string()).collect();
            let detail = (!words.is_empty()).then(|| words.join(" "));
            self.push(
                block.line as usize - 1,
                number.to_string(),
                detail,
                SymbolKind::KEY,
            );
        }
    }
}

/// Speed record plus its classification, as returned to clients
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeedReport {
    #[serde(flatten)]
    record: SpeedRecord,
    range: String,
    status: SpeedStatus,
}

impl From<&SpeedRecord> for SpeedReport {
    fn from(record: &SpeedRecord) -> Self {
        Self {
            record: *record,
            range: record.range_label(),
            status: record.status(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speeds::CuttingData;

    const STEEL: CuttingData = CuttingData {
        cutting_speed_low: 15.0,
        cutting_speed_high: 18.0,
        tool_diameter: 1.5,
    };

    fn analysis(text: &str) -> Analysis {
        Analysis::run(Snapshot::new(text, 1), Some(STEEL))
    }

    #[test]
    fn test_semantic_tokens_delta_encoding() {
        let tokens = semantic_tokens(&Snapshot::new("%\nG1 X10\n", 1));
        let encoded: Vec<(u32, u32, u32, u32)> = tokens
            .iter()
            .map(|t| (t.delta_line, t.delta_start, t.length, t.token_type))
            .collect();
        assert_eq!(
            encoded,
            vec![
                (0, 0, 1, Style::Delimiter.index()),
                (1, 0, 2, Style::Command.index()),
                (0, 3, 3, Style::Axis.index()),
            ]
        );
    }

    #[test]
    fn test_semantic_tokens_split_multiline_comment() {
        let tokens = semantic_tokens(&Snapshot::new("(one\ntwo)", 1));
        let encoded: Vec<(u32, u32, u32)> = tokens
            .iter()
            .map(|t| (t.delta_line, t.delta_start, t.length))
            .collect();
        assert_eq!(encoded, vec![(0, 0, 4), (1, 0, 4)]);
    }

    #[test]
    fn test_legend_matches_styles() {
        assert_eq!(semantic_tokens_legend().token_types.len(), Style::ALL.len());
    }

    #[test]
    fn test_hover_on_speed_word() {
        let analysis = analysis("%\nG1 X1\nS100\n");
        let offset = analysis.snapshot.offset(2, 2).unwrap();
        let (value, span) = hover_text(&analysis, offset).unwrap();
        assert_eq!(span, 8..12);
        assert!(value.starts_with("**S100** spindle speed"));
        assert!(value.contains("Recommended: 3183–3820 (low)"));
        assert!(value.contains("Tool Ø 1.5 mm"));
    }

    #[test]
    fn test_hover_picks_matching_record() {
        let analysis = analysis("%\nS100\nG96\nS16\n");
        let offset = analysis.snapshot.offset(3, 0).unwrap();
        let (value, _) = hover_text(&analysis, offset).unwrap();
        assert!(value.contains("Recommended: 15–18 (within)"));
    }

    #[test]
    fn test_hover_on_other_words() {
        let analysis = analysis("%\nG1 X1\n");
        let (value, span) = hover_text(&analysis, 5).unwrap();
        assert_eq!(value, "**X1** axis word");
        assert_eq!(span, 5..7);

        // cursor just past the numeral
        let (value, span) = hover_text(&analysis, 4).unwrap();
        assert_eq!(value, "**G1** preparatory word");
        assert_eq!(span, 2..4);

        assert!(hover_text(&analysis, 0).is_none());
    }

    #[test]
    fn test_symbols() {
        let analysis = analysis("%(demo)\nN10 G0 X0\nG1 X5\nN20 M30\n");
        let mut collector = SymbolCollector::new(&analysis.snapshot);
        analysis.result.program.as_ref().unwrap().accept(&mut collector);

        let names: Vec<(&str, u32)> = collector
            .symbols
            .iter()
            .map(|s| (s.name.as_str(), s.range.start.line))
            .collect();
        assert_eq!(names, vec![("%", 0), ("N10", 1), ("N20", 3)]);
        assert_eq!(collector.symbols[0].detail.as_deref(), Some("(demo)"));
        assert_eq!(collector.symbols[1].detail.as_deref(), Some("G0 X0"));
    }

    #[test]
    fn test_speed_report_json() {
        let analysis = analysis("%\nS100\n");
        let report = SpeedReport::from(&analysis.result.speeds[0]);
        let json = serde_json::to_value(report).unwrap();
        assert_eq!(json["line"], 2);
        assert_eq!(json["requestedValue"], 100.0);
        assert_eq!(json["range"], "3183–3820");
        assert_eq!(json["status"], "low");
    }

    #[test]
    fn test_diagnostic_range_uses_utf16() {
        let snapshot = Snapshot::new("%\n(é)G1 G1\n", 1);
        let result = validation::validate_document(snapshot.text(), None);
        let diagnostic = to_lsp_diagnostic(&snapshot, &result.diagnostics[0]);
        assert_eq!(diagnostic.range.start, Position::new(1, 6));
        assert_eq!(diagnostic.range.end, Position::new(1, 8));
        assert_eq!(diagnostic.severity, Some(DiagnosticSeverity::ERROR));
    }
}
