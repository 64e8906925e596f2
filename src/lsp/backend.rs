use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer};

use crate::Config;
use crate::core::Snapshot;
use crate::lsp::document::{Analysis, DocumentState};
use crate::lsp::handlers::{
    self, HandleDiagnostics, HandleDocumentSymbol, HandleExecuteCommand, HandleHover,
    HandleSemanticTokens,
};
use crate::speeds::{CuttingData, MaterialRegistry, MaterialWatcher, Modeline, WatchEvent};

/// Returns the spindle speed records of the document named by its only argument
pub const SPINDLE_SPEEDS_COMMAND: &str = "grace.spindleSpeeds";

/// The main LSP backend that holds state and implements the Language Server Protocol
#[derive(Clone)]
pub struct Backend {
    pub client: Client,
    pub materials: Arc<RwLock<MaterialRegistry>>,
    pub documents: Arc<Mutex<HashMap<Url, DocumentState>>>,
    pub config: Config,
}

impl Backend {
    pub fn new(client: Client, config: Config, materials: MaterialRegistry) -> Self {
        Self {
            client,
            materials: Arc::new(RwLock::new(materials)),
            documents: Arc::new(Mutex::new(HashMap::new())),
            config,
        }
    }

    /// Cutting data for a document: the configured material and tool, then
    /// any modeline overrides.
    pub async fn cutting_for(&self, text: &str) -> Option<CuttingData> {
        let registry = self.materials.read().await;
        let base = match self.config.cutting_data(&registry) {
            Ok(data) => data,
            Err(e) => {
                log::warn!("Spindle speed check disabled: {:#}", e);
                return None;
            }
        };
        Some(match Modeline::detect(text) {
            Some(modeline) => modeline.apply(&registry, base),
            None => base,
        })
    }

    /// Analysis of the current text, computing it now if the debounced one
    /// has not landed yet.
    pub async fn current_analysis(&self, uri: &Url) -> Option<Arc<Analysis>> {
        let (snapshot, generation) = {
            let docs = self.documents.lock().await;
            let state = docs.get(uri)?;
            if let Some(analysis) = state.analysis() {
                return Some(analysis);
            }
            (state.snapshot.clone(), state.generation)
        };

        let cutting = self.cutting_for(snapshot.text()).await;
        let analysis = Arc::new(Analysis::run(snapshot, cutting));
        if let Some(state) = self.documents.lock().await.get_mut(uri) {
            state.store(generation, Arc::clone(&analysis));
        }
        Some(analysis)
    }

    fn schedule_analysis(&self, uri: Url, generation: u64) {
        let backend = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(backend.config.debounce).await;
            backend.analyze(uri, generation).await;
        });
    }

    /// Re-run analysis of every open document, e.g. after the material table changed
    pub async fn reanalyze_all(&self) {
        let open: Vec<(Url, u64)> = {
            let docs = self.documents.lock().await;
            docs.iter()
                .map(|(uri, state)| (uri.clone(), state.generation))
                .collect()
        };
        for (uri, generation) in open {
            self.analyze(uri, generation).await;
        }
    }

    pub async fn reload_materials(&self) {
        match self.config.load_materials() {
            Ok(registry) => {
                let count = registry.len();
                *self.materials.write().await = registry;
                log::info!("Reloaded {} materials", count);
                self.client
                    .log_message(MessageType::INFO, format!("Reloaded {} materials", count))
                    .await;
                self.reanalyze_all().await;
            }
            Err(e) => {
                log::warn!("Keeping previous materials: {:#}", e);
                self.client
                    .log_message(
                        MessageType::WARNING,
                        format!("Failed to reload materials: {:#}", e),
                    )
                    .await;
            }
        }
    }

    /// Reload whenever one of the configured material files changes
    pub async fn watch_materials(self, mut watcher: MaterialWatcher) {
        let watched = self.config.watch_paths();
        while let Some(event) = watcher.next_event().await {
            match event {
                WatchEvent::Changed(path) => {
                    let relevant = watched
                        .iter()
                        .any(|p| p.file_name().is_some() && p.file_name() == path.file_name());
                    if relevant {
                        log::debug!("Material file changed: {}", path.display());
                        self.reload_materials().await;
                    }
                }
                WatchEvent::Error(e) => {
                    log::warn!("Material watcher error: {}", e);
                    self.client
                        .log_message(MessageType::WARNING, format!("Material watcher error: {}", e))
                        .await;
                }
            }
        }
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(
        &self,
        _: InitializeParams,
    ) -> tower_lsp::jsonrpc::Result<InitializeResult> {
        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                document_symbol_provider: Some(OneOf::Left(true)),
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),
                semantic_tokens_provider: Some(
                    SemanticTokensServerCapabilities::SemanticTokensOptions(
                        SemanticTokensOptions {
                            legend: handlers::semantic_tokens_legend(),
                            full: Some(SemanticTokensFullOptions::Bool(true)),
                            range: None,
                            work_done_progress_options: WorkDoneProgressOptions::default(),
                        },
                    ),
                ),
                execute_command_provider: Some(ExecuteCommandOptions {
                    commands: vec![SPINDLE_SPEEDS_COMMAND.to_string()],
                    work_done_progress_options: WorkDoneProgressOptions::default(),
                }),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: "grace-ls".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        let count = self.materials.read().await.len();
        self.client
            .log_message(
                MessageType::INFO,
                format!(
                    "grace-ls initialized ({} materials, using '{}' with a {} mm tool)",
                    count, self.config.material, self.config.tool_diameter
                ),
            )
            .await;
    }

    async fn shutdown(&self) -> tower_lsp::jsonrpc::Result<()> {
        Ok(())
    }

    async fn hover(&self, params: HoverParams) -> tower_lsp::jsonrpc::Result<Option<Hover>> {
        self.handle_hover(params).await
    }

    async fn document_symbol(
        &self,
        params: DocumentSymbolParams,
    ) -> tower_lsp::jsonrpc::Result<Option<DocumentSymbolResponse>> {
        self.handle_document_symbol(params).await
    }

    async fn semantic_tokens_full(
        &self,
        params: SemanticTokensParams,
    ) -> tower_lsp::jsonrpc::Result<Option<SemanticTokensResult>> {
        self.handle_semantic_tokens_full(params).await
    }

    async fn execute_command(
        &self,
        params: ExecuteCommandParams,
    ) -> tower_lsp::jsonrpc::Result<Option<Value>> {
        self.handle_execute_command(params).await
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let doc = params.text_document;
        let state = DocumentState::new(Snapshot::new(doc.text, doc.version));
        let generation = state.generation;

        let mut docs = self.documents.lock().await;
        docs.insert(doc.uri.clone(), state);
        drop(docs); // Release the lock before analyzing

        self.analyze(doc.uri, generation).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        let version = params.text_document.version;
        if let Some(change) = params.content_changes.into_iter().last() {
            let snapshot = Snapshot::new(change.text, version);

            let mut docs = self.documents.lock().await;
            let generation = match docs.get_mut(&uri) {
                Some(state) => state.update(snapshot),
                None => {
                    let state = DocumentState::new(snapshot);
                    let generation = state.generation;
                    docs.insert(uri.clone(), state);
                    generation
                }
            };
            drop(docs);

            self.schedule_analysis(uri, generation);
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        self.documents.lock().await.remove(&uri);
        self.client.publish_diagnostics(uri, vec![], None).await;
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use tower_lsp::LspService;

    use super::*;
    use crate::config::Args;

    fn backend_service() -> LspService<Backend> {
        let config = Config::from_args(Args::try_parse_from(["grace-ls"]).unwrap()).unwrap();
        let materials = MaterialRegistry::with_builtin().unwrap();
        let (service, _socket) = LspService::new(|client| Backend::new(client, config, materials));
        service
    }

    #[tokio::test]
    async fn test_superseded_analysis_is_skipped() {
        let service = backend_service();
        let backend = service.inner();
        let uri = Url::parse("file:///tmp/part.nc").unwrap();

        let mut state = DocumentState::new(Snapshot::new("%\nS100\n", 1));
        let current = state.update(Snapshot::new("%\nG1 G1\n", 2));
        backend.documents.lock().await.insert(uri.clone(), state);

        // an analysis scheduled before the edit finds a newer generation
        backend.analyze(uri.clone(), current - 1).await;
        assert!(backend.documents.lock().await[&uri].analysis().is_none());

        backend.analyze(uri.clone(), current).await;
        let analysis = backend.documents.lock().await[&uri].analysis().unwrap();
        assert_eq!(analysis.snapshot.version, 2);
        assert!(!analysis.result.is_valid());
    }

    #[tokio::test]
    async fn test_current_analysis_computes_on_demand() {
        let service = backend_service();
        let backend = service.inner();
        let uri = Url::parse("file:///tmp/part.nc").unwrap();

        let state = DocumentState::new(Snapshot::new("%\nS100\n", 1));
        backend.documents.lock().await.insert(uri.clone(), state);

        let analysis = backend.current_analysis(&uri).await.unwrap();
        assert_eq!(analysis.result.speeds.len(), 1);
        assert!(backend.documents.lock().await[&uri].analysis().is_some());

        let missing = Url::parse("file:///tmp/other.nc").unwrap();
        assert!(backend.current_analysis(&missing).await.is_none());
    }
}
