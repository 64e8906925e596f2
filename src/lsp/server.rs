use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{stdin, stdout};
use tower_lsp::{LspService, Server};

use crate::Config;
use crate::lsp::backend::Backend;
use crate::speeds::MaterialWatcher;

/// Start the LSP server with configuration from the command line
pub async fn serve() -> Result<()> {
    let config = Config::from_args_and_env()?;
    crate::config::init_logging(&config.log_level);
    serve_with(config).await
}

/// Start the LSP server over stdio
pub async fn serve_with(config: Config) -> Result<()> {
    let registry = config.load_materials()?;
    config
        .cutting_data(&registry)
        .context("Invalid cutting configuration")?;
    log::info!(
        "Starting grace-ls with {} materials (material '{}', tool {} mm)",
        registry.len(),
        config.material,
        config.tool_diameter
    );

    // Under the integration test, exit shortly so the test can read stdout to EOF.
    if std::env::var("GRACE_LS_TEST_EXIT").as_deref() == Ok("1") {
        thread::spawn(|| {
            thread::sleep(Duration::from_secs(1));
            std::process::exit(0);
        });
    }

    let (service, socket) = LspService::build(move |client| {
        let backend = Backend::new(client, config, registry);

        match MaterialWatcher::new(&backend.config.watch_paths()) {
            Ok(watcher) => {
                tokio::spawn(backend.clone().watch_materials(watcher));
            }
            Err(e) => log::warn!("Material files will not be reloaded: {:#}", e),
        }

        backend
    })
    .finish();

    Server::new(stdin(), stdout(), socket).serve(service).await;

    Ok(())
}
