use crate::config::Config;
use anyhow::{Context, Result};
use nodescope_core::{JsonlRequestStore, SystemHost};
use nodescope_mcp::{default_registry, McpServer, ServerError, ServerOptions};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Owns the server and the request log it writes to
pub struct Application {
    server: McpServer,
    store: Arc<JsonlRequestStore>,
}

impl Application {
    pub fn new(config: &Config) -> Result<Self> {
        let store = Arc::new(
            JsonlRequestStore::open(&config.log_dir).context("Failed to open request log")?,
        );
        tracing::info!("Request log: {}", store.path().display());

        let host = Arc::new(SystemHost::new(
            config.node_name.clone(),
            config.node_ip.clone(),
        ));

        let registry = default_registry(store.clone(), host);
        tracing::info!("Registered {} tools", registry.len());

        let server = McpServer::new(
            ServerOptions {
                addr: config.listen_addr(),
                name: config.server_name.clone(),
                version: config.server_version.clone(),
            },
            registry,
        );

        Ok(Self { server, store })
    }

    /// Serve until `cancel` fires or the listener fails
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), ServerError> {
        self.server.run(cancel).await
    }

    /// Drain the server, then close the request log. Every tool call has
    /// written its entry by the time the server has stopped.
    pub async fn stop(&self, deadline: Duration) -> Result<()> {
        let stopped = self.server.stop(deadline).await;
        let closed = self.store.close();

        stopped.context("Failed to stop server")?;
        closed.context("Failed to close request log")?;
        Ok(())
    }

    #[cfg(test)]
    fn server(&self) -> &McpServer {
        &self.server
    }
}
