// MCP server lifecycle: background listener, cancellation and bounded shutdown

use crate::error::ServerError;
use crate::protocol::ServerInfo;
use crate::tools::ToolRegistry;
use crate::transport::{self, TransportState};
use axum::Router;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Listener options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// `host:port` to bind
    pub addr: String,
    pub name: String,
    pub version: String,
}

/// Lifecycle state. A graceful stop always passes through `ShuttingDown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Created,
    Running,
    ShuttingDown,
    Stopped,
}

type ServeTask = JoinHandle<std::io::Result<()>>;

/// MCP tool server over streamable HTTP
pub struct McpServer {
    addr: String,
    router: Router,
    registry: Arc<ToolRegistry>,
    state: watch::Sender<ServerState>,
    graceful: CancellationToken,
    force_close: CancellationToken,
    local_addr: OnceLock<SocketAddr>,
    serve_task: Mutex<Option<ServeTask>>,
}

impl McpServer {
    pub fn new(options: ServerOptions, registry: ToolRegistry) -> Self {
        if registry.is_empty() {
            tracing::warn!("mcp server created without any tools");
        }

        let registry = Arc::new(registry);
        let force_close = CancellationToken::new();
        let router = transport::router(TransportState::new(
            registry.clone(),
            ServerInfo {
                name: options.name,
                version: options.version,
            },
            force_close.clone(),
        ));

        let (state, _) = watch::channel(ServerState::Created);

        Self {
            addr: options.addr,
            router,
            registry,
            state,
            graceful: CancellationToken::new(),
            force_close,
            local_addr: OnceLock::new(),
            serve_task: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ServerState {
        *self.state.borrow()
    }

    /// Watch lifecycle transitions
    pub fn subscribe(&self) -> watch::Receiver<ServerState> {
        self.state.subscribe()
    }

    /// Address the listener is bound to, once running
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }

    /// Bind the listener and serve it on a background task.
    ///
    /// Returns `Ok(())` once `cancel` fires; the listener keeps serving until
    /// [`McpServer::stop`] is called. Returns the listener's error if it fails
    /// first.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), ServerError> {
        // Held until `Running` is published so concurrent callers cannot both start
        let claim = self.serve_task.lock().await;
        if self.state() != ServerState::Created {
            return Err(ServerError::AlreadyStarted);
        }

        let listener = TcpListener::bind(&self.addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: self.addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;
        let _ = self.local_addr.set(local_addr);

        let router = self.router.clone();
        let graceful = self.graceful.clone();
        let mut task: ServeTask = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(graceful.cancelled_owned())
                .await
        });

        self.state.send_replace(ServerState::Running);
        drop(claim);
        tracing::info!(addr = %local_addr, "mcp server listening");

        let finished = tokio::select! {
            _ = cancel.cancelled() => None,
            joined = &mut task => Some(joined),
        };

        match finished {
            None => {
                tracing::info!("cancellation received, awaiting stop");
                *self.serve_task.lock().await = Some(task);
                Ok(())
            }
            Some(joined) => {
                self.state.send_replace(ServerState::Stopped);
                let result = flatten(joined);
                if let Err(e) = &result {
                    tracing::error!(error = %e, "mcp server failed");
                }
                result
            }
        }
    }

    /// Stop accepting connections and wait for in-flight requests and tool
    /// calls, at most `deadline`. Past the deadline the listener and any
    /// remaining requests are closed, running tool calls are cancelled (each
    /// records a failure entry before this returns) and
    /// [`ServerError::DeadlineExceeded`] is returned.
    pub async fn stop(&self, deadline: Duration) -> Result<(), ServerError> {
        let Some(mut task) = self.serve_task.lock().await.take() else {
            return Err(ServerError::NotRunning);
        };

        self.state.send_replace(ServerState::ShuttingDown);
        tracing::info!(?deadline, "shutting down mcp server");
        self.graceful.cancel();

        // Calls whose client went away are not tied to a connection
        let drain = async {
            let joined = (&mut task).await;
            self.registry.drain().await;
            joined
        };
        let drained = tokio::time::timeout(deadline, drain).await;

        let result = match drained {
            Ok(joined) => flatten(joined),
            Err(_) => {
                tracing::warn!(?deadline, "graceful shutdown timed out, forcing close");
                self.force_close.cancel();
                self.registry.cancel_calls();
                task.abort();

                self.registry.drain().await;
                Err(ServerError::DeadlineExceeded(deadline))
            }
        };

        self.state.send_replace(ServerState::Stopped);
        result
    }
}

fn flatten(joined: Result<std::io::Result<()>, tokio::task::JoinError>) -> Result<(), ServerError> {
    Ok(joined??)
}
