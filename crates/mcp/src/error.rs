use std::time::Duration;

/// Errors raised when dispatching a `tools/call` outside the handler itself
#[derive(Debug, thiserror::Error)]
pub enum ToolCallError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },

    #[error("Tool call aborted: {0}")]
    Aborted(#[from] tokio::task::JoinError),
}

/// Errors raised by the server lifecycle
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("listener failed: {0}")]
    Serve(#[from] std::io::Error),

    #[error("server already started")]
    AlreadyStarted,

    #[error("server is not running")]
    NotRunning,

    #[error("graceful shutdown exceeded deadline of {0:?}")]
    DeadlineExceeded(Duration),

    #[error("listener task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl ServerError {
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, Self::DeadlineExceeded(_))
    }
}
