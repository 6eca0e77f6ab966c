// MCP (Model Context Protocol) tool server over streamable HTTP.
// Every registered tool is instrumented and its outcome written to the
// request log.

pub mod error;
pub mod protocol;
pub mod server;
pub mod tools;
pub mod transport;

#[cfg(test)]
mod testing;

pub use error::{ServerError, ToolCallError};
pub use server::{McpServer, ServerOptions, ServerState};
pub use tools::{default_registry, ToolRegistry};
