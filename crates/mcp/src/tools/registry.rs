// Tool registry: typed handlers behind a uniform JSON dispatch surface

use crate::error::ToolCallError;
use crate::protocol::{CallToolResult, ToolContent, ToolSchema};
use crate::tools::instrument::Instrumented;
use anyhow::Result;
use nodescope_core::RequestStore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Per-call information supplied by the transport
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallContext {
    pub tool_name: String,
    /// Empty when the transport provides no session
    pub session_id: String,
}

impl CallContext {
    pub fn new(tool_name: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            session_id: session_id.into(),
        }
    }
}

/// Successful handler outcome: the typed output plus optional human-readable content
#[derive(Debug, Clone, PartialEq)]
pub struct ToolReply<O> {
    pub output: O,
    pub content: Vec<ToolContent>,
}

impl<O> ToolReply<O> {
    pub fn new(output: O) -> Self {
        Self {
            output,
            content: Vec::new(),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.content.push(ToolContent::text(text));
        self
    }
}

impl<O: Serialize> ToolReply<O> {
    /// Convert into the wire result. Without explicit content the serialized
    /// output doubles as the text content.
    pub fn into_call_result(self) -> CallToolResult {
        let structured = match serde_json::to_value(&self.output) {
            Ok(value) => value,
            Err(e) => return CallToolResult::error(format!("Failed to serialize output: {}", e)),
        };

        let content = if self.content.is_empty() {
            vec![ToolContent::text(structured.to_string())]
        } else {
            self.content
        };

        CallToolResult {
            content,
            structured_content: Some(structured),
            is_error: None,
        }
    }
}

/// A tool implementation over a typed input `I` and output `O`
#[async_trait::async_trait]
pub trait ToolHandler<I, O>: Send + Sync {
    async fn call(&self, ctx: &CallContext, input: I) -> Result<ToolReply<O>>;
}

/// Adapts an async closure into a [`ToolHandler`]
pub struct HandlerFn<F>(F);

pub fn handler_fn<I, O, F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(CallContext, I) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ToolReply<O>>> + Send,
{
    HandlerFn(f)
}

#[async_trait::async_trait]
impl<I, O, F, Fut> ToolHandler<I, O> for HandlerFn<F>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(CallContext, I) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ToolReply<O>>> + Send,
{
    async fn call(&self, ctx: &CallContext, input: I) -> Result<ToolReply<O>> {
        (self.0)(ctx.clone(), input).await
    }
}

/// Type-erased view of a registered tool
trait DynTool: Send + Sync {
    /// Decode `arguments` and run the handler on a task tracked by `calls`.
    /// The call completes even if the returned handle is dropped.
    fn spawn_call(
        self: Arc<Self>,
        calls: &TaskTracker,
        ctx: CallContext,
        arguments: serde_json::Value,
    ) -> Result<JoinHandle<CallToolResult>, ToolCallError>;
}

struct TypedTool<I, O, H> {
    handler: H,
    _types: PhantomData<fn(I) -> O>,
}

impl<I, O, H> DynTool for TypedTool<I, O, H>
where
    I: DeserializeOwned + Send + 'static,
    O: Serialize + Send + 'static,
    H: ToolHandler<I, O> + 'static,
{
    fn spawn_call(
        self: Arc<Self>,
        calls: &TaskTracker,
        ctx: CallContext,
        arguments: serde_json::Value,
    ) -> Result<JoinHandle<CallToolResult>, ToolCallError> {
        // Tools without parameters may be called with no arguments at all
        let arguments = if arguments.is_null() {
            serde_json::Value::Object(Default::default())
        } else {
            arguments
        };

        let input: I =
            serde_json::from_value(arguments).map_err(|e| ToolCallError::InvalidArguments {
                tool: ctx.tool_name.clone(),
                message: e.to_string(),
            })?;

        Ok(calls.spawn(async move {
            match self.handler.call(&ctx, input).await {
                Ok(reply) => reply.into_call_result(),
                Err(err) => CallToolResult::error(format!("{:#}", err)),
            }
        }))
    }
}

struct RegisteredTool {
    schema: ToolSchema,
    tool: Arc<dyn DynTool>,
}

/// Tool registry; every handler added here is wrapped with request logging
///
/// Handlers run on their own tasks, so a caller that goes away mid-call does
/// not cut the call (or its log entry) short.
pub struct ToolRegistry {
    store: Arc<dyn RequestStore>,
    tools: HashMap<String, RegisteredTool>,
    calls: TaskTracker,
    cancel: CancellationToken,
}

impl ToolRegistry {
    pub fn new(store: Arc<dyn RequestStore>) -> Self {
        Self {
            store,
            tools: HashMap::new(),
            calls: TaskTracker::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Register a tool
    ///
    /// # Panics
    ///
    /// Panics if a tool with the same name is already registered.
    pub fn add_tool<I, O, H>(&mut self, schema: ToolSchema, handler: H)
    where
        I: DeserializeOwned + Send + 'static,
        O: Serialize + Send + 'static,
        H: ToolHandler<I, O> + 'static,
    {
        assert!(
            !self.contains(&schema.name),
            "tool `{}` registered twice",
            schema.name
        );

        let tool = TypedTool {
            handler: Instrumented::new(handler, self.store.clone())
                .with_cancel(self.cancel.clone()),
            _types: PhantomData,
        };

        tracing::debug!(tool = %schema.name, "registered tool");
        self.tools.insert(
            schema.name.clone(),
            RegisteredTool {
                schema,
                tool: Arc::new(tool),
            },
        );
    }

    /// Call a tool by name with raw JSON arguments
    pub async fn call(
        &self,
        name: &str,
        session_id: &str,
        arguments: serde_json::Value,
    ) -> Result<CallToolResult, ToolCallError> {
        let registered = self
            .tools
            .get(name)
            .ok_or_else(|| ToolCallError::UnknownTool(name.to_string()))?;

        let ctx = CallContext::new(name, session_id);
        let call = registered
            .tool
            .clone()
            .spawn_call(&self.calls, ctx, arguments)?;

        Ok(call.await?)
    }

    /// Wait until every call started so far has finished
    pub async fn drain(&self) {
        self.calls.close();
        self.calls.wait().await;
    }

    /// Interrupt running calls; each still records a failure entry
    pub fn cancel_calls(&self) {
        self.cancel.cancel();
    }

    /// Number of calls still running
    pub fn active_calls(&self) -> usize {
        self.calls.len()
    }

    /// List all tool schemas, sorted by name
    pub fn list_schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<_> = self.tools.values().map(|t| t.schema.clone()).collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// Check if a tool exists
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

// Helper functions for creating tool schemas

pub fn json_schema_object(properties: serde_json::Value, required: Vec<&str>) -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required
    })
}
