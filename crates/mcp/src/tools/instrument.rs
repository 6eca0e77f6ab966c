// Request logging decorator applied to every registered tool

use crate::tools::registry::{CallContext, ToolHandler, ToolReply};
use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use nodescope_core::{RequestStore, StoreError};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Wraps a [`ToolHandler`] so each call is timed, written to the request log
/// and reported through `tracing`. The inner outcome is returned untouched.
///
/// A call interrupted through the cancellation token is recorded as a failure.
pub struct Instrumented<H> {
    inner: H,
    store: Arc<dyn RequestStore>,
    cancel: CancellationToken,
}

impl<H> Instrumented<H> {
    pub fn new(inner: H, store: Arc<dyn RequestStore>) -> Self {
        Self {
            inner,
            store,
            cancel: CancellationToken::new(),
        }
    }

    /// Interrupt in-flight calls once `cancel` fires
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn record<O: Serialize>(
        &self,
        ctx: &CallContext,
        outcome: &Result<ToolReply<O>>,
        timestamp: &str,
    ) -> Result<(), StoreError> {
        match outcome {
            Ok(reply) => {
                let payload = serde_json::to_value(&reply.output)?;
                self.store
                    .record_success(&ctx.tool_name, &ctx.session_id, payload)
            }
            Err(err) => self.store.record_failure(
                &ctx.tool_name,
                &ctx.session_id,
                &format!("[{}] {:#}", timestamp, err),
            ),
        }
    }
}

#[async_trait::async_trait]
impl<I, O, H> ToolHandler<I, O> for Instrumented<H>
where
    I: Send + 'static,
    O: Serialize + Send + 'static,
    H: ToolHandler<I, O>,
{
    async fn call(&self, ctx: &CallContext, input: I) -> Result<ToolReply<O>> {
        let started = Instant::now();
        let outcome = tokio::select! {
            outcome = self.inner.call(ctx, input) => outcome,
            _ = self.cancel.cancelled() => Err(anyhow::anyhow!("call cancelled by server shutdown")),
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);

        // Audit logging is best-effort and never changes the caller's outcome
        if let Err(e) = self.record(ctx, &outcome, &timestamp) {
            tracing::warn!(tool = %ctx.tool_name, error = %e, "failed to record tool call");
        }

        match &outcome {
            Ok(_) => tracing::info!(
                tool = %ctx.tool_name,
                timestamp = %timestamp,
                session = %ctx.session_id,
                elapsed_ms,
                "tool called"
            ),
            Err(err) => tracing::info!(
                tool = %ctx.tool_name,
                timestamp = %timestamp,
                session = %ctx.session_id,
                elapsed_ms,
                error = %format!("{:#}", err),
                "tool called"
            ),
        }

        outcome
    }
}
