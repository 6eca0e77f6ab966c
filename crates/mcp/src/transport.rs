// Streamable HTTP transport: JSON-RPC requests on POST /mcp, JSON responses

use crate::protocol::{
    CallToolParams, InitializeParams, InitializeResult, JsonRpcError, JsonRpcRequest,
    JsonRpcResponse, ListToolsResult, ServerCapabilities, ServerInfo, ToolsCapability,
    PROTOCOL_VERSION,
};
use crate::error::ToolCallError;
use crate::tools::ToolRegistry;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

/// Header carrying the session id between client and server
pub const SESSION_HEADER: &str = "mcp-session-id";

/// Shared state of the HTTP endpoint
#[derive(Clone)]
pub struct TransportState {
    registry: Arc<ToolRegistry>,
    server_info: ServerInfo,
    /// Cancelled when shutdown gives up waiting on in-flight requests
    force_close: CancellationToken,
}

impl TransportState {
    pub fn new(
        registry: Arc<ToolRegistry>,
        server_info: ServerInfo,
        force_close: CancellationToken,
    ) -> Self {
        Self {
            registry,
            server_info,
            force_close,
        }
    }
}

/// Create the MCP router
pub fn router(state: TransportState) -> Router {
    Router::new()
        .route("/mcp", post(handle_mcp))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Health check endpoint
async fn healthz(State(state): State<Arc<TransportState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": state.server_info.name,
        "version": state.server_info.version,
    }))
}

async fn handle_mcp(
    State(state): State<Arc<TransportState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let force_close = state.force_close.clone();

    tokio::select! {
        response = dispatch(&state, &headers, &body) => response,
        _ = force_close.cancelled() => {
            tracing::warn!("request aborted by forced shutdown");
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}

async fn dispatch(state: &TransportState, headers: &HeaderMap, body: &[u8]) -> Response {
    let request: JsonRpcRequest = match serde_json::from_slice(body) {
        Ok(request) => request,
        Err(e) => {
            return Json(JsonRpcResponse::error(
                serde_json::Value::Null,
                JsonRpcError::parse_error(format!("Invalid JSON: {}", e)),
            ))
            .into_response();
        }
    };

    if request.jsonrpc != "2.0" {
        let id = request.id.unwrap_or(serde_json::Value::Null);
        return Json(JsonRpcResponse::error(
            id,
            JsonRpcError::invalid_request("jsonrpc must be '2.0'"),
        ))
        .into_response();
    }

    if request.is_notification() {
        tracing::debug!(method = %request.method, "notification received");
        return StatusCode::ACCEPTED.into_response();
    }
    let id = request.id.clone().unwrap_or(serde_json::Value::Null);

    let session_id = headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();

    tracing::debug!(method = %request.method, session = %session_id, "handling request");

    match request.method.as_str() {
        "initialize" => handle_initialize(state, id, request.params),
        "ping" => Json(JsonRpcResponse::success(id, serde_json::json!({}))).into_response(),
        "tools/list" => Json(JsonRpcResponse::success(
            id,
            ListToolsResult {
                tools: state.registry.list_schemas(),
            },
        ))
        .into_response(),
        "tools/call" => handle_tools_call(state, id, request.params, &session_id)
            .await
            .into_response(),
        method => Json(JsonRpcResponse::error(
            id,
            JsonRpcError::method_not_found(method),
        ))
        .into_response(),
    }
}

fn handle_initialize(
    state: &TransportState,
    id: serde_json::Value,
    params: Option<serde_json::Value>,
) -> Response {
    let params: InitializeParams = params
        .and_then(|p| serde_json::from_value(p).ok())
        .unwrap_or_default();

    let session_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(
        session = %session_id,
        client = ?params.client_info.as_ref().map(|c| &c.name),
        requested_version = ?params.protocol_version,
        "session initialized"
    );

    let result = InitializeResult {
        protocol_version: PROTOCOL_VERSION.to_string(),
        capabilities: ServerCapabilities {
            tools: Some(ToolsCapability {
                list_changed: false,
            }),
        },
        server_info: state.server_info.clone(),
    };

    let mut response = Json(JsonRpcResponse::success(id, result)).into_response();
    if let Ok(value) = HeaderValue::from_str(&session_id) {
        response.headers_mut().insert(SESSION_HEADER, value);
    }
    response
}

async fn handle_tools_call(
    state: &TransportState,
    id: serde_json::Value,
    params: Option<serde_json::Value>,
    session_id: &str,
) -> Json<JsonRpcResponse> {
    let params: CallToolParams =
        match params.map(serde_json::from_value::<CallToolParams>).transpose() {
            Ok(Some(params)) => params,
            Ok(None) => {
                return Json(JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_params("Missing params"),
                ))
            }
            Err(e) => {
                return Json(JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_params(format!("Invalid params: {}", e)),
                ))
            }
        };

    match state
        .registry
        .call(&params.name, session_id, params.arguments)
        .await
    {
        Ok(result) => Json(JsonRpcResponse::success(id, result)),
        Err(e @ ToolCallError::Aborted(_)) => {
            tracing::error!(tool = %params.name, error = %e, "tool call aborted");
            Json(JsonRpcResponse::error(
                id,
                JsonRpcError::internal_error(e.to_string()),
            ))
        }
        // Unknown tools and undecodable arguments never reach a handler
        Err(e) => Json(JsonRpcResponse::error(
            id,
            JsonRpcError::invalid_params(e.to_string()),
        )),
    }
}
