// Node identity tool

use crate::protocol::ToolSchema;
use crate::tools::registry::{json_schema_object, CallContext, ToolHandler, ToolReply};
use anyhow::{Context, Result};
use nodescope_core::{HostProvider, NodeInfo};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const NODEINFO_TOOL: &str = "nodeinfo";

/// The tool takes no parameters
#[derive(Debug, Default, Deserialize)]
pub struct NodeInfoInput {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeInfoOutput {
    pub node_info: NodeInfo,
}

/// Reports the hostname and internal IP of the serving node
pub struct NodeInfoTool {
    host: Arc<dyn HostProvider>,
}

impl NodeInfoTool {
    pub fn new(host: Arc<dyn HostProvider>) -> Self {
        Self { host }
    }

    pub fn schema() -> ToolSchema {
        ToolSchema {
            name: NODEINFO_TOOL.to_string(),
            description: "return host and internal info".to_string(),
            input_schema: json_schema_object(serde_json::json!({}), vec![]),
        }
    }
}

#[async_trait::async_trait]
impl ToolHandler<NodeInfoInput, NodeInfoOutput> for NodeInfoTool {
    async fn call(
        &self,
        _ctx: &CallContext,
        _input: NodeInfoInput,
    ) -> Result<ToolReply<NodeInfoOutput>> {
        let node_info = self.host.node_info().context("failed to get node info")?;

        let summary = format!(
            "Hostname: {}, Internal IP: {}",
            node_info.hostname, node_info.internal_ip
        );

        Ok(ToolReply::new(NodeInfoOutput { node_info }).with_text(summary))
    }
}
