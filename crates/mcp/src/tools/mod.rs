pub mod instrument;
pub mod nodeinfo;
mod registry;

pub use instrument::Instrumented;
pub use nodeinfo::{NodeInfoInput, NodeInfoOutput, NodeInfoTool, NODEINFO_TOOL};
pub use registry::{
    handler_fn, json_schema_object, CallContext, HandlerFn, ToolHandler,
    ToolRegistry, ToolReply,
};

use nodescope_core::{HostProvider, RequestStore};
use std::sync::Arc;

/// Registry holding the built-in tool set
pub fn default_registry(store: Arc<dyn RequestStore>, host: Arc<dyn HostProvider>) -> ToolRegistry {
    let mut registry = ToolRegistry::new(store);
    registry.add_tool(NodeInfoTool::schema(), NodeInfoTool::new(host));
    registry
}
