// Core types for the nodescope tool server: the durable request log and the
// host identity capability handed to tool handlers.

pub mod host;
pub mod storage;

pub use host::{HostError, HostProvider, NodeInfo, SystemHost};
pub use storage::{JsonlRequestStore, RequestEntry, RequestStore, StoreError};
