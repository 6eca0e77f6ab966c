// Test doubles shared by the unit tests of this crate

use nodescope_core::{HostError, HostProvider, NodeInfo, RequestEntry, RequestStore, StoreError};
use std::sync::Mutex;

/// Request store that keeps entries in memory
#[derive(Default)]
pub(crate) struct MemoryStore {
    entries: Mutex<Vec<RequestEntry>>,
}

impl MemoryStore {
    pub(crate) fn entries(&self) -> Vec<RequestEntry> {
        self.entries.lock().unwrap().clone()
    }
}

impl RequestStore for MemoryStore {
    fn record_success(
        &self,
        tool_name: &str,
        session_id: &str,
        result: serde_json::Value,
    ) -> Result<(), StoreError> {
        self.entries
            .lock()
            .unwrap()
            .push(RequestEntry::success(tool_name, session_id, result));
        Ok(())
    }

    fn record_failure(
        &self,
        tool_name: &str,
        session_id: &str,
        error: &str,
    ) -> Result<(), StoreError> {
        self.entries
            .lock()
            .unwrap()
            .push(RequestEntry::failure(tool_name, session_id, error));
        Ok(())
    }
}

/// Request store whose writes always fail
pub(crate) struct FailingStore;

impl RequestStore for FailingStore {
    fn record_success(&self, _: &str, _: &str, _: serde_json::Value) -> Result<(), StoreError> {
        Err(StoreError::Closed)
    }

    fn record_failure(&self, _: &str, _: &str, _: &str) -> Result<(), StoreError> {
        Err(StoreError::Closed)
    }
}

pub(crate) struct FakeHost(NodeInfo);

impl FakeHost {
    pub(crate) fn new(hostname: &str, internal_ip: &str) -> Self {
        Self(NodeInfo {
            hostname: hostname.to_string(),
            internal_ip: internal_ip.to_string(),
        })
    }
}

impl HostProvider for FakeHost {
    fn node_info(&self) -> Result<NodeInfo, HostError> {
        Ok(self.0.clone())
    }
}

/// Host provider with nothing configured and nothing discoverable
pub(crate) struct MissingHost;

impl HostProvider for MissingHost {
    fn node_info(&self) -> Result<NodeInfo, HostError> {
        Err(HostError::NotAvailable {
            what: "internal IP",
            source: None,
        })
    }
}
