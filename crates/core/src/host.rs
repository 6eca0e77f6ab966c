use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::OnceLock;

/// Identity of the node this process serves from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub hostname: String,
    pub internal_ip: String,
}

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("{what} not available")]
    NotAvailable {
        what: &'static str,
        #[source]
        source: Option<std::io::Error>,
    },
}

impl HostError {
    fn not_available(what: &'static str, source: Option<std::io::Error>) -> Self {
        Self::NotAvailable { what, source }
    }

    pub fn is_not_available(&self) -> bool {
        matches!(self, Self::NotAvailable { .. })
    }
}

/// Capability handed to tool handlers that need the node's identity
pub trait HostProvider: Send + Sync {
    fn node_info(&self) -> Result<NodeInfo, HostError>;
}

/// Host provider backed by static configuration, falling back to discovery
///
/// Values discovered on first use are cached; later calls never look again.
pub struct SystemHost {
    node_name: Option<String>,
    node_ip: Option<String>,
    cached: OnceLock<NodeInfo>,
}

impl SystemHost {
    /// Empty strings count as unset.
    pub fn new(node_name: Option<String>, node_ip: Option<String>) -> Self {
        Self {
            node_name: node_name.filter(|name| !name.is_empty()),
            node_ip: node_ip.filter(|ip| !ip.is_empty()),
            cached: OnceLock::new(),
        }
    }
}

impl HostProvider for SystemHost {
    fn node_info(&self) -> Result<NodeInfo, HostError> {
        if let Some(info) = self.cached.get() {
            return Ok(info.clone());
        }

        let hostname = match &self.node_name {
            Some(name) => name.clone(),
            None => discover_hostname()?,
        };

        let internal_ip = match &self.node_ip {
            Some(ip) => ip.clone(),
            None => discover_internal_ip()?.to_string(),
        };

        // Racing callers may both discover; the first stored value wins.
        let info = self.cached.get_or_init(|| NodeInfo {
            hostname,
            internal_ip,
        });

        Ok(info.clone())
    }
}

fn discover_hostname() -> Result<String, HostError> {
    gethostname::gethostname()
        .into_string()
        .ok()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| HostError::not_available("hostname", None))
}

/// First non-loopback IPv4 address across the system's interfaces
fn discover_internal_ip() -> Result<IpAddr, HostError> {
    let interfaces = if_addrs::get_if_addrs()
        .map_err(|err| HostError::not_available("internal IP", Some(err)))?;

    first_non_loopback_ipv4(interfaces.iter().map(if_addrs::Interface::ip))
        .ok_or_else(|| HostError::not_available("internal IP", None))
}

fn first_non_loopback_ipv4(addrs: impl IntoIterator<Item = IpAddr>) -> Option<IpAddr> {
    addrs
        .into_iter()
        .find(|ip| ip.is_ipv4() && !ip.is_loopback())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_values_win() {
        let host = SystemHost::new(Some("node-1".to_string()), Some("10.0.0.5".to_string()));

        let info = host.node_info().unwrap();
        assert_eq!(
            info,
            NodeInfo {
                hostname: "node-1".to_string(),
                internal_ip: "10.0.0.5".to_string(),
            }
        );

        // Served from the cache on the second call
        assert_eq!(host.node_info().unwrap(), info);
    }

    #[test]
    fn test_empty_configuration_is_unset() {
        let host = SystemHost::new(Some(String::new()), Some(String::new()));
        assert!(host.node_name.is_none());
        assert!(host.node_ip.is_none());
    }

    #[test]
    fn test_not_available_error() {
        let err = HostError::not_available("internal IP", None);
        assert!(err.is_not_available());
        assert_eq!(err.to_string(), "internal IP not available");
    }

    #[test]
    fn test_node_info_serialization() {
        let info = NodeInfo {
            hostname: "node-1".to_string(),
            internal_ip: "10.0.0.5".to_string(),
        };

        assert_eq!(
            serde_json::to_value(&info).unwrap(),
            serde_json::json!({"hostname": "node-1", "internal_ip": "10.0.0.5"})
        );
    }

    #[test]
    fn test_first_non_loopback_ipv4() {
        let addrs: Vec<IpAddr> = ["127.0.0.1", "::1", "fe80::1", "10.0.0.5", "192.168.1.2"]
            .iter()
            .map(|ip| ip.parse().unwrap())
            .collect();

        assert_eq!(
            first_non_loopback_ipv4(addrs),
            Some("10.0.0.5".parse().unwrap())
        );

        let loopback_only: Vec<IpAddr> = vec!["127.0.0.1".parse().unwrap(), "::1".parse().unwrap()];
        assert_eq!(first_non_loopback_ipv4(loopback_only), None);
    }

    #[test]
    fn test_discovered_hostname_with_configured_ip() {
        let host = SystemHost::new(None, Some("10.0.0.5".to_string()));

        let info = host.node_info().unwrap();
        assert_eq!(info.hostname, discover_hostname().unwrap());
        assert!(!info.hostname.is_empty());
        assert_eq!(info.internal_ip, "10.0.0.5");
    }

    #[test]
    fn test_full_discovery() {
        let host = SystemHost::new(None, None);

        // Hosts with only a loopback interface have no internal IP to report
        match host.node_info() {
            Ok(info) => {
                assert!(!info.hostname.is_empty());
                let ip: IpAddr = info.internal_ip.parse().unwrap();
                assert!(ip.is_ipv4() && !ip.is_loopback());
                assert_eq!(host.node_info().unwrap(), info);
            }
            Err(err) => assert!(err.is_not_available()),
        }
    }
}
