//! Service catalog entries

use std::fmt;

use serde::{Deserialize, Serialize};

/// Health state of a service instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HealthStatus {
    /// All checks passing.
    Passing,
    /// At least one check degraded.
    Warning,
    /// At least one check failing.
    Critical,
}

impl HealthStatus {
    /// Convert to string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passing => "passing",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One registered instance of a service on a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInstance {
    /// Node the instance runs on.
    pub node: String,
    /// Service name (the subscription filter key for health events).
    pub service: String,
    /// Instance ID, unique per node.
    pub id: String,
    /// Advertised address.
    pub address: String,
    /// Advertised port.
    pub port: u16,
    /// Aggregated health of the instance.
    pub status: HealthStatus,
}

impl ServiceInstance {
    /// Create a passing instance with the instance ID defaulted to the
    /// service name.
    pub fn new(node: impl Into<String>, service: impl Into<String>) -> Self {
        let service = service.into();
        Self {
            node: node.into(),
            id: service.clone(),
            service,
            address: String::new(),
            port: 0,
            status: HealthStatus::Passing,
        }
    }

    /// Set the advertised address and port.
    pub fn with_address(mut self, address: impl Into<String>, port: u16) -> Self {
        self.address = address.into();
        self.port = port;
        self
    }

    /// Set the health status.
    pub fn with_status(mut self, status: HealthStatus) -> Self {
        self.status = status;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(HealthStatus::Passing.to_string(), "passing");
        assert_eq!(HealthStatus::Critical.as_str(), "critical");
    }

    #[test]
    fn test_instance_builder() {
        let instance = ServiceInstance::new("node1", "web")
            .with_address("10.0.0.1", 8080)
            .with_status(HealthStatus::Warning);

        assert_eq!(instance.id, "web");
        assert_eq!(instance.port, 8080);
        assert_eq!(instance.status, HealthStatus::Warning);
    }
}
