//! Client configuration.

use std::time::Duration;

/// Where and how to reach the dashboard API.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Dashboard base URL.
    pub base_url: String,

    /// Namespace to read resources from. `*` means all namespaces.
    pub namespace: String,

    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            namespace: "default".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}
