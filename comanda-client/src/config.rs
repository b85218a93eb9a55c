//! Client configuration

use std::time::Duration;

/// Configuration for a device connecting to the Comanda server
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server base URL (e.g. "http://localhost:3000")
    pub base_url: String,

    /// Tenant this device belongs to
    pub tenant_id: String,

    /// Request timeout
    pub timeout: Duration,

    /// Drop a queued operation into the dead-letter list after this many
    /// failed sync attempts
    pub max_retries: u32,

    /// Interval between periodic bootstrap reconciliations
    pub bootstrap_interval: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            tenant_id: tenant_id.into(),
            timeout: Duration::from_secs(5),
            max_retries: 10,
            bootstrap_interval: Duration::from_secs(30),
        }
    }
}
