//! Agentcom configuration

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::{
    AgentComError, DEFAULT_API_KEY_HEADER, DEFAULT_HOST, DEFAULT_MAX_SNAPSHOT_BYTES,
    DEFAULT_RPC_PORT, DEFAULT_SNAPSHOT_PATH, READBACK_PORT, SHUTDOWN_GRACE_SECS,
};

/// Main agentcom configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentComConfig {
    /// Bind host shared by both listeners
    pub host: String,

    /// gRPC port
    pub rpc_port: u16,

    /// HTTP read-back port
    pub http_port: u16,

    /// File holding the latest accepted snapshot
    pub snapshot_path: PathBuf,

    /// Metadata field that must carry a credential
    pub api_key_header: String,

    /// Largest snapshot accepted, in bytes
    pub max_snapshot_bytes: usize,

    /// Per-listener shutdown bound in seconds
    pub shutdown_grace_secs: u64,
}

impl Default for AgentComConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            rpc_port: DEFAULT_RPC_PORT,
            http_port: READBACK_PORT,
            snapshot_path: PathBuf::from(DEFAULT_SNAPSHOT_PATH),
            api_key_header: DEFAULT_API_KEY_HEADER.to_string(),
            max_snapshot_bytes: DEFAULT_MAX_SNAPSHOT_BYTES,
            shutdown_grace_secs: SHUTDOWN_GRACE_SECS,
        }
    }
}

impl AgentComConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the host
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the gRPC port
    pub fn with_rpc_port(mut self, port: u16) -> Self {
        self.rpc_port = port;
        self
    }

    /// Set the HTTP port. The binary always uses [`READBACK_PORT`].
    pub fn with_http_port(mut self, port: u16) -> Self {
        self.http_port = port;
        self
    }

    /// Set the snapshot file path
    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = path.into();
        self
    }

    /// Set the credential metadata field
    pub fn with_api_key_header(mut self, header: impl Into<String>) -> Self {
        self.api_key_header = header.into();
        self
    }

    /// Set the snapshot size limit
    pub fn with_max_snapshot_bytes(mut self, max: usize) -> Self {
        self.max_snapshot_bytes = max;
        self
    }

    /// Set the shutdown grace period
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace_secs = grace.as_secs();
        self
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    /// gRPC socket address
    pub fn rpc_addr(&self) -> crate::Result<SocketAddr> {
        self.socket_addr(self.rpc_port)
    }

    /// HTTP socket address
    pub fn http_addr(&self) -> crate::Result<SocketAddr> {
        self.socket_addr(self.http_port)
    }

    fn socket_addr(&self, port: u16) -> crate::Result<SocketAddr> {
        format!("{}:{}", self.host, port)
            .parse()
            .map_err(|e| AgentComError::InvalidConfig(format!("{}:{}: {}", self.host, port, e)))
    }

    /// Load configuration from a file
    pub fn from_file(path: &str) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn to_file(&self, path: &str) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
