//! Error types for agentcom

use std::net::SocketAddr;

use thiserror::Error;
use tonic::Status;

use crate::auth::AuthError;

/// Agentcom error type
#[derive(Error, Debug)]
pub enum AgentComError {
    #[error("Permission denied: {0}")]
    Auth(#[from] AuthError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stream error: {}", .0.message())]
    Stream(Status),

    #[error("Snapshot exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("Failed to bind {listener} listener on {addr}: {source}")]
    Bind {
        listener: &'static str,
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("{listener} service died: {message}")]
    Listener {
        listener: &'static str,
        message: String,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for AgentComError {
    fn from(e: serde_json::Error) -> Self {
        AgentComError::Serialization(e.to_string())
    }
}

impl From<AgentComError> for Status {
    fn from(e: AgentComError) -> Self {
        match e {
            AgentComError::Auth(auth) => Status::permission_denied(auth.to_string()),
            AgentComError::Stream(status) => status,
            AgentComError::PayloadTooLarge { limit } => {
                Status::resource_exhausted(format!("Snapshot exceeds {limit} bytes"))
            }
            other => Status::internal(other.to_string()),
        }
    }
}

/// Result type for agentcom operations
pub type Result<T> = std::result::Result<T, AgentComError>;
