//! Error types for the agent platform-data engine

use thiserror::Error;

use crate::domain::ports::OrgId;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while distributing platform data to agents
#[derive(Error, Debug)]
pub enum Error {
    /// The agent has no usable configuration attached yet
    #[error("Agent {agent} is not ready: no configuration attached")]
    AgentNotReady { agent: String },

    /// No global model has been installed for the organization
    #[error("No platform model installed for organization {0}")]
    ModelUnavailable(OrgId),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML document error
    #[error("Failed to parse YAML document: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Prometheus registry error
    #[error("Metrics registry error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
