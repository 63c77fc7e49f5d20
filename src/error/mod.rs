//! Error types for the MCP host.

use thiserror::Error;

/// Primary error type for all host operations.
#[derive(Error, Debug)]
pub enum HostError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Connect to '{server}' failed: {message}")]
    Connect { server: String, message: String },

    #[error("Catalog collision: '{qualified_name}' exposed by both '{first}' and '{second}'")]
    CatalogCollision {
        qualified_name: String,
        first: String,
        second: String,
    },

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Session closed: {0}")]
    SessionClosed(String),

    #[error("Protocol error {code}: {message}")]
    Protocol { code: i64, message: String },

    #[error("Tool execution error: {tool_name} — {message}")]
    ToolExecution { tool_name: String, message: String },

    #[error("Model call failed{}: {message}", status_suffix(.status))]
    ModelCall {
        status: Option<u16>,
        message: String,
    },

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid transcript: {0}")]
    InvalidTranscript(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (status {s})")).unwrap_or_default()
}

/// Coarse classification used by callers deciding how to react to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Connect,
    Catalog,
    UnknownTool,
    /// The tool infrastructure (network, session, timeout) failed.
    Transport,
    /// The tool ran and reported a failure.
    ToolExecution,
    Model,
    Transcript,
    InvalidInput,
}

impl HostError {
    /// Create a model call error from an HTTP status and body.
    pub fn model_status(status: u16, message: impl Into<String>) -> Self {
        Self::ModelCall {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Create a model call error that did not come from an HTTP status.
    pub fn model(message: impl Into<String>) -> Self {
        Self::ModelCall {
            status: None,
            message: message.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Connect { .. } => ErrorCategory::Connect,
            Self::CatalogCollision { .. } => ErrorCategory::Catalog,
            Self::UnknownTool(_) => ErrorCategory::UnknownTool,
            Self::Transport(_)
            | Self::SessionClosed(_)
            | Self::Timeout(_)
            | Self::Network(_)
            | Self::Io(_) => ErrorCategory::Transport,
            // A JSON-RPC error object means the server received and answered the call.
            Self::Protocol { .. } | Self::ToolExecution { .. } => ErrorCategory::ToolExecution,
            Self::ModelCall { .. } => ErrorCategory::Model,
            Self::InvalidTranscript(_) => ErrorCategory::Transcript,
            Self::InvalidArgument(_) | Self::Serialization(_) => ErrorCategory::InvalidInput,
        }
    }

    /// Whether retrying the same operation could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ModelCall {
                status: Some(status),
                ..
            } => *status == 429 || (500..=599).contains(status),
            _ => matches!(self.category(), ErrorCategory::Transport),
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, HostError>;
