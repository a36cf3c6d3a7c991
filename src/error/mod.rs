//! Error types for netprobe

use thiserror::Error;

/// Main error type for netprobe
#[derive(Debug, Error)]
pub enum NetProbeError {
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Required environment variable not set: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid port specification '{0}' (expected PORT/PROTOCOL:NAME)")]
    InvalidPortSpec(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DaemonSet {0} not ready: {1}")]
    DaemonSetNotReady(String, String),

    #[error("timeout waiting for agents to be ready ({ready}/{expected} ready)")]
    ReadyTimeout { ready: usize, expected: usize },

    #[error("timeout waiting for tests to complete ({complete}/{expected} complete)")]
    RunTimeout { complete: usize, expected: usize },

    #[error("cancelled while waiting for agents")]
    Cancelled,
}

impl From<serde_json::Error> for NetProbeError {
    fn from(e: serde_json::Error) -> Self {
        NetProbeError::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for NetProbeError {
    fn from(e: serde_yaml::Error) -> Self {
        NetProbeError::Serialization(e.to_string())
    }
}

/// Result type alias for netprobe
pub type Result<T> = std::result::Result<T, NetProbeError>;
