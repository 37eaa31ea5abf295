//! Error types for the deployment reconciler

use thiserror::Error;

/// Main error type for the deployment reconciler
#[derive(Error, Debug)]
pub enum NodeError {
    /// No container with the requested name exists on the remote host.
    /// Callers treat this as "nothing deployed yet", not as a failure.
    #[error("no container {container} on {server}")]
    NotFound { server: String, container: String },

    /// The service container exists but is not running.
    #[error("service {container} on {server} is offline")]
    ServiceOffline { server: String, container: String },

    /// The container appears to be live but querying it failed.
    #[error("service {container} on {server} is unreachable: {reason}")]
    Unreachable {
        server: String,
        container: String,
        reason: String,
    },

    /// Locally detectable bad input, e.g. an undecodable credential.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// An upload, build or other remote command failed, with whatever
    /// output the remote side produced before failing.
    #[error("remote command failed on {server}: {message}")]
    RemoteCommand {
        server: String,
        message: String,
        output: Vec<u8>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl NodeError {
    /// Remote output attached to the failure, if any was captured.
    pub fn remote_output(&self) -> Option<&[u8]> {
        match self {
            NodeError::RemoteCommand { output, .. } if !output.is_empty() => Some(output),
            _ => None,
        }
    }

    /// True when the error means "no live instance", which callers handle
    /// by falling back to a fresh deployment with default configuration.
    pub fn is_offline(&self) -> bool {
        matches!(
            self,
            NodeError::NotFound { .. } | NodeError::ServiceOffline { .. }
        )
    }
}
