use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure classes an upstream provider can report. 429 and 5xx are kept
/// distinguishable so callers can decide whether a retry makes sense; this
/// crate itself never retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpstreamKind {
    RateLimited,
    ServerFault,
    Other,
}

impl UpstreamKind {
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => UpstreamKind::RateLimited,
            s if s >= 500 => UpstreamKind::ServerFault,
            _ => UpstreamKind::Other,
        }
    }
}

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("missing credential: {0}")]
    MissingCredential(String),

    #[error("upstream error ({status}): {message}")]
    Upstream {
        kind: UpstreamKind,
        status: u16,
        message: String,
    },

    #[error("network error: {0}")]
    Network(String),
}

impl ChatError {
    pub fn upstream(status: u16, message: impl Into<String>) -> Self {
        ChatError::Upstream {
            kind: UpstreamKind::from_status(status),
            status,
            message: message.into(),
        }
    }

    /// Translate the failure into the message shown to the end user.
    pub fn user_message(&self) -> String {
        match self {
            ChatError::InvalidRequest(msg) => format!("That request couldn't be sent: {msg}"),
            ChatError::MissingCredential(var) => {
                format!("No API key is configured. Set {var} or point the client at a relay.")
            }
            ChatError::Upstream { status, .. } if *status == 401 || *status == 403 => {
                "The provider rejected the API key. Double-check the configured credential."
                    .to_string()
            }
            ChatError::Upstream {
                kind: UpstreamKind::RateLimited,
                ..
            } => "The provider is rate limiting requests. Wait a moment and try again.".to_string(),
            ChatError::Upstream {
                kind: UpstreamKind::ServerFault,
                ..
            } => "The provider had a problem answering. Try again shortly.".to_string(),
            ChatError::Upstream { message, .. } => {
                format!("The provider returned an error: {message}")
            }
            ChatError::Network(_) => {
                "Failed to reach the server. Check your connection, or configure a direct API key."
                    .to_string()
            }
        }
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        ChatError::Network(err.to_string())
    }
}
