//! Error types for the relay

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// A required request field was missing or empty
    #[error("Missing required field(s): {}", .missing.join(", "))]
    Validation { missing: Vec<&'static str> },

    /// Server-side setup problem, e.g. no access token configured
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The remote API rejected a call or could not be reached
    #[error("GitHub API error (status {}): {message}", .status.map(|s| s.to_string()).unwrap_or_else(|| "none".to_string()))]
    Upstream { status: Option<u16>, message: String },
}

impl RelayError {
    pub fn upstream(status: u16, message: impl Into<String>) -> Self {
        Self::Upstream {
            status: Some(status),
            message: message.into(),
        }
    }

    /// HTTP status the relay should answer with
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation { .. } => 400,
            Self::Configuration(_) => 500,
            Self::Upstream { status, .. } => status.unwrap_or(500),
        }
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(e: reqwest::Error) -> Self {
        Self::Upstream {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
