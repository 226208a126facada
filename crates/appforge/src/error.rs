//! Error type shared by all chat providers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured error type for provider interactions.
#[derive(Debug, Error, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ProviderError {
    #[error("missing credential for provider: {provider}")]
    MissingCredential { provider: String },

    #[error("unknown provider: {name}")]
    UnknownProvider { name: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("http error: {0}")]
    Http(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("stream cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        ProviderError::Http(e.to_string())
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(e: serde_json::Error) -> Self {
        ProviderError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_are_human_readable() {
        assert_eq!(
            ProviderError::MissingCredential {
                provider: "openai".into()
            }
            .to_string(),
            "missing credential for provider: openai"
        );
        assert_eq!(
            ProviderError::UnknownProvider { name: "bad".into() }.to_string(),
            "unknown provider: bad"
        );
        assert_eq!(ProviderError::Cancelled.to_string(), "stream cancelled");
    }

    #[test]
    fn serde_round_trip() {
        let original = ProviderError::Provider("rate limit".into());
        let json = serde_json::to_string(&original).unwrap();
        let restored: ProviderError = serde_json::from_str(&json).unwrap();
        assert_eq!(original.to_string(), restored.to_string());
    }
}
