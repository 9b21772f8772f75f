use thiserror::Error;

use crate::registry::ProviderId;

/// Errors that can occur while dispatching a request upstream
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Named provider is not registered
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    /// Client sent a malformed or invalid request body
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No API key available for a provider that requires one
    #[error("missing credentials for provider: {0}")]
    MissingCredentials(ProviderId),

    /// Upstream provider returned an error
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Error during streaming response
    #[error("streaming error: {0}")]
    Streaming(String),

    /// Unexpected internal error
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl GatewayError {
    /// Message safe to surface to the requesting client
    ///
    /// Internal errors are masked; everything else already carries a
    /// client-appropriate description.
    pub fn client_message(&self) -> String {
        match self {
            Self::Internal(_) => "an internal error occurred".to_owned(),
            other => other.to_string(),
        }
    }

    /// Machine-readable error category, in the shape `OpenAI`-style error
    /// bodies use for their `type` field
    pub const fn error_type(&self) -> &str {
        match self {
            Self::UnknownProvider(_) => "not_found_error",
            Self::InvalidRequest(_) => "invalid_request_error",
            Self::MissingCredentials(_) => "authentication_error",
            Self::Upstream(_) => "upstream_error",
            Self::Streaming(_) => "streaming_error",
            Self::Internal(_) => "internal_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_errors_are_masked() {
        let err = GatewayError::Internal(anyhow::anyhow!("connection pool exhausted at 10.0.0.3"));
        assert_eq!(err.client_message(), "an internal error occurred");
        assert_eq!(err.error_type(), "internal_error");
    }

    #[test]
    fn upstream_errors_surface_their_message() {
        let err = GatewayError::Upstream("provider returned 429".to_owned());
        assert!(err.client_message().contains("429"));
    }
}
