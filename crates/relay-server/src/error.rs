use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use relay_providers::ConfigIssue;
use relay_wire::{ConfigFlags, ErrorPayload};

/// Failures before the first SSE byte is written. All of them become a 500
/// with an [`ErrorPayload`] body.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Config(#[from] ConfigIssue),
    #[error("malformed request body: {0}")]
    MalformedRequest(String),
    #[error("{0}")]
    Upstream(String),
    #[error("Unknown error")]
    Unknown,
}

/// Failures after streaming started. The body is aborted instead of closed,
/// so clients see a stream without the `[DONE]` frame.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("agent stream failed: {0}")]
    Upstream(String),
    #[error("request exceeded the maximum duration of {0:?}")]
    DeadlineExceeded(Duration),
}

impl RelayError {
    pub fn upstream(err: anyhow::Error) -> Self {
        let message = format!("{err:#}");
        if message.trim().is_empty() {
            return Self::Unknown;
        }
        Self::Upstream(message)
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config(ConfigIssue::MissingAgentId) => "MISSING_AGENT_ID",
            Self::Config(ConfigIssue::MissingCredentials) => "MISSING_CREDENTIALS",
            Self::MalformedRequest(_) => "MALFORMED_REQUEST",
            Self::Upstream(_) => "UPSTREAM_INVOCATION_FAILED",
            Self::Unknown => "UNKNOWN",
        }
    }

    pub fn into_response_with(self, config: ConfigFlags) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorPayload::new(self.to_string(), config)),
        )
            .into_response()
    }
}

impl StreamError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Upstream(_) => "STREAM_FAILED",
            Self::DeadlineExceeded(_) => "STREAM_DEADLINE_EXCEEDED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_keep_their_messages() {
        let err = RelayError::from(ConfigIssue::MissingCredentials);
        assert_eq!(err.to_string(), "AWS credentials are required");
        assert_eq!(err.error_code(), "MISSING_CREDENTIALS");
    }

    #[test]
    fn upstream_error_with_empty_message_is_unknown() {
        let err = RelayError::upstream(anyhow::anyhow!(""));
        assert!(matches!(err, RelayError::Unknown));
        assert_eq!(err.to_string(), "Unknown error");
    }

    #[test]
    fn upstream_error_keeps_context_chain() {
        let err = RelayError::upstream(
            anyhow::anyhow!("AccessDeniedException").context("invoke agent failed"),
        );
        let message = err.to_string();
        assert!(message.contains("invoke agent failed"));
        assert!(message.contains("AccessDeniedException"));
    }
}
