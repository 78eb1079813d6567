use thiserror::Error;

use crate::data::topics::AbiConfigError;

/// Failures surfaced by the explorer client, the RPC layer and input validation.
///
/// Individual logs that fail to decode and individual getters that fail to read
/// are not represented here: they are dropped by the caller (see
/// `decoder::DecodeSkip` and `aggregate::collect_successes`).
#[derive(Debug, Error)]
pub enum AppError {
    /// HTTP-level failure: connection error, timeout, non-2xx status or an
    /// unreadable body.
    #[error("transport error: {0}")]
    Transport(String),

    /// The explorer answered with a semantic failure.
    #[error("explorer error: {message}{}", detail.as_ref().map(|d| format!(" ({d})")).unwrap_or_default())]
    Api {
        message: String,
        detail: Option<String>,
    },

    /// Input rejected before any network call was made.
    #[error("invalid input: {0}")]
    Validation(String),

    /// The RPC node rejected or failed a request.
    #[error("rpc error: {0}")]
    Rpc(String),

    /// A well-formed HTTP response whose JSON did not match any known shape.
    #[error("unexpected response: {0}")]
    MalformedResponse(String),

    #[error("request cancelled")]
    Cancelled,
}

impl AppError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Transport(_))
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }
}

impl From<AbiConfigError> for AppError {
    fn from(e: AbiConfigError) -> Self {
        AppError::Validation(format!("bad event ABI: {e}"))
    }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display_with_detail() {
        let err = AppError::Api {
            message: "NOTOK".to_string(),
            detail: Some("Invalid API Key".to_string()),
        };
        assert_eq!(err.to_string(), "explorer error: NOTOK (Invalid API Key)");
    }

    #[test]
    fn test_api_error_display_without_detail() {
        let err = AppError::Api {
            message: "Max rate limit reached".to_string(),
            detail: None,
        };
        assert_eq!(err.to_string(), "explorer error: Max rate limit reached");
    }

    #[test]
    fn test_only_transport_errors_retry() {
        assert!(AppError::Transport("timeout".into()).is_retryable());
        assert!(!AppError::validation("bad address").is_retryable());
        assert!(!AppError::Cancelled.is_retryable());
        assert!(
            !AppError::Api {
                message: "NOTOK".into(),
                detail: None
            }
            .is_retryable()
        );
    }
}
