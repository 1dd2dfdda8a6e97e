use hyper::StatusCode;
use serde::Serialize;

use crate::services::UpstreamError;

/// Every way a request can fail, before or after the upstream call.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("api credential missing or mismatched")]
    CredentialRejected,
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("request body over the size limit")]
    PayloadTooLarge,
    #[error("upstream session rejected")]
    AuthenticationExpired,
    #[error("resource not found upstream")]
    NotFound,
    #[error("upstream rate limit reached")]
    RateLimited,
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("upstream timed out")]
    UpstreamTimeout,
    #[error("unknown upstream error: {0}")]
    UnknownUpstream(String),
}

impl GatewayError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::CredentialRejected => StatusCode::UNAUTHORIZED,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::AuthenticationExpired => StatusCode::UNAUTHORIZED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            Self::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            Self::UnknownUpstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text placed in the response envelope. Validation messages are written
    /// for the caller; upstream details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            Self::CredentialRejected => "Not authenticated".to_string(),
            Self::Validation(message) => message.clone(),
            Self::PayloadTooLarge => "Request body too large".to_string(),
            Self::AuthenticationExpired => {
                "Not logged in, or the session cookie has expired".to_string()
            }
            Self::NotFound => "Not found".to_string(),
            Self::RateLimited => {
                "Too many requests to the content site, try again later".to_string()
            }
            Self::UpstreamUnavailable(_) => "Content site unavailable".to_string(),
            Self::UpstreamTimeout => "Content site did not respond in time".to_string(),
            Self::UnknownUpstream(_) => "Internal server error".to_string(),
        }
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope::new(self.public_message())
    }
}

impl From<UpstreamError> for GatewayError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::AuthenticationExpired => Self::AuthenticationExpired,
            UpstreamError::NotFound => Self::NotFound,
            UpstreamError::RateLimited => Self::RateLimited,
            UpstreamError::Unavailable(detail) => Self::UpstreamUnavailable(detail),
            UpstreamError::Timeout => Self::UpstreamTimeout,
            other @ (UpstreamError::Parse(_)
            | UpstreamError::Status(_)
            | UpstreamError::Other(_)) => Self::UnknownUpstream(other.to_string()),
        }
    }
}

impl warp::reject::Reject for GatewayError {}

/// The one error shape callers ever see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorEnvelope {
    pub error: bool,
    pub message: String,
}

impl ErrorEnvelope {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: true,
            message: message.into(),
        }
    }
}
