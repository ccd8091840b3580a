//! Typed errors for the bouncer API client.

use thiserror::Error;

/// API error taxonomy.
///
/// Each variant maps to one human-readable message shown by the
/// presentation layer, so classification here is user-facing behavior.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Login rejected (401 on the credentials endpoint).
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Access token rejected (401 on an authenticated call).
    #[error("Session expired, please sign in again")]
    TokenExpired,

    /// Refresh-token exchange failed.
    #[error("Could not refresh the session, please sign in again")]
    RefreshFailed,

    /// 429 from any endpoint.
    #[error("Too many requests, try again shortly")]
    RateLimited,

    /// 423 from any endpoint.
    #[error("This account is locked")]
    AccountLocked,

    /// No response received (DNS, connect, or request-level failure).
    #[error("Network unavailable")]
    NetworkUnavailable,

    /// The request timed out.
    #[error("The request timed out")]
    Timeout,

    /// An authenticated operation was attempted with no session.
    #[error("Not signed in")]
    Unauthenticated,

    /// Response body could not be decoded as the expected envelope.
    #[error("Unexpected response from server: {0}")]
    InvalidResponse(String),

    /// Catch-all for any other HTTP failure.
    #[error("Server error ({status}): {message}")]
    ServerError {
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        message: String,
    },
}

/// Result type alias using ApiError.
pub type ApiResult<T> = Result<T, ApiError>;

/// Which endpoint a failing status came from; drives 401 classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Endpoint {
    Login,
    Refresh,
    Authenticated,
}

impl ApiError {
    /// Classify a non-success HTTP status.
    pub(crate) fn from_status(endpoint: Endpoint, status: u16, message: String) -> Self {
        match status {
            401 => match endpoint {
                Endpoint::Login => ApiError::InvalidCredentials,
                Endpoint::Refresh => ApiError::RefreshFailed,
                Endpoint::Authenticated => ApiError::TokenExpired,
            },
            423 => ApiError::AccountLocked,
            429 => ApiError::RateLimited,
            _ => ApiError::ServerError { status, message },
        }
    }

    /// Classify a transport-level failure (no HTTP response received).
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else if err.is_decode() {
            ApiError::InvalidResponse(err.to_string())
        } else {
            ApiError::NetworkUnavailable
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_401_depends_on_endpoint() {
        assert!(matches!(
            ApiError::from_status(Endpoint::Login, 401, String::new()),
            ApiError::InvalidCredentials
        ));
        assert!(matches!(
            ApiError::from_status(Endpoint::Refresh, 401, String::new()),
            ApiError::RefreshFailed
        ));
        assert!(matches!(
            ApiError::from_status(Endpoint::Authenticated, 401, String::new()),
            ApiError::TokenExpired
        ));
    }

    #[test]
    fn status_423_and_429_classify_everywhere() {
        for endpoint in [Endpoint::Login, Endpoint::Refresh, Endpoint::Authenticated] {
            assert!(matches!(
                ApiError::from_status(endpoint, 423, String::new()),
                ApiError::AccountLocked
            ));
            assert!(matches!(
                ApiError::from_status(endpoint, 429, String::new()),
                ApiError::RateLimited
            ));
        }
    }

    #[test]
    fn other_statuses_are_server_errors() {
        let err = ApiError::from_status(Endpoint::Authenticated, 503, "down".to_string());
        match err {
            ApiError::ServerError { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "down");
            }
            other => panic!("expected ServerError, got {other:?}"),
        }
    }
}
