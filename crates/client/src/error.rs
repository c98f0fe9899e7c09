//! Client error types

use thiserror::Error;

/// Client error types
#[derive(Debug, Error)]
pub enum ClientError {
    /// No response was received at all, as opposed to an error status
    #[error("no response from server: {0}")]
    NetworkUnavailable(String),

    /// The session could not be recovered and has been cleared
    #[error("session expired")]
    SessionExpired,

    /// The refresh endpoint rejected the current credential
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    /// Unauthorized response on an endpoint that handles its own 401s
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Forbidden
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Resource not found
    #[error("resource not found: {0}")]
    NotFound(String),

    /// Any other error status, passed through unmodified
    #[error("server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// Response body could not be deserialized
    #[error("invalid response body: {0}")]
    Decode(String),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Configuration(String),
}

impl ClientError {
    /// Create error from HTTP status code
    pub fn from_status(status: reqwest::StatusCode, message: String) -> Self {
        match status.as_u16() {
            400 => Self::BadRequest(message),
            401 => Self::Unauthorized(message),
            403 => Self::Forbidden(message),
            404 => Self::NotFound(message),
            _ => Self::ServerError {
                status: status.as_u16(),
                message,
            },
        }
    }

    /// Whether this error ended the session (the caller has been logged
    /// out and the expiry hook has fired).
    pub fn is_session_terminal(&self) -> bool {
        matches!(self, Self::SessionExpired | Self::RefreshFailed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        let err = ClientError::from_status(reqwest::StatusCode::BAD_REQUEST, "nope".into());
        assert!(matches!(err, ClientError::BadRequest(_)));

        let err = ClientError::from_status(reqwest::StatusCode::UNAUTHORIZED, "nope".into());
        assert!(matches!(err, ClientError::Unauthorized(_)));

        let err = ClientError::from_status(reqwest::StatusCode::BAD_GATEWAY, "down".into());
        assert!(matches!(
            err,
            ClientError::ServerError { status: 502, .. }
        ));
    }

    #[test]
    fn terminal_errors() {
        assert!(ClientError::SessionExpired.is_session_terminal());
        assert!(ClientError::RefreshFailed("revoked".into()).is_session_terminal());
        assert!(!ClientError::NetworkUnavailable("offline".into()).is_session_terminal());
        assert!(!ClientError::Unauthorized("nope".into()).is_session_terminal());
    }
}
