//! Authentication error types.

use thiserror::Error;

/// Authentication error type.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Token does not have the three-segment JWT shape or an unreadable payload
    #[error("Malformed token")]
    MalformedToken,

    /// Token is well-formed but past its `exp`
    #[error("Token expired")]
    ExpiredToken,

    /// The backend did not confirm who the token belongs to
    #[error("Identity probe failed: {0}")]
    IdentityProbeFailed(String),

    /// Remote revoke failed (logged and ignored during logout)
    #[error("Revocation failed: {0}")]
    RevocationFailed(String),

    /// Backend answered with an unexpected status
    #[error("Request failed: HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Invalid state transition in the session FSM
    #[error("Invalid session state transition: {0}")]
    InvalidStateTransition(String),

    /// A call that needs a token was made without one
    #[error("Not logged in")]
    NotLoggedIn,

    /// Nickname is empty after trimming
    #[error("Nickname must not be empty")]
    InvalidNickname,

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] crown_storage::StorageError),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parse error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Timeout error
    #[error("Operation timed out")]
    Timeout,

    /// A collaborator panicked while serving the call
    #[error("{0} panicked")]
    Panicked(&'static str),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AuthError {
    /// Returns true if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            AuthError::Timeout => true,
            AuthError::Status { status, .. } => *status >= 500,
            AuthError::Http(e) => {
                if e.is_connect() || e.is_timeout() {
                    return true;
                }
                if let Some(status) = e.status() {
                    return status.is_server_error();
                }
                false
            }
            _ => false,
        }
    }

    /// Whether the backend rejected the token itself.
    pub fn is_unauthorized(&self) -> bool {
        match self {
            AuthError::Status { status, .. } => *status == 401,
            AuthError::Http(e) => e.status().is_some_and(|s| s.as_u16() == 401),
            _ => false,
        }
    }
}

impl From<crown_storage::TokenError> for AuthError {
    fn from(e: crown_storage::TokenError) -> Self {
        match e {
            crown_storage::TokenError::Malformed(_) => AuthError::MalformedToken,
            crown_storage::TokenError::Expired => AuthError::ExpiredToken,
        }
    }
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crown_storage::TokenError;

    #[test]
    fn test_is_transient_timeout() {
        assert!(AuthError::Timeout.is_transient());
    }

    #[test]
    fn test_is_transient_server_error_status() {
        let err = AuthError::Status {
            status: 503,
            body: String::new(),
        };
        assert!(err.is_transient());
        assert!(!err.is_unauthorized());
    }

    #[test]
    fn test_unauthorized_status() {
        let err = AuthError::Status {
            status: 401,
            body: "expired".into(),
        };
        assert!(err.is_unauthorized());
        assert!(!err.is_transient());
    }

    #[test]
    fn test_is_not_transient_token_errors() {
        assert!(!AuthError::MalformedToken.is_transient());
        assert!(!AuthError::ExpiredToken.is_transient());
        assert!(!AuthError::IdentityProbeFailed("empty nickname".into()).is_transient());
        assert!(!AuthError::Panicked("identity probe").is_transient());
    }

    #[test]
    fn test_from_token_error() {
        assert!(matches!(
            AuthError::from(TokenError::Malformed("empty segment")),
            AuthError::MalformedToken
        ));
        assert!(matches!(
            AuthError::from(TokenError::Expired),
            AuthError::ExpiredToken
        ));
    }
}
