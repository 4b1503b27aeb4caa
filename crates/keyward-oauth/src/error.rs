//! Error types for the authorization flow.

use std::fmt;

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, OAuthError>;

/// Why a flow attempt ended in the `Error` state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The user or the authorization server refused the grant.
    AuthorizationDenied {
        error: String,
        description: Option<String>,
    },
    /// The callback carried neither `code` nor `error`.
    MissingCallbackParameters,
    /// The callback `state` was missing or did not match the request.
    StateMismatch,
    /// The token endpoint answered with an error it explained.
    TokenExchangeRejected { status: u16, error: String },
    /// The token endpoint answered with something unparseable.
    TokenExchangeFailed(String),
    /// The identity endpoint failed for a reason other than authentication.
    IdentityFetchFailed {
        status: Option<u16>,
        message: String,
    },
    /// The identity endpoint rejected the freshly issued token.
    Unauthenticated,
    /// Transport failure talking to the authorization server.
    Network(String),
    /// The session medium refused the credential or identity.
    StorageUnavailable(String),
}

impl FailureReason {
    /// Machine-readable reason.
    pub fn code(&self) -> &str {
        match self {
            Self::AuthorizationDenied { error, .. } => error,
            Self::MissingCallbackParameters => "missing_callback_parameters",
            Self::StateMismatch => "state_mismatch",
            Self::TokenExchangeRejected { error, .. } => error,
            Self::TokenExchangeFailed(_) => "token_exchange_failed",
            Self::IdentityFetchFailed { .. } => "identity_fetch_failed",
            Self::Unauthenticated => "unauthenticated",
            Self::Network(_) => "network_error",
            Self::StorageUnavailable(_) => "storage_unavailable",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AuthorizationDenied {
                error,
                description: Some(description),
            } => write!(f, "authorization denied ({}): {}", error, description),
            Self::AuthorizationDenied { error, .. } => write!(f, "authorization denied ({})", error),
            Self::MissingCallbackParameters => {
                f.write_str("callback carried neither a code nor an error")
            }
            Self::StateMismatch => f.write_str("callback state does not match the request"),
            Self::TokenExchangeRejected { status, error } => {
                write!(f, "token exchange rejected ({}): {}", status, error)
            }
            Self::TokenExchangeFailed(detail) => write!(f, "token exchange failed: {}", detail),
            Self::IdentityFetchFailed {
                status: Some(status),
                message,
            } => write!(f, "identity fetch failed ({}): {}", status, message),
            Self::IdentityFetchFailed { message, .. } => {
                write!(f, "identity fetch failed: {}", message)
            }
            Self::Unauthenticated => f.write_str("issued token was rejected"),
            Self::Network(detail) => write!(f, "network error: {}", detail),
            Self::StorageUnavailable(detail) => write!(f, "session storage unavailable: {}", detail),
        }
    }
}

/// Errors returned by the flow and the callback listener.
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    /// A callback arrived while no attempt was waiting for one.
    #[error("Unexpected callback in state {state}")]
    UnexpectedCallback { state: &'static str },

    /// An operation was invoked in a state that does not allow it.
    #[error("Cannot {action} in state {from}")]
    InvalidTransition {
        from: &'static str,
        action: &'static str,
    },

    /// The attempt moved to the terminal `Error` state.
    #[error("Authorization failed: {0}")]
    Flow(FailureReason),

    /// The callback listener could not deliver a callback.
    #[error("Callback listener error: {0}")]
    Callback(String),

    #[error(transparent)]
    Client(#[from] keyward_client::Error),
}

impl OAuthError {
    /// The failure reason, when the attempt ended in `Error`.
    pub fn reason(&self) -> Option<&FailureReason> {
        match self {
            Self::Flow(reason) => Some(reason),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denial_code_is_server_error() {
        let reason = FailureReason::AuthorizationDenied {
            error: "access_denied".to_string(),
            description: None,
        };
        assert_eq!(reason.code(), "access_denied");
        assert_eq!(
            OAuthError::Flow(reason).reason().map(FailureReason::code),
            Some("access_denied")
        );
    }

    #[test]
    fn test_fixed_codes() {
        assert_eq!(
            FailureReason::MissingCallbackParameters.code(),
            "missing_callback_parameters"
        );
        assert_eq!(FailureReason::StateMismatch.code(), "state_mismatch");
        assert_eq!(
            FailureReason::TokenExchangeFailed("HTTP 502".into()).code(),
            "token_exchange_failed"
        );
    }
}
