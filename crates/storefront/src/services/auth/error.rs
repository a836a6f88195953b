//! Authentication error types.

use thiserror::Error;

/// Errors reported by an [`AuthProvider`](super::AuthProvider).
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] trendmart_core::EmailError),

    /// Invalid credentials (wrong password or unknown email).
    #[error("Invalid login credentials")]
    InvalidCredentials,

    /// An account with this email already exists.
    #[error("User already registered")]
    UserAlreadyExists,

    /// Password rejected by the provider's policy.
    #[error("{0}")]
    WeakPassword(String),

    /// No active session to act on.
    #[error("Auth session missing")]
    NoSession,

    /// Any other message from the provider, passed through verbatim.
    #[error("{message}")]
    Provider { status: u16, message: String },

    /// Transport failure talking to the auth API.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// A request URL could not be built from the configured base URL.
    #[error("invalid auth api url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The auth API answered with something we could not parse.
    #[error("unexpected auth response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}

impl AuthError {
    /// Whether this is a transport or decoding failure rather than the
    /// provider rejecting the request.
    #[must_use]
    pub const fn is_unexpected(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::Decode(_) | Self::InvalidUrl(_) | Self::PasswordHash
        )
    }
}
