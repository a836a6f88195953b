//! Auth collaborator contract.
//!
//! The storefront never verifies credentials itself. An [`AuthProvider`]
//! issues sessions, signs users in and out and pushes [`AuthEvent`]s when the
//! session changes underneath us (sign-in in another tab, token refresh,
//! sign-out elsewhere).

mod error;

pub use error::AuthError;

use async_trait::async_trait;
use tokio::sync::broadcast;

use trendmart_core::Email;

use crate::models::{AuthSession, AuthUser, UserMetadata};

/// Capacity of provider event channels.
pub const AUTH_EVENT_CAPACITY: usize = 32;

/// What happened to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEventKind {
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

/// A session-change notification.
///
/// Consumers treat the payload as a hint only and re-resolve the session from
/// the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEvent {
    pub kind: AuthEventKind,
    /// Whether a session exists after the change.
    pub session_present: bool,
}

impl AuthEvent {
    #[must_use]
    pub const fn new(kind: AuthEventKind, session_present: bool) -> Self {
        Self {
            kind,
            session_present,
        }
    }
}

/// An external authentication provider.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// The current session, if any.
    async fn get_session(&self) -> Result<Option<AuthSession>, AuthError>;

    /// The full user behind the current session, re-read from the provider.
    async fn get_user(&self) -> Result<Option<AuthUser>, AuthError>;

    /// Verify credentials and start a session.
    async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &str,
    ) -> Result<AuthUser, AuthError>;

    /// Create a credential, attaching `metadata` to the new user.
    async fn sign_up(
        &self,
        email: &Email,
        password: &str,
        metadata: UserMetadata,
    ) -> Result<AuthUser, AuthError>;

    /// Invalidate the current session.
    async fn sign_out(&self) -> Result<(), AuthError>;

    /// Subscribe to session-change notifications.
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}
