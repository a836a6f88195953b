//! Session controller: who is signed in, and their profile.
//!
//! The controller owns the observable [`SessionState`] and reconciles it with
//! the auth provider. Background paths ([`SessionController::check_user`],
//! [`SessionController::fetch_user_profile`]) log and absorb failures;
//! user-initiated operations return [`SessionError`].
//!
//! # Ordering
//!
//! Every operation that resolves a user takes a request token from a
//! monotonically increasing counter. `check_user` only publishes its result
//! while its token is still the latest issued, so a slow reconciliation can
//! never overwrite the outcome of a newer sign-in or sign-out.

mod listener;

pub use listener::AuthListener;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;
use tokio::sync::{Mutex, watch};
use tracing::instrument;

use trendmart_core::{Email, EmailError, UserId};

use crate::db::profiles::ProfileRepository;
use crate::db::{DataStore, StoreError};
use crate::error::{add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::models::{
    AuthUser, NewProfile, Profile, ProfileUpdate, SessionState, UserMetadata, default_username,
};
use crate::services::auth::{AuthError, AuthProvider};

/// Number of user-id characters appended to a colliding username.
const USERNAME_SUFFIX_LEN: usize = 6;

/// Errors returned by user-initiated session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("Username is already taken. Please choose another one.")]
    UsernameTaken,

    #[error("Username is required")]
    UsernameRequired,

    #[error("You must be signed in")]
    NotAuthenticated,

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("data store error: {0}")]
    Store(#[from] StoreError),
}

impl SessionError {
    /// Whether the failure points at a broken collaborator rather than
    /// something the user can fix.
    #[must_use]
    pub const fn is_unexpected(&self) -> bool {
        match self {
            Self::Store(_) => true,
            Self::Auth(err) => err.is_unexpected(),
            _ => false,
        }
    }
}

/// Owns the session snapshot and every transition of it.
pub struct SessionController {
    auth: Arc<dyn AuthProvider>,
    store: Arc<dyn DataStore>,
    state: watch::Sender<SessionState>,
    latest_request: AtomicU64,
    profile_lock: Mutex<()>,
}

impl SessionController {
    /// Create a controller in the initial (loading) state.
    #[must_use]
    pub fn new(auth: Arc<dyn AuthProvider>, store: Arc<dyn DataStore>) -> Self {
        let (state, _) = watch::channel(SessionState::initial());
        Self {
            auth,
            store,
            state,
            latest_request: AtomicU64::new(0),
            profile_lock: Mutex::new(()),
        }
    }

    /// Re-resolve the session from the auth provider.
    ///
    /// Safe to call any number of times. Provider failures resolve to the
    /// unauthenticated state; nothing is returned to the caller. The
    /// `loading` flag is never raised here, so a re-check of a signed-in
    /// user stays `Authenticated` until its result lands.
    #[instrument(skip(self))]
    pub async fn check_user(&self) {
        let token = self.next_request();
        let resolved = self.resolve_user().await;

        let applied = self.state.send_if_modified(|state| {
            if !self.is_latest(token) {
                return false;
            }
            let next = match &resolved {
                // Keep an already-adopted profile when the same user is re-resolved.
                Some(user) if state.user().is_some_and(|u| u.id == user.id) => {
                    let mut next = SessionState::authenticated(user.clone());
                    if let Some(profile) = state.profile() {
                        next.adopt_profile(profile.clone());
                    }
                    next
                }
                Some(user) => SessionState::authenticated(user.clone()),
                None => SessionState::unauthenticated(),
            };
            if *state == next {
                return false;
            }
            *state = next;
            true
        });

        if !self.is_latest(token) {
            tracing::debug!(token, "Discarding stale session check");
            return;
        }
        if applied {
            tracing::debug!(signed_in = resolved.is_some(), "Session state resolved");
        }

        match resolved {
            Some(user) => {
                set_sentry_user(&user.id, user.email.as_ref().map(Email::as_str));
                self.fetch_user_profile(&user.id).await;
            }
            None => clear_sentry_user(),
        }
    }

    /// Load the profile for `user_id`, creating it on first sight.
    ///
    /// Does nothing unless `user_id` is the signed-in user. Failures are
    /// logged and the profile stays absent.
    #[instrument(skip_all, fields(user_id = %user_id))]
    pub async fn fetch_user_profile(&self, user_id: &UserId) {
        let Some(user) = self.current_user().filter(|u| &u.id == user_id) else {
            tracing::debug!("Skipping profile fetch for a user who is no longer signed in");
            return;
        };

        let username = default_username(user.email.as_ref());
        match self.ensure_profile(&user, &username).await {
            Ok(profile) => self.adopt_profile(profile),
            Err(e) => tracing::warn!(error = %e, "Failed to load user profile"),
        }
    }

    /// Fetch the profile for `user`, creating it with `desired_username` if
    /// it does not exist yet.
    ///
    /// Creation happens at most once per user: calls on one controller are
    /// serialized, and a constraint violation on insert falls back to
    /// re-reading the row another writer created. When the username is held
    /// by a different user the insert is retried once with a suffix taken
    /// from the user id.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::UsernameTaken` if the suffixed username is also
    /// taken, or the store error if a read or insert fails.
    pub async fn ensure_profile(
        &self,
        user: &AuthUser,
        desired_username: &str,
    ) -> Result<Profile, SessionError> {
        let candidates = [
            desired_username.to_owned(),
            suffixed_username(desired_username, &user.id),
        ];
        self.fetch_or_create_profile(user, &candidates).await
    }

    /// Fetch the profile for `user`, or insert it under the first of
    /// `candidates` no other user holds.
    #[instrument(skip_all, fields(user_id = %user.id))]
    async fn fetch_or_create_profile(
        &self,
        user: &AuthUser,
        candidates: &[String],
    ) -> Result<Profile, SessionError> {
        let _guard = self.profile_lock.lock().await;
        let profiles = ProfileRepository::new(self.store.as_ref());

        match profiles.get_by_id(&user.id).await {
            Ok(profile) => return Ok(profile),
            Err(StoreError::NotFound) => {}
            Err(e) => return Err(e.into()),
        }

        for username in candidates {
            match profiles
                .create(&NewProfile::new(user.id.clone(), username.as_str()))
                .await
            {
                Ok(profile) => {
                    tracing::info!(username = %profile.username, "Created profile");
                    return Ok(profile);
                }
                Err(StoreError::Conflict(detail)) => match profiles.get_by_id(&user.id).await {
                    Ok(profile) => return Ok(profile),
                    Err(StoreError::NotFound) => {
                        tracing::debug!(%username, %detail, "Username collision");
                    }
                    Err(e) => return Err(e.into()),
                },
                Err(e) => return Err(e.into()),
            }
        }

        Err(SessionError::UsernameTaken)
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidEmail` for a malformed address, or the
    /// provider's error (for example invalid credentials) verbatim.
    #[instrument(skip(self, email, password))]
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, SessionError> {
        let email = Email::parse(email)?;
        self.next_request();
        self.set_loading(true);

        let user = match self.auth.sign_in_with_password(&email, password).await {
            Ok(user) => user,
            Err(e) => {
                self.set_loading(false);
                tracing::debug!(error = %e, "Sign in rejected");
                return Err(e.into());
            }
        };

        self.become_authenticated(&user, "Signed in");
        self.fetch_user_profile(&user.id).await;
        Ok(user)
    }

    /// Create an account and its profile.
    ///
    /// The username is checked before the auth provider is contacted, and the
    /// profile is only ever created under that exact username. If the profile
    /// cannot be written after the credential exists, the user stays signed
    /// in; the next [`check_user`] creates the profile lazily.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::UsernameTaken` when another profile holds the
    /// username, including one claimed between the check and the profile
    /// insert (the account then exists without a profile).
    /// `SessionError::UsernameRequired` is returned for a blank username, and
    /// provider errors verbatim. Other profile write failures are logged only.
    ///
    /// [`check_user`]: Self::check_user
    #[instrument(skip(self, email, password))]
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        username: &str,
    ) -> Result<AuthUser, SessionError> {
        let email = Email::parse(email)?;
        let username = username.trim();
        if username.is_empty() {
            return Err(SessionError::UsernameRequired);
        }

        let profiles = ProfileRepository::new(self.store.as_ref());
        if profiles.username_taken(username, None).await? {
            return Err(SessionError::UsernameTaken);
        }

        self.next_request();
        self.set_loading(true);

        let metadata = UserMetadata {
            username: Some(username.to_owned()),
        };
        let user = match self.auth.sign_up(&email, password, metadata).await {
            Ok(user) => user,
            Err(e) => {
                self.set_loading(false);
                return Err(e.into());
            }
        };

        self.become_authenticated(&user, "Signed up");
        match self
            .fetch_or_create_profile(&user, &[username.to_owned()])
            .await
        {
            Ok(profile) => self.adopt_profile(profile),
            Err(SessionError::UsernameTaken) => {
                tracing::warn!(
                    user_id = %user.id,
                    %username,
                    "Username claimed during sign up; account has no profile"
                );
                return Err(SessionError::UsernameTaken);
            }
            Err(e) => tracing::error!(
                error = %e,
                user_id = %user.id,
                "Account created but profile could not be saved"
            ),
        }
        Ok(user)
    }

    /// Sign out locally and at the provider.
    ///
    /// Local state is cleared even when the provider call fails.
    ///
    /// # Errors
    ///
    /// Returns the provider's error for information only.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) -> Result<(), SessionError> {
        self.next_request();
        let remote = self.auth.sign_out().await;

        self.state.send_replace(SessionState::unauthenticated());
        clear_sentry_user();
        add_breadcrumb("auth", "Signed out", None);

        remote.map_err(|e| {
            tracing::warn!(error = %e, "Remote sign out failed; cleared local session anyway");
            e.into()
        })
    }

    /// Save edits to the signed-in user's profile.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotAuthenticated` when nobody is signed in,
    /// `SessionError::UsernameRequired` for a blank username,
    /// `SessionError::UsernameTaken` when another user holds the new username,
    /// or the store error if the write fails.
    #[instrument(skip(self, update))]
    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<Profile, SessionError> {
        let snapshot = self.snapshot();
        let user = snapshot.user().ok_or(SessionError::NotAuthenticated)?;
        let profile = update.into_profile(user.id.clone());
        if profile.username.is_empty() {
            return Err(SessionError::UsernameRequired);
        }

        let profiles = ProfileRepository::new(self.store.as_ref());
        let renamed = snapshot
            .profile()
            .is_none_or(|current| current.username != profile.username);
        if renamed && profiles.username_taken(&profile.username, Some(&user.id)).await? {
            return Err(SessionError::UsernameTaken);
        }

        let saved = profiles.save(&profile).await.map_err(|e| match e {
            StoreError::Conflict(_) => SessionError::UsernameTaken,
            other => other.into(),
        })?;

        self.adopt_profile(saved.clone());
        add_breadcrumb("profile", "Updated profile", None);
        Ok(saved)
    }

    /// Current session snapshot.
    #[must_use]
    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Subscribe to session changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// The signed-in user, if any.
    #[must_use]
    pub fn current_user(&self) -> Option<AuthUser> {
        self.state.borrow().user().cloned()
    }

    fn next_request(&self) -> u64 {
        self.latest_request.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_latest(&self, token: u64) -> bool {
        self.latest_request.load(Ordering::SeqCst) == token
    }

    async fn resolve_user(&self) -> Option<AuthUser> {
        match self.auth.get_session().await {
            Ok(Some(_)) => {}
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read auth session");
                return None;
            }
        }

        match self.auth.get_user().await {
            Ok(user) => user,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to resolve session user");
                None
            }
        }
    }

    fn set_loading(&self, loading: bool) {
        self.state.send_if_modified(|state| {
            if state.loading() == loading {
                false
            } else {
                *state = state.clone().with_loading(loading);
                true
            }
        });
    }

    fn become_authenticated(&self, user: &AuthUser, action: &str) {
        self.state.send_replace(SessionState::authenticated(user.clone()));
        set_sentry_user(&user.id, user.email.as_ref().map(Email::as_str));
        add_breadcrumb("auth", action, Some(&[("user_id", user.id.as_str())]));
        tracing::info!(user_id = %user.id, "{action}");
    }

    fn adopt_profile(&self, profile: Profile) {
        let adopted = self.state.send_if_modified(|state| {
            if state.profile() == Some(&profile) {
                return false;
            }
            state.adopt_profile(profile)
        });
        if !adopted {
            tracing::debug!("Profile not adopted");
        }
    }
}

/// `desired` plus a short suffix from the user id, for username collisions.
fn suffixed_username(desired: &str, id: &UserId) -> String {
    let suffix: String = id
        .as_str()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(USERNAME_SUFFIX_LEN)
        .collect();
    format!("{desired}_{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffixed_username_uses_id_prefix() {
        let id = UserId::new("8d0c-7a1e-0000");
        assert_eq!(suffixed_username("alice", &id), "alice_8d0c7a");
    }

    #[test]
    fn test_expected_errors() {
        assert!(!SessionError::UsernameTaken.is_unexpected());
        assert!(!SessionError::from(AuthError::InvalidCredentials).is_unexpected());
        assert!(SessionError::from(StoreError::NotFound).is_unexpected());
    }

    #[test]
    fn test_auth_error_message_passes_through() {
        let err = SessionError::from(AuthError::Provider {
            status: 422,
            message: "Password should be at least 6 characters.".to_string(),
        });
        assert_eq!(err.to_string(), "Password should be at least 6 characters.");
    }
}
