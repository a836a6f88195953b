//! In-process auth provider.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use secrecy::SecretString;
use tokio::sync::broadcast;

use trendmart_core::{Email, UserId};

use crate::models::{AuthSession, AuthUser, UserMetadata};
use crate::services::auth::{
    AUTH_EVENT_CAPACITY, AuthError, AuthEvent, AuthEventKind, AuthProvider,
};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 6;

/// Lifetime of an issued access token, in seconds.
const SESSION_TTL_SECS: i64 = 3600;

struct Account {
    user: AuthUser,
    password_hash: String,
}

/// An [`AuthProvider`] holding accounts and the current session in memory.
///
/// Sign-up confirms the account and signs the user in immediately. Passwords
/// are hashed with Argon2id.
pub struct MemoryAuth {
    accounts: Mutex<HashMap<Email, Account>>,
    session: Mutex<Option<AuthSession>>,
    events: broadcast::Sender<AuthEvent>,
    hasher: Argon2<'static>,
}

impl Default for MemoryAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAuth {
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(AUTH_EVENT_CAPACITY);
        Self {
            accounts: Mutex::new(HashMap::new()),
            session: Mutex::new(None),
            events,
            hasher: hasher(),
        }
    }

    /// End the current session as if the user signed out in another tab.
    ///
    /// Subscribers receive a `SignedOut` event.
    pub fn revoke_session(&self) {
        let had_session = self.session().take().is_some();
        if had_session {
            self.emit(AuthEventKind::SignedOut, false);
        }
    }

    /// Force the current access token to expire, so the next
    /// [`get_session`](AuthProvider::get_session) refreshes it.
    pub fn expire_session(&self) {
        if let Some(session) = self.session().as_mut() {
            session.expires_at = Utc::now() - Duration::seconds(1);
        }
    }

    /// Number of registered accounts.
    #[must_use]
    pub fn account_count(&self) -> usize {
        self.accounts().len()
    }

    fn accounts(&self) -> MutexGuard<'_, HashMap<Email, Account>> {
        self.accounts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn session(&self) -> MutexGuard<'_, Option<AuthSession>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, kind: AuthEventKind, session_present: bool) {
        // No receivers is fine.
        let _ = self.events.send(AuthEvent::new(kind, session_present));
    }

    fn start_session(&self, user: AuthUser) {
        *self.session() = Some(issue_session(user));
        self.emit(AuthEventKind::SignedIn, true);
    }

    fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);

        self.hasher
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|_| AuthError::PasswordHash)
    }

    fn verify_password(&self, password: &str, hash: &str) -> Result<(), AuthError> {
        let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;

        self.hasher
            .verify_password(password.as_bytes(), &parsed_hash)
            .map_err(|_| AuthError::InvalidCredentials)
    }
}

#[async_trait]
impl AuthProvider for MemoryAuth {
    async fn get_session(&self) -> Result<Option<AuthSession>, AuthError> {
        let refreshed = {
            let mut session = self.session();
            match session.as_mut() {
                None => return Ok(None),
                Some(current) if current.is_expired_at(Utc::now()) => {
                    *current = issue_session(current.user.clone());
                    true
                }
                Some(_) => false,
            }
        };
        if refreshed {
            self.emit(AuthEventKind::TokenRefreshed, true);
        }
        Ok(self.session().clone())
    }

    async fn get_user(&self) -> Result<Option<AuthUser>, AuthError> {
        let Some(session) = self.session().clone() else {
            return Ok(None);
        };
        let user = session
            .user
            .email
            .as_ref()
            .and_then(|email| self.accounts().get(email).map(|a| a.user.clone()));
        Ok(user)
    }

    async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &str,
    ) -> Result<AuthUser, AuthError> {
        let (user, hash) = {
            let accounts = self.accounts();
            let account = accounts.get(email).ok_or(AuthError::InvalidCredentials)?;
            (account.user.clone(), account.password_hash.clone())
        };
        self.verify_password(password, &hash)?;

        self.start_session(user.clone());
        Ok(user)
    }

    async fn sign_up(
        &self,
        email: &Email,
        password: &str,
        metadata: UserMetadata,
    ) -> Result<AuthUser, AuthError> {
        validate_password(password)?;
        if self.accounts().contains_key(email) {
            return Err(AuthError::UserAlreadyExists);
        }

        let password_hash = self.hash_password(password)?;
        let user = AuthUser {
            user_metadata: metadata,
            ..AuthUser::new(UserId::generate(), Some(email.clone()))
        };

        {
            let mut accounts = self.accounts();
            if accounts.contains_key(email) {
                return Err(AuthError::UserAlreadyExists);
            }
            accounts.insert(
                email.clone(),
                Account {
                    user: user.clone(),
                    password_hash,
                },
            );
        }

        self.start_session(user.clone());
        Ok(user)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.revoke_session();
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

fn hasher() -> Argon2<'static> {
    // 8 MiB, one pass.
    let params = Params::new(8 * 1024, 1, 1, None).unwrap_or_default();
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
}

fn issue_session(user: AuthUser) -> AuthSession {
    AuthSession {
        access_token: SecretString::from(uuid::Uuid::new_v4().simple().to_string()),
        refresh_token: SecretString::from(uuid::Uuid::new_v4().simple().to_string()),
        expires_at: Utc::now() + Duration::seconds(SESSION_TTL_SECS),
        user,
    }
}

fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password should be at least {MIN_PASSWORD_LENGTH} characters."
        )));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    fn email(s: &str) -> Email {
        Email::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_sign_up_then_sign_in() {
        let auth = MemoryAuth::new();
        let metadata = UserMetadata {
            username: Some("alice".to_owned()),
        };
        let created = auth
            .sign_up(&email("alice@x.com"), "secret1", metadata)
            .await
            .unwrap();
        assert_eq!(created.user_metadata.username.as_deref(), Some("alice"));
        assert!(auth.get_session().await.unwrap().is_some());

        auth.sign_out().await.unwrap();
        assert!(auth.get_session().await.unwrap().is_none());
        assert!(auth.get_user().await.unwrap().is_none());

        let user = auth
            .sign_in_with_password(&email("alice@x.com"), "secret1")
            .await
            .unwrap();
        assert_eq!(user.id, created.id);
        assert_eq!(auth.get_user().await.unwrap().unwrap().id, created.id);
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_email() {
        let auth = MemoryAuth::new();
        auth.sign_up(&email("bob@x.com"), "hunter22", UserMetadata::default())
            .await
            .unwrap();

        let wrong = auth
            .sign_in_with_password(&email("bob@x.com"), "hunter23")
            .await;
        assert!(matches!(wrong, Err(AuthError::InvalidCredentials)));

        let unknown = auth
            .sign_in_with_password(&email("nobody@x.com"), "hunter22")
            .await;
        assert!(matches!(unknown, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_sign_up_rejects_short_password_and_duplicates() {
        let auth = MemoryAuth::new();
        let short = auth
            .sign_up(&email("c@x.com"), "12345", UserMetadata::default())
            .await;
        assert_eq!(
            short.unwrap_err().to_string(),
            "Password should be at least 6 characters."
        );

        auth.sign_up(&email("c@x.com"), "123456", UserMetadata::default())
            .await
            .unwrap();
        let dup = auth
            .sign_up(&email("c@x.com"), "123456", UserMetadata::default())
            .await;
        assert!(matches!(dup, Err(AuthError::UserAlreadyExists)));
        assert_eq!(auth.account_count(), 1);
    }

    #[tokio::test]
    async fn test_events_and_refresh() {
        let auth = MemoryAuth::new();
        let mut events = auth.subscribe();

        auth.sign_up(&email("d@x.com"), "123456", UserMetadata::default())
            .await
            .unwrap();
        assert_eq!(events.recv().await.unwrap().kind, AuthEventKind::SignedIn);

        let before = auth.get_session().await.unwrap().unwrap();
        auth.expire_session();
        let after = auth.get_session().await.unwrap().unwrap();
        assert_ne!(
            before.access_token.expose_secret(),
            after.access_token.expose_secret()
        );
        assert_eq!(
            events.recv().await.unwrap().kind,
            AuthEventKind::TokenRefreshed
        );

        auth.revoke_session();
        let event = events.recv().await.unwrap();
        assert_eq!(event, AuthEvent::new(AuthEventKind::SignedOut, false));
    }
}
