//! Auth provider identity types.
//!
//! These are the provider's view of a signed-in person. They are distinct
//! from [`Profile`](super::Profile), which is the storefront's own public
//! record for the same id.

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};

use trendmart_core::{Email, UserId};

/// A user as reported by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    /// Provider-issued user ID (also the profile's primary key).
    pub id: UserId,
    /// Email address, absent for phone-only or anonymous accounts.
    #[serde(default, deserialize_with = "lenient_email")]
    pub email: Option<Email>,
    /// Free-form metadata captured at sign-up.
    #[serde(default)]
    pub user_metadata: UserMetadata,
    /// When the account was created.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl AuthUser {
    /// Create a user with just an id and email.
    #[must_use]
    pub fn new(id: UserId, email: Option<Email>) -> Self {
        Self {
            id,
            email,
            user_metadata: UserMetadata::default(),
            created_at: Some(Utc::now()),
        }
    }
}

/// Metadata attached to the credential at sign-up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMetadata {
    /// Username chosen on the sign-up form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// An active session issued by the auth provider.
///
/// Tokens are wrapped in [`SecretString`] so they never end up in logs.
#[derive(Debug, Clone)]
pub struct AuthSession {
    /// Bearer token for data API requests.
    pub access_token: SecretString,
    /// Token used to obtain a fresh access token.
    pub refresh_token: SecretString,
    /// When the access token stops being accepted.
    pub expires_at: DateTime<Utc>,
    /// The user this session belongs to.
    pub user: AuthUser,
}

impl AuthSession {
    /// Whether the access token has expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Accept missing, empty or malformed emails as `None` instead of failing the
/// whole user payload.
fn lenient_email<'de, D>(deserializer: D) -> Result<Option<Email>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| Email::parse(&s).ok()))
}
