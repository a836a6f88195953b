//! Profile rows (`profiles` collection).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use trendmart_core::{Email, UserId};

/// Username used when an account has no email to derive one from.
pub const FALLBACK_USERNAME: &str = "user";

/// A user's public storefront identity.
///
/// `id` equals the auth user's id. `username` is unique across all profiles
/// and compared case-sensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Insert payload for a freshly synthesized profile.
#[derive(Debug, Clone, Serialize)]
pub struct NewProfile {
    pub id: UserId,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

impl NewProfile {
    /// Build the insert payload for `id` with the given username.
    #[must_use]
    pub fn new(id: UserId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            created_at: Utc::now(),
        }
    }
}

/// Default username for an account: the email's local part, or
/// [`FALLBACK_USERNAME`] when no email is known.
#[must_use]
pub fn default_username(email: Option<&Email>) -> String {
    email.map_or_else(|| FALLBACK_USERNAME.to_owned(), |e| e.local_part().to_owned())
}

/// Fields a signed-in user may edit on their profile page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub username: String,
    pub full_name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
}

impl ProfileUpdate {
    /// Apply the update to the profile owned by `id`.
    ///
    /// Blank optional fields are stored as `None`.
    #[must_use]
    pub fn into_profile(self, id: UserId) -> Profile {
        Profile {
            id,
            username: self.username.trim().to_owned(),
            full_name: non_blank(self.full_name),
            address: non_blank(self.address),
            phone: non_blank(self.phone),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_username_from_email() {
        let email = Email::parse("carol.k@shop.test").unwrap();
        assert_eq!(default_username(Some(&email)), "carol.k");
        assert_eq!(default_username(None), FALLBACK_USERNAME);
    }

    #[test]
    fn test_update_trims_and_drops_blank_fields() {
        let update = ProfileUpdate {
            username: "  dave ".to_owned(),
            full_name: Some("Dave D".to_owned()),
            address: Some("   ".to_owned()),
            phone: None,
        };
        let profile = update.into_profile(UserId::new("u1"));
        assert_eq!(profile.username, "dave");
        assert_eq!(profile.full_name.as_deref(), Some("Dave D"));
        assert!(profile.address.is_none());
    }

    #[test]
    fn test_profile_tolerates_missing_optional_columns() {
        let profile: Profile =
            serde_json::from_value(serde_json::json!({ "id": "u1", "username": "eve" }))
                .unwrap();
        assert!(profile.phone.is_none());
    }
}
