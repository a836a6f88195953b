//! Observable session snapshot.
//!
//! Subscribers of the session controller receive this type. Its fields are
//! private so the "no profile without a user" rule cannot be broken from
//! outside; the controller builds it through the constructors below.

use super::{AuthUser, Profile};

/// Where the session currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No user is signed in.
    Unauthenticated,
    /// A bootstrap or credential operation is in flight.
    Authenticating,
    /// A user is signed in; the profile may still be loading.
    Authenticated,
}

/// Current identity, profile and loading flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    user: Option<AuthUser>,
    profile: Option<Profile>,
    loading: bool,
}

impl SessionState {
    /// State at process start, before the first bootstrap resolves.
    #[must_use]
    pub const fn initial() -> Self {
        Self {
            user: None,
            profile: None,
            loading: true,
        }
    }

    /// Resolved state with nobody signed in.
    #[must_use]
    pub const fn unauthenticated() -> Self {
        Self {
            user: None,
            profile: None,
            loading: false,
        }
    }

    /// Resolved state for `user`, profile not yet known.
    #[must_use]
    pub const fn authenticated(user: AuthUser) -> Self {
        Self {
            user: Some(user),
            profile: None,
            loading: false,
        }
    }

    /// Same state with the loading flag set or cleared.
    #[must_use]
    pub fn with_loading(mut self, loading: bool) -> Self {
        self.loading = loading;
        self
    }

    /// Attach `profile` if it belongs to the signed-in user.
    ///
    /// Returns `false` and leaves the state untouched when nobody is signed in
    /// or the profile is for someone else.
    pub fn adopt_profile(&mut self, profile: Profile) -> bool {
        match &self.user {
            Some(user) if user.id == profile.id => {
                self.profile = Some(profile);
                true
            }
            _ => false,
        }
    }

    #[must_use]
    pub const fn user(&self) -> Option<&AuthUser> {
        self.user.as_ref()
    }

    #[must_use]
    pub const fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    #[must_use]
    pub const fn loading(&self) -> bool {
        self.loading
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// The state machine phase this snapshot corresponds to.
    #[must_use]
    pub const fn phase(&self) -> SessionPhase {
        if self.loading {
            SessionPhase::Authenticating
        } else if self.user.is_some() {
            SessionPhase::Authenticated
        } else {
            SessionPhase::Unauthenticated
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::initial()
    }
}

#[cfg(test)]
mod tests {
    use trendmart_core::UserId;

    use super::*;

    fn profile(id: &str) -> Profile {
        Profile {
            id: UserId::new(id),
            username: id.to_owned(),
            full_name: None,
            address: None,
            phone: None,
        }
    }

    #[test]
    fn test_initial_is_loading() {
        let state = SessionState::initial();
        assert!(state.loading());
        assert_eq!(state.phase(), SessionPhase::Authenticating);
    }

    #[test]
    fn test_profile_requires_matching_user() {
        let mut anon = SessionState::unauthenticated();
        assert!(!anon.adopt_profile(profile("u1")));
        assert!(anon.profile().is_none());

        let mut signed_in = SessionState::authenticated(AuthUser::new(UserId::new("u1"), None));
        assert!(!signed_in.adopt_profile(profile("u2")));
        assert!(signed_in.adopt_profile(profile("u1")));
        assert_eq!(signed_in.phase(), SessionPhase::Authenticated);
    }
}
