//! Profile repository.

use trendmart_core::UserId;

use super::{DataStore, Query, StoreError, collections, from_row, to_row};
use crate::models::{NewProfile, Profile};

/// Repository for `profiles` rows.
pub struct ProfileRepository<'a> {
    store: &'a dyn DataStore,
}

impl<'a> ProfileRepository<'a> {
    /// Create a new profile repository.
    #[must_use]
    pub const fn new(store: &'a dyn DataStore) -> Self {
        Self { store }
    }

    /// Get the profile for a user.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the user has no profile row.
    pub async fn get_by_id(&self, id: &UserId) -> Result<Profile, StoreError> {
        let row = self
            .store
            .fetch_single(&Query::table(collections::PROFILES).eq("id", id.as_str()))
            .await?;
        from_row(row)
    }

    /// Check whether `username` belongs to any profile other than `excluding`.
    ///
    /// # Errors
    ///
    /// Returns the store error if the lookup fails.
    pub async fn username_taken(
        &self,
        username: &str,
        excluding: Option<&UserId>,
    ) -> Result<bool, StoreError> {
        let mut query = Query::table(collections::PROFILES)
            .select(&["id"])
            .eq("username", username);
        if let Some(id) = excluding {
            query = query.neq("id", id.as_str());
        }

        let rows = self.store.select(&query.limit(1)).await?;
        Ok(!rows.is_empty())
    }

    /// Insert a new profile row.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if a profile with the same id or
    /// username already exists.
    pub async fn create(&self, profile: &NewProfile) -> Result<Profile, StoreError> {
        let row = self
            .store
            .insert(collections::PROFILES, to_row(profile)?)
            .await?;
        from_row(row)
    }

    /// Insert or replace the profile with `profile.id`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if the username is held by another user.
    pub async fn save(&self, profile: &Profile) -> Result<Profile, StoreError> {
        let row = self
            .store
            .upsert(collections::PROFILES, to_row(profile)?)
            .await?;
        from_row(row)
    }
}
