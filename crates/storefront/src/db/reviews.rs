//! Review repository.

use trendmart_core::ProductId;

use super::{DataStore, Direction, Query, StoreError, collections, from_row, from_rows, to_row};
use crate::models::{NewReview, Review};

/// Repository for `reviews` rows.
pub struct ReviewRepository<'a> {
    store: &'a dyn DataStore,
}

impl<'a> ReviewRepository<'a> {
    /// Create a new review repository.
    #[must_use]
    pub const fn new(store: &'a dyn DataStore) -> Self {
        Self { store }
    }

    /// Reviews for a product, newest first.
    ///
    /// # Errors
    ///
    /// Returns the store error if the query fails or a row is malformed.
    pub async fn for_product(&self, product_id: &ProductId) -> Result<Vec<Review>, StoreError> {
        let query = Query::table(collections::REVIEWS)
            .select(&["id", "product_id", "user_id", "rating", "comment", "created_at"])
            .eq("product_id", product_id.as_str())
            .order("created_at", Direction::Descending);
        from_rows(self.store.select(&query).await?)
    }

    /// Insert a review.
    ///
    /// # Errors
    ///
    /// Returns the store error if the insert fails.
    pub async fn create(&self, review: &NewReview) -> Result<Review, StoreError> {
        let row = self.store.insert(collections::REVIEWS, to_row(review)?).await?;
        from_row(row)
    }
}
