//! Product reviews.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::instrument;

use trendmart_core::ProductId;

use crate::db::reviews::ReviewRepository;
use crate::db::{DataStore, StoreError};
use crate::error::add_breadcrumb;
use crate::models::{NewReview, Review};
use crate::session::SessionController;

/// Lowest accepted star rating.
pub const MIN_RATING: u8 = 1;
/// Highest accepted star rating.
pub const MAX_RATING: u8 = 5;

/// Errors returned by [`ReviewService`].
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("Please sign in to leave a review")]
    NotAuthenticated,

    #[error("Rating must be between 1 and 5")]
    InvalidRating(u8),

    #[error("Please write a comment")]
    EmptyComment,

    #[error("data store error: {0}")]
    Store(#[from] StoreError),
}

/// Lists and submits reviews on behalf of the signed-in user.
#[derive(Clone)]
pub struct ReviewService {
    store: Arc<dyn DataStore>,
    session: Arc<SessionController>,
}

impl ReviewService {
    #[must_use]
    pub fn new(store: Arc<dyn DataStore>, session: Arc<SessionController>) -> Self {
        Self { store, session }
    }

    /// Reviews for a product, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store query fails.
    pub async fn list_reviews(&self, product_id: &ProductId) -> Result<Vec<Review>, ReviewError> {
        Ok(ReviewRepository::new(self.store.as_ref())
            .for_product(product_id)
            .await?)
    }

    /// Post a review and return the product's refreshed review list.
    ///
    /// # Errors
    ///
    /// Returns `ReviewError::NotAuthenticated` when nobody is signed in,
    /// `ReviewError::InvalidRating` outside 1..=5, `ReviewError::EmptyComment`
    /// for a blank comment, or the store error if the insert fails.
    #[instrument(skip(self, comment), fields(product_id = %product_id))]
    pub async fn submit_review(
        &self,
        product_id: &ProductId,
        rating: u8,
        comment: &str,
    ) -> Result<Vec<Review>, ReviewError> {
        let user = self
            .session
            .current_user()
            .ok_or(ReviewError::NotAuthenticated)?;
        if !(MIN_RATING..=MAX_RATING).contains(&rating) {
            return Err(ReviewError::InvalidRating(rating));
        }
        let comment = comment.trim();
        if comment.is_empty() {
            return Err(ReviewError::EmptyComment);
        }

        let review = NewReview {
            product_id: product_id.clone(),
            user_id: user.id,
            rating,
            comment: comment.to_owned(),
            created_at: Utc::now(),
        };
        ReviewRepository::new(self.store.as_ref())
            .create(&review)
            .await?;

        add_breadcrumb(
            "reviews",
            "Submitted review",
            Some(&[("product_id", product_id.as_str())]),
        );
        self.list_reviews(product_id).await
    }
}
