//! Data collaborator: the hosted record store and typed repositories over it.
//!
//! # Collections
//!
//! - `profiles` - Public user identity (username, contact details)
//! - `products` - Catalog entries
//! - `product_images` - Gallery images per product
//! - `reviews` - Product reviews
//! - `orders` - Order headers created at checkout
//! - `order_items` - One row per product line of an order
//!
//! # Backends
//!
//! [`DataStore`] is implemented by the HTTP backend
//! ([`crate::backend::rest::RestStore`]) and the in-process backend
//! ([`crate::backend::memory::MemoryStore`]). Repositories only ever see the
//! trait object.

pub mod orders;
pub mod products;
pub mod profiles;
pub mod query;
pub mod reviews;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

pub use query::{Direction, Filter, Query};

/// Collection names used by the storefront.
pub mod collections {
    pub const PROFILES: &str = "profiles";
    pub const PRODUCTS: &str = "products";
    pub const PRODUCT_IMAGES: &str = "product_images";
    pub const REVIEWS: &str = "reviews";
    pub const ORDERS: &str = "orders";
    pub const ORDER_ITEMS: &str = "order_items";
}

/// Errors returned by a [`DataStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// A single-row fetch matched no rows.
    #[error("not found")]
    NotFound,

    /// Unique or primary key constraint violation.
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// Transport failure talking to the data API.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// A request URL could not be built from the configured base URL.
    #[error("invalid data api url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The data API answered with an error payload.
    #[error("data api error {code}: {message}")]
    Api { code: String, message: String },

    /// A row could not be converted to or from its model type.
    #[error("data corruption: {0}")]
    DataCorruption(#[from] serde_json::Error),
}

/// A generic record store reached through select/insert/upsert.
///
/// Rows are JSON objects. Every collection's primary key is `id`; inserts
/// that omit it get one generated by the store.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Run a filtered, ordered, limited select.
    async fn select(&self, query: &Query) -> Result<Vec<Value>, StoreError>;

    /// Insert one row and return it as stored.
    ///
    /// Fails with [`StoreError::Conflict`] on any unique violation.
    async fn insert(&self, collection: &str, row: Value) -> Result<Value, StoreError>;

    /// Insert a row or replace the existing row with the same `id`.
    async fn upsert(&self, collection: &str, row: Value) -> Result<Value, StoreError>;

    /// Fetch exactly one row, or [`StoreError::NotFound`] when none match.
    async fn fetch_single(&self, query: &Query) -> Result<Value, StoreError> {
        let rows = self.select(&query.clone().limit(1)).await?;
        rows.into_iter().next().ok_or(StoreError::NotFound)
    }
}

/// Serialize a model into a row.
pub(crate) fn to_row<T: Serialize>(value: &T) -> Result<Value, StoreError> {
    Ok(serde_json::to_value(value)?)
}

/// Deserialize a single row into a model.
pub(crate) fn from_row<T: DeserializeOwned>(row: Value) -> Result<T, StoreError> {
    Ok(serde_json::from_value(row)?)
}

/// Deserialize many rows into models.
pub(crate) fn from_rows<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, StoreError> {
    rows.into_iter().map(from_row).collect()
}
