//! Catalog browsing.
//!
//! Wraps [`ProductRepository`] with a `moka` cache. Only the unfiltered
//! product list and single products are cached; filtered and searched
//! listings always hit the store.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use thiserror::Error;
use tracing::{debug, instrument};

use trendmart_core::{Price, ProductId};

use crate::db::products::{ProductFilter, ProductRepository};
use crate::db::{DataStore, StoreError};
use crate::models::{Product, ProductImage};

/// Default number of related products shown on a product page.
pub const DEFAULT_RELATED_LIMIT: usize = 7;

/// Default time-to-live for cached catalog responses.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

const CACHE_CAPACITY: u64 = 1000;

/// Errors returned by [`CatalogService`].
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("product not found: {0}")]
    NotFound(ProductId),

    #[error("data store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
enum CacheKey {
    Product(ProductId),
    AllProducts,
}

#[derive(Debug, Clone)]
enum CacheValue {
    Product(Box<Product>),
    Products(Arc<Vec<Product>>),
}

/// Read access to products, categories and gallery images.
#[derive(Clone)]
pub struct CatalogService {
    inner: Arc<CatalogServiceInner>,
}

struct CatalogServiceInner {
    store: Arc<dyn DataStore>,
    cache: Cache<CacheKey, CacheValue>,
}

impl CatalogService {
    /// Create a catalog service whose cache entries live for `ttl`.
    #[must_use]
    pub fn new(store: Arc<dyn DataStore>, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(CACHE_CAPACITY)
            .time_to_live(ttl)
            .build();

        Self {
            inner: Arc::new(CatalogServiceInner { store, cache }),
        }
    }

    fn products(&self) -> ProductRepository<'_> {
        ProductRepository::new(self.inner.store.as_ref())
    }

    /// List products matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store query fails.
    #[instrument(skip(self))]
    pub async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, CatalogError> {
        let cacheable = filter.is_unfiltered();

        if cacheable
            && let Some(CacheValue::Products(products)) =
                self.inner.cache.get(&CacheKey::AllProducts).await
        {
            debug!("Cache hit for product list");
            return Ok(products.as_ref().clone());
        }

        let products = self.products().list(filter).await?;

        if cacheable {
            self.inner
                .cache
                .insert(
                    CacheKey::AllProducts,
                    CacheValue::Products(Arc::new(products.clone())),
                )
                .await;
        }

        Ok(products)
    }

    /// Get a single product.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if no product has this id.
    #[instrument(skip(self), fields(id = %id))]
    pub async fn get_product(&self, id: &ProductId) -> Result<Product, CatalogError> {
        let key = CacheKey::Product(id.clone());

        if let Some(CacheValue::Product(product)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let product = self.products().get_by_id(id).await.map_err(|e| match e {
            StoreError::NotFound => CatalogError::NotFound(id.clone()),
            other => other.into(),
        })?;

        self.inner
            .cache
            .insert(key, CacheValue::Product(Box::new(product.clone())))
            .await;

        Ok(product)
    }

    /// Other products from the same category as `product`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store query fails.
    #[instrument(skip(self, product), fields(id = %product.id))]
    pub async fn related_products(
        &self,
        product: &Product,
        limit: usize,
    ) -> Result<Vec<Product>, CatalogError> {
        if product.category.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        Ok(self
            .products()
            .in_category_except(&product.category, &product.id, limit)
            .await?)
    }

    /// Distinct category names, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the store query fails.
    pub async fn categories(&self) -> Result<Vec<String>, CatalogError> {
        let mut names = self.products().category_names().await?;
        names.retain(|name| !name.is_empty());
        names.sort();
        names.dedup();
        Ok(names)
    }

    /// Upper bound for the price filter: the highest price rounded up to a
    /// whole unit, or zero for an empty catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the store query fails.
    pub async fn max_price(&self) -> Result<Price, CatalogError> {
        Ok(self
            .products()
            .highest_price()
            .await?
            .map_or(Price::ZERO, Price::ceil))
    }

    /// Gallery images for a product, primary image first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store query fails.
    pub async fn product_images(&self, id: &ProductId) -> Result<Vec<ProductImage>, CatalogError> {
        Ok(self.products().images(id).await?)
    }

    /// Invalidate all cached data.
    pub async fn invalidate_all(&self) {
        self.inner.cache.invalidate_all();
        self.inner.cache.run_pending_tasks().await;
    }
}
