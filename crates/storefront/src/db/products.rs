//! Product and product image repository.

use serde::Deserialize;

use trendmart_core::{Price, ProductId, ProductSort};

use super::query::escape_like;
use super::{DataStore, Direction, Query, StoreError, collections, from_row, from_rows};
use crate::models::{Product, ProductImage};

/// Filters offered by the product listing page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ProductFilter {
    /// Exact category name.
    pub category: Option<String>,
    /// Inclusive lower price bound.
    pub min_price: Option<Price>,
    /// Inclusive upper price bound.
    pub max_price: Option<Price>,
    /// Case-insensitive substring of the product name.
    pub search: Option<String>,
    pub sort: Option<ProductSort>,
}

impl ProductFilter {
    /// Whether the filter selects the full, default-ordered catalog.
    #[must_use]
    pub const fn is_unfiltered(&self) -> bool {
        self.category.is_none()
            && self.min_price.is_none()
            && self.max_price.is_none()
            && self.search.is_none()
            && self.sort.is_none()
    }

    /// Translate the filter into a `products` query.
    #[must_use]
    pub fn to_query(&self) -> Query {
        let mut query = Query::table(collections::PRODUCTS);

        if let Some(category) = &self.category {
            query = query.eq("category", category.as_str());
        }
        if let Some(min) = self.min_price {
            query = query.gte("price", min.amount().to_string());
        }
        if let Some(max) = self.max_price {
            query = query.lte("price", max.amount().to_string());
        }
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            query = query.ilike("name", format!("%{}%", escape_like(search)));
        }

        match self.sort {
            Some(ProductSort::PriceAsc) => query.order("price", Direction::Ascending),
            Some(ProductSort::PriceDesc) => query.order("price", Direction::Descending),
            Some(ProductSort::Newest) => query.order("created_at", Direction::Descending),
            None => query,
        }
    }
}

#[derive(Deserialize)]
struct CategoryRow {
    #[serde(default)]
    category: Option<String>,
}

#[derive(Deserialize)]
struct PriceRow {
    price: Price,
}

/// Repository for `products` and `product_images` rows.
pub struct ProductRepository<'a> {
    store: &'a dyn DataStore,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(store: &'a dyn DataStore) -> Self {
        Self { store }
    }

    /// List products matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns the store error if the query fails or a row is malformed.
    pub async fn list(&self, filter: &ProductFilter) -> Result<Vec<Product>, StoreError> {
        from_rows(self.store.select(&filter.to_query()).await?)
    }

    /// Get a single product.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no product has this id.
    pub async fn get_by_id(&self, id: &ProductId) -> Result<Product, StoreError> {
        let row = self
            .store
            .fetch_single(&Query::table(collections::PRODUCTS).eq("id", id.as_str()))
            .await?;
        from_row(row)
    }

    /// Products in `category` other than `exclude`.
    ///
    /// # Errors
    ///
    /// Returns the store error if the query fails or a row is malformed.
    pub async fn in_category_except(
        &self,
        category: &str,
        exclude: &ProductId,
        limit: usize,
    ) -> Result<Vec<Product>, StoreError> {
        let query = Query::table(collections::PRODUCTS)
            .eq("category", category)
            .neq("id", exclude.as_str())
            .limit(limit);
        from_rows(self.store.select(&query).await?)
    }

    /// Category names of every categorized product, sorted, duplicates included.
    ///
    /// # Errors
    ///
    /// Returns the store error if the query fails or a row is malformed.
    pub async fn category_names(&self) -> Result<Vec<String>, StoreError> {
        let query = Query::table(collections::PRODUCTS)
            .select(&["category"])
            .order("category", Direction::Ascending);
        let rows: Vec<CategoryRow> = from_rows(self.store.select(&query).await?)?;
        Ok(rows.into_iter().filter_map(|r| r.category).collect())
    }

    /// Highest listed price, if any product exists.
    ///
    /// # Errors
    ///
    /// Returns the store error if the query fails or a row is malformed.
    pub async fn highest_price(&self) -> Result<Option<Price>, StoreError> {
        let query = Query::table(collections::PRODUCTS)
            .select(&["price"])
            .order("price", Direction::Descending)
            .limit(1);
        let rows: Vec<PriceRow> = from_rows(self.store.select(&query).await?)?;
        Ok(rows.into_iter().next().map(|r| r.price))
    }

    /// Gallery images, primary image first, then by display order.
    ///
    /// # Errors
    ///
    /// Returns the store error if the query fails or a row is malformed.
    pub async fn images(&self, product_id: &ProductId) -> Result<Vec<ProductImage>, StoreError> {
        let query = Query::table(collections::PRODUCT_IMAGES)
            .eq("product_id", product_id.as_str())
            .order("is_primary", Direction::Descending)
            .order("display_order", Direction::Ascending);
        from_rows(self.store.select(&query).await?)
    }
}
