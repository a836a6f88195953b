//! Order repository.

use trendmart_core::{OrderId, UserId};

use super::{DataStore, Direction, Query, StoreError, collections, from_row, from_rows, to_row};
use crate::models::{NewOrder, NewOrderItem, Order, OrderItem};

/// Repository for `orders` and `order_items` rows.
pub struct OrderRepository<'a> {
    store: &'a dyn DataStore,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(store: &'a dyn DataStore) -> Self {
        Self { store }
    }

    /// Insert an order header.
    ///
    /// # Errors
    ///
    /// Returns the store error if the insert fails.
    pub async fn create(&self, order: &NewOrder) -> Result<Order, StoreError> {
        let row = self.store.insert(collections::ORDERS, to_row(order)?).await?;
        from_row(row)
    }

    /// Insert one order line.
    ///
    /// # Errors
    ///
    /// Returns the store error if the insert fails.
    pub async fn add_item(&self, item: &NewOrderItem) -> Result<OrderItem, StoreError> {
        let row = self
            .store
            .insert(collections::ORDER_ITEMS, to_row(item)?)
            .await?;
        from_row(row)
    }

    /// A user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns the store error if the query fails or a row is malformed.
    pub async fn for_user(&self, user_id: &UserId) -> Result<Vec<Order>, StoreError> {
        let query = Query::table(collections::ORDERS)
            .eq("user_id", user_id.as_str())
            .order("created_at", Direction::Descending);
        from_rows(self.store.select(&query).await?)
    }

    /// Lines of one order.
    ///
    /// # Errors
    ///
    /// Returns the store error if the query fails or a row is malformed.
    pub async fn items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, StoreError> {
        let query = Query::table(collections::ORDER_ITEMS).eq("order_id", order_id.as_str());
        from_rows(self.store.select(&query).await?)
    }
}
