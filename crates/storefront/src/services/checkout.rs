//! Checkout: turning the cart into an order.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::instrument;

use trendmart_core::OrderStatus;

use crate::cart::CartStore;
use crate::db::orders::OrderRepository;
use crate::db::{DataStore, StoreError};
use crate::error::add_breadcrumb;
use crate::models::{NewOrder, NewOrderItem, Order, OrderItem};
use crate::session::SessionController;

/// Errors returned by [`CheckoutService`].
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Please sign in to place an order")]
    NotAuthenticated,

    #[error("Your cart is empty")]
    EmptyCart,

    #[error("data store error: {0}")]
    Store(#[from] StoreError),
}

/// Places orders for the signed-in user from the shared cart.
#[derive(Clone)]
pub struct CheckoutService {
    store: Arc<dyn DataStore>,
    cart: Arc<CartStore>,
    session: Arc<SessionController>,
}

impl CheckoutService {
    #[must_use]
    pub fn new(
        store: Arc<dyn DataStore>,
        cart: Arc<CartStore>,
        session: Arc<SessionController>,
    ) -> Self {
        Self {
            store,
            cart,
            session,
        }
    }

    /// Write the cart as a pending order and empty the cart.
    ///
    /// The order is built from a single cart snapshot, so edits made while
    /// the order is being written are not part of it. If any write fails the
    /// cart is left untouched.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::NotAuthenticated` when nobody is signed in,
    /// `CheckoutError::EmptyCart` for an empty cart, or the store error if a
    /// write fails.
    #[instrument(skip(self))]
    pub async fn place_order(&self) -> Result<Order, CheckoutError> {
        let user = self
            .session
            .current_user()
            .ok_or(CheckoutError::NotAuthenticated)?;
        let cart = self.cart.snapshot();
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let orders = OrderRepository::new(self.store.as_ref());
        let order = orders
            .create(&NewOrder {
                user_id: user.id,
                total_price: cart.total_price(),
                status: OrderStatus::Pending,
                created_at: Utc::now(),
            })
            .await?;

        for item in cart.items() {
            orders
                .add_item(&NewOrderItem {
                    order_id: order.id.clone(),
                    product_id: item.id.clone(),
                    quantity: item.quantity,
                    price: item.price,
                })
                .await?;
        }

        self.cart.clear_cart();
        add_breadcrumb("checkout", "Placed order", Some(&[("order_id", order.id.as_str())]));
        tracing::info!(
            order_id = %order.id,
            total = %order.total_price,
            lines = cart.items().len(),
            "Order placed"
        );
        Ok(order)
    }

    /// The signed-in user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::NotAuthenticated` when nobody is signed in, or
    /// the store error if the query fails.
    pub async fn order_history(&self) -> Result<Vec<Order>, CheckoutError> {
        let user = self
            .session
            .current_user()
            .ok_or(CheckoutError::NotAuthenticated)?;
        Ok(OrderRepository::new(self.store.as_ref())
            .for_user(&user.id)
            .await?)
    }

    /// Lines of one of the signed-in user's orders.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::NotAuthenticated` when nobody is signed in, or
    /// the store error if the query fails.
    pub async fn order_items(&self, order: &Order) -> Result<Vec<OrderItem>, CheckoutError> {
        let user = self
            .session
            .current_user()
            .ok_or(CheckoutError::NotAuthenticated)?;
        if order.user_id != user.id {
            return Err(CheckoutError::NotAuthenticated);
        }
        Ok(OrderRepository::new(self.store.as_ref())
            .items(&order.id)
            .await?)
    }
}
