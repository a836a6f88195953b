//! Shopping cart state container.
//!
//! The cart is a purely local, synchronous store: no network I/O and no
//! suspension points. It holds at most one [`CartItem`] per product id, every
//! item has a quantity between one and [`MAX_QUANTITY`], and totals are
//! derived on read.
//!
//! Each mutation publishes a fresh [`CartState`] through a
//! [`tokio::sync::watch`] channel before returning, so every subscriber sees
//! it immediately. A store built with [`CartStore::with_storage`] also writes
//! each new state to durable storage.

mod storage;

pub use storage::{CartStorage, CartStorageError, FileCartStorage};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, warn};

use trendmart_core::{Price, ProductId};

use crate::error::add_breadcrumb;
use crate::models::Product;

/// Largest quantity a single line can hold. Larger requests are capped.
pub const MAX_QUANTITY: u32 = 9_999;

/// One product line in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: ProductId,
    pub name: String,
    pub price: Price,
    pub image: String,
    pub quantity: u32,
}

impl CartItem {
    /// A single unit of `product`.
    #[must_use]
    pub fn from_product(product: &Product) -> Self {
        Self {
            id: product.id.clone(),
            name: product.name.clone(),
            price: product.price,
            image: product.image_url.clone(),
            quantity: 1,
        }
    }

    /// `price * quantity` for this line.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.price * self.quantity
    }
}

/// Snapshot of the cart contents in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartState {
    items: Vec<CartItem>,
}

impl CartState {
    /// Build a state from items, keeping the first occurrence of each id,
    /// dropping zero-quantity lines and capping the rest at [`MAX_QUANTITY`].
    #[must_use]
    pub fn from_items(items: impl IntoIterator<Item = CartItem>) -> Self {
        let mut state = Self::default();
        for mut item in items {
            if item.quantity > 0 && state.find(&item.id).is_none() {
                item.quantity = item.quantity.min(MAX_QUANTITY);
                state.items.push(item);
            }
        }
        state
    }

    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    #[must_use]
    pub fn find(&self, id: &ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| &item.id == id)
    }

    fn find_mut(&mut self, id: &ProductId) -> Option<&mut CartItem> {
        self.items.iter_mut().find(|item| &item.id == id)
    }

    /// Sum of quantities, saturating at `u32::MAX`.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items
            .iter()
            .fold(0, |count: u32, item| count.saturating_add(item.quantity))
    }

    /// Sum of `price * quantity`.
    #[must_use]
    pub fn total_price(&self) -> Price {
        self.items.iter().map(CartItem::line_total).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn remove(&mut self, id: &ProductId) -> bool {
        let before = self.items.len();
        self.items.retain(|item| &item.id != id);
        self.items.len() != before
    }
}

/// The cart store.
///
/// Construct one per process (see [`crate::state::AppState`]) and share it by
/// reference; all operations take `&self`.
pub struct CartStore {
    state: watch::Sender<CartState>,
    storage: Option<Box<dyn CartStorage>>,
}

impl CartStore {
    /// An empty, non-persistent cart.
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(CartState::default());
        Self {
            state,
            storage: None,
        }
    }

    /// A cart restored from `storage` that saves after every mutation.
    ///
    /// A missing or unreadable saved cart starts empty.
    #[must_use]
    pub fn with_storage(storage: impl CartStorage + 'static) -> Self {
        let restored = match storage.load() {
            Ok(Some(saved)) => CartState::from_items(saved.items),
            Ok(None) => CartState::default(),
            Err(e) => {
                warn!(error = %e, "Failed to restore saved cart, starting empty");
                CartState::default()
            }
        };
        debug!(items = restored.items.len(), "Cart restored");

        let (state, _) = watch::channel(restored);
        Self {
            state,
            storage: Some(Box::new(storage)),
        }
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add one unit of `product` if it is not already in the cart.
    ///
    /// An existing line is left untouched (quantity is not incremented).
    /// Returns whether a line was inserted.
    pub fn add_item(&self, product: &Product) -> bool {
        let inserted = self.mutate(|state| {
            if state.find(&product.id).is_some() {
                return false;
            }
            state.items.push(CartItem::from_product(product));
            true
        });

        if inserted {
            add_breadcrumb("cart", "Added item", Some(&[("product_id", product.id.as_str())]));
        }
        inserted
    }

    /// Put `quantity` units of `product` in the cart, inserting the line if
    /// needed or overwriting its quantity otherwise. A zero quantity counts
    /// as one; anything above [`MAX_QUANTITY`] is capped.
    pub fn add_item_with_quantity(&self, product: &Product, quantity: u32) {
        let quantity = quantity.clamp(1, MAX_QUANTITY);
        self.mutate(|state| {
            if let Some(item) = state.find_mut(&product.id) {
                if item.quantity == quantity {
                    return false;
                }
                item.quantity = quantity;
            } else {
                state.items.push(CartItem {
                    quantity,
                    ..CartItem::from_product(product)
                });
            }
            true
        });
        add_breadcrumb("cart", "Set item quantity", Some(&[("product_id", product.id.as_str())]));
    }

    /// Remove the line for `product_id`. Returns whether anything was removed.
    pub fn remove_item(&self, product_id: &ProductId) -> bool {
        let removed = self.mutate(|state| state.remove(product_id));
        if removed {
            add_breadcrumb("cart", "Removed item", Some(&[("product_id", product_id.as_str())]));
        }
        removed
    }

    /// Set the quantity of an existing line.
    ///
    /// A quantity of zero or below removes the line, and anything above
    /// [`MAX_QUANTITY`] is capped. Unknown ids are ignored.
    pub fn update_quantity(&self, product_id: &ProductId, quantity: i64) {
        if quantity <= 0 {
            self.remove_item(product_id);
            return;
        }
        let quantity = u32::try_from(quantity).map_or(MAX_QUANTITY, |q| q.min(MAX_QUANTITY));

        self.mutate(|state| match state.find_mut(product_id) {
            Some(item) if item.quantity != quantity => {
                item.quantity = quantity;
                true
            }
            _ => false,
        });
    }

    /// Empty the cart.
    pub fn clear_cart(&self) {
        self.mutate(|state| {
            if state.items.is_empty() {
                return false;
            }
            state.items.clear();
            true
        });
        add_breadcrumb("cart", "Cleared cart", None);
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Current contents.
    #[must_use]
    pub fn snapshot(&self) -> CartState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn items(&self) -> Vec<CartItem> {
        self.state.borrow().items.clone()
    }

    #[must_use]
    pub fn find_item(&self, product_id: &ProductId) -> Option<CartItem> {
        self.state.borrow().find(product_id).cloned()
    }

    #[must_use]
    pub fn contains(&self, product_id: &ProductId) -> bool {
        self.state.borrow().find(product_id).is_some()
    }

    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.state.borrow().item_count()
    }

    #[must_use]
    pub fn total_price(&self) -> Price {
        self.state.borrow().total_price()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.borrow().is_empty()
    }

    /// Receive every future cart state.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartState> {
        self.state.subscribe()
    }

    /// Apply `f`; when it reports a change, notify subscribers and persist.
    fn mutate(&self, f: impl FnOnce(&mut CartState) -> bool) -> bool {
        let changed = self.state.send_if_modified(f);
        if changed {
            self.persist();
        }
        changed
    }

    fn persist(&self) {
        let Some(storage) = &self.storage else {
            return;
        };
        let snapshot = self.snapshot();
        if let Err(e) = storage.save(&snapshot) {
            warn!(error = %e, "Failed to save cart");
        }
    }
}

impl Default for CartStore {
    fn default() -> Self {
        Self::new()
    }
}
