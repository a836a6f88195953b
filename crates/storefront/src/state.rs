//! Application state shared by every part of the storefront.

use std::sync::Arc;

use crate::backend::Backend;
use crate::cart::{CartStore, FileCartStorage};
use crate::config::StorefrontConfig;
use crate::db::DataStore;
use crate::services::auth::AuthProvider;
use crate::services::catalog::CatalogService;
use crate::services::checkout::CheckoutService;
use crate::services::reviews::ReviewService;
use crate::session::SessionController;

/// Error creating the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("invalid api url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Containers and services the UI layer reads from and acts through.
///
/// This struct is cheaply cloneable via `Arc`. There is exactly one cart and
/// one session controller per state; every clone shares them.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    store: Arc<dyn DataStore>,
    auth: Arc<dyn AuthProvider>,
    cart: Arc<CartStore>,
    session: Arc<SessionController>,
    catalog: CatalogService,
    reviews: ReviewService,
    checkout: CheckoutService,
}

impl AppState {
    /// Create the application state for `config`.
    ///
    /// The cart is restored from `config.cart_path` and saved back after each
    /// change.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be built from the configuration.
    pub fn new(config: StorefrontConfig) -> Result<Self, StateError> {
        let backend = Backend::connect(&config.backend)?;
        let cart = CartStore::with_storage(FileCartStorage::new(&config.cart_path));
        Ok(Self::with_parts(config, backend, cart))
    }

    /// Create the application state around existing collaborators and cart.
    #[must_use]
    pub fn with_parts(config: StorefrontConfig, backend: Backend, cart: CartStore) -> Self {
        let Backend { store, auth } = backend;
        let cart = Arc::new(cart);
        let session = Arc::new(SessionController::new(Arc::clone(&auth), Arc::clone(&store)));
        let catalog = CatalogService::new(Arc::clone(&store), config.catalog_cache_ttl);
        let reviews = ReviewService::new(Arc::clone(&store), Arc::clone(&session));
        let checkout =
            CheckoutService::new(Arc::clone(&store), Arc::clone(&cart), Arc::clone(&session));

        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                auth,
                cart,
                session,
                catalog,
                reviews,
                checkout,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// The data collaborator.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn DataStore> {
        &self.inner.store
    }

    /// The auth collaborator.
    #[must_use]
    pub fn auth(&self) -> &Arc<dyn AuthProvider> {
        &self.inner.auth
    }

    /// The shared cart.
    #[must_use]
    pub fn cart(&self) -> &Arc<CartStore> {
        &self.inner.cart
    }

    /// The shared session controller.
    #[must_use]
    pub fn session(&self) -> &Arc<SessionController> {
        &self.inner.session
    }

    #[must_use]
    pub fn catalog(&self) -> &CatalogService {
        &self.inner.catalog
    }

    #[must_use]
    pub fn reviews(&self) -> &ReviewService {
        &self.inner.reviews
    }

    #[must_use]
    pub fn checkout(&self) -> &CheckoutService {
        &self.inner.checkout
    }
}
