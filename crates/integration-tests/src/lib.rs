//! Integration tests for the TrendMart storefront.
//!
//! Scenarios run the real [`AppState`] against the in-process backend, so
//! they need no network and no hosted project.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p trendmart-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `session_lifecycle` - sign-up, sign-in, reconciliation and auth events
//! - `cart_persistence` - the cart store and its durable storage
//! - `shop_flow` - catalog, reviews and checkout end to end

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::{Notify, broadcast};

use trendmart_core::Email;
use trendmart_storefront::backend::Backend;
use trendmart_storefront::backend::memory::{MemoryAuth, MemoryStore};
use trendmart_storefront::cart::CartStore;
use trendmart_storefront::config::StorefrontConfig;
use trendmart_storefront::db::{DataStore, Query, StoreError, collections};
use trendmart_storefront::models::{AuthSession, AuthUser, Product, UserMetadata};
use trendmart_storefront::services::auth::{AuthError, AuthEvent, AuthProvider};
use trendmart_storefront::session::SessionController;
use trendmart_storefront::state::AppState;

/// Password used for every test account.
pub const PASSWORD: &str = "correct-horse";

/// Wraps [`MemoryAuth`] with knobs the scenarios need: call counting,
/// forced sign-out failures and a pausable user lookup.
pub struct ScriptedAuth {
    inner: Arc<MemoryAuth>,
    sign_up_calls: AtomicUsize,
    fail_sign_out: AtomicBool,
    user_read_gate: Mutex<Option<Arc<Notify>>>,
    user_read_paused: Notify,
}

impl ScriptedAuth {
    #[must_use]
    pub fn new(inner: Arc<MemoryAuth>) -> Self {
        Self {
            inner,
            sign_up_calls: AtomicUsize::new(0),
            fail_sign_out: AtomicBool::new(false),
            user_read_gate: Mutex::new(None),
            user_read_paused: Notify::new(),
        }
    }

    /// Number of sign-up requests that reached the provider.
    #[must_use]
    pub fn sign_up_calls(&self) -> usize {
        self.sign_up_calls.load(Ordering::SeqCst)
    }

    /// Make every following `sign_out` fail without touching the session.
    pub fn fail_sign_out(&self, fail: bool) {
        self.fail_sign_out.store(fail, Ordering::SeqCst);
    }

    /// Hold the next `get_user` after it has read the user, until the
    /// returned handle is notified.
    #[must_use]
    pub fn pause_next_user_read(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self
            .user_read_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&gate));
        gate
    }

    /// Wait until a paused `get_user` is parked on its gate.
    pub async fn user_read_paused(&self) {
        self.user_read_paused.notified().await;
    }
}

#[async_trait]
impl AuthProvider for ScriptedAuth {
    async fn get_session(&self) -> Result<Option<AuthSession>, AuthError> {
        self.inner.get_session().await
    }

    async fn get_user(&self) -> Result<Option<AuthUser>, AuthError> {
        let user = self.inner.get_user().await?;
        let gate = self
            .user_read_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(gate) = gate {
            self.user_read_paused.notify_one();
            gate.notified().await;
        }
        Ok(user)
    }

    async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &str,
    ) -> Result<AuthUser, AuthError> {
        self.inner.sign_in_with_password(email, password).await
    }

    async fn sign_up(
        &self,
        email: &Email,
        password: &str,
        metadata: UserMetadata,
    ) -> Result<AuthUser, AuthError> {
        self.sign_up_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.sign_up(email, password, metadata).await
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        if self.fail_sign_out.load(Ordering::SeqCst) {
            return Err(AuthError::Provider {
                status: 503,
                message: "503 Service Unavailable".to_string(),
            });
        }
        self.inner.sign_out().await
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.inner.subscribe()
    }
}

/// Wraps [`MemoryStore`] with a pausable insert, so a test can act between
/// a repository's read and its write.
pub struct ScriptedStore {
    inner: Arc<MemoryStore>,
    insert_gate: Mutex<Option<Arc<Notify>>>,
    insert_paused: Notify,
}

impl ScriptedStore {
    #[must_use]
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            insert_gate: Mutex::new(None),
            insert_paused: Notify::new(),
        }
    }

    /// Hold the next `insert` before it reaches the store, until the
    /// returned handle is notified.
    #[must_use]
    pub fn pause_next_insert(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self
            .insert_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&gate));
        gate
    }

    /// Wait until a paused `insert` is parked on its gate.
    pub async fn insert_paused(&self) {
        self.insert_paused.notified().await;
    }
}

#[async_trait]
impl DataStore for ScriptedStore {
    async fn select(&self, query: &Query) -> Result<Vec<Value>, StoreError> {
        self.inner.select(query).await
    }

    async fn insert(&self, collection: &str, row: Value) -> Result<Value, StoreError> {
        let gate = self
            .insert_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(gate) = gate {
            self.insert_paused.notify_one();
            gate.notified().await;
        }
        self.inner.insert(collection, row).await
    }

    async fn upsert(&self, collection: &str, row: Value) -> Result<Value, StoreError> {
        self.inner.upsert(collection, row).await
    }
}

/// An [`AppState`] wired to in-process collaborators, with handles on them.
pub struct TestShop {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub data: Arc<ScriptedStore>,
    pub auth: Arc<ScriptedAuth>,
    pub memory_auth: Arc<MemoryAuth>,
}

impl Default for TestShop {
    fn default() -> Self {
        Self::new()
    }
}

impl TestShop {
    /// A shop with an empty catalog and a non-persistent cart.
    #[must_use]
    pub fn new() -> Self {
        Self::with_cart(CartStore::new())
    }

    #[must_use]
    pub fn with_cart(cart: CartStore) -> Self {
        let store = Arc::new(MemoryStore::storefront());
        let data = Arc::new(ScriptedStore::new(Arc::clone(&store)));
        let memory_auth = Arc::new(MemoryAuth::new());
        let auth = Arc::new(ScriptedAuth::new(Arc::clone(&memory_auth)));

        let backend = Backend {
            store: Arc::clone(&data) as _,
            auth: Arc::clone(&auth) as _,
        };
        let state = AppState::with_parts(StorefrontConfig::in_memory("cart.json"), backend, cart);

        Self {
            state,
            store,
            data,
            auth,
            memory_auth,
        }
    }

    #[must_use]
    pub fn session(&self) -> &Arc<SessionController> {
        self.state.session()
    }

    /// A second controller over the same collaborators, like another tab.
    #[must_use]
    pub fn second_session(&self) -> Arc<SessionController> {
        Arc::new(SessionController::new(
            Arc::clone(&self.auth) as _,
            Arc::clone(&self.data) as _,
        ))
    }

    /// Register `email` with the provider only, leaving no profile behind.
    pub async fn register_without_profile(&self, email: &str) -> AuthUser {
        let email = Email::parse(email).expect("valid test email");
        self.memory_auth
            .sign_up(&email, PASSWORD, UserMetadata::default())
            .await
            .expect("provider sign-up succeeds")
    }

    /// Put a profile row in place directly.
    pub fn seed_profile(&self, id: &str, username: &str) {
        self.store.seed(
            collections::PROFILES,
            [json!({ "id": id, "username": username, "created_at": "2024-01-01T00:00:00Z" })],
        );
    }

    /// Add products to the catalog.
    pub fn seed_products(&self, products: &[Product]) {
        self.store.seed(
            collections::PRODUCTS,
            products
                .iter()
                .map(|p| serde_json::to_value(p).expect("product serializes")),
        );
    }

    /// Every stored profile row.
    #[must_use]
    pub fn profile_rows(&self) -> Vec<Value> {
        self.store.rows(collections::PROFILES)
    }
}

/// A catalog product; `price` is a decimal string such as `"19.99"`.
#[must_use]
pub fn product(id: &str, name: &str, price: &str, category: &str) -> Product {
    serde_json::from_value(json!({
        "id": id,
        "name": name,
        "price": price,
        "image_url": format!("https://img.trendmart.shop/{id}.jpg"),
        "category": category,
        "stock": 10,
        "created_at": "2024-05-01T12:00:00Z",
    }))
    .expect("valid product fixture")
}
