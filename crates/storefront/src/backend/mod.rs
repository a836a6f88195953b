//! Collaborator implementations.
//!
//! - `rest` - the hosted Supabase-compatible backend over HTTP
//! - `memory` - in-process stand-ins for offline mode and tests

pub mod memory;
pub mod rest;

use std::sync::Arc;

use crate::config::BackendConfig;
use crate::db::DataStore;
use crate::services::auth::AuthProvider;

/// The pair of collaborators the storefront runs against.
#[derive(Clone)]
pub struct Backend {
    pub store: Arc<dyn DataStore>,
    pub auth: Arc<dyn AuthProvider>,
}

impl Backend {
    /// Build the collaborators selected by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the API URL cannot be used as a base URL.
    pub fn connect(config: &BackendConfig) -> Result<Self, url::ParseError> {
        match config {
            BackendConfig::Rest { api_url, anon_key } => {
                let client = rest::RestClient::new(api_url, anon_key.clone())?;
                tracing::info!(api_url = %api_url, "Using hosted backend");
                Ok(Self {
                    store: Arc::new(client.store()),
                    auth: Arc::new(client.auth()),
                })
            }
            BackendConfig::Memory => {
                tracing::info!("Using in-process backend");
                Ok(Self::in_memory())
            }
        }
    }

    /// Fresh in-process collaborators.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(memory::MemoryStore::storefront()),
            auth: Arc::new(memory::MemoryAuth::new()),
        }
    }
}
