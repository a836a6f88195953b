//! Unified error handling with Sentry integration.
//!
//! Each layer has its own error enum; [`AppError`] folds them together for
//! callers (the binary, UI glue) that want one type. Unexpected failures are
//! captured to Sentry through [`AppError::report`].

use thiserror::Error;

use crate::cart::CartStorageError;
use crate::config::ConfigError;
use crate::db::StoreError;
use crate::services::auth::AuthError;
use crate::services::catalog::CatalogError;
use crate::services::checkout::CheckoutError;
use crate::services::reviews::ReviewError;
use crate::session::SessionError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be loaded.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Data store operation failed.
    #[error("Data store error: {0}")]
    Store(#[from] StoreError),

    /// Auth provider operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Session operation failed.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Catalog lookup failed.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Review operation failed.
    #[error("Review error: {0}")]
    Review(#[from] ReviewError),

    /// Checkout failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Saved cart could not be read or written.
    #[error("Cart storage error: {0}")]
    CartStorage(#[from] CartStorageError),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether this is a failure worth an error report, as opposed to an
    /// expected outcome like bad credentials or a taken username.
    #[must_use]
    pub const fn is_unexpected(&self) -> bool {
        match self {
            Self::Config(_) | Self::Store(_) | Self::CartStorage(_) | Self::Internal(_) => true,
            Self::Auth(err) => err.is_unexpected(),
            Self::Session(err) => err.is_unexpected(),
            Self::Catalog(CatalogError::Store(_))
            | Self::Review(ReviewError::Store(_))
            | Self::Checkout(CheckoutError::Store(_)) => true,
            Self::Catalog(_) | Self::Review(_) | Self::Checkout(_) => false,
        }
    }

    /// Capture unexpected errors to Sentry and log them.
    pub fn report(&self) {
        if self.is_unexpected() {
            let event_id = sentry::capture_error(self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Storefront error"
            );
        } else {
            tracing::debug!(error = %self, "Storefront error (expected)");
        }
    }

    /// Message suitable for showing to the shopper.
    ///
    /// Provider messages (bad credentials, weak password, taken username)
    /// pass through verbatim; internal details do not.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Session(err) => err.to_string(),
            Self::Auth(err) => err.to_string(),
            Self::Review(err) => err.to_string(),
            Self::Checkout(err) if !matches!(err, CheckoutError::Store(_)) => err.to_string(),
            Self::Catalog(CatalogError::NotFound(_)) => "Product not found".to_string(),
            _ => "Something went wrong, please try again".to_string(),
        }
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on sign-out to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added item", Some(&[("product_id", "p1")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
