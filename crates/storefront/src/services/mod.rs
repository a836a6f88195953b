//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Auth collaborator contract (sessions, credentials, push events)
//! - `catalog` - Product browsing with an in-memory response cache
//! - `reviews` - Listing and submitting product reviews
//! - `checkout` - Turning the cart into an order

pub mod auth;
pub mod catalog;
pub mod checkout;
pub mod reviews;
