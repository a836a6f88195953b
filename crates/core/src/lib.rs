//! TrendMart Core - Shared types library.
//!
//! This crate provides the types shared by every TrendMart component:
//! - `storefront` - The client-side state layer (cart, session, services)
//! - `integration-tests` - End-to-end scenarios against the in-memory backend
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no async.
//! This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, emails, and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
