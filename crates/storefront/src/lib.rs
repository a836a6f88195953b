//! TrendMart storefront core.
//!
//! Client-side state and services for the TrendMart shop: the cart, the
//! signed-in session and the catalog, review and checkout services built on
//! top of the hosted data and auth collaborators.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backend;
pub mod cart;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod session;
pub mod state;
