//! Domain models for the storefront.
//!
//! Row types mirror the hosted backend's collections (`profiles`, `products`,
//! `orders`, ...) and deserialize straight from the data API's JSON. The
//! auth provider's identity types live in [`user`], the observable session
//! snapshot in [`session`].

pub mod catalog;
pub mod order;
pub mod profile;
pub mod session;
pub mod user;

pub use catalog::{NewReview, Product, ProductImage, Review};
pub use order::{NewOrder, NewOrderItem, Order, OrderItem};
pub use profile::{FALLBACK_USERNAME, NewProfile, Profile, ProfileUpdate, default_username};
pub use session::{SessionPhase, SessionState};
pub use user::{AuthSession, AuthUser, UserMetadata};
