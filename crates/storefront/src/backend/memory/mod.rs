//! In-process collaborators.
//!
//! Used by the offline backend mode and by tests. State lives for the
//! lifetime of the process.

mod auth;
mod store;

pub use auth::MemoryAuth;
pub use store::MemoryStore;
