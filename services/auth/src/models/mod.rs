//! Authentication service models

pub mod session;
pub mod user;

// Re-export for convenience
pub use session::{RefreshSession, TokenPair};
pub use user::{NewUser, User, UserProfile};
