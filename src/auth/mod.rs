//! Bearer token authentication
//!
//! Handles:
//! - API token registry
//! - Authentication middleware and extractors

mod middleware;
pub mod tokens;

pub use middleware::{CurrentUser, MaybeUser, require_auth};
pub use tokens::{ApiTokens, ApiUser, hash_token};
