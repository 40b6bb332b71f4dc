//! API token registry
//!
//! Configured tokens are hashed once at startup and only the hashes are kept
//! in memory. Incoming bearer tokens are hashed the same way before lookup.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

use crate::config::ApiTokenConfig;

const TOKEN_HASH_PREFIX: &str = "sha256:";

/// The user a bearer token authenticates
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiUser {
    pub id: u64,
    pub name: String,
}

impl ApiUser {
    /// Key used to bucket this user's requests for rate limiting
    pub fn rate_limit_key(&self) -> String {
        format!("user:{}", self.id)
    }
}

/// Hash a token for storage/lookup
///
/// Format: `sha256:` followed by the base64url digest.
pub fn hash_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    format!("{}{}", TOKEN_HASH_PREFIX, URL_SAFE_NO_PAD.encode(digest))
}

/// Lookup table from token hash to user
#[derive(Debug, Default)]
pub struct ApiTokens {
    by_hash: HashMap<String, ApiUser>,
}

impl ApiTokens {
    pub fn from_config(tokens: &[ApiTokenConfig]) -> Self {
        let by_hash = tokens
            .iter()
            .map(|entry| {
                (
                    hash_token(&entry.token),
                    ApiUser {
                        id: entry.user_id,
                        name: entry.name.clone(),
                    },
                )
            })
            .collect();

        Self { by_hash }
    }

    /// Resolve a presented bearer token
    pub fn authenticate(&self, token: &str) -> Option<ApiUser> {
        self.by_hash.get(&hash_token(token)).cloned()
    }

    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }
}
