//! Session token store
//!
//! Single source of truth for the current credential. The store is
//! hydrated from durable storage at construction, keeps the decoded
//! expiry cached alongside the token, and is only ever written by login,
//! logout, and refresh completion.

use std::sync::{Arc, RwLock};

use tracing::warn;

use crate::storage::TokenStorage;
use crate::token;

const LOCK_EXPECT: &str = "Failed to acquire session token lock";

#[derive(Clone, Debug)]
struct CachedToken {
    token: String,
    expires_at: i64,
}

pub struct SessionTokenStore {
    storage: Arc<dyn TokenStorage>,
    cached: RwLock<Option<CachedToken>>,
}

impl SessionTokenStore {
    /// Build a store over `storage`, loading any previously persisted
    /// token. A stored token without a readable expiry is ignored.
    pub fn new(storage: Arc<dyn TokenStorage>) -> Self {
        let cached = match storage.load() {
            Ok(Some(raw)) => match token::decode_expiry(&raw) {
                Some(expires_at) => Some(CachedToken {
                    token: raw,
                    expires_at,
                }),
                None => {
                    warn!("stored session token has no readable expiry, ignoring it");
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                warn!("failed to load session token: {err}");
                None
            }
        };

        Self {
            storage,
            cached: RwLock::new(cached),
        }
    }

    /// Current token, if any. An expired token is still returned so a
    /// refresh call can present it to the backend.
    pub fn get(&self) -> Option<String> {
        self.cached
            .read()
            .expect(LOCK_EXPECT)
            .as_ref()
            .map(|cached| cached.token.clone())
    }

    /// Persist a new token and cache its decoded expiry. A token whose
    /// payload cannot be decoded is treated as absent and not stored.
    pub fn set(&self, token: &str) {
        let Some(expires_at) = token::decode_expiry(token) else {
            warn!("refusing to store session token with no readable expiry");
            return;
        };

        if let Err(err) = self.storage.store(token) {
            // The in-process session keeps working; only durability is lost.
            warn!("failed to persist session token: {err}");
        }

        *self.cached.write().expect(LOCK_EXPECT) = Some(CachedToken {
            token: token.to_string(),
            expires_at,
        });
    }

    /// Remove the token from storage and cache. Idempotent.
    pub fn clear(&self) {
        if let Err(err) = self.storage.clear() {
            warn!("failed to clear session token: {err}");
        }
        *self.cached.write().expect(LOCK_EXPECT) = None;
    }

    /// Decoded expiry of the current token, seconds since the epoch.
    pub fn expires_at(&self) -> Option<i64> {
        self.cached
            .read()
            .expect(LOCK_EXPECT)
            .as_ref()
            .map(|cached| cached.expires_at)
    }

    /// Whether the current token is usable at `now_millis`.
    pub fn is_fresh(&self, now_millis: i64) -> bool {
        self.cached
            .read()
            .expect(LOCK_EXPECT)
            .as_ref()
            .is_some_and(|cached| cached.expires_at * 1000 >= now_millis)
    }
}

impl std::fmt::Debug for SessionTokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTokenStore")
            .field("expires_at", &self.expires_at())
            .finish_non_exhaustive()
    }
}
