//! Session lifecycle and coordinated refresh
//!
//! The [`SessionManager`] owns the token store, the refresh endpoint
//! call, and the host hooks. Refreshing is single-flight: however many
//! requests discover a dead token at once, one network call is made and
//! every caller observes its outcome. The refresh request goes out on
//! the manager's own plain HTTP path, so it can never re-enter the
//! gateway's retry logic.

use std::sync::{Arc, Mutex};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use reqwest::header;
use serde::Deserialize;
use tracing::{debug, info, warn};

use haki_core::SessionTokenStore;

const LOCK_EXPECT: &str = "Failed to acquire refresh slot lock";

type SharedRefresh = Shared<BoxFuture<'static, Result<String, RefreshError>>>;

/// Why a refresh attempt failed. Cloneable so every waiter on a shared
/// refresh receives the same reason.
#[derive(Clone, Debug)]
pub(crate) enum RefreshError {
    /// The refresh endpoint answered with a non-success status.
    Rejected { status: u16, message: String },
    /// The refresh request never completed.
    Transport(String),
}

impl RefreshError {
    pub(crate) fn message(&self) -> String {
        match self {
            Self::Rejected { status, message } => format!("{status}: {message}"),
            Self::Transport(message) => message.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: Option<String>,
    token: Option<String>,
}

impl RefreshResponse {
    fn into_token(self) -> Option<String> {
        self.access_token.or(self.token)
    }
}

/// Host callbacks for session events. The host decides what "logged
/// out" and "offline" look like; the client only reports them.
#[derive(Clone, Default)]
pub(crate) struct SessionHooks {
    pub(crate) on_session_expired: Option<Arc<dyn Fn() + Send + Sync>>,
    pub(crate) on_network_unavailable: Option<Arc<dyn Fn(&str) + Send + Sync>>,
}

pub struct SessionManager {
    store: SessionTokenStore,
    http: reqwest::Client,
    refresh_url: String,
    inflight: Mutex<Option<SharedRefresh>>,
    hooks: SessionHooks,
}

impl SessionManager {
    pub(crate) fn new(
        store: SessionTokenStore,
        http: reqwest::Client,
        refresh_url: String,
        hooks: SessionHooks,
    ) -> Self {
        Self {
            store,
            http,
            refresh_url,
            inflight: Mutex::new(None),
            hooks,
        }
    }

    /// Current token, expired or not.
    pub fn token(&self) -> Option<String> {
        self.store.get()
    }

    /// The backing token store.
    pub fn store(&self) -> &SessionTokenStore {
        &self.store
    }

    /// Install a freshly issued token (login, registration).
    pub fn install(&self, token: &str) {
        self.store.set(token);
    }

    /// Drop the session locally without notifying the host.
    pub fn logout(&self) {
        debug!("clearing session");
        self.store.clear();
    }

    /// End the session and notify the host that it is gone.
    pub(crate) fn expire(&self) {
        self.store.clear();
        if let Some(callback) = &self.hooks.on_session_expired {
            callback();
        }
    }

    pub(crate) fn notify_network_unavailable(&self, message: &str) {
        if let Some(callback) = &self.hooks.on_network_unavailable {
            callback(message);
        }
    }

    /// Obtain a fresh token, refreshing at most once across all callers.
    ///
    /// A caller that finds a refresh already in flight awaits that same
    /// outcome instead of issuing its own. On failure the store has been
    /// cleared and the session-expired hook has fired before any waiter
    /// resumes.
    pub(crate) async fn ensure_fresh(self: Arc<Self>) -> Result<String, RefreshError> {
        let pending = {
            let mut slot = self.inflight.lock().expect(LOCK_EXPECT);
            if let Some(pending) = slot.as_ref() {
                debug!("refresh already in flight, awaiting its outcome");
                pending.clone()
            } else {
                let manager = Arc::clone(&self);
                let pending: SharedRefresh =
                    async move { manager.run_refresh().await }.boxed().shared();
                *slot = Some(pending.clone());
                pending
            }
        };
        pending.await
    }

    async fn run_refresh(&self) -> Result<String, RefreshError> {
        let outcome = self.call_refresh_endpoint().await;
        match &outcome {
            Ok(token) => {
                // Waiters read the store as soon as they resume, so the
                // new token must land before the slot resolves.
                self.store.set(token);
                info!("session token refreshed");
            }
            Err(err) => {
                warn!("session refresh failed: {}", err.message());
                self.expire();
            }
        }
        *self.inflight.lock().expect(LOCK_EXPECT) = None;
        outcome
    }

    async fn call_refresh_endpoint(&self) -> Result<String, RefreshError> {
        debug!(url = %self.refresh_url, "refreshing session token");

        let mut request = self.http.post(&self.refresh_url);
        if let Some(token) = self.store.get() {
            // The current, possibly expired, credential authenticates the
            // refresh itself.
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = request
            .send()
            .await
            .map_err(|err| RefreshError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_else(|_| status.to_string());
            return Err(RefreshError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let body: RefreshResponse = response
            .json()
            .await
            .map_err(|err| RefreshError::Transport(err.to_string()))?;

        body.into_token().ok_or_else(|| RefreshError::Rejected {
            status: status.as_u16(),
            message: "refresh response carried no token".to_string(),
        })
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("refresh_url", &self.refresh_url)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}
