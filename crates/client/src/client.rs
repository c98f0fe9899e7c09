//! Session-aware API client

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, ClientBuilder, Method, Request, RequestBuilder, StatusCode, header};
use tracing::{debug, warn};

use haki_core::{MemoryTokenStorage, SessionTokenStore, TokenStorage, token};

use crate::error::ClientError;
use crate::recovery::{LogoutReason, RecoveryDecision, RecoveryPolicy};
use crate::session::{SessionHooks, SessionManager};

const DEFAULT_USER_AGENT: &str = "haki-client/0.1.0";

/// API client for the Haki Yetu backend.
///
/// Every request goes through the session gateway: bearer attachment,
/// proactive refresh of a token already known to be expired, and a
/// single retry after an unauthorized response. Concurrent requests
/// share one in-flight refresh.
#[derive(Clone)]
pub struct HakiClient {
    http: Client,
    base_url: String,
    session: Arc<SessionManager>,
    policy: RecoveryPolicy,
}

impl HakiClient {
    /// Create a new client with default configuration
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::builder().base_url(base_url).build()
    }

    /// Create a new client builder
    pub fn builder() -> HakiClientBuilder {
        HakiClientBuilder::default()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The session behind this client.
    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Create a request builder. The bearer credential is attached at
    /// execution time, so a token refreshed mid-flight is never stale.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.http.request(method, url)
    }

    /// Execute a request and deserialize the JSON response.
    ///
    /// This is the gateway: expired tokens are refreshed before the
    /// request is sent, and a 401 triggers at most one refresh-and-retry
    /// cycle unless the path opts out.
    pub async fn execute<T: serde::de::DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ClientError> {
        let mut request = request
            .build()
            .map_err(|err| ClientError::Configuration(err.to_string()))?;
        let path = request.url().path().to_string();

        // The first attempt consumes the request; a retry needs this copy.
        let retry_copy = request.try_clone();

        // Proactive path: never send a token already known to be expired.
        let mut bearer = self.session.token();
        let expired = bearer
            .as_deref()
            .is_some_and(|current| token::is_expired(Some(current), token::now_millis()));
        if expired {
            debug!(%path, "token expired, refreshing before send");
            match Arc::clone(&self.session).ensure_fresh().await {
                Ok(fresh) => bearer = Some(fresh),
                Err(err) => {
                    // Session is already cleared and the host notified;
                    // the original request is never sent.
                    warn!(%path, "refresh failed, request not sent: {}", err.message());
                    return Err(ClientError::SessionExpired);
                }
            }
        }
        if let Some(bearer) = &bearer {
            attach_bearer(&mut request, bearer)?;
        }

        let response = match self.http.execute(request).await {
            Ok(response) => response,
            Err(err) => return Err(self.network_error(&err)),
        };

        if response.status() != StatusCode::UNAUTHORIZED {
            return read_json(response).await;
        }

        // Reactive path.
        match self.policy.on_unauthorized(&path, false) {
            RecoveryDecision::Passthrough => {
                debug!(%path, "unauthorized on excluded path, passing through");
                Err(ClientError::Unauthorized(response_message(response).await))
            }
            RecoveryDecision::Logout(reason) => {
                let message = response_message(response).await;
                warn!(%path, "unauthorized, ending session");
                self.session.expire();
                match reason {
                    LogoutReason::RefreshRejected => Err(ClientError::RefreshFailed(message)),
                    LogoutReason::RetryExhausted => Err(ClientError::SessionExpired),
                }
            }
            RecoveryDecision::RefreshAndRetry => {
                let Some(mut retry) = retry_copy else {
                    // A streaming body cannot be replayed.
                    return Err(ClientError::Unauthorized(response_message(response).await));
                };

                debug!(%path, "unauthorized, refreshing and retrying once");
                let fresh = match Arc::clone(&self.session).ensure_fresh().await {
                    Ok(fresh) => fresh,
                    Err(err) => return Err(ClientError::RefreshFailed(err.message())),
                };

                attach_bearer(&mut retry, &fresh)?;
                let response = match self.http.execute(retry).await {
                    Ok(response) => response,
                    Err(err) => return Err(self.network_error(&err)),
                };

                if response.status() == StatusCode::UNAUTHORIZED {
                    // Still rejected with a fresh token; nothing left to try.
                    warn!(%path, "still unauthorized after refresh, ending session");
                    self.session.expire();
                    return Err(ClientError::SessionExpired);
                }
                read_json(response).await
            }
        }
    }

    fn network_error(&self, err: &reqwest::Error) -> ClientError {
        let message = err.to_string();
        warn!("no response from server: {message}");
        self.session.notify_network_unavailable(&message);
        ClientError::NetworkUnavailable(message)
    }
}

fn attach_bearer(request: &mut Request, token: &str) -> Result<(), ClientError> {
    let value = header::HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|_| ClientError::Configuration("token is not a valid header value".into()))?;
    request.headers_mut().insert(header::AUTHORIZATION, value);
    Ok(())
}

async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        response
            .json()
            .await
            .map_err(|err| ClientError::Decode(err.to_string()))
    } else {
        let message = response.text().await.unwrap_or_else(|_| status.to_string());
        Err(ClientError::from_status(status, message))
    }
}

async fn response_message(response: reqwest::Response) -> String {
    let status = response.status();
    response.text().await.unwrap_or_else(|_| status.to_string())
}

/// Builder for [`HakiClient`]
pub struct HakiClientBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
    storage: Option<Arc<dyn TokenStorage>>,
    policy: RecoveryPolicy,
    hooks: SessionHooks,
}

impl Default for HakiClientBuilder {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: None,
            user_agent: None,
            storage: None,
            policy: RecoveryPolicy::default(),
            hooks: SessionHooks::default(),
        }
    }
}

impl HakiClientBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the request timeout. Also bounds the refresh call, so waiters
    /// on a hung refresh are released with a failure.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Storage backend for the session token. Defaults to in-memory;
    /// pass a [`haki_core::FileTokenStorage`] for a session that
    /// survives restarts.
    pub fn token_storage(mut self, storage: Arc<dyn TokenStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Add a path fragment whose endpoints opt out of automatic
    /// refresh/retry/logout on 401.
    pub fn exclude_path(mut self, fragment: impl Into<String>) -> Self {
        self.policy.exclude(fragment);
        self
    }

    /// Called once when the session becomes unrecoverable, after the
    /// token has been cleared. The host decides what happens next,
    /// typically navigation to its login boundary.
    pub fn on_session_expired(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.hooks.on_session_expired = Some(Arc::new(callback));
        self
    }

    /// Called when a request receives no response at all, once per
    /// failed request. Suitable for a transient, non-blocking notice.
    pub fn on_network_unavailable(
        mut self,
        callback: impl Fn(&str) + Send + Sync + 'static,
    ) -> Self {
        self.hooks.on_network_unavailable = Some(Arc::new(callback));
        self
    }

    /// Build the client
    pub fn build(self) -> Result<HakiClient, ClientError> {
        let base_url = self
            .base_url
            .ok_or_else(|| ClientError::Configuration("base_url is required".into()))?;

        // Ensure base_url ends without a trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();

        let mut client_builder = ClientBuilder::new()
            .user_agent(self.user_agent.unwrap_or_else(|| DEFAULT_USER_AGENT.into()));
        if let Some(timeout) = self.timeout {
            client_builder = client_builder.timeout(timeout);
        }
        let http = client_builder
            .build()
            .map_err(|err| ClientError::Configuration(err.to_string()))?;

        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(MemoryTokenStorage::new()));
        let store = SessionTokenStore::new(storage);

        let refresh_url = format!("{}{}", base_url, self.policy.refresh_path());
        let session = Arc::new(SessionManager::new(
            store,
            http.clone(),
            refresh_url,
            self.hooks,
        ));

        Ok(HakiClient {
            http,
            base_url,
            session,
            policy: self.policy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_requires_base_url() {
        let result = HakiClient::builder().build();
        assert!(matches!(result, Err(ClientError::Configuration(_))));
    }

    #[test]
    fn builder_trims_trailing_slash() {
        let client = HakiClient::builder()
            .base_url("http://localhost:8080/")
            .build()
            .expect("client should build");
        assert_eq!(client.base_url(), "http://localhost:8080");
    }
}
