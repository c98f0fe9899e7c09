//! Authentication API client methods

use reqwest::Method;

use crate::client::HakiClient;
use crate::error::ClientError;
use crate::types::{LoginRequest, RegisterRequest, SessionResponse, UserProfile};

impl HakiClient {
    /// Log in with email and password. The returned token becomes the
    /// session credential for subsequent requests.
    pub async fn login(
        &self,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<SessionResponse, ClientError> {
        let req = self.request(Method::POST, "/auth/login").json(&LoginRequest {
            email: email.into(),
            password: password.into(),
        });
        let response: SessionResponse = self.execute(req).await?;
        self.session().install(&response.access_token);
        Ok(response)
    }

    /// Register a new account. A successful registration starts a session.
    pub async fn register(&self, request: RegisterRequest) -> Result<SessionResponse, ClientError> {
        let req = self.request(Method::POST, "/auth/register").json(&request);
        let response: SessionResponse = self.execute(req).await?;
        self.session().install(&response.access_token);
        Ok(response)
    }

    /// Fetch the signed-in user's profile.
    pub async fn profile(&self) -> Result<UserProfile, ClientError> {
        let req = self.request(Method::GET, "/auth/profile");
        self.execute(req).await
    }

    /// Drop the local session.
    pub fn logout(&self) {
        self.session().logout();
    }
}
